use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("invalid terrain or heightfield input")]
    InvalidInput,
    #[error("resolution per chunk ({resolution}x{resolution}) is too small")]
    ResolutionTooSmall { resolution: u32 },
    #[error("texture was not materialized after {retries} retries: {}", .path.display())]
    RetriesExhausted { path: PathBuf, retries: u32 },
    #[error("texture bake failed: {0}")]
    BakeFailed(String),
    #[error("unsupported heightmap data: {0}")]
    UnsupportedHeightmap(String),
    #[error("io error")]
    Io(#[from] std::io::Error),
    #[error("image error")]
    Image(#[from] image::ImageError),
    #[error("tiff error")]
    Tiff(#[from] tiff::TiffError),
}

pub type ConversionResult<T> = Result<T, ConversionError>;
