//! Normalized height grids and their bilinear samplers.
//!
//! A [`Heightfield`] stores one height sample per grid point in `[0, 1]`,
//! indexed `[row (z), column (x)]`. All sampling maps normalized `(u, v)`
//! coordinates onto the continuous grid `[0, resolution]` and clamps at the
//! border, so `u = 1` and `v = 1` read the last column/row instead of running
//! out of bounds.

use crate::result::{ConversionError, ConversionResult};
use log::error;
use ndarray::Array2;

/// A square grid of normalized height samples.
#[derive(Clone, Debug)]
pub struct Heightfield {
    heights: Array2<f32>,
}

impl Heightfield {
    pub fn new(heights: Array2<f32>) -> ConversionResult<Self> {
        let (rows, cols) = heights.dim();

        if rows != cols || rows < 2 {
            error!("invalid heightfield: {rows}x{cols} samples");
            return Err(ConversionError::InvalidInput);
        }

        Ok(Self { heights })
    }

    /// The number of samples per side.
    pub fn samples(&self) -> usize {
        self.heights.nrows()
    }

    /// The number of quads per side, one less than the sample count.
    pub fn resolution(&self) -> usize {
        self.samples() - 1
    }

    pub fn get(&self, x: usize, z: usize) -> f32 {
        self.heights[[z, x]]
    }

    /// Bilinearly interpolated height at normalized `(u, v)`.
    ///
    /// Exact at the grid points: sampling at integer grid coordinates returns
    /// the stored value without interpolation error.
    pub fn sample(&self, u: f32, v: f32) -> f32 {
        let r = self.resolution();

        let fx = (u * r as f32).clamp(0.0, r as f32);
        let fz = (v * r as f32).clamp(0.0, r as f32);

        let x1 = fx.floor() as usize;
        let z1 = fz.floor() as usize;
        let x2 = (x1 + 1).min(r);
        let z2 = (z1 + 1).min(r);

        let tx = fx - x1 as f32;
        let tz = fz - z1 as f32;

        let h1 = self.heights[[z1, x1]];
        let h2 = self.heights[[z1, x2]];
        let h3 = self.heights[[z2, x1]];
        let h4 = self.heights[[z2, x2]];

        let bottom = h1 + (h2 - h1) * tx;
        let top = h3 + (h4 - h3) * tx;

        bottom + (top - bottom) * tz
    }

    /// Height of the grid sample nearest to normalized `(u, v)`.
    pub fn sample_nearest(&self, u: f32, v: f32) -> f32 {
        let r = self.resolution();

        let x = (u * r as f32).round().clamp(0.0, r as f32) as usize;
        let z = (v * r as f32).round().clamp(0.0, r as f32) as usize;

        self.heights[[z, x]]
    }

    /// Extracts a square sub-grid of `samples` per side starting at the given
    /// sample coordinates. An exact copy, no interpolation.
    pub fn region(&self, origin_x: usize, origin_z: usize, samples: usize) -> ConversionResult<Self> {
        if samples < 2
            || origin_x + samples > self.samples()
            || origin_z + samples > self.samples()
        {
            return Err(ConversionError::InvalidInput);
        }

        let heights = self
            .heights
            .slice(ndarray::s![
                origin_z..origin_z + samples,
                origin_x..origin_x + samples
            ])
            .to_owned();

        Self::new(heights)
    }
}
