//! Terrain noise and the column height field.
//!
//! Terrain shape comes from a single deterministic 2D noise function. The
//! `HeightField` quantizes it into integer column heights; generation and
//! the fast meshing path both answer "is this cell air?" from the same
//! quantizer, which is what keeps two chunks sharing a vertical column in
//! agreement without ever looking at each other's grids.

use std::sync::Arc;

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use crate::error::EngineError;

/// A deterministic 2D noise producer returning values in `[-1, 1]`.
///
/// Implementations must be pure: the same `(x, y)` always yields the same
/// sample for the lifetime of the source.
pub trait NoiseSource: Send + Sync {
    fn get(&self, x: f32, y: f32) -> f32;
}

/// The shipped noise source: fractal-Brownian-motion Perlin noise.
#[derive(Clone)]
pub struct TerrainNoise {
    fbm: Fbm<Perlin>,
}

impl TerrainNoise {
    /// Build the terrain noise for a world seed.
    #[must_use]
    pub fn new(seed: u32) -> Self {
        let fbm = Fbm::<Perlin>::new(seed)
            .set_frequency(0.02)
            .set_octaves(5)
            .set_lacunarity(2.0)
            .set_persistence(0.3);
        TerrainNoise { fbm }
    }
}

impl NoiseSource for TerrainNoise {
    fn get(&self, x: f32, y: f32) -> f32 {
        #[allow(clippy::cast_possible_truncation)]
        {
            self.fbm.get([f64::from(x), f64::from(y)]) as f32
        }
    }
}

/// Quantizes the noise into integer column heights within `[h_min, h_max]`.
///
/// Cloned freely into background tasks; the noise source is shared behind an
/// `Arc` so clones stay cheap.
#[derive(Clone)]
pub struct HeightField {
    source: Arc<dyn NoiseSource>,
    noise_scale: f32,
    h_min: i32,
    h_max: i32,
}

impl HeightField {
    /// Wrap an existing noise source.
    ///
    /// # Arguments
    /// * `source` - the noise producer, sampled at `(x, y) / noise_scale`
    /// * `noise_scale` - world units per noise unit
    /// * `height_range` - inclusive `(h_min, h_max)` clamp in cells
    #[must_use]
    pub fn new(source: Arc<dyn NoiseSource>, noise_scale: f32, height_range: (i32, i32)) -> Self {
        HeightField {
            source,
            noise_scale,
            h_min: height_range.0,
            h_max: height_range.1,
        }
    }

    /// Convenience constructor using the shipped `TerrainNoise`.
    #[must_use]
    pub fn from_seed(seed: u32, noise_scale: f32, height_range: (i32, i32)) -> Self {
        Self::new(Arc::new(TerrainNoise::new(seed)), noise_scale, height_range)
    }

    /// Integer column height at a world position.
    ///
    /// Samples the noise at `(x, y) / noise_scale`, normalizes `[-1, 1]` to
    /// `[0, 1]`, maps linearly onto `[h_min, h_max]`, floors and clamps.
    ///
    /// # Errors
    /// `NoiseFailure` when the source yields a non-finite sample; the caller
    /// evicts the affected chunk.
    pub fn column_height(&self, x_world: f32, y_world: f32) -> Result<i32, EngineError> {
        let sample = self
            .source
            .get(x_world / self.noise_scale, y_world / self.noise_scale);
        if !sample.is_finite() {
            return Err(EngineError::NoiseFailure(sample));
        }

        let normalized = (sample + 1.0) / 2.0;
        let span = self.h_max - self.h_min;
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let height = (normalized * span as f32 + self.h_min as f32).floor() as i32;
        Ok(height.clamp(self.h_min, self.h_max))
    }

    /// Inclusive height clamp range.
    #[must_use]
    pub fn height_range(&self) -> (i32, i32) {
        (self.h_min, self.h_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstantNoise(f32);

    impl NoiseSource for ConstantNoise {
        fn get(&self, _x: f32, _y: f32) -> f32 {
            self.0
        }
    }

    #[test]
    fn heights_stay_within_range() {
        let field = HeightField::from_seed(7, 100.0, (6, 32));
        for i in -40..40 {
            for j in -40..40 {
                #[allow(clippy::cast_precision_loss)]
                let h = field
                    .column_height(i as f32 * 83.0, j as f32 * 83.0)
                    .unwrap();
                assert!((6..=32).contains(&h), "height {h} out of range");
            }
        }
    }

    #[test]
    fn same_seed_same_heights() {
        let a = HeightField::from_seed(1337, 100.0, (6, 32));
        let b = HeightField::from_seed(1337, 100.0, (6, 32));
        for i in 0..64 {
            #[allow(clippy::cast_precision_loss)]
            let (x, y) = (i as f32 * 37.5, i as f32 * -91.25);
            assert_eq!(a.column_height(x, y).unwrap(), b.column_height(x, y).unwrap());
        }
    }

    #[test]
    fn extremes_map_to_range_ends() {
        let lo = HeightField::new(Arc::new(ConstantNoise(-1.0)), 100.0, (6, 32));
        let hi = HeightField::new(Arc::new(ConstantNoise(1.0)), 100.0, (6, 32));
        assert_eq!(lo.column_height(0.0, 0.0).unwrap(), 6);
        assert_eq!(hi.column_height(0.0, 0.0).unwrap(), 32);
    }

    #[test]
    fn non_finite_sample_is_an_error() {
        let field = HeightField::new(Arc::new(ConstantNoise(f32::NAN)), 100.0, (6, 32));
        assert!(matches!(
            field.column_height(0.0, 0.0),
            Err(EngineError::NoiseFailure(_))
        ));
    }
}
