//! Seeded column heights and surface materials.
//!
//! Heights come from multi-octave simplex fBm. The octave sum is accumulated
//! in fixed point so two peers with the same seed agree on every column,
//! bit for bit.

use noise::{NoiseFn, Simplex};
use voxlink_voxel::{Material, WorldSeed};

use crate::error::GenerationError;

/// Tallest column height [`TerrainParams::max_height`] may request.
pub const MAX_TERRAIN_HEIGHT: u32 = 256;

// ---------------------------------------------------------------------------
// Fixed-point arithmetic
// ---------------------------------------------------------------------------

/// 64-bit fixed-point number with 32 integer bits and 32 fractional bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedPoint64(i64);

impl FixedPoint64 {
    /// The zero value.
    pub const ZERO: Self = Self(0);

    const FRAC_BITS: u32 = 32;

    /// Convert from `f64` (saturating on overflow).
    #[inline]
    pub fn from_f64(v: f64) -> Self {
        let scaled = v * (1_i64 << Self::FRAC_BITS) as f64;
        Self(scaled as i64)
    }

    /// Convert from a whole number.
    #[inline]
    pub fn from_int(v: i32) -> Self {
        Self(i64::from(v) << Self::FRAC_BITS)
    }

    /// Convert back to `f64`.
    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / (1_i64 << Self::FRAC_BITS) as f64
    }

    /// Largest whole number not greater than `self`.
    #[inline]
    pub fn floor(self) -> i64 {
        self.0 >> Self::FRAC_BITS
    }
}

impl std::ops::Add for FixedPoint64 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0.wrapping_add(rhs.0))
    }
}

impl std::ops::Mul for FixedPoint64 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let wide = (self.0 as i128) * (rhs.0 as i128);
        Self((wide >> Self::FRAC_BITS) as i64)
    }
}

/// Accumulate 2D noise octaves in fixed point.
///
/// Sampling uses `f64` (the `noise` crate is deterministic for identical
/// input); frequency, amplitude and the running sum are fixed point.
pub fn fbm_fixed_point(
    noise_fn: &impl NoiseFn<f64, 2>,
    x: f64,
    z: f64,
    params: &TerrainParams,
) -> FixedPoint64 {
    let mut total = FixedPoint64::ZERO;
    let mut freq = FixedPoint64::from_f64(params.base_frequency);
    let mut amp = FixedPoint64::from_f64(params.amplitude);
    let lac = FixedPoint64::from_f64(params.lacunarity);
    let pers = FixedPoint64::from_f64(params.persistence);

    for _ in 0..params.octaves {
        let f = freq.to_f64();
        let noise_val = noise_fn.get([x * f, z * f]);
        total = total + FixedPoint64::from_f64(noise_val) * amp;
        freq = freq * lac;
        amp = amp * pers;
    }

    total
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Shape of the terrain heightfield, in blocks.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainParams {
    /// Number of noise octaves.
    pub octaves: u32,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
    /// Frequency of the first octave, in cycles per block.
    pub base_frequency: f64,
    /// Amplitude of the first octave, in blocks.
    pub amplitude: f64,
    /// Height the noise is centered on.
    pub base_height: u32,
    /// Columns at or just above this height are sand.
    pub sea_level: u32,
    /// Columns are clamped to `[1, max_height]`.
    pub max_height: u32,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
            base_frequency: 0.01,
            amplitude: 18.0,
            base_height: 28,
            sea_level: 20,
            max_height: 64,
        }
    }
}

impl TerrainParams {
    /// Default shape scaled to a different height ceiling.
    pub fn with_max_height(max_height: u32) -> Self {
        let defaults = Self::default();
        let scale = f64::from(max_height) / f64::from(defaults.max_height);
        Self {
            amplitude: defaults.amplitude * scale,
            base_height: (f64::from(defaults.base_height) * scale) as u32,
            sea_level: (f64::from(defaults.sea_level) * scale) as u32,
            max_height,
            ..defaults
        }
    }

    /// Reject parameter sets that cannot produce a sane heightfield.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.max_height == 0 || self.max_height > MAX_TERRAIN_HEIGHT {
            return Err(GenerationError::InvalidParams("max_height out of range"));
        }
        if self.base_height > self.max_height {
            return Err(GenerationError::InvalidParams(
                "base_height above max_height",
            ));
        }
        if self.octaves == 0 || self.octaves > 16 {
            return Err(GenerationError::InvalidParams("octaves must be 1..=16"));
        }
        let finite = [
            self.lacunarity,
            self.persistence,
            self.base_frequency,
            self.amplitude,
        ];
        if finite.iter().any(|v| !v.is_finite() || *v < 0.0) || self.base_frequency == 0.0 {
            return Err(GenerationError::InvalidParams(
                "noise parameters must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sampler
// ---------------------------------------------------------------------------

/// Column-height sampler for one world seed.
pub struct TerrainNoise {
    noise: Simplex,
    params: TerrainParams,
}

impl TerrainNoise {
    /// Build a sampler seeded from `seed`.
    pub fn new(seed: &WorldSeed, params: TerrainParams) -> Result<Self, GenerationError> {
        params.validate()?;
        Ok(Self {
            noise: Simplex::new(seed.noise_seed()),
            params,
        })
    }

    /// Height of the column at world block `(x, z)`, in `[1, max_height]`.
    pub fn height(&self, x: i64, z: i64) -> u32 {
        let offset = fbm_fixed_point(&self.noise, x as f64 + 0.5, z as f64 + 0.5, &self.params);
        let base = FixedPoint64::from_int(self.params.base_height as i32);
        (base + offset)
            .floor()
            .clamp(1, i64::from(self.params.max_height)) as u32
    }

    /// Material of the top face of a column `height` blocks tall.
    pub fn surface_material(&self, height: u32) -> Material {
        let max = self.params.max_height;
        if height <= self.params.sea_level.saturating_add(1) {
            Material::Sand
        } else if height >= max - max / 8 {
            Material::Snow
        } else if height >= max - max / 4 {
            Material::Stone
        } else {
            Material::Grass
        }
    }

    /// Material of block `y` in a column whose surface is at `surface`.
    pub fn material(&self, surface: u32, y: u32) -> Material {
        let top = self.surface_material(surface);
        let depth = surface.saturating_sub(y + 1);
        match (depth, top) {
            (0, m) => m,
            (1..=3, Material::Grass) => Material::Dirt,
            (1..=3, Material::Sand) => Material::Sand,
            _ => Material::Stone,
        }
    }

    /// Parameters this sampler was built with.
    pub fn params(&self) -> &TerrainParams {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(s: &str) -> WorldSeed {
        WorldSeed::parse(s).unwrap()
    }

    fn sampler(s: &str) -> TerrainNoise {
        TerrainNoise::new(&seed(s), TerrainParams::default()).unwrap()
    }

    #[test]
    fn test_fixed_point_round_trip() {
        for v in [0.0, 1.0, -1.0, 0.5, 123.456, -0.001] {
            let back = FixedPoint64::from_f64(v).to_f64();
            assert!((back - v).abs() < 1e-9, "{v} -> {back}");
        }
    }

    #[test]
    fn test_fixed_point_arithmetic_and_floor() {
        let a = FixedPoint64::from_f64(1.5);
        let b = FixedPoint64::from_f64(2.0);
        assert_eq!((a * b).to_f64(), 3.0);
        assert_eq!((a + b).to_f64(), 3.5);
        assert_eq!(FixedPoint64::from_f64(-0.25).floor(), -1);
        assert_eq!(FixedPoint64::from_f64(2.75).floor(), 2);
        assert_eq!(FixedPoint64::from_int(-3).floor(), -3);
    }

    #[test]
    fn test_same_seed_same_heights() {
        let a = sampler("abc");
        let b = sampler("abc");
        for x in -20..20 {
            for z in -20..20 {
                assert_eq!(a.height(x, z), b.height(x, z), "({x}, {z})");
            }
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = sampler("abc");
        let b = sampler("xyz");
        let differs = (0..32).any(|x| (0..32).any(|z| a.height(x, z) != b.height(x, z)));
        assert!(differs);
    }

    #[test]
    fn test_heights_stay_in_range() {
        let s = sampler("range");
        let max = s.params().max_height;
        for x in (-500..500).step_by(7) {
            for z in (-500..500).step_by(11) {
                let h = s.height(x, z);
                assert!((1..=max).contains(&h), "height {h} at ({x}, {z})");
            }
        }
    }

    #[test]
    fn test_material_bands() {
        let s = sampler("abc");
        assert_eq!(s.surface_material(20), Material::Sand);
        assert_eq!(s.surface_material(30), Material::Grass);
        assert_eq!(s.surface_material(50), Material::Stone);
        assert_eq!(s.surface_material(64), Material::Snow);

        assert_eq!(s.material(30, 29), Material::Grass);
        assert_eq!(s.material(30, 27), Material::Dirt);
        assert_eq!(s.material(30, 10), Material::Stone);
        assert_eq!(s.material(15, 12), Material::Sand);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let bad = [
            TerrainParams {
                max_height: 0,
                ..Default::default()
            },
            TerrainParams {
                base_height: 100,
                ..Default::default()
            },
            TerrainParams {
                octaves: 0,
                ..Default::default()
            },
            TerrainParams {
                amplitude: f64::NAN,
                ..Default::default()
            },
        ];
        for params in bad {
            assert!(TerrainNoise::new(&seed("abc"), params).is_err());
        }
    }

    #[test]
    fn test_with_max_height_scales() {
        let p = TerrainParams::with_max_height(128);
        assert_eq!(p.max_height, 128);
        assert_eq!(p.base_height, 56);
        assert_eq!(p.sea_level, 40);
        assert!(p.validate().is_ok());
    }
}
