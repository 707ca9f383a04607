//! Deterministic noise for Canvas, WebGL, Audio and ClientRects outputs.
//!
//! Every function here is pure in `(seed, index)`: reading the same static
//! content twice under one profile yields bit-identical output, while two
//! profiles (two seeds) produce different fingerprints. Per-call randomness
//! would itself be a detection signal, since real hardware noise is stable.
//!
//! The emitted page prelude carries the same formulas; see
//! [`script::prelude`](crate::script::prelude).

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Upper bound (exclusive) of a profile noise seed.
pub const SEED_RANGE: u32 = 1_000_000;

/// Draw a fresh per-profile seed in `[0, SEED_RANGE)`.
pub fn noise_seed<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    rng.gen_range(0..SEED_RANGE)
}

/// `(sin(seed + index) * 127 + 128) mod 2`, a value in `[0, 2)`.
#[inline]
pub fn pixel_noise(seed: u32, index: u32) -> f64 {
    let v = (f64::from(seed) + f64::from(index)).sin() * 127.0 + 128.0;
    v % 2.0
}

/// Perturbation strength requested by a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl NoiseLevel {
    /// Multiplier applied to [`pixel_noise`] for canvas and WebGL bytes.
    pub fn pixel_scale(self) -> f64 {
        match self {
            NoiseLevel::Low => 0.5,
            NoiseLevel::Medium => 1.0,
            NoiseLevel::High => 2.0,
        }
    }

    /// Multiplier for audio samples; small enough to stay inaudible.
    pub fn audio_scale(self) -> f64 {
        match self {
            NoiseLevel::Low => 0.00005,
            NoiseLevel::Medium => 0.0001,
            NoiseLevel::High => 0.0002,
        }
    }

    /// Sub-pixel jitter for layout rectangles, in CSS pixels.
    pub fn rect_scale(self) -> f64 {
        match self {
            NoiseLevel::Low => 0.0005,
            NoiseLevel::Medium => 0.001,
            NoiseLevel::High => 0.002,
        }
    }
}

/// Web IDL `[Clamp] octet` conversion used by `Uint8ClampedArray`:
/// round half to even, then clamp to `[0, 255]`. NaN maps to 0.
///
/// Applied explicitly to every perturbed byte, including plain `Uint8Array`
/// buffers which would otherwise wrap around.
pub fn to_uint8_clamp(v: f64) -> u8 {
    if v.is_nan() || v <= 0.0 {
        return 0;
    }
    if v >= 255.0 {
        return 255;
    }
    let floor = v.floor();
    let frac = v - floor;
    let rounded = if frac < 0.5 {
        floor
    } else if frac > 0.5 {
        floor + 1.0
    } else if floor % 2.0 == 0.0 {
        floor
    } else {
        floor + 1.0
    };
    rounded as u8
}

/// Perturb an RGBA byte buffer in place. The noise for pixel `p` is added to
/// its R, G and B bytes; alpha is left alone.
pub fn perturb_pixels(data: &mut [u8], seed: u32, level: NoiseLevel) {
    let scale = level.pixel_scale();
    for (pixel, chunk) in data.chunks_mut(4).enumerate() {
        let n = pixel_noise(seed, pixel as u32) * scale;
        for byte in chunk.iter_mut().take(3) {
            *byte = to_uint8_clamp(f64::from(*byte) + n);
        }
    }
}

/// Perturb audio samples in place, clamped to `[-1.0, 1.0]`.
pub fn perturb_samples(samples: &mut [f32], seed: u32, level: NoiseLevel) {
    let scale = level.audio_scale();
    for (i, sample) in samples.iter_mut().enumerate() {
        let n = pixel_noise(seed, i as u32) * scale;
        *sample = (f64::from(*sample) + n).clamp(-1.0, 1.0) as f32;
    }
}

/// A layout rectangle as returned by `getBoundingClientRect`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// Noise index for a rectangle: a static element always maps to the same
/// index, so its jitter is stable across reads.
pub fn rect_index(width: f64, height: f64) -> u32 {
    let w = width.round().clamp(0.0, 65_535.0) as u32;
    let h = height.round().clamp(0.0, 65_535.0) as u32;
    w.wrapping_mul(31).wrapping_add(h)
}

/// Apply sub-pixel jitter to a rectangle's size. `right`/`bottom` follow.
pub fn jitter_rect(rect: Rect, seed: u32, level: NoiseLevel) -> Rect {
    let n = pixel_noise(seed, rect_index(rect.width, rect.height)) * level.rect_scale();
    Rect {
        width: rect.width + n,
        height: rect.height + n,
        ..rect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_pixel_noise_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2_000 {
            let seed = rng.gen_range(0..SEED_RANGE);
            let index = rng.gen_range(0..10_000);
            assert_eq!(
                pixel_noise(seed, index).to_bits(),
                pixel_noise(seed, index).to_bits()
            );
        }
    }

    #[test]
    fn test_pixel_noise_range() {
        for index in 0..10_000 {
            let n = pixel_noise(424_242, index);
            assert!((0.0..2.0).contains(&n), "noise {} out of range", n);
        }
    }

    #[test]
    fn test_seeds_differ() {
        let a: Vec<u64> = (0..64).map(|i| pixel_noise(1, i).to_bits()).collect();
        let b: Vec<u64> = (0..64).map(|i| pixel_noise(2, i).to_bits()).collect();
        assert_ne!(a, b);
    }

    #[test]
    fn test_noise_seed_range() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1_000 {
            assert!(noise_seed(&mut rng) < SEED_RANGE);
        }
    }

    #[test]
    fn test_uint8_clamp() {
        assert_eq!(to_uint8_clamp(-3.0), 0);
        assert_eq!(to_uint8_clamp(f64::NAN), 0);
        assert_eq!(to_uint8_clamp(300.0), 255);
        assert_eq!(to_uint8_clamp(254.6), 255);
        assert_eq!(to_uint8_clamp(1.5), 2);
        assert_eq!(to_uint8_clamp(2.5), 2);
        assert_eq!(to_uint8_clamp(3.49), 3);
    }

    #[test]
    fn test_perturb_pixels_repeatable_and_keeps_alpha() {
        let original: Vec<u8> = (0..64u32).map(|i| (i * 37 % 256) as u8).collect();
        let mut a = original.clone();
        let mut b = original.clone();
        perturb_pixels(&mut a, 99, NoiseLevel::High);
        perturb_pixels(&mut b, 99, NoiseLevel::High);
        assert_eq!(a, b);
        for px in 0..16 {
            assert_eq!(a[px * 4 + 3], original[px * 4 + 3]);
        }
        assert_ne!(a, original);
    }

    #[test]
    fn test_perturb_pixels_saturates() {
        let mut data = vec![255u8; 400];
        perturb_pixels(&mut data, 5, NoiseLevel::High);
        assert!(data.iter().all(|b| *b == 255));
    }

    #[test]
    fn test_perturb_samples_small_and_clamped() {
        let mut samples = vec![0.5f32, -1.0, 1.0, 0.0];
        perturb_samples(&mut samples, 31337, NoiseLevel::Medium);
        assert!((samples[0] - 0.5).abs() <= 0.00021);
        assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_jitter_rect_stable() {
        let rect = Rect::new(10.0, 20.0, 100.0, 40.0);
        let a = jitter_rect(rect, 12, NoiseLevel::Low);
        let b = jitter_rect(rect, 12, NoiseLevel::Low);
        assert_eq!(a, b);
        assert_eq!(a.x, rect.x);
        assert!((a.width - rect.width).abs() < 0.001);
        assert!((a.right() - (a.x + a.width)).abs() < f64::EPSILON);
    }
}
