//! Synthetic impulse responses for the convolution reverb.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::buffer::PcmBuffer;
use crate::error::{EngineError, Result};

/// Seed used when the caller does not supply one.
pub const DEFAULT_IMPULSE_SEED: u64 = 0x5241_4957;

/// Decay exponent the render graph uses for its reverb kernel.
pub const REVERB_DECAY_EXPONENT: f64 = 2.0;

/// Generate a stereo decaying-noise impulse response.
///
/// Each sample is uniform noise in [-1, 1] scaled by
/// `(1 - i/length)^decay_exponent`. Deterministic for a fixed seed.
pub fn generate_impulse(sample_rate: u32, duration_sec: f64, decay_exponent: f64) -> Result<PcmBuffer> {
    let mut rng = StdRng::seed_from_u64(DEFAULT_IMPULSE_SEED);
    generate_impulse_with_rng(sample_rate, duration_sec, decay_exponent, &mut rng)
}

/// Same as [`generate_impulse`], drawing noise from `rng`.
pub fn generate_impulse_with_rng<R: Rng>(
    sample_rate: u32,
    duration_sec: f64,
    decay_exponent: f64,
    rng: &mut R,
) -> Result<PcmBuffer> {
    if !(duration_sec.is_finite() && duration_sec > 0.0) {
        return Err(EngineError::GraphConstruction(format!(
            "impulse duration must be positive, got {duration_sec}"
        )));
    }
    if !(decay_exponent.is_finite() && decay_exponent >= 0.0) {
        return Err(EngineError::GraphConstruction(format!(
            "impulse decay exponent must be non-negative, got {decay_exponent}"
        )));
    }

    let length = ((sample_rate as f64 * duration_sec) as usize).max(1);
    let channels = (0..2)
        .map(|_| {
            (0..length)
                .map(|i| {
                    let envelope = (1.0 - i as f64 / length as f64).powf(decay_exponent);
                    (rng.gen_range(-1.0..=1.0_f64) * envelope) as f32
                })
                .collect()
        })
        .collect();

    PcmBuffer::new(channels, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_and_channels() {
        let ir = generate_impulse(48000, 1.5, 2.0).unwrap();
        assert_eq!(ir.channel_count(), 2);
        assert_eq!(ir.len(), 72000);
        assert_eq!(ir.sample_rate(), 48000);
    }

    #[test]
    fn samples_within_envelope() {
        let ir = generate_impulse(8000, 1.0, 2.0).unwrap();
        let len = ir.len() as f64;
        for ch in ir.channels() {
            for (i, &s) in ch.iter().enumerate() {
                let env = (1.0 - i as f64 / len).powf(2.0) as f32;
                assert!(s.abs() <= env + 1e-6, "sample {i} = {s} exceeds envelope {env}");
            }
        }
    }

    #[test]
    fn tail_decays() {
        let ir = generate_impulse(48000, 2.0, 2.0).unwrap();
        let ch = ir.channel(0);
        let energy = |s: &[f32]| s.iter().map(|x| x * x).sum::<f32>();
        let quarter = ch.len() / 4;
        assert!(energy(&ch[..quarter]) > 10.0 * energy(&ch[3 * quarter..]));
    }

    #[test]
    fn deterministic_for_same_inputs() {
        let a = generate_impulse(16000, 0.5, 3.0).unwrap();
        let b = generate_impulse(16000, 0.5, 3.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn smaller_exponent_gives_denser_tail() {
        let energy = |exp: f64| {
            let ir = generate_impulse(16000, 1.0, exp).unwrap();
            ir.channel(0)[8000..].iter().map(|x| x * x).sum::<f32>()
        };
        assert!(energy(1.0) > energy(4.0));
    }

    #[test]
    fn rejects_non_positive_duration() {
        assert!(matches!(
            generate_impulse(48000, 0.0, 2.0),
            Err(EngineError::GraphConstruction(_))
        ));
        assert!(generate_impulse(48000, -1.0, 2.0).is_err());
        assert!(generate_impulse(48000, 1.0, -2.0).is_err());
    }
}
