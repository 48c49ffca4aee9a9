//! Second-order IIR sections with WebAudio BiquadFilterNode responses.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Response shape of a [`BiquadFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiquadKind {
    Lowpass,
    Highpass,
    /// Bell boost/cut around the corner, width set by `q`.
    Peaking,
    /// Shelf below the corner (slope 1, `q` unused).
    LowShelf,
    /// Shelf above the corner (slope 1, `q` unused).
    HighShelf,
}

/// Normalized transfer function `(b0 + b1 z⁻¹ + b2 z⁻²) / (1 + a1 z⁻¹ + a2 z⁻²)`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Coefficients {
    b: [f64; 3],
    a: [f64; 2],
}

impl Coefficients {
    /// RBJ cookbook design. With `gain_db == 0` the peaking and shelf
    /// shapes come out with numerator equal to denominator, i.e. an exact
    /// identity.
    fn design(kind: BiquadKind, sample_rate: f64, frequency: f64, q: f64, gain_db: f64) -> Self {
        let w0 = 2.0 * PI * frequency / sample_rate;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);
        let amp = 10.0_f64.powf(gain_db / 40.0);
        // Shelf alpha at slope 1, pre-multiplied by 2·√A
        let shelf = 2.0 * amp.sqrt() * (sin / 2.0) * 2.0_f64.sqrt();

        let (num, den) = match kind {
            BiquadKind::Lowpass => {
                let k = 1.0 - cos;
                ([k / 2.0, k, k / 2.0], [1.0 + alpha, -2.0 * cos, 1.0 - alpha])
            }
            BiquadKind::Highpass => {
                let k = 1.0 + cos;
                ([k / 2.0, -k, k / 2.0], [1.0 + alpha, -2.0 * cos, 1.0 - alpha])
            }
            BiquadKind::Peaking => (
                [1.0 + alpha * amp, -2.0 * cos, 1.0 - alpha * amp],
                [1.0 + alpha / amp, -2.0 * cos, 1.0 - alpha / amp],
            ),
            BiquadKind::LowShelf => {
                let (p, m) = (amp + 1.0, amp - 1.0);
                (
                    [
                        amp * (p - m * cos + shelf),
                        2.0 * amp * (m - p * cos),
                        amp * (p - m * cos - shelf),
                    ],
                    [p + m * cos + shelf, -2.0 * (m + p * cos), p + m * cos - shelf],
                )
            }
            BiquadKind::HighShelf => {
                let (p, m) = (amp + 1.0, amp - 1.0);
                (
                    [
                        amp * (p + m * cos + shelf),
                        -2.0 * amp * (m + p * cos),
                        amp * (p + m * cos - shelf),
                    ],
                    [p - m * cos + shelf, 2.0 * (m - p * cos), p - m * cos - shelf],
                )
            }
        };

        let a0 = den[0];
        Self {
            b: [num[0] / a0, num[1] / a0, num[2] / a0],
            a: [den[1] / a0, den[2] / a0],
        }
    }
}

/// One biquad section run in transposed direct form II.
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    kind: BiquadKind,
    frequency: f64,
    sample_rate: f64,
    coefs: Coefficients,
    s1: f64,
    s2: f64,
}

impl BiquadFilter {
    /// Design a section. The corner is kept strictly inside `(0, nyquist)`.
    pub fn new(kind: BiquadKind, sample_rate: f64, frequency: f64, q: f64, gain_db: f64) -> Self {
        let frequency = frequency.clamp(1.0, sample_rate * 0.5 - 1.0);
        Self {
            kind,
            frequency,
            sample_rate,
            coefs: Coefficients::design(kind, sample_rate, frequency, q.max(1e-4), gain_db),
            s1: 0.0,
            s2: 0.0,
        }
    }

    pub fn lowpass(sample_rate: f64, frequency: f64) -> Self {
        Self::new(BiquadKind::Lowpass, sample_rate, frequency, FRAC_1_SQRT_2, 0.0)
    }

    pub fn highpass(sample_rate: f64, frequency: f64) -> Self {
        Self::new(BiquadKind::Highpass, sample_rate, frequency, FRAC_1_SQRT_2, 0.0)
    }

    pub fn peaking(sample_rate: f64, frequency: f64, q: f64, gain_db: f64) -> Self {
        Self::new(BiquadKind::Peaking, sample_rate, frequency, q, gain_db)
    }

    pub fn low_shelf(sample_rate: f64, frequency: f64, gain_db: f64) -> Self {
        Self::new(BiquadKind::LowShelf, sample_rate, frequency, FRAC_1_SQRT_2, gain_db)
    }

    pub fn high_shelf(sample_rate: f64, frequency: f64, gain_db: f64) -> Self {
        Self::new(BiquadKind::HighShelf, sample_rate, frequency, FRAC_1_SQRT_2, gain_db)
    }

    pub fn kind(&self) -> BiquadKind {
        self.kind
    }

    /// Effective corner frequency after clamping.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    #[inline]
    pub fn tick(&mut self, x: f64) -> f64 {
        let Coefficients { b, a } = self.coefs;
        let y = b[0] * x + self.s1;
        self.s1 = b[1] * x - a[0] * y + self.s2;
        self.s2 = b[2] * x - a[1] * y;
        y
    }

    /// Filter a block in-place.
    pub fn process_block(&mut self, block: &mut [f32]) {
        for s in block.iter_mut() {
            *s = self.tick(*s as f64) as f32;
        }
    }

    /// Linear magnitude response at `freq`.
    pub fn magnitude_at(&self, freq: f64) -> f64 {
        let Coefficients { b, a } = self.coefs;
        let w = 2.0 * PI * freq / self.sample_rate;
        let (s1, c1) = w.sin_cos();
        let (s2, c2) = (2.0 * w).sin_cos();
        let num = (b[0] + b[1] * c1 + b[2] * c2).hypot(b[1] * s1 + b[2] * s2);
        let den = (1.0 + a[0] * c1 + a[1] * c2).hypot(a[0] * s1 + a[1] * s2);
        num / den
    }
}

/// The same filter applied independently to the left and right channels.
#[derive(Debug, Clone)]
pub struct StereoBiquad {
    left: BiquadFilter,
    right: BiquadFilter,
}

impl StereoBiquad {
    pub fn new(filter: BiquadFilter) -> Self {
        Self {
            left: filter.clone(),
            right: filter,
        }
    }

    pub fn filter(&self) -> &BiquadFilter {
        &self.left
    }

    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.left.process_block(left);
        self.right.process_block(right);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Steady-state peak of a filtered sine, ignoring the first 2000 samples.
    fn settled_peak(f: &mut BiquadFilter, freq: f64, sample_rate: f64) -> f64 {
        (0..(sample_rate as usize / 5))
            .map(|i| f.tick((2.0 * PI * freq * i as f64 / sample_rate).sin()))
            .skip(2000)
            .fold(0.0_f64, |acc, y| acc.max(y.abs()))
    }

    fn settle_on_dc(f: &mut BiquadFilter) -> f64 {
        (0..1000).map(|_| f.tick(1.0)).last().unwrap_or(0.0)
    }

    #[test]
    fn lowpass_keeps_dc() {
        let mut f = BiquadFilter::lowpass(44100.0, 5000.0);
        let y = settle_on_dc(&mut f);
        assert!((y - 1.0).abs() < 1e-3, "lowpass DC gain {y}");
    }

    #[test]
    fn highpass_removes_dc() {
        let mut f = BiquadFilter::highpass(44100.0, 1000.0);
        let y = settle_on_dc(&mut f);
        assert!(y.abs() < 1e-3, "highpass DC leak {y}");
    }

    #[test]
    fn lowpass_rejects_far_stopband() {
        let mut f = BiquadFilter::lowpass(44100.0, 200.0);
        let peak = settled_peak(&mut f, 10000.0, 44100.0);
        assert!(peak < 0.01, "10 kHz through a 200 Hz lowpass: {peak}");
    }

    #[test]
    fn zero_gain_bands_are_exact_identity() {
        for filter in [
            BiquadFilter::peaking(48000.0, 1500.0, 1.0, 0.0),
            BiquadFilter::low_shelf(48000.0, 200.0, 0.0),
            BiquadFilter::high_shelf(48000.0, 8000.0, 0.0),
        ] {
            let mut f = filter;
            for i in 0..500 {
                let x = ((i as f64) * 0.37).sin() * 0.8;
                assert_eq!(f.tick(x), x, "{:?} at 0 dB must not colour the signal", f.kind());
            }
        }
    }

    #[test]
    fn peaking_cuts_at_centre() {
        let f = BiquadFilter::peaking(48000.0, 7000.0, 1.5, -12.0);
        let db = 20.0 * f.magnitude_at(7000.0).log10();
        assert!((db + 12.0).abs() < 0.1, "expected -12 dB at centre, got {db}");
        assert!(f.magnitude_at(200.0) > 0.95);
    }

    #[test]
    fn shelves_reach_their_gain() {
        let low = BiquadFilter::low_shelf(48000.0, 200.0, 6.0);
        let low_db = 20.0 * low.magnitude_at(20.0).log10();
        assert!((low_db - 6.0).abs() < 0.3, "low shelf at 20 Hz: {low_db}");
        assert!((low.magnitude_at(5000.0) - 1.0).abs() < 0.02);

        let high = BiquadFilter::high_shelf(48000.0, 8000.0, -6.0);
        let high_db = 20.0 * high.magnitude_at(20000.0).log10();
        assert!((high_db + 6.0).abs() < 0.5, "high shelf at 20 kHz: {high_db}");
        assert!((high.magnitude_at(200.0) - 1.0).abs() < 0.02);
    }

    #[test]
    fn corner_is_clamped_below_nyquist() {
        let f = BiquadFilter::lowpass(8000.0, 19000.0);
        assert!(f.frequency() < 4000.0);
        assert!(f.magnitude_at(100.0).is_finite());
    }

    #[test]
    fn stereo_channels_are_independent() {
        let mut f = StereoBiquad::new(BiquadFilter::highpass(48000.0, 300.0));
        let mut left = vec![1.0_f32; 2000];
        let mut right = vec![0.0_f32; 2000];
        f.process_block(&mut left, &mut right);
        assert!(right.iter().all(|&s| s == 0.0));
        assert!(left[1999].abs() < 0.01);
    }
}
