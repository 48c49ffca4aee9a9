//! Drive/saturation — static soft-clip curve applied at 4× oversampling.

use std::f64::consts::PI;

/// Number of points in a generated drive curve.
pub const DRIVE_CURVE_POINTS: usize = 44100;

/// Generate the soft-clipping transfer table for a drive `amount` in 0..1.
///
/// `y = (3 + k)·x·c / (π + k·|x|)` with `k = 100·amount` and `c = 20°`.
/// Index `i` maps to input `x = 2i/N - 1`.
pub fn generate_drive_curve(amount: f64) -> Vec<f32> {
    let k = amount.max(0.0) * 100.0;
    let c = 20.0 * PI / 180.0;
    (0..DRIVE_CURVE_POINTS)
        .map(|i| {
            let x = (i as f64 * 2.0) / DRIVE_CURVE_POINTS as f64 - 1.0;
            ((3.0 + k) * x * c / (PI + k * x.abs())) as f32
        })
        .collect()
}

/// Look `x` up in `curve`, interpolating between neighbouring points.
///
/// Inputs outside [-1, 1] take the end values.
#[inline]
fn shape(curve: &[f32], x: f32) -> f32 {
    let n = curve.len();
    let v = (n - 1) as f32 * 0.5 * (x + 1.0);
    if v <= 0.0 {
        return curve[0];
    }
    if v >= (n - 1) as f32 {
        return curve[n - 1];
    }
    let idx = v as usize;
    let frac = v - idx as f32;
    curve[idx] + (curve[idx + 1] - curve[idx]) * frac
}

// Half-band lowpass, 15 taps. Odd-offset taps sum to 0.5 so each
// polyphase branch has unity DC gain.
const HALFBAND_TAPS: usize = 15;
const HALFBAND_COEFFS: [f32; HALFBAND_TAPS] = [
    -0.002673,
    0.0,
    0.018774,
    0.0,
    -0.078034,
    0.0,
    0.311933,
    0.5,
    0.311933,
    0.0,
    -0.078034,
    0.0,
    0.018774,
    0.0,
    -0.002673,
];

/// FIR history for one half-band stage.
#[derive(Debug, Clone, Default)]
struct HalfBand {
    state: [f32; HALFBAND_TAPS],
}

impl HalfBand {
    #[inline]
    fn push(&mut self, x: f32) -> f32 {
        self.state.copy_within(0..HALFBAND_TAPS - 1, 1);
        self.state[0] = x;
        self.state
            .iter()
            .zip(HALFBAND_COEFFS.iter())
            .map(|(s, c)| s * c)
            .sum()
    }

    /// 1 sample in, 2 samples out (zero-stuff then filter, gain 2).
    #[inline]
    fn upsample(&mut self, x: f32) -> [f32; 2] {
        [self.push(x) * 2.0, self.push(0.0) * 2.0]
    }

    /// 2 samples in, 1 sample out.
    #[inline]
    fn downsample(&mut self, a: f32, b: f32) -> f32 {
        self.push(a);
        self.push(b)
    }
}

/// One channel's waveshaper with two cascaded 2× half-band stages.
#[derive(Debug, Clone)]
struct OversampledShaper {
    up1: HalfBand,
    up2: HalfBand,
    down2: HalfBand,
    down1: HalfBand,
}

impl OversampledShaper {
    fn new() -> Self {
        Self {
            up1: HalfBand::default(),
            up2: HalfBand::default(),
            down2: HalfBand::default(),
            down1: HalfBand::default(),
        }
    }

    #[inline]
    fn process(&mut self, curve: &[f32], x: f32) -> f32 {
        let [a, b] = self.up1.upsample(x);
        let [a0, a1] = self.up2.upsample(a);
        let [b0, b1] = self.up2.upsample(b);
        let s = [shape(curve, a0), shape(curve, a1), shape(curve, b0), shape(curve, b1)];
        let d0 = self.down2.downsample(s[0], s[1]);
        let d1 = self.down2.downsample(s[2], s[3]);
        self.down1.downsample(d0, d1)
    }
}

/// Stereo waveshaper stage running its curve at 4× the graph rate.
#[derive(Debug, Clone)]
pub struct WaveShaper {
    curve: Vec<f32>,
    left: OversampledShaper,
    right: OversampledShaper,
}

impl WaveShaper {
    pub fn new(curve: Vec<f32>) -> Self {
        Self {
            curve,
            left: OversampledShaper::new(),
            right: OversampledShaper::new(),
        }
    }

    /// Shaper for a drive amount; callers omit the stage when `amount == 0`.
    pub fn with_drive(amount: f64) -> Self {
        Self::new(generate_drive_curve(amount))
    }

    pub fn curve(&self) -> &[f32] {
        &self.curve
    }

    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        for s in left.iter_mut() {
            *s = self.left.process(&self.curve, *s);
        }
        for s in right.iter_mut() {
            *s = self.right.process(&self.curve, *s);
        }
    }
}
