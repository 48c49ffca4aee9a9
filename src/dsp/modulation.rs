//! Modulation effects — LFO-swept delay lines (vibrato, doubling) and the
//! ring modulator.
//!
//! Both delay users share [`ModulatedDelay`]: the delay time follows
//! `base + depth · sin(2π·rate·t)` and is read back with linear
//! interpolation, so the sweep produces a smooth pitch wobble.

use super::oscillator::SineOscillator;

/// Largest delay a modulated line can reach, in seconds.
const MAX_MODULATED_DELAY: f64 = 1.0;

/// A stereo delay line whose delay time is swept by a sine LFO.
#[derive(Debug, Clone)]
pub struct ModulatedDelay {
    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,
    sample_rate: f64,
    lfo: SineOscillator,

    /// Centre delay in seconds.
    pub base_delay: f64,
    /// Peak deviation of the delay in seconds.
    pub depth: f64,
}

impl ModulatedDelay {
    pub fn new(sample_rate: f64, base_delay: f64, depth: f64, rate: f64) -> Self {
        let buffer_size = (sample_rate * MAX_MODULATED_DELAY) as usize + 2;
        Self {
            buffer_l: vec![0.0; buffer_size],
            buffer_r: vec![0.0; buffer_size],
            write_pos: 0,
            sample_rate,
            lfo: SineOscillator::new(rate, sample_rate),
            base_delay,
            depth,
        }
    }

    /// Vibrato: ~5 ms line swept by `0.003 · depth` seconds at `rate` Hz.
    pub fn vibrato(sample_rate: f64, depth: f64, rate: f64) -> Self {
        Self::new(sample_rate, 0.005, depth * 0.003, rate)
    }

    /// Doubler for the backing-vocal send: 25 ms, slow 0.5 Hz drift of 2 ms.
    pub fn doubler(sample_rate: f64) -> Self {
        Self::new(sample_rate, 0.025, 0.002, 0.5)
    }

    /// Read from the delay buffer with fractional (linear interpolation) delay.
    #[inline]
    fn read_interpolated(buffer: &[f32], write_pos: usize, delay_samples: f64) -> f32 {
        let buffer_len = buffer.len();
        let delay_int = delay_samples as usize;
        let frac = (delay_samples - delay_int as f64) as f32;

        let read_pos_0 = (write_pos + buffer_len - delay_int) % buffer_len;
        let read_pos_1 = (read_pos_0 + buffer_len - 1) % buffer_len;

        let s0 = buffer[read_pos_0];
        let s1 = buffer[read_pos_1];

        s0 + frac * (s1 - s0)
    }

    /// Process a stereo sample pair, returning the delayed output.
    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let buffer_len = self.buffer_l.len();

        self.buffer_l[self.write_pos] = left;
        self.buffer_r[self.write_pos] = right;

        let lfo = self.lfo.next_sample();
        let max_delay = (buffer_len - 2) as f64;
        let delay = ((self.base_delay + self.depth * lfo) * self.sample_rate).clamp(0.0, max_delay);

        let out_l = Self::read_interpolated(&self.buffer_l, self.write_pos, delay);
        let out_r = Self::read_interpolated(&self.buffer_r, self.write_pos, delay);

        self.write_pos = (self.write_pos + 1) % buffer_len;

        (out_l, out_r)
    }

    /// Process a block of stereo audio in-place.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        for i in 0..left.len().min(right.len()) {
            let (out_l, out_r) = self.process(left[i], right[i]);
            left[i] = out_l;
            right[i] = out_r;
        }
    }
}

/// Ring modulator: dry path plus the signal multiplied by a sine carrier.
///
/// `out = x·(1 − amount/2) + x·sin(2π·f·t)·amount`
#[derive(Debug, Clone)]
pub struct RingModulator {
    carrier: SineOscillator,
    dry_gain: f32,
    wet_gain: f32,
}

/// Carrier frequency for the "robot" timbre.
pub const RING_CARRIER_HZ: f64 = 30.0;

impl RingModulator {
    pub fn new(sample_rate: f64, amount: f64) -> Self {
        Self {
            carrier: SineOscillator::new(RING_CARRIER_HZ, sample_rate),
            dry_gain: (1.0 - amount * 0.5) as f32,
            wet_gain: amount as f32,
        }
    }

    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        for i in 0..left.len().min(right.len()) {
            let c = self.carrier.next_sample() as f32;
            left[i] = left[i] * self.dry_gain + left[i] * c * self.wet_gain;
            right[i] = right[i] * self.dry_gain + right[i] * c * self.wet_gain;
        }
    }
}
