//! Dynamics — feed-forward compressor and brick-wall limiter.
//!
//! The gain computer follows the WebAudio DynamicsCompressorNode: soft
//! knee centred on the threshold, peak envelope on `max(|L|, |R|)`, and an
//! optional automatic makeup gain of `-0.6 ×` the gain change a 0 dBFS
//! signal would receive.

/// Operating point of a compressor or limiter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicsSettings {
    /// Threshold in dB.
    pub threshold_db: f64,
    /// Compression ratio (e.g., 4.0 = 4:1 compression).
    pub ratio: f64,
    /// Knee width in dB (0 = hard knee).
    pub knee_db: f64,
    /// Attack time in seconds.
    pub attack_sec: f64,
    /// Release time in seconds.
    pub release_sec: f64,
}

impl DynamicsSettings {
    /// Vocal bus compressor of the render graph.
    pub const VOCAL: Self = Self {
        threshold_db: -24.0,
        ratio: 3.0,
        knee_db: 30.0,
        attack_sec: 0.010,
        release_sec: 0.250,
    };

    /// Final limiter of the render graph.
    pub const MASTER_LIMITER: Self = Self {
        threshold_db: -1.0,
        ratio: 20.0,
        knee_db: 0.0,
        attack_sec: 0.001,
        release_sec: 0.100,
    };

    /// Summing-bus limiter of the remix mixer.
    pub const MIX_BUS_LIMITER: Self = Self {
        threshold_db: -2.0,
        ratio: 10.0,
        knee_db: 30.0,
        attack_sec: 0.003,
        release_sec: 0.250,
    };

    /// Static gain change in dB (≤ 0) for a given input level.
    pub fn gain_change_db(&self, input_db: f64) -> f64 {
        let slope = 1.0 - 1.0 / self.ratio;
        let over = input_db - self.threshold_db;
        let half_knee = self.knee_db / 2.0;

        if self.knee_db <= 0.0 || over >= half_knee {
            (-over * slope).min(0.0)
        } else if over <= -half_knee {
            0.0
        } else {
            // Quadratic blend across the knee
            let x = over + half_knee;
            -slope * x * x / (2.0 * self.knee_db)
        }
    }

    /// Makeup that leaves a full-scale signal with 40% of its reduction.
    pub fn auto_makeup_db(&self) -> f64 {
        -0.6 * self.gain_change_db(0.0)
    }

    /// Keep every field in a range the envelope maths can handle.
    fn sanitized(self) -> Self {
        Self {
            threshold_db: self.threshold_db.clamp(-60.0, 0.0),
            ratio: self.ratio.clamp(1.0, 20.0),
            knee_db: self.knee_db.clamp(0.0, 40.0),
            attack_sec: self.attack_sec.clamp(0.0001, 1.0),
            release_sec: self.release_sec.clamp(0.001, 5.0),
        }
    }
}

#[inline]
fn linear_to_db(linear: f64) -> f64 {
    if linear <= 0.0 { -120.0 } else { 20.0 * linear.log10() }
}

#[inline]
fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// One-pole smoothing coefficient for a time constant.
#[inline]
fn time_coef(seconds: f64, sample_rate: f64) -> f64 {
    (-1.0 / (seconds * sample_rate)).exp()
}

/// A stereo dynamics compressor with a linked peak detector.
#[derive(Debug, Clone)]
pub struct Compressor {
    settings: DynamicsSettings,
    makeup_db: f64,
    attack_coef: f64,
    release_coef: f64,
    envelope: f64,
}

impl Compressor {
    pub fn new(sample_rate: f64, settings: DynamicsSettings) -> Self {
        let settings = settings.sanitized();
        Self {
            settings,
            makeup_db: 0.0,
            attack_coef: time_coef(settings.attack_sec, sample_rate),
            release_coef: time_coef(settings.release_sec, sample_rate),
            envelope: 0.0,
        }
    }

    pub fn with_auto_makeup(mut self) -> Self {
        self.makeup_db = self.settings.auto_makeup_db();
        self
    }

    /// Vocal bus compressor with automatic makeup.
    pub fn vocal(sample_rate: f64) -> Self {
        Self::new(sample_rate, DynamicsSettings::VOCAL).with_auto_makeup()
    }

    pub fn settings(&self) -> &DynamicsSettings {
        &self.settings
    }

    pub fn makeup_db(&self) -> f64 {
        self.makeup_db
    }

    /// Current gain reduction in dB, positive when compressing.
    pub fn gain_reduction_db(&self) -> f64 {
        -self.settings.gain_change_db(linear_to_db(self.envelope))
    }

    /// Process a stereo sample pair.
    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let level = left.abs().max(right.abs()) as f64;
        let coef = if level > self.envelope {
            self.attack_coef
        } else {
            self.release_coef
        };
        self.envelope = coef * self.envelope + (1.0 - coef) * level;

        let gain_db = self.settings.gain_change_db(linear_to_db(self.envelope)) + self.makeup_db;
        let gain = db_to_linear(gain_db) as f32;
        (left * gain, right * gain)
    }

    /// Process a block of stereo audio in-place.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            (*l, *r) = self.process(*l, *r);
        }
    }
}

/// A fast, high-ratio compressor followed by a hard clamp at the threshold,
/// so no output sample ever exceeds the ceiling.
#[derive(Debug, Clone)]
pub struct Limiter {
    compressor: Compressor,
    ceiling: f32,
}

impl Limiter {
    pub fn new(sample_rate: f64, settings: DynamicsSettings) -> Self {
        let compressor = Compressor::new(sample_rate, settings);
        let ceiling = db_to_linear(compressor.settings().threshold_db) as f32;
        Self { compressor, ceiling }
    }

    /// Final limiter of a render: -1 dB, 20:1.
    pub fn master(sample_rate: f64) -> Self {
        Self::new(sample_rate, DynamicsSettings::MASTER_LIMITER)
    }

    /// Linear output ceiling.
    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.compressor.process_block(left, right);
        let c = self.ceiling;
        for s in left.iter_mut().chain(right.iter_mut()) {
            *s = s.clamp(-c, c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(threshold_db: f64, ratio: f64, attack_sec: f64, release_sec: f64) -> DynamicsSettings {
        DynamicsSettings {
            threshold_db,
            ratio,
            knee_db: 0.0,
            attack_sec,
            release_sec,
        }
    }

    #[test]
    fn quiet_signal_passes_unchanged() {
        let mut comp = Compressor::new(44100.0, settings(-20.0, 4.0, 0.001, 0.1));
        for _ in 0..1000 {
            comp.process(0.05, 0.05); // -26 dB
        }
        let (out_l, out_r) = comp.process(0.05, 0.05);
        assert!((out_l - 0.05).abs() < 1e-4, "got {out_l}");
        assert!((out_r - 0.05).abs() < 1e-4);
        assert_eq!(comp.gain_reduction_db(), 0.0);
    }

    #[test]
    fn loud_signal_follows_the_ratio() {
        let mut comp = Compressor::new(44100.0, settings(-12.0, 4.0, 0.001, 0.1));
        for _ in 0..5000 {
            comp.process(1.0, 1.0);
        }
        let (out_l, _) = comp.process(1.0, 1.0);
        // 12 dB over at 4:1 leaves 3 dB over: -9 dB
        assert!((out_l - db_to_linear(-9.0) as f32).abs() < 0.01, "got {out_l}");
        assert!((comp.gain_reduction_db() - 9.0).abs() < 0.1);
    }

    #[test]
    fn attack_takes_time() {
        let mut comp = Compressor::new(44100.0, settings(-20.0, 10.0, 0.01, 0.5));
        let (first, _) = comp.process(1.0, 1.0);
        for _ in 0..500 {
            comp.process(1.0, 1.0);
        }
        let (later, _) = comp.process(1.0, 1.0);
        assert!(first > later, "first={first}, later={later}");
    }

    #[test]
    fn release_recovers_gain() {
        let mut comp = Compressor::new(44100.0, settings(-20.0, 10.0, 0.001, 0.05));
        for _ in 0..1000 {
            comp.process(1.0, 1.0);
        }
        let (compressed, _) = comp.process(0.1, 0.1);
        for _ in 0..5000 {
            comp.process(0.1, 0.1);
        }
        let (released, _) = comp.process(0.1, 0.1);
        assert!(released > compressed, "compressed={compressed}, released={released}");
    }

    #[test]
    fn knee_is_continuous() {
        let s = DynamicsSettings::VOCAL;
        let start = s.threshold_db - s.knee_db / 2.0;
        let end = s.threshold_db + s.knee_db / 2.0;
        assert!(s.gain_change_db(start - 1e-9).abs() < 1e-6);
        assert!(s.gain_change_db(start + 1e-9).abs() < 1e-6);
        assert!((s.gain_change_db(end - 1e-9) - s.gain_change_db(end + 1e-9)).abs() < 1e-6);
    }

    #[test]
    fn auto_makeup_matches_full_scale_reduction() {
        let comp = Compressor::vocal(48000.0);
        // 0 dBFS is past the knee: (-24 - 0) · (1 - 1/3) = -16 dB
        assert!((DynamicsSettings::VOCAL.gain_change_db(0.0) + 16.0).abs() < 1e-9);
        assert!((comp.makeup_db() - 9.6).abs() < 1e-9);
    }

    #[test]
    fn quiet_signal_is_lifted_by_makeup() {
        let mut comp = Compressor::vocal(48000.0);
        for _ in 0..48000 {
            comp.process(0.001, 0.001);
        }
        let (out, _) = comp.process(0.001, 0.001);
        // -60 dB input sits below the knee, so only makeup applies
        assert!((out / 0.001 - 10f32.powf(9.6 / 20.0)).abs() < 0.01);
    }

    #[test]
    fn limiter_never_exceeds_ceiling() {
        let mut lim = Limiter::master(48000.0);
        let mut left: Vec<f32> = (0..4800).map(|i| if i % 2 == 0 { 4.0 } else { -4.0 }).collect();
        let mut right = vec![2.0_f32; 4800];
        lim.process_block(&mut left, &mut right);
        let ceiling = 10f32.powf(-1.0 / 20.0);
        assert!((lim.ceiling() - ceiling).abs() < 1e-6);
        assert!(left.iter().chain(&right).all(|s| s.abs() <= ceiling));
    }

    #[test]
    fn bus_limiter_leaves_quiet_signal_alone() {
        let mut lim = Limiter::new(44100.0, DynamicsSettings::MIX_BUS_LIMITER);
        let mut left = vec![0.01_f32; 1000];
        let mut right = vec![-0.01_f32; 1000];
        lim.process_block(&mut left, &mut right);
        assert!((left[999] - 0.01).abs() < 1e-4);
        assert!((right[999] + 0.01).abs() < 1e-4);
    }
}
