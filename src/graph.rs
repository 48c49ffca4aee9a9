//! Signal graph — the fixed-order processing chain built once per render.
//!
//! ```text
//! source ─ playback rate ─ highpass ─ lowpass ─ de-esser ─ [ring mod] ─ [drive]
//!   ─ low shelf ─ mid peak ─ high shelf ─ [vibrato] ─┬──────────────────┐
//!                       [backing vocals] ◄──────────┤                  │
//!                       [delay (feedback)] ◄────────┤                  ▼
//!                       [reverb (convolution)] ◄────┘        compressor (sum)
//!                                                      ─ panner ─ master gain ─ limiter
//! ```
//!
//! Bracketed stages exist only when their amount is non-zero. A stage that
//! is off is absent from the graph, not present at unity.

use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::buffer::PcmBuffer;
use crate::dsp::compressor::{Compressor, Limiter};
use crate::dsp::convolver::StereoConvolver;
use crate::dsp::delay::FeedbackDelay;
use crate::dsp::filter::{BiquadFilter, StereoBiquad};
use crate::dsp::impulse::{REVERB_DECAY_EXPONENT, generate_impulse_with_rng};
use crate::dsp::modulation::{ModulatedDelay, RingModulator};
use crate::dsp::panner::StereoPanner;
use crate::dsp::waveshaper::WaveShaper;
use crate::error::{EngineError, Result};
use crate::params::ParameterSet;

const DE_ESS_FREQ_HZ: f64 = 7000.0;
const BASS_SHELF_HZ: f64 = 200.0;
const MID_PEAK_HZ: f64 = 1500.0;
const AIR_SHELF_HZ: f64 = 8000.0;
const BACKING_HIGHPASS_HZ: f64 = 300.0;

/// Corner of the denoise highpass: 70 Hz rising to 270 Hz.
pub fn highpass_corner(denoise: f64) -> f64 {
    70.0 + 200.0 * denoise
}

/// Corner of the denoise lowpass: 19 kHz falling to 14 kHz.
pub fn lowpass_corner(denoise: f64) -> f64 {
    19000.0 - 5000.0 * denoise
}

// ============ Playback ============

/// Read `source` at `rate` into a stereo pair of `length` frames at
/// `output_rate`, resampling by linear interpolation.
///
/// Mono sources are duplicated to both channels; frames past the end of
/// the source are silent.
pub fn playback(source: &PcmBuffer, rate: f64, output_rate: u32, length: usize) -> (Vec<f32>, Vec<f32>) {
    let step = rate * source.sample_rate() as f64 / output_rate as f64;
    let right_index = source.channel_count() - 1;

    let mut left = Vec::with_capacity(length);
    let mut right = Vec::with_capacity(length);
    for n in 0..length {
        let pos = n as f64 * step;
        left.push(source.read_interpolated(0, pos));
        right.push(source.read_interpolated(right_index, pos));
    }
    (left, right)
}

/// Longest played duration a render or mix will allocate for.
pub const MAX_PLAYED_SECONDS: f64 = 2.0 * 60.0 * 60.0;

/// Frames needed to hold `source` played at `rate`, at `output_rate`.
///
/// Fails when the rate is unusable or the result exceeds
/// [`MAX_PLAYED_SECONDS`].
pub fn played_length(source: &PcmBuffer, rate: f64, output_rate: u32) -> Result<usize> {
    if !(rate.is_finite() && rate > 0.0) {
        return Err(EngineError::Render(format!("playback rate must be positive, got {rate}")));
    }
    let seconds = source.duration_secs() / rate;
    if !seconds.is_finite() || seconds > MAX_PLAYED_SECONDS {
        return Err(EngineError::Render(format!(
            "played duration {seconds} s exceeds {MAX_PLAYED_SECONDS} s"
        )));
    }
    Ok((seconds * output_rate as f64).ceil() as usize)
}

// ============ Stages ============

/// One serial stage of the dry chain.
#[derive(Debug)]
pub enum Stage {
    Highpass(StereoBiquad),
    Lowpass(StereoBiquad),
    DeEsser(StereoBiquad),
    RingMod(RingModulator),
    Drive(WaveShaper),
    LowShelf(StereoBiquad),
    MidPeak(StereoBiquad),
    HighShelf(StereoBiquad),
    Vibrato(ModulatedDelay),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Highpass(_) => "highpass",
            Stage::Lowpass(_) => "lowpass",
            Stage::DeEsser(_) => "de-esser",
            Stage::RingMod(_) => "ring-mod",
            Stage::Drive(_) => "drive",
            Stage::LowShelf(_) => "low-shelf",
            Stage::MidPeak(_) => "mid-peak",
            Stage::HighShelf(_) => "high-shelf",
            Stage::Vibrato(_) => "vibrato",
        }
    }

    fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        match self {
            Stage::Highpass(f)
            | Stage::Lowpass(f)
            | Stage::DeEsser(f)
            | Stage::LowShelf(f)
            | Stage::MidPeak(f)
            | Stage::HighShelf(f) => f.process_block(left, right),
            Stage::RingMod(rm) => rm.process_block(left, right),
            Stage::Drive(ws) => ws.process_block(left, right),
            Stage::Vibrato(d) => d.process_block(left, right),
        }
    }
}

/// A parallel branch fed from the end of the dry chain and summed into
/// the compressor input.
#[derive(Debug)]
pub enum Send {
    BackingVocals {
        doubler: ModulatedDelay,
        highpass: StereoBiquad,
        level: f32,
    },
    Delay {
        line: FeedbackDelay,
        level: f32,
    },
    Reverb {
        convolver: StereoConvolver,
        level: f32,
    },
}

impl Send {
    pub fn name(&self) -> &'static str {
        match self {
            Send::BackingVocals { .. } => "backing-vocals",
            Send::Delay { .. } => "delay",
            Send::Reverb { .. } => "reverb",
        }
    }

    pub fn level(&self) -> f32 {
        match self {
            Send::BackingVocals { level, .. } | Send::Delay { level, .. } | Send::Reverb { level, .. } => {
                *level
            }
        }
    }

    /// Run the branch over the dry signal and add its scaled output to the bus.
    fn mix_into(&mut self, dry_l: &[f32], dry_r: &[f32], bus_l: &mut [f32], bus_r: &mut [f32]) -> Result<()> {
        let mut wet_l = dry_l.to_vec();
        let mut wet_r = dry_r.to_vec();
        match self {
            Send::BackingVocals { doubler, highpass, .. } => {
                doubler.process_block(&mut wet_l, &mut wet_r);
                highpass.process_block(&mut wet_l, &mut wet_r);
            }
            Send::Delay { line, .. } => line.process_block(&mut wet_l, &mut wet_r),
            Send::Reverb { convolver, .. } => convolver.process_block(&mut wet_l, &mut wet_r)?,
        }

        let level = self.level();
        for (b, w) in bus_l.iter_mut().zip(&wet_l) {
            *b += w * level;
        }
        for (b, w) in bus_r.iter_mut().zip(&wet_r) {
            *b += w * level;
        }
        Ok(())
    }
}

// ============ Graph ============

/// A fully built processing chain for one render.
#[derive(Debug)]
pub struct SignalGraph {
    sample_rate: u32,
    playback_rate: f64,
    stages: Vec<Stage>,
    sends: Vec<Send>,
    compressor: Compressor,
    panner: StereoPanner,
    master_gain: f32,
    limiter: Limiter,
}

impl SignalGraph {
    /// Validate `params` and assemble the graph at `sample_rate`.
    ///
    /// `impulse_seed` fixes the reverb kernel's noise so renders are
    /// reproducible.
    pub fn build(params: &ParameterSet, sample_rate: u32, impulse_seed: u64) -> Result<Self> {
        params.validate()?;
        let sr = sample_rate as f64;

        let mut stages = vec![
            Stage::Highpass(StereoBiquad::new(BiquadFilter::highpass(sr, highpass_corner(params.denoise)))),
            Stage::Lowpass(StereoBiquad::new(BiquadFilter::lowpass(sr, lowpass_corner(params.denoise)))),
            Stage::DeEsser(StereoBiquad::new(BiquadFilter::peaking(
                sr,
                DE_ESS_FREQ_HZ,
                1.0 + params.de_ess,
                -12.0 * params.de_ess,
            ))),
        ];

        if params.ring_mod_amount > 0.0 {
            stages.push(Stage::RingMod(RingModulator::new(sr, params.ring_mod_amount)));
        }
        if params.drive > 0.0 {
            stages.push(Stage::Drive(WaveShaper::with_drive(params.drive)));
        }

        stages.push(Stage::LowShelf(StereoBiquad::new(BiquadFilter::low_shelf(
            sr,
            BASS_SHELF_HZ,
            params.eq_bass,
        ))));
        stages.push(Stage::MidPeak(StereoBiquad::new(BiquadFilter::peaking(
            sr,
            MID_PEAK_HZ,
            1.0,
            params.eq_mid,
        ))));
        stages.push(Stage::HighShelf(StereoBiquad::new(BiquadFilter::high_shelf(
            sr,
            AIR_SHELF_HZ,
            params.eq_air,
        ))));

        if params.vibrato_depth > 0.0 {
            stages.push(Stage::Vibrato(ModulatedDelay::vibrato(
                sr,
                params.vibrato_depth,
                params.effective_vibrato_rate(),
            )));
        }

        let mut sends = Vec::new();
        if params.backing_vocals_amount > 0.0 {
            sends.push(Send::BackingVocals {
                doubler: ModulatedDelay::doubler(sr),
                highpass: StereoBiquad::new(BiquadFilter::highpass(sr, BACKING_HIGHPASS_HZ)),
                level: params.backing_vocals_amount as f32,
            });
        }
        if params.delay_mix > 0.0 {
            sends.push(Send::Delay {
                line: FeedbackDelay::new(
                    sr,
                    params.effective_delay_time(),
                    params.effective_delay_feedback(),
                ),
                level: params.delay_mix as f32,
            });
        }
        let reverb_level = params.reverb_send_level();
        if reverb_level > 0.0 {
            let mut rng = StdRng::seed_from_u64(impulse_seed);
            let impulse = generate_impulse_with_rng(
                sample_rate,
                params.effective_reverb_decay(),
                REVERB_DECAY_EXPONENT,
                &mut rng,
            )?;
            sends.push(Send::Reverb {
                convolver: StereoConvolver::new(&impulse, true)?,
                level: reverb_level as f32,
            });
        }

        let graph = Self {
            sample_rate,
            playback_rate: params.playback_rate(),
            stages,
            sends,
            compressor: Compressor::vocal(sr),
            panner: StereoPanner::centered(),
            master_gain: 10.0_f64.powf(params.master_gain_db / 20.0) as f32,
            limiter: Limiter::master(sr),
        };
        debug!(
            "built graph: rate {:.4}, stages {:?}, sends {:?}",
            graph.playback_rate,
            graph.stage_names(),
            graph.send_names()
        );
        Ok(graph)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn sends(&self) -> &[Send] {
        &self.sends
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).collect()
    }

    pub fn send_names(&self) -> Vec<&'static str> {
        self.sends.iter().map(Send::name).collect()
    }

    pub fn has_stage(&self, name: &str) -> bool {
        self.stages.iter().any(|s| s.name() == name)
    }

    /// Limiter ceiling as a linear amplitude.
    pub fn ceiling(&self) -> f32 {
        self.limiter.ceiling()
    }

    /// Process an already played-back stereo signal in place.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) -> Result<()> {
        for stage in &mut self.stages {
            stage.process_block(left, right);
        }

        if !self.sends.is_empty() {
            let dry_l = left.to_vec();
            let dry_r = right.to_vec();
            for send in &mut self.sends {
                send.mix_into(&dry_l, &dry_r, left, right)?;
            }
        }

        self.compressor.process_block(left, right);
        self.panner.process_block(left, right);
        for s in left.iter_mut().chain(right.iter_mut()) {
            *s *= self.master_gain;
        }
        self.limiter.process_block(left, right);
        Ok(())
    }

    /// Pull `source` through the graph into a stereo buffer of `length` frames.
    pub fn run(&mut self, source: &PcmBuffer, length: usize) -> Result<PcmBuffer> {
        let (mut left, mut right) = playback(source, self.playback_rate, self.sample_rate, length);
        self.process(&mut left, &mut right)?;
        PcmBuffer::stereo(left, right, self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::impulse::DEFAULT_IMPULSE_SEED;

    fn build(params: &ParameterSet) -> SignalGraph {
        SignalGraph::build(params, 48000, DEFAULT_IMPULSE_SEED).unwrap()
    }

    #[test]
    fn neutral_graph_has_only_fixed_stages() {
        let graph = build(&ParameterSet::neutral());
        assert_eq!(
            graph.stage_names(),
            vec!["highpass", "lowpass", "de-esser", "low-shelf", "mid-peak", "high-shelf"]
        );
        assert!(graph.sends().is_empty());
    }

    #[test]
    fn all_optional_stages_in_order() {
        let params = ParameterSet {
            ring_mod_amount: 0.5,
            drive: 0.3,
            vibrato_depth: 2.0,
            backing_vocals_amount: 0.4,
            delay_mix: 0.3,
            reverb_mix: 0.2,
            ..ParameterSet::default()
        };
        let graph = build(&params);
        assert_eq!(
            graph.stage_names(),
            vec![
                "highpass",
                "lowpass",
                "de-esser",
                "ring-mod",
                "drive",
                "low-shelf",
                "mid-peak",
                "high-shelf",
                "vibrato"
            ]
        );
        assert_eq!(graph.send_names(), vec!["backing-vocals", "delay", "reverb"]);
    }

    #[test]
    fn unset_delay_feedback_still_repeats() {
        let params = ParameterSet {
            delay_mix: 1.0,
            delay_time_sec: 0.1,
            delay_feedback: 0.0,
            ..ParameterSet::neutral()
        };
        let mut graph = build(&params);
        match &graph.sends()[0] {
            Send::Delay { line, .. } => assert!((line.feedback - 0.3).abs() < 1e-6),
            other => panic!("expected a delay send, got {other:?}"),
        }

        let mut left = vec![0.0_f32; 12000];
        left[0] = 0.5;
        let mut right = left.clone();
        graph.process(&mut left, &mut right).unwrap();
        let peak = |range: std::ops::Range<usize>| left[range].iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        let first = peak(4700..5000);
        let second = peak(9500..9800);
        assert!(first > 0.01, "first echo missing: {first}");
        assert!(second > 0.05 * first, "second echo {second} vs first {first}");
    }

    #[test]
    fn drive_stage_only_when_positive() {
        let mut params = ParameterSet::neutral();
        assert!(!build(&params).has_stage("drive"));
        params.drive = 0.01;
        assert!(build(&params).has_stage("drive"));
    }

    #[test]
    fn reverb_send_needs_both_mix_and_output_gain() {
        let mut params = ParameterSet::neutral();
        params.reverb_mix = 0.5;
        params.reverb_output_gain = 0.0;
        assert!(build(&params).sends().is_empty());
        params.reverb_output_gain = 2.0;
        let graph = build(&params);
        assert_eq!(graph.send_names(), vec!["reverb"]);
        assert!((graph.sends()[0].level() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn denoise_moves_filter_corners() {
        let params = ParameterSet {
            denoise: 1.0,
            ..ParameterSet::neutral()
        };
        let graph = build(&params);
        match (&graph.stages()[0], &graph.stages()[1]) {
            (Stage::Highpass(hp), Stage::Lowpass(lp)) => {
                assert!((hp.filter().frequency() - 270.0).abs() < 1e-9);
                assert!((lp.filter().frequency() - 14000.0).abs() < 1e-9);
            }
            other => panic!("unexpected leading stages {other:?}"),
        }
    }

    #[test]
    fn invalid_feedback_fails_before_building() {
        let params = ParameterSet {
            delay_mix: 0.5,
            delay_feedback: 1.0,
            ..ParameterSet::default()
        };
        assert!(SignalGraph::build(&params, 48000, DEFAULT_IMPULSE_SEED).is_err());
    }

    #[test]
    fn playback_resamples_and_upmixes() {
        let source = PcmBuffer::mono((0..100).map(|i| i as f32 / 100.0).collect(), 24000).unwrap();
        let (left, right) = playback(&source, 1.0, 48000, 202);
        assert_eq!(left, right);
        // Half-step reads land between source frames
        assert!((left[1] - 0.005).abs() < 1e-6);
        assert!((left[2] - 0.01).abs() < 1e-6);
        // Past the end is silence
        assert_eq!(left[201], 0.0);
    }

    #[test]
    fn played_length_scales_with_rate() {
        let source = PcmBuffer::mono(vec![0.0; 44100], 44100).unwrap();
        assert_eq!(played_length(&source, 1.0, 48000).unwrap(), 48000);
        assert_eq!(played_length(&source, 2.0, 48000).unwrap(), 24000);
        assert_eq!(played_length(&source, 0.5, 48000).unwrap(), 96000);
    }

    #[test]
    fn played_length_rejects_degenerate_rates() {
        let source = PcmBuffer::mono(vec![0.0; 44100], 44100).unwrap();
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e-12] {
            assert!(
                matches!(played_length(&source, rate, 48000), Err(EngineError::Render(_))),
                "rate {rate} should be rejected"
            );
        }
    }

    #[test]
    fn output_respects_limiter_ceiling() {
        let params = ParameterSet {
            master_gain_db: 24.0,
            drive: 1.0,
            ..ParameterSet::neutral()
        };
        let mut graph = build(&params);
        let source = PcmBuffer::mono(
            (0..48000)
                .map(|i| (2.0 * std::f64::consts::PI * 220.0 * i as f64 / 48000.0).sin() as f32)
                .collect(),
            48000,
        )
        .unwrap();
        let ceiling = graph.ceiling();
        let out = graph.run(&source, 48000).unwrap();
        assert!(out.peak() <= ceiling, "peak {} above ceiling {ceiling}", out.peak());
    }
}
