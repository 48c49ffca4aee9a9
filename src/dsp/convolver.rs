//! Convolution engine for the reverb send.
//!
//! - Direct time-domain convolution for short kernels
//! - Uniform overlap-add over RealFFT for long kernels
//! - Stereo kernel, channel i convolved with kernel channel i
//! - Kernel power normalization matching WebAudio's ConvolverNode

use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::buffer::PcmBuffer;
use crate::error::{EngineError, Result};

/// Kernels up to this length are convolved directly.
const DIRECT_MAX_TAPS: usize = 64;

/// Smallest FFT block, keeps overhead low for mid-length kernels.
const MIN_BLOCK_SIZE: usize = 1024;

// ============ Normalization ============

/// -58 dB, the calibration gain WebAudio applies to normalized kernels.
const GAIN_CALIBRATION: f64 = 0.00125;
const GAIN_CALIBRATION_SAMPLE_RATE: f64 = 44100.0;
const MIN_POWER: f64 = 0.000125;

/// Scale factor that brings a kernel to the calibrated loudness.
pub fn normalization_scale(kernel: &PcmBuffer) -> f64 {
    let sum_squares: f64 = kernel
        .channels()
        .iter()
        .flat_map(|c| c.iter())
        .map(|&s| (s as f64) * (s as f64))
        .sum();
    let count = (kernel.channel_count() * kernel.len()).max(1) as f64;
    let mut power = (sum_squares / count).sqrt();
    if !power.is_finite() || power < MIN_POWER {
        power = MIN_POWER;
    }
    GAIN_CALIBRATION / power * (GAIN_CALIBRATION_SAMPLE_RATE / kernel.sample_rate() as f64)
}

// ============ Mono Convolver ============

enum Engine {
    Direct(Vec<f64>),
    Fft {
        block_size: usize,
        fft_size: usize,
        kernel_spectrum: Vec<Complex<f64>>,
        forward: Arc<dyn RealToComplex<f64>>,
        inverse: Arc<dyn ComplexToReal<f64>>,
    },
}

/// Single-channel linear convolution against a fixed kernel.
pub struct Convolver {
    engine: Engine,
    kernel_len: usize,
}

impl std::fmt::Debug for Convolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.engine {
            Engine::Direct(_) => "direct",
            Engine::Fft { .. } => "fft",
        };
        f.debug_struct("Convolver")
            .field("mode", &mode)
            .field("kernel_len", &self.kernel_len)
            .finish()
    }
}

fn fft_error(e: impl std::fmt::Display) -> EngineError {
    EngineError::Render(format!("convolution FFT failed: {e}"))
}

impl Convolver {
    /// Prepare a convolver for `kernel`, pre-scaled by `scale`.
    pub fn new(kernel: &[f32], scale: f64) -> Result<Self> {
        if kernel.is_empty() {
            return Err(EngineError::GraphConstruction("empty convolution kernel".into()));
        }
        let scaled: Vec<f64> = kernel.iter().map(|&s| s as f64 * scale).collect();
        let kernel_len = scaled.len();

        if kernel_len <= DIRECT_MAX_TAPS {
            return Ok(Self {
                engine: Engine::Direct(scaled),
                kernel_len,
            });
        }

        let block_size = kernel_len.next_power_of_two().max(MIN_BLOCK_SIZE);
        let fft_size = block_size * 2;

        let mut planner = RealFftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);

        let mut padded = forward.make_input_vec();
        padded[..kernel_len].copy_from_slice(&scaled);
        let mut kernel_spectrum = forward.make_output_vec();
        forward
            .process(&mut padded, &mut kernel_spectrum)
            .map_err(fft_error)?;

        Ok(Self {
            engine: Engine::Fft {
                block_size,
                fft_size,
                kernel_spectrum,
                forward,
                inverse,
            },
            kernel_len,
        })
    }

    pub fn kernel_len(&self) -> usize {
        self.kernel_len
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.engine, Engine::Direct(_))
    }

    /// The first `output_len` samples of `input * kernel`.
    pub fn convolve(&self, input: &[f32], output_len: usize) -> Result<Vec<f32>> {
        match &self.engine {
            Engine::Direct(kernel) => Ok(convolve_direct(kernel, input, output_len)),
            Engine::Fft {
                block_size,
                fft_size,
                kernel_spectrum,
                forward,
                inverse,
            } => {
                let mut acc = vec![0.0_f64; output_len + fft_size];
                let mut time = forward.make_input_vec();
                let mut spectrum = forward.make_output_vec();
                let norm = 1.0 / *fft_size as f64;

                for (block_idx, block) in input.chunks(*block_size).enumerate() {
                    let start = block_idx * block_size;
                    if start >= output_len {
                        break;
                    }

                    time.fill(0.0);
                    for (t, &s) in time.iter_mut().zip(block) {
                        *t = s as f64;
                    }
                    forward.process(&mut time, &mut spectrum).map_err(fft_error)?;

                    for (s, k) in spectrum.iter_mut().zip(kernel_spectrum) {
                        *s *= k;
                    }
                    // DC and Nyquist bins of a real signal are real.
                    if let Some(first) = spectrum.first_mut() {
                        first.im = 0.0;
                    }
                    if let Some(last) = spectrum.last_mut() {
                        last.im = 0.0;
                    }

                    inverse.process(&mut spectrum, &mut time).map_err(fft_error)?;

                    for (a, &t) in acc[start..start + fft_size].iter_mut().zip(time.iter()) {
                        *a += t * norm;
                    }
                }

                acc.truncate(output_len);
                Ok(acc.into_iter().map(|s| s as f32).collect())
            }
        }
    }
}

fn convolve_direct(kernel: &[f64], input: &[f32], output_len: usize) -> Vec<f32> {
    (0..output_len)
        .map(|n| {
            let mut sum = 0.0;
            for (k, &h) in kernel.iter().enumerate() {
                if k > n {
                    break;
                }
                if let Some(&x) = input.get(n - k) {
                    sum += h * x as f64;
                }
            }
            sum as f32
        })
        .collect()
}

// ============ Stereo Convolver ============

/// Convolution reverb over a stereo impulse response.
#[derive(Debug)]
pub struct StereoConvolver {
    left: Convolver,
    right: Convolver,
}

impl StereoConvolver {
    /// Build from an impulse response. A mono IR feeds both channels.
    pub fn new(impulse: &PcmBuffer, normalize: bool) -> Result<Self> {
        let scale = if normalize {
            normalization_scale(impulse)
        } else {
            1.0
        };
        let left = Convolver::new(impulse.channel(0), scale)?;
        let right_ir = impulse.channel(impulse.channel_count() - 1);
        let right = Convolver::new(right_ir, scale)?;
        Ok(Self { left, right })
    }

    /// Replace the block with its convolution (length preserved).
    pub fn process_block(&self, left: &mut [f32], right: &mut [f32]) -> Result<()> {
        let wet_l = self.left.convolve(left, left.len())?;
        let wet_r = self.right.convolve(right, right.len())?;
        left.copy_from_slice(&wet_l);
        right.copy_from_slice(&wet_r);
        Ok(())
    }
}
