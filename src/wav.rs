//! WAV I/O — 16-bit PCM encoding of rendered buffers, decoding of sources,
//! and the caller-facing export labels.

use std::fmt;
use std::io::Cursor;

use hound::{SampleFormat, WavReader};
use log::warn;

use crate::buffer::PcmBuffer;
use crate::error::{EngineError, Result};

/// Quantize one float sample to 16 bits, clipping to [-1, 1] first and
/// rounding to the nearest step.
#[inline]
pub fn quantize(sample: f32) -> i16 {
    let v = sample.clamp(-1.0, 1.0);
    if v < 0.0 {
        (v * 32768.0).round() as i16
    } else {
        (v * 32767.0).round() as i16
    }
}

/// Inverse of [`quantize`], generalized to any integer bit depth.
#[inline]
fn dequantize(value: i32, bits: u16) -> f32 {
    let negative_full_scale = (1u64 << (bits - 1)) as f64;
    let v = value as f64;
    if v < 0.0 {
        (v / negative_full_scale) as f32
    } else {
        (v / (negative_full_scale - 1.0).max(1.0)) as f32
    }
}

/// Encode a buffer as a 16-bit PCM WAV file (44-byte header, interleaved).
pub fn encode_wav(buffer: &PcmBuffer) -> Vec<u8> {
    let channels = buffer.channel_count() as u16;
    let sample_rate = buffer.sample_rate();
    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = channels * (bits_per_sample / 8);
    let data_size = (buffer.len() * channels as usize * 2) as u32;
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(44 + data_size as usize);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for frame in 0..buffer.len() {
        for ch in buffer.channels() {
            buf.extend_from_slice(&quantize(ch[frame]).to_le_bytes());
        }
    }

    buf
}

/// Decode a WAV file (integer or float samples, mono or stereo).
pub fn decode_wav(bytes: &[u8]) -> Result<PcmBuffer> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(EngineError::Decode(format!(
                    "unsupported bit depth {}",
                    spec.bits_per_sample
                )));
            }
            let bits = spec.bits_per_sample;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| dequantize(v, bits)))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    PcmBuffer::from_interleaved(&samples, spec.channels as usize, spec.sample_rate)
}

// ============ Export ============

/// Requested export format.
///
/// Only lossless output is produced; a compressed request is accepted and
/// yields the same WAV bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Lossless,
    Compressed { kbps: u32 },
}

impl ExportFormat {
    /// Parse a caller label: `"HQ"`, `"wav"` or `"lossless"`, or `"<n>k"`.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        match label.to_ascii_lowercase().as_str() {
            "hq" | "wav" | "lossless" => Some(ExportFormat::Lossless),
            other => other
                .strip_suffix('k')
                .and_then(|n| n.parse::<u32>().ok())
                .filter(|&kbps| kbps > 0)
                .map(|kbps| ExportFormat::Compressed { kbps }),
        }
    }

    pub fn label(&self) -> String {
        self.to_string()
    }

    /// Suggested download name for this export.
    pub fn file_name(&self) -> String {
        format!("RaiWave_{self}.wav")
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Lossless => write!(f, "HQ"),
            ExportFormat::Compressed { kbps } => write!(f, "{kbps}k"),
        }
    }
}

/// Serialize a rendered buffer for the requested format.
pub fn export(buffer: &PcmBuffer, format: ExportFormat) -> Vec<u8> {
    if let ExportFormat::Compressed { kbps } = format {
        warn!("compressed export ({kbps} kbps) is not implemented; writing lossless WAV");
    }
    encode_wav(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_u32(wav: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([wav[at], wav[at + 1], wav[at + 2], wav[at + 3]])
    }

    fn header_u16(wav: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([wav[at], wav[at + 1]])
    }

    #[test]
    fn wav_header_valid() {
        let buffer = PcmBuffer::stereo(vec![0.0; 100], vec![0.0; 100], 48000).unwrap();
        let wav = encode_wav(&buffer);

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");

        assert_eq!(header_u32(&wav, 4), 36 + 400);
        assert_eq!(header_u16(&wav, 20), 1);
        assert_eq!(header_u16(&wav, 22), 2);
        assert_eq!(header_u32(&wav, 24), 48000);
        assert_eq!(header_u32(&wav, 28), 48000 * 4);
        assert_eq!(header_u16(&wav, 32), 4);
        assert_eq!(header_u16(&wav, 34), 16);
        assert_eq!(header_u32(&wav, 40), 400);
        assert_eq!(wav.len(), 44 + 400);
    }

    #[test]
    fn mono_header() {
        let buffer = PcmBuffer::mono(vec![0.0; 10], 44100).unwrap();
        let wav = encode_wav(&buffer);
        assert_eq!(header_u16(&wav, 22), 1);
        assert_eq!(header_u16(&wav, 32), 2);
        assert_eq!(wav.len(), 44 + 20);
    }

    #[test]
    fn quantize_clips_and_scales_asymmetrically() {
        assert_eq!(quantize(1.0), 32767);
        assert_eq!(quantize(-1.0), -32768);
        assert_eq!(quantize(5.0), 32767);
        assert_eq!(quantize(-5.0), -32768);
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(0.5), 16384);
        assert_eq!(quantize(1.0 / 32767.0 - 1e-6), 1);
        assert_eq!(quantize(-0.5), -16384);
    }

    #[test]
    fn samples_are_interleaved() {
        let buffer = PcmBuffer::stereo(vec![1.0, 0.0], vec![-1.0, 0.5], 8000).unwrap();
        let wav = encode_wav(&buffer);
        let data: Vec<i16> = wav[44..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(data, vec![32767, -32768, 0, 16384]);
    }

    #[test]
    fn round_trip_within_quantization_error() {
        let left: Vec<f32> = (0..4800).map(|i| ((i as f32) * 0.01).sin() * 0.9).collect();
        let right: Vec<f32> = left.iter().map(|s| -s * 0.5).collect();
        let buffer = PcmBuffer::stereo(left, right, 48000).unwrap();

        let decoded = decode_wav(&encode_wav(&buffer)).unwrap();
        assert_eq!(decoded.channel_count(), 2);
        assert_eq!(decoded.sample_rate(), 48000);
        assert_eq!(decoded.len(), buffer.len());
        for (orig, back) in buffer.channels().iter().zip(decoded.channels()) {
            for (a, b) in orig.iter().zip(back) {
                // half a step either side
                assert!((a - b).abs() < 1.0 / 32768.0, "{a} vs {b}");
            }
        }
    }

    #[test]
    fn values_just_below_a_step_round_up() {
        for n in (1..32767).step_by(97) {
            for sign in [1.0_f32, -1.0] {
                let v = sign * (n as f32 - 1e-3) / 32767.0;
                let back = dequantize(quantize(v) as i32, 16);
                assert!((v - back).abs() < 1.0 / 32768.0, "{v} decoded as {back}");
            }
        }
    }

    #[test]
    fn decodes_float_wav() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in [0.25_f32, -0.75, 1.5] {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        let decoded = decode_wav(cursor.get_ref()).unwrap();
        assert_eq!(decoded.channel(0), &[0.25, -0.75, 1.5]);
        assert_eq!(decoded.sample_rate(), 22050);
    }

    #[test]
    fn full_scale_decodes_to_unity() {
        let buffer = PcmBuffer::mono(vec![1.0, -1.0], 8000).unwrap();
        let decoded = decode_wav(&encode_wav(&buffer)).unwrap();
        assert_eq!(decoded.channel(0), &[1.0, -1.0]);
    }

    #[test]
    fn garbage_is_a_decode_failure() {
        assert!(matches!(decode_wav(b"not a wav file"), Err(EngineError::Decode(_))));
    }

    #[test]
    fn export_labels() {
        assert_eq!(ExportFormat::from_label("HQ"), Some(ExportFormat::Lossless));
        assert_eq!(ExportFormat::from_label("wav"), Some(ExportFormat::Lossless));
        assert_eq!(
            ExportFormat::from_label("320k"),
            Some(ExportFormat::Compressed { kbps: 320 })
        );
        assert_eq!(ExportFormat::from_label("mp3"), None);
        assert_eq!(ExportFormat::from_label("0k"), None);
        assert_eq!(ExportFormat::Lossless.file_name(), "RaiWave_HQ.wav");
        assert_eq!(
            ExportFormat::Compressed { kbps: 320 }.file_name(),
            "RaiWave_320k.wav"
        );
    }

    #[test]
    fn compressed_export_is_lossless_bytes() {
        let buffer = PcmBuffer::mono(vec![0.1, -0.2, 0.3], 48000).unwrap();
        assert_eq!(
            export(&buffer, ExportFormat::Compressed { kbps: 320 }),
            export(&buffer, ExportFormat::Lossless)
        );
    }
}
