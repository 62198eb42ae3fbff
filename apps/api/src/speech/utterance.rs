//! One recorded candidate utterance, decoded from an uploaded WAV file.

use std::io::Cursor;
use std::time::Duration;

use bytes::Bytes;
use hound::{SampleFormat, WavReader};

use super::SpeechError;

/// Energy gate used to reject silent or near-empty recordings before any
/// provider call is made.
#[derive(Debug, Clone)]
pub struct SpeechGate {
    pub rms_threshold: f32,
    pub min_duration: Duration,
}

impl Default for SpeechGate {
    fn default() -> Self {
        Self {
            rms_threshold: 0.005,
            min_duration: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Utterance {
    wav: Bytes,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub sample_format: SampleFormat,
    pub duration: Duration,
}

impl Utterance {
    /// Decodes and validates a WAV upload. Silence is `NoSpeechDetected`;
    /// anything hound cannot read is a `RecognitionService` error.
    pub fn from_wav(wav: Bytes, gate: &SpeechGate) -> Result<Self, SpeechError> {
        let reader = WavReader::new(Cursor::new(wav.as_ref()))
            .map_err(|e| SpeechError::RecognitionService(format!("Unreadable WAV audio: {e}")))?;
        let spec = reader.spec();

        let samples = normalized_samples(reader, spec.sample_format, spec.bits_per_sample)?;
        let frames = samples.len() / usize::from(spec.channels.max(1));
        let duration = Duration::from_secs_f64(frames as f64 / f64::from(spec.sample_rate.max(1)));

        if duration < gate.min_duration || rms(&samples) < gate.rms_threshold {
            return Err(SpeechError::NoSpeechDetected);
        }

        Ok(Self {
            wav,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
            sample_format: spec.sample_format,
            duration,
        })
    }

    /// The original WAV file bytes, header included.
    pub fn wav_bytes(&self) -> &Bytes {
        &self.wav
    }

    pub fn is_linear16(&self) -> bool {
        self.sample_format == SampleFormat::Int && self.bits_per_sample == 16
    }
}

fn normalized_samples(
    reader: WavReader<Cursor<&[u8]>>,
    format: SampleFormat,
    bits: u16,
) -> Result<Vec<f32>, SpeechError> {
    let decode_err = |e: hound::Error| SpeechError::RecognitionService(format!("Corrupt WAV data: {e}"));
    match format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(decode_err),
        SampleFormat::Int => {
            let scale = (1i64 << (bits.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()
                .map_err(decode_err)
        }
    }
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy_sum = samples.iter().map(|value| value * value).sum::<f32>();
    (energy_sum / samples.len() as f32).sqrt()
}
