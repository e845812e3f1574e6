//! WAV encoding for captured audio
//!
//! The pipeline moves audio around as f32 mono samples; the remote API and
//! the recordings directory both want a 16-bit PCM WAV container.

use crate::error::TranscribeError;
use std::io::Cursor;

/// Encode f32 samples [-1.0, 1.0] to a 16-bit PCM mono WAV byte blob
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, TranscribeError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut buffer = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut buffer, spec)
        .map_err(|e| TranscribeError::AudioFormat(format!("Failed to create WAV writer: {}", e)))?;

    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let scaled = (clamped * i16::MAX as f32) as i16;
        writer
            .write_sample(scaled)
            .map_err(|e| TranscribeError::AudioFormat(format!("Failed to write sample: {}", e)))?;
    }

    writer
        .finalize()
        .map_err(|e| TranscribeError::AudioFormat(format!("Failed to finalize WAV: {}", e)))?;

    Ok(buffer.into_inner())
}

/// Read a 16-bit PCM WAV file back into f32 samples (for one-shot
/// re-transcription of a saved recording)
pub fn read_wav(path: &std::path::Path) -> Result<(Vec<f32>, u32), TranscribeError> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| TranscribeError::AudioFormat(format!("Failed to open WAV: {}", e)))?;

    let spec = reader.spec();
    if spec.channels != 1 {
        return Err(TranscribeError::AudioFormat(format!(
            "Expected mono audio, got {} channels",
            spec.channels
        )));
    }

    let samples: Result<Vec<f32>, _> = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect(),
        hound::SampleFormat::Float => reader.samples::<f32>().collect(),
    };

    let samples = samples
        .map_err(|e| TranscribeError::AudioFormat(format!("Failed to read samples: {}", e)))?;

    Ok((samples, spec.sample_rate))
}
