//! Audio feedback cues
//!
//! Short generated tones for recording start/stop/cancel/error so the user
//! knows what happened without looking anywhere. Sounds are synthesized at
//! startup; no binary assets shipped. A missing output device disables cues
//! and never affects the session.

use crate::config::FeedbackConfig;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::io::Cursor;

/// Cue types
#[derive(Debug, Clone, Copy)]
pub enum SoundEvent {
    RecordingStart,
    RecordingStop,
    Cancelled,
    Error,
}

/// Audio feedback player
pub struct AudioFeedback {
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    volume: f32,
    theme: SoundTheme,
}

/// Pre-rendered WAV data per cue
struct SoundTheme {
    start: Vec<u8>,
    stop: Vec<u8>,
    cancel: Vec<u8>,
    error: Vec<u8>,
}

impl AudioFeedback {
    pub fn new(config: &FeedbackConfig) -> Result<Self, String> {
        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| format!("Failed to open audio output: {}", e))?;

        let theme = match config.theme.as_str() {
            "subtle" => subtle_theme(),
            "mechanical" => mechanical_theme(),
            _ => default_theme(),
        };

        Ok(Self {
            _stream: stream,
            stream_handle,
            volume: config.volume.clamp(0.0, 1.0),
            theme,
        })
    }

    /// Play the cue for an event; failures are logged, never surfaced
    pub fn play(&self, event: SoundEvent) {
        let data = match event {
            SoundEvent::RecordingStart => &self.theme.start,
            SoundEvent::RecordingStop => &self.theme.stop,
            SoundEvent::Cancelled => &self.theme.cancel,
            SoundEvent::Error => &self.theme.error,
        };

        if let Err(e) = self.play_wav(data) {
            tracing::warn!("Failed to play feedback cue: {}", e);
        }
    }

    fn play_wav(&self, data: &[u8]) -> Result<(), String> {
        let cursor = Cursor::new(data.to_vec());
        let source =
            Decoder::new(cursor).map_err(|e| format!("Failed to decode cue: {}", e))?;

        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|e| format!("Failed to create audio sink: {}", e))?;

        sink.append(source.amplify(self.volume));
        sink.detach();

        Ok(())
    }
}

const CUE_RATE: u32 = 44100;

/// Sine tone with a fade envelope, encoded as WAV
fn tone(frequency: f32, duration_ms: u32, fade_ms: u32) -> Vec<u8> {
    sweep(frequency, frequency, duration_ms, fade_ms)
}

/// Two-tone sweep (first half freq1, second half freq2), encoded as WAV
fn sweep(freq1: f32, freq2: f32, duration_ms: u32, fade_ms: u32) -> Vec<u8> {
    let num_samples = (CUE_RATE * duration_ms / 1000) as usize;
    let fade_samples = (CUE_RATE * fade_ms / 1000) as usize;
    let half = num_samples / 2;

    let mut samples: Vec<i16> = Vec::with_capacity(num_samples);
    for i in 0..num_samples {
        let t = i as f32 / CUE_RATE as f32;
        let freq = if i < half { freq1 } else { freq2 };
        let mut amplitude = (2.0 * std::f32::consts::PI * freq * t).sin();

        if fade_samples > 0 {
            if i < fade_samples {
                amplitude *= i as f32 / fade_samples as f32;
            } else if i >= num_samples - fade_samples {
                amplitude *= (num_samples - i) as f32 / fade_samples as f32;
            }
        }

        samples.push((amplitude * 16000.0) as i16);
    }

    encode_cue(&samples)
}

/// Short decaying noise burst, encoded as WAV
fn click(duration_ms: u32) -> Vec<u8> {
    let num_samples = (CUE_RATE * duration_ms / 1000) as usize;

    let mut samples: Vec<i16> = Vec::with_capacity(num_samples);
    for i in 0..num_samples {
        let envelope = (-5.0 * i as f32 / num_samples as f32).exp();
        let noise = if i % 2 == 0 { 1.0 } else { -1.0 };
        samples.push((noise * envelope * 12000.0) as i16);
    }

    encode_cue(&samples)
}

/// Minimal PCM WAV container around the cue samples
fn encode_cue(samples: &[i16]) -> Vec<u8> {
    let mut wav = Vec::new();

    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&((36 + samples.len() * 2) as u32).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&CUE_RATE.to_le_bytes());
    wav.extend_from_slice(&(CUE_RATE * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&((samples.len() * 2) as u32).to_le_bytes());
    for sample in samples {
        wav.extend_from_slice(&sample.to_le_bytes());
    }

    wav
}

fn default_theme() -> SoundTheme {
    SoundTheme {
        start: sweep(440.0, 880.0, 150, 20),
        stop: sweep(880.0, 440.0, 150, 20),
        cancel: tone(600.0, 80, 10),
        error: sweep(300.0, 200.0, 200, 30),
    }
}

fn subtle_theme() -> SoundTheme {
    SoundTheme {
        start: tone(1200.0, 50, 10),
        stop: tone(800.0, 50, 10),
        cancel: tone(600.0, 40, 8),
        error: sweep(400.0, 300.0, 100, 15),
    }
}

fn mechanical_theme() -> SoundTheme {
    SoundTheme {
        start: click(30),
        stop: click(20),
        cancel: click(15),
        error: tone(150.0, 150, 20),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_is_valid_wav() {
        let wav = tone(440.0, 100, 10);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert!(wav.len() > 44);
    }

    #[test]
    fn test_all_themes_render() {
        for theme in [default_theme(), subtle_theme(), mechanical_theme()] {
            assert!(!theme.start.is_empty());
            assert!(!theme.stop.is_empty());
            assert!(!theme.cancel.is_empty());
            assert!(!theme.error.is_empty());
        }
    }
}
