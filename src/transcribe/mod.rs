//! Speech-to-text transcription module
//!
//! Stateless request/response wrapper around a remote OpenAI-compatible
//! speech-to-text API. Calls are blocking (ureq) and run inside
//! spawn_blocking workers; the retry policy wraps them there.

pub mod remote;

use crate::config::TranscribeConfig;
use crate::error::TranscribeError;

/// Trait for speech-to-text implementations
pub trait Transcriber: Send + Sync {
    /// Transcribe audio samples to text.
    /// Input: f32 samples, mono, at the configured sample rate.
    fn transcribe(&self, samples: &[f32]) -> Result<String, TranscribeError>;
}

/// Which request/response shape the configured model speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// gpt-4o-transcribe style: plain-text response
    Gpt,
    /// whisper-1 style: verbose JSON response
    Whisper,
}

impl ModelFamily {
    /// Infer the family from a model name
    pub fn from_model(model: &str) -> Self {
        if model.to_lowercase().contains("gpt") {
            ModelFamily::Gpt
        } else {
            ModelFamily::Whisper
        }
    }
}

/// Factory function to create the transcription client
pub fn create_transcriber(
    config: &TranscribeConfig,
    api_key: Option<String>,
    sample_rate: u32,
) -> Result<Box<dyn Transcriber>, TranscribeError> {
    Ok(Box::new(remote::RemoteTranscriber::new(
        config,
        api_key,
        sample_rate,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_family_detection() {
        assert_eq!(ModelFamily::from_model("gpt-4o-transcribe"), ModelFamily::Gpt);
        assert_eq!(
            ModelFamily::from_model("gpt-4o-mini-transcribe"),
            ModelFamily::Gpt
        );
        assert_eq!(ModelFamily::from_model("whisper-1"), ModelFamily::Whisper);
        assert_eq!(ModelFamily::from_model("large-v3"), ModelFamily::Whisper);
    }
}
