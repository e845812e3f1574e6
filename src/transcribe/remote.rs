//! Remote speech-to-text via an OpenAI-compatible API
//!
//! Sends a WAV upload to /v1/audio/transcriptions. The request and response
//! shapes differ per model family: gpt-style models take
//! response_format=text and answer with a plain-text body; whisper-style
//! models take verbose_json and answer with a JSON object carrying "text".

use super::{ModelFamily, Transcriber};
use crate::config::TranscribeConfig;
use crate::error::TranscribeError;
use crate::wav;
use std::time::Duration;

/// Remote transcription client
#[derive(Debug)]
pub struct RemoteTranscriber {
    endpoint: String,
    model: String,
    family: ModelFamily,
    /// "auto" means let the server detect
    language: String,
    api_key: Option<String>,
    timeout: Duration,
    sample_rate: u32,
}

impl RemoteTranscriber {
    pub fn new(
        config: &TranscribeConfig,
        api_key: Option<String>,
        sample_rate: u32,
    ) -> Result<Self, TranscribeError> {
        if config.model.trim().is_empty() {
            return Err(TranscribeError::Config(
                "transcribe.model must not be empty".into(),
            ));
        }

        let endpoint = config.endpoint.clone();
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(TranscribeError::Config(format!(
                "transcribe.endpoint must start with http:// or https://, got: {}",
                endpoint
            )));
        }

        if endpoint.starts_with("http://")
            && !endpoint.contains("localhost")
            && !endpoint.contains("127.0.0.1")
            && !endpoint.contains("[::1]")
        {
            tracing::warn!(
                "Transcription endpoint uses HTTP without TLS. Audio will be transmitted unencrypted!"
            );
        }

        let family = ModelFamily::from_model(&config.model);

        tracing::info!(
            "Configured transcriber: endpoint={}, model={} ({:?}), timeout={}s",
            endpoint,
            config.model,
            family,
            config.timeout_secs
        );

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            family,
            language: config.language.clone(),
            api_key,
            timeout: Duration::from_secs(config.timeout_secs),
            sample_rate,
        })
    }

    /// Build the multipart form body for the API request
    fn build_multipart_body(&self, wav_data: &[u8]) -> (String, Vec<u8>) {
        let boundary = format!(
            "----QuickscribeBoundary{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );

        let mut body = Vec::new();

        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"file\"; filename=\"audio.wav\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: audio/wav\r\n\r\n");
        body.extend_from_slice(wav_data);
        body.extend_from_slice(b"\r\n");

        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"model\"\r\n\r\n");
        body.extend_from_slice(self.model.as_bytes());
        body.extend_from_slice(b"\r\n");

        if self.language != "auto" {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            body.extend_from_slice(b"Content-Disposition: form-data; name=\"language\"\r\n\r\n");
            body.extend_from_slice(self.language.as_bytes());
            body.extend_from_slice(b"\r\n");
        }

        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"response_format\"\r\n\r\n");
        let response_format = match self.family {
            ModelFamily::Gpt => "text",
            ModelFamily::Whisper => "verbose_json",
        };
        body.extend_from_slice(response_format.as_bytes());
        body.extend_from_slice(b"\r\n");

        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        (boundary, body)
    }
}

/// Map a ureq error to the transcription taxonomy
fn classify_error(e: ureq::Error) -> TranscribeError {
    match e {
        ureq::Error::Status(code, resp) => {
            let body = resp.into_string().unwrap_or_default();
            match code {
                401 | 403 => TranscribeError::Auth { status: code },
                429 => TranscribeError::Quota(body),
                400..=499 => TranscribeError::BadRequest(format!("{}: {}", code, body)),
                _ => TranscribeError::Server { status: code, body },
            }
        }
        ureq::Error::Transport(t) => TranscribeError::Network(t.to_string()),
    }
}

impl Transcriber for RemoteTranscriber {
    fn transcribe(&self, samples: &[f32]) -> Result<String, TranscribeError> {
        if samples.is_empty() {
            return Err(TranscribeError::AudioFormat("Empty audio buffer".into()));
        }

        let duration_secs = samples.len() as f32 / self.sample_rate as f32;
        tracing::debug!(
            "Sending {:.2}s of audio for transcription ({} samples)",
            duration_secs,
            samples.len()
        );

        let start = std::time::Instant::now();

        let wav_data = wav::encode_wav(samples, self.sample_rate)?;
        let (boundary, body) = self.build_multipart_body(&wav_data);

        let url = format!(
            "{}/v1/audio/transcriptions",
            self.endpoint.trim_end_matches('/')
        );

        let mut request = ureq::post(&url).timeout(self.timeout).set(
            "Content-Type",
            &format!("multipart/form-data; boundary={}", boundary),
        );

        if let Some(ref key) = self.api_key {
            request = request.set("Authorization", &format!("Bearer {}", key));
        }

        let response = request.send_bytes(&body).map_err(classify_error)?;

        let text = match self.family {
            ModelFamily::Gpt => response
                .into_string()
                .map_err(|e| TranscribeError::BadResponse(format!("Failed to read body: {}", e)))?,
            ModelFamily::Whisper => {
                let json: serde_json::Value = response.into_json().map_err(|e| {
                    TranscribeError::BadResponse(format!("Failed to parse response: {}", e))
                })?;
                json.get("text")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        TranscribeError::BadResponse(format!(
                            "Response missing 'text' field: {}",
                            json
                        ))
                    })?
                    .to_string()
            }
        };

        // Trailing whitespace would move the caret to a new line on paste
        let text = text.trim_end().to_string();

        tracing::info!(
            "Transcription completed in {:.2}s: {:?}",
            start.elapsed().as_secs_f32(),
            if text.chars().count() > 50 {
                format!("{}...", text.chars().take(50).collect::<String>())
            } else {
                text.clone()
            }
        );

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(model: &str) -> TranscribeConfig {
        TranscribeConfig {
            model: model.to_string(),
            endpoint: "https://api.openai.com".to_string(),
            api_key: None,
            language: "auto".to_string(),
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_config_validation_empty_model() {
        let result = RemoteTranscriber::new(&test_config("  "), None, 16000);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validation_invalid_url() {
        let mut config = test_config("whisper-1");
        config.endpoint = "not-a-url".to_string();
        let result = RemoteTranscriber::new(&config, None, 16000);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("http://"));
    }

    #[test]
    fn test_multipart_body_gpt_shape() {
        let transcriber =
            RemoteTranscriber::new(&test_config("gpt-4o-transcribe"), None, 16000).unwrap();
        let (boundary, body) = transcriber.build_multipart_body(&[0u8; 100]);

        let body_str = String::from_utf8_lossy(&body);
        assert!(body_str.contains(&boundary));
        assert!(body_str.contains("name=\"file\""));
        assert!(body_str.contains("filename=\"audio.wav\""));
        assert!(body_str.contains("gpt-4o-transcribe"));
        assert!(body_str.contains("name=\"response_format\""));
        assert!(body_str.contains("text"));
        assert!(!body_str.contains("verbose_json"));
        // "auto" language is omitted so the server detects it
        assert!(!body_str.contains("name=\"language\""));
    }

    #[test]
    fn test_multipart_body_whisper_shape() {
        let mut config = test_config("whisper-1");
        config.language = "en".to_string();
        let transcriber = RemoteTranscriber::new(&config, None, 16000).unwrap();
        let (_, body) = transcriber.build_multipart_body(&[0u8; 100]);

        let body_str = String::from_utf8_lossy(&body);
        assert!(body_str.contains("whisper-1"));
        assert!(body_str.contains("verbose_json"));
        assert!(body_str.contains("name=\"language\""));
        assert!(body_str.contains("\r\nen\r\n"));
    }

    #[test]
    fn test_api_key_stored() {
        let transcriber = RemoteTranscriber::new(
            &test_config("whisper-1"),
            Some("sk-test-key-123".to_string()),
            16000,
        )
        .unwrap();
        assert_eq!(transcriber.api_key, Some("sk-test-key-123".to_string()));
    }

    #[test]
    fn test_timeout_from_config() {
        let mut config = test_config("whisper-1");
        config.timeout_secs = 45;
        let transcriber = RemoteTranscriber::new(&config, None, 16000).unwrap();
        assert_eq!(transcriber.timeout, Duration::from_secs(45));
    }

    #[test]
    fn test_empty_samples_rejected() {
        let transcriber = RemoteTranscriber::new(&test_config("whisper-1"), None, 16000).unwrap();
        assert!(transcriber.transcribe(&[]).is_err());
    }
}
