//! Remote transcript editing via an OpenAI-compatible API
//!
//! gpt-5-family models are called through the responses API (instructions +
//! input, minimal reasoning effort); everything else goes through chat
//! completions. The transcript is wrapped in <transcription> tags so the
//! model edits it instead of answering it.

use super::Editor;
use crate::config::EditConfig;
use crate::error::EditError;
use serde_json::json;
use std::time::Duration;

/// Which request shape the configured model speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestShape {
    /// /v1/responses with instructions/input
    Responses,
    /// /v1/chat/completions with system/user messages
    ChatCompletions,
}

impl RequestShape {
    fn from_model(model: &str) -> Self {
        if model.to_lowercase().contains("gpt-5") {
            RequestShape::Responses
        } else {
            RequestShape::ChatCompletions
        }
    }
}

/// Remote editing client
#[derive(Debug)]
pub struct RemoteEditor {
    endpoint: String,
    model: String,
    shape: RequestShape,
    api_key: Option<String>,
    timeout: Duration,
    max_output_tokens: u32,
}

impl RemoteEditor {
    pub fn new(config: &EditConfig, api_key: Option<String>) -> Result<Self, EditError> {
        let endpoint = config.endpoint.clone();
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(EditError::BadRequest(format!(
                "edit.endpoint must start with http:// or https://, got: {}",
                endpoint
            )));
        }

        let shape = RequestShape::from_model(&config.model);

        tracing::info!(
            "Configured editor: endpoint={}, model={} ({:?}), timeout={}s",
            endpoint,
            config.model,
            shape,
            config.timeout_secs
        );

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            shape,
            api_key,
            timeout: Duration::from_secs(config.timeout_secs),
            max_output_tokens: config.max_output_tokens,
        })
    }

    fn user_prompt(transcript: &str) -> String {
        format!(
            "Here is the transcription\n<transcription>\n{}\n</transcription>\n",
            transcript
        )
    }

    fn request_payload(&self, instructions: &str, transcript: &str) -> serde_json::Value {
        match self.shape {
            RequestShape::Responses => json!({
                "model": self.model,
                "instructions": instructions,
                "input": Self::user_prompt(transcript),
                "text": { "verbosity": "low" },
                "reasoning": { "effort": "minimal" },
                "max_output_tokens": self.max_output_tokens,
            }),
            RequestShape::ChatCompletions => json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": instructions },
                    { "role": "user", "content": Self::user_prompt(transcript) },
                ],
                "max_tokens": self.max_output_tokens,
            }),
        }
    }

    fn api_path(&self) -> &'static str {
        match self.shape {
            RequestShape::Responses => "/v1/responses",
            RequestShape::ChatCompletions => "/v1/chat/completions",
        }
    }

    /// Pull the rewritten text out of the response body
    fn extract_text(&self, json: &serde_json::Value) -> Result<String, EditError> {
        let text = match self.shape {
            RequestShape::Responses => {
                // Convenience field first, then the structured output array
                json.get("output_text")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .or_else(|| {
                        json.get("output")?.as_array()?.iter().find_map(|item| {
                            item.get("content")?.as_array()?.iter().find_map(|c| {
                                (c.get("type")?.as_str()? == "output_text")
                                    .then(|| c.get("text")?.as_str().map(|s| s.to_string()))?
                            })
                        })
                    })
            }
            RequestShape::ChatCompletions => json
                .pointer("/choices/0/message/content")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        };

        text.ok_or_else(|| {
            EditError::BadResponse(format!("Response missing edited text: {}", json))
        })
    }
}

/// Map a ureq error to the editing taxonomy
fn classify_error(e: ureq::Error) -> EditError {
    match e {
        ureq::Error::Status(code, resp) => {
            let body = resp.into_string().unwrap_or_default();
            match code {
                401 | 403 => EditError::Auth { status: code },
                429 => EditError::Quota(body),
                400..=499 => EditError::BadRequest(format!("{}: {}", code, body)),
                _ => EditError::Server { status: code, body },
            }
        }
        ureq::Error::Transport(t) => EditError::Network(t.to_string()),
    }
}

impl Editor for RemoteEditor {
    fn edit(&self, instructions: &str, transcript: &str) -> Result<String, EditError> {
        let url = format!("{}{}", self.endpoint.trim_end_matches('/'), self.api_path());
        let payload = self.request_payload(instructions, transcript);

        tracing::debug!("Editing {} chars with {}", transcript.len(), self.model);
        let start = std::time::Instant::now();

        let mut request = ureq::post(&url)
            .timeout(self.timeout)
            .set("Content-Type", "application/json");

        if let Some(ref key) = self.api_key {
            request = request.set("Authorization", &format!("Bearer {}", key));
        }

        let response = request.send_json(payload).map_err(classify_error)?;

        let json: serde_json::Value = response
            .into_json()
            .map_err(|e| EditError::BadResponse(format!("Failed to parse response: {}", e)))?;

        let text = self.extract_text(&json)?.trim_end().to_string();

        tracing::info!(
            "Edit completed in {:.2}s ({} chars)",
            start.elapsed().as_secs_f32(),
            text.len()
        );

        Ok(text)
    }
}
