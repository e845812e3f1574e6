//! Text-rewrite module
//!
//! Stateless request/response wrapper around a remote chat/completions-style
//! rewrite call. Optional per session: only record+edit mode invokes it, and
//! a failure here degrades to delivering the raw transcript rather than
//! failing the session.

pub mod remote;

use crate::config::EditConfig;
use crate::error::EditError;

/// Trait for transcript-editing implementations
pub trait Editor: Send + Sync {
    /// Rewrite a transcript under the given prompt instructions
    fn edit(&self, instructions: &str, transcript: &str) -> Result<String, EditError>;
}

/// Factory function to create the editing client
pub fn create_editor(
    config: &EditConfig,
    api_key: Option<String>,
) -> Result<Box<dyn Editor>, EditError> {
    Ok(Box::new(remote::RemoteEditor::new(config, api_key)?))
}
