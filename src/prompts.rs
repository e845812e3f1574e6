//! Editing prompt profiles
//!
//! Named instruction sets for the editing model. Selection is external
//! state cycled by the prev/next hotkeys; the orchestrator snapshots the
//! selected instructions when a session starts, so a mid-flight change
//! never alters an in-flight edit call.

use crate::config::{Config, PromptProfileConfig};

const DEFAULT_INSTRUCTIONS: &str = "\
You copy-edit dictated text. Fix grammar, punctuation and obvious \
dictation artifacts. Preserve the speaker's meaning and tone. Output only \
the edited text, nothing else.";

/// A named instruction set for the editing model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptProfile {
    pub name: String,
    pub instructions: String,
}

impl PromptProfile {
    fn default_profile() -> Self {
        Self {
            name: "Default".to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }
}

/// Prompt profiles with a current selection
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    profiles: Vec<PromptProfile>,
    current: usize,
}

impl PromptLibrary {
    pub fn from_config(config: &Config) -> Self {
        let mut profiles: Vec<PromptProfile> = config
            .prompt_profiles
            .iter()
            .map(|p: &PromptProfileConfig| PromptProfile {
                name: p.name.clone(),
                instructions: p.instructions.trim().to_string(),
            })
            .collect();

        if profiles.is_empty() {
            profiles.push(PromptProfile::default_profile());
        }

        let current = profiles
            .iter()
            .position(|p| p.name == config.selected_prompt)
            .unwrap_or_else(|| {
                if config.selected_prompt != "Default" {
                    tracing::warn!(
                        "Selected prompt '{}' not found, using '{}'",
                        config.selected_prompt,
                        profiles[0].name
                    );
                }
                0
            });

        Self { profiles, current }
    }

    /// The currently selected profile
    pub fn selected(&self) -> &PromptProfile {
        &self.profiles[self.current]
    }

    /// Cycle to the next profile and return it
    pub fn cycle_forward(&mut self) -> &PromptProfile {
        self.current = (self.current + 1) % self.profiles.len();
        self.selected()
    }

    /// Cycle to the previous profile and return it
    pub fn cycle_backward(&mut self) -> &PromptProfile {
        self.current = (self.current + self.profiles.len() - 1) % self.profiles.len();
        self.selected()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_profiles(names: &[&str], selected: &str) -> Config {
        let mut config = Config::default();
        config.prompt_profiles = names
            .iter()
            .map(|n| PromptProfileConfig {
                name: n.to_string(),
                instructions: format!("Instructions for {}", n),
            })
            .collect();
        config.selected_prompt = selected.to_string();
        config
    }

    #[test]
    fn test_empty_config_gets_builtin_default() {
        let library = PromptLibrary::from_config(&Config::default());
        assert_eq!(library.len(), 1);
        assert_eq!(library.selected().name, "Default");
        assert!(!library.selected().instructions.is_empty());
    }

    #[test]
    fn test_selection_from_config() {
        let config = config_with_profiles(&["Terse", "Email", "Formal"], "Email");
        let library = PromptLibrary::from_config(&config);
        assert_eq!(library.selected().name, "Email");
    }

    #[test]
    fn test_unknown_selection_falls_back_to_first() {
        let config = config_with_profiles(&["Terse", "Email"], "Missing");
        let library = PromptLibrary::from_config(&config);
        assert_eq!(library.selected().name, "Terse");
    }

    #[test]
    fn test_cycling_wraps() {
        let config = config_with_profiles(&["A", "B", "C"], "A");
        let mut library = PromptLibrary::from_config(&config);

        assert_eq!(library.cycle_forward().name, "B");
        assert_eq!(library.cycle_forward().name, "C");
        assert_eq!(library.cycle_forward().name, "A");

        assert_eq!(library.cycle_backward().name, "C");
    }
}
