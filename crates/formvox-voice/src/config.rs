//! Engine configuration: language, matching threshold, retry and timeout policy,
//! spoken messages, and control vocabulary.
//!
//! Loaded with the `config` crate. Precedence: env `FORMVOX__*` > file at
//! `$FORMVOX_CONFIG` (default `config/formvox.toml`) > defaults.

use crate::error::{VoiceError, VoiceResult};
use crate::field::{FieldKind, FieldSpec};
use crate::parse::DEFAULT_MATCH_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sentences the engine speaks outside of field prompts.
///
/// `{prompt}`, `{label}` and `{options}` are replaced with the active field's
/// prompt, label, and spoken choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub nothing_to_do: String,
    pub retry: String,
    pub no_match: String,
    pub fields_incomplete: String,
    pub all_filled: String,
    pub completed: String,
    pub submitted: String,
    pub gave_up: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            nothing_to_do: "All fields are already filled. There is nothing left to do.".into(),
            retry: "Sorry, I didn't catch that. {prompt}".into(),
            no_match: "I couldn't find that option. Please choose one of: {options}.".into(),
            fields_incomplete: "Some fields are still empty. {prompt}".into(),
            all_filled: "All fields are filled. Say confirm to submit.".into(),
            completed: "Thank you, the form is complete.".into(),
            submitted: "Your request has been submitted.".into(),
            gave_up: "Let's stop here. You can fill {label} by hand.".into(),
        }
    }
}

impl Messages {
    /// Fill placeholders for `field`.
    pub fn render(template: &str, field: &FieldSpec) -> String {
        let mut text = template
            .replace("{prompt}", &field.prompt)
            .replace("{label}", &field.label);
        if text.contains("{options}") {
            let choices = match &field.kind {
                FieldKind::Select { options } => options.iter().map(|o| o.label.as_str()).collect::<Vec<_>>(),
                FieldKind::TimeSlot { slots } => slots.iter().map(String::as_str).collect(),
                _ => Vec::new(),
            };
            text = text.replace("{options}", &choices.join(", "));
        }
        text
    }
}

/// Control vocabulary recognised in place of a field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandWords {
    pub submit: Vec<String>,
    pub cancel: Vec<String>,
    pub repeat: Vec<String>,
}

impl Default for CommandWords {
    fn default() -> Self {
        Self {
            submit: vec!["confirm".into(), "submit".into(), "send".into()],
            cancel: vec!["cancel".into(), "stop".into()],
            repeat: vec!["repeat".into(), "say again".into(), "repeat that".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuideConfig {
    /// BCP-47 tag handed to both speech engines.
    pub language: String,
    /// Fuzzy matcher acceptance threshold (exclusive).
    pub match_threshold: f32,
    /// Failed answers tolerated per field before the session gives up. `0` = unbounded.
    pub max_attempts: u32,
    /// Upper bound on a single capture. `0` disables the bound.
    pub listen_timeout_ms: u64,
    /// Ask for a spoken "confirm" once every field is filled.
    pub confirm_before_submit: bool,
    pub messages: Messages,
    pub commands: CommandWords,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            language: "en-IN".into(),
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            max_attempts: 3,
            listen_timeout_ms: 15_000,
            confirm_before_submit: true,
            messages: Messages::default(),
            commands: CommandWords::default(),
        }
    }
}

impl GuideConfig {
    /// Load from file and environment.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path = std::env::var("FORMVOX_CONFIG").unwrap_or_else(|_| "config/formvox".to_string());
        let builder = Self::defaults()?
            .add_source(config::File::with_name(&config_path).required(false))
            .add_source(
                config::Environment::with_prefix("FORMVOX")
                    .separator("__")
                    .try_parsing(true),
            );
        builder.build()?.try_deserialize()
    }

    /// Parse a TOML document over the defaults. Used by tests and embedders.
    pub fn from_toml_str(source: &str) -> Result<Self, config::ConfigError> {
        Self::defaults()?
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        let defaults = Self::default();
        config::Config::builder()
            .set_default("language", defaults.language)?
            .set_default("match_threshold", f64::from(defaults.match_threshold))?
            .set_default("max_attempts", i64::from(defaults.max_attempts))?
            .set_default("listen_timeout_ms", defaults.listen_timeout_ms as i64)?
            .set_default("confirm_before_submit", defaults.confirm_before_submit)
    }

    pub fn validate(&self) -> VoiceResult<()> {
        if !(0.0..=1.0).contains(&self.match_threshold) {
            return Err(VoiceError::Config(format!(
                "match_threshold must be within 0..=1, got {}",
                self.match_threshold
            )));
        }
        if self.language.trim().is_empty() {
            return Err(VoiceError::Config("language must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn listen_timeout(&self) -> Option<Duration> {
        (self.listen_timeout_ms > 0).then(|| Duration::from_millis(self.listen_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::OptionSpec;

    #[test]
    fn defaults_are_valid() {
        let config = GuideConfig::default();
        config.validate().unwrap();
        assert_eq!(config.listen_timeout(), Some(Duration::from_secs(15)));
        assert_eq!(config.commands.submit, vec!["confirm", "submit", "send"]);
    }

    #[test]
    fn toml_overrides_merge_with_defaults() {
        let config = GuideConfig::from_toml_str(
            r#"
language = "hi-IN"
max_attempts = 0
listen_timeout_ms = 0

[messages]
completed = "Dhanyavaad."
"#,
        )
        .unwrap();
        assert_eq!(config.language, "hi-IN");
        assert_eq!(config.max_attempts, 0);
        assert_eq!(config.listen_timeout(), None);
        assert_eq!(config.messages.completed, "Dhanyavaad.");
        assert_eq!(config.messages.retry, Messages::default().retry);
        assert!(config.confirm_before_submit);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let config = GuideConfig {
            match_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(VoiceError::Config(_))));
    }

    #[test]
    fn renders_placeholders() {
        let field = FieldSpec::new(
            "bankAccount",
            "bank account",
            "Which account?",
            FieldKind::Select {
                options: vec![OptionSpec::new("a", "HDFC"), OptionSpec::new("b", "SBI")],
            },
        );
        let messages = Messages::default();
        assert_eq!(
            Messages::render(&messages.no_match, &field),
            "I couldn't find that option. Please choose one of: HDFC, SBI."
        );
        assert_eq!(Messages::render(&messages.retry, &field), "Sorry, I didn't catch that. Which account?");
        assert_eq!(
            Messages::render(&messages.gave_up, &field),
            "Let's stop here. You can fill bank account by hand."
        );
    }
}
