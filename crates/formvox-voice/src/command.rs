//! Voice command routing: control words versus field values.

use crate::config::CommandWords;
use crate::parse::matcher::normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceCommand {
    /// Submit the form ("confirm", "submit", "send").
    Submit,
    /// Abandon the guided session.
    Cancel,
    /// Speak the current prompt again.
    Repeat,
}

/// Classifies whole-utterance control words. Anything else is a field value.
#[derive(Debug, Clone)]
pub struct CommandRouter {
    words: CommandWords,
}

impl CommandRouter {
    pub fn new(words: CommandWords) -> Self {
        Self { words }
    }

    pub fn route(&self, transcript: &str) -> Option<VoiceCommand> {
        let spoken = normalize(transcript);
        let spoken = spoken
            .strip_prefix("please ")
            .or_else(|| spoken.strip_suffix(" please"))
            .unwrap_or(spoken.as_str())
            .trim();
        let is = |list: &[String]| list.iter().any(|w| w.eq_ignore_ascii_case(spoken));

        if is(&self.words.submit) {
            Some(VoiceCommand::Submit)
        } else if is(&self.words.cancel) {
            Some(VoiceCommand::Cancel)
        } else if is(&self.words.repeat) {
            Some(VoiceCommand::Repeat)
        } else {
            None
        }
    }
}

impl Default for CommandRouter {
    fn default() -> Self {
        Self::new(CommandWords::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_control_words() {
        let router = CommandRouter::default();
        assert_eq!(router.route("confirm"), Some(VoiceCommand::Submit));
        assert_eq!(router.route("Submit."), Some(VoiceCommand::Submit));
        assert_eq!(router.route("please send"), Some(VoiceCommand::Submit));
        assert_eq!(router.route("Stop"), Some(VoiceCommand::Cancel));
        assert_eq!(router.route("say again please"), Some(VoiceCommand::Repeat));
    }

    #[test]
    fn values_are_not_commands() {
        let router = CommandRouter::default();
        assert_eq!(router.route("send money to savings"), None);
        assert_eq!(router.route("HDFC"), None);
        assert_eq!(router.route(""), None);
    }

    #[test]
    fn custom_vocabulary() {
        let router = CommandRouter::new(CommandWords {
            submit: vec!["haan".into()],
            cancel: vec![],
            repeat: vec![],
        });
        assert_eq!(router.route("Haan"), Some(VoiceCommand::Submit));
        assert_eq!(router.route("confirm"), None);
    }
}
