//! **SpeechInput**: single-shot capture over a speech-to-text engine.
//!
//! One recognition session at a time. Each session is ticketed; outcomes for a
//! ticket that is no longer current (cancelled, timed out, superseded) are dropped.

use crate::error::{VoiceError, VoiceResult};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// What a recognition session ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionOutcome {
    Transcript(String),
    Error(String),
    /// The engine stopped listening without producing a result.
    NoResult,
}

/// How the engine should capture. Sessions are always single-utterance and final-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionSettings {
    pub language: String,
    pub continuous: bool,
    pub interim_results: bool,
}

impl RecognitionSettings {
    pub fn single_utterance(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            continuous: false,
            interim_results: false,
        }
    }
}

/// Outcome callback handed to the engine with each session.
pub type RecognitionDone = Box<dyn FnOnce(RecognitionOutcome) + Send>;

/// Speech-to-text engine boundary. Implement for the platform recognizer.
pub trait SpeechRecognizer: Send + Sync {
    fn is_available(&self) -> bool {
        true
    }

    /// Begin capturing one utterance; call `on_outcome` exactly once when it ends.
    fn start(&self, settings: &RecognitionSettings, on_outcome: RecognitionDone) -> VoiceResult<()>;

    /// Stop capturing. An outcome for the aborted session may still arrive.
    fn abort(&self);
}

struct PendingRecognition {
    ticket: u64,
    done: oneshot::Sender<RecognitionOutcome>,
}

fn lock(slot: &Mutex<Option<PendingRecognition>>) -> MutexGuard<'_, Option<PendingRecognition>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn take_if_current(slot: &Mutex<Option<PendingRecognition>>, ticket: u64) -> Option<PendingRecognition> {
    let mut slot = lock(slot);
    match slot.as_ref() {
        Some(p) if p.ticket == ticket => slot.take(),
        _ => None,
    }
}

/// Owns the recognizer handle. Clones share the same session slot.
#[derive(Clone)]
pub struct SpeechInput {
    engine: Arc<dyn SpeechRecognizer>,
    active: Arc<Mutex<Option<PendingRecognition>>>,
    tickets: Arc<AtomicU64>,
    timeout: Option<Duration>,
}

impl SpeechInput {
    pub fn new(engine: Arc<dyn SpeechRecognizer>) -> Self {
        Self {
            engine,
            active: Arc::new(Mutex::new(None)),
            tickets: Arc::new(AtomicU64::new(0)),
            timeout: None,
        }
    }

    /// Bound every capture by `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn ensure_available(&self) -> VoiceResult<()> {
        if self.engine.is_available() {
            Ok(())
        } else {
            Err(VoiceError::UnsupportedCapability("speech recognition".to_string()))
        }
    }

    /// Capture one utterance and return its transcript.
    ///
    /// Fails with `RecognitionBusy` if a session is already running; cancel it first.
    pub async fn listen_once(&self, language: &str) -> VoiceResult<String> {
        self.ensure_available()?;

        let (done_tx, done_rx) = oneshot::channel();
        let ticket = {
            let mut slot = lock(&self.active);
            if slot.is_some() {
                return Err(VoiceError::RecognitionBusy);
            }
            let ticket = self.tickets.fetch_add(1, Ordering::SeqCst) + 1;
            *slot = Some(PendingRecognition { ticket, done: done_tx });
            ticket
        };

        info!("🎙️ Listening ({})", language);
        let settings = RecognitionSettings::single_utterance(language);
        let active = Arc::clone(&self.active);
        let started = self.engine.start(
            &settings,
            Box::new(move |outcome| match take_if_current(&active, ticket) {
                Some(p) => {
                    let _ = p.done.send(outcome);
                }
                None => debug!(ticket, "stale recognition outcome ignored"),
            }),
        );
        if let Err(e) = started {
            take_if_current(&self.active, ticket);
            warn!("Recognizer failed to start: {}", e);
            return Err(e);
        }

        let received = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, done_rx).await {
                Ok(received) => received,
                Err(_) => {
                    if take_if_current(&self.active, ticket).is_some() {
                        self.engine.abort();
                    }
                    warn!("No transcript within {:?}", limit);
                    return Err(VoiceError::ListenTimeout(limit.as_millis() as u64));
                }
            },
            None => done_rx.await,
        };

        match received {
            Ok(RecognitionOutcome::Transcript(text)) => {
                info!("📝 Heard: {}", text);
                Ok(text)
            }
            Ok(RecognitionOutcome::Error(reason)) => Err(VoiceError::Recognition(reason)),
            Ok(RecognitionOutcome::NoResult) => {
                Err(VoiceError::Recognition("speech ended without a result".to_string()))
            }
            Err(_) => Err(VoiceError::Cancelled),
        }
    }

    /// Abort the running session, if any. The waiting `listen_once` resolves with `Cancelled`.
    pub fn cancel(&self) {
        let pending = lock(&self.active).take();
        if let Some(p) = pending {
            debug!(ticket = p.ticket, "cancelling recognition");
            drop(p);
            self.engine.abort();
        }
    }

    pub fn is_listening(&self) -> bool {
        lock(&self.active).is_some()
    }
}

/// Recognizer that replays queued outcomes, one per session, and reports
/// `NoResult` once the queue runs dry. Use for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRecognizer {
    script: Arc<Mutex<VecDeque<RecognitionOutcome>>>,
    sessions: Arc<Mutex<Vec<RecognitionSettings>>>,
}

impl ScriptedRecognizer {
    pub fn new<I, S>(transcripts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let script = transcripts
            .into_iter()
            .map(|t| RecognitionOutcome::Transcript(t.into()))
            .collect();
        Self {
            script: Arc::new(Mutex::new(script)),
            sessions: Arc::default(),
        }
    }

    pub fn push(&self, outcome: RecognitionOutcome) {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(outcome);
    }

    /// Settings of every session started so far.
    pub fn sessions(&self) -> Vec<RecognitionSettings> {
        self.sessions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn start(&self, settings: &RecognitionSettings, on_outcome: RecognitionDone) -> VoiceResult<()> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(settings.clone());
        let next = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or(RecognitionOutcome::NoResult);
        on_outcome(next);
        Ok(())
    }

    fn abort(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_transcripts_in_order() {
        let stt = ScriptedRecognizer::new(["hdfc", "five hundred"]);
        let input = SpeechInput::new(Arc::new(stt.clone()));
        assert_eq!(input.listen_once("en-IN").await.unwrap(), "hdfc");
        assert_eq!(input.listen_once("en-IN").await.unwrap(), "five hundred");
        assert!(matches!(
            input.listen_once("en-IN").await,
            Err(VoiceError::Recognition(_))
        ));
        assert!(!input.is_listening());

        let sessions = stt.sessions();
        assert_eq!(sessions.len(), 3);
        assert_eq!(sessions[0], RecognitionSettings::single_utterance("en-IN"));
        assert!(!sessions[0].continuous && !sessions[0].interim_results);
    }

    #[tokio::test]
    async fn engine_error_is_recognition_error() {
        let stt = ScriptedRecognizer::default();
        stt.push(RecognitionOutcome::Error("network".into()));
        let input = SpeechInput::new(Arc::new(stt));
        let err = input.listen_once("en-IN").await.unwrap_err();
        assert!(matches!(err, VoiceError::Recognition(reason) if reason == "network"));
    }
}
