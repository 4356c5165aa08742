//! **SpeechOutput**: one utterance at a time over a text-to-speech engine.
//!
//! Engines report completion through a callback. The controller turns that into
//! an awaitable `speak` and tags every utterance with a ticket so a completion
//! that arrives after a cancel (or after a newer utterance started) is dropped.

use crate::error::{VoiceError, VoiceResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Completion callback handed to the engine with each utterance.
pub type UtteranceDone = Box<dyn FnOnce(VoiceResult<()>) + Send>;

/// Text-to-speech engine boundary. Implement for the platform synthesizer.
pub trait SpeechSynthesizer: Send + Sync {
    /// Whether the platform offers speech synthesis at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Start speaking `text`; call `on_done` when playback ends or fails.
    fn speak(&self, text: &str, language: &str, on_done: UtteranceDone);

    /// Stop whatever is playing. Completion of the stopped utterance may still arrive.
    fn cancel(&self);
}

struct PendingUtterance {
    ticket: u64,
    done: oneshot::Sender<VoiceResult<()>>,
}

fn lock(slot: &Mutex<Option<PendingUtterance>>) -> MutexGuard<'_, Option<PendingUtterance>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owns the synthesizer handle. Clones share the same in-flight utterance.
#[derive(Clone)]
pub struct SpeechOutput {
    engine: Arc<dyn SpeechSynthesizer>,
    active: Arc<Mutex<Option<PendingUtterance>>>,
    tickets: Arc<AtomicU64>,
}

impl SpeechOutput {
    pub fn new(engine: Arc<dyn SpeechSynthesizer>) -> Self {
        Self {
            engine,
            active: Arc::new(Mutex::new(None)),
            tickets: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn ensure_available(&self) -> VoiceResult<()> {
        if self.engine.is_available() {
            Ok(())
        } else {
            Err(VoiceError::UnsupportedCapability("speech synthesis".to_string()))
        }
    }

    /// Speak `text` and wait for playback to end.
    ///
    /// Any utterance still playing is cancelled first. Resolves with
    /// `Cancelled` if this utterance is itself cancelled before it ends.
    pub async fn speak(&self, text: &str, language: &str) -> VoiceResult<()> {
        self.ensure_available()?;
        self.cancel();

        let ticket = self.tickets.fetch_add(1, Ordering::SeqCst) + 1;
        let (done_tx, done_rx) = oneshot::channel();
        *lock(&self.active) = Some(PendingUtterance { ticket, done: done_tx });

        info!("🔊 Speaking ({}): {}", language, text);
        let active = Arc::clone(&self.active);
        self.engine.speak(
            text,
            language,
            Box::new(move |result| {
                let pending = {
                    let mut slot = lock(&active);
                    match slot.as_ref() {
                        Some(p) if p.ticket == ticket => slot.take(),
                        _ => None,
                    }
                };
                match pending {
                    Some(p) => {
                        let _ = p.done.send(result);
                    }
                    None => debug!(ticket, "stale utterance completion ignored"),
                }
            }),
        );

        match done_rx.await {
            Ok(result) => result,
            Err(_) => Err(VoiceError::Cancelled),
        }
    }

    /// Stop the in-flight utterance, if any. The waiting `speak` resolves with `Cancelled`.
    pub fn cancel(&self) {
        let pending = lock(&self.active).take();
        if let Some(p) = pending {
            debug!(ticket = p.ticket, "cancelling utterance");
            drop(p);
            self.engine.cancel();
        }
    }

    pub fn is_speaking(&self) -> bool {
        lock(&self.active).is_some()
    }
}

/// Synthesizer that plays nothing and completes at once, keeping a log of what
/// it was asked to say. Use for tests and dry runs.
#[derive(Debug, Clone)]
pub struct RecordingSynthesizer {
    spoken: Arc<Mutex<Vec<String>>>,
    available: bool,
}

impl RecordingSynthesizer {
    pub fn new() -> Self {
        Self {
            spoken: Arc::new(Mutex::new(Vec::new())),
            available: true,
        }
    }

    /// A synthesizer for a platform without TTS.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl Default for RecordingSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSynthesizer for RecordingSynthesizer {
    fn is_available(&self) -> bool {
        self.available
    }

    fn speak(&self, text: &str, _language: &str, on_done: UtteranceDone) {
        self.spoken
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(text.to_string());
        on_done(Ok(()));
    }

    fn cancel(&self) {}
}
