//! Field traversal: the guided-completion state machine.
//!
//! ```text
//! Idle ─start─▶ Prompting(i) ─spoken─▶ Listening(i) ─value─▶ Prompting(j) … ─▶ Confirming ─confirm─▶ Completed
//!                                        │   ▲                                   │
//!                                        └───┘ retry / incomplete / repeat       └─ any state ─stop_all─▶ Cancelled
//! ```
//!
//! The only suspension points are `speak` and `listen_once`. After each one the
//! session re-checks its generation; once `stop_all` (or a restart) has bumped it,
//! the old session exits without touching state or the form.

use crate::command::{CommandRouter, VoiceCommand};
use crate::config::{GuideConfig, Messages};
use crate::error::{VoiceError, VoiceResult};
use crate::field::{validate_fields, FieldSpec, FormSnapshot};
use crate::parse;
use crate::speech_input::{SpeechInput, SpeechRecognizer};
use crate::speech_output::{SpeechOutput, SpeechSynthesizer};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// The surrounding form UI. It owns the values; the engine reads a snapshot and
/// writes back through the callbacks.
pub trait FormHost: Send {
    fn snapshot(&self) -> FormSnapshot;

    fn on_field_resolved(&mut self, field: &str, value: &str);

    /// Traversal is about to prompt `field`, e.g. to highlight it.
    fn on_field_focus(&mut self, _field: &str) {}

    /// The user confirmed a fully filled form.
    fn on_submit(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TraversalMode {
    Idle,
    Prompting(usize),
    Listening(usize),
    /// Every field is filled; only control words are accepted.
    Confirming,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TraversalState {
    pub mode: TraversalMode,
    pub generation: u64,
}

impl TraversalState {
    pub fn current_field(&self) -> Option<usize> {
        match self.mode {
            TraversalMode::Prompting(i) | TraversalMode::Listening(i) => Some(i),
            _ => None,
        }
    }

    /// A session is running (speaking or listening on its behalf).
    pub fn is_active(&self) -> bool {
        matches!(
            self.mode,
            TraversalMode::Prompting(_) | TraversalMode::Listening(_) | TraversalMode::Confirming
        )
    }
}

impl Default for TraversalState {
    fn default() -> Self {
        Self {
            mode: TraversalMode::Idle,
            generation: 0,
        }
    }
}

/// Notifications for the UI, in the order things happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraversalEvent {
    SessionStarted { generation: u64 },
    FieldFocused { index: usize, field: String },
    FieldResolved { field: String, value: String },
    RetryRequested { field: String, attempt: u32, reason: String },
    AwaitingConfirmation,
    Submitted,
    Completed,
    Cancelled,
    Aborted { reason: String },
}

/// How a session that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Every field is filled; the submit callback was not invoked.
    Completed,
    /// Every field is filled and the user confirmed.
    Submitted,
    Cancelled,
}

fn lock(state: &Mutex<TraversalState>) -> MutexGuard<'_, TraversalState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Cloneable handle for stopping a running session from elsewhere (UI teardown,
/// a cancel button, Ctrl-C).
#[derive(Clone)]
pub struct SessionControl {
    state: Arc<Mutex<TraversalState>>,
    output: SpeechOutput,
    input: SpeechInput,
    language: String,
    events: mpsc::UnboundedSender<TraversalEvent>,
}

impl SessionControl {
    /// Cancel any speech in flight and, if a session is running, move it to
    /// `Cancelled` under a new generation. Returns whether a session was stopped.
    pub fn stop_all(&self) -> bool {
        let stopped = {
            let mut state = lock(&self.state);
            if state.is_active() {
                state.generation += 1;
                state.mode = TraversalMode::Cancelled;
                Some(state.generation)
            } else {
                None
            }
        };
        self.input.cancel();
        self.output.cancel();

        match stopped {
            Some(generation) => {
                info!(generation, "🛑 Guided session cancelled");
                let _ = self.events.send(TraversalEvent::Cancelled);
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> TraversalState {
        *lock(&self.state)
    }

    /// Narrate `text` once, outside of any traversal. Refused while a session runs.
    pub async fn explain_service(&self, text: &str) -> VoiceResult<()> {
        if self.state().is_active() {
            return Err(VoiceError::SessionActive);
        }
        info!("📖 Explaining service");
        self.output.speak(text, &self.language).await
    }
}

enum Step {
    Prompt(usize),
    Confirm,
    Finish(SessionOutcome),
}

/// Walks the empty fields of a form by voice.
pub struct FieldTraversal<H: FormHost> {
    fields: Vec<FieldSpec>,
    host: H,
    config: GuideConfig,
    router: CommandRouter,
    today: Arc<dyn Fn() -> NaiveDate + Send + Sync>,
    control: SessionControl,
    event_rx: Option<mpsc::UnboundedReceiver<TraversalEvent>>,
}

impl<H: FormHost> FieldTraversal<H> {
    pub fn new(
        fields: Vec<FieldSpec>,
        host: H,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        recognizer: Arc<dyn SpeechRecognizer>,
        config: GuideConfig,
    ) -> VoiceResult<Self> {
        validate_fields(&fields)?;
        config.validate()?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let control = SessionControl {
            state: Arc::new(Mutex::new(TraversalState::default())),
            output: SpeechOutput::new(synthesizer),
            input: SpeechInput::new(recognizer).with_timeout(config.listen_timeout()),
            language: config.language.clone(),
            events: event_tx,
        };

        Ok(Self {
            fields,
            host,
            router: CommandRouter::new(config.commands.clone()),
            config,
            today: Arc::new(|| Local::now().date_naive()),
            control,
            event_rx: Some(event_rx),
        })
    }

    /// Resolve relative dates against `today` instead of the local calendar.
    pub fn with_calendar(mut self, today: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.today = Arc::new(today);
        self
    }

    /// Take the event receiver. Only the first call returns `Some`.
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<TraversalEvent>> {
        self.event_rx.take()
    }

    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    pub fn state(&self) -> TraversalState {
        self.control.state()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn stop_all(&self) -> bool {
        self.control.stop_all()
    }

    pub async fn explain_service(&self, text: &str) -> VoiceResult<()> {
        self.control.explain_service(text).await
    }

    /// Run a guided session until it completes, is cancelled, or fails.
    ///
    /// Missing speech capability fails before anything is spoken. Any other
    /// failure leaves the traversal `Idle` with nothing further written.
    pub async fn start_guided_session(&mut self) -> VoiceResult<SessionOutcome> {
        let capable = self
            .control
            .output
            .ensure_available()
            .and_then(|_| self.control.input.ensure_available());
        if let Err(e) = capable {
            warn!("Voice guidance unavailable: {}", e);
            self.emit(TraversalEvent::Aborted { reason: e.to_string() });
            return Err(e);
        }

        let generation = self.begin();
        let result = self.drive(generation).await;

        let still_current = self.is_current(generation);
        match &result {
            Err(e) if still_current => {
                warn!("Guided session aborted: {}", e);
                self.enter(generation, TraversalMode::Idle);
                self.emit(TraversalEvent::Aborted { reason: e.to_string() });
            }
            Ok(SessionOutcome::Cancelled) if still_current && self.state().is_active() => {
                self.enter(generation, TraversalMode::Cancelled);
                self.emit(TraversalEvent::Cancelled);
            }
            _ => {}
        }

        match result {
            Err(_) if !still_current => Ok(SessionOutcome::Cancelled),
            other => other,
        }
    }

    fn begin(&mut self) -> u64 {
        self.control.input.cancel();
        self.control.output.cancel();
        let generation = {
            let mut state = lock(&self.control.state);
            state.generation += 1;
            state.mode = TraversalMode::Idle;
            state.generation
        };
        info!(generation, fields = self.fields.len(), "▶️ Guided session started");
        self.emit(TraversalEvent::SessionStarted { generation });
        generation
    }

    async fn drive(&mut self, generation: u64) -> VoiceResult<SessionOutcome> {
        let mut step = match self.next_empty(None) {
            Some(index) => Step::Prompt(index),
            None => {
                info!("Nothing to fill");
                self.enter(generation, TraversalMode::Completed);
                self.emit(TraversalEvent::Completed);
                let message = self.config.messages.nothing_to_do.clone();
                self.announce(generation, &message).await;
                return Ok(SessionOutcome::Completed);
            }
        };

        loop {
            step = match step {
                Step::Prompt(index) => self.prompt_field(generation, index).await?,
                Step::Confirm => self.await_confirmation(generation).await?,
                Step::Finish(outcome) => return Ok(outcome),
            };
        }
    }

    async fn prompt_field(&mut self, generation: u64, index: usize) -> VoiceResult<Step> {
        if !self.is_current(generation) {
            return Ok(Step::Finish(SessionOutcome::Cancelled));
        }
        let field = self.fields[index].clone();
        debug!(field = %field.name, kind = field.kind.tag(), "prompting field");
        self.host.on_field_focus(&field.name);
        self.emit(TraversalEvent::FieldFocused {
            index,
            field: field.name.clone(),
        });

        let mut utterance = field.prompt.clone();
        let mut attempts = 0u32;
        loop {
            if !self.enter(generation, TraversalMode::Prompting(index))
                || !self.say(generation, &utterance).await?
            {
                return Ok(Step::Finish(SessionOutcome::Cancelled));
            }
            if !self.enter(generation, TraversalMode::Listening(index)) {
                return Ok(Step::Finish(SessionOutcome::Cancelled));
            }
            let Some(transcript) = self.hear(generation).await? else {
                return Ok(Step::Finish(SessionOutcome::Cancelled));
            };

            match self.router.route(&transcript) {
                Some(VoiceCommand::Submit) => {
                    if self.all_filled() {
                        return Ok(self.submit(generation).await);
                    }
                    debug!(field = %field.name, "submit requested with empty fields");
                    utterance = Messages::render(&self.config.messages.fields_incomplete, &field);
                    continue;
                }
                Some(VoiceCommand::Cancel) => {
                    self.control.stop_all();
                    return Ok(Step::Finish(SessionOutcome::Cancelled));
                }
                Some(VoiceCommand::Repeat) => {
                    utterance = field.prompt.clone();
                    continue;
                }
                None => {}
            }

            let today = (self.today)();
            match parse::interpret(&field, &transcript, today, self.config.match_threshold) {
                Ok(value) => {
                    info!(field = %field.name, value = %value, "✅ Field resolved");
                    self.host.on_field_resolved(&field.name, &value);
                    self.emit(TraversalEvent::FieldResolved {
                        field: field.name.clone(),
                        value,
                    });
                    return self.after_write(generation, index).await;
                }
                Err(err) if err.is_recoverable() => {
                    attempts += 1;
                    if self.config.max_attempts > 0 && attempts >= self.config.max_attempts {
                        let message = Messages::render(&self.config.messages.gave_up, &field);
                        self.say(generation, &message).await?;
                        return Err(VoiceError::RetriesExhausted {
                            field: field.name.clone(),
                            attempts,
                        });
                    }
                    debug!(field = %field.name, attempt = attempts, "{}", err);
                    self.emit(TraversalEvent::RetryRequested {
                        field: field.name.clone(),
                        attempt: attempts,
                        reason: err.to_string(),
                    });
                    let template = match err {
                        VoiceError::NoMatchFound { .. } => &self.config.messages.no_match,
                        _ => &self.config.messages.retry,
                    };
                    utterance = Messages::render(template, &field);
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn after_write(&mut self, generation: u64, index: usize) -> VoiceResult<Step> {
        if let Some(next) = self.next_empty(Some(index)) {
            return Ok(Step::Prompt(next));
        }
        if self.config.confirm_before_submit {
            return Ok(Step::Confirm);
        }
        self.enter(generation, TraversalMode::Completed);
        self.emit(TraversalEvent::Completed);
        info!("🏁 All fields filled");
        let message = self.config.messages.completed.clone();
        self.announce(generation, &message).await;
        Ok(Step::Finish(SessionOutcome::Completed))
    }

    async fn await_confirmation(&mut self, generation: u64) -> VoiceResult<Step> {
        if !self.enter(generation, TraversalMode::Confirming) {
            return Ok(Step::Finish(SessionOutcome::Cancelled));
        }
        self.emit(TraversalEvent::AwaitingConfirmation);

        let message = self.config.messages.all_filled.clone();
        let mut attempts = 0u32;
        loop {
            if !self.say(generation, &message).await? {
                return Ok(Step::Finish(SessionOutcome::Cancelled));
            }
            // The user may have cleared a field by hand meanwhile.
            if let Some(index) = self.next_empty(None) {
                return Ok(Step::Prompt(index));
            }
            let Some(transcript) = self.hear(generation).await? else {
                return Ok(Step::Finish(SessionOutcome::Cancelled));
            };

            match self.router.route(&transcript) {
                Some(VoiceCommand::Submit) => return Ok(self.submit(generation).await),
                Some(VoiceCommand::Cancel) => {
                    self.control.stop_all();
                    return Ok(Step::Finish(SessionOutcome::Cancelled));
                }
                Some(VoiceCommand::Repeat) => {}
                None => {
                    attempts += 1;
                    if self.config.max_attempts > 0 && attempts >= self.config.max_attempts {
                        return Err(VoiceError::RetriesExhausted {
                            field: "confirmation".to_string(),
                            attempts,
                        });
                    }
                    debug!(transcript = %transcript, "waiting for a confirm word");
                }
            }
        }
    }

    async fn submit(&mut self, generation: u64) -> Step {
        if let Some(index) = self.next_empty(None) {
            return Step::Prompt(index);
        }
        self.host.on_submit();
        self.enter(generation, TraversalMode::Completed);
        info!("📨 Form submitted");
        self.emit(TraversalEvent::Submitted);
        self.emit(TraversalEvent::Completed);
        let message = self.config.messages.submitted.clone();
        self.announce(generation, &message).await;
        Step::Finish(SessionOutcome::Submitted)
    }

    /// Closing message of a finished session. Failing to speak it does not undo the result.
    async fn announce(&self, generation: u64, text: &str) {
        if let Err(e) = self.say(generation, text).await {
            warn!("Could not speak closing message: {}", e);
        }
    }

    /// Speak on behalf of `generation`. `Ok(false)` means the session was superseded.
    async fn say(&self, generation: u64, text: &str) -> VoiceResult<bool> {
        if !self.is_current(generation) {
            return Ok(false);
        }
        match self.control.output.speak(text, &self.config.language).await {
            Ok(()) => Ok(self.is_current(generation)),
            Err(VoiceError::Cancelled) => Ok(false),
            Err(_) if !self.is_current(generation) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Listen on behalf of `generation`. `Ok(None)` means the session was superseded.
    async fn hear(&self, generation: u64) -> VoiceResult<Option<String>> {
        if !self.is_current(generation) {
            return Ok(None);
        }
        match self.control.input.listen_once(&self.config.language).await {
            Ok(transcript) if self.is_current(generation) => Ok(Some(transcript)),
            Ok(_) => Ok(None),
            Err(_) if !self.is_current(generation) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        lock(&self.control.state).generation == generation
    }

    /// Move to `mode` if `generation` is still current.
    fn enter(&self, generation: u64, mode: TraversalMode) -> bool {
        let mut state = lock(&self.control.state);
        if state.generation != generation {
            debug!(generation, current = state.generation, "stale transition dropped");
            return false;
        }
        if state.mode != mode {
            debug!("State: {:?} → {:?}", state.mode, mode);
            state.mode = mode;
        }
        true
    }

    /// First empty field after `after`, wrapping around; from the start when `None`.
    fn next_empty(&self, after: Option<usize>) -> Option<usize> {
        let snapshot = self.host.snapshot();
        let count = self.fields.len();
        let start = after.map_or(0, |i| i + 1);
        (0..count)
            .map(|k| (start + k) % count)
            .find(|&j| !snapshot.is_filled(&self.fields[j].name))
    }

    fn all_filled(&self) -> bool {
        let snapshot = self.host.snapshot();
        self.fields.iter().all(|f| snapshot.is_filled(&f.name))
    }

    fn emit(&self, event: TraversalEvent) {
        let _ = self.control.events.send(event);
    }
}

impl<H: FormHost> Drop for FieldTraversal<H> {
    fn drop(&mut self) {
        self.control.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldKind, OptionSpec};
    use crate::speech_input::ScriptedRecognizer;
    use crate::speech_output::RecordingSynthesizer;

    #[derive(Default)]
    struct Form {
        values: FormSnapshot,
        focused: Vec<String>,
        submits: u32,
    }

    impl FormHost for Form {
        fn snapshot(&self) -> FormSnapshot {
            self.values.clone()
        }

        fn on_field_resolved(&mut self, field: &str, value: &str) {
            self.values.set(field, value);
        }

        fn on_field_focus(&mut self, field: &str) {
            self.focused.push(field.to_string());
        }

        fn on_submit(&mut self) {
            self.submits += 1;
        }
    }

    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new(
                "accountType",
                "Account type",
                "Savings or current?",
                FieldKind::Select {
                    options: vec![OptionSpec::new("SAV", "Savings"), OptionSpec::new("CUR", "Current")],
                },
            ),
            FieldSpec::new("nominee", "Nominee", "Who is the nominee?", FieldKind::Text),
            FieldSpec::new("deposit", "Deposit", "Opening deposit?", FieldKind::Number),
        ]
    }

    fn traversal(form: Form, transcripts: &[&str]) -> (FieldTraversal<Form>, RecordingSynthesizer) {
        let tts = RecordingSynthesizer::new();
        let stt = ScriptedRecognizer::new(transcripts.iter().copied());
        let traversal = FieldTraversal::new(
            fields(),
            form,
            Arc::new(tts.clone()),
            Arc::new(stt),
            GuideConfig::default(),
        )
        .unwrap();
        (traversal, tts)
    }

    #[test]
    fn next_empty_wraps_and_skips_filled() {
        let mut form = Form::default();
        form.values.set("nominee", "Asha");
        let (t, _) = traversal(form, &[]);
        assert_eq!(t.next_empty(None), Some(0));
        assert_eq!(t.next_empty(Some(0)), Some(2));
        assert_eq!(t.next_empty(Some(2)), Some(0));
    }

    #[tokio::test]
    async fn skips_prefilled_fields() {
        let mut form = Form::default();
        form.values.set("accountType", "SAV");
        let (mut t, tts) = traversal(form, &["Asha Rao", "ten thousand", "confirm"]);

        let outcome = t.start_guided_session().await.unwrap();
        assert_eq!(outcome, SessionOutcome::Submitted);
        assert_eq!(t.host().focused, vec!["nominee", "deposit"]);
        assert_eq!(t.host().values.get("deposit"), Some("10000"));
        assert_eq!(t.host().submits, 1);
        assert!(!tts.spoken().iter().any(|s| s == "Savings or current?"));
    }

    #[tokio::test]
    async fn nothing_to_do_completes_immediately() {
        let form = Form {
            values: [("accountType", "SAV"), ("nominee", "Asha"), ("deposit", "500")]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let (mut t, tts) = traversal(form, &[]);
        assert_eq!(t.start_guided_session().await.unwrap(), SessionOutcome::Completed);
        assert_eq!(t.state().mode, TraversalMode::Completed);
        assert_eq!(t.host().submits, 0);
        assert_eq!(tts.spoken(), vec![GuideConfig::default().messages.nothing_to_do]);
    }

    #[tokio::test]
    async fn repeat_and_incomplete_submit_stay_on_field() {
        let (mut t, tts) = traversal(
            Form::default(),
            &["repeat", "submit", "current", "Ravi", "100", "confirm"],
        );
        assert_eq!(t.start_guided_session().await.unwrap(), SessionOutcome::Submitted);
        let spoken = tts.spoken();
        assert_eq!(spoken[0], "Savings or current?");
        assert_eq!(spoken[1], "Savings or current?");
        assert_eq!(spoken[2], "Some fields are still empty. Savings or current?");
        assert_eq!(t.host().values.get("accountType"), Some("CUR"));
    }

    #[tokio::test]
    async fn spoken_cancel_stops_session() {
        let (mut t, _) = traversal(Form::default(), &["savings", "cancel"]);
        let mut events = t.take_event_receiver().unwrap();
        assert_eq!(t.start_guided_session().await.unwrap(), SessionOutcome::Cancelled);
        assert_eq!(t.state().mode, TraversalMode::Cancelled);
        assert_eq!(t.state().current_field(), None);
        assert_eq!(t.host().values.get("nominee"), None);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(seen.last(), Some(&TraversalEvent::Cancelled));
        assert_eq!(seen.iter().filter(|e| **e == TraversalEvent::Cancelled).count(), 1);
    }

    #[tokio::test]
    async fn without_confirmation_completes_after_last_field() {
        let tts = RecordingSynthesizer::new();
        let stt = ScriptedRecognizer::new(["savings", "Ravi", "2500"]);
        let config = GuideConfig {
            confirm_before_submit: false,
            ..Default::default()
        };
        let mut t = FieldTraversal::new(fields(), Form::default(), Arc::new(tts.clone()), Arc::new(stt), config)
            .unwrap();
        assert_eq!(t.start_guided_session().await.unwrap(), SessionOutcome::Completed);
        assert_eq!(t.host().submits, 0);
        assert_eq!(tts.spoken().last().map(String::as_str), Some("Thank you, the form is complete."));
    }

    /// Fails any utterance equal to `failing`; completes the rest.
    struct FlakySynthesizer {
        failing: String,
    }

    impl SpeechSynthesizer for FlakySynthesizer {
        fn speak(&self, text: &str, _language: &str, on_done: crate::speech_output::UtteranceDone) {
            if text == self.failing {
                on_done(Err(VoiceError::Synthesis("audio device lost".into())));
            } else {
                on_done(Ok(()));
            }
        }

        fn cancel(&self) {}
    }

    #[tokio::test]
    async fn closing_message_failure_keeps_completion() {
        let config = GuideConfig {
            confirm_before_submit: false,
            ..Default::default()
        };
        let tts = FlakySynthesizer {
            failing: config.messages.completed.clone(),
        };
        let stt = ScriptedRecognizer::new(["savings", "Ravi", "2500"]);
        let mut t = FieldTraversal::new(fields(), Form::default(), Arc::new(tts), Arc::new(stt), config)
            .unwrap();
        let mut events = t.take_event_receiver().unwrap();

        assert_eq!(t.start_guided_session().await.unwrap(), SessionOutcome::Completed);
        assert_eq!(t.state().mode, TraversalMode::Completed);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(seen.last(), Some(&TraversalEvent::Completed));
        assert!(!seen.iter().any(|e| matches!(e, TraversalEvent::Aborted { .. })));
    }

    #[test]
    fn stop_all_when_idle_is_noop() {
        let (t, _) = traversal(Form::default(), &[]);
        assert!(!t.stop_all());
        assert_eq!(t.state(), TraversalState::default());
    }
}
