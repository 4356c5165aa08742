//! FormVox console driver
//!
//! Runs one guided session against a form definition, speaking prompts to the
//! terminal and reading answers from stdin (or from `FORMVOX_SCRIPT`, a
//! `;`-separated list of transcripts). Blank lines are skipped; end of input
//! counts as speech ending without a result. Ctrl-C stops the session.

use formvox_voice::{
    FieldTraversal, FormDefinition, FormHost, FormSnapshot, GuideConfig, RecognitionDone,
    RecognitionOutcome, RecognitionSettings, ScriptedRecognizer, SpeechRecognizer,
    SpeechSynthesizer, TraversalEvent, UtteranceDone, VoiceResult,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FORM_PATH: &str = "forms/fund-transfer.toml";

/// Prints utterances instead of playing them.
struct ConsoleSynthesizer;

impl SpeechSynthesizer for ConsoleSynthesizer {
    fn speak(&self, text: &str, _language: &str, on_done: UtteranceDone) {
        println!("🔊 {}", text);
        on_done(Ok(()));
    }

    fn cancel(&self) {}
}

/// One non-blank stdin line per recognition session.
struct StdinRecognizer {
    lines: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>>,
    session: Mutex<Option<JoinHandle<()>>>,
}

impl StdinRecognizer {
    fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines().map_while(Result::ok) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self {
            lines: Arc::new(tokio::sync::Mutex::new(rx)),
            session: Mutex::new(None),
        }
    }
}

impl SpeechRecognizer for StdinRecognizer {
    fn start(&self, _settings: &RecognitionSettings, on_outcome: RecognitionDone) -> VoiceResult<()> {
        let lines = Arc::clone(&self.lines);
        let handle = tokio::spawn(async move {
            let outcome = next_answer(&mut *lines.lock().await).await;
            on_outcome(outcome);
        });
        if let Ok(mut session) = self.session.lock() {
            *session = Some(handle);
        }
        print!("🎙️ > ");
        let _ = std::io::Write::flush(&mut std::io::stdout());
        Ok(())
    }

    fn abort(&self) {
        if let Some(handle) = self.session.lock().ok().and_then(|mut s| s.take()) {
            handle.abort();
        }
    }
}

/// Next non-blank line, or `NoResult` once stdin is closed.
async fn next_answer(lines: &mut mpsc::UnboundedReceiver<String>) -> RecognitionOutcome {
    while let Some(text) = lines.recv().await {
        if !text.trim().is_empty() {
            return RecognitionOutcome::Transcript(text);
        }
    }
    RecognitionOutcome::NoResult
}

#[derive(Default)]
struct ConsoleForm {
    values: FormSnapshot,
    submitted: bool,
}

impl FormHost for ConsoleForm {
    fn snapshot(&self) -> FormSnapshot {
        self.values.clone()
    }

    fn on_field_resolved(&mut self, field: &str, value: &str) {
        self.values.set(field, value);
    }

    fn on_field_focus(&mut self, field: &str) {
        tracing::debug!(field, "focus");
    }

    fn on_submit(&mut self) {
        self.submitted = true;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[formvox-daemon] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GuideConfig::load()?;
    let form_path = std::env::var("FORMVOX_FORM")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_FORM_PATH));
    let form = FormDefinition::load(&form_path)?;

    let recognizer: Arc<dyn SpeechRecognizer> = match std::env::var("FORMVOX_SCRIPT") {
        Ok(script) => Arc::new(ScriptedRecognizer::new(
            script.split(';').map(str::trim).filter(|s| !s.is_empty()),
        )),
        Err(_) => Arc::new(StdinRecognizer::spawn()),
    };

    tracing::info!(
        form = %form.title,
        fields = form.fields.len(),
        language = %config.language,
        "FormVox daemon started"
    );

    let mut traversal = FieldTraversal::new(
        form.fields.clone(),
        ConsoleForm::default(),
        Arc::new(ConsoleSynthesizer),
        recognizer,
        config,
    )?;

    if let Some(mut events) = traversal.take_event_receiver() {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    TraversalEvent::FieldResolved { field, value } => {
                        tracing::info!(%field, %value, "field resolved")
                    }
                    TraversalEvent::RetryRequested { field, attempt, reason } => {
                        tracing::info!(%field, attempt, %reason, "retrying")
                    }
                    TraversalEvent::Aborted { reason } => tracing::warn!(%reason, "session aborted"),
                    other => tracing::debug!(?other, "traversal event"),
                }
            }
        });
    }

    if let Some(description) = &form.description {
        traversal.explain_service(description).await?;
    }

    let control = traversal.control();
    tokio::select! {
        result = traversal.start_guided_session() => match result {
            Ok(outcome) => tracing::info!(?outcome, "session finished"),
            Err(e) => tracing::warn!(error = %e, "session ended early"),
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("CTRL-C received; stopping session");
            control.stop_all();
        }
    }

    let form = traversal.host();
    for (field, value) in form.values.iter() {
        tracing::info!(%field, %value, "final value");
    }
    let report = serde_json::json!({
        "state": traversal.state(),
        "submitted": form.submitted,
        "values": form.values,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blank_lines_are_skipped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        for line in ["", "   ", "first account"] {
            tx.send(line.to_string()).unwrap();
        }
        drop(tx);

        assert_eq!(
            next_answer(&mut rx).await,
            RecognitionOutcome::Transcript("first account".to_string())
        );
        assert_eq!(next_answer(&mut rx).await, RecognitionOutcome::NoResult);
    }
}
