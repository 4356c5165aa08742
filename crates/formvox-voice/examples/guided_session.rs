//! Example: Guided Session Dry Run
//!
//! Walks a two-field transfer form with scripted answers and prints every
//! traversal event. No audio devices are used.

use formvox_voice::{
    FieldTraversal, FormDefinition, FormHost, FormSnapshot, GuideConfig, RecordingSynthesizer,
    ScriptedRecognizer, TraversalEvent,
};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

const FORM: &str = r#"
title = "Fund transfer"
description = "Move money from one of your linked accounts."

[[fields]]
name = "bankAccount"
label = "Bank account"
prompt = "Which account should the money come from?"
kind = "select"
options = [
    { value = "acc-hdfc", label = "HDFC", search_terms = ["hdfc bank"] },
    { value = "acc-sbi", label = "SBI", search_terms = ["state bank"] },
]

[[fields]]
name = "amount"
label = "Amount"
prompt = "How much would you like to transfer?"
kind = "number"
"#;

#[derive(Default)]
struct PrintedForm {
    values: FormSnapshot,
    submitted: bool,
}

impl FormHost for PrintedForm {
    fn snapshot(&self) -> FormSnapshot {
        self.values.clone()
    }

    fn on_field_resolved(&mut self, field: &str, value: &str) {
        self.values.set(field, value);
    }

    fn on_submit(&mut self) {
        self.submitted = true;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("🗣️ FormVox Guided Session Dry Run");
    info!("==================================");

    let form = FormDefinition::from_toml_str(FORM)?;
    let tts = RecordingSynthesizer::new();
    let stt = ScriptedRecognizer::new(["first account", "five hundred", "confirm"]);

    let mut traversal = FieldTraversal::new(
        form.fields.clone(),
        PrintedForm::default(),
        Arc::new(tts.clone()),
        Arc::new(stt),
        GuideConfig::default(),
    )?;

    let mut events = traversal
        .take_event_receiver()
        .expect("Failed to get event receiver");

    if let Some(description) = &form.description {
        traversal.explain_service(description).await?;
    }

    let outcome = traversal.start_guided_session().await?;
    info!("Session ended: {:?}", outcome);

    while let Ok(event) = events.try_recv() {
        match event {
            TraversalEvent::FieldFocused { index, field } => info!("➡️  Field {} ({})", index, field),
            TraversalEvent::FieldResolved { field, value } => info!("✅ {} = {}", field, value),
            TraversalEvent::RetryRequested { field, attempt, reason } => {
                info!("🔁 {} attempt {}: {}", field, attempt, reason)
            }
            other => info!("{:?}", other),
        }
    }

    for line in tts.spoken() {
        info!("🔊 {}", line);
    }
    info!("Submitted: {}", traversal.host().submitted);
    info!("Values: {:?}", traversal.host().values);

    Ok(())
}
