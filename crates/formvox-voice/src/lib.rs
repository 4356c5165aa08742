//! # FormVox Voice - Guided Form Completion
//!
//! Walks the empty fields of a form by voice: speak a prompt, capture one
//! utterance, interpret it for the field, write it back, move on. Ends on a
//! spoken confirmation, a cancel, or `stop_all`.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      FieldTraversal                           │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐      │
//! │  │ SpeechOutput │ → │ SpeechInput  │ → │ CommandRouter│      │
//! │  │  (prompt)    │   │ (one-shot)   │   │ confirm/stop │      │
//! │  └──────────────┘   └──────────────┘   └──────┬───────┘      │
//! │                                               ↓ value        │
//! │  ┌──────────────┐   ┌──────────────────────────────────┐     │
//! │  │   FormHost   │ ← │ parse: select / date / number /   │     │
//! │  │ (write-back) │   │        time slot / text           │     │
//! │  └──────────────┘   └──────────────────────────────────┘     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both speech engines sit behind callback traits ([`SpeechSynthesizer`],
//! [`SpeechRecognizer`]). Completions from a cancelled or superseded session are
//! dropped, so a late engine callback never writes into a newer session.

pub mod command;
pub mod config;
pub mod error;
pub mod field;
pub mod parse;
pub mod speech_input;
pub mod speech_output;
pub mod traversal;

pub use command::{CommandRouter, VoiceCommand};
pub use config::{CommandWords, GuideConfig, Messages};
pub use error::{VoiceError, VoiceResult};
pub use field::{FieldKind, FieldSpec, FormDefinition, FormSnapshot, OptionSpec};
pub use parse::{
    best_match, interpret, ordinal_match, parse_date, parse_date_iso, parse_number, parse_time_slot,
    similarity, DEFAULT_MATCH_THRESHOLD,
};
pub use speech_input::{
    RecognitionDone, RecognitionOutcome, RecognitionSettings, ScriptedRecognizer, SpeechInput,
    SpeechRecognizer,
};
pub use speech_output::{RecordingSynthesizer, SpeechOutput, SpeechSynthesizer, UtteranceDone};
pub use traversal::{
    FieldTraversal, FormHost, SessionControl, SessionOutcome, TraversalEvent, TraversalMode,
    TraversalState,
};
