//! Natural-language parsers and the per-field dispatch over them.
//!
//! Everything here is pure: no engine access, no form state.

pub mod date;
pub mod matcher;
pub mod number;
pub mod time_slot;

pub use date::{parse_date, parse_date_iso};
pub use matcher::{best_match, ordinal_match, similarity, DEFAULT_MATCH_THRESHOLD};
pub use number::{parse_number, words_to_number};
pub use time_slot::parse_time_slot;

use crate::error::{VoiceError, VoiceResult};
use crate::field::{FieldKind, FieldSpec};
use chrono::NaiveDate;

/// Turn a transcript into the value to write for `field`.
///
/// Select fields that find nothing fail with `NoMatchFound`; every other
/// failure is `UnparseableInput`.
pub fn interpret(
    field: &FieldSpec,
    transcript: &str,
    today: NaiveDate,
    threshold: f32,
) -> VoiceResult<String> {
    let unparseable = || VoiceError::UnparseableInput {
        field: field.name.clone(),
        transcript: transcript.to_string(),
    };

    match &field.kind {
        FieldKind::Select { options } => best_match(transcript, options, threshold)
            .or_else(|| ordinal_match(transcript, options))
            .map(|option| option.value.clone())
            .ok_or_else(|| VoiceError::NoMatchFound {
                field: field.name.clone(),
                transcript: transcript.to_string(),
            }),
        FieldKind::Text => {
            let text = transcript.trim();
            if text.is_empty() {
                Err(unparseable())
            } else {
                Ok(text.to_string())
            }
        }
        FieldKind::Number => parse_number(transcript).ok_or_else(unparseable),
        FieldKind::Date => parse_date(transcript, today)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .ok_or_else(unparseable),
        FieldKind::TimeSlot { slots } => parse_time_slot(transcript, slots)
            .map(str::to_string)
            .ok_or_else(|| VoiceError::NoMatchFound {
                field: field.name.clone(),
                transcript: transcript.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::OptionSpec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn account_field() -> FieldSpec {
        FieldSpec::new(
            "bankAccount",
            "Bank account",
            "Which account?",
            FieldKind::Select {
                options: vec![OptionSpec::new("acc-hdfc", "HDFC"), OptionSpec::new("acc-sbi", "SBI")],
            },
        )
    }

    #[test]
    fn select_uses_matcher_then_ordinals() {
        let field = account_field();
        assert_eq!(interpret(&field, "sbi", today(), 0.3).unwrap(), "acc-sbi");
        assert_eq!(interpret(&field, "first account", today(), 0.3).unwrap(), "acc-hdfc");
        assert!(matches!(
            interpret(&field, "axis bank", today(), 0.3),
            Err(VoiceError::NoMatchFound { .. })
        ));
    }

    #[test]
    fn text_is_trimmed_and_required() {
        let field = FieldSpec::new("remarks", "Remarks", "Any remarks?", FieldKind::Text);
        assert_eq!(interpret(&field, "  lost my card ", today(), 0.3).unwrap(), "lost my card");
        assert!(matches!(
            interpret(&field, "   ", today(), 0.3),
            Err(VoiceError::UnparseableInput { .. })
        ));
    }

    #[test]
    fn number_and_date_dispatch() {
        let amount = FieldSpec::new("amount", "Amount", "How much?", FieldKind::Number);
        assert_eq!(interpret(&amount, "five hundred", today(), 0.3).unwrap(), "500");
        assert!(interpret(&amount, "lots", today(), 0.3).is_err());

        let visit = FieldSpec::new("visitDate", "Visit date", "Which day?", FieldKind::Date);
        assert_eq!(interpret(&visit, "17th of february", today(), 0.3).unwrap(), "2026-02-17");
        assert!(interpret(&visit, "soon", today(), 0.3).is_err());
    }

    #[test]
    fn time_slot_dispatch() {
        let slot = FieldSpec::new(
            "slot",
            "Slot",
            "When?",
            FieldKind::TimeSlot {
                slots: vec!["09:00 AM - 10:00 AM".into()],
            },
        );
        assert_eq!(interpret(&slot, "morning", today(), 0.3).unwrap(), "09:00 AM - 10:00 AM");
        assert!(matches!(
            interpret(&slot, "evening", today(), 0.3),
            Err(VoiceError::NoMatchFound { .. })
        ));
    }
}
