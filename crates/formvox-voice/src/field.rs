//! Form description types shared by the parsers and the traversal.
//!
//! A form is an ordered list of [`FieldSpec`]s. The order is the traversal order.
//! Values live in the caller's [`FormSnapshot`]; the engine only reads it.

use crate::error::{VoiceError, VoiceResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// One selectable choice of a `Select` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    /// Value written back to the form when this option is chosen.
    pub value: String,
    /// Human-readable label, also read aloud.
    pub label: String,
    /// Alternate phrasings used by the fuzzy matcher, compared case-insensitively.
    #[serde(default)]
    pub search_terms: Vec<String>,
}

impl OptionSpec {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            search_terms: Vec::new(),
        }
    }

    pub fn with_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_terms = terms
            .into_iter()
            .map(|t| t.into().trim().to_lowercase())
            .collect();
        self
    }
}

/// What kind of answer a field expects, and therefore which parser handles it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Select { options: Vec<OptionSpec> },
    Text,
    Date,
    Number,
    /// A select over appointment slots such as `"09:00 AM - 10:00 AM"`.
    TimeSlot { slots: Vec<String> },
}

impl FieldKind {
    pub fn tag(&self) -> &'static str {
        match self {
            FieldKind::Select { .. } => "select",
            FieldKind::Text => "text",
            FieldKind::Date => "date",
            FieldKind::Number => "number",
            FieldKind::TimeSlot { .. } => "time_slot",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    pub prompt: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        prompt: impl Into<String>,
        kind: FieldKind,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            prompt: prompt.into(),
            kind,
        }
    }
}

/// Caller-owned view of the form's current values.
///
/// A missing key and an empty (or whitespace-only) value both count as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormSnapshot(BTreeMap<String, String>);

impl FormSnapshot {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn clear(&mut self, field: &str) {
        self.0.remove(field);
    }

    pub fn is_filled(&self, field: &str) -> bool {
        self.get(field).is_some_and(|v| !v.trim().is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormSnapshot {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A named form loaded from TOML.
///
/// ```toml
/// title = "Fund transfer"
///
/// [[fields]]
/// name = "amount"
/// label = "Amount"
/// prompt = "How much would you like to transfer?"
/// kind = "number"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormDefinition {
    #[serde(default)]
    pub title: String,
    /// Narration for `explain_service`, if the form has one.
    #[serde(default)]
    pub description: Option<String>,
    pub fields: Vec<FieldSpec>,
}

impl FormDefinition {
    pub fn from_toml_str(source: &str) -> VoiceResult<Self> {
        let form: FormDefinition = toml::from_str(source)?;
        form.validate()?;
        Ok(form)
    }

    pub fn load(path: &Path) -> VoiceResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Field names must be unique and choice fields must offer at least one choice.
    pub fn validate(&self) -> VoiceResult<()> {
        validate_fields(&self.fields)
    }
}

pub(crate) fn validate_fields(fields: &[FieldSpec]) -> VoiceResult<()> {
    let mut seen = HashSet::new();
    for field in fields {
        if field.name.trim().is_empty() {
            return Err(VoiceError::Form("field with empty name".to_string()));
        }
        if !seen.insert(field.name.as_str()) {
            return Err(VoiceError::Form(format!("duplicate field name {}", field.name)));
        }
        match &field.kind {
            FieldKind::Select { options } if options.is_empty() => {
                return Err(VoiceError::Form(format!("select field {} has no options", field.name)));
            }
            FieldKind::TimeSlot { slots } if slots.is_empty() => {
                return Err(VoiceError::Form(format!("time slot field {} has no slots", field.name)));
            }
            _ => {}
        }
    }
    Ok(())
}
