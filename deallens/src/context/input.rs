//! Run input and boundary validation.

use crate::config::AnalysisConfig;
use crate::errors::InvalidInputError;
use crate::model::normalize_text;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The original RFP document as handed to a run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawInput {
    /// Extracted document text.
    pub text: String,
    /// Where the text came from (file name, URL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Caller-supplied facts passed along to extraction.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub supplementary_info: BTreeMap<String, String>,
}

impl RawInput {
    /// Creates an input from document text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Sets the document source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Adds one supplementary entry.
    #[must_use]
    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.supplementary_info.insert(key.into(), value.into());
        self
    }

    /// Number of characters in the document text.
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

impl From<&str> for RawInput {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for RawInput {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// Input that passed the boundary contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedInput {
    /// The document.
    pub raw: RawInput,
    /// Competitors to profile, deduplicated and capped.
    pub competitors: Vec<String>,
    /// Non-fatal findings.
    pub warnings: Vec<String>,
}

/// Checks the run input against the boundary contract.
///
/// # Errors
///
/// Returns `InvalidInputError` for an empty document or a blank competitor
/// name. Everything else is repaired and reported as a warning.
pub fn validate_input(
    raw: RawInput,
    competitor_names: &[String],
    config: &AnalysisConfig,
) -> Result<ValidatedInput, InvalidInputError> {
    if raw.text.trim().is_empty() {
        return Err(InvalidInputError::empty_rfp());
    }

    let mut warnings = Vec::new();
    let chars = raw.char_count();
    if chars < config.min_input_chars {
        warnings.push(format!(
            "RFP text is short ({chars} characters, expected at least {}); extraction may be incomplete",
            config.min_input_chars
        ));
    }

    if let Some(position) = competitor_names.iter().position(|n| n.trim().is_empty()) {
        return Err(InvalidInputError::blank_competitor(position));
    }

    let names: &[String] = if competitor_names.is_empty() {
        if !config.default_competitors.is_empty() {
            warnings.push(format!(
                "no competitors supplied; using {} configured defaults",
                config.default_competitors.len()
            ));
        }
        &config.default_competitors
    } else {
        competitor_names
    };

    let mut seen = BTreeSet::new();
    let mut competitors = Vec::new();
    for name in names {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(normalize_text(trimmed)) {
            competitors.push(trimmed.to_string());
        } else {
            warnings.push(format!("duplicate competitor '{trimmed}' ignored"));
        }
    }

    if competitors.len() > config.max_competitors {
        let dropped = competitors.split_off(config.max_competitors);
        warnings.push(format!(
            "competitor list truncated to {}; dropped: {}",
            config.max_competitors,
            dropped.join(", ")
        ));
    }

    Ok(ValidatedInput {
        raw,
        competitors,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    fn long_text() -> RawInput {
        RawInput::new("x".repeat(200))
    }

    #[test]
    fn test_empty_text_rejected() {
        let err = validate_input(RawInput::new("  \n"), &[], &AnalysisConfig::default()).unwrap_err();
        assert_eq!(err.error_info.code, "INPUT-001-EMPTY_RFP");
    }

    #[test]
    fn test_blank_competitor_rejected() {
        let err = validate_input(long_text(), &names(&["Acme", " "]), &AnalysisConfig::default())
            .unwrap_err();
        assert_eq!(err.error_info.code, "INPUT-002-BLANK_COMPETITOR");
        assert_eq!(err.error_info.context.get("position"), Some(&"1".to_string()));
    }

    #[test]
    fn test_duplicates_collapse_first_spelling_wins() {
        let input = validate_input(
            long_text(),
            &names(&["Acme Corp", "acme  corp", "Globex"]),
            &AnalysisConfig::default(),
        )
        .unwrap();
        assert_eq!(input.competitors, names(&["Acme Corp", "Globex"]));
        assert_eq!(input.warnings.len(), 1);
        assert!(input.warnings[0].contains("duplicate"));
    }

    #[test]
    fn test_default_competitors_and_truncation() {
        let mut config = AnalysisConfig::default().with_default_competitors(["A", "B", "C"]);
        config.max_competitors = 2;

        let input = validate_input(long_text(), &[], &config).unwrap();
        assert_eq!(input.competitors, names(&["A", "B"]));
        assert!(input.warnings.iter().any(|w| w.contains("defaults")));
        assert!(input.warnings.iter().any(|w| w.contains("dropped: C")));
    }

    #[test]
    fn test_short_text_warns() {
        let input = validate_input(RawInput::new("tiny rfp"), &[], &AnalysisConfig::default()).unwrap();
        assert!(input.competitors.is_empty());
        assert_eq!(input.warnings.len(), 1);
        assert!(input.warnings[0].contains("8 characters"));
    }
}
