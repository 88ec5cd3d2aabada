//! Requirements and RFP metadata.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single requirement extracted from the RFP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Stable identifier (e.g. "REQ-001").
    pub id: String,
    /// The requirement text.
    pub text: String,
    /// Free-form category (e.g. "Technical", "Operations").
    pub category: String,
    /// Whether the requirement is mandatory.
    pub is_mandatory: bool,
    /// The evaluation criterion this requirement is scored under, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criterion: Option<String>,
}

impl Requirement {
    /// Creates an untagged requirement.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        category: impl Into<String>,
        is_mandatory: bool,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            category: category.into(),
            is_mandatory,
            criterion: None,
        }
    }

    /// Tags the requirement with an evaluation criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: impl Into<String>) -> Self {
        self.criterion = Some(criterion.into());
        self
    }

    /// Returns the case/whitespace-insensitive form used for deduplication.
    #[must_use]
    pub fn normalized_text(&self) -> String {
        normalize_text(&self.text)
    }

    /// Returns true if the requirement is scored under `criterion`.
    #[must_use]
    pub fn is_under(&self, criterion: &str) -> bool {
        self.criterion.as_deref() == Some(criterion)
    }
}

/// Lowercases and collapses runs of whitespace.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits text into lowercase alphanumeric tokens of two or more characters.
#[must_use]
pub fn text_tokens(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}

/// Document-level facts that are not requirements.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RfpMetadata {
    /// Project title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Delivery timeline / SLA statement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    /// Budget range as stated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_range: Option<String>,
    /// Required submission format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_format: Option<String>,
}
