//! Evaluation criteria with normalized weights.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Why a weight set could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeightError {
    /// No criteria were supplied.
    #[error("no evaluation criteria")]
    Empty,
    /// A weight was negative.
    #[error("criterion '{0}' has a negative weight")]
    Negative(String),
    /// A weight was NaN or infinite.
    #[error("criterion '{0}' has a non-finite weight")]
    NonFinite(String),
    /// Every weight was zero.
    #[error("criteria weights sum to zero")]
    ZeroTotal,
}

/// Mapping from criterion name to weight. Weights sum to 1.0.
///
/// Backed by a `BTreeMap` so iteration order, and therefore floating point
/// summation order, never depends on insertion order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationCriteria(BTreeMap<String, f64>);

impl EvaluationCriteria {
    /// Normalizes raw `(name, weight)` pairs.
    ///
    /// If no pair carries a weight, every criterion gets the same weight.
    /// Otherwise missing weights count as zero. Names are trimmed and merged
    /// case-insensitively (first spelling wins, weights add up).
    pub fn normalized<I, S>(raw: I) -> Result<Self, WeightError>
    where
        I: IntoIterator<Item = (S, Option<f64>)>,
        S: AsRef<str>,
    {
        let mut merged: Vec<(String, Option<f64>)> = Vec::new();
        for (name, weight) in raw {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            if let Some(w) = weight {
                if !w.is_finite() {
                    return Err(WeightError::NonFinite(name.to_string()));
                }
                if w < 0.0 {
                    return Err(WeightError::Negative(name.to_string()));
                }
            }
            match merged.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
                Some((_, existing)) => {
                    *existing = match (*existing, weight) {
                        (Some(a), Some(b)) => Some(a + b),
                        (a, b) => a.or(b),
                    };
                }
                None => merged.push((name.to_string(), weight)),
            }
        }

        if merged.is_empty() {
            return Err(WeightError::Empty);
        }

        let explicit = merged.iter().any(|(_, w)| w.is_some());
        let raw_weights: Vec<(String, f64)> = merged
            .into_iter()
            .map(|(n, w)| {
                let w = if explicit { w.unwrap_or(0.0) } else { 1.0 };
                (n, w)
            })
            .collect();

        let total: f64 = raw_weights.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return Err(WeightError::ZeroTotal);
        }

        Ok(Self(
            raw_weights
                .into_iter()
                .map(|(n, w)| (n, w / total))
                .collect(),
        ))
    }

    /// Uniform weights across the given names.
    pub fn uniform<I, S>(names: I) -> Result<Self, WeightError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::normalized(names.into_iter().map(|n| (n, None)))
    }

    /// Normalizes explicit weights.
    pub fn from_weights<I, S>(weights: I) -> Result<Self, WeightError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        Self::normalized(weights.into_iter().map(|(n, w)| (n, Some(w))))
    }

    /// Returns the weight of a criterion.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Finds the canonical criterion name matching `name` case-insensitively.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        self.0
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    /// Iterates criteria in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Criterion names in name order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Sum of all weights.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// Number of criteria.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no criteria.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentages_are_normalized() {
        let criteria = EvaluationCriteria::from_weights([("Technical", 60.0), ("Price", 40.0)]).unwrap();
        assert!((criteria.get("Technical").unwrap() - 0.6).abs() < 1e-12);
        assert!((criteria.get("Price").unwrap() - 0.4).abs() < 1e-12);
        assert!((criteria.total() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_weights_become_uniform() {
        let criteria = EvaluationCriteria::uniform(["Technical", "Price", "Management", "Security"]).unwrap();
        assert_eq!(criteria.len(), 4);
        for (_, w) in criteria.iter() {
            assert!((w - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn test_partial_weights_treat_missing_as_zero() {
        let criteria =
            EvaluationCriteria::normalized([("Technical", Some(3.0)), ("Price", None)]).unwrap();
        assert_eq!(criteria.get("Price"), Some(0.0));
        assert_eq!(criteria.get("Technical"), Some(1.0));
    }

    #[test]
    fn test_duplicates_merge_case_insensitively() {
        let criteria = EvaluationCriteria::from_weights([
            ("Technical", 0.3),
            ("technical ", 0.3),
            ("Price", 0.4),
        ])
        .unwrap();
        assert_eq!(criteria.len(), 2);
        assert!((criteria.get("Technical").unwrap() - 0.6).abs() < 1e-12);
        assert_eq!(criteria.resolve("TECHNICAL"), Some("Technical"));
    }

    #[test]
    fn test_invalid_weight_sets() {
        assert_eq!(
            EvaluationCriteria::from_weights([("A", 0.0), ("B", 0.0)]),
            Err(WeightError::ZeroTotal)
        );
        assert_eq!(
            EvaluationCriteria::from_weights([("A", -1.0)]),
            Err(WeightError::Negative("A".to_string()))
        );
        assert_eq!(
            EvaluationCriteria::from_weights([("A", f64::NAN)]),
            Err(WeightError::NonFinite("A".to_string()))
        );
        assert_eq!(
            EvaluationCriteria::uniform(Vec::<String>::new()),
            Err(WeightError::Empty)
        );
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let criteria = EvaluationCriteria::from_weights([("Price", 1.0)]).unwrap();
        assert_eq!(serde_json::to_value(&criteria).unwrap(), serde_json::json!({"Price": 1.0}));
    }
}
