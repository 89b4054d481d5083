use serde::{Deserialize, Serialize};

use super::model::{MatchingFactor, MatchingParameters, ParameterUpdate};
use super::validation::{validate, ParameterValidationError};

/// Scalar value of a single parameter field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Flag(bool),
    Integer(u32),
    Number(f64),
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterValue::Flag(value) => write!(f, "{value}"),
            ParameterValue::Integer(value) => write!(f, "{value}"),
            ParameterValue::Number(value) => write!(f, "{value:.3}"),
        }
    }
}

/// One field that differs between the stored snapshot and the pending edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterChange {
    pub field: String,
    pub previous: ParameterValue,
    pub current: ParameterValue,
}

fn fields(parameters: &MatchingParameters) -> Vec<(String, ParameterValue)> {
    let mut out: Vec<(String, ParameterValue)> = MatchingFactor::ALL
        .into_iter()
        .map(|factor| {
            (
                format!("weights.{}", factor.key()),
                ParameterValue::Number(parameters.weights.get(factor)),
            )
        })
        .collect();

    out.extend([
        (
            "auto_match_enabled".to_string(),
            ParameterValue::Flag(parameters.auto_match_enabled),
        ),
        (
            "auto_match_threshold".to_string(),
            ParameterValue::Number(parameters.auto_match_threshold),
        ),
        (
            "auto_claim_threshold".to_string(),
            ParameterValue::Number(parameters.auto_claim_threshold),
        ),
        (
            "max_distance_km".to_string(),
            ParameterValue::Integer(parameters.max_distance_km),
        ),
        (
            "min_quantity_match_ratio".to_string(),
            ParameterValue::Number(parameters.min_quantity_match_ratio),
        ),
        (
            "perishable_geographic_boost".to_string(),
            ParameterValue::Number(parameters.perishable_geographic_boost),
        ),
        (
            "critical_urgency_boost".to_string(),
            ParameterValue::Number(parameters.critical_urgency_boost),
        ),
    ]);

    out
}

/// Field-by-field difference between two configurations, in declaration order.
pub fn diff(previous: &MatchingParameters, current: &MatchingParameters) -> Vec<ParameterChange> {
    fields(previous)
        .into_iter()
        .zip(fields(current))
        .filter(|((_, before), (_, after))| before != after)
        .map(|((field, before), (_, after))| ParameterChange {
            field,
            previous: before,
            current: after,
        })
        .collect()
}

/// Immutable snapshot of the stored configuration paired with a pending edit.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDraft {
    original: MatchingParameters,
    pending: MatchingParameters,
}

impl ParameterDraft {
    pub fn new(original: MatchingParameters) -> Self {
        Self {
            pending: original.clone(),
            original,
        }
    }

    pub fn original(&self) -> &MatchingParameters {
        &self.original
    }

    pub fn pending(&self) -> &MatchingParameters {
        &self.pending
    }

    /// Layer an edit over the current pending state.
    pub fn apply(&mut self, update: &ParameterUpdate) {
        self.pending = update.apply_to(&self.pending);
    }

    pub fn with_update(mut self, update: &ParameterUpdate) -> Self {
        self.apply(update);
        self
    }

    pub fn is_dirty(&self) -> bool {
        self.original != self.pending
    }

    pub fn changes(&self) -> Vec<ParameterChange> {
        diff(&self.original, &self.pending)
    }

    /// Drop pending edits and return to the snapshot.
    pub fn discard(&mut self) {
        self.pending = self.original.clone();
    }

    /// Validate the pending edit and hand it back for persistence.
    pub fn commit(self) -> Result<(MatchingParameters, Vec<ParameterChange>), ParameterValidationError> {
        validate(&self.pending)?;
        let changes = self.changes();
        Ok((self.pending, changes))
    }
}
