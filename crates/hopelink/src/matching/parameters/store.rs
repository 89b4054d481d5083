use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::draft::ParameterChange;
use super::model::{MatchingContext, MatchingParameters};
use crate::matching::domain::UserId;
use crate::matching::repository::RepositoryError;

/// Persisted configuration for one matching context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredParameters {
    pub context: MatchingContext,
    pub parameters: MatchingParameters,
    pub version: u64,
    pub updated_by: Option<UserId>,
    pub updated_at: DateTime<Utc>,
}

impl StoredParameters {
    /// Initial record created the first time a context is read.
    pub fn defaults(context: MatchingContext, now: DateTime<Utc>) -> Self {
        Self {
            context,
            parameters: MatchingParameters::default(),
            version: 1,
            updated_by: None,
            updated_at: now,
        }
    }
}

/// Audit trail entry recorded for each accepted admin update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterAuditEntry {
    pub context: MatchingContext,
    pub version: u64,
    pub updated_by: UserId,
    pub updated_at: DateTime<Utc>,
    pub changes: Vec<ParameterChange>,
}

/// Storage abstraction for matching configuration.
pub trait ParameterRepository: Send + Sync {
    fn load(&self, context: MatchingContext) -> Result<Option<StoredParameters>, RepositoryError>;
    /// Insert the record unless the context already has one; returns the stored record.
    fn insert_if_absent(&self, record: StoredParameters) -> Result<StoredParameters, RepositoryError>;
    /// Replace the record when the stored version still equals `expected_version`.
    fn save(
        &self,
        record: StoredParameters,
        expected_version: u64,
        audit: ParameterAuditEntry,
    ) -> Result<(), RepositoryError>;
    fn history(&self, context: MatchingContext) -> Result<Vec<ParameterAuditEntry>, RepositoryError>;
}
