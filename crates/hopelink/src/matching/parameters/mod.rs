mod draft;
mod model;
mod store;
mod validation;

pub use draft::{diff, ParameterChange, ParameterDraft, ParameterValue};
pub use model::{
    FactorWeights, MatchingContext, MatchingFactor, MatchingParameters, ParameterUpdate,
    WeightUpdate,
};
pub use store::{ParameterAuditEntry, ParameterRepository, StoredParameters};
pub use validation::{
    validate, validate_weights, weight_sum_report, ParameterValidationError, WeightSumReport,
    WEIGHT_SUM_TOLERANCE,
};
