use serde::Serialize;

use super::model::{FactorWeights, MatchingFactor, MatchingParameters};

/// Allowed deviation of the weight sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.05;

// Absorbs float noise so a sum of exactly 1.05 sits on the accepted boundary.
const FLOAT_SLACK: f64 = 1e-9;

/// Validation errors raised before parameters are persisted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterValidationError {
    #[error("weights must sum to 100% (currently {percentage:.1}%)")]
    WeightSum { percentage: f64 },
    #[error("weight for {factor:?} must be between 0 and 1 (found {value})")]
    WeightOutOfRange { factor: MatchingFactor, value: f64 },
    #[error("{field} must be between 0 and 1 (found {value})")]
    OutOfUnitRange { field: &'static str, value: f64 },
    #[error(
        "auto_claim_threshold ({auto_claim:.2}) must be at least auto_match_threshold ({auto_match:.2})"
    )]
    ThresholdOrder { auto_match: f64, auto_claim: f64 },
    #[error("max_distance_km must be greater than zero")]
    ZeroDistance,
}

/// Advisory summary of a weight configuration, used for live form feedback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightSumReport {
    pub sum: f64,
    pub percentage: f64,
    pub valid: bool,
}

pub fn weight_sum_report(weights: &FactorWeights) -> WeightSumReport {
    let sum = weights.sum();
    WeightSumReport {
        sum,
        percentage: sum * 100.0,
        valid: weight_sum_within_tolerance(sum),
    }
}

fn weight_sum_within_tolerance(sum: f64) -> bool {
    sum.is_finite() && (sum - 1.0).abs() <= WEIGHT_SUM_TOLERANCE + FLOAT_SLACK
}

pub fn validate_weights(weights: &FactorWeights) -> Result<(), ParameterValidationError> {
    for (factor, value) in weights.iter() {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(ParameterValidationError::WeightOutOfRange { factor, value });
        }
    }

    let report = weight_sum_report(weights);
    if !report.valid {
        return Err(ParameterValidationError::WeightSum {
            percentage: report.percentage,
        });
    }

    Ok(())
}

fn unit_range(field: &'static str, value: f64) -> Result<(), ParameterValidationError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ParameterValidationError::OutOfUnitRange { field, value })
    }
}

/// Full server-side check applied to every configuration before it is trusted.
pub fn validate(parameters: &MatchingParameters) -> Result<(), ParameterValidationError> {
    validate_weights(&parameters.weights)?;

    unit_range("auto_match_threshold", parameters.auto_match_threshold)?;
    unit_range("auto_claim_threshold", parameters.auto_claim_threshold)?;
    if parameters.auto_claim_threshold < parameters.auto_match_threshold {
        return Err(ParameterValidationError::ThresholdOrder {
            auto_match: parameters.auto_match_threshold,
            auto_claim: parameters.auto_claim_threshold,
        });
    }

    if parameters.max_distance_km == 0 {
        return Err(ParameterValidationError::ZeroDistance);
    }

    unit_range(
        "min_quantity_match_ratio",
        parameters.min_quantity_match_ratio,
    )?;
    unit_range(
        "perishable_geographic_boost",
        parameters.perishable_geographic_boost,
    )?;
    unit_range("critical_urgency_boost", parameters.critical_urgency_boost)?;

    Ok(())
}
