use super::domain::MatchState;
use super::parameters::MatchingParameters;

/// Threshold policy deciding how far a scored candidate may be expedited.
///
/// Eligibility is advisory: even `AutoClaimable` candidates are only persisted through an
/// explicit match request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchGate {
    enabled: bool,
    auto_match_threshold: f64,
    auto_claim_threshold: f64,
}

impl MatchGate {
    pub fn from_parameters(parameters: &MatchingParameters) -> Self {
        Self {
            enabled: parameters.auto_match_enabled,
            auto_match_threshold: parameters.auto_match_threshold,
            auto_claim_threshold: parameters.auto_claim_threshold,
        }
    }

    pub fn classify(&self, score: f64) -> MatchState {
        if !self.enabled {
            return MatchState::Suggested;
        }

        if score >= self.auto_claim_threshold {
            MatchState::AutoClaimable
        } else if score >= self.auto_match_threshold {
            MatchState::AutoMatchable
        } else {
            MatchState::Suggested
        }
    }
}

impl From<&MatchingParameters> for MatchGate {
    fn from(parameters: &MatchingParameters) -> Self {
        Self::from_parameters(parameters)
    }
}

/// Transition error for the per-candidate state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move candidate from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: MatchState,
    pub to: MatchState,
}

impl MatchState {
    /// Move a freshly scored candidate into its gate classification.
    pub fn gate(self, gate: &MatchGate, score: f64) -> Result<MatchState, InvalidTransition> {
        let to = gate.classify(score);
        match self {
            MatchState::Scored => Ok(to),
            from => Err(InvalidTransition { from, to }),
        }
    }

    /// Explicit confirmation (`Claim` / `Match`) persisting the candidate.
    pub fn confirm(self) -> Result<MatchState, InvalidTransition> {
        match self {
            MatchState::Suggested | MatchState::AutoMatchable | MatchState::AutoClaimable => {
                Ok(MatchState::Claimed)
            }
            from => Err(InvalidTransition {
                from,
                to: MatchState::Claimed,
            }),
        }
    }

    pub fn is_expedited(self) -> bool {
        matches!(self, MatchState::AutoMatchable | MatchState::AutoClaimable)
    }
}
