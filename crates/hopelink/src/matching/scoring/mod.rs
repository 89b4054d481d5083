//! Weighted multi-criteria scoring of donation/request(/volunteer) candidates.
//!
//! The final score is the weighted sum of five normalized factors. Perishable donations
//! multiply the geographic factor by `1 + perishable_geographic_boost`; critical requests
//! multiply the aggregate by `1 + critical_urgency_boost`. Both results are clamped to [0,1].

mod factors;
pub mod geo;

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Donation, DonationRequest, Urgency, UserId, UserProfile, Volunteer};
use super::parameters::{MatchingFactor, MatchingParameters};
use geo::haversine_km;

/// Contributions closer than this to the strongest one are also named in the reason.
const DOMINANCE_MARGIN: f64 = 0.05;

/// Users whose reliability is averaged for a pairing, whoever asks about it.
pub fn pair_parties<'a>(donation: &'a Donation, request: &'a DonationRequest) -> [&'a UserId; 2] {
    [&donation.donor_id, &request.requester_id]
}

/// Pairing under evaluation. `counterparts` are the profiles of [`pair_parties`].
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub donation: &'a Donation,
    pub request: &'a DonationRequest,
    pub volunteer: Option<&'a Volunteer>,
    pub counterparts: Vec<&'a UserProfile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelLeg {
    DonationToRequest,
    VolunteerToDonation,
}

/// Hard filter that removes a candidate before scoring.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Exclusion {
    #[error("donation is no longer available")]
    DonationUnavailable,
    #[error("request is no longer open")]
    RequestClosed,
    #[error("volunteer is not available")]
    VolunteerUnavailable,
    #[error("{leg:?} distance {distance_km:.1} km exceeds limit of {limit_km:.1} km")]
    BeyondMaxDistance {
        leg: TravelLeg,
        distance_km: f64,
        limit_km: f64,
    },
    #[error("donation covers {ratio:.2} of the request, below minimum {minimum:.2}")]
    InsufficientQuantity { ratio: f64, minimum: f64 },
}

/// Discrete contribution to a score, allowing transparent audits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorScore {
    pub factor: MatchingFactor,
    pub weight: f64,
    pub value: f64,
    pub contribution: f64,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AppliedBoost {
    PerishableProximity { multiplier: f64 },
    CriticalUrgency { multiplier: f64 },
}

/// Score output with its decision trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchScore {
    /// Final score in [0,1].
    pub score: f64,
    /// Weighted sum before the critical urgency multiplier.
    pub base_score: f64,
    /// Longest travel leg in kilometres.
    pub distance_km: f64,
    pub components: Vec<FactorScore>,
    pub boosts: Vec<AppliedBoost>,
}

impl MatchScore {
    pub fn component(&self, factor: MatchingFactor) -> Option<&FactorScore> {
        self.components
            .iter()
            .find(|component| component.factor == factor)
    }

    /// Factors whose contribution is within the dominance margin of the strongest one.
    pub fn dominant_factors(&self) -> Vec<MatchingFactor> {
        let mut ranked: Vec<&FactorScore> = self
            .components
            .iter()
            .filter(|component| component.contribution > 0.0)
            .collect();
        ranked.sort_by(|a, b| {
            b.contribution
                .total_cmp(&a.contribution)
                .then_with(|| a.factor.cmp(&b.factor))
        });

        let Some(top) = ranked.first().map(|component| component.contribution) else {
            return Vec::new();
        };

        ranked
            .into_iter()
            .take_while(|component| top - component.contribution <= DOMINANCE_MARGIN)
            .take(2)
            .map(|component| component.factor)
            .collect()
    }

    /// Human readable explanation naming the dominant factor(s) and any boosts.
    pub fn match_reason(&self) -> String {
        let phrases: Vec<&str> = self
            .dominant_factors()
            .into_iter()
            .map(MatchingFactor::phrase)
            .collect();

        let mut reason = if phrases.is_empty() {
            "Weak overall fit".to_string()
        } else {
            let joined = phrases.join(" and ");
            let mut chars = joined.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => joined,
            }
        };

        for boost in &self.boosts {
            match boost {
                AppliedBoost::PerishableProximity { .. } => {
                    reason.push_str("; perishable item prioritised nearby")
                }
                AppliedBoost::CriticalUrgency { .. } => {
                    reason.push_str("; critical request boosted")
                }
            }
        }

        reason
    }
}

/// Deterministic ordering: score descending, then earliest created, then id.
pub fn rank_order(
    (score_a, created_a, id_a): (f64, DateTime<Utc>, &str),
    (score_b, created_b, id_b): (f64, DateTime<Utc>, &str),
) -> Ordering {
    score_b
        .total_cmp(&score_a)
        .then_with(|| created_a.cmp(&created_b))
        .then_with(|| id_a.cmp(id_b))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Open,
    Claimed,
}

/// Stateless evaluator that applies a parameter set to candidates.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    parameters: MatchingParameters,
}

impl ScoringEngine {
    pub fn new(parameters: MatchingParameters) -> Self {
        Self { parameters }
    }

    pub fn parameters(&self) -> &MatchingParameters {
        &self.parameters
    }

    /// Score an open donation/request pairing, or report the hard filter that excludes it.
    pub fn evaluate(
        &self,
        candidate: &Candidate<'_>,
        now: DateTime<Utc>,
    ) -> Result<MatchScore, Exclusion> {
        self.evaluate_at(candidate, now, Stage::Open)
    }

    /// Score a volunteer against an already claimed pairing. Availability and quantity
    /// gates were settled by the claim; only the travel legs are filtered.
    pub fn evaluate_assignment(
        &self,
        candidate: &Candidate<'_>,
        now: DateTime<Utc>,
    ) -> Result<MatchScore, Exclusion> {
        self.evaluate_at(candidate, now, Stage::Claimed)
    }

    fn evaluate_at(
        &self,
        candidate: &Candidate<'_>,
        now: DateTime<Utc>,
        stage: Stage,
    ) -> Result<MatchScore, Exclusion> {
        let Candidate {
            donation,
            request,
            volunteer,
            counterparts,
        } = candidate;
        let params = &self.parameters;
        let max_km = params.max_distance_km as f64;

        if stage == Stage::Open {
            if !donation.is_claimable(now) {
                return Err(Exclusion::DonationUnavailable);
            }
            if !request.is_open() {
                return Err(Exclusion::RequestClosed);
            }
        }

        let mut distance_km = haversine_km(donation.location, request.location);
        if distance_km > max_km {
            return Err(Exclusion::BeyondMaxDistance {
                leg: TravelLeg::DonationToRequest,
                distance_km,
                limit_km: max_km,
            });
        }

        if let Some(volunteer) = volunteer {
            if !volunteer.available {
                return Err(Exclusion::VolunteerUnavailable);
            }
            let leg = haversine_km(volunteer.location, donation.location);
            let limit_km = max_km.min(volunteer.service_radius_km.max(0.0));
            if leg > limit_km {
                return Err(Exclusion::BeyondMaxDistance {
                    leg: TravelLeg::VolunteerToDonation,
                    distance_km: leg,
                    limit_km,
                });
            }
            distance_km = distance_km.max(leg);
        }

        let ratio = match stage {
            Stage::Open => factors::quantity_ratio(donation, request),
            Stage::Claimed => 1.0,
        };
        if ratio < params.min_quantity_match_ratio {
            return Err(Exclusion::InsufficientQuantity {
                ratio,
                minimum: params.min_quantity_match_ratio,
            });
        }

        let mut boosts = Vec::new();

        let raw_proximity = factors::geographic_proximity(distance_km, max_km);
        let proximity = if donation.perishable && params.perishable_geographic_boost > 0.0 {
            let multiplier = 1.0 + params.perishable_geographic_boost;
            boosts.push(AppliedBoost::PerishableProximity { multiplier });
            (raw_proximity * multiplier).min(1.0)
        } else {
            raw_proximity
        };
        let proximity_notes = format!(
            "{distance_km:.1} km of {max_km:.0} km limit{}",
            if donation.perishable {
                ", perishable"
            } else {
                ""
            }
        );

        let (item, item_notes) = factors::item_compatibility(donation, request, ratio);
        let (urgency, urgency_notes) = factors::urgency_alignment(request.urgency, raw_proximity);
        let (reliability, reliability_notes) = factors::user_reliability(counterparts);
        let (delivery, delivery_notes) =
            factors::delivery_compatibility(donation, request, volunteer.is_some());

        let components: Vec<FactorScore> = [
            (MatchingFactor::GeographicProximity, proximity, proximity_notes),
            (MatchingFactor::ItemCompatibility, item, item_notes),
            (MatchingFactor::UrgencyAlignment, urgency, urgency_notes),
            (MatchingFactor::UserReliability, reliability, reliability_notes),
            (MatchingFactor::DeliveryCompatibility, delivery, delivery_notes),
        ]
        .into_iter()
        .map(|(factor, value, notes)| {
            let weight = params.weights.get(factor);
            FactorScore {
                factor,
                weight,
                value,
                contribution: weight * value,
                notes,
            }
        })
        .collect();

        let base_score = components
            .iter()
            .map(|component| component.contribution)
            .sum::<f64>()
            .clamp(0.0, 1.0);

        let score = if request.urgency == Urgency::Critical && params.critical_urgency_boost > 0.0
        {
            let multiplier = 1.0 + params.critical_urgency_boost;
            boosts.push(AppliedBoost::CriticalUrgency { multiplier });
            (base_score * multiplier).clamp(0.0, 1.0)
        } else {
            base_score
        };

        Ok(MatchScore {
            score,
            base_score,
            distance_km,
            components,
            boosts,
        })
    }
}
