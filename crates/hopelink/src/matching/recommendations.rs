use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    DeliveryMode, Donation, DonationId, DonationRequest, MatchId, MatchRecord, MatchState,
    RequestId, Urgency, UserId, UserProfile, UserRole, Volunteer,
};
use super::gate::MatchGate;
use super::parameters::MatchingContext;
use super::scoring::{
    pair_parties, rank_order, Candidate, FactorScore, MatchScore, ScoringEngine,
};

/// Number of matches surfaced per subject when the caller does not ask for a limit.
pub const DEFAULT_RECOMMENDATION_LIMIT: usize = 5;
pub const MAX_RECOMMENDATION_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationSummary {
    pub id: DonationId,
    pub donor_id: UserId,
    pub title: String,
    pub category: String,
    pub remaining_quantity: u32,
    pub perishable: bool,
    pub delivery_modes: Vec<DeliveryMode>,
    pub created_at: DateTime<Utc>,
}

impl From<&Donation> for DonationSummary {
    fn from(donation: &Donation) -> Self {
        Self {
            id: donation.id.clone(),
            donor_id: donation.donor_id.clone(),
            title: donation.title.clone(),
            category: donation.category.clone(),
            remaining_quantity: donation.remaining_quantity,
            perishable: donation.perishable,
            delivery_modes: donation.delivery_modes.clone(),
            created_at: donation.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub id: RequestId,
    pub requester_id: UserId,
    pub title: String,
    pub category: String,
    pub quantity: u32,
    pub outstanding_quantity: u32,
    pub urgency: Urgency,
    pub delivery_mode: DeliveryMode,
    pub created_at: DateTime<Utc>,
}

impl From<&DonationRequest> for RequestSummary {
    fn from(request: &DonationRequest) -> Self {
        Self {
            id: request.id.clone(),
            requester_id: request.requester_id.clone(),
            title: request.title.clone(),
            category: request.category.clone(),
            quantity: request.quantity,
            outstanding_quantity: request.outstanding_quantity(),
            urgency: request.urgency,
            delivery_mode: request.delivery_mode,
            created_at: request.created_at,
        }
    }
}

/// Claimed match still waiting for someone to carry it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOpportunity {
    pub match_id: MatchId,
    pub quantity: u32,
    pub donation: DonationSummary,
    pub request: RequestSummary,
}

/// Scored counterpart with its gate classification and explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate<T> {
    pub candidate: T,
    pub score: f64,
    pub eligibility: MatchState,
    pub match_reason: String,
    pub distance_km: f64,
    pub components: Vec<FactorScore>,
}

/// Role-specific recommendation group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    /// Donations suited to one of the recipient's open requests.
    DonationMatches {
        request: RequestSummary,
        matches: Vec<RankedCandidate<DonationSummary>>,
        excluded: usize,
    },
    /// Open requests suited to one of the donor's donations.
    RequestMatches {
        donation: DonationSummary,
        matches: Vec<RankedCandidate<RequestSummary>>,
        excluded: usize,
    },
    /// Claimed matches the volunteer could deliver.
    VolunteerOpportunities {
        volunteer_id: UserId,
        opportunities: Vec<RankedCandidate<DeliveryOpportunity>>,
        excluded: usize,
    },
}

impl Recommendation {
    pub fn kind(&self) -> &'static str {
        match self {
            Recommendation::DonationMatches { .. } => "donation_matches",
            Recommendation::RequestMatches { .. } => "request_matches",
            Recommendation::VolunteerOpportunities { .. } => "volunteer_opportunities",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Recommendation::DonationMatches { matches, .. } => matches.len(),
            Recommendation::RequestMatches { matches, .. } => matches.len(),
            Recommendation::VolunteerOpportunities { opportunities, .. } => opportunities.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Full response for one user and role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSet {
    pub user_id: UserId,
    pub role: UserRole,
    pub context: MatchingContext,
    pub generated_at: DateTime<Utc>,
    pub recommendations: Vec<Recommendation>,
}

/// Scores every candidate for a subject, ranks them deterministically, and keeps the top-K.
pub struct RecommendationAggregator<'a> {
    engine: &'a ScoringEngine,
    gate: MatchGate,
    users: &'a BTreeMap<UserId, UserProfile>,
    now: DateTime<Utc>,
    limit: usize,
}

struct Scored<T> {
    ranked: RankedCandidate<T>,
    created_at: DateTime<Utc>,
    id: String,
}

impl<'a> RecommendationAggregator<'a> {
    pub fn new(
        engine: &'a ScoringEngine,
        users: &'a BTreeMap<UserId, UserProfile>,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Self {
        Self {
            engine,
            gate: MatchGate::from_parameters(engine.parameters()),
            users,
            now,
            limit,
        }
    }

    fn rank<T>(&self, candidate: T, score: MatchScore) -> RankedCandidate<T> {
        RankedCandidate {
            candidate,
            score: score.score,
            eligibility: self.gate.classify(score.score),
            match_reason: score.match_reason(),
            distance_km: score.distance_km,
            components: score.components,
        }
    }

    fn top<T>(&self, mut scored: Vec<Scored<T>>) -> Vec<RankedCandidate<T>> {
        scored.sort_by(|a, b| {
            rank_order(
                (a.ranked.score, a.created_at, a.id.as_str()),
                (b.ranked.score, b.created_at, b.id.as_str()),
            )
        });
        scored.truncate(self.limit);
        scored.into_iter().map(|entry| entry.ranked).collect()
    }

    fn profiles<'u>(&'u self, ids: &[&UserId]) -> Vec<&'u UserProfile> {
        ids.iter().filter_map(|id| self.users.get(*id)).collect()
    }

    pub fn donation_matches(
        &self,
        request: &DonationRequest,
        donations: &[Donation],
    ) -> Recommendation {
        let mut excluded = 0;
        let mut scored = Vec::new();

        for donation in donations
            .iter()
            .filter(|donation| donation.donor_id != request.requester_id)
        {
            let candidate = Candidate {
                donation,
                request,
                volunteer: None,
                counterparts: self.profiles(&pair_parties(donation, request)),
            };
            match self.engine.evaluate(&candidate, self.now) {
                Ok(score) => scored.push(Scored {
                    ranked: self.rank(DonationSummary::from(donation), score),
                    created_at: donation.created_at,
                    id: donation.id.0.clone(),
                }),
                Err(_) => excluded += 1,
            }
        }

        Recommendation::DonationMatches {
            request: RequestSummary::from(request),
            matches: self.top(scored),
            excluded,
        }
    }

    pub fn request_matches(
        &self,
        donation: &Donation,
        requests: &[DonationRequest],
    ) -> Recommendation {
        let mut excluded = 0;
        let mut scored = Vec::new();

        for request in requests
            .iter()
            .filter(|request| request.requester_id != donation.donor_id)
        {
            let candidate = Candidate {
                donation,
                request,
                volunteer: None,
                counterparts: self.profiles(&pair_parties(donation, request)),
            };
            match self.engine.evaluate(&candidate, self.now) {
                Ok(score) => scored.push(Scored {
                    ranked: self.rank(RequestSummary::from(request), score),
                    created_at: request.created_at,
                    id: request.id.0.clone(),
                }),
                Err(_) => excluded += 1,
            }
        }

        Recommendation::RequestMatches {
            donation: DonationSummary::from(donation),
            matches: self.top(scored),
            excluded,
        }
    }

    pub fn volunteer_opportunities(
        &self,
        volunteer: &Volunteer,
        pending: &[(MatchRecord, Donation, DonationRequest)],
    ) -> Recommendation {
        let mut excluded = 0;
        let mut scored = Vec::new();

        for (record, donation, request) in pending {
            let candidate = Candidate {
                donation,
                request,
                volunteer: Some(volunteer),
                counterparts: self.profiles(&pair_parties(donation, request)),
            };
            match self.engine.evaluate_assignment(&candidate, self.now) {
                Ok(score) => scored.push(Scored {
                    ranked: self.rank(
                        DeliveryOpportunity {
                            match_id: record.id.clone(),
                            quantity: record.quantity,
                            donation: DonationSummary::from(donation),
                            request: RequestSummary::from(request),
                        },
                        score,
                    ),
                    created_at: record.created_at,
                    id: record.id.0.clone(),
                }),
                Err(_) => excluded += 1,
            }
        }

        Recommendation::VolunteerOpportunities {
            volunteer_id: volunteer.user_id.clone(),
            opportunities: self.top(scored),
            excluded,
        }
    }
}
