//! Weighted matching between donations, requests, and volunteers.

pub mod domain;
pub mod gate;
pub mod memory;
pub mod parameters;
pub mod recommendations;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;

pub use domain::{
    DeliveryMode, Donation, DonationId, DonationRequest, DonationStatus, GeoPoint, MatchId,
    MatchRecord, MatchState, RequestId, RequestStatus, Urgency, UserId, UserProfile, UserRole,
    Volunteer,
};
pub use gate::{InvalidTransition, MatchGate};
pub use memory::{InMemoryMatchingRepository, InMemoryNotifier, InMemoryParameterRepository};
pub use recommendations::{
    Recommendation, RecommendationAggregator, RecommendationSet, DEFAULT_RECOMMENDATION_LIMIT,
    MAX_RECOMMENDATION_LIMIT,
};
pub use repository::{
    ClaimCommand, MatchNotification, MatchNotifier, MatchingRepository, NotificationError,
    RepositoryError,
};
pub use router::matching_router;
pub use scoring::{Candidate, Exclusion, MatchScore, ScoringEngine};
pub use service::{MatchOutcome, MatchingError, MatchingService};

/// Service wired to the in-process repositories.
pub type InMemoryMatchingService =
    MatchingService<InMemoryMatchingRepository, InMemoryParameterRepository, InMemoryNotifier>;

#[cfg(test)]
mod tests;
