use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{
    Donation, DonationId, DonationRequest, MatchId, MatchRecord, RequestId, UserId, UserProfile,
    Volunteer,
};

/// Error enumeration for data-layer failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    /// A conditional update lost against a concurrent writer.
    #[error("record changed concurrently: {0}")]
    Stale(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Conditional claim of donation stock on behalf of an open request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimCommand {
    pub donation_id: DonationId,
    pub request_id: RequestId,
    pub quantity: u32,
    /// Remaining quantity observed when the candidate was scored.
    pub expected_remaining: u32,
    /// Outstanding request quantity observed when the candidate was scored.
    pub expected_outstanding: u32,
}

/// Read side of donations, requests, volunteers, and users plus match persistence.
pub trait MatchingRepository: Send + Sync {
    fn donation(&self, id: &DonationId) -> Result<Option<Donation>, RepositoryError>;
    fn request(&self, id: &RequestId) -> Result<Option<DonationRequest>, RepositoryError>;
    fn volunteer(&self, id: &UserId) -> Result<Option<Volunteer>, RepositoryError>;
    fn user(&self, id: &UserId) -> Result<Option<UserProfile>, RepositoryError>;

    fn donations(&self) -> Result<Vec<Donation>, RepositoryError>;
    fn open_requests(&self) -> Result<Vec<DonationRequest>, RepositoryError>;

    /// Atomically move `quantity` units from the donation to the request. The request stays
    /// open until its full quantity is covered.
    ///
    /// Must fail with [`RepositoryError::Stale`] when the donation's remaining quantity no
    /// longer equals `expected_remaining`, the request's outstanding quantity no longer equals
    /// `expected_outstanding`, or the request is no longer open.
    fn claim(&self, command: ClaimCommand) -> Result<(), RepositoryError>;

    fn insert_match(&self, record: MatchRecord) -> Result<MatchRecord, RepositoryError>;
    /// Replace a match when its stored version still equals `expected_version`.
    fn update_match(&self, record: MatchRecord, expected_version: u64)
        -> Result<(), RepositoryError>;
    fn find_match(
        &self,
        request_id: &RequestId,
        donation_id: &DonationId,
    ) -> Result<Option<MatchRecord>, RepositoryError>;
    fn matches_awaiting_volunteer(&self) -> Result<Vec<MatchRecord>, RepositoryError>;
}

/// Outbound notification hook (in-app feed, e-mail adapters).
pub trait MatchNotifier: Send + Sync {
    fn publish(&self, notification: MatchNotification) -> Result<(), NotificationError>;
}

/// Notification payload so routes and tests can assert integration boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchNotification {
    pub template: String,
    pub match_id: MatchId,
    pub recipients: Vec<UserId>,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
