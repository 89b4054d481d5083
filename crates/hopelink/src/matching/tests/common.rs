use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::matching::domain::{
    DeliveryMode, Donation, DonationId, DonationRequest, DonationStatus, GeoPoint, MatchRecord,
    RequestId, RequestStatus, Urgency, UserId, UserProfile, UserRole, Volunteer,
};
use crate::matching::memory::{
    InMemoryMatchingRepository, InMemoryNotifier, InMemoryParameterRepository,
};
use crate::matching::parameters::MatchingParameters;
use crate::matching::repository::{ClaimCommand, MatchingRepository, RepositoryError};
use crate::matching::scoring::geo::offset_north;
use crate::matching::scoring::{Candidate, ScoringEngine};
use crate::matching::{matching_router, InMemoryMatchingService, MatchingService};

/// Downtown Des Moines.
pub(super) fn origin() -> GeoPoint {
    GeoPoint::new(41.5868, -93.625)
}

pub(super) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn days_ago(days: i64) -> DateTime<Utc> {
    fixed_now() - Duration::days(days)
}

pub(super) fn user(id: &str, role: UserRole) -> UserProfile {
    UserProfile {
        id: UserId(id.to_string()),
        display_name: id.replace('-', " "),
        role,
        rating_total: 0.0,
        rating_count: 0,
    }
}

pub(super) fn rated_user(id: &str, role: UserRole, average: f64, count: u32) -> UserProfile {
    UserProfile {
        rating_total: average * count as f64,
        rating_count: count,
        ..user(id, role)
    }
}

/// Ten units of `category` offered `distance_km` north of the origin.
pub(super) fn donation(id: &str, donor: &str, category: &str, distance_km: f64) -> Donation {
    Donation {
        id: DonationId(id.to_string()),
        donor_id: UserId(donor.to_string()),
        title: format!("{category} bundle"),
        category: category.to_string(),
        tags: Vec::new(),
        quantity: 10,
        remaining_quantity: 10,
        perishable: false,
        location: offset_north(origin(), distance_km),
        delivery_modes: vec![DeliveryMode::Pickup, DeliveryMode::DirectDelivery],
        status: DonationStatus::Available,
        created_at: days_ago(3),
        expires_at: None,
    }
}

/// Open request for five units at the origin.
pub(super) fn request(id: &str, requester: &str, category: &str, urgency: Urgency) -> DonationRequest {
    DonationRequest {
        id: RequestId(id.to_string()),
        requester_id: UserId(requester.to_string()),
        title: format!("Need {category}"),
        category: category.to_string(),
        tags: Vec::new(),
        quantity: 5,
        fulfilled_quantity: 0,
        urgency,
        location: origin(),
        delivery_mode: DeliveryMode::Pickup,
        status: RequestStatus::Open,
        created_at: days_ago(1),
        needed_by: None,
    }
}

pub(super) fn volunteer(id: &str, distance_km: f64, radius_km: f64) -> Volunteer {
    Volunteer {
        user_id: UserId(id.to_string()),
        location: offset_north(origin(), distance_km),
        service_radius_km: radius_km,
        available: true,
        created_at: days_ago(30),
    }
}

pub(super) fn engine() -> ScoringEngine {
    ScoringEngine::new(MatchingParameters::default())
}

pub(super) fn candidate<'a>(
    donation: &'a Donation,
    request: &'a DonationRequest,
    counterparts: &'a [UserProfile],
) -> Candidate<'a> {
    Candidate {
        donation,
        request,
        volunteer: None,
        counterparts: counterparts.iter().collect(),
    }
}

/// Repository with two donors, a recipient, and a volunteer, but no listings.
pub(super) fn people_repository() -> InMemoryMatchingRepository {
    let repository = InMemoryMatchingRepository::default();
    for profile in [
        rated_user("donor-1", UserRole::Donor, 4.5, 12),
        user("donor-2", UserRole::Donor),
        user("recipient-1", UserRole::Recipient),
        user("recipient-2", UserRole::Recipient),
        user("volunteer-1", UserRole::Volunteer),
        user("volunteer-2", UserRole::Volunteer),
    ] {
        repository.put_user(profile).expect("seed user");
    }
    repository
        .put_volunteer(volunteer("volunteer-1", 2.0, 25.0))
        .expect("seed volunteer");
    repository
        .put_volunteer(volunteer("volunteer-2", 3.0, 25.0))
        .expect("seed volunteer");
    repository
}

/// Pantry scenario: a critical food request with a close match and a distant mismatch.
pub(super) fn pantry_repository() -> InMemoryMatchingRepository {
    let repository = people_repository();
    repository
        .put_donation(donation("don-near", "donor-2", "food", 5.0))
        .expect("seed donation");
    repository
        .put_donation(donation("don-far", "donor-1", "clothing", 40.0))
        .expect("seed donation");
    repository
        .put_request(request("req-1", "recipient-1", "food", Urgency::Critical))
        .expect("seed request");
    repository
        .put_request(request("req-2", "recipient-2", "food", Urgency::Low))
        .expect("seed request");
    repository
}

pub(super) struct Harness {
    pub(super) service: Arc<InMemoryMatchingService>,
    pub(super) repository: Arc<InMemoryMatchingRepository>,
    pub(super) parameters: Arc<InMemoryParameterRepository>,
    pub(super) notifier: Arc<InMemoryNotifier>,
}

pub(super) fn harness(repository: InMemoryMatchingRepository) -> Harness {
    let repository = Arc::new(repository);
    let parameters = Arc::new(InMemoryParameterRepository::default());
    let notifier = Arc::new(InMemoryNotifier::default());
    let service = Arc::new(MatchingService::new(
        repository.clone(),
        parameters.clone(),
        notifier.clone(),
    ));
    Harness {
        service,
        repository,
        parameters,
        notifier,
    }
}

pub(super) fn router_for(harness: &Harness) -> axum::Router {
    matching_router(harness.service.clone())
}

pub(super) struct UnavailableRepository;

impl MatchingRepository for UnavailableRepository {
    fn donation(&self, _id: &DonationId) -> Result<Option<Donation>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn request(&self, _id: &RequestId) -> Result<Option<DonationRequest>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn volunteer(&self, _id: &UserId) -> Result<Option<Volunteer>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn user(&self, _id: &UserId) -> Result<Option<UserProfile>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn donations(&self) -> Result<Vec<Donation>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn open_requests(&self) -> Result<Vec<DonationRequest>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn claim(&self, _command: ClaimCommand) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert_match(&self, _record: MatchRecord) -> Result<MatchRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_match(
        &self,
        _record: MatchRecord,
        _expected_version: u64,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_match(
        &self,
        _request_id: &RequestId,
        _donation_id: &DonationId,
    ) -> Result<Option<MatchRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn matches_awaiting_volunteer(&self) -> Result<Vec<MatchRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
