use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{
    Donation, DonationId, DonationRequest, MatchId, MatchRecord, MatchState, RequestId, UserId,
    UserProfile, UserRole, Volunteer,
};
use super::gate::{InvalidTransition, MatchGate};
use super::parameters::{
    validate, MatchingContext, MatchingParameters, ParameterAuditEntry, ParameterDraft,
    ParameterRepository, ParameterUpdate, ParameterValidationError, StoredParameters,
};
use super::recommendations::{
    Recommendation, RecommendationAggregator, RecommendationSet, DEFAULT_RECOMMENDATION_LIMIT,
    MAX_RECOMMENDATION_LIMIT,
};
use super::repository::{
    ClaimCommand, MatchNotification, MatchNotifier, MatchingRepository, RepositoryError,
};
use super::scoring::{pair_parties, Candidate, ScoringEngine};

/// Error raised by the matching service. None of these are fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum MatchingError {
    #[error(transparent)]
    Validation(#[from] ParameterValidationError),
    /// The candidate was claimed, expired, or otherwise changed since it was recommended.
    #[error("candidate is no longer available: {reason}")]
    StaleCandidate { reason: String },
    #[error("conflicting update: {0}")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("a match for this request and donation is already being processed")]
    InFlight,
    #[error("limit must be between 1 and {max} (found {found})")]
    InvalidLimit { found: usize, max: usize },
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
    /// Data layer could not be reached; callers may retry.
    #[error("matching data temporarily unavailable: {0}")]
    Transient(String),
}

impl MatchingError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, MatchingError::Transient(_) | MatchingError::InFlight)
    }

    fn stale(reason: impl Into<String>) -> Self {
        MatchingError::StaleCandidate {
            reason: reason.into(),
        }
    }
}

impl From<RepositoryError> for MatchingError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict => MatchingError::Conflict("record already exists".to_string()),
            RepositoryError::NotFound => MatchingError::NotFound("record".to_string()),
            RepositoryError::Stale(reason) => MatchingError::StaleCandidate { reason },
            RepositoryError::Unavailable(reason) => MatchingError::Transient(reason),
        }
    }
}

/// Result of `create_smart_match`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchOutcome {
    pub success: bool,
    /// False when an existing match was returned for a repeated submission.
    pub created: bool,
    pub volunteer_assigned: bool,
    #[serde(rename = "match")]
    pub record: MatchRecord,
}

static MATCH_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_match_id() -> MatchId {
    let id = MATCH_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    MatchId(format!("match-{id:06}"))
}

type PairKey = (RequestId, DonationId);

/// Releases the pair when the submission finishes, successfully or not.
pub(crate) struct InFlightGuard<'a> {
    pending: &'a Mutex<HashSet<PairKey>>,
    key: PairKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&self.key);
        }
    }
}

/// Service composing parameter storage, the scoring engine, and match persistence.
pub struct MatchingService<R, P, N> {
    repository: Arc<R>,
    parameters: Arc<P>,
    notifier: Arc<N>,
    default_limit: usize,
    pending: Mutex<HashSet<PairKey>>,
}

impl<R, P, N> MatchingService<R, P, N>
where
    R: MatchingRepository + 'static,
    P: ParameterRepository + 'static,
    N: MatchNotifier + 'static,
{
    pub fn new(repository: Arc<R>, parameters: Arc<P>, notifier: Arc<N>) -> Self {
        Self {
            repository,
            parameters,
            notifier,
            default_limit: DEFAULT_RECOMMENDATION_LIMIT,
            pending: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit.clamp(1, MAX_RECOMMENDATION_LIMIT);
        self
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Stored configuration for a context, created with defaults on first access.
    pub fn active_parameters(
        &self,
        context: MatchingContext,
    ) -> Result<StoredParameters, MatchingError> {
        let stored = match self.parameters.load(context)? {
            Some(stored) => stored,
            None => {
                info!(%context, "initialising matching parameters with defaults");
                self.parameters
                    .insert_if_absent(StoredParameters::defaults(context, Utc::now()))?
            }
        };

        validate(&stored.parameters)?;
        Ok(stored)
    }

    /// All contexts and their active parameters.
    pub fn get_matching_parameters(
        &self,
    ) -> Result<BTreeMap<MatchingContext, MatchingParameters>, MatchingError> {
        MatchingContext::ALL
            .into_iter()
            .map(|context| {
                self.active_parameters(context)
                    .map(|stored| (context, stored.parameters))
            })
            .collect()
    }

    /// Validate and persist an admin edit. Unchanged edits return the current record.
    pub fn update_matching_parameters(
        &self,
        context: MatchingContext,
        updates: ParameterUpdate,
        admin_user_id: UserId,
    ) -> Result<StoredParameters, MatchingError> {
        let current = self.active_parameters(context)?;
        let draft = ParameterDraft::new(current.parameters.clone()).with_update(&updates);

        if !draft.is_dirty() {
            debug!(%context, "parameter update carried no changes");
            return Ok(current);
        }

        let (parameters, changes) = draft.commit().map_err(|err| {
            warn!(%context, admin = %admin_user_id, error = %err, "rejected parameter update");
            err
        })?;

        let now = Utc::now();
        let record = StoredParameters {
            context,
            parameters,
            version: current.version + 1,
            updated_by: Some(admin_user_id.clone()),
            updated_at: now,
        };
        let audit = ParameterAuditEntry {
            context,
            version: record.version,
            updated_by: admin_user_id.clone(),
            updated_at: now,
            changes,
        };
        let change_count = audit.changes.len();

        self.parameters
            .save(record.clone(), current.version, audit)
            .map_err(|err| match err {
                RepositoryError::Stale(reason) => MatchingError::Conflict(reason),
                other => other.into(),
            })?;

        info!(
            %context,
            version = record.version,
            changes = change_count,
            admin = %admin_user_id,
            "matching parameters updated"
        );
        Ok(record)
    }

    pub fn parameter_history(
        &self,
        context: MatchingContext,
    ) -> Result<Vec<ParameterAuditEntry>, MatchingError> {
        Ok(self.parameters.history(context)?)
    }

    pub fn get_matching_recommendations(
        &self,
        user_id: &UserId,
        role: UserRole,
        limit: Option<usize>,
    ) -> Result<RecommendationSet, MatchingError> {
        self.recommendations_at(user_id, role, limit, Utc::now())
    }

    /// Recommendations evaluated at a fixed instant.
    pub fn recommendations_at(
        &self,
        user_id: &UserId,
        role: UserRole,
        limit: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<RecommendationSet, MatchingError> {
        let limit = limit.unwrap_or(self.default_limit);
        if limit == 0 || limit > MAX_RECOMMENDATION_LIMIT {
            return Err(MatchingError::InvalidLimit {
                found: limit,
                max: MAX_RECOMMENDATION_LIMIT,
            });
        }

        let context = MatchingContext::for_volunteer(role == UserRole::Volunteer);
        let engine = ScoringEngine::new(self.active_parameters(context)?.parameters);

        let recommendations = match role {
            UserRole::Recipient => {
                let donations = self.repository.donations()?;
                let requests: Vec<DonationRequest> = self
                    .repository
                    .open_requests()?
                    .into_iter()
                    .filter(|request| &request.requester_id == user_id)
                    .collect();
                let users = self.load_users(
                    donations
                        .iter()
                        .map(|donation| &donation.donor_id)
                        .chain(std::iter::once(user_id)),
                )?;
                let aggregator = RecommendationAggregator::new(&engine, &users, now, limit);
                requests
                    .iter()
                    .map(|request| aggregator.donation_matches(request, &donations))
                    .collect::<Vec<Recommendation>>()
            }
            UserRole::Donor => {
                let donations: Vec<Donation> = self
                    .repository
                    .donations()?
                    .into_iter()
                    .filter(|donation| &donation.donor_id == user_id && donation.is_claimable(now))
                    .collect();
                let requests = self.repository.open_requests()?;
                let users = self.load_users(
                    requests
                        .iter()
                        .map(|request| &request.requester_id)
                        .chain(std::iter::once(user_id)),
                )?;
                let aggregator = RecommendationAggregator::new(&engine, &users, now, limit);
                donations
                    .iter()
                    .map(|donation| aggregator.request_matches(donation, &requests))
                    .collect()
            }
            UserRole::Volunteer => {
                let volunteer = self
                    .repository
                    .volunteer(user_id)?
                    .ok_or_else(|| MatchingError::NotFound(format!("volunteer {user_id}")))?;
                let pending = self.pending_deliveries()?;
                let users = self.load_users(pending.iter().flat_map(|(_, donation, request)| {
                    [&donation.donor_id, &request.requester_id]
                }))?;
                let aggregator = RecommendationAggregator::new(&engine, &users, now, limit);
                vec![aggregator.volunteer_opportunities(&volunteer, &pending)]
            }
        };

        debug!(
            user = %user_id,
            role = role.label(),
            groups = recommendations.len(),
            surfaced = recommendations.iter().map(Recommendation::len).sum::<usize>(),
            "recommendations computed"
        );

        Ok(RecommendationSet {
            user_id: user_id.clone(),
            role,
            context,
            generated_at: now,
            recommendations,
        })
    }

    /// Create (or idempotently return) the match for a request/donation pair.
    pub fn create_smart_match(
        &self,
        request_id: &RequestId,
        donation_id: &DonationId,
        volunteer_id: Option<&UserId>,
    ) -> Result<MatchOutcome, MatchingError> {
        let _guard = self.begin(request_id, donation_id)?;

        if let Some(existing) = self.repository.find_match(request_id, donation_id)? {
            return self.resolve_existing(existing, volunteer_id);
        }

        let now = Utc::now();
        let request = self
            .repository
            .request(request_id)?
            .ok_or_else(|| MatchingError::NotFound(format!("request {request_id}")))?;
        let donation = self
            .repository
            .donation(donation_id)?
            .ok_or_else(|| MatchingError::NotFound(format!("donation {donation_id}")))?;
        let volunteer = match volunteer_id {
            Some(id) => Some(self.load_volunteer(id)?),
            None => None,
        };

        let context = MatchingContext::for_volunteer(volunteer.is_some());
        let parameters = self.active_parameters(context)?.parameters;
        let engine = ScoringEngine::new(parameters);
        let gate = MatchGate::from_parameters(engine.parameters());

        let users = self.party_profiles(&donation, &request)?;
        let candidate = Candidate {
            donation: &donation,
            request: &request,
            volunteer: volunteer.as_ref(),
            counterparts: users.iter().collect(),
        };
        let score = engine.evaluate(&candidate, now).map_err(|exclusion| {
            info!(
                request = %request_id,
                donation = %donation_id,
                reason = %exclusion,
                "match rejected as stale"
            );
            MatchingError::stale(exclusion.to_string())
        })?;

        let eligibility = gate.classify(score.score);
        let state = MatchState::Scored
            .gate(&gate, score.score)?
            .confirm()?;

        let outstanding = request.outstanding_quantity();
        let quantity = if request.quantity == 0 {
            donation.remaining_quantity
        } else {
            outstanding.min(donation.remaining_quantity)
        };

        self.repository.claim(ClaimCommand {
            donation_id: donation_id.clone(),
            request_id: request_id.clone(),
            quantity,
            expected_remaining: donation.remaining_quantity,
            expected_outstanding: outstanding,
        })?;

        let record = MatchRecord {
            id: next_match_id(),
            request_id: request_id.clone(),
            donation_id: donation_id.clone(),
            volunteer_id: volunteer.as_ref().map(|volunteer| volunteer.user_id.clone()),
            delivery_mode: request.delivery_mode,
            quantity,
            score: score.score,
            eligibility,
            state,
            created_at: now,
            version: 1,
        };
        let record = self.repository.insert_match(record).map_err(|err| match err {
            RepositoryError::Conflict => MatchingError::stale("pair was matched concurrently"),
            other => other.into(),
        })?;

        let mut recipients = vec![donation.donor_id.clone(), request.requester_id.clone()];
        recipients.extend(record.volunteer_id.clone());
        self.notify("match_created", &record, recipients);

        info!(
            match_id = %record.id,
            request = %request_id,
            donation = %donation_id,
            score = record.score,
            eligibility = record.eligibility.label(),
            quantity,
            "smart match created"
        );

        Ok(MatchOutcome {
            success: true,
            created: true,
            volunteer_assigned: record.volunteer_id.is_some(),
            record,
        })
    }

    fn resolve_existing(
        &self,
        existing: MatchRecord,
        volunteer_id: Option<&UserId>,
    ) -> Result<MatchOutcome, MatchingError> {
        let unchanged = |record: MatchRecord| MatchOutcome {
            success: true,
            created: false,
            volunteer_assigned: false,
            record,
        };

        let volunteer_id = match (existing.volunteer_id.as_ref(), volunteer_id) {
            (_, None) => return Ok(unchanged(existing)),
            (Some(assigned), Some(requested)) if assigned == requested => {
                return Ok(unchanged(existing))
            }
            (Some(assigned), Some(_)) => {
                return Err(MatchingError::stale(format!(
                    "match {} is already assigned to volunteer {assigned}",
                    existing.id
                )))
            }
            (None, Some(requested)) => requested,
        };

        if !existing.awaiting_volunteer() {
            return Err(MatchingError::stale(format!(
                "match {} does not need volunteer delivery",
                existing.id
            )));
        }

        let volunteer = self.load_volunteer(volunteer_id)?;
        let request = self
            .repository
            .request(&existing.request_id)?
            .ok_or_else(|| MatchingError::NotFound(format!("request {}", existing.request_id)))?;
        let donation = self
            .repository
            .donation(&existing.donation_id)?
            .ok_or_else(|| {
                MatchingError::NotFound(format!("donation {}", existing.donation_id))
            })?;

        let parameters = self
            .active_parameters(MatchingContext::DonorRecipientVolunteer)?
            .parameters;
        let engine = ScoringEngine::new(parameters);
        let users = self.party_profiles(&donation, &request)?;
        let candidate = Candidate {
            donation: &donation,
            request: &request,
            volunteer: Some(&volunteer),
            counterparts: users.iter().collect(),
        };
        engine
            .evaluate_assignment(&candidate, Utc::now())
            .map_err(|exclusion| MatchingError::stale(exclusion.to_string()))?;

        let mut updated = existing.clone();
        updated.volunteer_id = Some(volunteer.user_id.clone());
        updated.version = existing.version + 1;
        self.repository.update_match(updated.clone(), existing.version)?;

        self.notify(
            "volunteer_assigned",
            &updated,
            vec![
                donation.donor_id.clone(),
                request.requester_id.clone(),
                volunteer.user_id.clone(),
            ],
        );
        info!(match_id = %updated.id, volunteer = %volunteer.user_id, "volunteer assigned");

        Ok(MatchOutcome {
            success: true,
            created: false,
            volunteer_assigned: true,
            record: updated,
        })
    }

    /// Reserve the pair for one submission; a second concurrent reservation fails.
    pub(crate) fn begin(
        &self,
        request_id: &RequestId,
        donation_id: &DonationId,
    ) -> Result<InFlightGuard<'_>, MatchingError> {
        let key = (request_id.clone(), donation_id.clone());
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| MatchingError::Transient("in-flight registry poisoned".to_string()))?;
        if !pending.insert(key.clone()) {
            return Err(MatchingError::InFlight);
        }
        Ok(InFlightGuard {
            pending: &self.pending,
            key,
        })
    }

    fn load_volunteer(&self, id: &UserId) -> Result<Volunteer, MatchingError> {
        self.repository
            .volunteer(id)?
            .ok_or_else(|| MatchingError::NotFound(format!("volunteer {id}")))
    }

    fn load_users<'i>(
        &self,
        ids: impl Iterator<Item = &'i UserId>,
    ) -> Result<BTreeMap<UserId, UserProfile>, MatchingError> {
        let mut users = BTreeMap::new();
        for id in ids {
            if users.contains_key(id) {
                continue;
            }
            if let Some(profile) = self.repository.user(id)? {
                users.insert(id.clone(), profile);
            }
        }
        Ok(users)
    }

    fn party_profiles(
        &self,
        donation: &Donation,
        request: &DonationRequest,
    ) -> Result<Vec<UserProfile>, MatchingError> {
        let users = self.load_users(pair_parties(donation, request).into_iter())?;
        Ok(users.into_values().collect())
    }

    fn pending_deliveries(
        &self,
    ) -> Result<Vec<(MatchRecord, Donation, DonationRequest)>, MatchingError> {
        let mut pending = Vec::new();
        for record in self.repository.matches_awaiting_volunteer()? {
            let donation = self.repository.donation(&record.donation_id)?;
            let request = self.repository.request(&record.request_id)?;
            match (donation, request) {
                (Some(donation), Some(request)) => pending.push((record, donation, request)),
                _ => warn!(match_id = %record.id, "skipping match with missing donation or request"),
            }
        }
        Ok(pending)
    }

    fn notify(&self, template: &str, record: &MatchRecord, recipients: Vec<UserId>) {
        let mut details = BTreeMap::new();
        details.insert("request_id".to_string(), record.request_id.0.clone());
        details.insert("donation_id".to_string(), record.donation_id.0.clone());
        details.insert("quantity".to_string(), record.quantity.to_string());
        details.insert("score".to_string(), format!("{:.3}", record.score));
        details.insert(
            "eligibility".to_string(),
            record.eligibility.label().to_string(),
        );

        let notification = MatchNotification {
            template: template.to_string(),
            match_id: record.id.clone(),
            recipients,
            details,
        };

        if let Err(err) = self.notifier.publish(notification) {
            warn!(match_id = %record.id, error = %err, "failed to publish match notification");
        }
    }
}
