//! Mutex-backed repositories used by the CLI, the demo server, and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    Donation, DonationId, DonationRequest, MatchId, MatchRecord, RequestId, UserId, UserProfile,
    Volunteer,
};
use super::parameters::{
    MatchingContext, ParameterAuditEntry, ParameterRepository, StoredParameters,
};
use super::repository::{
    ClaimCommand, MatchNotification, MatchNotifier, MatchingRepository, NotificationError,
    RepositoryError,
};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
}

#[derive(Debug, Default)]
struct MatchingState {
    donations: BTreeMap<DonationId, Donation>,
    requests: BTreeMap<RequestId, DonationRequest>,
    volunteers: BTreeMap<UserId, Volunteer>,
    users: BTreeMap<UserId, UserProfile>,
    matches: BTreeMap<MatchId, MatchRecord>,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryMatchingRepository {
    state: Arc<Mutex<MatchingState>>,
}

impl InMemoryMatchingRepository {
    pub fn put_donation(&self, donation: Donation) -> Result<(), RepositoryError> {
        lock(&self.state)?
            .donations
            .insert(donation.id.clone(), donation);
        Ok(())
    }

    pub fn put_request(&self, request: DonationRequest) -> Result<(), RepositoryError> {
        lock(&self.state)?
            .requests
            .insert(request.id.clone(), request);
        Ok(())
    }

    pub fn put_volunteer(&self, volunteer: Volunteer) -> Result<(), RepositoryError> {
        lock(&self.state)?
            .volunteers
            .insert(volunteer.user_id.clone(), volunteer);
        Ok(())
    }

    pub fn put_user(&self, user: UserProfile) -> Result<(), RepositoryError> {
        lock(&self.state)?.users.insert(user.id.clone(), user);
        Ok(())
    }

    pub fn matches(&self) -> Result<Vec<MatchRecord>, RepositoryError> {
        Ok(lock(&self.state)?.matches.values().cloned().collect())
    }
}

impl MatchingRepository for InMemoryMatchingRepository {
    fn donation(&self, id: &DonationId) -> Result<Option<Donation>, RepositoryError> {
        Ok(lock(&self.state)?.donations.get(id).cloned())
    }

    fn request(&self, id: &RequestId) -> Result<Option<DonationRequest>, RepositoryError> {
        Ok(lock(&self.state)?.requests.get(id).cloned())
    }

    fn volunteer(&self, id: &UserId) -> Result<Option<Volunteer>, RepositoryError> {
        Ok(lock(&self.state)?.volunteers.get(id).cloned())
    }

    fn user(&self, id: &UserId) -> Result<Option<UserProfile>, RepositoryError> {
        Ok(lock(&self.state)?.users.get(id).cloned())
    }

    fn donations(&self) -> Result<Vec<Donation>, RepositoryError> {
        Ok(lock(&self.state)?.donations.values().cloned().collect())
    }

    fn open_requests(&self) -> Result<Vec<DonationRequest>, RepositoryError> {
        Ok(lock(&self.state)?
            .requests
            .values()
            .filter(|request| request.is_open())
            .cloned()
            .collect())
    }

    fn claim(&self, command: ClaimCommand) -> Result<(), RepositoryError> {
        let mut state = lock(&self.state)?;

        let request = state
            .requests
            .get(&command.request_id)
            .ok_or(RepositoryError::NotFound)?;
        if !request.is_open() {
            return Err(RepositoryError::Stale(format!(
                "request {} is no longer open",
                command.request_id
            )));
        }
        if request.outstanding_quantity() != command.expected_outstanding {
            return Err(RepositoryError::Stale(format!(
                "request {} has {} outstanding, expected {}",
                command.request_id,
                request.outstanding_quantity(),
                command.expected_outstanding
            )));
        }
        let request_status = request.status_after_claim(command.quantity);

        let donation = state
            .donations
            .get_mut(&command.donation_id)
            .ok_or(RepositoryError::NotFound)?;
        if donation.remaining_quantity != command.expected_remaining {
            return Err(RepositoryError::Stale(format!(
                "donation {} has {} remaining, expected {}",
                command.donation_id, donation.remaining_quantity, command.expected_remaining
            )));
        }
        if command.quantity == 0 || command.quantity > donation.remaining_quantity {
            return Err(RepositoryError::Stale(format!(
                "donation {} cannot cover {} unit(s)",
                command.donation_id, command.quantity
            )));
        }

        donation.status = donation.status_after_claim(command.quantity);
        donation.remaining_quantity -= command.quantity;

        if let Some(request) = state.requests.get_mut(&command.request_id) {
            request.fulfilled_quantity = request.fulfilled_quantity.saturating_add(command.quantity);
            request.status = request_status;
        }

        Ok(())
    }

    fn insert_match(&self, record: MatchRecord) -> Result<MatchRecord, RepositoryError> {
        let mut state = lock(&self.state)?;
        let duplicate = state.matches.contains_key(&record.id)
            || state.matches.values().any(|existing| {
                existing.request_id == record.request_id
                    && existing.donation_id == record.donation_id
            });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        state.matches.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update_match(
        &self,
        record: MatchRecord,
        expected_version: u64,
    ) -> Result<(), RepositoryError> {
        let mut state = lock(&self.state)?;
        let current = state
            .matches
            .get(&record.id)
            .ok_or(RepositoryError::NotFound)?;
        if current.version != expected_version {
            return Err(RepositoryError::Stale(format!(
                "match {} is at version {}, expected {}",
                record.id, current.version, expected_version
            )));
        }
        state.matches.insert(record.id.clone(), record);
        Ok(())
    }

    fn find_match(
        &self,
        request_id: &RequestId,
        donation_id: &DonationId,
    ) -> Result<Option<MatchRecord>, RepositoryError> {
        Ok(lock(&self.state)?
            .matches
            .values()
            .find(|record| &record.request_id == request_id && &record.donation_id == donation_id)
            .cloned())
    }

    fn matches_awaiting_volunteer(&self) -> Result<Vec<MatchRecord>, RepositoryError> {
        Ok(lock(&self.state)?
            .matches
            .values()
            .filter(|record| record.awaiting_volunteer())
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
struct ParameterState {
    records: HashMap<MatchingContext, StoredParameters>,
    history: Vec<ParameterAuditEntry>,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryParameterRepository {
    state: Arc<Mutex<ParameterState>>,
}

impl ParameterRepository for InMemoryParameterRepository {
    fn load(&self, context: MatchingContext) -> Result<Option<StoredParameters>, RepositoryError> {
        Ok(lock(&self.state)?.records.get(&context).cloned())
    }

    fn insert_if_absent(
        &self,
        record: StoredParameters,
    ) -> Result<StoredParameters, RepositoryError> {
        let mut state = lock(&self.state)?;
        let stored = state
            .records
            .entry(record.context)
            .or_insert(record)
            .clone();
        Ok(stored)
    }

    fn save(
        &self,
        record: StoredParameters,
        expected_version: u64,
        audit: ParameterAuditEntry,
    ) -> Result<(), RepositoryError> {
        let mut state = lock(&self.state)?;
        let current_version = state
            .records
            .get(&record.context)
            .map(|existing| existing.version)
            .ok_or(RepositoryError::NotFound)?;
        if current_version != expected_version {
            return Err(RepositoryError::Stale(format!(
                "{} parameters are at version {}, expected {}",
                record.context, current_version, expected_version
            )));
        }
        state.records.insert(record.context, record);
        state.history.push(audit);
        Ok(())
    }

    fn history(
        &self,
        context: MatchingContext,
    ) -> Result<Vec<ParameterAuditEntry>, RepositoryError> {
        Ok(lock(&self.state)?
            .history
            .iter()
            .filter(|entry| entry.context == context)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryNotifier {
    events: Arc<Mutex<Vec<MatchNotification>>>,
}

impl InMemoryNotifier {
    pub fn events(&self) -> Vec<MatchNotification> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl MatchNotifier for InMemoryNotifier {
    fn publish(&self, notification: MatchNotification) -> Result<(), NotificationError> {
        self.events
            .lock()
            .map_err(|_| NotificationError::Transport("notifier mutex poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}
