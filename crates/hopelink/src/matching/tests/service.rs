use super::common::*;
use crate::matching::domain::{
    DeliveryMode, DonationId, DonationStatus, MatchState, RequestId, RequestStatus, Urgency,
    UserId, UserRole,
};
use crate::matching::memory::{InMemoryNotifier, InMemoryParameterRepository};
use crate::matching::parameters::{
    MatchingContext, MatchingParameters, ParameterRepository, ParameterUpdate,
    ParameterValidationError, WeightUpdate,
};
use crate::matching::recommendations::Recommendation;
use crate::matching::repository::MatchingRepository;
use crate::matching::{MatchingError, MatchingService};
use std::sync::Arc;

fn admin() -> UserId {
    UserId("admin-1".to_string())
}

fn ids(request: &str, donation: &str) -> (RequestId, DonationId) {
    (RequestId(request.to_string()), DonationId(donation.to_string()))
}

#[test]
fn parameters_are_created_with_defaults_on_first_read() {
    let harness = harness(pantry_repository());
    assert!(harness
        .parameters
        .load(MatchingContext::DonorRecipient)
        .expect("load")
        .is_none());

    let parameters = harness
        .service
        .get_matching_parameters()
        .expect("parameters load");

    assert_eq!(parameters.len(), 2);
    assert_eq!(
        parameters[&MatchingContext::DonorRecipientVolunteer],
        MatchingParameters::default()
    );
    let stored = harness
        .parameters
        .load(MatchingContext::DonorRecipient)
        .expect("load")
        .expect("defaults persisted");
    assert_eq!(stored.version, 1);
    assert!(stored.updated_by.is_none());
}

#[test]
fn accepted_update_bumps_version_and_records_audit() {
    let harness = harness(pantry_repository());
    let update = ParameterUpdate {
        auto_match_enabled: Some(true),
        max_distance_km: Some(30),
        ..ParameterUpdate::default()
    };

    let stored = harness
        .service
        .update_matching_parameters(MatchingContext::DonorRecipient, update, admin())
        .expect("update accepted");

    assert_eq!(stored.version, 2);
    assert_eq!(stored.updated_by, Some(admin()));
    assert!(stored.parameters.auto_match_enabled);
    assert_eq!(stored.parameters.max_distance_km, 30);

    let history = harness
        .service
        .parameter_history(MatchingContext::DonorRecipient)
        .expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].updated_by, admin());
    assert_eq!(history[0].changes.len(), 2);

    let untouched = harness
        .service
        .parameter_history(MatchingContext::DonorRecipientVolunteer)
        .expect("history");
    assert!(untouched.is_empty());
}

#[test]
fn invalid_update_is_rejected_and_leaves_store_untouched() {
    let harness = harness(pantry_repository());
    let update = ParameterUpdate {
        weights: Some(WeightUpdate {
            geographic_proximity: Some(0.40),
            ..WeightUpdate::default()
        }),
        ..ParameterUpdate::default()
    };

    match harness
        .service
        .update_matching_parameters(MatchingContext::DonorRecipient, update, admin())
    {
        Err(MatchingError::Validation(ParameterValidationError::WeightSum { percentage })) => {
            assert!((percentage - 110.0).abs() < 1e-6)
        }
        other => panic!("expected weight sum validation error, got {other:?}"),
    }

    let stored = harness
        .service
        .active_parameters(MatchingContext::DonorRecipient)
        .expect("active parameters");
    assert_eq!(stored.version, 1);
    assert_eq!(stored.parameters, MatchingParameters::default());
}

#[test]
fn empty_update_returns_current_record() {
    let harness = harness(pantry_repository());
    let stored = harness
        .service
        .update_matching_parameters(
            MatchingContext::DonorRecipient,
            ParameterUpdate::default(),
            admin(),
        )
        .expect("no-op update");
    assert_eq!(stored.version, 1);
    assert!(harness
        .service
        .parameter_history(MatchingContext::DonorRecipient)
        .expect("history")
        .is_empty());
}

#[test]
fn updated_parameters_apply_to_the_next_scoring_call() {
    let harness = harness(pantry_repository());
    let recipient = UserId("recipient-1".to_string());

    let before = harness
        .service
        .recommendations_at(&recipient, UserRole::Recipient, None, fixed_now())
        .expect("recommendations");
    assert_eq!(before.recommendations[0].len(), 2);

    harness
        .service
        .update_matching_parameters(
            MatchingContext::DonorRecipient,
            ParameterUpdate {
                max_distance_km: Some(10),
                ..ParameterUpdate::default()
            },
            admin(),
        )
        .expect("update accepted");

    let after = harness
        .service
        .recommendations_at(&recipient, UserRole::Recipient, None, fixed_now())
        .expect("recommendations");
    assert_eq!(after.recommendations[0].len(), 1);
}

#[test]
fn recipient_recommendations_rank_close_critical_match_first() {
    let harness = harness(pantry_repository());
    let set = harness
        .service
        .recommendations_at(
            &UserId("recipient-1".to_string()),
            UserRole::Recipient,
            None,
            fixed_now(),
        )
        .expect("recommendations");

    assert_eq!(set.context, MatchingContext::DonorRecipient);
    assert_eq!(set.recommendations.len(), 1);
    match &set.recommendations[0] {
        Recommendation::DonationMatches { request, matches, .. } => {
            assert_eq!(request.id.0, "req-1");
            assert_eq!(matches[0].candidate.id.0, "don-near");
            assert_eq!(matches[1].candidate.id.0, "don-far");
            assert!(matches[0].score > matches[1].score);
        }
        other => panic!("expected donation matches, got {other:?}"),
    }
}

#[test]
fn donor_recommendations_list_requests_per_donation() {
    let harness = harness(pantry_repository());
    let set = harness
        .service
        .recommendations_at(
            &UserId("donor-2".to_string()),
            UserRole::Donor,
            Some(1),
            fixed_now(),
        )
        .expect("recommendations");

    assert_eq!(set.recommendations.len(), 1);
    match &set.recommendations[0] {
        Recommendation::RequestMatches { donation, matches, .. } => {
            assert_eq!(donation.id.0, "don-near");
            assert_eq!(matches.len(), 1);
            assert_eq!(matches[0].candidate.id.0, "req-1");
        }
        other => panic!("expected request matches, got {other:?}"),
    }
}

#[test]
fn limit_outside_bounds_is_rejected() {
    let harness = harness(pantry_repository());
    let recipient = UserId("recipient-1".to_string());

    for limit in [0, 51] {
        match harness
            .service
            .get_matching_recommendations(&recipient, UserRole::Recipient, Some(limit))
        {
            Err(MatchingError::InvalidLimit { found, max }) => {
                assert_eq!(found, limit);
                assert_eq!(max, 50);
            }
            other => panic!("expected invalid limit, got {other:?}"),
        }
    }
}

#[test]
fn unknown_volunteer_is_not_found() {
    let harness = harness(pantry_repository());
    match harness.service.get_matching_recommendations(
        &UserId("ghost".to_string()),
        UserRole::Volunteer,
        None,
    ) {
        Err(MatchingError::NotFound(what)) => assert!(what.contains("ghost")),
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn create_smart_match_claims_stock_and_notifies() {
    let harness = harness(pantry_repository());
    let (request_id, donation_id) = ids("req-1", "don-near");

    let outcome = harness
        .service
        .create_smart_match(&request_id, &donation_id, None)
        .expect("match created");

    assert!(outcome.success);
    assert!(outcome.created);
    assert_eq!(outcome.record.state, MatchState::Claimed);
    assert_eq!(outcome.record.eligibility, MatchState::Suggested);
    assert_eq!(outcome.record.quantity, 5);

    let donation = harness
        .repository
        .donation(&donation_id)
        .expect("load")
        .expect("donation exists");
    assert_eq!(donation.remaining_quantity, 5);
    assert_eq!(donation.status, DonationStatus::PartiallyClaimed);

    let request = harness
        .repository
        .request(&request_id)
        .expect("load")
        .expect("request exists");
    assert_eq!(request.status, RequestStatus::Matched);

    let events = harness.notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].template, "match_created");
    assert_eq!(events[0].match_id, outcome.record.id);
    assert!(events[0]
        .recipients
        .contains(&UserId("recipient-1".to_string())));
}

#[test]
fn repeated_submission_is_idempotent() {
    let harness = harness(pantry_repository());
    let (request_id, donation_id) = ids("req-1", "don-near");

    let first = harness
        .service
        .create_smart_match(&request_id, &donation_id, None)
        .expect("match created");
    let second = harness
        .service
        .create_smart_match(&request_id, &donation_id, None)
        .expect("repeat returns existing match");

    assert!(!second.created);
    assert_eq!(first.record, second.record);
    assert_eq!(harness.repository.matches().expect("matches").len(), 1);
    assert_eq!(harness.notifier.events().len(), 1);
}

#[test]
fn matched_request_is_stale_for_other_donations() {
    let repository = pantry_repository();
    repository
        .put_donation(donation("don-alt", "donor-1", "food", 6.0))
        .expect("seed donation");
    let harness = harness(repository);

    harness
        .service
        .create_smart_match(
            &RequestId("req-1".to_string()),
            &DonationId("don-near".to_string()),
            None,
        )
        .expect("first match");

    match harness.service.create_smart_match(
        &RequestId("req-1".to_string()),
        &DonationId("don-alt".to_string()),
        None,
    ) {
        Err(MatchingError::StaleCandidate { reason }) => {
            assert!(reason.contains("no longer open"), "reason was {reason}")
        }
        other => panic!("expected stale candidate, got {other:?}"),
    }
}

#[test]
fn donation_exhausted_by_earlier_claim_is_stale() {
    let repository = pantry_repository();
    let mut small = donation("don-small", "donor-2", "food", 2.0);
    small.quantity = 5;
    small.remaining_quantity = 5;
    repository.put_donation(small).expect("seed donation");
    let harness = harness(repository);

    harness
        .service
        .create_smart_match(
            &RequestId("req-1".to_string()),
            &DonationId("don-small".to_string()),
            None,
        )
        .expect("first claim takes all stock");

    match harness.service.create_smart_match(
        &RequestId("req-2".to_string()),
        &DonationId("don-small".to_string()),
        None,
    ) {
        Err(MatchingError::StaleCandidate { reason }) => {
            assert!(reason.contains("no longer available"), "reason was {reason}")
        }
        other => panic!("expected stale candidate, got {other:?}"),
    }
}

#[test]
fn unknown_ids_are_not_found() {
    let harness = harness(pantry_repository());
    match harness.service.create_smart_match(
        &RequestId("req-missing".to_string()),
        &DonationId("don-near".to_string()),
        None,
    ) {
        Err(MatchingError::NotFound(what)) => assert!(what.contains("req-missing")),
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn concurrent_submission_for_same_pair_is_rejected_while_in_flight() {
    let harness = harness(pantry_repository());
    let (request_id, donation_id) = ids("req-1", "don-near");

    let guard = harness
        .service
        .begin(&request_id, &donation_id)
        .expect("first reservation");
    match harness
        .service
        .create_smart_match(&request_id, &donation_id, None)
    {
        Err(MatchingError::InFlight) => {}
        other => panic!("expected in-flight rejection, got {other:?}"),
    }
    drop(guard);

    harness
        .service
        .create_smart_match(&request_id, &donation_id, None)
        .expect("pair released after guard drops");
}

#[test]
fn volunteer_flow_surfaces_and_assigns_pending_delivery() {
    let repository = people_repository();
    repository
        .put_donation(donation("don-1", "donor-1", "food", 4.0))
        .expect("seed donation");
    let mut need = request("req-1", "recipient-1", "food", Urgency::High);
    need.delivery_mode = DeliveryMode::VolunteerDelivery;
    repository.put_request(need).expect("seed request");
    let harness = harness(repository);
    let (request_id, donation_id) = ids("req-1", "don-1");

    let created = harness
        .service
        .create_smart_match(&request_id, &donation_id, None)
        .expect("match awaiting volunteer");
    assert!(created.record.awaiting_volunteer());

    let volunteer_id = UserId("volunteer-1".to_string());
    let set = harness
        .service
        .recommendations_at(&volunteer_id, UserRole::Volunteer, None, fixed_now())
        .expect("volunteer recommendations");
    assert_eq!(set.context, MatchingContext::DonorRecipientVolunteer);
    match &set.recommendations[0] {
        Recommendation::VolunteerOpportunities { opportunities, .. } => {
            assert_eq!(opportunities.len(), 1);
            assert_eq!(opportunities[0].candidate.match_id, created.record.id);
        }
        other => panic!("expected volunteer opportunities, got {other:?}"),
    }

    let assigned = harness
        .service
        .create_smart_match(&request_id, &donation_id, Some(&volunteer_id))
        .expect("volunteer assigned");
    assert!(assigned.volunteer_assigned);
    assert!(!assigned.created);
    assert_eq!(assigned.record.version, 2);
    assert_eq!(assigned.record.volunteer_id, Some(volunteer_id.clone()));

    let again = harness
        .service
        .create_smart_match(&request_id, &donation_id, Some(&volunteer_id))
        .expect("same volunteer is idempotent");
    assert!(!again.volunteer_assigned);

    match harness.service.create_smart_match(
        &request_id,
        &donation_id,
        Some(&UserId("volunteer-2".to_string())),
    ) {
        Err(MatchingError::StaleCandidate { reason }) => {
            assert!(reason.contains("volunteer-1"), "reason was {reason}")
        }
        other => panic!("expected stale candidate, got {other:?}"),
    }

    let templates: Vec<String> = harness
        .notifier
        .events()
        .into_iter()
        .map(|event| event.template)
        .collect();
    assert_eq!(templates, vec!["match_created", "volunteer_assigned"]);
}

#[test]
fn unavailable_repository_surfaces_retryable_error() {
    let service = MatchingService::new(
        Arc::new(UnavailableRepository),
        Arc::new(InMemoryParameterRepository::default()),
        Arc::new(InMemoryNotifier::default()),
    );

    match service.get_matching_recommendations(
        &UserId("recipient-1".to_string()),
        UserRole::Recipient,
        None,
    ) {
        Err(err @ MatchingError::Transient(_)) => assert!(err.is_retryable()),
        other => panic!("expected transient error, got {other:?}"),
    }
}

#[test]
fn stored_match_keeps_the_recommended_score_and_eligibility() {
    let repository = people_repository();
    repository
        .put_user(rated_user("donor-top", UserRole::Donor, 5.0, 8))
        .expect("seed user");
    repository
        .put_user(rated_user("recipient-low", UserRole::Recipient, 1.0, 4))
        .expect("seed user");
    repository
        .put_donation(donation("don-top", "donor-top", "food", 3.0))
        .expect("seed donation");
    repository
        .put_request(request("req-low", "recipient-low", "food", Urgency::High))
        .expect("seed request");
    let harness = harness(repository);
    harness
        .service
        .update_matching_parameters(
            MatchingContext::DonorRecipient,
            ParameterUpdate {
                auto_match_enabled: Some(true),
                ..ParameterUpdate::default()
            },
            admin(),
        )
        .expect("auto match enabled");

    let recipient_view = harness
        .service
        .get_matching_recommendations(
            &UserId("recipient-low".to_string()),
            UserRole::Recipient,
            None,
        )
        .expect("recipient recommendations");
    let (shown_score, shown_eligibility) = match &recipient_view.recommendations[..] {
        [Recommendation::DonationMatches { matches, .. }] => {
            assert_eq!(matches[0].candidate.id.0, "don-top");
            (matches[0].score, matches[0].eligibility)
        }
        other => panic!("expected one donation group, got {other:?}"),
    };

    let donor_view = harness
        .service
        .get_matching_recommendations(&UserId("donor-top".to_string()), UserRole::Donor, None)
        .expect("donor recommendations");
    match &donor_view.recommendations[..] {
        [Recommendation::RequestMatches { matches, .. }] => {
            let entry = matches
                .iter()
                .find(|ranked| ranked.candidate.id.0 == "req-low")
                .expect("request surfaced to donor");
            assert!((entry.score - shown_score).abs() < 1e-12);
        }
        other => panic!("expected one request group, got {other:?}"),
    }

    let (request_id, donation_id) = ids("req-low", "don-top");
    let outcome = harness
        .service
        .create_smart_match(&request_id, &donation_id, None)
        .expect("match created");

    assert!(
        (outcome.record.score - shown_score).abs() < 1e-12,
        "recommended {shown_score}, stored {}",
        outcome.record.score
    );
    assert_eq!(outcome.record.eligibility, shown_eligibility);
}

#[test]
fn partial_claim_keeps_request_open_for_the_remainder() {
    let repository = people_repository();
    let mut small = donation("don-six", "donor-2", "food", 2.0);
    small.quantity = 6;
    small.remaining_quantity = 6;
    repository.put_donation(small).expect("seed donation");
    repository
        .put_donation(donation("don-ten", "donor-1", "food", 4.0))
        .expect("seed donation");
    let mut need = request("req-ten", "recipient-1", "food", Urgency::High);
    need.quantity = 10;
    repository.put_request(need).expect("seed request");
    let harness = harness(repository);
    let request_id = RequestId("req-ten".to_string());

    let first = harness
        .service
        .create_smart_match(&request_id, &DonationId("don-six".to_string()), None)
        .expect("partial claim");
    assert_eq!(first.record.quantity, 6);

    let stored = harness
        .repository
        .request(&request_id)
        .expect("lookup")
        .expect("request exists");
    assert_eq!(stored.status, RequestStatus::Open);
    assert_eq!(stored.outstanding_quantity(), 4);

    let set = harness
        .service
        .recommendations_at(
            &UserId("recipient-1".to_string()),
            UserRole::Recipient,
            None,
            fixed_now(),
        )
        .expect("request still in the pool");
    match &set.recommendations[..] {
        [Recommendation::DonationMatches { request, matches, .. }] => {
            assert_eq!(request.outstanding_quantity, 4);
            assert_eq!(matches[0].candidate.id.0, "don-ten");
        }
        other => panic!("expected one donation group, got {other:?}"),
    }

    let second = harness
        .service
        .create_smart_match(&request_id, &DonationId("don-ten".to_string()), None)
        .expect("remainder claimed");
    assert_eq!(second.record.quantity, 4);

    let stored = harness
        .repository
        .request(&request_id)
        .expect("lookup")
        .expect("request exists");
    assert_eq!(stored.status, RequestStatus::Matched);
    assert_eq!(stored.outstanding_quantity(), 0);
    let donation = harness
        .repository
        .donation(&DonationId("don-ten".to_string()))
        .expect("lookup")
        .expect("donation exists");
    assert_eq!(donation.remaining_quantity, 6);
}
