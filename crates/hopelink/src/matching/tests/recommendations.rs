use super::common::*;
use crate::matching::domain::{Donation, Urgency, UserId, UserProfile, UserRole};
use crate::matching::recommendations::{Recommendation, RecommendationAggregator};
use std::collections::BTreeMap;

fn profiles(users: &[UserProfile]) -> BTreeMap<UserId, UserProfile> {
    users
        .iter()
        .map(|profile| (profile.id.clone(), profile.clone()))
        .collect()
}

fn donation_ids(recommendation: &Recommendation) -> Vec<String> {
    match recommendation {
        Recommendation::DonationMatches { matches, .. } => matches
            .iter()
            .map(|ranked| ranked.candidate.id.0.clone())
            .collect(),
        other => panic!("expected donation matches, got {other:?}"),
    }
}

fn inventory() -> Vec<Donation> {
    vec![
        donation("don-c", "donor-1", "food", 12.0),
        donation("don-a", "donor-2", "food", 3.0),
        donation("don-b", "donor-1", "clothing", 8.0),
        donation("don-d", "donor-2", "food", 60.0),
        donation("don-e", "recipient-1", "food", 1.0),
    ]
}

#[test]
fn donation_matches_are_ranked_and_exclusions_counted() {
    let engine = engine();
    let users = profiles(&[
        user("donor-1", UserRole::Donor),
        user("donor-2", UserRole::Donor),
    ]);
    let aggregator = RecommendationAggregator::new(&engine, &users, fixed_now(), 5);
    let request = request("req-1", "recipient-1", "food", Urgency::High);

    let recommendation = aggregator.donation_matches(&request, &inventory());

    assert_eq!(recommendation.kind(), "donation_matches");
    assert_eq!(donation_ids(&recommendation), vec!["don-a", "don-c", "don-b"]);
    match recommendation {
        Recommendation::DonationMatches { excluded, matches, .. } => {
            assert_eq!(excluded, 1, "the 60 km donation is filtered");
            assert!(matches
                .windows(2)
                .all(|pair| pair[0].score >= pair[1].score));
        }
        other => panic!("expected donation matches, got {other:?}"),
    }
}

#[test]
fn repeated_recommendations_are_identical() {
    let engine = engine();
    let users = profiles(&[user("donor-1", UserRole::Donor)]);
    let aggregator = RecommendationAggregator::new(&engine, &users, fixed_now(), 5);
    let request = request("req-1", "recipient-1", "food", Urgency::Medium);
    let donations = inventory();

    let first = aggregator.donation_matches(&request, &donations);
    let second = aggregator.donation_matches(&request, &donations);
    assert_eq!(first, second);
}

#[test]
fn equal_scores_fall_back_to_age_then_id() {
    let engine = engine();
    let users = BTreeMap::new();
    let aggregator = RecommendationAggregator::new(&engine, &users, fixed_now(), 5);
    let request = request("req-1", "recipient-1", "food", Urgency::Medium);

    let mut older = donation("don-z", "donor-1", "food", 4.0);
    older.created_at = days_ago(10);
    let twin_b = donation("don-b", "donor-1", "food", 4.0);
    let twin_a = donation("don-a", "donor-1", "food", 4.0);

    let recommendation = aggregator.donation_matches(&request, &[twin_b, older, twin_a]);
    assert_eq!(donation_ids(&recommendation), vec!["don-z", "don-a", "don-b"]);
}

#[test]
fn limit_truncates_each_group() {
    let engine = engine();
    let users = BTreeMap::new();
    let aggregator = RecommendationAggregator::new(&engine, &users, fixed_now(), 2);
    let request = request("req-1", "recipient-1", "food", Urgency::Medium);

    let recommendation = aggregator.donation_matches(&request, &inventory());
    assert_eq!(recommendation.len(), 2);
}

#[test]
fn request_matches_skip_the_donors_own_requests() {
    let engine = engine();
    let users = BTreeMap::new();
    let aggregator = RecommendationAggregator::new(&engine, &users, fixed_now(), 5);
    let offer = donation("don-1", "donor-1", "food", 2.0);
    let requests = vec![
        request("req-own", "donor-1", "food", Urgency::Critical),
        request("req-low", "recipient-2", "food", Urgency::Low),
        request("req-critical", "recipient-1", "food", Urgency::Critical),
    ];

    match aggregator.request_matches(&offer, &requests) {
        Recommendation::RequestMatches { matches, excluded, .. } => {
            let ids: Vec<&str> = matches
                .iter()
                .map(|ranked| ranked.candidate.id.0.as_str())
                .collect();
            assert_eq!(ids, vec!["req-critical", "req-low"]);
            assert_eq!(excluded, 0);
            assert!(matches[0].match_reason.contains("critical request boosted"));
        }
        other => panic!("expected request matches, got {other:?}"),
    }
}

#[test]
fn recommendation_serializes_with_kind_tag() {
    let engine = engine();
    let users = BTreeMap::new();
    let aggregator = RecommendationAggregator::new(&engine, &users, fixed_now(), 5);
    let request = request("req-1", "recipient-1", "food", Urgency::Medium);

    let value = serde_json::to_value(aggregator.donation_matches(&request, &inventory()))
        .expect("serialize recommendation");
    assert_eq!(value["kind"], "donation_matches");
    assert_eq!(value["matches"][0]["candidate"]["id"], "don-a");
    assert_eq!(value["matches"][0]["eligibility"], "suggested");
}
