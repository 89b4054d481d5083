use crate::cli::RecommendArgs;
use crate::infra::{seeded_repository, wire, Wiring};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use hopelink::error::AppError;
use hopelink::matching::parameters::{
    validate_weights, weight_sum_report, FactorWeights, MatchingContext, MatchingParameters,
};
use hopelink::matching::recommendations::RankedCandidate;
use hopelink::matching::{
    DeliveryMode, Donation, DonationId, DonationRequest, DonationStatus, GeoPoint,
    InMemoryMatchingRepository, MatchOutcome, MatchingError, MatchingRepository, Recommendation,
    RecommendationSet, RequestId, RequestStatus, Urgency, UserId, UserProfile, UserRole,
    Volunteer, DEFAULT_RECOMMENDATION_LIMIT,
};

const DEMO_CENTER: GeoPoint = GeoPoint::new(41.5868, -93.625);
const KM_PER_DEGREE_LATITUDE: f64 = 111.32;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Matches per group in the recommendation sections
    #[arg(long)]
    pub(crate) limit: Option<usize>,
    /// Stop after the recommendation sections; do not create matches
    #[arg(long)]
    pub(crate) skip_match: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { limit, skip_match } = args;
    let wiring = wire(demo_repository()?, DEFAULT_RECOMMENDATION_LIMIT);

    println!("HopeLink matching demo");
    println!("======================");
    println!();

    let parameters = wiring
        .service
        .active_parameters(MatchingContext::DonorRecipient)?;
    println!("Active parameters ({})", parameters.context);
    render_parameters(&parameters.parameters);
    println!();

    let pantry = UserId("pantry-eastside".to_string());
    let set = wiring
        .service
        .get_matching_recommendations(&pantry, UserRole::Recipient, limit)?;
    render_recommendations(&set);
    println!();

    let donor = UserId("market-fresh".to_string());
    let set = wiring
        .service
        .get_matching_recommendations(&donor, UserRole::Donor, limit)?;
    render_recommendations(&set);
    println!();

    if skip_match {
        return Ok(());
    }

    run_match_walkthrough(&wiring, limit)
}

fn run_match_walkthrough(wiring: &Wiring, limit: Option<usize>) -> Result<(), AppError> {
    let request_id = RequestId("req-pantry-produce".to_string());
    let donation_id = DonationId("don-produce".to_string());
    let volunteer_id = UserId("vol-jordan".to_string());

    println!("Claiming {donation_id} for {request_id}");
    let outcome = wiring
        .service
        .create_smart_match(&request_id, &donation_id, None)?;
    render_outcome(&outcome);

    let repeat = wiring
        .service
        .create_smart_match(&request_id, &donation_id, None)?;
    println!(
        "  resubmitted: created={} match={}",
        repeat.created, repeat.record.id
    );
    println!();

    let set = wiring
        .service
        .get_matching_recommendations(&volunteer_id, UserRole::Volunteer, limit)?;
    render_recommendations(&set);
    println!();

    println!("Assigning {volunteer_id} to {}", outcome.record.id);
    let assigned = wiring
        .service
        .create_smart_match(&request_id, &donation_id, Some(&volunteer_id))?;
    render_outcome(&assigned);

    if let Some(donation) = wiring
        .repository
        .donation(&donation_id)
        .map_err(MatchingError::from)?
    {
        println!(
            "  {} now has {}/{} remaining ({:?})",
            donation.id, donation.remaining_quantity, donation.quantity, donation.status
        );
    }
    println!();

    let events = wiring.notifier.events();
    println!("Notifications queued: {}", events.len());
    for event in events {
        println!(
            "  - {} -> {}",
            event.template,
            event
                .recipients
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    Ok(())
}

pub(crate) fn run_recommend(args: RecommendArgs) -> Result<(), AppError> {
    let RecommendArgs {
        seed_dir,
        user,
        role,
        limit,
        json,
    } = args;

    let repository = match seed_dir.as_deref() {
        Some(dir) => seeded_repository(Some(dir))?.0,
        None => demo_repository()?,
    };
    let wiring = wire(repository, DEFAULT_RECOMMENDATION_LIMIT);
    let set = wiring
        .service
        .get_matching_recommendations(&UserId(user), role, limit)?;

    if json {
        let payload = serde_json::to_string_pretty(&set)
            .map_err(|err| AppError::Usage(format!("failed to encode recommendations: {err}")))?;
        println!("{payload}");
    } else {
        render_recommendations(&set);
    }
    Ok(())
}

pub(crate) fn run_params_show(context: MatchingContext) -> Result<(), AppError> {
    let wiring = wire(
        InMemoryMatchingRepository::default(),
        DEFAULT_RECOMMENDATION_LIMIT,
    );
    let stored = wiring.service.active_parameters(context)?;
    println!("{} (version {})", stored.context, stored.version);
    render_parameters(&stored.parameters);
    Ok(())
}

pub(crate) fn run_params_validate(weights: FactorWeights) -> Result<(), AppError> {
    let report = weight_sum_report(&weights);
    for (factor, value) in weights.iter() {
        println!("  {:<24} {:>5.1}%", factor.key(), value * 100.0);
    }
    println!(
        "  {:<24} {:>5.1}% ({})",
        "total",
        report.percentage,
        if report.valid { "valid" } else { "invalid" }
    );

    validate_weights(&weights).map_err(MatchingError::from)?;
    Ok(())
}

fn render_parameters(parameters: &MatchingParameters) {
    for (factor, weight) in parameters.weights.iter() {
        println!("  {:<24} {:>5.1}%", factor.key(), weight * 100.0);
    }
    println!(
        "  auto-match: {} (match >= {:.2}, claim >= {:.2})",
        if parameters.auto_match_enabled {
            "enabled"
        } else {
            "disabled"
        },
        parameters.auto_match_threshold,
        parameters.auto_claim_threshold
    );
    println!(
        "  max distance {} km, min quantity ratio {:.2}",
        parameters.max_distance_km, parameters.min_quantity_match_ratio
    );
}

fn render_recommendations(set: &RecommendationSet) {
    println!(
        "Recommendations for {} as {} [{}]",
        set.user_id,
        set.role.label(),
        set.context
    );
    if set.recommendations.is_empty() {
        println!("  (nothing to recommend)");
        return;
    }

    for group in &set.recommendations {
        match group {
            Recommendation::DonationMatches {
                request,
                matches,
                excluded,
            } => {
                println!(
                    "  request {} \"{}\" ({} x{}, {})",
                    request.id,
                    request.title,
                    request.category,
                    request.quantity,
                    request.urgency.label()
                );
                for ranked in matches {
                    render_ranked(ranked, &ranked.candidate.title);
                }
                render_excluded(*excluded);
            }
            Recommendation::RequestMatches {
                donation,
                matches,
                excluded,
            } => {
                println!(
                    "  donation {} \"{}\" ({} x{} left)",
                    donation.id, donation.title, donation.category, donation.remaining_quantity
                );
                for ranked in matches {
                    render_ranked(ranked, &ranked.candidate.title);
                }
                render_excluded(*excluded);
            }
            Recommendation::VolunteerOpportunities {
                opportunities,
                excluded,
                ..
            } => {
                println!("  delivery opportunities");
                for ranked in opportunities {
                    let label = format!(
                        "{}: {} -> {}",
                        ranked.candidate.match_id,
                        ranked.candidate.donation.title,
                        ranked.candidate.request.requester_id
                    );
                    render_ranked(ranked, &label);
                }
                render_excluded(*excluded);
            }
        }
    }
}

fn render_ranked<T>(ranked: &RankedCandidate<T>, label: &str) {
    println!(
        "    {:.3} {:<15} {:>5.1} km  {}  ({})",
        ranked.score,
        ranked.eligibility.label(),
        ranked.distance_km,
        label,
        ranked.match_reason
    );
}

fn render_excluded(excluded: usize) {
    if excluded > 0 {
        println!("    {excluded} candidate(s) filtered out");
    }
}

fn render_outcome(outcome: &MatchOutcome) {
    let record = &outcome.record;
    println!(
        "  {} {} score={:.3} eligibility={} quantity={} volunteer={}",
        if outcome.created { "created" } else { "existing" },
        record.id,
        record.score,
        record.eligibility.label(),
        record.quantity,
        record
            .volunteer_id
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "unassigned".to_string())
    );
    if outcome.volunteer_assigned {
        println!("  volunteer assigned");
    }
}

fn offset(km_north: f64, km_east: f64) -> GeoPoint {
    let km_per_degree_longitude =
        KM_PER_DEGREE_LATITUDE * DEMO_CENTER.latitude.to_radians().cos();
    GeoPoint::new(
        DEMO_CENTER.latitude + km_north / KM_PER_DEGREE_LATITUDE,
        DEMO_CENTER.longitude + km_east / km_per_degree_longitude,
    )
}

fn profile(id: &str, name: &str, role: UserRole, ratings: &[f64]) -> UserProfile {
    UserProfile {
        id: UserId(id.to_string()),
        display_name: name.to_string(),
        role,
        rating_total: ratings.iter().sum(),
        rating_count: ratings.len() as u32,
    }
}

struct DemoDonation {
    id: &'static str,
    donor: &'static str,
    title: &'static str,
    category: &'static str,
    quantity: u32,
    perishable: bool,
    location: GeoPoint,
    modes: &'static [DeliveryMode],
    age_hours: i64,
    expires_in_hours: Option<i64>,
}

impl DemoDonation {
    fn build(self, now: DateTime<Utc>) -> Donation {
        Donation {
            id: DonationId(self.id.to_string()),
            donor_id: UserId(self.donor.to_string()),
            title: self.title.to_string(),
            category: self.category.to_string(),
            tags: Vec::new(),
            quantity: self.quantity,
            remaining_quantity: self.quantity,
            perishable: self.perishable,
            location: self.location,
            delivery_modes: self.modes.to_vec(),
            status: DonationStatus::Available,
            created_at: now - Duration::hours(self.age_hours),
            expires_at: self.expires_in_hours.map(|hours| now + Duration::hours(hours)),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn request(
    id: &str,
    requester: &str,
    title: &str,
    category: &str,
    quantity: u32,
    urgency: Urgency,
    location: GeoPoint,
    mode: DeliveryMode,
    created_at: DateTime<Utc>,
) -> DonationRequest {
    DonationRequest {
        id: RequestId(id.to_string()),
        requester_id: UserId(requester.to_string()),
        title: title.to_string(),
        category: category.to_string(),
        tags: Vec::new(),
        quantity,
        fulfilled_quantity: 0,
        urgency,
        location,
        delivery_mode: mode,
        status: RequestStatus::Open,
        created_at,
        needed_by: None,
    }
}

/// Small Des Moines dataset: three donors, two recipients, one volunteer.
pub(crate) fn demo_repository() -> Result<InMemoryMatchingRepository, MatchingError> {
    let now = Utc::now();
    let repository = InMemoryMatchingRepository::default();

    for user in [
        profile("market-fresh", "Market Fresh Grocers", UserRole::Donor, &[5.0, 4.5, 5.0, 4.0]),
        profile("bakery-row", "Bakery Row", UserRole::Donor, &[4.0, 3.5]),
        profile("closet-co", "Community Closet", UserRole::Donor, &[]),
        profile("pantry-eastside", "Eastside Pantry", UserRole::Recipient, &[4.5, 5.0]),
        profile("shelter-north", "North Shelter", UserRole::Recipient, &[3.0]),
        profile("vol-jordan", "Jordan", UserRole::Volunteer, &[5.0, 5.0, 4.5]),
    ] {
        repository.put_user(user)?;
    }

    let donations = [
        DemoDonation {
            id: "don-produce",
            donor: "market-fresh",
            title: "Mixed produce crates",
            category: "produce",
            quantity: 40,
            perishable: true,
            location: offset(1.5, 2.5),
            modes: &[DeliveryMode::Pickup, DeliveryMode::VolunteerDelivery],
            age_hours: 6,
            expires_in_hours: Some(48),
        },
        DemoDonation {
            id: "don-bread",
            donor: "bakery-row",
            title: "Day-old bread",
            category: "bakery",
            quantity: 20,
            perishable: true,
            location: offset(-4.0, 4.5),
            modes: &[DeliveryMode::Pickup],
            age_hours: 3,
            expires_in_hours: Some(24),
        },
        DemoDonation {
            id: "don-canned",
            donor: "market-fresh",
            title: "Canned vegetables",
            category: "produce",
            quantity: 60,
            perishable: false,
            location: offset(9.0, -6.0),
            modes: &[DeliveryMode::Pickup, DeliveryMode::DirectDelivery],
            age_hours: 30,
            expires_in_hours: None,
        },
        DemoDonation {
            id: "don-coats",
            donor: "closet-co",
            title: "Winter coats",
            category: "clothing",
            quantity: 15,
            perishable: false,
            location: offset(6.0, -8.0),
            modes: &[DeliveryMode::DirectDelivery],
            age_hours: 72,
            expires_in_hours: None,
        },
    ];
    for donation in donations {
        repository.put_donation(donation.build(now))?;
    }

    for entry in [
        request(
            "req-pantry-produce",
            "pantry-eastside",
            "Fresh vegetables for weekend boxes",
            "produce",
            25,
            Urgency::High,
            offset(0.0, 3.0),
            DeliveryMode::VolunteerDelivery,
            now - Duration::hours(20),
        ),
        request(
            "req-pantry-bread",
            "pantry-eastside",
            "Bread for breakfast program",
            "bakery",
            10,
            Urgency::Medium,
            offset(0.0, 3.0),
            DeliveryMode::Pickup,
            now - Duration::hours(8),
        ),
        request(
            "req-shelter-coats",
            "shelter-north",
            "Coats for incoming families",
            "clothing",
            10,
            Urgency::Critical,
            offset(7.5, -1.0),
            DeliveryMode::DirectDelivery,
            now - Duration::hours(2),
        ),
    ] {
        repository.put_request(entry)?;
    }

    repository.put_volunteer(Volunteer {
        user_id: UserId("vol-jordan".to_string()),
        location: offset(1.0, 1.0),
        service_radius_km: 25.0,
        available: true,
        created_at: now - Duration::days(30),
    })?;

    Ok(repository)
}
