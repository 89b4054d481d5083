use crate::matching::domain::{
    DeliveryMode, Donation, DonationRequest, UserProfile, Urgency, NEUTRAL_RELIABILITY,
};

const CATEGORY_SHARE: f64 = 0.6;
const TAG_SHARE: f64 = 0.25;
const QUANTITY_SHARE: f64 = 0.15;

/// Linear decay from 1.0 at zero distance to 0.0 at `max_km`.
pub(crate) fn geographic_proximity(distance_km: f64, max_km: f64) -> f64 {
    if max_km <= 0.0 || !distance_km.is_finite() {
        return 0.0;
    }
    (1.0 - distance_km / max_km).clamp(0.0, 1.0)
}

/// Share of the still outstanding quantity the donation can cover, capped at 1.
pub(crate) fn quantity_ratio(donation: &Donation, request: &DonationRequest) -> f64 {
    let outstanding = request.outstanding_quantity();
    if outstanding == 0 {
        return 1.0;
    }
    (donation.remaining_quantity as f64 / outstanding as f64).min(1.0)
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn tag_overlap(offered: &[String], requested: &[String]) -> f64 {
    if requested.is_empty() {
        return 1.0;
    }

    let offered: Vec<String> = offered.iter().map(|tag| normalize(tag)).collect();
    let hits = requested
        .iter()
        .filter(|tag| offered.contains(&normalize(tag)))
        .count();
    hits as f64 / requested.len() as f64
}

pub(crate) fn item_compatibility(
    donation: &Donation,
    request: &DonationRequest,
    quantity_ratio: f64,
) -> (f64, String) {
    let category_match = normalize(&donation.category) == normalize(&request.category);
    let category = if category_match { 1.0 } else { 0.0 };
    let tags = tag_overlap(&donation.tags, &request.tags);

    let value = CATEGORY_SHARE * category + TAG_SHARE * tags + QUANTITY_SHARE * quantity_ratio;
    let notes = format!(
        "category {} ({} vs {}), {:.0}% of requested tags, covers {:.0}% of quantity",
        if category_match { "matches" } else { "differs" },
        donation.category,
        request.category,
        tags * 100.0,
        quantity_ratio * 100.0
    );

    (value.clamp(0.0, 1.0), notes)
}

/// Urgent requests align best with candidates that are close enough to fulfil quickly.
pub(crate) fn urgency_alignment(urgency: Urgency, raw_proximity: f64) -> (f64, String) {
    let readiness = 0.5 + 0.5 * raw_proximity.clamp(0.0, 1.0);
    let value = (urgency.level() * readiness).clamp(0.0, 1.0);
    (
        value,
        format!(
            "{} urgency, fulfilment readiness {:.2}",
            urgency.label(),
            readiness
        ),
    )
}

pub(crate) fn user_reliability(counterparts: &[&UserProfile]) -> (f64, String) {
    if counterparts.is_empty() {
        return (
            NEUTRAL_RELIABILITY,
            "no counterpart history, neutral reliability".to_string(),
        );
    }

    let total: f64 = counterparts.iter().map(|user| user.reliability()).sum();
    let value = (total / counterparts.len() as f64).clamp(0.0, 1.0);
    let unrated = counterparts
        .iter()
        .filter(|user| user.rating_count == 0)
        .count();

    let notes = if unrated == 0 {
        format!("average reliability {value:.2}")
    } else {
        format!("average reliability {value:.2} ({unrated} new user(s) at neutral)")
    };
    (value, notes)
}

pub(crate) fn delivery_compatibility(
    donation: &Donation,
    request: &DonationRequest,
    has_volunteer: bool,
) -> (f64, String) {
    let wanted = request.delivery_mode;
    if donation.supports(wanted) {
        return (1.0, format!("{} supported", wanted.label()));
    }

    let value = match wanted {
        DeliveryMode::VolunteerDelivery if donation.supports(DeliveryMode::Pickup) => {
            if has_volunteer {
                1.0
            } else {
                0.5
            }
        }
        DeliveryMode::DirectDelivery if donation.supports(DeliveryMode::VolunteerDelivery) => 0.5,
        DeliveryMode::DirectDelivery if donation.supports(DeliveryMode::Pickup) => 0.25,
        DeliveryMode::Pickup if donation.supports(DeliveryMode::DirectDelivery) => 0.75,
        DeliveryMode::Pickup if donation.supports(DeliveryMode::VolunteerDelivery) => 0.5,
        _ => 0.0,
    };

    let offered: Vec<&str> = donation
        .delivery_modes
        .iter()
        .map(|mode| mode.label())
        .collect();
    (
        value,
        format!(
            "{} requested, donor offers {}",
            wanted.label(),
            if offered.is_empty() {
                "nothing".to_string()
            } else {
                offered.join("/")
            }
        ),
    )
}
