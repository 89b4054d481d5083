use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for platform users (donors, recipients, volunteers, admins).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier wrapper for offered donations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DonationId(pub String);

/// Identifier wrapper for recipient requests.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

/// Identifier wrapper for persisted matches.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatchId(pub String);

macro_rules! display_id {
    ($($name:ident),+) => {
        $(
            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(&self.0)
                }
            }
        )+
    };
}

display_id!(UserId, DonationId, RequestId, MatchId);

/// WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Role a user acts in when asking for recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Donor,
    Recipient,
    Volunteer,
}

impl UserRole {
    pub const fn label(self) -> &'static str {
        match self {
            UserRole::Donor => "donor",
            UserRole::Recipient => "recipient",
            UserRole::Volunteer => "volunteer",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "donor" => Ok(Self::Donor),
            "recipient" => Ok(Self::Recipient),
            "volunteer" => Ok(Self::Volunteer),
            other => Err(format!(
                "unknown role '{other}' (expected donor, recipient, or volunteer)"
            )),
        }
    }
}

/// How an item travels from donor to recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    Pickup,
    DirectDelivery,
    VolunteerDelivery,
}

impl DeliveryMode {
    pub const fn label(self) -> &'static str {
        match self {
            DeliveryMode::Pickup => "pickup",
            DeliveryMode::DirectDelivery => "direct_delivery",
            DeliveryMode::VolunteerDelivery => "volunteer_delivery",
        }
    }
}

impl std::str::FromStr for DeliveryMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pickup" => Ok(Self::Pickup),
            "direct" | "direct_delivery" => Ok(Self::DirectDelivery),
            "volunteer" | "volunteer_delivery" => Ok(Self::VolunteerDelivery),
            other => Err(format!("unknown delivery mode '{other}'")),
        }
    }
}

/// Request urgency as entered by the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    /// Normalized urgency level fed into the urgency alignment factor.
    pub const fn level(self) -> f64 {
        match self {
            Urgency::Low => 0.25,
            Urgency::Medium => 0.5,
            Urgency::High => 0.75,
            Urgency::Critical => 1.0,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        }
    }
}

impl std::str::FromStr for Urgency {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown urgency '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationStatus {
    Available,
    PartiallyClaimed,
    FullyClaimed,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Open,
    Matched,
    Fulfilled,
    Cancelled,
}

/// Item offered by a donor. `remaining_quantity` shrinks as claims land.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donation {
    pub id: DonationId,
    pub donor_id: UserId,
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub quantity: u32,
    pub remaining_quantity: u32,
    #[serde(default)]
    pub perishable: bool,
    pub location: GeoPoint,
    pub delivery_modes: Vec<DeliveryMode>,
    pub status: DonationStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Donation {
    /// Whether the donation can still be claimed at `now`.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        let open_status = matches!(
            self.status,
            DonationStatus::Available | DonationStatus::PartiallyClaimed
        );
        let not_expired = self.expires_at.map(|at| at > now).unwrap_or(true);
        open_status && not_expired && self.remaining_quantity > 0
    }

    pub fn supports(&self, mode: DeliveryMode) -> bool {
        self.delivery_modes.contains(&mode)
    }

    /// Status after `claimed` units have been taken from the remaining stock.
    pub fn status_after_claim(&self, claimed: u32) -> DonationStatus {
        if claimed >= self.remaining_quantity {
            DonationStatus::FullyClaimed
        } else {
            DonationStatus::PartiallyClaimed
        }
    }
}

/// Need posted by a recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationRequest {
    pub id: RequestId,
    pub requester_id: UserId,
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub quantity: u32,
    /// Units already covered by earlier claims.
    #[serde(default)]
    pub fulfilled_quantity: u32,
    pub urgency: Urgency,
    pub location: GeoPoint,
    pub delivery_mode: DeliveryMode,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub needed_by: Option<DateTime<Utc>>,
}

impl DonationRequest {
    pub fn is_open(&self) -> bool {
        self.status == RequestStatus::Open
    }

    /// Units still needed. A request with no stated quantity is never partially covered.
    pub fn outstanding_quantity(&self) -> u32 {
        self.quantity.saturating_sub(self.fulfilled_quantity)
    }

    /// Status after `claimed` more units have been covered.
    pub fn status_after_claim(&self, claimed: u32) -> RequestStatus {
        if self.quantity == 0 || claimed >= self.outstanding_quantity() {
            RequestStatus::Matched
        } else {
            RequestStatus::Open
        }
    }
}

/// Volunteer availability used for delivery opportunities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volunteer {
    pub user_id: UserId,
    pub location: GeoPoint,
    pub service_radius_km: f64,
    pub available: bool,
    pub created_at: DateTime<Utc>,
}

/// Rating history used by the reliability factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: String,
    pub role: UserRole,
    #[serde(default)]
    pub rating_total: f64,
    #[serde(default)]
    pub rating_count: u32,
}

/// Reliability assumed for users with no rating history.
pub const NEUTRAL_RELIABILITY: f64 = 0.5;

const MAX_RATING: f64 = 5.0;

impl UserProfile {
    /// Average rating normalized to [0,1]; neutral when the user has no history.
    pub fn reliability(&self) -> f64 {
        if self.rating_count == 0 {
            return NEUTRAL_RELIABILITY;
        }

        let average = self.rating_total / self.rating_count as f64;
        if !average.is_finite() {
            return NEUTRAL_RELIABILITY;
        }
        (average / MAX_RATING).clamp(0.0, 1.0)
    }
}

/// Lifecycle of a candidate pairing, from scoring to persisted claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    Scored,
    Suggested,
    AutoMatchable,
    AutoClaimable,
    Claimed,
}

impl MatchState {
    pub const fn label(self) -> &'static str {
        match self {
            MatchState::Scored => "scored",
            MatchState::Suggested => "suggested",
            MatchState::AutoMatchable => "auto_matchable",
            MatchState::AutoClaimable => "auto_claimable",
            MatchState::Claimed => "claimed",
        }
    }
}

/// Persisted pairing of a request with a donation and optionally a volunteer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub request_id: RequestId,
    pub donation_id: DonationId,
    pub volunteer_id: Option<UserId>,
    pub delivery_mode: DeliveryMode,
    pub quantity: u32,
    pub score: f64,
    /// Gate classification at the time the match was created.
    pub eligibility: MatchState,
    pub state: MatchState,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl MatchRecord {
    pub fn awaiting_volunteer(&self) -> bool {
        self.delivery_mode == DeliveryMode::VolunteerDelivery && self.volunteer_id.is_none()
    }
}
