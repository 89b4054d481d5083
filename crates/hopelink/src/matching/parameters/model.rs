use serde::{Deserialize, Serialize};

/// Named parameter set. Each context holds exactly one active configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchingContext {
    DonorRecipient,
    DonorRecipientVolunteer,
}

impl MatchingContext {
    pub const ALL: [MatchingContext; 2] = [
        MatchingContext::DonorRecipient,
        MatchingContext::DonorRecipientVolunteer,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            MatchingContext::DonorRecipient => "DONOR_RECIPIENT",
            MatchingContext::DonorRecipientVolunteer => "DONOR_RECIPIENT_VOLUNTEER",
        }
    }

    /// Context used when a volunteer takes part in the pairing.
    pub const fn for_volunteer(with_volunteer: bool) -> Self {
        if with_volunteer {
            MatchingContext::DonorRecipientVolunteer
        } else {
            MatchingContext::DonorRecipient
        }
    }
}

impl std::fmt::Display for MatchingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for MatchingContext {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DONOR_RECIPIENT" => Ok(Self::DonorRecipient),
            "DONOR_RECIPIENT_VOLUNTEER" => Ok(Self::DonorRecipientVolunteer),
            other => Err(format!("unknown matching context '{other}'")),
        }
    }
}

/// The five weighted criteria of the scoring engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingFactor {
    GeographicProximity,
    ItemCompatibility,
    UrgencyAlignment,
    UserReliability,
    DeliveryCompatibility,
}

impl MatchingFactor {
    pub const ALL: [MatchingFactor; 5] = [
        MatchingFactor::GeographicProximity,
        MatchingFactor::ItemCompatibility,
        MatchingFactor::UrgencyAlignment,
        MatchingFactor::UserReliability,
        MatchingFactor::DeliveryCompatibility,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            MatchingFactor::GeographicProximity => "geographic_proximity",
            MatchingFactor::ItemCompatibility => "item_compatibility",
            MatchingFactor::UrgencyAlignment => "urgency_alignment",
            MatchingFactor::UserReliability => "user_reliability",
            MatchingFactor::DeliveryCompatibility => "delivery_compatibility",
        }
    }

    /// Human readable phrase used when explaining a match.
    pub const fn phrase(self) -> &'static str {
        match self {
            MatchingFactor::GeographicProximity => "close by",
            MatchingFactor::ItemCompatibility => "matching items",
            MatchingFactor::UrgencyAlignment => "urgent need",
            MatchingFactor::UserReliability => "reliable counterpart",
            MatchingFactor::DeliveryCompatibility => "compatible delivery",
        }
    }
}

/// Per-factor weights. Valid configurations sum to 1.0 within tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights {
    pub geographic_proximity: f64,
    pub item_compatibility: f64,
    pub urgency_alignment: f64,
    pub user_reliability: f64,
    pub delivery_compatibility: f64,
}

impl FactorWeights {
    pub fn get(&self, factor: MatchingFactor) -> f64 {
        match factor {
            MatchingFactor::GeographicProximity => self.geographic_proximity,
            MatchingFactor::ItemCompatibility => self.item_compatibility,
            MatchingFactor::UrgencyAlignment => self.urgency_alignment,
            MatchingFactor::UserReliability => self.user_reliability,
            MatchingFactor::DeliveryCompatibility => self.delivery_compatibility,
        }
    }

    pub fn set(&mut self, factor: MatchingFactor, value: f64) {
        let slot = match factor {
            MatchingFactor::GeographicProximity => &mut self.geographic_proximity,
            MatchingFactor::ItemCompatibility => &mut self.item_compatibility,
            MatchingFactor::UrgencyAlignment => &mut self.urgency_alignment,
            MatchingFactor::UserReliability => &mut self.user_reliability,
            MatchingFactor::DeliveryCompatibility => &mut self.delivery_compatibility,
        };
        *slot = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (MatchingFactor, f64)> + '_ {
        MatchingFactor::ALL
            .into_iter()
            .map(move |factor| (factor, self.get(factor)))
    }

    pub fn sum(&self) -> f64 {
        self.iter().map(|(_, weight)| weight).sum()
    }
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            geographic_proximity: 0.30,
            item_compatibility: 0.25,
            urgency_alignment: 0.20,
            user_reliability: 0.15,
            delivery_compatibility: 0.10,
        }
    }
}

/// Active configuration consumed by the scoring engine and the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingParameters {
    pub weights: FactorWeights,
    pub auto_match_enabled: bool,
    pub auto_match_threshold: f64,
    pub auto_claim_threshold: f64,
    pub max_distance_km: u32,
    pub min_quantity_match_ratio: f64,
    pub perishable_geographic_boost: f64,
    pub critical_urgency_boost: f64,
}

impl Default for MatchingParameters {
    fn default() -> Self {
        Self {
            weights: FactorWeights::default(),
            auto_match_enabled: false,
            auto_match_threshold: 0.75,
            auto_claim_threshold: 0.85,
            max_distance_km: 50,
            min_quantity_match_ratio: 0.5,
            perishable_geographic_boost: 0.2,
            critical_urgency_boost: 0.15,
        }
    }
}

/// Partial weight edit; absent keys keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geographic_proximity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_compatibility: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency_alignment: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_reliability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_compatibility: Option<f64>,
}

impl WeightUpdate {
    fn get(&self, factor: MatchingFactor) -> Option<f64> {
        match factor {
            MatchingFactor::GeographicProximity => self.geographic_proximity,
            MatchingFactor::ItemCompatibility => self.item_compatibility,
            MatchingFactor::UrgencyAlignment => self.urgency_alignment,
            MatchingFactor::UserReliability => self.user_reliability,
            MatchingFactor::DeliveryCompatibility => self.delivery_compatibility,
        }
    }
}

/// Admin edit of a context's parameters, as submitted by the settings page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<WeightUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_match_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_match_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_claim_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_distance_km: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_quantity_match_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perishable_geographic_boost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_urgency_boost: Option<f64>,
}

impl ParameterUpdate {
    pub fn is_empty(&self) -> bool {
        self == &ParameterUpdate::default()
    }

    /// Produce the parameters that result from applying this edit to `base`.
    pub fn apply_to(&self, base: &MatchingParameters) -> MatchingParameters {
        let mut next = base.clone();

        if let Some(weights) = &self.weights {
            for factor in MatchingFactor::ALL {
                if let Some(value) = weights.get(factor) {
                    next.weights.set(factor, value);
                }
            }
        }
        if let Some(enabled) = self.auto_match_enabled {
            next.auto_match_enabled = enabled;
        }
        if let Some(threshold) = self.auto_match_threshold {
            next.auto_match_threshold = threshold;
        }
        if let Some(threshold) = self.auto_claim_threshold {
            next.auto_claim_threshold = threshold;
        }
        if let Some(distance) = self.max_distance_km {
            next.max_distance_km = distance;
        }
        if let Some(ratio) = self.min_quantity_match_ratio {
            next.min_quantity_match_ratio = ratio;
        }
        if let Some(boost) = self.perishable_geographic_boost {
            next.perishable_geographic_boost = boost;
        }
        if let Some(boost) = self.critical_urgency_boost {
            next.critical_urgency_boost = boost;
        }

        next
    }
}
