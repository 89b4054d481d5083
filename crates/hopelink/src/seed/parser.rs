use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use std::io::Read;

use crate::matching::domain::{
    DeliveryMode, Donation, DonationId, DonationRequest, DonationStatus, GeoPoint, RequestId,
    RequestStatus, Urgency, UserId, UserProfile, UserRole, Volunteer,
};

/// Row-level problem found while converting CSV data into domain records.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

pub(crate) fn read_rows<T, R>(reader: R) -> Result<Vec<T>, csv::Error>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    csv_reader.deserialize::<T>().collect()
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserRow {
    id: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    display_name: Option<String>,
    role: String,
    #[serde(default)]
    rating_total: Option<f64>,
    #[serde(default)]
    rating_count: Option<u32>,
}

impl UserRow {
    pub(crate) fn into_profile(self, row: usize) -> Result<UserProfile, RowError> {
        let role = self
            .role
            .parse::<UserRole>()
            .map_err(|message| RowError { row, message })?;
        Ok(UserProfile {
            display_name: self.display_name.unwrap_or_else(|| self.id.clone()),
            id: UserId(self.id),
            role,
            rating_total: self.rating_total.unwrap_or(0.0),
            rating_count: self.rating_count.unwrap_or(0),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DonationRow {
    id: String,
    donor_id: String,
    title: String,
    category: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    tags: Option<String>,
    quantity: u32,
    #[serde(default)]
    remaining_quantity: Option<u32>,
    #[serde(default)]
    perishable: Option<bool>,
    latitude: f64,
    longitude: f64,
    delivery_modes: String,
    #[serde(default)]
    status: Option<DonationStatus>,
    created_at: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    expires_at: Option<String>,
}

impl DonationRow {
    pub(crate) fn into_donation(self, row: usize) -> Result<Donation, RowError> {
        let delivery_modes = split_list(&self.delivery_modes)
            .into_iter()
            .map(|mode| mode.parse::<DeliveryMode>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|message| RowError { row, message })?;
        if delivery_modes.is_empty() {
            return Err(RowError {
                row,
                message: format!("donation {} offers no delivery mode", self.id),
            });
        }

        Ok(Donation {
            id: DonationId(self.id),
            donor_id: UserId(self.donor_id),
            title: self.title,
            category: self.category,
            tags: self.tags.as_deref().map(split_list).unwrap_or_default(),
            quantity: self.quantity,
            remaining_quantity: self.remaining_quantity.unwrap_or(self.quantity),
            perishable: self.perishable.unwrap_or(false),
            location: GeoPoint::new(self.latitude, self.longitude),
            delivery_modes,
            status: self.status.unwrap_or(DonationStatus::Available),
            created_at: required_timestamp(&self.created_at, row)?,
            expires_at: optional_timestamp(self.expires_at.as_deref(), row)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RequestRow {
    id: String,
    requester_id: String,
    title: String,
    category: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    tags: Option<String>,
    quantity: u32,
    #[serde(default)]
    fulfilled_quantity: Option<u32>,
    urgency: String,
    latitude: f64,
    longitude: f64,
    delivery_mode: String,
    #[serde(default)]
    status: Option<RequestStatus>,
    created_at: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    needed_by: Option<String>,
}

impl RequestRow {
    pub(crate) fn into_request(self, row: usize) -> Result<DonationRequest, RowError> {
        let urgency = self
            .urgency
            .parse::<Urgency>()
            .map_err(|message| RowError { row, message })?;
        let delivery_mode = self
            .delivery_mode
            .parse::<DeliveryMode>()
            .map_err(|message| RowError { row, message })?;

        Ok(DonationRequest {
            id: RequestId(self.id),
            requester_id: UserId(self.requester_id),
            title: self.title,
            category: self.category,
            tags: self.tags.as_deref().map(split_list).unwrap_or_default(),
            quantity: self.quantity,
            fulfilled_quantity: self.fulfilled_quantity.unwrap_or(0),
            urgency,
            location: GeoPoint::new(self.latitude, self.longitude),
            delivery_mode,
            status: self.status.unwrap_or(RequestStatus::Open),
            created_at: required_timestamp(&self.created_at, row)?,
            needed_by: optional_timestamp(self.needed_by.as_deref(), row)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct VolunteerRow {
    user_id: String,
    latitude: f64,
    longitude: f64,
    service_radius_km: f64,
    #[serde(default)]
    available: Option<bool>,
    created_at: String,
}

impl VolunteerRow {
    pub(crate) fn into_volunteer(self, row: usize) -> Result<Volunteer, RowError> {
        Ok(Volunteer {
            user_id: UserId(self.user_id),
            location: GeoPoint::new(self.latitude, self.longitude),
            service_radius_km: self.service_radius_km,
            available: self.available.unwrap_or(true),
            created_at: required_timestamp(&self.created_at, row)?,
        })
    }
}

/// `;`-separated list cell; blank entries are dropped.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn required_timestamp(value: &str, row: usize) -> Result<DateTime<Utc>, RowError> {
    parse_timestamp(value).ok_or_else(|| RowError {
        row,
        message: format!("invalid timestamp '{value}'"),
    })
}

fn optional_timestamp(value: Option<&str>, row: usize) -> Result<Option<DateTime<Utc>>, RowError> {
    value.map(|raw| required_timestamp(raw, row)).transpose()
}
