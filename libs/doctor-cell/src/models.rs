use chrono::{DateTime, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use thiserror::Error;

use shared_models::ApiError;

// ==============================================================================
// DOCTOR DIRECTORY
// ==============================================================================

/// A doctor as listed by the directory. The directory is loaded from a
/// spreadsheet upstream, so numeric columns may arrive as strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub speciality: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub experience: Option<String>,
    #[serde(default, deserialize_with = "loose_f32")]
    pub rating: Option<f32>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub phone: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
}

impl Doctor {
    pub fn display_name(&self) -> String {
        if self.name.starts_with("Dr") {
            self.name.clone()
        } else {
            format!("Dr. {}", self.name)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DoctorSearchFilters {
    pub speciality: Option<String>,
    pub keyword: Option<String>,
    pub location: Option<String>,
}

impl DoctorSearchFilters {
    /// Only filters with content are sent; the backend treats a missing
    /// parameter as "any".
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        [
            ("speciality", &self.speciality),
            ("keyword", &self.keyword),
            ("location", &self.location),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (key, v.to_string()))
        })
        .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorListResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub count: Option<usize>,
    pub doctors: Vec<Doctor>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DoctorEnvelope {
    Wrapped { doctor: Doctor },
    Bare(Doctor),
}

impl DoctorEnvelope {
    pub fn into_doctor(self) -> Doctor {
        match self {
            DoctorEnvelope::Wrapped { doctor } | DoctorEnvelope::Bare(doctor) => doctor,
        }
    }
}

/// The doctor's own view: profile plus every slot, booked or not.
#[derive(Debug, Clone, Deserialize)]
pub struct DoctorDashboard {
    pub doctor: Doctor,
    #[serde(default)]
    pub slots: Vec<Slot>,
}

impl DoctorDashboard {
    pub fn open_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|s| !s.is_booked)
    }
}

// ==============================================================================
// SLOTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slot {
    pub id: i64,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub is_booked: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotListResponse {
    pub slots: Vec<Slot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotCreatedResponse {
    pub slot: Slot,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSlot {
    pub start: String,
    pub end: String,
}

impl NewSlot {
    pub fn validate(&self) -> Result<(), DoctorError> {
        let start = SlotTime::parse(&self.start).ok_or_else(|| {
            DoctorError::Validation(format!("Unrecognised slot start '{}'", self.start))
        })?;
        let end = SlotTime::parse(&self.end).ok_or_else(|| {
            DoctorError::Validation(format!("Unrecognised slot end '{}'", self.end))
        })?;

        match start.partial_cmp(&end) {
            Some(Ordering::Less) => Ok(()),
            Some(_) => Err(DoctorError::Validation(format!(
                "Slot must end after it starts ({} - {})",
                self.start, self.end
            ))),
            None => Err(DoctorError::Validation(
                "Slot start and end must use the same format".to_string(),
            )),
        }
    }
}

/// Slot boundaries are free-form strings on the wire: a bare `HH:MM`, a
/// `YYYY-MM-DD HH:MM` local timestamp, or RFC 3339.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotTime {
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

impl SlotTime {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(t) = NaiveTime::parse_from_str(raw, "%H:%M") {
            return Some(SlotTime::Time(t));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M") {
            return Some(SlotTime::DateTime(dt));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M") {
            return Some(SlotTime::DateTime(dt));
        }
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| SlotTime::DateTime(dt.naive_utc()))
    }
}

impl PartialOrd for SlotTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (SlotTime::Time(a), SlotTime::Time(b)) => a.partial_cmp(b),
            (SlotTime::DateTime(a), SlotTime::DateTime(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum DoctorError {
    #[error("Doctor not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn loose_f32<'de, D>(deserializer: D) -> Result<Option<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64().map(|f| f as f32),
        Some(Value::String(s)) => s.trim().parse::<f32>().ok(),
        _ => None,
    })
}
