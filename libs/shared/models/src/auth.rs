use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub user_id: i64,
    pub role: Option<String>,
    pub exp: Option<i64>,
}

impl JwtClaims {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp.is_some_and(|exp| exp < now.timestamp())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    #[serde(rename = "user", alias = "patient")]
    Patient,
    #[serde(rename = "doctor")]
    Doctor,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Doctor => write!(f, "doctor"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub doctor_id: Option<i64>,
}

/// A document the patient uploaded for triage, handed to the booking flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadedDocument {
    pub file_path: String,
    pub filename: String,
}

/// Everything a logged-in user carries between views.
///
/// Created once after login and dropped on logout. Views that used to read
/// ad hoc keys out of browser storage take a reference to this instead.
#[derive(Debug, Clone)]
pub struct SessionContext {
    token: String,
    user: User,
    created_at: DateTime<Utc>,
    uploaded_document: Option<UploadedDocument>,
    last_prediction: Option<String>,
    recommended_doctor_ids: Vec<i64>,
    active_appointment_id: Option<i64>,
}

impl SessionContext {
    pub fn new(user: User, token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user,
            created_at: Utc::now(),
            uploaded_document: None,
            last_prediction: None,
            recommended_doctor_ids: Vec::new(),
            active_appointment_id: None,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Numeric identity for RTC participant ids. `None` when the user id
    /// does not fit the RTC network's unsigned 32-bit id space.
    pub fn participant_identity(&self) -> Option<u32> {
        u32::try_from(self.user.id).ok().filter(|id| *id != 0)
    }

    /// The doctor record id for doctors; patients have none.
    pub fn doctor_id(&self) -> Option<i64> {
        match self.user.role {
            Role::Doctor => self.user.doctor_id,
            Role::Patient => None,
        }
    }

    pub fn set_uploaded_document(&mut self, document: UploadedDocument) {
        self.uploaded_document = Some(document);
    }

    pub fn uploaded_document(&self) -> Option<&UploadedDocument> {
        self.uploaded_document.as_ref()
    }

    pub fn set_last_prediction(&mut self, disease: impl Into<String>) {
        self.last_prediction = Some(disease.into());
    }

    pub fn last_prediction(&self) -> Option<&str> {
        self.last_prediction.as_deref()
    }

    pub fn set_recommended_doctors(&mut self, ids: Vec<i64>) {
        self.recommended_doctor_ids = ids;
    }

    pub fn recommended_doctor_ids(&self) -> &[i64] {
        &self.recommended_doctor_ids
    }

    pub fn set_active_appointment(&mut self, appointment_id: i64) {
        self.active_appointment_id = Some(appointment_id);
    }

    pub fn active_appointment_id(&self) -> Option<i64> {
        self.active_appointment_id
    }

    pub fn take_active_appointment(&mut self) -> Option<i64> {
        self.active_appointment_id.take()
    }
}
