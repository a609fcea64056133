// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use shared_models::{ApiError, Role};

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: i64,
    #[serde(default)]
    pub doctor_id: Option<i64>,
    #[serde(default)]
    pub patient_id: Option<i64>,
    #[serde(default)]
    pub doctor_name: Option<String>,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub disease: Option<String>,
    #[serde(default)]
    pub slot_start: Option<String>,
    #[serde(default)]
    pub slot_end: Option<String>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub video_channel: Option<String>,
    #[serde(default)]
    pub final_report_path: Option<String>,
}

impl Appointment {
    /// Channel both parties join for this appointment's call, if one was issued.
    pub fn call_channel(&self) -> Option<&str> {
        self.video_channel
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    pub fn can_join_call(&self, role: Role) -> bool {
        self.call_channel().is_some()
            && allowed_actions(&self.status, role).contains(&AppointmentAction::JoinCall)
    }

    /// Actions the UI should offer `role` for this appointment right now.
    pub fn available_actions(&self, role: Role) -> Vec<AppointmentAction> {
        allowed_actions(&self.status, role)
            .iter()
            .copied()
            .filter(|action| match action {
                AppointmentAction::JoinCall => self.call_channel().is_some(),
                AppointmentAction::DownloadReport => self.final_report_path.is_some(),
                _ => true,
            })
            .collect()
    }

    pub fn slot_label(&self) -> String {
        match (&self.slot_start, &self.slot_end) {
            (Some(start), Some(end)) => format!("{} - {}", start, end),
            (Some(start), None) => start.clone(),
            _ => "unscheduled".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[serde(alias = "pending")]
    Requested,
    #[serde(alias = "confirmed", alias = "proposed")]
    Accepted,
    Rejected,
    Completed,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Rejected | AppointmentStatus::Completed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Requested => write!(f, "requested"),
            AppointmentStatus::Accepted => write!(f, "accepted"),
            AppointmentStatus::Rejected => write!(f, "rejected"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentAction {
    Accept,
    Reject,
    JoinCall,
    SubmitFinalReport,
    DownloadReport,
    ShareDocuments,
}

impl AppointmentAction {
    /// Path segment of `POST /appointments/{id}/{segment}` for doctor responses.
    pub fn response_segment(&self) -> Option<&'static str> {
        match self {
            AppointmentAction::Accept => Some("accept"),
            AppointmentAction::Reject => Some("reject"),
            _ => None,
        }
    }

    /// Status an appointment moves to once this action succeeds.
    pub fn resulting_status(&self) -> Option<AppointmentStatus> {
        match self {
            AppointmentAction::Accept => Some(AppointmentStatus::Accepted),
            AppointmentAction::Reject => Some(AppointmentStatus::Rejected),
            AppointmentAction::SubmitFinalReport => Some(AppointmentStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for AppointmentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AppointmentAction::Accept => "Accept",
            AppointmentAction::Reject => "Reject",
            AppointmentAction::JoinCall => "Join Call",
            AppointmentAction::SubmitFinalReport => "Submit Final Report",
            AppointmentAction::DownloadReport => "Download Report",
            AppointmentAction::ShareDocuments => "Share Documents",
        };
        write!(f, "{}", label)
    }
}

/// Which actions each role may take on an appointment in a given status.
pub fn allowed_actions(status: &AppointmentStatus, role: Role) -> &'static [AppointmentAction] {
    use AppointmentAction::*;

    match (status, role) {
        (AppointmentStatus::Requested, Role::Doctor) => &[Accept, Reject],
        (AppointmentStatus::Requested, Role::Patient) => &[ShareDocuments],
        (AppointmentStatus::Accepted, Role::Doctor) => &[JoinCall, SubmitFinalReport],
        (AppointmentStatus::Accepted, Role::Patient) => &[JoinCall],
        (AppointmentStatus::Rejected, _) => &[],
        (AppointmentStatus::Completed, _) => &[DownloadReport],
    }
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentListResponse {
    #[serde(default)]
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AppointmentEnvelope {
    Wrapped { appointment: Appointment },
    Bare(Appointment),
}

impl AppointmentEnvelope {
    pub fn into_appointment(self) -> Appointment {
        match self {
            AppointmentEnvelope::Wrapped { appointment } | AppointmentEnvelope::Bare(appointment) => {
                appointment
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentRequest {
    pub doctor_id: i64,
    pub slot_id: Option<i64>,
    pub disease: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentCreatedResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub appointment_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FinalReport {
    pub consultation_summary: String,
    pub diagnosis: String,
    pub medications: String,
}

impl FinalReport {
    pub fn validate(&self) -> Result<(), AppointmentError> {
        if self.diagnosis.trim().is_empty() {
            return Err(AppointmentError::Validation("A diagnosis is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FinalReportReceipt {
    #[serde(default)]
    pub message: Option<String>,
    pub report_id: i64,
    pub pdf_path: String,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found: {0}")]
    NotFound(i64),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("{action} is not available to a {role} while the appointment is {status}")]
    ActionNotAllowed {
        action: AppointmentAction,
        status: AppointmentStatus,
        role: Role,
    },

    #[error("Slot {0} is no longer available")]
    SlotUnavailable(i64),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}
