// libs/report-cell/src/models.rs
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use shared_models::ApiError;

// ==============================================================================
// TRIAGE MODELS
// ==============================================================================

/// What the patient hands in for an AI second opinion.
#[derive(Debug, Clone)]
pub enum TriageSubmission {
    /// A scanned report or prescription (PDF, image or plain text).
    File {
        filename: String,
        bytes: Vec<u8>,
        mime: String,
    },
    /// Typed-in findings when there is nothing to upload.
    Manual {
        lab_report: String,
        prescription: String,
        doctor_notes: String,
    },
}

impl TriageSubmission {
    pub fn validate(&self) -> Result<(), ReportError> {
        match self {
            TriageSubmission::File { filename, bytes, .. } => {
                if filename.trim().is_empty() {
                    return Err(ReportError::Validation("File name cannot be empty".to_string()));
                }
                if bytes.is_empty() {
                    return Err(ReportError::Validation(format!("{} is empty", filename)));
                }
            }
            TriageSubmission::Manual {
                lab_report,
                prescription,
                doctor_notes,
            } => {
                if [lab_report, prescription, doctor_notes]
                    .iter()
                    .all(|field| field.trim().is_empty())
                {
                    return Err(ReportError::Validation(
                        "Enter a lab report, prescription or doctor notes".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TriageResult {
    pub report_id: i64,
    #[serde(default)]
    pub ai_result: Vec<Prediction>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

impl TriageResult {
    /// Highest-risk prediction; ties keep the backend's order.
    pub fn top_prediction(&self) -> Option<&Prediction> {
        self.ai_result.iter().reduce(|best, next| {
            if next.risk_percent().unwrap_or(0) > best.risk_percent().unwrap_or(0) {
                next
            } else {
                best
            }
        })
    }

    /// Ids of every recommended doctor across predictions, first occurrence wins.
    pub fn recommended_doctor_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = Vec::new();
        for id in self
            .ai_result
            .iter()
            .flat_map(|p| p.recommended_doctors.iter())
            .filter_map(|d| d.id)
        {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Prediction {
    pub disease: String,
    #[serde(default)]
    pub risk: Value,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub recommended_doctors: Vec<RecommendedDoctor>,
}

impl Prediction {
    /// Risk as a whole percentage. The model answers `"72%"`, `"72"` or `72`.
    pub fn risk_percent(&self) -> Option<u8> {
        let raw = match &self.risk {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
            _ => return None,
        };
        if !(0.0..=100.0).contains(&raw) {
            return None;
        }
        Some(raw.round() as u8)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RecommendedDoctor {
    #[serde(default, alias = "doctor_id", alias = "user_id")]
    pub id: Option<i64>,
    #[serde(default, alias = "doctor's name")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub speciality: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub rating: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

// ==============================================================================
// REPORT & CHAT MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Report {
    pub id: i64,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub extracted_text: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub ai_result: Vec<Prediction>,
    #[serde(default)]
    pub final_report: Option<String>,
}

impl Report {
    pub fn is_finalized(&self) -> bool {
        self.final_report
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportEnvelope {
    pub report: Report,
}

/// A consultation report as listed on the patient's "my reports" page.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PatientReport {
    pub id: i64,
    #[serde(default)]
    pub appointment_id: Option<i64>,
    #[serde(default)]
    pub doctor_name: Option<String>,
    #[serde(default)]
    pub final_diagnosis: Option<String>,
    #[serde(default)]
    pub pdf_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientReportList {
    #[serde(default)]
    pub reports: Vec<PatientReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    #[serde(default, skip_serializing)]
    pub report_id: Option<i64>,
    pub sender: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatHistory {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Report not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

// Dataset rows carry numbers and strings interchangeably.
fn loose_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
