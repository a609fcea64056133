// Report Cell - triage uploads, report review and per-report chat
pub mod models;
pub mod services;

pub use models::{
    ChatMessage, PatientReport, Prediction, RecommendedDoctor, Report, ReportError,
    TriageResult, TriageSubmission,
};

pub mod api {
    pub use crate::services::chat::ChatService;
    pub use crate::services::document::DocumentService;
    pub use crate::services::report::ReportService;
}
