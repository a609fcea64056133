use serde_json::json;
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_http::{multipart, ApiClient, Method};
use shared_models::{SessionContext, UploadedDocument};

use crate::models::{ReportError, TriageResult, TriageSubmission};

const ANONYMOUS: &str = "Anonymous";

pub struct DocumentService {
    client: ApiClient,
}

impl DocumentService {
    pub fn new(config: &AppConfig) -> Result<Self, ReportError> {
        Ok(Self {
            client: ApiClient::new(config)?,
        })
    }

    /// Send a report for AI triage and hand the outcome to the booking flow
    /// through the session context.
    ///
    /// Uploads are never retried: each call creates a report on the backend.
    pub async fn submit_for_triage(
        &self,
        ctx: &mut SessionContext,
        submission: TriageSubmission,
    ) -> Result<TriageResult, ReportError> {
        submission.validate()?;

        let user_name = ctx
            .user()
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS.to_string());

        let result: TriageResult = match submission {
            TriageSubmission::File { filename, bytes, mime } => {
                debug!("Uploading {} ({} bytes) for triage", filename, bytes.len());
                let part = multipart::Part::bytes(bytes)
                    .file_name(filename)
                    .mime_str(&mime)
                    .map_err(|e| ReportError::Validation(format!("Invalid content type {}: {}", mime, e)))?;
                let form = multipart::Form::new()
                    .part("file", part)
                    .text("user_name", user_name);

                self.client
                    .upload_multipart("/second_opinion", form, Some(ctx.token()))
                    .await?
            }
            TriageSubmission::Manual {
                lab_report,
                prescription,
                doctor_notes,
            } => {
                debug!("Submitting typed findings for triage");
                let body = json!({
                    "user_name": user_name,
                    "lab_report": lab_report,
                    "prescription": prescription,
                    "doctor_notes": doctor_notes,
                });
                self.client
                    .request(Method::POST, "/second_opinion", Some(ctx.token()), Some(body))
                    .await?
            }
        };

        if let (Some(file_path), Some(filename)) = (&result.file_path, &result.filename) {
            ctx.set_uploaded_document(UploadedDocument {
                file_path: file_path.clone(),
                filename: filename.clone(),
            });
        }

        match result.top_prediction() {
            Some(top) => ctx.set_last_prediction(top.disease.clone()),
            None => warn!("Triage for report {} returned no predictions", result.report_id),
        }
        ctx.set_recommended_doctors(result.recommended_doctor_ids());

        info!(
            "Report {} triaged: {} predictions, {} recommended doctors",
            result.report_id,
            result.ai_result.len(),
            ctx.recommended_doctor_ids().len()
        );
        Ok(result)
    }
}
