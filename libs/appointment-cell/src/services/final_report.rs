// libs/appointment-cell/src/services/final_report.rs
use tracing::info;

use shared_config::AppConfig;
use shared_http::{ApiClient, Method};
use shared_models::{Role, SessionContext};
use shared_utils::RetryPolicy;

use crate::models::{AppointmentError, FinalReport, FinalReportReceipt};
use crate::services::booking::{not_found_as, require_role};

/// Post-call reporting: the doctor files the final report, which completes
/// the appointment and produces a downloadable PDF.
pub struct FinalReportService {
    client: ApiClient,
    retry: RetryPolicy,
}

impl FinalReportService {
    pub fn new(config: &AppConfig) -> Result<Self, AppointmentError> {
        Ok(Self {
            client: ApiClient::new(config)?,
            retry: RetryPolicy::from_config(config),
        })
    }

    pub async fn submit(
        &self,
        ctx: &mut SessionContext,
        appointment_id: i64,
        report: &FinalReport,
    ) -> Result<FinalReportReceipt, AppointmentError> {
        require_role(ctx, Role::Doctor, "submit final reports")?;
        report.validate()?;

        let path = format!("/appointments/{}/final_report_full", appointment_id);
        let body = serde_json::to_value(report)
            .map_err(|e| AppointmentError::Validation(e.to_string()))?;

        let receipt: FinalReportReceipt = self
            .client
            .request(Method::POST, &path, Some(ctx.token()), Some(body))
            .await
            .map_err(|e| not_found_as(e, appointment_id))?;

        if ctx.active_appointment_id() == Some(appointment_id) {
            ctx.take_active_appointment();
        }

        info!(
            "Final report {} filed for appointment {} ({})",
            receipt.report_id, appointment_id, receipt.pdf_path
        );
        Ok(receipt)
    }

    /// Fetch the generated PDF.
    pub async fn download(
        &self,
        ctx: &SessionContext,
        pdf_path: &str,
    ) -> Result<Vec<u8>, AppointmentError> {
        let pdf_path = pdf_path.trim();
        if pdf_path.is_empty() {
            return Err(AppointmentError::Validation("Report path is missing".to_string()));
        }

        let query = [("path", pdf_path.to_string())];
        let bytes = self
            .retry
            .run("download report", || {
                self.client.download("/reports/download", &query, Some(ctx.token()))
            })
            .await?;

        info!("Downloaded report {} ({} bytes)", pdf_path, bytes.len());
        Ok(bytes)
    }
}
