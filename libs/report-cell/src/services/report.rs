use serde_json::json;
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_http::{ApiClient, Method};
use shared_models::{ApiError, SessionContext};
use shared_utils::RetryPolicy;

use crate::models::{PatientReport, PatientReportList, Report, ReportEnvelope, ReportError, StatusResponse};

pub struct ReportService {
    client: ApiClient,
    retry: RetryPolicy,
}

impl ReportService {
    pub fn new(config: &AppConfig) -> Result<Self, ReportError> {
        Ok(Self {
            client: ApiClient::new(config)?,
            retry: RetryPolicy::from_config(config),
        })
    }

    pub async fn get(&self, ctx: &SessionContext, report_id: i64) -> Result<Report, ReportError> {
        let path = format!("/report/{}", report_id);
        let envelope: ReportEnvelope = self
            .retry
            .run("get report", || {
                self.client.request(Method::GET, &path, Some(ctx.token()), None)
            })
            .await
            .map_err(|e| not_found_as(e, report_id))?;

        debug!("Fetched report {}", report_id);
        Ok(envelope.report)
    }

    /// Store the reviewed text of a report. Overwrites any earlier version.
    pub async fn finalize(
        &self,
        ctx: &SessionContext,
        report_id: i64,
        final_report: &str,
    ) -> Result<(), ReportError> {
        if final_report.trim().is_empty() {
            return Err(ReportError::Validation("Final report cannot be empty".to_string()));
        }

        let path = format!("/report/{}/finalize", report_id);
        let body = json!({ "final_report": final_report });
        let _: StatusResponse = self
            .retry
            .run("finalize report", || {
                self.client
                    .request(Method::POST, &path, Some(ctx.token()), Some(body.clone()))
            })
            .await
            .map_err(|e| not_found_as(e, report_id))?;

        info!("Report {} finalized", report_id);
        Ok(())
    }

    pub async fn patient_reports(&self, ctx: &SessionContext) -> Result<Vec<PatientReport>, ReportError> {
        let path = format!("/patients/{}/reports", ctx.user().id);
        let list: PatientReportList = self
            .retry
            .run("list patient reports", || {
                self.client.request(Method::GET, &path, Some(ctx.token()), None)
            })
            .await?;

        Ok(list.reports)
    }
}

pub(crate) fn not_found_as(err: ApiError, report_id: i64) -> ReportError {
    match err {
        ApiError::NotFound(_) => ReportError::NotFound(report_id),
        other => ReportError::Api(other),
    }
}
