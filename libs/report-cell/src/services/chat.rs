use serde_json::json;
use tracing::debug;

use shared_config::AppConfig;
use shared_http::{ApiClient, Method};
use shared_models::SessionContext;
use shared_utils::RetryPolicy;

use crate::models::{ChatHistory, ChatMessage, ReportError, StatusResponse};
use crate::services::report::not_found_as;

/// Per-report message thread between patient and doctor.
pub struct ChatService {
    client: ApiClient,
    retry: RetryPolicy,
}

impl ChatService {
    pub fn new(config: &AppConfig) -> Result<Self, ReportError> {
        Ok(Self {
            client: ApiClient::new(config)?,
            retry: RetryPolicy::from_config(config),
        })
    }

    pub async fn history(&self, ctx: &SessionContext, report_id: i64) -> Result<Vec<ChatMessage>, ReportError> {
        let path = format!("/chat/{}", report_id);
        let history: ChatHistory = self
            .retry
            .run("chat history", || {
                self.client.request(Method::GET, &path, Some(ctx.token()), None)
            })
            .await
            .map_err(|e| not_found_as(e, report_id))?;

        debug!("Report {} has {} chat messages", report_id, history.messages.len());
        Ok(history.messages)
    }

    /// Not retried; a repeated send would post the message twice.
    pub async fn send(
        &self,
        ctx: &SessionContext,
        report_id: i64,
        sender: &str,
        message: &str,
    ) -> Result<ChatMessage, ReportError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ReportError::Validation("Message cannot be empty".to_string()));
        }

        let outgoing = ChatMessage {
            report_id: Some(report_id),
            sender: sender.to_string(),
            message: message.to_string(),
        };
        let path = format!("/chat/{}/send", report_id);
        let body = json!({ "sender": outgoing.sender, "message": outgoing.message });

        let _: StatusResponse = self
            .client
            .request(Method::POST, &path, Some(ctx.token()), Some(body))
            .await
            .map_err(|e| not_found_as(e, report_id))?;

        debug!("{} posted to report {} chat", sender, report_id);
        Ok(outgoing)
    }
}
