// libs/video-call-cell/src/services/credential.rs
use async_trait::async_trait;
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_http::{ApiClient, Method};

use crate::models::{
    CallError, ChannelId, CredentialRequest, CredentialResponse, ParticipantCredential,
    ParticipantId,
};

/// Issues session credentials for joining a channel.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn fetch(
        &self,
        channel: &ChannelId,
        participant: ParticipantId,
    ) -> Result<ParticipantCredential, CallError>;
}

/// Fetches credentials from the backend's token endpoint.
///
/// A failed fetch is never retried; a stale channel name will not succeed
/// the second time either.
#[derive(Debug)]
pub struct HttpCredentialProvider {
    client: ApiClient,
    app_id_override: Option<String>,
    auth_token: Option<String>,
}

impl HttpCredentialProvider {
    pub fn new(config: &AppConfig) -> Result<Self, CallError> {
        let app_id_override = config
            .has_rtc_app_override()
            .then(|| config.rtc_app_id.trim().to_string());

        Ok(Self {
            client: ApiClient::new(config)?,
            app_id_override,
            auth_token: None,
        })
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

#[async_trait]
impl CredentialProvider for HttpCredentialProvider {
    async fn fetch(
        &self,
        channel: &ChannelId,
        participant: ParticipantId,
    ) -> Result<ParticipantCredential, CallError> {
        debug!("Requesting credential for {} on channel {}", participant, channel);

        let body = serde_json::to_value(CredentialRequest {
            channel_name: channel.as_str(),
            uid: participant.0,
        })
        .map_err(|e| CallError::CredentialFetch(e.to_string()))?;

        let response: CredentialResponse = self
            .client
            .request(Method::POST, "/generate_token", self.auth_token.as_deref(), Some(body))
            .await
            .map_err(|e| CallError::CredentialFetch(e.to_string()))?;

        if response.token.trim().is_empty() {
            return Err(CallError::CredentialFetch("backend returned an empty token".to_string()));
        }

        if let Some(echoed) = response.channel_name.as_deref() {
            if echoed != channel.as_str() {
                warn!("Token issued for channel {} but {} was requested", echoed, channel);
            }
        }

        let application_id = match &self.app_id_override {
            Some(app_id) => app_id.clone(),
            None if !response.app_id.trim().is_empty() => response.app_id,
            None => {
                return Err(CallError::CredentialFetch(
                    "backend returned no application id".to_string(),
                ))
            }
        };

        info!("Credential issued for {} on channel {}", participant, channel);
        Ok(ParticipantCredential {
            session_token: response.token,
            participant_id: participant,
            application_id,
        })
    }
}
