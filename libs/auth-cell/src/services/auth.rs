use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_http::{ApiClient, Method};
use shared_models::{ApiError, SessionContext};
use shared_utils::jwt::decode_claims;

use crate::models::{AuthError, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(config: &AppConfig) -> Result<Self, AuthError> {
        Ok(Self {
            client: ApiClient::new(config)?,
        })
    }

    /// Log in and open the session every other view works from.
    pub async fn login(&self, request: LoginRequest) -> Result<SessionContext, AuthError> {
        if request.email.trim().is_empty() || request.password.is_empty() {
            return Err(AuthError::Validation("Email and password are required".to_string()));
        }

        debug!("Logging in {}", request.email);

        let body = json!({
            "email": request.email.trim(),
            "password": request.password,
        });

        let response: LoginResponse = self
            .client
            .request(Method::POST, "/auth/login", None, Some(body))
            .await
            .map_err(|e| match e {
                ApiError::Auth(_) => AuthError::InvalidCredentials,
                other => AuthError::Api(other),
            })?;

        let ctx = SessionContext::new(response.user.user, response.user.token);
        info!("User {} logged in as {}", ctx.user().id, ctx.role());
        Ok(ctx)
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<String, AuthError> {
        request.validate()?;

        let response: RegisterResponse = self
            .client
            .request(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({
                    "name": request.name.trim(),
                    "email": request.email.trim(),
                    "password": request.password,
                })),
            )
            .await
            .map_err(|e| match e {
                ApiError::BadRequest(msg) if msg.to_lowercase().contains("already registered") => {
                    AuthError::EmailTaken
                }
                ApiError::BadRequest(msg) => AuthError::Validation(msg),
                other => AuthError::Api(other),
            })?;

        info!("Registered {}", request.email);
        Ok(response.message)
    }

    /// Close the session. Consuming the context guarantees nothing keeps
    /// using the token afterwards.
    pub fn logout(&self, ctx: SessionContext) {
        info!("User {} logged out", ctx.user().id);
        drop(ctx);
    }

    /// True when the token is unreadable or past its expiry.
    pub fn is_session_expired(&self, ctx: &SessionContext) -> bool {
        match decode_claims(ctx.token()) {
            Ok(claims) => claims.is_expired_at(Utc::now()),
            Err(e) => {
                warn!("Session token could not be decoded: {}", e);
                true
            }
        }
    }
}
