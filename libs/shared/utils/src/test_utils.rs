use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;

use shared_config::AppConfig;
use shared_models::auth::{Role, SessionContext, User};

static NEXT_TEST_ID: AtomicI64 = AtomicI64::new(100);

pub struct TestConfig {
    pub jwt_secret: String,
    pub api_base_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-signing-must-be-long-enough".to_string(),
            api_base_url: "http://localhost:5000".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_base_url(url: impl Into<String>) -> Self {
        Self {
            api_base_url: url.into(),
            ..Self::default()
        }
    }

    /// Config pointed at `api_base_url` with millisecond retry delays.
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            api_base_url: self.api_base_url.clone(),
            request_timeout_secs: 5,
            retry_max_attempts: 3,
            retry_base_delay_ms: 1,
            rtc_app_id: String::new(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub doctor_id: Option<i64>,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::patient("test@example.com")
    }
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        let id = NEXT_TEST_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            id,
            name: "Test User".to_string(),
            email: email.to_string(),
            role,
            doctor_id: match role {
                Role::Doctor => Some(id + 1000),
                Role::Patient => None,
            },
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, Role::Doctor)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Patient)
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            name: Some(self.name.clone()),
            email: self.email.clone(),
            role: self.role,
            doctor_id: self.doctor_id,
        }
    }

    pub fn to_session(&self, secret: &str) -> SessionContext {
        let token = JwtTestUtils::create_test_token(self, secret, Some(8));
        SessionContext::new(self.to_user(), token)
    }

    fn wire_role(&self) -> &'static str {
        match self.role {
            Role::Patient => "user",
            Role::Doctor => "doctor",
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let exp = Utc::now() + Duration::hours(exp_hours.unwrap_or(8));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "user_id": user.id,
            "role": user.wire_role(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token".to_string()
    }
}

/// Canned backend bodies shaped like the real NextOpinion API.
pub struct MockApiResponses;

impl MockApiResponses {
    pub fn login_response(user: &TestUser, token: &str) -> serde_json::Value {
        json!({
            "status": "success",
            "user": {
                "id": user.id,
                "name": user.name,
                "email": user.email,
                "role": user.wire_role(),
                "doctor_id": user.doctor_id,
                "token": token
            }
        })
    }

    pub fn doctor(id: i64, name: &str, speciality: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "speciality": speciality,
            "experience": "12 years",
            "rating": "4.7",
            "location": "Pune",
            "email": format!("dr{}@example.com", id),
            "phone": "+91-9000000000"
        })
    }

    pub fn slot(id: i64, start: &str, end: &str) -> serde_json::Value {
        json!({ "id": id, "start": start, "end": end })
    }

    pub fn appointment(id: i64, status: &str, video_channel: Option<&str>) -> serde_json::Value {
        json!({
            "id": id,
            "doctor_name": "Dr. Rao",
            "patient_name": "Asha",
            "disease": "Migraine",
            "slot_start": "10:00",
            "slot_end": "10:30",
            "status": status,
            "date": "2025-01-10",
            "video_channel": video_channel
        })
    }

    pub fn token_response(channel: &str, token: &str, app_id: &str) -> serde_json::Value {
        json!({
            "token": token,
            "appId": app_id,
            "channelName": channel
        })
    }

    pub fn error_response(message: &str) -> serde_json::Value {
        json!({ "error": message })
    }
}
