use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use tracing::debug;

use shared_models::auth::JwtClaims;
use shared_models::ApiError;

/// Read the claims of a backend-issued token.
///
/// The signature is not checked: the client never holds the signing secret,
/// and the backend re-validates every request anyway. This is only used to
/// learn the expiry and the user the token was minted for.
pub fn decode_claims(token: &str) -> Result<JwtClaims, ApiError> {
    let parts: Vec<&str> = token.split('.').collect();
    let claims_b64 = match parts.as_slice() {
        [_, claims, _] => *claims,
        _ => return Err(ApiError::ValidationError("Invalid token format".to_string())),
    };

    let bytes = URL_SAFE_NO_PAD.decode(claims_b64.trim_end_matches('=')).map_err(|e| {
        debug!("Failed to decode claims: {}", e);
        ApiError::ValidationError("Invalid claims encoding".to_string())
    })?;

    serde_json::from_slice::<JwtClaims>(&bytes).map_err(|e| {
        debug!("Failed to parse claims: {}", e);
        ApiError::ValidationError("Invalid claims format".to_string())
    })
}
