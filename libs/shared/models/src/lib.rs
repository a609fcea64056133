pub mod auth;
pub mod error;

pub use auth::{Role, SessionContext, UploadedDocument, User};
pub use error::ApiError;
