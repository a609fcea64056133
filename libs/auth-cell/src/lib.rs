//! # Auth Cell
//!
//! Login, registration and logout against the NextOpinion backend.
//! A successful login yields the [`SessionContext`] every other cell takes
//! by reference.

pub mod models;
pub mod services;

pub use models::{AuthError, LoginRequest, RegisterRequest};
pub use services::AuthService;
pub use shared_models::SessionContext;
