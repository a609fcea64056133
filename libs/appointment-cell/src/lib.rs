//! # Appointment Cell
//!
//! Appointment request, accept/reject and final-report workflow.
//!
//! Appointment status is a closed [`AppointmentStatus`] variant and the UI
//! asks [`allowed_actions`] what to offer, so every (status, role) pair is
//! handled in one `match`.

pub mod models;
pub mod services;

pub use models::*;
pub use services::*;
