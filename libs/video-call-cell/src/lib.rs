// libs/video-call-cell/src/lib.rs
//! # Video Call Cell
//!
//! Drives a single patient-doctor video call through an external RTC SDK.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle -> FetchingCredential -> Joining -> Joined -> Leaving -> Left
//!                  |               |
//!                  +---------------+--> Failed(reason)
//! ```
//!
//! [`CallSessionController`] owns the call. It fetches a session credential
//! from the backend, joins the channel, creates and publishes the local
//! microphone and camera tracks, then renders remote participants as their
//! publish/unpublish notifications arrive. Every track it acquires is stopped
//! and closed exactly once, whichever way the call ends.
//!
//! ## Collaborators
//!
//! The SDK, capture devices, render surfaces and the hosting view are reached
//! through the traits in [`services::rtc`]. The credential endpoint is behind
//! [`CredentialProvider`], with [`HttpCredentialProvider`] talking to the
//! backend's `POST /generate_token`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use video_call_cell::{CallDeps, CallSessionController, ChannelId, derive_participant_id};
//!
//! # async fn example(deps: CallDeps, ctx: &shared_models::SessionContext) -> Result<(), video_call_cell::CallError> {
//! let (participant, _) = derive_participant_id(Some(ctx));
//! let call = Arc::new(CallSessionController::new(ChannelId::new("doctor_patient_42")?, participant, deps));
//! call.start().await?;
//! call.set_microphone_enabled(false).await;
//! call.leave().await;
//! # Ok(())
//! # }
//! ```

pub mod models;
pub mod services;

pub use models::{
    CallError, CallState, ChannelId, FailureReason, MediaKind, ParticipantCredential,
    ParticipantId, ParticipantIdSource, RemoteParticipant, RtcEvent, ToggleState,
    VideoEncoderPreset,
};

pub use services::{
    derive_participant_id, CallDeps, CallHost, CallSessionController, CredentialProvider,
    HttpCredentialProvider, LocalTrack, MediaDevices, RenderSurfaces, RtcClient,
};
