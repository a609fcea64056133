// libs/video-call-cell/src/services/rtc.rs
//! Boundary to the RTC SDK, the capture devices and the hosting view.
//!
//! The controller only ever talks to these traits, so a vendor SDK binding,
//! a headless test double or a native capture stack can sit behind them.

use async_trait::async_trait;
use std::sync::Arc;

use crate::models::{CallError, ChannelId, FailureReason, MediaKind, ParticipantId, VideoEncoderPreset};
use crate::services::credential::CredentialProvider;

/// Connection to the RTC network for one channel.
#[async_trait]
pub trait RtcClient: Send + Sync {
    async fn join(
        &self,
        application_id: &str,
        channel: &ChannelId,
        session_token: &str,
        participant: ParticipantId,
    ) -> Result<(), CallError>;

    async fn publish(&self, tracks: &[Arc<dyn LocalTrack>]) -> Result<(), CallError>;

    async fn subscribe(&self, participant: ParticipantId, kind: MediaKind) -> Result<(), CallError>;

    async fn leave(&self) -> Result<(), CallError>;

    fn is_connected(&self) -> bool;
}

/// Camera and microphone capture.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Fails with `CallError::PermissionDenied` when the user declines.
    async fn request_permission(&self) -> Result<(), CallError>;

    async fn create_microphone_track(&self) -> Result<Arc<dyn LocalTrack>, CallError>;

    async fn create_camera_track(
        &self,
        preset: VideoEncoderPreset,
    ) -> Result<Arc<dyn LocalTrack>, CallError>;
}

/// A captured local track. The controller stops and closes every track it
/// acquired exactly once.
#[async_trait]
pub trait LocalTrack: Send + Sync {
    fn kind(&self) -> MediaKind;

    async fn set_enabled(&self, enabled: bool) -> Result<(), CallError>;

    fn stop(&self);

    fn close(&self);
}

/// Where media gets rendered. One remote surface per participant.
pub trait RenderSurfaces: Send + Sync {
    fn render_local_preview(&self, track: &dyn LocalTrack);

    fn create_remote(&self, participant: ParticipantId);

    fn attach_remote(&self, participant: ParticipantId, kind: MediaKind);

    fn remove_remote(&self, participant: ParticipantId);

    fn clear(&self);
}

/// The view hosting the call screen.
pub trait CallHost: Send + Sync {
    fn show_blocking_error(&self, reason: FailureReason, message: &str);

    fn navigate_to_post_call(&self);
}

/// Everything a `CallSessionController` needs from the outside world.
#[derive(Clone)]
pub struct CallDeps {
    pub credentials: Arc<dyn CredentialProvider>,
    pub rtc: Arc<dyn RtcClient>,
    pub devices: Arc<dyn MediaDevices>,
    pub surfaces: Arc<dyn RenderSurfaces>,
    pub host: Arc<dyn CallHost>,
}
