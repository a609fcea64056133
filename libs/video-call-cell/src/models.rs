// libs/video-call-cell/src/models.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use shared_models::ApiError;

// ==============================================================================
// CALL IDENTITY
// ==============================================================================

/// Name of the rendezvous point on the RTC network. Both participants of an
/// appointment join the same channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(raw: impl Into<String>) -> Result<Self, CallError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CallError::InvalidChannel);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Numeric participant id; unique per channel for the duration of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u32);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantIdSource {
    /// Taken from the logged-in user's id.
    Identity,
    /// Randomly drawn; may collide with another anonymous participant.
    Random,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantCredential {
    pub session_token: String,
    pub participant_id: ParticipantId,
    pub application_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CredentialRequest<'a> {
    pub channel_name: &'a str,
    pub uid: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialResponse {
    pub token: String,
    #[serde(rename = "appId", default)]
    pub app_id: String,
    #[serde(rename = "channelName", default)]
    pub channel_name: Option<String>,
}

// ==============================================================================
// CALL STATE
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    FetchingCredential,
    Joining,
    Joined,
    Leaving,
    Left,
    Failed(FailureReason),
}

impl CallState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Left | CallState::Failed(_))
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallState::Idle => write!(f, "idle"),
            CallState::FetchingCredential => write!(f, "fetching_credential"),
            CallState::Joining => write!(f, "joining"),
            CallState::Joined => write!(f, "joined"),
            CallState::Leaving => write!(f, "leaving"),
            CallState::Left => write!(f, "left"),
            CallState::Failed(reason) => write!(f, "failed({})", reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    CredentialFetch,
    PermissionDenied,
    Join,
    TrackCreation,
    Publish,
}

impl FailureReason {
    /// Text for the blocking error shown to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureReason::CredentialFetch => {
                "Could not start the call. Please go back and open the appointment again."
            }
            FailureReason::PermissionDenied => {
                "Camera/Microphone access denied. Allow access in your browser or device settings, then rejoin the call."
            }
            FailureReason::Join => "Could not connect to the call. The call link may have expired.",
            FailureReason::TrackCreation => "Camera or microphone is not available on this device.",
            FailureReason::Publish => "Could not share your audio and video with the other participant.",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureReason::CredentialFetch => "credential_fetch",
            FailureReason::PermissionDenied => "permission_denied",
            FailureReason::Join => "join",
            FailureReason::TrackCreation => "track_creation",
            FailureReason::Publish => "publish",
        };
        f.write_str(label)
    }
}

// ==============================================================================
// MEDIA
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Mute/camera-off switches as the user last set them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleState {
    pub microphone_enabled: bool,
    pub camera_enabled: bool,
}

impl Default for ToggleState {
    fn default() -> Self {
        Self {
            microphone_enabled: true,
            camera_enabled: true,
        }
    }
}

impl ToggleState {
    pub fn is_enabled(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Audio => self.microphone_enabled,
            MediaKind::Video => self.camera_enabled,
        }
    }

    pub fn set(&mut self, kind: MediaKind, enabled: bool) {
        match kind {
            MediaKind::Audio => self.microphone_enabled = enabled,
            MediaKind::Video => self.camera_enabled = enabled,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VideoEncoderPreset {
    P480,
    #[default]
    P720,
    P1080,
}

impl VideoEncoderPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoEncoderPreset::P480 => "480p",
            VideoEncoderPreset::P720 => "720p",
            VideoEncoderPreset::P1080 => "1080p",
        }
    }
}

/// Remote participant notifications delivered by the RTC client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtcEvent {
    ParticipantPublished {
        participant: ParticipantId,
        kind: MediaKind,
    },
    ParticipantUnpublished {
        participant: ParticipantId,
    },
}

/// What the controller knows about a remote participant with a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteParticipant {
    pub participant_id: ParticipantId,
    pub has_audio: bool,
    pub has_video: bool,
}

impl RemoteParticipant {
    pub fn new(participant_id: ParticipantId) -> Self {
        Self {
            participant_id,
            has_audio: false,
            has_video: false,
        }
    }

    pub fn mark(&mut self, kind: MediaKind) {
        match kind {
            MediaKind::Audio => self.has_audio = true,
            MediaKind::Video => self.has_video = true,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    #[error("Channel name cannot be empty")]
    InvalidChannel,

    #[error("Failed to fetch call credential: {0}")]
    CredentialFetch(String),

    #[error("Camera/microphone permission denied")]
    PermissionDenied,

    #[error("Failed to join channel: {0}")]
    Join(String),

    #[error("Failed to create local track: {0}")]
    TrackCreation(String),

    #[error("Failed to publish local tracks: {0}")]
    Publish(String),

    #[error("Error while leaving call: {0}")]
    Leave(String),

    #[error("Failed to subscribe to remote track: {0}")]
    Subscribe(String),

    #[error("Call was torn down before setup finished")]
    Cancelled,

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CallError {
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            CallError::CredentialFetch(_) => Some(FailureReason::CredentialFetch),
            CallError::PermissionDenied => Some(FailureReason::PermissionDenied),
            CallError::Join(_) => Some(FailureReason::Join),
            CallError::TrackCreation(_) => Some(FailureReason::TrackCreation),
            CallError::Publish(_) => Some(FailureReason::Publish),
            _ => None,
        }
    }

    /// Attribute an error raised by a setup step to that step. A permission
    /// denial reported by any device call stays a permission denial.
    pub fn at_step(self, step: FailureReason) -> CallError {
        if self == CallError::PermissionDenied || self.failure_reason() == Some(step) {
            return self;
        }
        let detail = self.to_string();
        match step {
            FailureReason::CredentialFetch => CallError::CredentialFetch(detail),
            FailureReason::PermissionDenied => CallError::PermissionDenied,
            FailureReason::Join => CallError::Join(detail),
            FailureReason::TrackCreation => CallError::TrackCreation(detail),
            FailureReason::Publish => CallError::Publish(detail),
        }
    }
}
