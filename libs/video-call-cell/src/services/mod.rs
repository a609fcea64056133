pub mod controller;
pub mod credential;
pub mod participant;
pub mod rtc;

pub use controller::CallSessionController;
pub use credential::{CredentialProvider, HttpCredentialProvider};
pub use participant::{derive_participant_id, RANDOM_ID_FLOOR};
pub use rtc::{CallDeps, CallHost, LocalTrack, MediaDevices, RenderSurfaces, RtcClient};
