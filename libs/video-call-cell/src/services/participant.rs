use rand::Rng;
use tracing::warn;

use shared_models::SessionContext;

use crate::models::{ParticipantId, ParticipantIdSource};

/// Random ids are drawn above this floor so they never shadow a real user id
/// below it.
pub const RANDOM_ID_FLOOR: u32 = 1_000_000;

/// Pick the participant id for a call.
///
/// The logged-in user's id is used when it fits the RTC id space. Otherwise
/// a random id is drawn; two anonymous participants on one channel can then
/// collide, and nothing here detects that.
pub fn derive_participant_id(ctx: Option<&SessionContext>) -> (ParticipantId, ParticipantIdSource) {
    if let Some(id) = ctx.and_then(SessionContext::participant_identity) {
        return (ParticipantId(id), ParticipantIdSource::Identity);
    }

    let id = random_participant_id(&mut rand::thread_rng());
    warn!(
        "No usable identity for call, using random participant id {} (may collide)",
        id
    );
    (id, ParticipantIdSource::Random)
}

pub fn random_participant_id<R: Rng + ?Sized>(rng: &mut R) -> ParticipantId {
    ParticipantId(rng.gen_range(RANDOM_ID_FLOOR..u32::MAX))
}
