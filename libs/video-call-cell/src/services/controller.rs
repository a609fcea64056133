// libs/video-call-cell/src/services/controller.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{
    CallError, CallState, ChannelId, FailureReason, MediaKind, ParticipantCredential,
    ParticipantId, RemoteParticipant, RtcEvent, ToggleState, VideoEncoderPreset,
};
use crate::services::rtc::{CallDeps, LocalTrack};

struct CallInner {
    state: CallState,
    // Cleared by teardown and by a failed setup; the join sequence checks it
    // after every await and backs out when it is gone.
    wanted: bool,
    toggles: ToggleState,
    credential: Option<ParticipantCredential>,
    microphone: Option<Arc<dyn LocalTrack>>,
    camera: Option<Arc<dyn LocalTrack>>,
    remote: BTreeMap<ParticipantId, RemoteParticipant>,
}

impl CallInner {
    fn take_tracks(&mut self) -> Vec<Arc<dyn LocalTrack>> {
        [self.microphone.take(), self.camera.take()]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Owns one video call from mount to teardown.
///
/// Share it behind an `Arc`: `start` runs the join sequence while `leave`,
/// `unmount`, toggles and remote events may arrive from other tasks. The
/// state lock is never held across a call into the RTC client or devices.
pub struct CallSessionController {
    call_id: Uuid,
    channel: ChannelId,
    participant_id: ParticipantId,
    preset: VideoEncoderPreset,
    deps: CallDeps,
    inner: Mutex<CallInner>,
    finished: watch::Sender<bool>,
}

impl CallSessionController {
    pub fn new(channel: ChannelId, participant_id: ParticipantId, deps: CallDeps) -> Self {
        let (finished, _) = watch::channel(false);
        Self {
            call_id: Uuid::new_v4(),
            channel,
            participant_id,
            preset: VideoEncoderPreset::default(),
            deps,
            inner: Mutex::new(CallInner {
                state: CallState::Idle,
                wanted: true,
                toggles: ToggleState::default(),
                credential: None,
                microphone: None,
                camera: None,
                remote: BTreeMap::new(),
            }),
            finished,
        }
    }

    pub fn with_encoder_preset(mut self, preset: VideoEncoderPreset) -> Self {
        self.preset = preset;
        self
    }

    // ==========================================================================
    // SETUP
    // ==========================================================================

    /// Fetch a credential, join the channel and publish local media.
    ///
    /// Only the first call from `Idle` does anything; later calls return the
    /// current state. On failure every acquired resource is released, the
    /// host shows a blocking error and the call ends in `Failed`.
    pub async fn start(&self) -> Result<CallState, CallError> {
        {
            let mut inner = self.inner.lock().await;
            if inner.state != CallState::Idle {
                debug!("[call {}] start ignored in state {}", self.call_id, inner.state);
                return Ok(inner.state);
            }
            inner.state = CallState::FetchingCredential;
        }

        info!(
            "[call {}] Starting call on channel {} as {}",
            self.call_id, self.channel, self.participant_id
        );

        match self.join_sequence().await {
            Ok(()) => Ok(CallState::Joined),
            Err(CallError::Cancelled) => {
                info!("[call {}] Setup abandoned after teardown", self.call_id);
                Err(CallError::Cancelled)
            }
            Err(err) => Err(self.abort(err).await),
        }
    }

    async fn join_sequence(&self) -> Result<(), CallError> {
        let credential = self
            .deps
            .credentials
            .fetch(&self.channel, self.participant_id)
            .await
            .map_err(|e| e.at_step(FailureReason::CredentialFetch))?;
        {
            let mut inner = self.inner.lock().await;
            if !inner.wanted {
                return Err(CallError::Cancelled);
            }
            inner.credential = Some(credential.clone());
            inner.state = CallState::Joining;
        }
        debug!("[call {}] Credential received", self.call_id);

        self.deps
            .devices
            .request_permission()
            .await
            .map_err(|e| e.at_step(FailureReason::PermissionDenied))?;
        self.ensure_wanted().await?;

        self.deps
            .rtc
            .join(
                &credential.application_id,
                &self.channel,
                &credential.session_token,
                credential.participant_id,
            )
            .await
            .map_err(|e| e.at_step(FailureReason::Join))?;
        if !self.is_wanted().await {
            // Teardown may have checked the connection before the join landed.
            self.leave_network().await;
            return Err(CallError::Cancelled);
        }
        debug!("[call {}] Joined channel {}", self.call_id, self.channel);

        let microphone = self
            .deps
            .devices
            .create_microphone_track()
            .await
            .map_err(|e| e.at_step(FailureReason::TrackCreation))?;
        self.keep_track(microphone.clone()).await?;

        let camera = self
            .deps
            .devices
            .create_camera_track(self.preset)
            .await
            .map_err(|e| e.at_step(FailureReason::TrackCreation))?;
        self.keep_track(camera.clone()).await?;

        let tracks = [&microphone, &camera];
        let mut applied = ToggleState::default();
        self.sync_toggles(tracks, &mut applied).await?;

        self.deps.surfaces.render_local_preview(&*camera);

        self.deps
            .rtc
            .publish(&[microphone.clone(), camera.clone()])
            .await
            .map_err(|e| e.at_step(FailureReason::Publish))?;

        // Toggles may move while publish is in flight; only enter `Joined`
        // once the tracks match them, so later toggles flip the tracks directly.
        loop {
            {
                let mut inner = self.inner.lock().await;
                if !inner.wanted {
                    return Err(CallError::Cancelled);
                }
                if inner.toggles == applied {
                    inner.state = CallState::Joined;
                    break;
                }
            }
            self.sync_toggles(tracks, &mut applied).await?;
        }

        info!(
            "[call {}] Joined {} and published local audio/video",
            self.call_id, self.channel
        );
        Ok(())
    }

    /// Bring the local tracks in line with the recorded toggles. `applied`
    /// holds what the tracks currently carry; new tracks start enabled.
    async fn sync_toggles(
        &self,
        tracks: [&Arc<dyn LocalTrack>; 2],
        applied: &mut ToggleState,
    ) -> Result<(), CallError> {
        loop {
            let target = {
                let inner = self.inner.lock().await;
                if !inner.wanted {
                    return Err(CallError::Cancelled);
                }
                inner.toggles
            };
            if target == *applied {
                return Ok(());
            }

            for track in tracks {
                let kind = track.kind();
                let enabled = target.is_enabled(kind);
                if applied.is_enabled(kind) == enabled {
                    continue;
                }
                if let Err(e) = track.set_enabled(enabled).await {
                    warn!("[call {}] Could not apply {} toggle: {}", self.call_id, kind, e);
                }
                applied.set(kind, enabled);
            }
        }
    }

    async fn is_wanted(&self) -> bool {
        self.inner.lock().await.wanted
    }

    async fn ensure_wanted(&self) -> Result<(), CallError> {
        if self.is_wanted().await {
            Ok(())
        } else {
            Err(CallError::Cancelled)
        }
    }

    /// Hand a freshly created track to the controller, or release it on the
    /// spot when the call was torn down while it was being created.
    async fn keep_track(&self, track: Arc<dyn LocalTrack>) -> Result<(), CallError> {
        let mut inner = self.inner.lock().await;
        if !inner.wanted {
            drop(inner);
            release_track(&*track);
            return Err(CallError::Cancelled);
        }
        match track.kind() {
            MediaKind::Audio => inner.microphone = Some(track),
            MediaKind::Video => inner.camera = Some(track),
        }
        Ok(())
    }

    async fn abort(&self, err: CallError) -> CallError {
        let reason = err.failure_reason().unwrap_or(FailureReason::Join);

        let (tracks, owned) = {
            let mut inner = self.inner.lock().await;
            let owned = inner.wanted;
            if owned {
                inner.wanted = false;
                inner.state = CallState::Failed(reason);
                inner.credential = None;
            }
            (inner.take_tracks(), owned)
        };

        for track in &tracks {
            release_track(&**track);
        }
        self.leave_network().await;

        if !owned {
            // Teardown won the race; it owns the exit path.
            return CallError::Cancelled;
        }

        error!(
            "[call {}] Call setup failed ({}), released {} track(s): {}",
            self.call_id,
            reason,
            tracks.len(),
            err
        );
        self.finished.send_replace(true);
        self.deps.host.show_blocking_error(reason, reason.user_message());
        err
    }

    // ==========================================================================
    // REMOTE PARTICIPANTS
    // ==========================================================================

    /// Apply one remote notification. Ignored unless the call is `Joined`.
    pub async fn handle_event(&self, event: RtcEvent) {
        if self.state().await != CallState::Joined {
            debug!("[call {}] Ignoring {:?} outside a joined call", self.call_id, event);
            return;
        }

        match event {
            RtcEvent::ParticipantPublished { participant, kind } => {
                if let Err(e) = self.deps.rtc.subscribe(participant, kind).await {
                    warn!(
                        "[call {}] Could not subscribe to {} from {}: {}",
                        self.call_id, kind, participant, e
                    );
                    return;
                }

                let mut inner = self.inner.lock().await;
                if inner.state != CallState::Joined {
                    return;
                }
                let surfaces = &self.deps.surfaces;
                let remote = inner.remote.entry(participant).or_insert_with(|| {
                    surfaces.create_remote(participant);
                    RemoteParticipant::new(participant)
                });
                remote.mark(kind);
                surfaces.attach_remote(participant, kind);
                debug!("[call {}] Attached {} from {}", self.call_id, kind, participant);
            }
            RtcEvent::ParticipantUnpublished { participant } => {
                let mut inner = self.inner.lock().await;
                if inner.remote.remove(&participant).is_some() {
                    self.deps.surfaces.remove_remote(participant);
                    debug!("[call {}] Removed surface for {}", self.call_id, participant);
                }
            }
        }
    }

    /// Feed remote notifications into the controller until the sender goes
    /// away or the call is over.
    pub async fn run_events(&self, mut events: mpsc::Receiver<RtcEvent>) {
        let mut finished = self.finished.subscribe();
        if *finished.borrow() {
            return;
        }

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                changed = finished.changed() => {
                    if changed.is_err() || *finished.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("[call {}] Event loop finished", self.call_id);
    }

    // ==========================================================================
    // LOCAL CONTROLS
    // ==========================================================================

    pub async fn set_microphone_enabled(&self, enabled: bool) -> ToggleState {
        self.set_enabled(MediaKind::Audio, enabled).await
    }

    pub async fn set_camera_enabled(&self, enabled: bool) -> ToggleState {
        self.set_enabled(MediaKind::Video, enabled).await
    }

    // The switch always moves; the track only follows while joined.
    async fn set_enabled(&self, kind: MediaKind, enabled: bool) -> ToggleState {
        let (toggles, track) = {
            let mut inner = self.inner.lock().await;
            inner.toggles.set(kind, enabled);
            let track = match (inner.state, kind) {
                (CallState::Joined, MediaKind::Audio) => inner.microphone.clone(),
                (CallState::Joined, MediaKind::Video) => inner.camera.clone(),
                _ => None,
            };
            (inner.toggles, track)
        };

        if let Some(track) = track {
            if let Err(e) = track.set_enabled(enabled).await {
                warn!("[call {}] Could not set {} enabled={}: {}", self.call_id, kind, enabled, e);
            }
        }
        toggles
    }

    // ==========================================================================
    // TEARDOWN
    // ==========================================================================

    /// User pressed "end call".
    pub async fn leave(&self) {
        self.teardown("leave").await;
    }

    /// The hosting view is going away.
    pub async fn unmount(&self) {
        self.teardown("unmount").await;
    }

    async fn teardown(&self, trigger: &str) {
        let tracks = {
            let mut inner = self.inner.lock().await;
            if inner.state == CallState::Leaving || inner.state.is_terminal() {
                debug!("[call {}] {} ignored in state {}", self.call_id, trigger, inner.state);
                return;
            }
            inner.wanted = false;
            inner.state = CallState::Leaving;
            inner.take_tracks()
        };
        info!("[call {}] Leaving call ({})", self.call_id, trigger);

        for track in &tracks {
            if let Err(e) = track.set_enabled(false).await {
                warn!("[call {}] {}", self.call_id, CallError::Leave(e.to_string()));
            }
            release_track(&**track);
        }

        self.leave_network().await;
        self.deps.surfaces.clear();

        {
            let mut inner = self.inner.lock().await;
            inner.remote.clear();
            inner.credential = None;
            inner.state = CallState::Left;
        }
        self.finished.send_replace(true);

        info!("[call {}] Call ended", self.call_id);
        self.deps.host.navigate_to_post_call();
    }

    async fn leave_network(&self) {
        if !self.deps.rtc.is_connected() {
            return;
        }
        if let Err(e) = self.deps.rtc.leave().await {
            let err = match e {
                CallError::Leave(_) => e,
                other => CallError::Leave(other.to_string()),
            };
            warn!("[call {}] {}", self.call_id, err);
        }
    }

    // ==========================================================================
    // ACCESSORS
    // ==========================================================================

    pub fn call_id(&self) -> Uuid {
        self.call_id
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn participant_id(&self) -> ParticipantId {
        self.participant_id
    }

    pub async fn state(&self) -> CallState {
        self.inner.lock().await.state
    }

    pub async fn toggles(&self) -> ToggleState {
        self.inner.lock().await.toggles
    }

    /// Participants that currently have a rendering surface, in id order.
    pub async fn remote_participants(&self) -> Vec<ParticipantId> {
        self.inner.lock().await.remote.keys().copied().collect()
    }

    pub async fn credential(&self) -> Option<ParticipantCredential> {
        self.inner.lock().await.credential.clone()
    }
}

fn release_track(track: &dyn LocalTrack) {
    track.stop();
    track.close();
}
