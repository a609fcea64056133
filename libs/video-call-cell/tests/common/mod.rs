// Recording fakes for the RTC, device, surface and host boundaries.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use video_call_cell::{
    CallDeps, CallError, CallHost, CallSessionController, ChannelId, CredentialProvider,
    FailureReason, LocalTrack, MediaDevices, MediaKind, ParticipantCredential, ParticipantId,
    RenderSurfaces, RtcClient, VideoEncoderPreset,
};

pub type Log = Arc<Mutex<Vec<String>>>;

fn record(log: &Log, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

/// Holds an async step open until the test releases it.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

impl Gate {
    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

fn gate_of(slot: &Mutex<Option<Arc<Gate>>>) -> Option<Arc<Gate>> {
    slot.lock().unwrap().clone()
}

// ==============================================================================
// LOCAL TRACKS & DEVICES
// ==============================================================================

pub struct FakeTrack {
    pub kind: MediaKind,
    pub enabled: AtomicBool,
    pub set_enabled_calls: AtomicUsize,
    pub stops: AtomicUsize,
    pub closes: AtomicUsize,
    // Parks the first `set_enabled` call only.
    enable_gate: Mutex<Option<Arc<Gate>>>,
    log: Log,
}

impl FakeTrack {
    fn new(kind: MediaKind, enable_gate: Option<Arc<Gate>>, log: Log) -> Self {
        Self {
            kind,
            enabled: AtomicBool::new(true),
            set_enabled_calls: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            enable_gate: Mutex::new(enable_gate),
            log,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn released_once(&self) -> bool {
        self.stops.load(Ordering::SeqCst) == 1 && self.closes.load(Ordering::SeqCst) == 1
    }
}

#[async_trait]
impl LocalTrack for FakeTrack {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    async fn set_enabled(&self, enabled: bool) -> Result<(), CallError> {
        self.set_enabled_calls.fetch_add(1, Ordering::SeqCst);
        self.enabled.store(enabled, Ordering::SeqCst);
        record(&self.log, format!("track:{}:enabled={}", self.kind, enabled));
        let gate = self.enable_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        record(&self.log, format!("track:{}:stop", self.kind));
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        record(&self.log, format!("track:{}:close", self.kind));
    }
}

pub struct FakeDevices {
    pub fail_permission: AtomicBool,
    pub fail_microphone: AtomicBool,
    pub fail_camera: AtomicBool,
    pub created: Mutex<Vec<Arc<FakeTrack>>>,
    pub presets: Mutex<Vec<VideoEncoderPreset>>,
    pub camera_gate: Mutex<Option<Arc<Gate>>>,
    pub enable_gate: Mutex<Option<Arc<Gate>>>,
    log: Log,
}

impl FakeDevices {
    pub fn tracks(&self) -> Vec<Arc<FakeTrack>> {
        self.created.lock().unwrap().clone()
    }

    pub fn track(&self, kind: MediaKind) -> Option<Arc<FakeTrack>> {
        self.tracks().into_iter().find(|t| t.kind == kind)
    }

    fn create(&self, kind: MediaKind) -> Arc<dyn LocalTrack> {
        let gate = self.enable_gate.lock().unwrap().take();
        let track = Arc::new(FakeTrack::new(kind, gate, self.log.clone()));
        self.created.lock().unwrap().push(track.clone());
        record(&self.log, format!("devices:create:{}", kind));
        track
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn request_permission(&self) -> Result<(), CallError> {
        record(&self.log, "devices:permission");
        if self.fail_permission.load(Ordering::SeqCst) {
            return Err(CallError::PermissionDenied);
        }
        Ok(())
    }

    async fn create_microphone_track(&self) -> Result<Arc<dyn LocalTrack>, CallError> {
        if self.fail_microphone.load(Ordering::SeqCst) {
            return Err(CallError::TrackCreation("no microphone".to_string()));
        }
        Ok(self.create(MediaKind::Audio))
    }

    async fn create_camera_track(
        &self,
        preset: VideoEncoderPreset,
    ) -> Result<Arc<dyn LocalTrack>, CallError> {
        self.presets.lock().unwrap().push(preset);
        if let Some(gate) = gate_of(&self.camera_gate) {
            gate.pass().await;
        }
        if self.fail_camera.load(Ordering::SeqCst) {
            return Err(CallError::TrackCreation("camera busy".to_string()));
        }
        Ok(self.create(MediaKind::Video))
    }
}

// ==============================================================================
// RTC CLIENT
// ==============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct JoinCall {
    pub application_id: String,
    pub channel: String,
    pub session_token: String,
    pub participant: ParticipantId,
}

pub struct FakeRtc {
    pub fail_join: AtomicBool,
    pub fail_publish: AtomicBool,
    pub fail_subscribe: Mutex<Vec<ParticipantId>>,
    pub connected: AtomicBool,
    pub joins: Mutex<Vec<JoinCall>>,
    pub publishes: AtomicUsize,
    pub published_kinds: Mutex<Vec<MediaKind>>,
    pub subscribes: Mutex<Vec<(ParticipantId, MediaKind)>>,
    pub leaves: AtomicUsize,
    pub join_gate: Mutex<Option<Arc<Gate>>>,
    pub publish_gate: Mutex<Option<Arc<Gate>>>,
    log: Log,
}

impl FakeRtc {
    pub fn leave_count(&self) -> usize {
        self.leaves.load(Ordering::SeqCst)
    }

    pub fn publish_count(&self) -> usize {
        self.publishes.load(Ordering::SeqCst)
    }

    pub fn is_connected_now(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RtcClient for FakeRtc {
    async fn join(
        &self,
        application_id: &str,
        channel: &ChannelId,
        session_token: &str,
        participant: ParticipantId,
    ) -> Result<(), CallError> {
        record(&self.log, "rtc:join");
        self.joins.lock().unwrap().push(JoinCall {
            application_id: application_id.to_string(),
            channel: channel.as_str().to_string(),
            session_token: session_token.to_string(),
            participant,
        });
        if let Some(gate) = gate_of(&self.join_gate) {
            gate.pass().await;
        }
        if self.fail_join.load(Ordering::SeqCst) {
            return Err(CallError::Join("invalid token".to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn publish(&self, tracks: &[Arc<dyn LocalTrack>]) -> Result<(), CallError> {
        record(&self.log, "rtc:publish");
        if let Some(gate) = gate_of(&self.publish_gate) {
            gate.pass().await;
        }
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(CallError::Publish("publish rejected".to_string()));
        }
        self.publishes.fetch_add(1, Ordering::SeqCst);
        self.published_kinds
            .lock()
            .unwrap()
            .extend(tracks.iter().map(|t| t.kind()));
        Ok(())
    }

    async fn subscribe(&self, participant: ParticipantId, kind: MediaKind) -> Result<(), CallError> {
        if self.fail_subscribe.lock().unwrap().contains(&participant) {
            return Err(CallError::Subscribe(format!("{} went away", participant)));
        }
        self.subscribes.lock().unwrap().push((participant, kind));
        Ok(())
    }

    async fn leave(&self) -> Result<(), CallError> {
        record(&self.log, "rtc:leave");
        self.leaves.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

// ==============================================================================
// SURFACES & HOST
// ==============================================================================

pub struct FakeSurfaces {
    pub local_previews: AtomicUsize,
    pub remote: Mutex<BTreeMap<ParticipantId, Vec<MediaKind>>>,
    pub creates: AtomicUsize,
    pub duplicate_creates: AtomicUsize,
    pub clears: AtomicUsize,
    log: Log,
}

impl FakeSurfaces {
    pub fn participants(&self) -> Vec<ParticipantId> {
        self.remote.lock().unwrap().keys().copied().collect()
    }
}

impl RenderSurfaces for FakeSurfaces {
    fn render_local_preview(&self, track: &dyn LocalTrack) {
        self.local_previews.fetch_add(1, Ordering::SeqCst);
        record(&self.log, format!("surfaces:preview:{}", track.kind()));
    }

    fn create_remote(&self, participant: ParticipantId) {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let mut remote = self.remote.lock().unwrap();
        if remote.insert(participant, Vec::new()).is_some() {
            self.duplicate_creates.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn attach_remote(&self, participant: ParticipantId, kind: MediaKind) {
        if let Some(kinds) = self.remote.lock().unwrap().get_mut(&participant) {
            kinds.push(kind);
        }
    }

    fn remove_remote(&self, participant: ParticipantId) {
        self.remote.lock().unwrap().remove(&participant);
    }

    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.remote.lock().unwrap().clear();
        record(&self.log, "surfaces:clear");
    }
}

pub struct FakeHost {
    pub errors: Mutex<Vec<(FailureReason, String)>>,
    pub navigations: AtomicUsize,
    log: Log,
}

impl FakeHost {
    pub fn navigation_count(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }

    pub fn error_reasons(&self) -> Vec<FailureReason> {
        self.errors.lock().unwrap().iter().map(|(r, _)| *r).collect()
    }
}

impl CallHost for FakeHost {
    fn show_blocking_error(&self, reason: FailureReason, message: &str) {
        self.errors.lock().unwrap().push((reason, message.to_string()));
        record(&self.log, format!("host:error:{}", reason));
    }

    fn navigate_to_post_call(&self) {
        self.navigations.fetch_add(1, Ordering::SeqCst);
        record(&self.log, "host:navigate");
    }
}

// ==============================================================================
// CREDENTIALS
// ==============================================================================

pub struct FakeCredentials {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
    pub gate: Mutex<Option<Arc<Gate>>>,
}

#[async_trait]
impl CredentialProvider for FakeCredentials {
    async fn fetch(
        &self,
        _channel: &ChannelId,
        participant: ParticipantId,
    ) -> Result<ParticipantCredential, CallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = gate_of(&self.gate) {
            gate.pass().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(CallError::CredentialFetch("HTTP 500".to_string()));
        }
        Ok(ParticipantCredential {
            session_token: "tok1".to_string(),
            participant_id: participant,
            application_id: "app1".to_string(),
        })
    }
}

// ==============================================================================
// HARNESS
// ==============================================================================

pub struct Harness {
    pub log: Log,
    pub credentials: Arc<FakeCredentials>,
    pub rtc: Arc<FakeRtc>,
    pub devices: Arc<FakeDevices>,
    pub surfaces: Arc<FakeSurfaces>,
    pub host: Arc<FakeHost>,
}

impl Harness {
    pub fn new() -> Self {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        Self {
            credentials: Arc::new(FakeCredentials {
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
                gate: Mutex::new(None),
            }),
            rtc: Arc::new(FakeRtc {
                fail_join: AtomicBool::new(false),
                fail_publish: AtomicBool::new(false),
                fail_subscribe: Mutex::new(Vec::new()),
                connected: AtomicBool::new(false),
                joins: Mutex::new(Vec::new()),
                publishes: AtomicUsize::new(0),
                published_kinds: Mutex::new(Vec::new()),
                subscribes: Mutex::new(Vec::new()),
                leaves: AtomicUsize::new(0),
                join_gate: Mutex::new(None),
                publish_gate: Mutex::new(None),
                log: log.clone(),
            }),
            devices: Arc::new(FakeDevices {
                fail_permission: AtomicBool::new(false),
                fail_microphone: AtomicBool::new(false),
                fail_camera: AtomicBool::new(false),
                created: Mutex::new(Vec::new()),
                presets: Mutex::new(Vec::new()),
                camera_gate: Mutex::new(None),
                enable_gate: Mutex::new(None),
                log: log.clone(),
            }),
            surfaces: Arc::new(FakeSurfaces {
                local_previews: AtomicUsize::new(0),
                remote: Mutex::new(BTreeMap::new()),
                creates: AtomicUsize::new(0),
                duplicate_creates: AtomicUsize::new(0),
                clears: AtomicUsize::new(0),
                log: log.clone(),
            }),
            host: Arc::new(FakeHost {
                errors: Mutex::new(Vec::new()),
                navigations: AtomicUsize::new(0),
                log: log.clone(),
            }),
            log,
        }
    }

    pub fn deps(&self) -> CallDeps {
        self.deps_with(self.credentials.clone())
    }

    pub fn deps_with(&self, credentials: Arc<dyn CredentialProvider>) -> CallDeps {
        CallDeps {
            credentials,
            rtc: self.rtc.clone(),
            devices: self.devices.clone(),
            surfaces: self.surfaces.clone(),
            host: self.host.clone(),
        }
    }

    pub fn controller(&self, channel: &str) -> Arc<CallSessionController> {
        let channel = ChannelId::new(channel).unwrap();
        Arc::new(CallSessionController::new(channel, ParticipantId(42), self.deps()))
    }

    pub fn entries(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Position of the first log entry equal to `entry`.
    pub fn position(&self, entry: &str) -> usize {
        self.entries()
            .iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("{} never happened: {:?}", entry, self.entries()))
    }

    pub fn all_tracks_released_once(&self) -> bool {
        self.devices.tracks().iter().all(|t| t.released_once())
    }
}
