mod common;

use assert_matches::assert_matches;
use async_trait::async_trait;
use mockall::mock;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;

use common::{Gate, Harness};
use video_call_cell::{
    CallError, CallSessionController, CallState, ChannelId, CredentialProvider, FailureReason,
    MediaKind, ParticipantCredential, ParticipantId, RtcEvent, VideoEncoderPreset,
};

mock! {
    pub Credentials {}

    #[async_trait]
    impl CredentialProvider for Credentials {
        async fn fetch(
            &self,
            channel: &ChannelId,
            participant: ParticipantId,
        ) -> Result<ParticipantCredential, CallError>;
    }
}

fn published(id: u32, kind: MediaKind) -> RtcEvent {
    RtcEvent::ParticipantPublished {
        participant: ParticipantId(id),
        kind,
    }
}

fn unpublished(id: u32) -> RtcEvent {
    RtcEvent::ParticipantUnpublished {
        participant: ParticipantId(id),
    }
}

#[tokio::test]
async fn test_doctor_patient_call_scenario() {
    let harness = Harness::new();

    let mut credentials = MockCredentials::new();
    credentials
        .expect_fetch()
        .withf(|channel, participant| channel.as_str() == "doctor_patient_42" && participant.0 == 42)
        .times(1)
        .returning(|_, participant| {
            Ok(ParticipantCredential {
                session_token: "tok1".to_string(),
                participant_id: participant,
                application_id: "app1".to_string(),
            })
        });

    let controller = CallSessionController::new(
        ChannelId::new("doctor_patient_42").unwrap(),
        ParticipantId(42),
        harness.deps_with(Arc::new(credentials)),
    );

    assert_eq!(controller.start().await, Ok(CallState::Joined));

    let joins = harness.rtc.joins.lock().unwrap().clone();
    assert_eq!(joins.len(), 1);
    assert_eq!(joins[0].session_token, "tok1");
    assert_eq!(joins[0].application_id, "app1");
    assert_eq!(joins[0].channel, "doctor_patient_42");
    assert_eq!(joins[0].participant, ParticipantId(42));
    assert_eq!(
        *harness.devices.presets.lock().unwrap(),
        vec![VideoEncoderPreset::P720]
    );

    controller.handle_event(published(7, MediaKind::Video)).await;
    controller.handle_event(published(9, MediaKind::Video)).await;
    assert_eq!(
        controller.remote_participants().await,
        vec![ParticipantId(7), ParticipantId(9)]
    );
    assert_eq!(harness.surfaces.participants(), vec![ParticipantId(7), ParticipantId(9)]);

    controller.handle_event(unpublished(7)).await;
    assert_eq!(controller.remote_participants().await, vec![ParticipantId(9)]);
    assert_eq!(harness.surfaces.participants(), vec![ParticipantId(9)]);

    controller.leave().await;

    assert_eq!(controller.state().await, CallState::Left);
    let tracks = harness.devices.tracks();
    assert_eq!(tracks.len(), 2);
    assert!(tracks.iter().all(|t| t.released_once()));
    assert_eq!(harness.rtc.leave_count(), 1);
    assert_eq!(harness.host.navigation_count(), 1);
    assert!(harness.surfaces.participants().is_empty());
    assert!(controller.credential().await.is_none());
}

#[tokio::test]
async fn test_join_sequence_order() {
    let harness = Harness::new();
    let controller = harness.controller("doctor_patient_42");

    controller.start().await.unwrap();

    assert!(harness.position("devices:permission") < harness.position("rtc:join"));
    assert!(harness.position("rtc:join") < harness.position("devices:create:audio"));
    assert!(harness.position("devices:create:audio") < harness.position("devices:create:video"));
    assert!(harness.position("devices:create:video") < harness.position("surfaces:preview:video"));
    assert!(harness.position("surfaces:preview:video") < harness.position("rtc:publish"));
    assert_eq!(
        *harness.rtc.published_kinds.lock().unwrap(),
        vec![MediaKind::Audio, MediaKind::Video]
    );
    assert_eq!(
        controller.credential().await.map(|c| c.session_token),
        Some("tok1".to_string())
    );
}

#[tokio::test]
async fn test_second_start_does_not_publish_again() {
    let harness = Harness::new();
    let controller = harness.controller("doctor_patient_42");

    assert_eq!(controller.start().await, Ok(CallState::Joined));
    assert_eq!(controller.start().await, Ok(CallState::Joined));

    assert_eq!(harness.credentials.calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.rtc.joins.lock().unwrap().len(), 1);
    assert_eq!(harness.rtc.publish_count(), 1);
    assert_eq!(harness.devices.tracks().len(), 2);
}

#[tokio::test]
async fn test_concurrent_starts_join_once() {
    let harness = Harness::new();
    let controller = harness.controller("doctor_patient_42");

    let (first, second) = tokio::join!(controller.start(), controller.start());
    assert!(first.is_ok() && second.is_ok());

    assert_eq!(controller.state().await, CallState::Joined);
    assert_eq!(harness.rtc.publish_count(), 1);
    assert_eq!(harness.devices.tracks().len(), 2);
}

#[tokio::test]
async fn test_failure_at_every_setup_step_releases_everything() {
    let steps = [
        FailureReason::CredentialFetch,
        FailureReason::PermissionDenied,
        FailureReason::Join,
        FailureReason::TrackCreation,
        FailureReason::Publish,
    ];

    for step in steps {
        let harness = Harness::new();
        match step {
            FailureReason::CredentialFetch => harness.credentials.fail.store(true, Ordering::SeqCst),
            FailureReason::PermissionDenied => {
                harness.devices.fail_permission.store(true, Ordering::SeqCst)
            }
            FailureReason::Join => harness.rtc.fail_join.store(true, Ordering::SeqCst),
            // The microphone is already open when the camera fails.
            FailureReason::TrackCreation => harness.devices.fail_camera.store(true, Ordering::SeqCst),
            FailureReason::Publish => harness.rtc.fail_publish.store(true, Ordering::SeqCst),
        }

        let controller = harness.controller("doctor_patient_42");
        let err = controller.start().await.unwrap_err();

        assert_eq!(err.failure_reason(), Some(step), "step {}", step);
        assert_eq!(controller.state().await, CallState::Failed(step));
        assert!(harness.all_tracks_released_once(), "step {}: tracks leaked", step);
        assert_eq!(harness.host.error_reasons(), vec![step]);
        assert_eq!(harness.host.navigation_count(), 0);
        assert_eq!(harness.rtc.publish_count(), 0);
        assert!(!harness.rtc.is_connected_now());

        let expected_tracks = match step {
            FailureReason::TrackCreation => 1,
            FailureReason::Publish => 2,
            _ => 0,
        };
        assert_eq!(harness.devices.tracks().len(), expected_tracks, "step {}", step);

        let expected_leaves = match step {
            FailureReason::TrackCreation | FailureReason::Publish => 1,
            _ => 0,
        };
        assert_eq!(harness.rtc.leave_count(), expected_leaves, "step {}", step);

        // Terminal for this mount.
        assert_eq!(controller.start().await, Ok(CallState::Failed(step)));
        controller.leave().await;
        assert_eq!(harness.host.navigation_count(), 0);
        assert_eq!(controller.state().await, CallState::Failed(step));
    }
}

#[tokio::test]
async fn test_permission_denied_message() {
    let harness = Harness::new();
    harness.devices.fail_permission.store(true, Ordering::SeqCst);
    let controller = harness.controller("doctor_patient_42");

    assert_matches!(controller.start().await, Err(CallError::PermissionDenied));
    let errors = harness.host.errors.lock().unwrap().clone();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].1.contains("Camera/Microphone access denied"));
}

#[tokio::test]
async fn test_leave_runs_once() {
    let harness = Harness::new();
    let controller = harness.controller("doctor_patient_42");
    controller.start().await.unwrap();

    controller.leave().await;
    controller.leave().await;
    controller.unmount().await;

    assert_eq!(harness.rtc.leave_count(), 1);
    assert_eq!(harness.host.navigation_count(), 1);
    assert_eq!(harness.surfaces.clears.load(Ordering::SeqCst), 1);
    assert!(harness.all_tracks_released_once());
}

#[tokio::test]
async fn test_leave_racing_unmount_runs_once() {
    let harness = Harness::new();
    let controller = harness.controller("doctor_patient_42");
    controller.start().await.unwrap();

    let leaving = controller.clone();
    let unmounting = controller.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { leaving.leave().await }),
        tokio::spawn(async move { unmounting.unmount().await }),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(controller.state().await, CallState::Left);
    assert_eq!(harness.rtc.leave_count(), 1);
    assert_eq!(harness.host.navigation_count(), 1);
    assert!(harness.all_tracks_released_once());
}

#[tokio::test]
async fn test_leave_order() {
    let harness = Harness::new();
    let controller = harness.controller("doctor_patient_42");
    controller.start().await.unwrap();
    controller.handle_event(published(7, MediaKind::Audio)).await;

    controller.leave().await;

    let disabled = harness.position("track:audio:enabled=false");
    let stopped = harness.position("track:audio:stop");
    let closed = harness.position("track:audio:close");
    let camera_closed = harness.position("track:video:close");
    let left = harness.position("rtc:leave");
    let cleared = harness.position("surfaces:clear");
    let navigated = harness.position("host:navigate");

    assert!(disabled < stopped && stopped < closed);
    assert!(closed < left && camera_closed < left);
    assert!(left < cleared);
    assert!(cleared < navigated);
}

#[tokio::test]
async fn test_publish_unpublish_tracks_latest_notification() {
    let harness = Harness::new();
    let controller = harness.controller("doctor_patient_42");
    controller.start().await.unwrap();

    for round in 0..5 {
        controller.handle_event(published(7, MediaKind::Video)).await;
        controller.handle_event(published(7, MediaKind::Audio)).await;
        assert_eq!(controller.remote_participants().await, vec![ParticipantId(7)], "round {}", round);
        assert_eq!(harness.surfaces.participants(), vec![ParticipantId(7)]);

        controller.handle_event(unpublished(7)).await;
        assert!(controller.remote_participants().await.is_empty());
        assert!(harness.surfaces.participants().is_empty());
    }

    // Unpublish without a surface is harmless.
    controller.handle_event(unpublished(7)).await;

    assert_eq!(harness.surfaces.creates.load(Ordering::SeqCst), 5);
    assert_eq!(harness.surfaces.duplicate_creates.load(Ordering::SeqCst), 0);
    assert_eq!(harness.rtc.subscribes.lock().unwrap().len(), 10);
}

#[tokio::test]
async fn test_audio_and_video_share_one_surface() {
    let harness = Harness::new();
    let controller = harness.controller("doctor_patient_42");
    controller.start().await.unwrap();

    controller.handle_event(published(9, MediaKind::Audio)).await;
    controller.handle_event(published(9, MediaKind::Video)).await;

    assert_eq!(harness.surfaces.creates.load(Ordering::SeqCst), 1);
    assert_eq!(
        harness.surfaces.remote.lock().unwrap().get(&ParticipantId(9)).cloned(),
        Some(vec![MediaKind::Audio, MediaKind::Video])
    );
}

#[tokio::test]
async fn test_subscribe_failure_leaves_no_surface() {
    let harness = Harness::new();
    harness.rtc.fail_subscribe.lock().unwrap().push(ParticipantId(5));
    let controller = harness.controller("doctor_patient_42");
    controller.start().await.unwrap();

    controller.handle_event(published(5, MediaKind::Video)).await;
    controller.handle_event(published(6, MediaKind::Video)).await;

    assert_eq!(controller.remote_participants().await, vec![ParticipantId(6)]);
    assert_eq!(controller.state().await, CallState::Joined);
}

#[tokio::test]
async fn test_events_ignored_outside_joined() {
    let harness = Harness::new();
    let controller = harness.controller("doctor_patient_42");

    controller.handle_event(published(7, MediaKind::Video)).await;
    assert!(controller.remote_participants().await.is_empty());

    controller.start().await.unwrap();
    controller.leave().await;
    controller.handle_event(published(7, MediaKind::Video)).await;

    assert!(controller.remote_participants().await.is_empty());
    assert!(harness.rtc.subscribes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_toggles_only_flip_tracks_while_joined() {
    let harness = Harness::new();
    let controller = harness.controller("doctor_patient_42");

    // Before the call: remembered, nothing to flip.
    let toggles = controller.set_microphone_enabled(false).await;
    assert!(!toggles.microphone_enabled);
    assert_eq!(controller.state().await, CallState::Idle);
    assert!(harness.devices.tracks().is_empty());

    controller.start().await.unwrap();
    let microphone = harness.devices.track(MediaKind::Audio).unwrap();
    let camera = harness.devices.track(MediaKind::Video).unwrap();
    assert!(!microphone.is_enabled());
    assert!(camera.is_enabled());
    assert_eq!(camera.set_enabled_calls.load(Ordering::SeqCst), 0);

    controller.set_camera_enabled(false).await;
    assert!(!camera.is_enabled());
    controller.set_microphone_enabled(true).await;
    assert!(microphone.is_enabled());

    assert_eq!(controller.state().await, CallState::Joined);
    assert_eq!(harness.devices.tracks().len(), 2);
    assert_eq!(harness.rtc.publish_count(), 1);
    assert_eq!(microphone.stops.load(Ordering::SeqCst), 0);

    controller.leave().await;
    let calls_after_leave = camera.set_enabled_calls.load(Ordering::SeqCst);
    let toggles = controller.set_camera_enabled(true).await;
    assert!(toggles.camera_enabled);
    assert_eq!(camera.set_enabled_calls.load(Ordering::SeqCst), calls_after_leave);
    assert_eq!(controller.state().await, CallState::Left);
}

#[tokio::test]
async fn test_mute_during_publish_reaches_the_track() {
    let harness = Harness::new();
    let gate = Arc::new(Gate::default());
    *harness.rtc.publish_gate.lock().unwrap() = Some(gate.clone());
    let controller = harness.controller("doctor_patient_42");

    let starting = controller.clone();
    let start = tokio::spawn(async move { starting.start().await });

    gate.entered.notified().await;
    assert_eq!(controller.state().await, CallState::Joining);
    let toggles = controller.set_microphone_enabled(false).await;
    assert!(!toggles.microphone_enabled);

    gate.release.notify_one();
    assert_eq!(start.await.unwrap(), Ok(CallState::Joined));

    let microphone = harness.devices.track(MediaKind::Audio).unwrap();
    let camera = harness.devices.track(MediaKind::Video).unwrap();
    let toggles = controller.toggles().await;
    assert_eq!(microphone.is_enabled(), toggles.microphone_enabled);
    assert!(!microphone.is_enabled());
    assert!(camera.is_enabled());
    assert_eq!(camera.set_enabled_calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.rtc.publish_count(), 1);
}

#[tokio::test]
async fn test_unmount_during_credential_fetch() {
    let harness = Harness::new();
    let gate = Arc::new(Gate::default());
    *harness.credentials.gate.lock().unwrap() = Some(gate.clone());
    let controller = harness.controller("doctor_patient_42");

    let starting = controller.clone();
    let start = tokio::spawn(async move { starting.start().await });

    gate.entered.notified().await;
    assert_eq!(controller.state().await, CallState::FetchingCredential);
    controller.unmount().await;
    assert_eq!(controller.state().await, CallState::Left);
    assert_eq!(harness.host.navigation_count(), 1);

    gate.release.notify_one();
    assert_eq!(start.await.unwrap(), Err(CallError::Cancelled));

    assert!(harness.rtc.joins.lock().unwrap().is_empty());
    assert!(harness.devices.tracks().is_empty());
    assert_eq!(controller.state().await, CallState::Left);
    assert_eq!(harness.host.navigation_count(), 1);
    assert!(harness.host.error_reasons().is_empty());
}

#[tokio::test]
async fn test_unmount_during_join_leaves_network_afterwards() {
    let harness = Harness::new();
    let gate = Arc::new(Gate::default());
    *harness.rtc.join_gate.lock().unwrap() = Some(gate.clone());
    let controller = harness.controller("doctor_patient_42");

    let starting = controller.clone();
    let start = tokio::spawn(async move { starting.start().await });

    gate.entered.notified().await;
    controller.unmount().await;
    assert_eq!(harness.rtc.leave_count(), 0);

    gate.release.notify_one();
    assert_eq!(start.await.unwrap(), Err(CallError::Cancelled));

    assert_eq!(harness.rtc.leave_count(), 1);
    assert!(!harness.rtc.is_connected_now());
    assert!(harness.devices.tracks().is_empty());
    assert_eq!(harness.rtc.publish_count(), 0);
    assert_eq!(controller.state().await, CallState::Left);
}

#[tokio::test]
async fn test_unmount_during_track_creation_releases_both_tracks() {
    let harness = Harness::new();
    let gate = Arc::new(Gate::default());
    *harness.devices.camera_gate.lock().unwrap() = Some(gate.clone());
    let controller = harness.controller("doctor_patient_42");

    let starting = controller.clone();
    let start = tokio::spawn(async move { starting.start().await });

    gate.entered.notified().await;
    controller.unmount().await;
    let microphone = harness.devices.track(MediaKind::Audio).unwrap();
    assert!(microphone.released_once());

    gate.release.notify_one();
    assert_eq!(start.await.unwrap(), Err(CallError::Cancelled));

    assert_eq!(harness.devices.tracks().len(), 2);
    assert!(harness.all_tracks_released_once());
    assert_eq!(harness.rtc.leave_count(), 1);
    assert_eq!(harness.rtc.publish_count(), 0);
    assert_eq!(harness.host.navigation_count(), 1);
}

#[tokio::test]
async fn test_unmount_while_applying_toggles_skips_publish() {
    let harness = Harness::new();
    let gate = Arc::new(Gate::default());
    *harness.devices.enable_gate.lock().unwrap() = Some(gate.clone());
    let controller = harness.controller("doctor_patient_42");
    controller.set_microphone_enabled(false).await;

    let starting = controller.clone();
    let start = tokio::spawn(async move { starting.start().await });

    // Parked inside the microphone's `set_enabled(false)`.
    gate.entered.notified().await;
    controller.unmount().await;
    assert!(harness.all_tracks_released_once());

    gate.release.notify_one();
    assert_eq!(start.await.unwrap(), Err(CallError::Cancelled));

    assert_eq!(harness.surfaces.local_previews.load(Ordering::SeqCst), 0);
    assert_eq!(harness.rtc.publish_count(), 0);
    assert!(harness.all_tracks_released_once());
    assert_eq!(harness.rtc.leave_count(), 1);
    assert_eq!(harness.host.navigation_count(), 1);
    assert_eq!(controller.state().await, CallState::Left);
}

#[tokio::test]
async fn test_event_loop_stops_when_call_ends() {
    let harness = Harness::new();
    let controller = harness.controller("doctor_patient_42");
    controller.start().await.unwrap();

    let (events, receiver) = mpsc::channel(8);
    let looping = controller.clone();
    let event_loop = tokio::spawn(async move { looping.run_events(receiver).await });

    events.send(published(7, MediaKind::Video)).await.unwrap();
    events.send(published(9, MediaKind::Video)).await.unwrap();
    events.send(unpublished(7)).await.unwrap();

    // Let the loop drain before leaving.
    while harness.rtc.subscribes.lock().unwrap().len() < 2
        || controller.remote_participants().await != vec![ParticipantId(9)]
    {
        tokio::task::yield_now().await;
    }

    // The sender stays open; the loop ends because the call did.
    controller.leave().await;
    event_loop.await.unwrap();

    assert!(controller.remote_participants().await.is_empty());
    drop(events);
}

#[tokio::test]
async fn test_event_loop_ends_with_sender() {
    let harness = Harness::new();
    let controller = harness.controller("doctor_patient_42");
    controller.start().await.unwrap();

    let (events, receiver) = mpsc::channel(4);
    events.send(published(3, MediaKind::Audio)).await.unwrap();
    drop(events);

    controller.run_events(receiver).await;
    assert_eq!(controller.remote_participants().await, vec![ParticipantId(3)]);
}
