use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::time::{sleep, timeout};
use voyagr_model::{
    ConversationId, ErrorKind, FlightItinerary, FlightLeg, LinkHandle, Role,
    TripSnapshot,
};
use voyagr_test_backend::{
    FailureKind, LinkCommand, PresetHandshake, PresetPoll, PresetUpload,
    ScriptedBackend, ScriptedVoiceLink,
};

use super::*;
use crate::config::SessionConfigBuilder;
use crate::reconciler::SelectionSource;
use crate::session::{DisplayStatus, SessionStatus, TransitionError};
use crate::view::{SessionView, ViewModel};

struct Harness {
    orchestrator: Orchestrator,
    backend: ScriptedBackend,
    link: ScriptedVoiceLink,
    view: SessionView,
    errors: Arc<Mutex<Vec<SessionError>>>,
}

impl Harness {
    fn new(link: ScriptedVoiceLink) -> Self {
        let backend = ScriptedBackend::default();
        let config = SessionConfigBuilder::with_agent_id("agent-1").build();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let orchestrator =
            OrchestratorBuilder::new(config, backend.clone(), link.clone())
                .on_error(move |err| sink.lock().unwrap().push(err.clone()))
                .build();
        let view = orchestrator.view();
        Self {
            orchestrator,
            backend,
            link,
            view,
            errors,
        }
    }

    async fn wait_until(
        &mut self,
        predicate: impl FnMut(&ViewModel) -> bool,
    ) -> ViewModel {
        timeout(Duration::from_secs(60), self.view.wait_for(predicate))
            .await
            .expect("timed out waiting for the view")
            .expect("orchestrator is gone")
    }

    async fn connected(&mut self, id: &str) -> ConversationId {
        self.backend.push_handshake(PresetHandshake::accept(id));
        let conversation_id = self.orchestrator.connect().await.unwrap();
        self.wait_until(|view| view.session_status() == DisplayStatus::Connected)
            .await;
        conversation_id
    }

    /// Answers every poll for `id` with an empty snapshot.
    fn quiet_polls(&self, id: &str) {
        self.backend
            .push_poll(id, PresetPoll::Snapshot(TripSnapshot::default()));
    }

    fn errors(&self) -> Vec<SessionError> {
        self.errors.lock().unwrap().clone()
    }
}

fn flight(number: &str) -> FlightItinerary {
    FlightItinerary {
        airline: None,
        legs: vec![FlightLeg {
            airline: "TAP Air Portugal".to_owned(),
            flight_number: number.to_owned(),
            duration: 155,
            ..FlightLeg::default()
        }],
        price: 189.0,
        total_duration: 155,
        kind: "One way".to_owned(),
    }
}

fn flights(numbers: &[&str]) -> Vec<FlightItinerary> {
    numbers.iter().map(|n| flight(n)).collect()
}

fn snapshot(candidate: &[&str], confirmed: &[&str]) -> PresetPoll {
    PresetPoll::Snapshot(TripSnapshot {
        candidate_flights: flights(candidate),
        confirmed_flights: flights(confirmed),
        ..TripSnapshot::default()
    })
}

async fn settle() {
    sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_candidates_stay_until_decided() {
    let mut h = Harness::new(ScriptedVoiceLink::auto_connecting());
    h.backend.push_poll("abc", snapshot(&["F1", "F2"], &[]));
    h.backend.push_poll("abc", snapshot(&["F1", "F2"], &["F1"]));

    let id = h.connected("abc").await;
    assert_eq!(id.as_str(), "abc");
    assert_eq!(
        h.link.commands()[0],
        LinkCommand::Connect {
            agent_id: "agent-1".to_owned(),
            conversation_id: Some(id.clone()),
        }
    );

    let view = h
        .wait_until(|view| !view.display_selection().flights.is_empty())
        .await;
    let selection = view.display_selection();
    assert_eq!(selection.flights.source, SelectionSource::Candidate);
    assert_eq!(selection.flights.items, flights(&["F1", "F2"]));

    // Second poll: one confirmed flight is not more than two candidates.
    sleep(Duration::from_secs(8)).await;
    assert_eq!(h.backend.polls_served(&id), 2);
    let view = h.view.current();
    assert_eq!(
        view.display_selection().flights.source,
        SelectionSource::Candidate
    );
    assert_eq!(view.display_selection().flights.items, flights(&["F1", "F2"]));
}

#[tokio::test(start_paused = true)]
async fn test_confirmed_selection_takes_over() {
    let mut h = Harness::new(ScriptedVoiceLink::auto_connecting());
    h.backend.push_poll("abc", snapshot(&["F1", "F2"], &[]));
    h.backend
        .push_poll("abc", snapshot(&["F1", "F2"], &["F1", "F2", "F3", "F4"]));
    h.connected("abc").await;

    let view = h
        .wait_until(|view| {
            view.display_selection().flights.source == SelectionSource::Confirmed
        })
        .await;
    assert_eq!(
        view.display_selection().flights.items,
        flights(&["F1", "F2", "F3", "F4"])
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_handshake_stays_idle() {
    let mut h = Harness::new(ScriptedVoiceLink::auto_connecting());
    h.backend
        .push_handshake(PresetHandshake::Reject(FailureKind::ServerStatus));

    let err = h.orchestrator.connect().await.unwrap_err();
    let SessionError::HandshakeFailed(failure) = &err else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(failure.kind, ErrorKind::ServerStatus);
    assert!(err.is_user_visible());

    let view = h.view.current();
    assert_eq!(view.lifecycle_status(), SessionStatus::Idle);
    assert_eq!(view.conversation_id(), None);
    assert!(h.link.commands().is_empty());
    assert_eq!(h.errors(), vec![err]);

    // The next attempt is independent.
    h.connected("abc").await;
    assert_eq!(h.backend.handshakes_served(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stale_poll_from_previous_conversation_is_discarded() {
    let mut h = Harness::new(ScriptedVoiceLink::auto_connecting());
    h.backend
        .push_delayed_poll("A", snapshot(&["FROM-A"], &[]), Duration::from_secs(10));
    h.backend.push_poll("B", snapshot(&["FROM-B"], &[]));

    h.connected("A").await;
    h.orchestrator.disconnect().await.unwrap();
    h.connected("B").await;
    h.wait_until(|view| !view.display_selection().flights.is_empty())
        .await;

    // The poll issued for `A` resolves now, after the session moved on.
    sleep(Duration::from_secs(12)).await;
    let view = h.view.current();
    assert_eq!(view.conversation_id().map(|id| id.as_str()), Some("B"));
    assert_eq!(view.display_selection().flights.items, flights(&["FROM-B"]));
    assert_eq!(h.backend.polls_served(&"A".into()), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_completes_while_upload_hangs() {
    let mut h = Harness::new(ScriptedVoiceLink::auto_connecting());
    h.backend.set_upload(PresetUpload::Hang);
    h.quiet_polls("abc");
    let id = h.connected("abc").await;
    h.link
        .emit_message(json!({ "source": "user", "message": "Flights to Porto" }));
    h.wait_until(|view| view.transcript_snapshot().len() == 1).await;

    timeout(Duration::from_secs(1), h.orchestrator.disconnect())
        .await
        .expect("disconnect got stuck")
        .unwrap();
    let view = h.view.current();
    assert_eq!(view.lifecycle_status(), SessionStatus::Idle);
    assert!(view.display_selection().is_empty());
    assert_eq!(
        h.link.commands().last(),
        Some(&LinkCommand::Disconnect(LinkHandle::new(1)))
    );
    assert!(!h.link.is_attached());

    settle().await;
    let uploads = h.backend.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].conversation_id, id);
    assert_eq!(uploads[0].transcript[0].content, "Flights to Porto");

    // The upload is abandoned after the timeout and reported silently.
    sleep(Duration::from_secs(6)).await;
    let errors = h.errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], SessionError::UploadFailed { .. }));
    assert!(!errors[0].is_user_visible());

    // The transcript outlives the session until the next connect.
    assert_eq!(h.view.current().transcript_snapshot().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_upload_is_reported() {
    let mut h = Harness::new(ScriptedVoiceLink::auto_connecting());
    h.backend
        .set_upload(PresetUpload::Reject(FailureKind::ClientStatus));
    h.quiet_polls("abc");
    h.connected("abc").await;
    h.orchestrator.disconnect().await.unwrap();
    settle().await;

    assert_eq!(h.backend.uploads().len(), 1);
    assert!(matches!(
        h.errors().as_slice(),
        [SessionError::UploadFailed { .. }]
    ));
}

#[tokio::test(start_paused = true)]
async fn test_transcript_and_vocalization() {
    let mut h = Harness::new(ScriptedVoiceLink::auto_connecting());
    h.connected("abc").await;

    h.link
        .emit_message(json!({ "source": "user", "message": "Hotels in Lisbon?" }));
    h.link
        .emit_message(json!({ "source": "ai", "message": "Looking now." }));
    h.link.emit_message(json!({ "source": "ai", "results": [1, 2] }));
    let view = h
        .wait_until(|view| view.transcript_snapshot().len() == 3)
        .await;

    let transcript = view.transcript_snapshot();
    assert_eq!(transcript[0].role, Role::User);
    assert_eq!(transcript[1].role, Role::Assistant);
    assert_eq!(transcript[1].content, "Looking now.");
    assert_eq!(transcript[2].role, Role::Assistant);
    assert_eq!(
        transcript[2].content,
        serde_json::to_string_pretty(&json!({ "source": "ai", "results": [1, 2] }))
            .unwrap()
    );
    let sequences: Vec<_> = transcript.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, [0, 1, 2]);

    // Only assistant text is spoken.
    assert_eq!(h.link.spoken(), vec!["Looking now.".to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn test_connect_event_clears_early_messages() {
    let mut h = Harness::new(ScriptedVoiceLink::default());
    h.backend.push_handshake(PresetHandshake::accept("abc"));
    h.orchestrator.connect().await.unwrap();
    assert_eq!(
        h.view.current().session_status(),
        DisplayStatus::Connecting
    );

    h.link.emit_message(json!({ "source": "ai", "message": "early" }));
    h.wait_until(|view| view.transcript_snapshot().len() == 1).await;
    // Not vocalized before the link is confirmed.
    assert!(h.link.spoken().is_empty());

    h.link.emit_connect();
    let view = h
        .wait_until(|view| view.session_status() == DisplayStatus::Connected)
        .await;
    assert!(view.transcript_snapshot().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_barge_in_stops_output() {
    let mut h = Harness::new(ScriptedVoiceLink::auto_connecting());
    h.connected("abc").await;

    // Nothing to interrupt yet.
    h.link.emit_user_start_speaking();
    settle().await;

    h.link.emit_speech_start();
    h.wait_until(|view| view.is_speaking()).await;
    h.link.emit_user_start_speaking();
    h.wait_until(|view| !view.is_speaking()).await;
    h.link.emit_user_stop_speaking();
    settle().await;

    let stops = h
        .link
        .commands()
        .into_iter()
        .filter(|cmd| *cmd == LinkCommand::StopSpeaking)
        .count();
    assert_eq!(stops, 1);
    assert!(!h.view.current().is_speaking());
}

#[tokio::test(start_paused = true)]
async fn test_volume_is_clamped_and_retained() {
    let mut h = Harness::new(ScriptedVoiceLink::auto_connecting());
    assert_eq!(h.view.current().volume(), 1.0);
    h.orchestrator.set_volume(-0.3).unwrap();
    h.wait_until(|view| view.volume() == 0.0).await;
    // Not forwarded without a live link.
    assert_eq!(h.link.last_volume(), None);

    // The retained volume is applied once the link opens.
    h.connected("abc").await;
    assert_eq!(h.link.last_volume(), Some(0.0));

    h.orchestrator.set_volume(1.7).unwrap();
    h.wait_until(|view| view.volume() == 1.0).await;
    assert_eq!(h.link.last_volume(), Some(1.0));

    h.orchestrator.disconnect().await.unwrap();
    h.orchestrator.set_volume(0.5).unwrap();
    h.wait_until(|view| view.volume() == 0.5).await;
    assert_eq!(h.link.last_volume(), Some(1.0));
}

#[tokio::test(start_paused = true)]
async fn test_link_failure_falls_back_to_idle() {
    let mut h = Harness::new(ScriptedVoiceLink::default());
    h.link.fail_connect_with("microphone permission denied");
    h.backend.push_handshake(PresetHandshake::accept("abc"));
    h.backend.push_poll("abc", snapshot(&["F1"], &[]));

    let err = h.orchestrator.connect().await.unwrap_err();
    assert_eq!(
        err,
        SessionError::VoiceLink("microphone permission denied".to_owned())
    );
    let view = h.view.current();
    assert_eq!(view.lifecycle_status(), SessionStatus::Idle);
    assert!(view.display_selection().is_empty());

    sleep(Duration::from_secs(30)).await;
    assert!(h.backend.polls_served(&"abc".into()) <= 1);
    assert!(h.view.current().display_selection().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_remote_hang_up() {
    let mut h = Harness::new(ScriptedVoiceLink::auto_connecting());
    h.connected("abc").await;
    h.link.emit_message(json!({ "source": "ai", "message": "Bye!" }));
    h.wait_until(|view| view.transcript_snapshot().len() == 1).await;

    h.link.emit_disconnect();
    h.wait_until(|view| view.lifecycle_status() == SessionStatus::Idle)
        .await;
    settle().await;
    assert_eq!(h.backend.uploads().len(), 1);
    // The link closed itself; it is not asked to disconnect again.
    assert!(
        !h.link
            .commands()
            .iter()
            .any(|cmd| matches!(cmd, LinkCommand::Disconnect(_)))
    );

    // Late events from the old link are ignored.
    h.link.emit_message(json!({ "source": "ai", "message": "ghost" }));
    h.link.emit_connect();
    settle().await;
    let view = h.view.current();
    assert_eq!(view.lifecycle_status(), SessionStatus::Idle);
    assert_eq!(view.transcript_snapshot().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_poll_keeps_previous_selection() {
    let mut h = Harness::new(ScriptedVoiceLink::auto_connecting());
    h.backend.push_poll("abc", snapshot(&["F1"], &[]));
    h.backend
        .push_poll("abc", PresetPoll::Failure(FailureKind::Transport));
    let id = h.connected("abc").await;
    h.wait_until(|view| !view.display_selection().flights.is_empty())
        .await;

    sleep(Duration::from_secs(8)).await;
    assert_eq!(h.backend.polls_served(&id), 2);
    assert_eq!(
        h.view.current().display_selection().flights.items,
        flights(&["F1"])
    );
    let errors = h.errors();
    assert!(matches!(
        errors.as_slice(),
        [SessionError::PollFailed { conversation_id, .. }] if *conversation_id == id
    ));
    assert!(!errors[0].is_user_visible());
}

#[tokio::test(start_paused = true)]
async fn test_voice_error_does_not_disconnect() {
    let mut h = Harness::new(ScriptedVoiceLink::auto_connecting());
    h.quiet_polls("abc");
    h.connected("abc").await;
    h.link.emit_error("network glitch");
    settle().await;

    assert_eq!(
        h.errors(),
        vec![SessionError::VoiceLink("network glitch".to_owned())]
    );
    assert_eq!(
        h.view.current().lifecycle_status(),
        SessionStatus::Connected
    );
}

#[tokio::test(start_paused = true)]
async fn test_invalid_transitions() {
    let mut h = Harness::new(ScriptedVoiceLink::auto_connecting());
    assert_eq!(
        h.orchestrator.disconnect().await,
        Err(SessionError::InvalidTransition(TransitionError::NotAllowed {
            trigger: "disconnect",
            status: SessionStatus::Idle,
        }))
    );

    h.connected("abc").await;
    assert!(matches!(
        h.orchestrator.connect().await,
        Err(SessionError::InvalidTransition(
            TransitionError::NotAllowed { trigger: "connect", .. }
        ))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_new_connect_clears_previous_session() {
    let mut h = Harness::new(ScriptedVoiceLink::auto_connecting());
    h.backend.push_poll("A", snapshot(&["F1"], &[]));
    h.connected("A").await;
    h.link.emit_message(json!({ "source": "user", "message": "hi" }));
    h.wait_until(|view| {
        view.transcript_snapshot().len() == 1
            && !view.display_selection().is_empty()
    })
    .await;
    h.orchestrator.disconnect().await.unwrap();

    h.backend.push_handshake(PresetHandshake::accept("B"));
    h.orchestrator.connect().await.unwrap();
    let view = h.view.current();
    assert!(view.transcript_snapshot().is_empty());
    assert!(view.display_selection().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_late_link_open_leaves_next_session_alone() {
    let mut h = Harness::new(ScriptedVoiceLink::auto_connecting());
    h.quiet_polls("A");
    h.quiet_polls("B");
    let release = h.link.hold_next_connect();

    // The link for `A` takes longer to open than the user is willing to wait.
    h.backend.push_handshake(PresetHandshake::accept("A"));
    let first = tokio::spawn({
        let orchestrator = h.orchestrator.clone();
        async move { orchestrator.connect().await }
    });
    h.wait_until(|view| view.lifecycle_status() == SessionStatus::Connecting)
        .await;
    h.orchestrator.disconnect().await.unwrap();
    assert_eq!(
        h.view.current().lifecycle_status(),
        SessionStatus::Idle
    );

    h.connected("B").await;
    assert_eq!(h.link.open_connections(), vec![LinkHandle::new(2)]);

    release.send(()).unwrap();
    assert!(matches!(
        first.await.unwrap(),
        Err(SessionError::InvalidTransition(TransitionError::StaleAttempt(_)))
    ));
    settle().await;

    // Only the abandoned connection was closed.
    let disconnects: Vec<_> = h
        .link
        .commands()
        .into_iter()
        .filter(|cmd| matches!(cmd, LinkCommand::Disconnect(_)))
        .collect();
    assert_eq!(disconnects, vec![LinkCommand::Disconnect(LinkHandle::new(1))]);
    assert_eq!(h.link.open_connections(), vec![LinkHandle::new(2)]);
    let view = h.view.current();
    assert_eq!(view.lifecycle_status(), SessionStatus::Connected);
    assert_eq!(view.conversation_id().map(|id| id.as_str()), Some("B"));

    // `B` keeps receiving events.
    h.link
        .emit_message(json!({ "source": "user", "message": "Still there?" }));
    h.wait_until(|view| view.transcript_snapshot().len() == 1).await;

    // And its own disconnect closes its own connection.
    h.orchestrator.disconnect().await.unwrap();
    assert!(!h.link.is_attached());
    assert!(h.errors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_transcript_is_not_copied_on_publish() {
    let mut h = Harness::new(ScriptedVoiceLink::auto_connecting());
    h.quiet_polls("abc");
    h.connected("abc").await;
    h.link
        .emit_message(json!({ "source": "user", "message": "Hotels in Lisbon?" }));
    let before = h
        .wait_until(|view| view.transcript_snapshot().len() == 1)
        .await;

    h.orchestrator.set_volume(0.5).unwrap();
    let after = h.wait_until(|view| view.volume() == 0.5).await;
    assert!(std::ptr::eq(
        before.transcript_snapshot(),
        after.transcript_snapshot()
    ));
}

#[tokio::test]
async fn test_shutdown() {
    let h = Harness::new(ScriptedVoiceLink::auto_connecting());
    h.orchestrator.shutdown();
    assert_eq!(h.orchestrator.connect().await, Err(SessionError::Closed));
    assert!(h.orchestrator.is_closed());
}
