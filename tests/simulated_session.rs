use mentor_room::network::{MicrophoneFailure, SimulatedRoom, SimulationTiming, StaticTokenProvider};
use mentor_room::room::{Layout, PanelNames, SlotContent, TrackRouter};
use mentor_room::visualization::{VisualizationConfig, VisualizationPipeline};
use mentor_room::{ConnectionState, Error, PresenceStatus, SessionController, SessionNotice, SlotId};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

type Controller = SessionController<SimulatedRoom, StaticTokenProvider>;

fn fast_timing() -> SimulationTiming {
    SimulationTiming {
        join_delay: Duration::from_millis(1),
        speaker_interval: Duration::from_millis(10),
        session_length: None,
    }
}

fn panel_roster() -> Vec<String> {
    ["cosmo-host", "maya-specialist-07", "ricardo-financ", "lucas-produto", "fernanda-juridico"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn build(
    room: SimulatedRoom,
    layout: Layout,
) -> (Controller, mpsc::UnboundedReceiver<SessionNotice>) {
    SessionController::new(
        room,
        StaticTokenProvider::new("sim://local", "simulated"),
        TrackRouter::for_layout(layout, &PanelNames::default()),
        VisualizationPipeline::new(VisualizationConfig {
            frame_interval: Duration::from_millis(5),
            ..VisualizationConfig::default()
        }),
        "mentor-room",
        "user-test",
    )
}

/// Dispatch events until every slot in `slots` shows video.
async fn pump_until_live(controller: &mut Controller, slots: &[SlotId]) {
    let all_live = |controller: &Controller| {
        slots.iter().all(|&slot| {
            matches!(
                controller.router().target(slot).map(|t| t.content()),
                Some(SlotContent::Video(_))
            )
        })
    };
    timeout(Duration::from_secs(5), async {
        while !all_live(controller) {
            let event = controller.next_event().await.expect("session ended early");
            controller.dispatch(event).await;
        }
    })
    .await
    .expect("slots never went live");
}

#[test_log::test(tokio::test)]
async fn panel_session_fills_every_slot_and_resets_on_disconnect() {
    let room = SimulatedRoom::new(panel_roster()).with_timing(fast_timing());
    let (mut controller, _notices) = build(room, Layout::Panel);

    tokio_test::assert_ok!(controller.connect().await);
    assert_eq!(controller.state(), ConnectionState::Connected);
    assert!(controller.session().unwrap().is_visualizing());

    pump_until_live(&mut controller, &SlotId::PANEL).await;
    for slot in SlotId::PANEL {
        let target = controller.router().target(slot).unwrap();
        assert_eq!(target.video_elements(), 1, "slot {}", slot);
        assert_ne!(controller.router().presence(slot), PresenceStatus::Offline);
    }

    tokio_test::assert_ok!(controller.disconnect().await);
    assert_eq!(controller.state(), ConnectionState::Disconnected);
    assert!(!controller.transport().is_connected());
    for slot in SlotId::PANEL {
        assert!(controller.router().target(slot).unwrap().is_placeholder());
        assert_eq!(controller.router().presence(slot), PresenceStatus::Offline);
    }
    assert!(controller.router().stage().audio_sink().is_empty());
}

#[tokio::test]
async fn remote_audio_lands_in_the_sink() {
    let room = SimulatedRoom::new(panel_roster()).with_timing(fast_timing());
    let (mut controller, _notices) = build(room, Layout::Panel);
    tokio_test::assert_ok!(controller.connect().await);

    timeout(Duration::from_secs(5), async {
        while controller.router().stage().audio_sink().len() < 5 {
            let event = controller.next_event().await.expect("session ended early");
            controller.dispatch(event).await;
        }
    })
    .await
    .expect("audio never attached");
    assert_eq!(controller.router().stage().audio_sink().len(), 5);
}

#[tokio::test]
async fn visualization_draws_while_connected() {
    let room = SimulatedRoom::new(vec![]).with_timing(fast_timing());
    let (mut controller, _notices) = build(room, Layout::Panel);
    let mut scene = controller.watch_scene();

    tokio_test::assert_ok!(controller.connect().await);
    timeout(Duration::from_secs(2), async {
        loop {
            scene.changed().await.expect("canvas closed");
            if !scene.borrow_and_update().shapes.is_empty() {
                break;
            }
        }
    })
    .await
    .expect("no scene drawn");

    tokio_test::assert_ok!(controller.disconnect().await);
    assert!(controller.watch_scene().borrow().shapes.is_empty());
}

#[tokio::test]
async fn server_side_end_tears_down() {
    let room = SimulatedRoom::new(vec!["agent".to_string()]).with_timing(SimulationTiming {
        session_length: Some(Duration::from_millis(50)),
        ..fast_timing()
    });
    let (mut controller, mut notices) = build(room, Layout::Single);
    tokio_test::assert_ok!(controller.connect().await);

    timeout(Duration::from_secs(5), controller.run_session())
        .await
        .expect("session never ended");

    assert_eq!(controller.state(), ConnectionState::Disconnected);
    assert!(controller.session().is_none());
    assert!(controller.router().target(SlotId::Agent).unwrap().is_placeholder());

    let mut last = None;
    while let Ok(notice) = notices.try_recv() {
        if let SessionNotice::ConnectionChanged { state, message } = notice {
            last = Some((state, message));
        }
    }
    let (state, message) = last.unwrap();
    assert_eq!(state, ConnectionState::Disconnected);
    assert_eq!(message.as_deref(), Some("session ended by server"));
}

#[tokio::test]
async fn reconnect_after_server_side_end() {
    let room = SimulatedRoom::new(vec!["agent".to_string()]).with_timing(SimulationTiming {
        session_length: Some(Duration::from_millis(50)),
        ..fast_timing()
    });
    let (mut controller, _notices) = build(room, Layout::Single);
    tokio_test::assert_ok!(controller.connect().await);

    timeout(Duration::from_secs(5), controller.run_session())
        .await
        .expect("session never ended");
    assert_eq!(controller.state(), ConnectionState::Disconnected);
    assert!(!controller.transport().is_connected());

    tokio_test::assert_ok!(controller.connect().await);
    assert_eq!(controller.state(), ConnectionState::Connected);
    assert!(controller.session().unwrap().is_visualizing());
    tokio_test::assert_ok!(controller.disconnect().await);
}

#[tokio::test]
async fn single_layout_routes_everyone_to_the_agent_card() {
    let room = SimulatedRoom::new(vec!["gemini-voice".to_string()]).with_timing(fast_timing());
    let (mut controller, _notices) = build(room, Layout::Single);
    tokio_test::assert_ok!(controller.connect().await);

    pump_until_live(&mut controller, &[SlotId::Agent]).await;
    assert!(controller.router().target(SlotId::Host).is_none());
}

#[tokio::test]
async fn denied_microphone_leaves_nothing_open() {
    let room = SimulatedRoom::new(panel_roster())
        .with_timing(fast_timing())
        .fail_microphone(MicrophoneFailure::PermissionDenied);
    let (mut controller, _notices) = build(room, Layout::Panel);

    let err = tokio_test::assert_err!(controller.connect().await);
    assert!(matches!(err, Error::MicrophonePermission(_)));
    assert_eq!(controller.state(), ConnectionState::Error);
    assert!(!controller.transport().is_connected());
    assert!(controller.session().is_none());
}

#[tokio::test]
async fn refused_transport_sets_error_and_allows_retry() {
    let room = SimulatedRoom::new(vec![]).fail_transport("server unreachable");
    let (mut controller, mut notices) = build(room, Layout::Panel);

    assert!(controller.connect().await.is_err());
    assert_eq!(controller.state(), ConnectionState::Error);
    // Error is a fresh starting point, not a dead end
    assert!(controller.state().can_connect());

    let messages: Vec<String> = std::iter::from_fn(|| notices.try_recv().ok())
        .filter_map(|notice| match notice {
            SessionNotice::ConnectionChanged { message, .. } => message,
            _ => None,
        })
        .collect();
    assert!(messages.iter().any(|m| m.contains("server unreachable")));
}
