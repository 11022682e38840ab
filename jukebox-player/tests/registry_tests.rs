//! Session registry tests: isolation between sessions and lifecycle

mod helpers;

use helpers::*;
use jukebox_common::events::{JukeboxEvent, TransportState};
use jukebox_player::playback::RequestOutcome;
use jukebox_player::{SessionKey, SessionRegistry};

fn registry(h: &Harness) -> SessionRegistry {
    SessionRegistry::new(h.services.clone(), h.settings)
}

#[tokio::test]
async fn test_get_or_create_reuses_session() {
    let h = Harness::new();
    let registry = registry(&h);
    let key = SessionKey::from("guild-1");

    assert!(registry.get(&key).await.is_none());

    let first = registry.get_or_create(&key).await;
    first.request("A", user("u1")).await.unwrap();

    let second = registry.get_or_create(&key).await;
    assert_eq!(second.status().current.unwrap().title, "A");
    assert_eq!(registry.keys().await, vec![key]);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let h = Harness::new();
    let registry = registry(&h);
    let one = registry.get_or_create(&SessionKey::from("one")).await;
    let two = registry.get_or_create(&SessionKey::from("two")).await;

    one.request("A", user("u1")).await.unwrap();
    one.request("B", user("u1")).await.unwrap();
    two.set_loop_current(true).await.unwrap();

    let outcome = two.request("C", user("u2")).await.unwrap();
    assert!(matches!(outcome, RequestOutcome::NowPlaying { .. }));

    let one_status = one.status();
    let two_status = two.status();
    assert_eq!(one_status.pending.len(), 1);
    assert!(!one_status.loop_current);
    assert!(two_status.pending.is_empty());
    assert!(two_status.loop_current);

    one.stop().await.unwrap();
    assert_eq!(one.status().transport, TransportState::Idle);
    assert_eq!(two.status().transport, TransportState::Playing);
    assert_eq!(registry.len().await, 2);
}

#[tokio::test]
async fn test_failure_in_one_session_leaves_others_playing() {
    let h = Harness::new();
    let registry = registry(&h);
    let one = registry.get_or_create(&SessionKey::from("one")).await;
    let two = registry.get_or_create(&SessionKey::from("two")).await;

    two.request("steady", user("u2")).await.unwrap();
    assert!(one.request("missing song", user("u1")).await.is_err());
    assert!(one.pause().await.is_err());

    let status = two.status();
    assert_eq!(status.transport, TransportState::Playing);
    assert_eq!(status.current.unwrap().title, "steady");
}

#[tokio::test]
async fn test_remove_disconnects_and_forgets() {
    let h = Harness::new();
    let registry = registry(&h);
    let key = SessionKey::from("guild-1");

    let controller = registry.get_or_create(&key).await;
    controller.request("A", user("u1")).await.unwrap();

    assert!(registry.remove(&key).await);
    assert!(controller.is_closed());
    assert!(registry.get(&key).await.is_none());
    assert!(registry.is_empty().await);
    assert!(!registry.remove(&key).await);

    let fresh = registry.get_or_create(&key).await;
    let status = fresh.status();
    assert!(status.current.is_none());
    assert!(!status.connected);
}

#[tokio::test]
async fn test_session_opened_event() {
    let h = Harness::new();
    let registry = registry(&h);
    let mut events = h.subscribe();

    registry.get_or_create(&SessionKey::from("guild-7")).await;

    let event = wait_for_event(&mut events, |e| matches!(e, JukeboxEvent::SessionOpened { .. })).await;
    match event {
        JukeboxEvent::SessionOpened { session, .. } => assert_eq!(session, "guild-7"),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_shutdown_disconnects_everything() {
    let h = Harness::new();
    let registry = registry(&h);
    let one = registry.get_or_create(&SessionKey::from("one")).await;
    let two = registry.get_or_create(&SessionKey::from("two")).await;
    one.request("A", user("u1")).await.unwrap();

    registry.shutdown().await;

    assert!(one.is_closed());
    assert!(two.is_closed());
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_sessions_have_separate_sinks() {
    let h = Harness::new();
    let registry = registry(&h);
    let one = registry.get_or_create(&SessionKey::from("one")).await;
    let two = registry.get_or_create(&SessionKey::from("two")).await;

    one.request("A", user("u1")).await.unwrap();
    one.request("B", user("u1")).await.unwrap();
    two.request("C", user("u2")).await.unwrap();

    assert_eq!(h.monitor.active("one"), Some(locator("A")));
    assert_eq!(h.monitor.active("two"), Some(locator("C")));

    h.monitor.finish_session("one");
    wait_for_current(&one, "B").await;

    let status = two.status();
    assert_eq!(status.current.as_ref().unwrap().title, "C");
    assert_eq!(status.transport, TransportState::Playing);
    assert_eq!(h.monitor.active("two"), Some(locator("C")));
    assert_eq!(h.monitor.connects(), 2);
}
