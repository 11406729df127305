use super::*;
use crate::config::Config;
use crate::fabric::Fabric;
use crate::presence::Status;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast::error::TryRecvError;

const ALICE: Snowflake = Snowflake::new(80_351_110_224_678_912);

fn setup() -> (Arc<Fabric>, Arc<dyn EventHandler>, broadcast::Receiver<Notification>) {
    let fabric = Fabric::with_defaults(&Config::default());
    let handler = Arc::clone(fabric.event_handler().unwrap());
    let rx = handler.subscribe();
    (fabric, handler, rx)
}

fn presence_update(status: &str) -> Value {
    json!({
        "user": { "id": ALICE.to_string(), "username": "alice", "discriminator": "1337" },
        "status": status,
        "client_status": { "desktop": status }
    })
}

#[test]
fn test_presence_update_creates_user_and_presence() {
    let (fabric, handler, mut rx) = setup();

    handler.consume_raw_event(None, PRESENCE_UPDATE, &presence_update("online"));

    let registry = fabric.state_registry().unwrap();
    assert_eq!(registry.get::<User>(ALICE).unwrap().username, "alice");
    assert_eq!(registry.get::<Presence>(ALICE).unwrap().status, Status::Online);

    match rx.try_recv().unwrap() {
        Notification::PresenceUpdated {
            user_id,
            before,
            after,
        } => {
            assert_eq!(user_id, ALICE);
            assert!(before.is_none());
            assert_eq!(after.desktop_status, Status::Online);
        }
        other => panic!("unexpected notification {other:?}"),
    }
}

#[test]
fn test_presence_update_merges_into_cached_state() {
    let (fabric, handler, mut rx) = setup();
    handler.consume_raw_event(None, PRESENCE_UPDATE, &presence_update("online"));
    let _ = rx.try_recv();

    // Partial user: only the id and a changed username
    handler.consume_raw_event(
        Some(1),
        PRESENCE_UPDATE,
        &json!({
            "user": { "id": ALICE.to_string(), "username": "alicia" },
            "status": "idle"
        }),
    );

    let registry = fabric.state_registry().unwrap();
    let user = registry.get::<User>(ALICE).unwrap();
    assert_eq!(user.username, "alicia");
    assert_eq!(user.discriminator, "1337");

    match rx.try_recv().unwrap() {
        Notification::PresenceUpdated { before, after, .. } => {
            assert_eq!(before.unwrap().status, Status::Online);
            assert_eq!(after.status, Status::Idle);
            assert_eq!(after.desktop_status, Status::Online);
        }
        other => panic!("unexpected notification {other:?}"),
    }
}

#[test]
fn test_presence_for_uncached_partial_user_skips_user_creation() {
    let (fabric, handler, mut rx) = setup();

    handler.consume_raw_event(
        None,
        PRESENCE_UPDATE,
        &json!({ "user": { "id": ALICE.to_string() }, "status": "dnd" }),
    );

    let registry = fabric.state_registry().unwrap();
    assert!(!registry.contains::<User>(ALICE));
    assert_eq!(registry.get::<Presence>(ALICE).unwrap().status, Status::Dnd);
    assert!(matches!(
        rx.try_recv(),
        Ok(Notification::PresenceUpdated { .. })
    ));
}

#[test]
fn test_member_remove_evicts_presence() {
    let (fabric, handler, mut rx) = setup();
    handler.consume_raw_event(None, PRESENCE_UPDATE, &presence_update("online"));
    let _ = rx.try_recv();

    handler.consume_raw_event(
        None,
        GUILD_MEMBER_REMOVE,
        &json!({ "guild_id": "1", "user": { "id": ALICE.to_string() } }),
    );

    let registry = fabric.state_registry().unwrap();
    assert!(!registry.contains::<Presence>(ALICE));
    // The user itself stays cached
    assert!(registry.contains::<User>(ALICE));

    match rx.try_recv().unwrap() {
        Notification::PresenceRemoved { user_id, presence } => {
            assert_eq!(user_id, ALICE);
            assert_eq!(presence.status, Status::Online);
        }
        other => panic!("unexpected notification {other:?}"),
    }
}

#[test]
fn test_member_remove_for_unknown_user_is_swallowed() {
    let (_fabric, handler, mut rx) = setup();

    handler.consume_raw_event(
        None,
        GUILD_MEMBER_REMOVE,
        &json!({ "user": { "id": ALICE.to_string() } }),
    );

    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[test]
fn test_ready_caches_current_user() {
    let (fabric, handler, mut rx) = setup();

    handler.consume_raw_event(
        Some(0),
        READY,
        &json!({
            "v": 10,
            "user": { "id": ALICE.to_string(), "username": "alice", "bot": true },
            "session_id": "abc"
        }),
    );

    let user = fabric.state_registry().unwrap().get::<User>(ALICE).unwrap();
    assert!(user.is_bot);

    match rx.try_recv().unwrap() {
        Notification::Ready { shard_id, user } => {
            assert_eq!(shard_id, Some(0));
            assert_eq!(user.id, ALICE);
        }
        other => panic!("unexpected notification {other:?}"),
    }
}

#[test]
fn test_user_update_reports_before_and_after() {
    let (_fabric, handler, mut rx) = setup();
    let payload = json!({ "id": ALICE.to_string(), "username": "alice" });

    handler.consume_raw_event(None, USER_UPDATE, &payload);
    handler.consume_raw_event(
        None,
        USER_UPDATE,
        &json!({ "id": ALICE.to_string(), "username": "alicia" }),
    );

    match rx.try_recv().unwrap() {
        Notification::UserUpdated { before, after } => {
            assert!(before.is_none());
            assert_eq!(after.username, "alice");
        }
        other => panic!("unexpected notification {other:?}"),
    }
    match rx.try_recv().unwrap() {
        Notification::UserUpdated { before, after } => {
            assert_eq!(before.unwrap().username, "alice");
            assert_eq!(after.username, "alicia");
        }
        other => panic!("unexpected notification {other:?}"),
    }
}

#[test]
fn test_presences_replace_skips_bad_items() {
    let (fabric, handler, mut rx) = setup();
    let bob = Snowflake::new(42);

    handler.consume_raw_event(
        None,
        PRESENCES_REPLACE,
        &json!([
            presence_update("online"),
            "not an object",
            { "status": "idle" },
            { "user": { "id": bob.to_string() }, "status": "idle" }
        ]),
    );

    let registry = fabric.state_registry().unwrap();
    assert_eq!(registry.len::<Presence>(), 2);
    assert_eq!(registry.get::<Presence>(bob).unwrap().status, Status::Idle);

    let mut updates = 0;
    while let Ok(notification) = rx.try_recv() {
        assert!(matches!(notification, Notification::PresenceUpdated { .. }));
        updates += 1;
    }
    assert_eq!(updates, 2);
}

#[test]
fn test_malformed_payloads_are_swallowed() {
    let (fabric, handler, mut rx) = setup();

    handler.consume_raw_event(None, PRESENCE_UPDATE, &json!("nope"));
    handler.consume_raw_event(None, PRESENCE_UPDATE, &json!({ "status": "online" }));
    handler.consume_raw_event(
        None,
        PRESENCE_UPDATE,
        &json!({ "user": { "id": "not a snowflake" } }),
    );
    handler.consume_raw_event(None, USER_UPDATE, &json!({ "username": "no id" }));
    handler.consume_raw_event(None, PRESENCES_REPLACE, &json!({}));
    handler.consume_raw_event(None, READY, &json!({}));

    assert!(fabric.state_registry().unwrap().is_empty::<Presence>());
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[test]
fn test_unhandled_events_are_ignored() {
    let (_fabric, handler, mut rx) = setup();
    handler.consume_raw_event(None, "TYPING_START", &json!({ "user_id": "1" }));
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[test]
fn test_connection_pseudo_events() {
    let (_fabric, handler, mut rx) = setup();

    handler.consume_raw_event(Some(3), CONNECTED, &json!({}));
    handler.consume_raw_event(
        Some(3),
        DISCONNECTED,
        &json!({ "code": 4000, "reason": "unknown error" }),
    );

    assert!(matches!(
        rx.try_recv().unwrap(),
        Notification::ShardConnected { shard_id: Some(3) }
    ));
    match rx.try_recv().unwrap() {
        Notification::ShardDisconnected {
            shard_id,
            code,
            reason,
        } => {
            assert_eq!(shard_id, Some(3));
            assert_eq!(code, Some(4000));
            assert_eq!(reason.as_deref(), Some("unknown error"));
        }
        other => panic!("unexpected notification {other:?}"),
    }
}

#[test]
fn test_handler_outliving_its_fabric_does_not_panic() {
    let (fabric, handler, mut rx) = setup();
    drop(fabric);

    handler.consume_raw_event(None, PRESENCE_UPDATE, &presence_update("online"));
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}
