use super::*;
use crate::config::{Config, RegistryConfig};
use crate::error::Error;
use crate::fabric::{Fabric, FabricHandle};
use crate::model::{Fabricated, Payload};
use crate::presence::{Presence, Status};
use crate::snowflake::Snowflake;
use crate::user::User;
use serde_json::json;
use std::sync::Arc;
use std::thread;

fn payload(value: serde_json::Value) -> Payload {
    value.as_object().cloned().unwrap()
}

fn registry() -> StateRegistry {
    StateRegistry::new(FabricHandle::detached(), &RegistryConfig::default())
}

const ALICE: Snowflake = Snowflake::new(80_351_110_224_678_912);

#[test]
fn test_get_or_create_caches_new_entity() {
    let registry = registry();

    let presence: Presence = registry
        .get_or_create(ALICE, &payload(json!({ "status": "online" })))
        .unwrap();

    assert_eq!(presence.status, Status::Online);
    assert!(registry.contains::<Presence>(ALICE));
    assert_eq!(registry.len::<Presence>(), 1);
    assert!(registry.is_empty::<User>());
}

#[test]
fn test_get_or_create_merges_into_existing_entity() {
    let registry = registry();
    registry
        .get_or_create::<Presence>(
            ALICE,
            &payload(json!({ "status": "online", "client_status": { "desktop": "dnd" } })),
        )
        .unwrap();

    let merged = registry
        .get_or_create::<Presence>(ALICE, &payload(json!({ "status": "idle" })))
        .unwrap();

    assert_eq!(merged.status, Status::Idle);
    assert_eq!(merged.desktop_status, Status::Dnd);
    assert_eq!(registry.len::<Presence>(), 1);
}

#[test]
fn test_keep_existing_policy_ignores_payload() {
    let config = RegistryConfig {
        merge_policy: MergePolicy::KeepExisting,
    };
    let registry = StateRegistry::new(FabricHandle::detached(), &config);
    registry
        .get_or_create::<Presence>(ALICE, &payload(json!({ "status": "online" })))
        .unwrap();

    let cached = registry
        .get_or_create::<Presence>(ALICE, &payload(json!({ "status": "idle" })))
        .unwrap();
    assert_eq!(cached.status, Status::Online);
}

#[test]
fn test_apply_update_requires_cached_entity() {
    let registry = registry();

    let result = registry.apply_update::<Presence>(ALICE, &payload(json!({ "status": "idle" })));
    assert_eq!(
        result.unwrap_err(),
        Error::UnknownEntity {
            kind: "Presence",
            id: ALICE
        }
    );
    // A partial update never creates an entity
    assert!(!registry.contains::<Presence>(ALICE));
}

#[test]
fn test_apply_update_returns_before_and_after() {
    let registry = registry();
    registry
        .get_or_create::<Presence>(
            ALICE,
            &payload(json!({ "status": "online", "client_status": { "desktop": "dnd" } })),
        )
        .unwrap();

    let change = registry
        .apply_update::<Presence>(ALICE, &payload(json!({ "status": "idle" })))
        .unwrap();

    assert_eq!(change.before.status, Status::Online);
    assert_eq!(change.after.status, Status::Idle);
    assert_eq!(change.after.desktop_status, Status::Dnd);
    assert_eq!(registry.get::<Presence>(ALICE).unwrap(), change.after);
}

#[test]
fn test_evict_removes_entity() {
    let registry = registry();
    registry
        .get_or_create::<Presence>(ALICE, &payload(json!({ "status": "dnd" })))
        .unwrap();

    let evicted = registry.evict::<Presence>(ALICE).unwrap();
    assert_eq!(evicted.status, Status::Dnd);
    assert!(registry.get::<Presence>(ALICE).is_none());

    assert!(matches!(
        registry.evict::<Presence>(ALICE),
        Err(Error::UnknownEntity { .. })
    ));
}

#[test]
fn test_kinds_are_cached_independently() {
    let registry = registry();
    registry
        .get_or_create::<User>(ALICE, &payload(json!({ "id": ALICE, "username": "alice" })))
        .unwrap();
    registry
        .get_or_create::<Presence>(ALICE, &payload(json!({ "status": "online" })))
        .unwrap();

    registry.evict::<Presence>(ALICE).unwrap();
    assert!(registry.contains::<User>(ALICE));
    assert!(!registry.contains::<Presence>(ALICE));

    registry.clear();
    assert!(registry.is_empty::<User>());
}

#[test]
fn test_reads_are_copies() {
    let registry = registry();
    registry
        .get_or_create::<Presence>(ALICE, &payload(json!({ "status": "online" })))
        .unwrap();

    let mut copy = registry.get::<Presence>(ALICE).unwrap();
    copy.status = Status::Offline;

    assert_eq!(registry.get::<Presence>(ALICE).unwrap().status, Status::Online);
}

#[test]
fn test_created_user_is_keyed_and_fabricated() {
    let fabric = Fabric::with_defaults(&Config::default());
    let registry = fabric.state_registry().unwrap();

    // Payload without an id still caches under the requested key
    let user = registry
        .get_or_create::<User>(ALICE, &payload(json!({ "username": "alice" })))
        .unwrap();
    assert_eq!(user.id, ALICE);
    assert!(user.fabric().is_attached());
    assert_eq!(registry.all::<User>().len(), 1);
}

#[test]
fn test_concurrent_creates_for_different_entities() {
    let registry = Arc::new(registry());
    let mut handles = vec![];

    for i in 0..10_u64 {
        let registry = Arc::clone(&registry);
        handles.push(thread::spawn(move || {
            registry
                .get_or_create::<Presence>(Snowflake::new(i), &payload(json!({ "status": "online" })))
                .unwrap();
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(registry.len::<Presence>(), 10);
}

#[test]
fn test_concurrent_merges_into_same_entity_lose_nothing() {
    let registry = Arc::new(registry());
    registry
        .get_or_create::<Presence>(ALICE, &Payload::new())
        .unwrap();

    let clients = ["web", "desktop", "mobile"];
    let mut handles = vec![];
    for client in clients {
        let registry = Arc::clone(&registry);
        handles.push(thread::spawn(move || {
            for _ in 0..100 {
                registry
                    .apply_update::<Presence>(
                        ALICE,
                        &payload(json!({ "client_status": { client: "online" } })),
                    )
                    .unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let presence = registry.get::<Presence>(ALICE).unwrap();
    assert_eq!(presence.web_status, Status::Online);
    assert_eq!(presence.desktop_status, Status::Online);
    assert_eq!(presence.mobile_status, Status::Online);
}

#[test]
fn test_kinds_rejecting_merges_are_rebuilt() {
    use super::registry::merge_or_rebuild;
    use crate::model::FromPayload;
    use crate::presence::Activity;

    let mut cached = Activity::from_payload(&payload(json!({ "name": "chess", "type": 0 })));
    let update = payload(json!({ "name": "film", "type": 3 }));

    merge_or_rebuild(&mut cached, &update, || Activity::from_payload(&update)).unwrap();
    assert_eq!(cached.name, "film");
    assert_eq!(cached.kind, crate::presence::ActivityType::Watching);
}

#[test]
fn test_mergeable_kinds_are_not_rebuilt() {
    use super::registry::merge_or_rebuild;

    let mut cached = Presence::default();
    cached.desktop_status = Status::Dnd;

    merge_or_rebuild(&mut cached, &payload(json!({ "status": "idle" })), || {
        panic!("mergeable kind was rebuilt")
    })
    .unwrap();
    assert_eq!(cached.status, Status::Idle);
    assert_eq!(cached.desktop_status, Status::Dnd);
}
