use super::{
    EventHandler, Notification, CONNECTED, DISCONNECTED, GUILD_MEMBER_REMOVE, PRESENCES_REPLACE,
    PRESENCE_UPDATE, READY, USER_UPDATE,
};
use crate::error::{Error, Result};
use crate::fabric::{FabricHandle, ShardId};
use crate::model::{object, optional, Payload};
use crate::presence::Presence;
use crate::snowflake::Snowflake;
use crate::state::{Cached, Change, StateRegistry};
use crate::user::User;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Default event handler: drives the fabric's state registry and broadcasts
/// a [`Notification`] for every change it makes.
pub struct DispatchingEventHandler {
    fabric: FabricHandle,
    notify_tx: broadcast::Sender<Notification>,
}

impl DispatchingEventHandler {
    pub fn new(fabric: FabricHandle, broadcast_capacity: usize) -> Self {
        let (notify_tx, _) = broadcast::channel(broadcast_capacity.max(1));
        Self { fabric, notify_tx }
    }

    fn registry(&self) -> Result<Arc<StateRegistry>> {
        let fabric = self.fabric.upgrade()?;
        let registry = fabric.state_registry()?;
        Ok(Arc::clone(registry))
    }

    fn notify(&self, notification: Notification) {
        // No subscribers is fine
        let _ = self.notify_tx.send(notification);
    }

    fn dispatch(&self, shard_id: ShardId, event_name: &str, payload: &Value) -> Result<()> {
        match event_name {
            CONNECTED => {
                info!(shard_id = ?shard_id, "Shard connected");
                self.notify(Notification::ShardConnected { shard_id });
                Ok(())
            }
            DISCONNECTED => {
                let fields = payload.as_object();
                let code = fields.and_then(|p| optional::<u16>(p, "code"));
                let reason = fields.and_then(|p| optional::<String>(p, "reason"));
                info!(shard_id = ?shard_id, code = ?code, reason = ?reason, "Shard disconnected");
                self.notify(Notification::ShardDisconnected {
                    shard_id,
                    code,
                    reason,
                });
                Ok(())
            }
            READY => self.on_ready(shard_id, as_object(event_name, payload)?),
            USER_UPDATE => self.on_user_update(as_object(event_name, payload)?),
            PRESENCE_UPDATE => self.on_presence_update(as_object(event_name, payload)?),
            PRESENCES_REPLACE => self.on_presences_replace(payload),
            GUILD_MEMBER_REMOVE => self.on_member_remove(as_object(event_name, payload)?),
            _ => {
                debug!(shard_id = ?shard_id, event = %event_name, "Unhandled event, ignoring");
                Ok(())
            }
        }
    }

    fn on_ready(&self, shard_id: ShardId, payload: &Payload) -> Result<()> {
        let user = object(payload, "user").ok_or_else(|| missing(READY, "user"))?;
        let id = user_id(READY, user)?;
        let user = self.registry()?.get_or_create::<User>(id, user)?;

        info!(shard_id = ?shard_id, user_id = %id, "Session ready");
        self.notify(Notification::Ready { shard_id, user });
        Ok(())
    }

    fn on_user_update(&self, payload: &Payload) -> Result<()> {
        let id = user_id(USER_UPDATE, payload)?;
        let registry = self.registry()?;
        let (before, after) = upsert::<User>(&registry, id, payload)?;
        self.notify(Notification::UserUpdated { before, after });
        Ok(())
    }

    fn on_presence_update(&self, payload: &Payload) -> Result<()> {
        let user = object(payload, "user").ok_or_else(|| missing(PRESENCE_UPDATE, "user"))?;
        let id = user_id(PRESENCE_UPDATE, user)?;
        let registry = self.registry()?;

        // Presence updates carry a partial user; only a full one may create it
        match registry.apply_update::<User>(id, user) {
            Ok(_) => {}
            Err(Error::UnknownEntity { .. }) if user.contains_key("username") => {
                registry.get_or_create::<User>(id, user)?;
            }
            Err(Error::UnknownEntity { .. }) => {
                debug!(user_id = %id, "Presence for an uncached user, skipping user merge");
            }
            Err(e) => return Err(e),
        }

        let (before, after) = upsert::<Presence>(&registry, id, payload)?;
        self.notify(Notification::PresenceUpdated {
            user_id: id,
            before,
            after,
        });
        Ok(())
    }

    fn on_presences_replace(&self, payload: &Value) -> Result<()> {
        let presences = payload.as_array().ok_or_else(|| Error::MalformedPayload {
            event: PRESENCES_REPLACE.to_string(),
            reason: "expected an array of presences".to_string(),
        })?;

        for presence in presences {
            let outcome = as_object(PRESENCES_REPLACE, presence)
                .and_then(|p| self.on_presence_update(p));
            if let Err(e) = outcome {
                warn!(error = %e, "Skipping presence in PRESENCES_REPLACE");
            }
        }
        Ok(())
    }

    fn on_member_remove(&self, payload: &Payload) -> Result<()> {
        let user = object(payload, "user").ok_or_else(|| missing(GUILD_MEMBER_REMOVE, "user"))?;
        let id = user_id(GUILD_MEMBER_REMOVE, user)?;

        let presence = self.registry()?.evict::<Presence>(id)?;
        self.notify(Notification::PresenceRemoved {
            user_id: id,
            presence,
        });
        Ok(())
    }
}

impl EventHandler for DispatchingEventHandler {
    fn consume_raw_event(&self, shard_id: ShardId, event_name: &str, payload: &Value) {
        match self.dispatch(shard_id, event_name, payload) {
            Ok(()) => {}
            Err(e @ Error::UnknownEntity { .. }) => {
                debug!(shard_id = ?shard_id, event = %event_name, error = %e, "Event referenced an uncached entity");
            }
            Err(e) => {
                warn!(shard_id = ?shard_id, event = %event_name, error = %e, "Failed to handle event, skipping");
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notify_tx.subscribe()
    }
}

/// Merge into the cached model, or build it when nothing is cached yet.
/// Returns the state before (if any) and after.
fn upsert<M: Cached>(
    registry: &StateRegistry,
    id: Snowflake,
    payload: &Payload,
) -> Result<(Option<M>, M)> {
    match registry.apply_update::<M>(id, payload) {
        Ok(Change { before, after }) => Ok((Some(before), after)),
        Err(Error::UnknownEntity { .. }) => Ok((None, registry.get_or_create::<M>(id, payload)?)),
        Err(e) => Err(e),
    }
}

fn as_object<'a>(event: &str, payload: &'a Value) -> Result<&'a Payload> {
    payload.as_object().ok_or_else(|| Error::MalformedPayload {
        event: event.to_string(),
        reason: "expected a JSON object".to_string(),
    })
}

fn missing(event: &str, key: &str) -> Error {
    Error::MalformedPayload {
        event: event.to_string(),
        reason: format!("missing '{key}'"),
    }
}

fn user_id(event: &str, user: &Payload) -> Result<Snowflake> {
    let raw = user.get("id").ok_or_else(|| missing(event, "id"))?;
    Snowflake::try_from(raw)
}
