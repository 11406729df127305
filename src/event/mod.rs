use crate::fabric::ShardId;
use crate::presence::Presence;
use crate::snowflake::Snowflake;
use crate::user::User;
use serde_json::Value;
use tokio::sync::broadcast;

mod dispatch;
#[cfg(test)]
mod tests;

pub use dispatch::DispatchingEventHandler;

/// Pseudo-event reported when a shard's connection comes up
pub const CONNECTED: &str = "CONNECTED";
/// Pseudo-event reported when a shard's connection goes away
pub const DISCONNECTED: &str = "DISCONNECTED";

pub const READY: &str = "READY";
pub const USER_UPDATE: &str = "USER_UPDATE";
pub const PRESENCE_UPDATE: &str = "PRESENCE_UPDATE";
pub const PRESENCES_REPLACE: &str = "PRESENCES_REPLACE";
pub const GUILD_MEMBER_REMOVE: &str = "GUILD_MEMBER_REMOVE";

/// Translates raw gateway payloads into registry operations and
/// notifications.
///
/// Implementations must not let a failed event escape: one bad payload must
/// never take a shard's processing loop down with it.
pub trait EventHandler: Send + Sync {
    /// Consume one dispatch from `shard_id`
    fn consume_raw_event(&self, shard_id: ShardId, event_name: &str, payload: &Value);

    /// Subscribe to notifications emitted after state changes
    fn subscribe(&self) -> broadcast::Receiver<Notification>;
}

/// Higher-level change notification for application code.
///
/// Models carried here are copies; holding them never blocks the registry.
#[derive(Clone, Debug)]
pub enum Notification {
    ShardConnected {
        shard_id: ShardId,
    },
    ShardDisconnected {
        shard_id: ShardId,
        code: Option<u16>,
        reason: Option<String>,
    },
    Ready {
        shard_id: ShardId,
        user: User,
    },
    UserUpdated {
        before: Option<User>,
        after: User,
    },
    PresenceUpdated {
        user_id: Snowflake,
        before: Option<Presence>,
        after: Presence,
    },
    PresenceRemoved {
        user_id: Snowflake,
        presence: Presence,
    },
}
