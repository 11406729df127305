// Composition hub binding shards, the state registry and the event handler

mod shard;


pub use shard::{run_shard, DispatchFrame, ShardHandle};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::{DispatchingEventHandler, EventHandler};
use crate::snowflake::Snowflake;
use crate::state::StateRegistry;
use dashmap::DashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use tracing::info;

/// Shard key. `None` is the single implicit shard of an unsharded client.
pub type ShardId = Option<u32>;

/// Boundary to one running gateway connection.
///
/// Transport, heartbeating and reconnects live behind this trait.
pub trait GatewayConnection: Send + Sync + fmt::Debug {
    fn shard_id(&self) -> ShardId;

    fn is_connected(&self) -> bool;
}

/// Fabric is the single shared handle passed to every fabricated model and
/// every protocol-layer component.
///
/// It has no behaviour beyond wiring. Components that are not wired yet read
/// as `NotInitialized`; nothing is defaulted behind the caller's back.
pub struct Fabric {
    event_handler: OnceLock<Arc<dyn EventHandler>>,
    state_registry: OnceLock<Arc<StateRegistry>>,
    gateways: DashMap<ShardId, Arc<dyn GatewayConnection>>,
}

impl Fabric {
    /// Empty fabric; components are wired afterwards
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            event_handler: OnceLock::new(),
            state_registry: OnceLock::new(),
            gateways: DashMap::new(),
        })
    }

    /// Fabric wired with a [`StateRegistry`] and a [`DispatchingEventHandler`],
    /// both holding a handle back to it.
    pub fn with_defaults(config: &Config) -> Arc<Self> {
        let fabric = Arc::new_cyclic(|weak: &Weak<Fabric>| {
            let handle = FabricHandle(weak.clone());
            let registry = StateRegistry::new(handle.clone(), &config.registry);
            let handler: Arc<dyn EventHandler> = Arc::new(DispatchingEventHandler::new(
                handle,
                config.events.broadcast_capacity,
            ));

            Self {
                event_handler: OnceLock::from(handler),
                state_registry: OnceLock::from(Arc::new(registry)),
                gateways: DashMap::new(),
            }
        });

        info!(
            merge_policy = ?config.registry.merge_policy,
            broadcast_capacity = config.events.broadcast_capacity,
            "Fabric wired"
        );
        fabric
    }

    /// Non-owning handle for models and components
    pub fn handle(self: &Arc<Self>) -> FabricHandle {
        FabricHandle(Arc::downgrade(self))
    }

    pub fn event_handler(&self) -> Result<&Arc<dyn EventHandler>> {
        self.event_handler
            .get()
            .ok_or(Error::NotInitialized("event_handler"))
    }

    pub fn state_registry(&self) -> Result<&Arc<StateRegistry>> {
        self.state_registry
            .get()
            .ok_or(Error::NotInitialized("state_registry"))
    }

    pub fn set_event_handler(&self, handler: Arc<dyn EventHandler>) -> Result<()> {
        self.event_handler
            .set(handler)
            .map_err(|_| Error::AlreadyInitialized("event_handler"))
    }

    pub fn set_state_registry(&self, registry: Arc<StateRegistry>) -> Result<()> {
        self.state_registry
            .set(registry)
            .map_err(|_| Error::AlreadyInitialized("state_registry"))
    }

    /// Register a shard connection, returning the one it replaces
    pub fn register_gateway(
        &self,
        gateway: Arc<dyn GatewayConnection>,
    ) -> Option<Arc<dyn GatewayConnection>> {
        let shard_id = gateway.shard_id();
        info!(shard_id = ?shard_id, "Gateway registered");
        self.gateways.insert(shard_id, gateway)
    }

    pub fn remove_gateway(&self, shard_id: ShardId) -> Option<Arc<dyn GatewayConnection>> {
        self.gateways.remove(&shard_id).map(|(_, gateway)| gateway)
    }

    /// Connection for `shard_id`, falling back to the implicit shard
    pub fn gateway(&self, shard_id: ShardId) -> Option<Arc<dyn GatewayConnection>> {
        self.gateways
            .get(&shard_id)
            .or_else(|| self.gateways.get(&None))
            .map(|g| Arc::clone(g.value()))
    }

    /// Registered shard keys, sorted with the implicit shard first
    pub fn shard_ids(&self) -> Vec<ShardId> {
        let mut ids: Vec<ShardId> = self.gateways.iter().map(|g| *g.key()).collect();
        ids.sort();
        ids
    }

    /// Shard that receives events for `guild_id` out of `shard_count` shards.
    pub fn shard_for_guild(guild_id: Snowflake, shard_count: u32) -> u32 {
        if shard_count == 0 {
            return 0;
        }
        ((guild_id.get() >> 22) % u64::from(shard_count)) as u32
    }
}

impl fmt::Debug for Fabric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fabric")
            .field("event_handler", &self.event_handler.get().is_some())
            .field("state_registry", &self.state_registry.get().is_some())
            .field("shards", &self.shard_ids())
            .finish()
    }
}

/// Non-owning back-reference to a [`Fabric`].
///
/// The fabric owns the registry, which owns the cached models; models only
/// hold this weak handle so teardown runs hub, then registry, then models.
#[derive(Clone, Default)]
pub struct FabricHandle(Weak<Fabric>);

impl FabricHandle {
    /// Handle that never resolves; for models built outside a fabric
    pub fn detached() -> Self {
        Self(Weak::new())
    }

    pub fn upgrade(&self) -> Result<Arc<Fabric>> {
        self.0.upgrade().ok_or(Error::NotInitialized("fabric"))
    }

    pub fn is_attached(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Weak::ptr_eq(&a.0, &b.0)
    }
}

impl fmt::Debug for FabricHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_attached() { "attached" } else { "detached" };
        write!(f, "FabricHandle({state})")
    }
}
