use crate::config::RegistryConfig;
use crate::error::{Error, Result};
use crate::fabric::FabricHandle;
use crate::model::{Fabricated, FromPayload, Model, Payload};
use crate::presence::Presence;
use crate::snowflake::Snowflake;
use crate::user::User;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

/// What `get_or_create` does with a payload for an already cached entity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Merge the payload into the cached entity (last write wins per field)
    #[default]
    Merge,
    /// Return the cached entity untouched
    KeepExisting,
}

/// Before/after copies of a merged entity
#[derive(Clone, Debug)]
pub struct Change<M> {
    pub before: M,
    pub after: M,
}

/// Cache of one model kind keyed by snowflake.
///
/// Sharded locking gives per-entity mutual exclusion: two shards touching the
/// same snowflake serialise, unrelated entities do not contend.
pub struct ModelStore<M> {
    entries: DashMap<Snowflake, M>,
}

impl<M> ModelStore<M> {
    fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

/// A model kind the registry can cache.
pub trait Cached: Model {
    /// Build a fresh instance cached under `id` from a full payload
    fn build(fabric: &FabricHandle, id: Snowflake, payload: &Payload) -> Self;

    fn store(registry: &StateRegistry) -> &ModelStore<Self>;
}

impl Cached for User {
    fn build(fabric: &FabricHandle, id: Snowflake, payload: &Payload) -> Self {
        let mut user = User::from_fabric(fabric.clone(), payload);
        user.id = id;
        user
    }

    fn store(registry: &StateRegistry) -> &ModelStore<Self> {
        &registry.users
    }
}

// Presences are keyed by the user they belong to
impl Cached for Presence {
    fn build(_fabric: &FabricHandle, _id: Snowflake, payload: &Payload) -> Self {
        Presence::from_payload(payload)
    }

    fn store(registry: &StateRegistry) -> &ModelStore<Self> {
        &registry.presences
    }
}

/// StateRegistry is the authoritative in-memory cache of entities.
///
/// It is the only component that mutates a cached entity after construction.
/// Every read hands out a copy, so callers never hold a lock across their own
/// logic. Entities must not call back into the registry from `update_state`,
/// since the entry lock is held while merging.
pub struct StateRegistry {
    fabric: FabricHandle,
    merge_policy: MergePolicy,
    users: ModelStore<User>,
    presences: ModelStore<Presence>,
}

impl StateRegistry {
    pub fn new(fabric: FabricHandle, config: &RegistryConfig) -> Self {
        Self {
            fabric,
            merge_policy: config.merge_policy,
            users: ModelStore::new(),
            presences: ModelStore::new(),
        }
    }

    pub fn merge_policy(&self) -> MergePolicy {
        self.merge_policy
    }

    /// Cached entity for `id`, creating it from `payload` on first sight.
    ///
    /// Under [`MergePolicy::Merge`] an existing entity absorbs the payload;
    /// kinds without partial-merge support are rebuilt from it instead.
    pub fn get_or_create<M: Cached>(&self, id: Snowflake, payload: &Payload) -> Result<M> {
        let () = M::CONTRACT;
        M::SPEC.instantiable()?;

        match M::store(self).entries.entry(id) {
            Entry::Occupied(mut cached) => {
                if self.merge_policy == MergePolicy::Merge {
                    merge_or_rebuild(cached.get_mut(), payload, || {
                        M::build(&self.fabric, id, payload)
                    })?;
                    trace!(kind = M::SPEC.name, id = %id, "Merged payload into cached entity");
                }
                Ok(cached.get().copy())
            }
            Entry::Vacant(slot) => {
                let entity = slot.insert(M::build(&self.fabric, id, payload));
                debug!(kind = M::SPEC.name, id = %id, "Cached new entity");
                Ok(entity.copy())
            }
        }
    }

    /// Merge a partial payload into the cached entity.
    ///
    /// A partial payload never creates an entity: fails with `UnknownEntity`
    /// when nothing is cached for `id`.
    pub fn apply_update<M: Cached>(&self, id: Snowflake, payload: &Payload) -> Result<Change<M>> {
        let mut cached = M::store(self)
            .entries
            .get_mut(&id)
            .ok_or(Error::UnknownEntity {
                kind: M::SPEC.name,
                id,
            })?;

        let before = cached.copy();
        cached.update_state(payload)?;
        trace!(kind = M::SPEC.name, id = %id, "Applied partial update");

        Ok(Change {
            before,
            after: cached.copy(),
        })
    }

    /// Remove and return the cached entity
    pub fn evict<M: Cached>(&self, id: Snowflake) -> Result<M> {
        let (_, entity) = M::store(self)
            .entries
            .remove(&id)
            .ok_or(Error::UnknownEntity {
                kind: M::SPEC.name,
                id,
            })?;

        info!(kind = M::SPEC.name, id = %id, "Entity evicted");
        Ok(entity)
    }

    /// Copy of the cached entity
    pub fn get<M: Cached>(&self, id: Snowflake) -> Option<M> {
        M::store(self).entries.get(&id).map(|e| e.copy())
    }

    pub fn contains<M: Cached>(&self, id: Snowflake) -> bool {
        M::store(self).entries.contains_key(&id)
    }

    /// Copies of every cached entity of kind `M`
    pub fn all<M: Cached>(&self) -> Vec<M> {
        M::store(self)
            .entries
            .iter()
            .map(|e| e.value().copy())
            .collect()
    }

    pub fn len<M: Cached>(&self) -> usize {
        M::store(self).entries.len()
    }

    pub fn is_empty<M: Cached>(&self) -> bool {
        M::store(self).entries.is_empty()
    }

    /// Drop every cached entity of every kind
    pub fn clear(&self) {
        self.users.entries.clear();
        self.presences.entries.clear();
        info!("State registry cleared");
    }
}

/// Merge `payload` into `cached`, or replace it with `rebuild()` when the kind
/// only supports full reconstruction.
pub(super) fn merge_or_rebuild<M: Model>(
    cached: &mut M,
    payload: &Payload,
    rebuild: impl FnOnce() -> M,
) -> Result<()> {
    match cached.update_state(payload) {
        Err(Error::UnsupportedOperation(_)) => {
            *cached = rebuild();
            debug!(kind = M::SPEC.name, "Rebuilt entity that rejects partial merges");
            Ok(())
        }
        other => other,
    }
}
