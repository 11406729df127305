// Entity contract shared by every cached model

mod payload;
mod spec;


pub use payload::{object, optional, Field, Payload};
pub use spec::{Equality, Fabrication, ModelSpec, FABRIC_FIELD};

use crate::error::{Error, Result};
use crate::fabric::{Fabric, FabricHandle};
use crate::snowflake::Snowflake;
use std::any::TypeId;
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Structural contract every cached object satisfies.
///
/// `Clone` is the copy primitive: plain fields deep-clone, while fields listed
/// in `SPEC`'s copy-by-reference policy hold a [`Shared`] value or a
/// [`FabricHandle`], whose clones point at the same allocation.
pub trait Model: Clone + fmt::Debug + Send + Sync + 'static {
    const SPEC: ModelSpec;

    /// Evaluated wherever a model is instantiated; an invalid spec fails the
    /// build instead of reaching runtime.
    const CONTRACT: () = Self::SPEC.assert_valid();

    /// Merge a partial payload in place. Only keys present in `payload` are
    /// written; everything else keeps its prior value.
    fn update_state(&mut self, _payload: &Payload) -> Result<()> {
        Err(Error::UnsupportedOperation(Self::SPEC.name))
    }

    /// Independent snapshot of this model under its copy policy
    fn copy(&self) -> Self {
        self.clone()
    }

    /// Snowflake for identity-bearing models
    fn identity(&self) -> Option<Snowflake> {
        None
    }

    /// Hash consistent with the model's equality contract.
    ///
    /// Custom-equality models that opt back into hashing must override this.
    fn try_hash(&self) -> Result<u64> {
        match (Self::SPEC.equality, self.identity()) {
            (Equality::Identity, Some(id)) => Ok(hash_of(&(Self::SPEC.name, id))),
            _ => Err(Error::Unhashable(Self::SPEC.name)),
        }
    }
}

/// Models built from a single full payload.
///
/// Construction never fails: any documented key may be missing and falls
/// back to its default.
pub trait FromPayload: Model {
    fn from_payload(payload: &Payload) -> Self;
}

/// Models holding a back-reference to the fabric.
pub trait Fabricated: Model {
    fn from_fabric(fabric: FabricHandle, payload: &Payload) -> Self;

    fn fabric(&self) -> &FabricHandle;

    /// Live fabric, or `NotInitialized` once it has been torn down
    fn upgrade_fabric(&self) -> Result<Arc<Fabric>> {
        self.fabric().upgrade()
    }
}

/// Build a model from a full payload, refusing abstract specs.
pub fn instantiate<M: FromPayload>(payload: &Payload) -> Result<M> {
    let () = M::CONTRACT;
    M::SPEC.instantiable()?;
    Ok(M::from_payload(payload))
}

/// Contract equality: same concrete type and same snowflake. Models without
/// a snowflake are only equal to themselves.
pub fn same_entity<A: Model, B: Model>(a: &A, b: &B) -> bool {
    if TypeId::of::<A>() != TypeId::of::<B>() {
        return false;
    }
    match (a.identity(), b.identity()) {
        (Some(x), Some(y)) => x == y,
        _ => std::ptr::eq(a as *const A as *const (), b as *const B as *const ()),
    }
}

/// Order two models by snowflake.
///
/// Fails with `TypeMismatch` across concrete types or when either side has
/// no snowflake to order by.
pub fn try_cmp<A: Model, B: Model>(a: &A, b: &B) -> Result<Ordering> {
    let mismatch = || Error::TypeMismatch {
        left: A::SPEC.name,
        right: B::SPEC.name,
    };
    if TypeId::of::<A>() != TypeId::of::<B>() {
        return Err(mismatch());
    }
    match (a.identity(), b.identity()) {
        (Some(x), Some(y)) => Ok(x.cmp(&y)),
        _ => Err(mismatch()),
    }
}

pub(crate) fn hash_of<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Value shared by every copy of the model holding it.
///
/// Writes through one copy are visible through all others.
pub struct Shared<T>(Arc<RwLock<T>>);

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, value: T) {
        *self.write() = value;
    }

    /// True if both handles share one allocation
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl<T: Clone> Shared<T> {
    pub fn get(&self) -> T {
        self.read().clone()
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Shared").field(&*self.read()).finish()
    }
}

impl<T: PartialEq> PartialEq for Shared<T> {
    fn eq(&self, other: &Self) -> bool {
        Shared::ptr_eq(self, other) || *self.read() == *other.read()
    }
}
