// State registry: authoritative entity cache

mod registry;

pub use registry::{Cached, Change, MergePolicy, ModelStore, StateRegistry};

#[cfg(test)]
mod tests;
