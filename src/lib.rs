// Error taxonomy
pub mod error;

// Time-ordered identifiers
pub mod snowflake;

// Entity contract: specs, copy policy, partial payloads
pub mod model;

// Cached model kinds
pub mod presence;
pub mod user;

// State registry
pub mod state;

// Event handling and notifications
pub mod event;

// Composition hub and shard processing
pub mod fabric;

// Configuration
pub mod config;

pub use error::{Error, Result};
pub use fabric::{Fabric, FabricHandle};
pub use snowflake::Snowflake;
