use crate::snowflake::Snowflake;

/// Errors raised by the model layer, the state registry and the fabric.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A model spec breaks the entity contract (missing field declaration,
    /// undeclared copy-by-reference field, missing fabric field).
    #[error("model `{model}` violates the entity contract: {reason}")]
    StructuralContract { model: &'static str, reason: String },

    /// An abstract model was instantiated directly.
    #[error("model `{0}` is abstract and cannot be instantiated")]
    Instantiation(&'static str),

    /// The model only supports full reconstruction from a payload.
    #[error("model `{0}` does not support partial updates")]
    UnsupportedOperation(&'static str),

    /// A merge or eviction targeted an identity that is not cached.
    #[error("no cached {kind} with id {id}")]
    UnknownEntity { kind: &'static str, id: Snowflake },

    /// Two values of incompatible model types were compared.
    #[error("cannot order {left} against {right}")]
    TypeMismatch {
        left: &'static str,
        right: &'static str,
    },

    /// The model defines custom equality without a matching hash.
    #[error("unhashable model `{0}`")]
    Unhashable(&'static str),

    /// A raw identity value is negative, too wide or not a number.
    #[error("invalid snowflake: {0}")]
    InvalidIdentity(String),

    /// An event payload lacks a required key or has the wrong shape.
    #[error("malformed {event} payload: {reason}")]
    MalformedPayload { event: String, reason: String },

    /// A fabric component was read before being wired.
    #[error("fabric component `{0}` is not initialized")]
    NotInitialized(&'static str),

    /// A fabric component was wired twice.
    #[error("fabric component `{0}` is already initialized")]
    AlreadyInitialized(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
