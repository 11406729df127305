use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

/// One gateway payload object: string keys to JSON values.
pub type Payload = Map<String, Value>;

/// A payload field as it appeared on the wire.
///
/// Partial updates rely on the difference between a key that was never sent
/// (`Absent`, leave the prior value alone) and a key that was sent as `null`
/// or with an unusable value (`Null`, reset to the documented default).
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Field<T> {
    #[default]
    Absent,
    Null,
    Set(T),
}

impl<T: DeserializeOwned> Field<T> {
    /// Read `key` from `payload`. Malformed values count as `Null`.
    pub fn read(payload: &Payload, key: &str) -> Self {
        match payload.get(key) {
            None => Field::Absent,
            Some(Value::Null) => Field::Null,
            Some(value) => match T::deserialize(value) {
                Ok(parsed) => Field::Set(parsed),
                Err(e) => {
                    debug!(key = %key, error = %e, "Malformed payload field, using default");
                    Field::Null
                }
            },
        }
    }
}

impl<T> Field<T> {
    pub fn is_present(&self) -> bool {
        !matches!(self, Field::Absent)
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Field::Set(value) => Some(value),
            _ => None,
        }
    }

    /// Write into `target` if the key was sent; `null` writes `default()`.
    pub fn apply(self, target: &mut T, default: impl FnOnce() -> T) {
        match self {
            Field::Absent => {}
            Field::Null => *target = default(),
            Field::Set(value) => *target = value,
        }
    }

    /// Like [`Field::apply`] for optional targets; `null` clears.
    pub fn apply_option(self, target: &mut Option<T>) {
        match self {
            Field::Absent => {}
            Field::Null => *target = None,
            Field::Set(value) => *target = Some(value),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
        match self {
            Field::Absent => Field::Absent,
            Field::Null => Field::Null,
            Field::Set(value) => Field::Set(f(value)),
        }
    }
}

/// Nested object under `key`, if present and an object
pub fn object<'a>(payload: &'a Payload, key: &str) -> Option<&'a Payload> {
    payload.get(key).and_then(Value::as_object)
}

/// Optional field read for full reconstruction, where absent and null agree
pub fn optional<T: DeserializeOwned>(payload: &Payload, key: &str) -> Option<T> {
    Field::read(payload, key).into_option()
}
