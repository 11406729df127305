use crate::error::Result;
use crate::model::{hash_of, object, optional, Equality, FromPayload, Model, ModelSpec, Payload};
use crate::snowflake::Snowflake;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::ops::BitOr;

// The gateway never sends partial activities: every activity model is
// rebuilt from a full payload and rejects `update_state`.

/// Rich-presence activity of a member.
///
/// Receive-only: the gateway sends these, clients never send them back.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Activity {
    /// Activity id. Unlike most ids this is an opaque string, not a snowflake.
    pub id: Option<String>,
    pub name: String,
    pub kind: ActivityType,
    pub url: Option<String>,
    pub timestamps: Option<ActivityTimestamps>,
    pub application_id: Option<Snowflake>,
    pub details: Option<String>,
    pub state: Option<String>,
    pub party: Option<ActivityParty>,
    pub assets: Option<ActivityAssets>,
    pub secrets: Option<ActivitySecrets>,
    pub flags: ActivityFlags,
    pub created_at: Option<DateTime<Utc>>,
}

const _: () = <Activity as Model>::SPEC.assert_valid();

impl Model for Activity {
    const SPEC: ModelSpec = ModelSpec::new("Activity").fields(&[
        "id",
        "name",
        "kind",
        "url",
        "timestamps",
        "application_id",
        "details",
        "state",
        "party",
        "assets",
        "secrets",
        "flags",
        "created_at",
    ]);
}

impl FromPayload for Activity {
    fn from_payload(payload: &Payload) -> Self {
        Self {
            id: optional(payload, "id"),
            name: optional(payload, "name").unwrap_or_default(),
            kind: optional(payload, "type").unwrap_or_default(),
            url: optional(payload, "url"),
            timestamps: object(payload, "timestamps").map(ActivityTimestamps::from_payload),
            application_id: optional(payload, "application_id"),
            details: optional(payload, "details"),
            state: optional(payload, "state"),
            party: object(payload, "party").map(ActivityParty::from_payload),
            assets: object(payload, "assets").map(ActivityAssets::from_payload),
            secrets: object(payload, "secrets").map(ActivitySecrets::from_payload),
            flags: optional(payload, "flags").unwrap_or_default(),
            created_at: optional::<i64>(payload, "created_at").and_then(DateTime::from_timestamp_millis),
        }
    }
}

/// Kind of activity. Unrecognised codes map to `Unknown`.
///
/// Serialized as its integer wire code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ActivityType {
    #[default]
    Unknown,
    Playing,
    Streaming,
    Listening,
    Watching,
    Custom,
    Competing,
}

impl ActivityType {
    pub fn code(self) -> i64 {
        match self {
            ActivityType::Unknown => -1,
            ActivityType::Playing => 0,
            ActivityType::Streaming => 1,
            ActivityType::Listening => 2,
            ActivityType::Watching => 3,
            ActivityType::Custom => 4,
            ActivityType::Competing => 5,
        }
    }
}

impl From<i64> for ActivityType {
    fn from(code: i64) -> Self {
        match code {
            0 => ActivityType::Playing,
            1 => ActivityType::Streaming,
            2 => ActivityType::Listening,
            3 => ActivityType::Watching,
            4 => ActivityType::Custom,
            5 => ActivityType::Competing,
            _ => ActivityType::Unknown,
        }
    }
}

impl Serialize for ActivityType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for ActivityType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        i64::deserialize(deserializer).map(ActivityType::from)
    }
}

/// Bit set of activity capabilities
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityFlags(u32);

impl ActivityFlags {
    pub const INSTANCE: Self = Self(0x1);
    pub const JOIN: Self = Self(0x2);
    pub const SPECTATE: Self = Self(0x4);
    pub const JOIN_REQUEST: Self = Self(0x8);
    pub const SYNC: Self = Self(0x10);
    pub const PLAY: Self = Self(0x20);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ActivityFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Party the member is in
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActivityParty {
    /// Opaque string id, may be missing entirely
    pub id: Option<String>,
    pub current_size: Option<u32>,
    pub max_size: Option<u32>,
}

const _: () = <ActivityParty as Model>::SPEC.assert_valid();

impl Model for ActivityParty {
    const SPEC: ModelSpec =
        ModelSpec::new("ActivityParty").fields(&["id", "current_size", "max_size"]);
}

impl FromPayload for ActivityParty {
    fn from_payload(payload: &Payload) -> Self {
        // Accept both explicit keys and the compact `size: [current, max]` form
        let size: Option<[u32; 2]> = optional(payload, "size");
        Self {
            id: optional(payload, "id"),
            current_size: optional(payload, "current_size").or(size.map(|s| s[0])),
            max_size: optional(payload, "max_size").or(size.map(|s| s[1])),
        }
    }
}

/// Images and hover texts shown for an activity
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActivityAssets {
    pub large_image: Option<String>,
    pub large_text: Option<String>,
    pub small_image: Option<String>,
    pub small_text: Option<String>,
}

const _: () = <ActivityAssets as Model>::SPEC.assert_valid();

impl Model for ActivityAssets {
    const SPEC: ModelSpec = ModelSpec::new("ActivityAssets").fields(&[
        "large_image",
        "large_text",
        "small_image",
        "small_text",
    ]);
}

impl FromPayload for ActivityAssets {
    fn from_payload(payload: &Payload) -> Self {
        Self {
            large_image: optional(payload, "large_image"),
            large_text: optional(payload, "large_text"),
            small_image: optional(payload, "small_image"),
            small_text: optional(payload, "small_text"),
        }
    }
}

/// Secrets for joining or spectating
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActivitySecrets {
    pub join: Option<String>,
    pub spectate: Option<String>,
    pub match_secret: Option<String>,
}

const _: () = <ActivitySecrets as Model>::SPEC.assert_valid();

impl Model for ActivitySecrets {
    const SPEC: ModelSpec =
        ModelSpec::new("ActivitySecrets").fields(&["join", "spectate", "match_secret"]);
}

impl FromPayload for ActivitySecrets {
    fn from_payload(payload: &Payload) -> Self {
        Self {
            join: optional(payload, "join"),
            spectate: optional(payload, "spectate"),
            match_secret: optional(payload, "match"),
        }
    }
}

/// Start and end of an activity, from unix epoch milliseconds
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ActivityTimestamps {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

const _: () = <ActivityTimestamps as Model>::SPEC.assert_valid();

impl ActivityTimestamps {
    /// Length of the activity; `None` unless both ends are known
    pub fn duration(&self) -> Option<Duration> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

impl Model for ActivityTimestamps {
    const SPEC: ModelSpec = ModelSpec::new("ActivityTimestamps")
        .fields(&["start", "end"])
        .equality(Equality::Custom { hashable: true });

    fn try_hash(&self) -> Result<u64> {
        Ok(hash_of(self))
    }
}

impl FromPayload for ActivityTimestamps {
    fn from_payload(payload: &Payload) -> Self {
        Self {
            start: optional::<i64>(payload, "start").and_then(DateTime::from_timestamp_millis),
            end: optional::<i64>(payload, "end").and_then(DateTime::from_timestamp_millis),
        }
    }
}
