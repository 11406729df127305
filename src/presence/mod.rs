// Presences and the activities they carry

mod activity;


pub use activity::{
    Activity, ActivityAssets, ActivityFlags, ActivityParty, ActivitySecrets, ActivityTimestamps,
    ActivityType,
};

use crate::error::Result;
use crate::model::{object, Equality, Field, FromPayload, Model, ModelSpec, Payload};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Status of a member on one client, or overall
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Online,
    Idle,
    Dnd,
    #[default]
    Offline,
}

impl Status {
    /// Wire name as sent by the gateway
    pub fn name(self) -> &'static str {
        match self {
            Status::Online => "online",
            Status::Idle => "idle",
            Status::Dnd => "dnd",
            Status::Offline => "offline",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "online" => Some(Status::Online),
            "idle" => Some(Status::Idle),
            "dnd" => Some(Status::Dnd),
            "offline" => Some(Status::Offline),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Case-insensitive, like `from_name`
impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Status::from_name(s).ok_or_else(|| format!("unknown status '{s}'"))
    }
}

/// Presence of a member: what they are doing and where they are online.
///
/// Partial payloads only touch the keys they carry. Unknown or `null`
/// statuses fall back to [`Status::Offline`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Presence {
    /// Replaced wholesale whenever the payload carries `activities`
    pub activities: Vec<Activity>,
    pub status: Status,
    pub web_status: Status,
    pub desktop_status: Status,
    pub mobile_status: Status,
}

const _: () = <Presence as Model>::SPEC.assert_valid();

impl Presence {
    fn merge(&mut self, payload: &Payload) {
        Field::<Vec<Value>>::read(payload, "activities")
            .map(|activities| activities.iter().filter_map(activity).collect::<Vec<_>>())
            .apply(&mut self.activities, Vec::new);

        Field::<Status>::read(payload, "status").apply(&mut self.status, Status::default);

        if let Some(client_status) = object(payload, "client_status") {
            Field::<Status>::read(client_status, "web")
                .apply(&mut self.web_status, Status::default);
            Field::<Status>::read(client_status, "desktop")
                .apply(&mut self.desktop_status, Status::default);
            Field::<Status>::read(client_status, "mobile")
                .apply(&mut self.mobile_status, Status::default);
        }
    }

    /// First activity of a given type, if any
    pub fn activity_of(&self, kind: ActivityType) -> Option<&Activity> {
        self.activities.iter().find(|a| a.kind == kind)
    }

    /// True if any client reports something other than offline
    pub fn is_online_anywhere(&self) -> bool {
        [
            self.status,
            self.web_status,
            self.desktop_status,
            self.mobile_status,
        ]
        .iter()
        .any(|s| *s != Status::Offline)
    }
}

/// One element of an `activities` list; non-objects are skipped
fn activity(value: &Value) -> Option<Activity> {
    match value.as_object() {
        Some(payload) => Some(Activity::from_payload(payload)),
        None => {
            debug!(value = %value, "Skipping malformed activity");
            None
        }
    }
}

impl Model for Presence {
    const SPEC: ModelSpec = ModelSpec::new("Presence")
        .fields(&[
            "activities",
            "status",
            "web_status",
            "desktop_status",
            "mobile_status",
        ])
        .equality(Equality::Custom { hashable: false });

    fn update_state(&mut self, payload: &Payload) -> Result<()> {
        self.merge(payload);
        Ok(())
    }
}

impl FromPayload for Presence {
    fn from_payload(payload: &Payload) -> Self {
        let mut presence = Presence::default();
        presence.merge(payload);
        presence
    }
}
