use crate::error::Result;
use crate::fabric::FabricHandle;
use crate::model::{optional, Equality, Fabricated, Field, Model, ModelSpec, Payload};
use crate::presence::Presence;
use crate::snowflake::Snowflake;
use std::hash::{Hash, Hasher};


/// Base spec of every model identified by a snowflake
pub const SNOWFLAKE_MODEL: ModelSpec = ModelSpec::new("SnowflakeModel")
    .fields(&["id"])
    .abstract_model()
    .equality(Equality::Identity);

/// A user account visible to the client.
///
/// Equal to another `User` iff the ids match; the rest of the state is
/// whatever the latest payload said.
#[derive(Clone, Debug)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    pub discriminator: String,
    pub avatar_hash: Option<String>,
    pub is_bot: bool,
    pub is_system: bool,
    fabric: FabricHandle,
}

const _: () = <User as Model>::SPEC.assert_valid();

impl User {
    /// Tag in `username#discriminator` form
    pub fn tag(&self) -> String {
        format!("{}#{}", self.username, self.discriminator)
    }

    /// Cached presence of this user, looked up through the fabric
    pub fn presence(&self) -> Result<Option<Presence>> {
        let fabric = self.upgrade_fabric()?;
        Ok(fabric.state_registry()?.get::<Presence>(self.id))
    }

    fn merge(&mut self, payload: &Payload) {
        Field::<String>::read(payload, "username").apply(&mut self.username, String::new);
        Field::<String>::read(payload, "discriminator")
            .apply(&mut self.discriminator, default_discriminator);
        Field::<String>::read(payload, "avatar").apply_option(&mut self.avatar_hash);
        Field::<bool>::read(payload, "bot").apply(&mut self.is_bot, bool::default);
        Field::<bool>::read(payload, "system").apply(&mut self.is_system, bool::default);
    }
}

fn default_discriminator() -> String {
    "0".to_string()
}

impl Model for User {
    const SPEC: ModelSpec = ModelSpec::new("User")
        .extends(&SNOWFLAKE_MODEL)
        .fields(&[
            "username",
            "discriminator",
            "avatar_hash",
            "is_bot",
            "is_system",
            "fabric",
        ])
        .fabricated()
        .equality(Equality::Identity);

    /// `id` never changes; every other key merges when present
    fn update_state(&mut self, payload: &Payload) -> Result<()> {
        self.merge(payload);
        Ok(())
    }

    fn identity(&self) -> Option<Snowflake> {
        Some(self.id)
    }
}

impl Fabricated for User {
    fn from_fabric(fabric: FabricHandle, payload: &Payload) -> Self {
        let mut user = Self {
            id: optional(payload, "id").unwrap_or(Snowflake::new(0)),
            username: String::new(),
            discriminator: default_discriminator(),
            avatar_hash: None,
            is_bot: false,
            is_system: false,
            fabric,
        };
        user.merge(payload);
        user
    }

    fn fabric(&self) -> &FabricHandle {
        &self.fabric
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for User {}

impl Hash for User {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
