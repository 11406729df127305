use crate::error::{Error, Result};

/// Name of the field holding a model's back-reference to the fabric.
pub const FABRIC_FIELD: &str = "fabric";

/// How a model reaches the fabric.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fabrication {
    /// Plain data, no fabric access
    None,
    /// Holds its own `fabric` field
    Owned,
    /// Reaches the fabric through an owning model
    Delegated,
}

/// Equality contract of a model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Equality {
    /// Equal iff same concrete type and same snowflake; hashes the same pair
    Identity,
    /// The type defines its own equality. Unhashable unless it opts back in.
    Custom { hashable: bool },
}

/// Static description of a model type's structure.
///
/// Every model carries one as `Model::SPEC`. Specs chain to a parent to
/// inherit declared fields and copy-by-reference fields; the chain is made of
/// `'static` constants so the flattened view never changes after compilation.
#[derive(Clone, Copy, Debug)]
pub struct ModelSpec {
    pub name: &'static str,
    /// Declared storage fields. `None` means no declaration at all.
    pub fields: Option<&'static [&'static str]>,
    /// Fields this type shares between copies, on top of its ancestors'
    pub copy_by_ref: &'static [&'static str],
    pub parent: Option<&'static ModelSpec>,
    pub is_abstract: bool,
    pub fabrication: Fabrication,
    pub equality: Equality,
}

impl ModelSpec {
    /// Concrete spec with no field declaration yet
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: None,
            copy_by_ref: &[],
            parent: None,
            is_abstract: false,
            fabrication: Fabrication::None,
            equality: Equality::Custom { hashable: false },
        }
    }

    pub const fn fields(mut self, fields: &'static [&'static str]) -> Self {
        self.fields = Some(fields);
        self
    }

    pub const fn copy_by_ref(mut self, fields: &'static [&'static str]) -> Self {
        self.copy_by_ref = fields;
        self
    }

    pub const fn extends(mut self, parent: &'static ModelSpec) -> Self {
        self.parent = Some(parent);
        self
    }

    pub const fn abstract_model(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub const fn fabricated(mut self) -> Self {
        self.fabrication = Fabrication::Owned;
        self
    }

    pub const fn delegate_fabricated(mut self) -> Self {
        self.fabrication = Fabrication::Delegated;
        self
    }

    pub const fn equality(mut self, equality: Equality) -> Self {
        self.equality = equality;
        self
    }

    /// Compile-time form of [`ModelSpec::validate`].
    ///
    /// Returns the first violation found, without the offending field name
    /// (const evaluation cannot format strings).
    pub const fn check(&self) -> std::result::Result<(), &'static str> {
        if self.is_abstract {
            return Ok(());
        }
        if self.fields.is_none() {
            return Err("concrete model declares no storage fields");
        }

        let mut i = 0;
        while i < self.copy_by_ref.len() {
            if !self.declares(self.copy_by_ref[i]) {
                return Err("copy-by-reference field is not a declared field");
            }
            i += 1;
        }

        if matches!(self.fabrication, Fabrication::Owned) && !self.declares(FABRIC_FIELD) {
            return Err("fabricated model does not declare a `fabric` field");
        }
        Ok(())
    }

    /// Fails compilation when used in a `const` item and the spec is invalid.
    pub const fn assert_valid(&self) {
        if let Err(reason) = self.check() {
            panic!("{}", reason);
        }
    }

    /// True if this spec or one of its ancestors declares `field`
    pub const fn declares(&self, field: &str) -> bool {
        let mut current = Some(self);
        while let Some(spec) = current {
            if let Some(fields) = spec.fields {
                let mut i = 0;
                while i < fields.len() {
                    if str_eq(fields[i], field) {
                        return true;
                    }
                    i += 1;
                }
            }
            current = spec.parent;
        }
        false
    }

    /// Runtime validation with a descriptive error.
    pub fn validate(&self) -> Result<()> {
        self.check().map_err(|reason| {
            let detail = match reason {
                r if r.starts_with("copy-by-reference") => {
                    let missing: Vec<_> = self
                        .copy_by_ref
                        .iter()
                        .filter(|f| !self.declares(f))
                        .collect();
                    format!("{r}: {missing:?}")
                }
                r => r.to_string(),
            };
            Error::StructuralContract {
                model: self.name,
                reason: detail,
            }
        })
    }

    /// Gate checked before any instance is built: abstract specs fail with
    /// `Instantiation`, broken concrete specs with `StructuralContract`.
    pub fn instantiable(&self) -> Result<()> {
        if self.is_abstract {
            return Err(Error::Instantiation(self.name));
        }
        self.validate()
    }

    /// Ancestors first, then this spec
    fn lineage(&self) -> Vec<&ModelSpec> {
        let mut chain = vec![self];
        let mut current = self.parent;
        while let Some(spec) = current {
            chain.push(spec);
            current = spec.parent;
        }
        chain.reverse();
        chain
    }

    /// All declared fields across the ancestry
    pub fn all_fields(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        for spec in self.lineage() {
            for field in spec.fields.unwrap_or(&[]) {
                if !out.contains(field) {
                    out.push(*field);
                }
            }
        }
        out
    }

    /// Flattened copy-by-reference policy. The fabric field is always shared.
    pub fn all_copy_by_ref(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        for spec in self.lineage() {
            for field in spec.copy_by_ref {
                if !out.contains(field) {
                    out.push(*field);
                }
            }
        }
        if self.declares(FABRIC_FIELD) && !out.contains(&FABRIC_FIELD) {
            out.push(FABRIC_FIELD);
        }
        out
    }

    pub fn is_copied_by_ref(&self, field: &str) -> bool {
        self.all_copy_by_ref().contains(&field)
    }
}

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}
