use std::{fmt, str::FromStr};

use crate::errors::*;

/// Identity of a managed type: its qualified name plus the assembly it lives
/// in and that assembly's version/lineage attributes.
///
/// Parsed from assembly-qualified names such as
/// `Ns.Type, Assembly, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null`.
/// Only the type name is required.
#[derive(Eq, PartialEq, Hash, Debug, Clone)]
pub struct TypeIdentity {
    name: String,
    assembly: Option<String>,
    version: Option<String>,
    culture: Option<String>,
    public_key_token: Option<String>,
}

impl TypeIdentity {
    /// An identity with only a type and assembly name.
    pub fn new(name: impl Into<String>, assembly: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            assembly: Some(assembly.into()),
            version: None,
            culture: None,
            public_key_token: None,
        }
    }

    /// Returns the identity with the given assembly version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Parses an assembly-qualified type name.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str<S: AsRef<str>>(s: S) -> Result<TypeIdentity> {
        let s = s.as_ref();
        let invalid = |why: &str| Error::InvalidDescriptor(format!("{s}: {why}"));

        let mut parts = s.split(',').map(str::trim);
        let name = parts.next().unwrap_or_default();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(invalid("missing or malformed type name"));
        }

        let mut identity = TypeIdentity {
            name: name.to_owned(),
            assembly: None,
            version: None,
            culture: None,
            public_key_token: None,
        };

        if let Some(assembly) = parts.next() {
            if assembly.is_empty() || assembly.contains('=') {
                return Err(invalid("missing assembly name"));
            }
            identity.assembly = Some(assembly.to_owned());
        }

        for attr in parts {
            let (key, value) = attr
                .split_once('=')
                .ok_or_else(|| invalid("assembly attribute without '='"))?;
            let (key, value) = (key.trim(), value.trim());
            if value.is_empty() {
                return Err(invalid("empty assembly attribute"));
            }
            let slot = match key {
                "Version" => {
                    if !is_version(value) {
                        return Err(invalid("malformed version"));
                    }
                    &mut identity.version
                }
                "Culture" => &mut identity.culture,
                "PublicKeyToken" => &mut identity.public_key_token,
                _ => return Err(invalid("unknown assembly attribute")),
            };
            if slot.replace(value.to_owned()).is_some() {
                return Err(invalid("repeated assembly attribute"));
            }
        }

        Ok(identity)
    }

    /// The fully qualified type name, without assembly.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The assembly name, if given.
    pub fn assembly(&self) -> Option<&str> {
        self.assembly.as_deref()
    }

    /// The assembly version, if given.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Whether `self`, used as a lookup key, refers to the type `other`.
    ///
    /// Names and assemblies must be equal; lineage attributes only have to
    /// agree where both sides specify them, so an unversioned reference
    /// (as found in method tables) matches a versioned registration.
    pub fn matches(&self, other: &TypeIdentity) -> bool {
        fn agree(a: &Option<String>, b: &Option<String>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
        }
        self.name == other.name
            && self.assembly == other.assembly
            && agree(&self.version, &other.version)
            && agree(&self.culture, &other.culture)
            && agree(&self.public_key_token, &other.public_key_token)
    }
}

fn is_version(v: &str) -> bool {
    let parts: Vec<&str> = v.split('.').collect();
    (1..=4).contains(&parts.len()) && parts.iter().all(|p| p.parse::<u32>().is_ok())
}

impl FromStr for TypeIdentity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TypeIdentity::from_str(s)
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(assembly) = &self.assembly {
            write!(f, ", {assembly}")?;
        }
        if let Some(v) = &self.version {
            write!(f, ", Version={v}")?;
        }
        if let Some(c) = &self.culture {
            write!(f, ", Culture={c}")?;
        }
        if let Some(t) = &self.public_key_token {
            write!(f, ", PublicKeyToken={t}")?;
        }
        Ok(())
    }
}
