//! Stream identity
//!
//! A [`StreamIdentity`] names exactly one append-only log: the
//! `(domain, entity type, instance key)` triple. It is the only partitioning
//! unit across every backend, so every lock, lease and header is keyed by it.
//!
//! Identities are ordered lexicographically: domain → entity type → instance key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length, in bytes, of any single identity component
pub const MAX_COMPONENT_LENGTH: usize = 256;

/// Identity component validation failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// Component is empty
    #[error("{component} cannot be empty")]
    Empty {
        /// Which component failed
        component: &'static str,
    },

    /// Component exceeds [`MAX_COMPONENT_LENGTH`]
    #[error("{component} exceeds maximum length ({len} > {MAX_COMPONENT_LENGTH})")]
    TooLong {
        /// Which component failed
        component: &'static str,
        /// Actual length in bytes
        len: usize,
    },

    /// Component contains a control character
    #[error("{component} contains a control character")]
    ControlCharacter {
        /// Which component failed
        component: &'static str,
    },
}

fn validate_component(component: &'static str, value: &str) -> Result<(), IdentityError> {
    if value.is_empty() {
        return Err(IdentityError::Empty { component });
    }
    if value.len() > MAX_COMPONENT_LENGTH {
        return Err(IdentityError::TooLong {
            component,
            len: value.len(),
        });
    }
    if value.chars().any(char::is_control) {
        return Err(IdentityError::ControlCharacter { component });
    }
    Ok(())
}

/// Composite key of one entity stream
///
/// # Examples
///
/// ```
/// use factlog_core::StreamIdentity;
///
/// let id = StreamIdentity::new("Bank", "Account", "ACC-1").unwrap();
/// assert_eq!(id.to_string(), "Bank/Account/ACC-1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamIdentity {
    domain_name: String,
    entity_type_name: String,
    instance_key: String,
}

impl StreamIdentity {
    /// Create a validated identity
    pub fn new(
        domain_name: impl Into<String>,
        entity_type_name: impl Into<String>,
        instance_key: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        let domain_name = domain_name.into();
        let entity_type_name = entity_type_name.into();
        let instance_key = instance_key.into();

        validate_component("domain name", &domain_name)?;
        validate_component("entity type name", &entity_type_name)?;
        validate_component("instance key", &instance_key)?;

        Ok(Self {
            domain_name,
            entity_type_name,
            instance_key,
        })
    }

    /// Business domain (e.g. "Bank")
    pub fn domain_name(&self) -> &str {
        &self.domain_name
    }

    /// Entity type within the domain (e.g. "Account")
    pub fn entity_type_name(&self) -> &str {
        &self.entity_type_name
    }

    /// Instance key within the entity type (e.g. "ACC-1")
    pub fn instance_key(&self) -> &str {
        &self.instance_key
    }

    /// The entity type this identity belongs to
    pub fn entity_type(&self) -> EntityType {
        EntityType {
            domain_name: self.domain_name.clone(),
            entity_type_name: self.entity_type_name.clone(),
        }
    }
}

impl fmt::Display for StreamIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.domain_name, self.entity_type_name, self.instance_key
        )
    }
}

/// `(domain, entity type)` pair, the scope of instance enumeration
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityType {
    domain_name: String,
    entity_type_name: String,
}

impl EntityType {
    /// Create a validated entity type
    pub fn new(
        domain_name: impl Into<String>,
        entity_type_name: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        let domain_name = domain_name.into();
        let entity_type_name = entity_type_name.into();
        validate_component("domain name", &domain_name)?;
        validate_component("entity type name", &entity_type_name)?;
        Ok(Self {
            domain_name,
            entity_type_name,
        })
    }

    /// Business domain
    pub fn domain_name(&self) -> &str {
        &self.domain_name
    }

    /// Entity type name
    pub fn entity_type_name(&self) -> &str {
        &self.entity_type_name
    }

    /// Identity of one instance of this entity type
    pub fn instance(&self, instance_key: impl Into<String>) -> Result<StreamIdentity, IdentityError> {
        StreamIdentity::new(
            self.domain_name.clone(),
            self.entity_type_name.clone(),
            instance_key,
        )
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.domain_name, self.entity_type_name)
    }
}
