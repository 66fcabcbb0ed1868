//! Engine configuration
//!
//! Loaded from TOML and validated fail-fast: an engine never starts with a
//! configuration that names an unknown backend, a durable mode without a
//! directory, or a durable mode on a backend that cannot persist.
//!
//! ```toml
//! default_backend = "append-log"
//!
//! [lease]
//! duration_ms = 15000
//! acquire_timeout_ms = 2000
//!
//! [storage]
//! durability = "none"
//! path = "./data"
//!
//! [notifications]
//! enabled = true
//! max_attempts = 3
//! backoff_ms = 50
//!
//! [[domain]]
//! name = "Bank"
//! backend = "table"
//! maintain_index = true
//! ```

use crate::backends;
use crate::notify::RetryPolicy;
use factlog_concurrency::LeaseConfig;
use factlog_storage::{DurabilityMode, APPEND_LOG_BACKEND};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The TOML did not parse into an engine configuration
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be rendered
    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),

    /// A backend name with no constructor
    #[error("unknown backend '{name}' for {scope} (known: {known})")]
    UnknownBackend {
        /// Offending name
        name: String,
        /// Where it was configured
        scope: String,
        /// Known backend names
        known: String,
    },

    /// Two `[[domain]]` entries with the same name
    #[error("domain '{0}' is configured more than once")]
    DuplicateDomain(String),

    /// A `[[domain]]` entry without a name
    #[error("domain entry with an empty name")]
    EmptyDomainName,

    /// `lease.duration_ms` is zero
    #[error("lease duration must be greater than zero")]
    ZeroLeaseDuration,

    /// `notifications.max_attempts` is zero
    #[error("notification max_attempts must be at least 1")]
    ZeroMaxAttempts,

    /// A file-backed durability mode without `storage.path`
    #[error("durability mode '{0:?}' requires storage.path")]
    MissingStoragePath(DurabilityMode),

    /// A file-backed durability mode routed to a backend that keeps nothing on disk
    #[error("backend '{backend}' for {scope} cannot honour durability mode '{durability:?}'")]
    VolatileBackend {
        /// Backend name
        backend: String,
        /// Where it was configured
        scope: String,
        /// Requested mode
        durability: DurabilityMode,
    },
}

/// `[lease]` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LeaseSection {
    /// How long a granted lease stays valid
    pub duration_ms: u64,
    /// How long an append waits for a held lease
    pub acquire_timeout_ms: u64,
}

impl Default for LeaseSection {
    fn default() -> Self {
        Self {
            duration_ms: 15_000,
            acquire_timeout_ms: 2_000,
        }
    }
}

/// `[storage]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    /// Durability of the append-log store
    pub durability: DurabilityMode,
    /// Root directory for file-backed modes
    pub path: Option<PathBuf>,
}

/// `[notifications]` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotificationSection {
    /// Whether notifications are published at all
    pub enabled: bool,
    /// Delivery attempts per notification, first attempt included
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub backoff_ms: u64,
}

impl Default for NotificationSection {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            backoff_ms: 50,
        }
    }
}

/// One `[[domain]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainConfig {
    /// Domain name, as used in stream identities
    pub name: String,
    /// Backend for this domain; the default backend when absent
    #[serde(default)]
    pub backend: Option<String>,
    /// Write the index card when a stream is created
    #[serde(default)]
    pub maintain_index: bool,
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Backend for domains without an explicit entry
    pub default_backend: String,
    /// Lease timing
    pub lease: LeaseSection,
    /// Append-log storage
    pub storage: StorageSection,
    /// Notification delivery
    pub notifications: NotificationSection,
    /// Per-domain overrides
    #[serde(rename = "domain")]
    pub domains: Vec<DomainConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_backend: APPEND_LOG_BACKEND.to_string(),
            lease: LeaseSection::default(),
            storage: StorageSection::default(),
            notifications: NotificationSection::default(),
            domains: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every rule; the first violation wins
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_backend(&self.default_backend, "default_backend")?;

        let mut seen = HashSet::new();
        for domain in &self.domains {
            if domain.name.is_empty() {
                return Err(ConfigError::EmptyDomainName);
            }
            if !seen.insert(domain.name.as_str()) {
                return Err(ConfigError::DuplicateDomain(domain.name.clone()));
            }
            if let Some(backend) = &domain.backend {
                check_backend(backend, &format!("domain '{}'", domain.name))?;
            }
        }

        if self.lease.duration_ms == 0 {
            return Err(ConfigError::ZeroLeaseDuration);
        }
        if self.notifications.max_attempts == 0 {
            return Err(ConfigError::ZeroMaxAttempts);
        }
        if self.storage.durability.requires_files() {
            if self.storage.path.is_none() {
                return Err(ConfigError::MissingStoragePath(self.storage.durability));
            }
            self.check_persistent(&self.default_backend, "default_backend")?;
            for domain in &self.domains {
                if let Some(backend) = &domain.backend {
                    self.check_persistent(backend, &format!("domain '{}'", domain.name))?;
                }
            }
        }
        Ok(())
    }

    fn check_persistent(&self, backend: &str, scope: &str) -> Result<(), ConfigError> {
        if !backends::is_persistent(backend) {
            return Err(ConfigError::VolatileBackend {
                backend: backend.to_string(),
                scope: scope.to_string(),
                durability: self.storage.durability,
            });
        }
        Ok(())
    }

    /// Entry for `domain`, if configured
    pub fn domain(&self, domain: &str) -> Option<&DomainConfig> {
        self.domains.iter().find(|d| d.name == domain)
    }

    /// Backend name serving `domain`
    pub fn backend_for(&self, domain: &str) -> &str {
        self.domain(domain)
            .and_then(|d| d.backend.as_deref())
            .unwrap_or(&self.default_backend)
    }

    /// Whether streams of `domain` are recorded in the index card on creation
    pub fn maintains_index(&self, domain: &str) -> bool {
        self.domain(domain).map(|d| d.maintain_index).unwrap_or(false)
    }

    /// Every backend name in use, default first
    pub fn backends_in_use(&self) -> Vec<&str> {
        let mut names = vec![self.default_backend.as_str()];
        for domain in &self.domains {
            if let Some(backend) = domain.backend.as_deref() {
                if !names.contains(&backend) {
                    names.push(backend);
                }
            }
        }
        names
    }

    /// Lease timing for the stores
    pub fn lease_config(&self) -> LeaseConfig {
        LeaseConfig {
            duration: Duration::from_millis(self.lease.duration_ms),
            acquire_timeout: Duration::from_millis(self.lease.acquire_timeout_ms),
        }
    }

    /// Retry policy for notification delivery
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.notifications.max_attempts,
            backoff: Duration::from_millis(self.notifications.backoff_ms),
        }
    }

    /// Builder-style: set the default backend
    pub fn with_default_backend(mut self, backend: impl Into<String>) -> Self {
        self.default_backend = backend.into();
        self
    }

    /// Builder-style: set storage durability and directory
    pub fn with_storage(mut self, durability: DurabilityMode, path: Option<PathBuf>) -> Self {
        self.storage = StorageSection { durability, path };
        self
    }

    /// Builder-style: add a domain entry
    pub fn with_domain(mut self, domain: DomainConfig) -> Self {
        self.domains.push(domain);
        self
    }
}

fn check_backend(name: &str, scope: &str) -> Result<(), ConfigError> {
    if backends::lookup(name).is_none() {
        return Err(ConfigError::UnknownBackend {
            name: name.to_string(),
            scope: scope.to_string(),
            known: backends::names().collect::<Vec<_>>().join(", "),
        });
    }
    Ok(())
}
