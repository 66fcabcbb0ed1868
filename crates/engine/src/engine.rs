//! Engine: configuration, backends and notifications wired together
//!
//! The engine opens every backend the configuration names (once), routes
//! each domain to its backend, and hands out [`EventStream`] handles that
//! share one [`NotificationDispatcher`].
//!
//! ```text
//! EngineConfig ──validate──► backends::lookup(name) ──► Arc<dyn StreamBackend>
//!                                   (per name in use)
//! stream(identity) ──► backend_for(domain) ──► EventStream
//! ```

use crate::backends::{self, BackendSettings};
use crate::config::{ConfigError, EngineConfig};
use crate::notify::{NotificationDispatcher, NotificationTransport, NullTransport};
use crate::stream::{EventStream, EventStreamReader};
use chrono::{DateTime, Utc};
use factlog_core::{EntityType, ReadFault, StreamBackend, StreamIdentity, WriteContext};
use factlog_storage::StorageError;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Failure to open an engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A backend failed to open
    #[error("backend '{backend}' failed to open: {source}")]
    Storage {
        /// Backend name
        backend: String,
        /// Underlying failure
        #[source]
        source: StorageError,
    },
}

/// Opened backends plus the shared dispatcher
pub struct Engine {
    config: EngineConfig,
    default_backend: Arc<dyn StreamBackend>,
    backends: HashMap<String, Arc<dyn StreamBackend>>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.backends.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Engine")
            .field("default_backend", &self.config.default_backend)
            .field("backends", &names)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

impl Engine {
    /// Builder with the default configuration
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// In-memory engine on the default backend, notifications discarded
    pub fn ephemeral() -> Result<Self, EngineError> {
        EngineBuilder::new().open()
    }

    /// Engine from a TOML configuration file
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        EngineBuilder::new()
            .config(EngineConfig::from_file(path)?)
            .open()
    }

    /// Configuration in effect
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared notification dispatcher
    pub fn dispatcher(&self) -> &Arc<NotificationDispatcher> {
        &self.dispatcher
    }

    /// Backend serving `domain`
    pub fn backend_for(&self, domain: &str) -> Arc<dyn StreamBackend> {
        self.backends
            .get(self.config.backend_for(domain))
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::clone(&self.default_backend))
    }

    /// Write handle on `identity`
    pub fn stream(&self, identity: StreamIdentity) -> EventStream {
        let backend = self.backend_for(identity.domain_name());
        let maintain_index = self.config.maintains_index(identity.domain_name());
        EventStream::new(identity, backend, Arc::clone(&self.dispatcher))
            .with_index_maintenance(maintain_index)
    }

    /// Write handle on `identity` carrying `context`
    pub fn stream_with_context(
        &self,
        identity: StreamIdentity,
        context: WriteContext,
    ) -> EventStream {
        self.stream(identity).with_context(context)
    }

    /// Read handle on `identity`
    pub fn reader(&self, identity: StreamIdentity) -> EventStreamReader {
        let backend = self.backend_for(identity.domain_name());
        EventStreamReader::new(identity, backend)
    }

    /// Instance keys of `entity_type`, optionally as of a date
    pub fn instance_keys(
        &self,
        entity_type: &EntityType,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>, ReadFault> {
        self.backend_for(entity_type.domain_name())
            .instance_keys(entity_type, as_of)
    }
}

/// Builder for [`Engine`]
pub struct EngineBuilder {
    config: EngineConfig,
    transport: Option<Arc<dyn NotificationTransport>>,
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    /// Default configuration, no transport
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            transport: None,
        }
    }

    /// Replace the configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Publish notifications through `transport`
    pub fn transport(mut self, transport: Arc<dyn NotificationTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Validate the configuration and open every backend in use
    pub fn open(self) -> Result<Engine, EngineError> {
        let config = self.config;
        config.validate()?;

        let settings = BackendSettings {
            lease: config.lease_config(),
            durability: config.storage.durability,
            path: config.storage.path.as_deref(),
        };

        let default_backend = open_backend(&config.default_backend, &settings)?;
        let mut opened: HashMap<String, Arc<dyn StreamBackend>> = HashMap::new();
        opened.insert(config.default_backend.clone(), Arc::clone(&default_backend));
        for name in config.backends_in_use() {
            if !opened.contains_key(name) {
                opened.insert(name.to_string(), open_backend(name, &settings)?);
            }
        }

        let dispatcher = match (self.transport, config.notifications.enabled) {
            (Some(transport), true) => NotificationDispatcher::new(transport, config.retry_policy()),
            (None, true) => {
                NotificationDispatcher::new(Arc::new(NullTransport), config.retry_policy())
            }
            (_, false) => NotificationDispatcher::disabled(),
        };

        tracing::info!(
            default_backend = %config.default_backend,
            backends = opened.len(),
            domains = config.domains.len(),
            notifications = dispatcher.is_enabled(),
            "engine opened"
        );

        Ok(Engine {
            config,
            default_backend,
            backends: opened,
            dispatcher: Arc::new(dispatcher),
        })
    }
}

fn open_backend(
    name: &str,
    settings: &BackendSettings<'_>,
) -> Result<Arc<dyn StreamBackend>, EngineError> {
    let constructor = backends::lookup(name).ok_or_else(|| ConfigError::UnknownBackend {
        name: name.to_string(),
        scope: "engine".to_string(),
        known: backends::names().collect::<Vec<_>>().join(", "),
    })?;
    constructor(settings).map_err(|source| EngineError::Storage {
        backend: name.to_string(),
        source,
    })
}
