//! Main entry point for factlog.
//!
//! This module provides the `Factlog` struct, which owns the engine (backends
//! plus notification dispatch) and the replay registries.

use crate::error::Result;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use factlog_core::{EntityType, StreamIdentity, WriteContext};
use factlog_engine::{
    DomainConfig, Engine, EngineBuilder, EngineConfig, EventStream, EventStreamReader,
    NotificationDispatcher, NotificationTransport,
};
use factlog_replay::{Classification, ClassificationState, Classifier, ProjectionState, Projector};
use factlog_storage::DurabilityMode;
use std::any::{Any, TypeId};
use std::path::{Path, PathBuf};
use std::sync::Arc;

type Cached = Arc<dyn Any + Send + Sync>;

/// The factlog store.
///
/// Create one with [`Factlog::ephemeral`], [`Factlog::open`] or
/// [`Factlog::builder`].
///
/// # Example
///
/// ```ignore
/// use factlog::prelude::*;
///
/// let log = Factlog::ephemeral()?;
/// let account = log.stream_for("Bank", "Account", "ACC-1")?;
/// account.append_event(&Opened { owner: "alice".into() }, 0, ExistenceConstraint::MustBeNew)?;
///
/// let balance: Balance = log.project(account.identity(), None)?;
/// ```
pub struct Factlog {
    engine: Engine,
    projectors: DashMap<TypeId, Cached>,
    classifiers: DashMap<TypeId, Cached>,
}

impl std::fmt::Debug for Factlog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factlog")
            .field("engine", &self.engine)
            .field("projectors", &self.projectors.len())
            .field("classifiers", &self.classifiers.len())
            .finish()
    }
}

impl Factlog {
    /// Open with the TOML configuration at `config_path`.
    pub fn open(config_path: impl AsRef<Path>) -> Result<Self> {
        let config = EngineConfig::from_file(config_path)?;
        FactlogBuilder::new().config(config).open()
    }

    /// In-memory store with default settings and no notification transport.
    ///
    /// Nothing touches disk; all data is lost on drop.
    pub fn ephemeral() -> Result<Self> {
        FactlogBuilder::new().open()
    }

    /// Create a builder.
    pub fn builder() -> FactlogBuilder {
        FactlogBuilder::new()
    }

    /// Underlying engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Configuration in effect.
    pub fn config(&self) -> &EngineConfig {
        self.engine.config()
    }

    /// Shared notification dispatcher.
    pub fn dispatcher(&self) -> &Arc<NotificationDispatcher> {
        self.engine.dispatcher()
    }

    /// Write handle on `identity`.
    pub fn stream(&self, identity: StreamIdentity) -> EventStream {
        self.engine.stream(identity)
    }

    /// Write handle on `domain/entity_type/instance_key`.
    pub fn stream_for(
        &self,
        domain: &str,
        entity_type: &str,
        instance_key: &str,
    ) -> Result<EventStream> {
        Ok(self.stream(StreamIdentity::new(domain, entity_type, instance_key)?))
    }

    /// Write handle on `identity` carrying `context`.
    pub fn stream_with_context(&self, identity: StreamIdentity, context: WriteContext) -> EventStream {
        self.engine.stream_with_context(identity, context)
    }

    /// Read handle on `identity`.
    pub fn reader(&self, identity: StreamIdentity) -> EventStreamReader {
        self.engine.reader(identity)
    }

    /// Instance keys of `entity_type`, optionally restricted to streams
    /// created on or before `as_of`.
    pub fn instance_keys(
        &self,
        entity_type: &EntityType,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>> {
        Ok(self.engine.instance_keys(entity_type, as_of)?)
    }

    /// Replay `identity` into `S` and publish `ProjectionCompleted`.
    pub fn project<S: ProjectionState>(
        &self,
        identity: &StreamIdentity,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<S> {
        let projector = self.projector::<S>()?;
        let state = projector.process(&self.reader(identity.clone()), as_of)?;
        self.dispatcher().projection_completed(
            identity,
            S::NAME,
            as_of,
            state.current_sequence_number(),
        );
        Ok(state)
    }

    /// Resume `seed` on `identity` and publish `ProjectionCompleted`.
    pub fn project_from<S: ProjectionState>(
        &self,
        identity: &StreamIdentity,
        seed: S,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<S> {
        let projector = self.projector::<S>()?;
        let state = projector.process_from(&self.reader(identity.clone()), seed, as_of)?;
        self.dispatcher().projection_completed(
            identity,
            S::NAME,
            as_of,
            state.current_sequence_number(),
        );
        Ok(state)
    }

    /// Classify `identity` with the default-parameterised `C` and publish
    /// `ClassificationCompleted`.
    pub fn classify<C: Classification + Default>(
        &self,
        identity: &StreamIdentity,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<ClassificationState> {
        let classifier = self.classifier::<C>()?;
        self.run_classifier(&classifier, identity, as_of)
    }

    /// Classify `identity` with an explicitly parameterised rule.
    ///
    /// The registry is rebuilt for each call; prefer [`classify`](Self::classify)
    /// for rules without parameters.
    pub fn classify_with<C: Classification>(
        &self,
        definition: C,
        identity: &StreamIdentity,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<ClassificationState> {
        let classifier = Classifier::new(definition)?;
        self.run_classifier(&classifier, identity, as_of)
    }

    fn run_classifier<C: Classification>(
        &self,
        classifier: &Classifier<C>,
        identity: &StreamIdentity,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<ClassificationState> {
        let state = classifier.classify(&self.reader(identity.clone()), as_of)?;
        self.dispatcher().classification_completed(
            identity,
            C::NAME,
            state.current_result,
            as_of,
            state.current_sequence_number,
        );
        Ok(state)
    }

    /// Projector for `S`, built on first use and cached.
    fn projector<S: ProjectionState>(&self) -> Result<Projector<S>> {
        let key = TypeId::of::<S>();
        if let Some(cached) = self.projectors.get(&key) {
            if let Ok(projector) = Arc::clone(cached.value()).downcast::<Projector<S>>() {
                return Ok((*projector).clone());
            }
        }
        let projector = Projector::<S>::new()?;
        self.projectors.insert(key, Arc::new(projector.clone()));
        Ok(projector)
    }

    /// Classifier for the default `C`, built on first use and cached.
    fn classifier<C: Classification + Default>(&self) -> Result<Classifier<C>> {
        let key = TypeId::of::<C>();
        if let Some(cached) = self.classifiers.get(&key) {
            if let Ok(classifier) = Arc::clone(cached.value()).downcast::<Classifier<C>>() {
                return Ok((*classifier).clone());
            }
        }
        let classifier = Classifier::new(C::default())?;
        self.classifiers.insert(key, Arc::new(classifier.clone()));
        Ok(classifier)
    }
}

/// Builder for [`Factlog`].
///
/// # Example
///
/// ```ignore
/// // Durable, fsync on every append
/// let log = Factlog::builder().path("./data").strict().open()?;
///
/// // Route one domain to the table backend
/// let log = Factlog::builder()
///     .domain(DomainConfig { name: "Ledger".into(), backend: Some("table".into()), maintain_index: true })
///     .open()?;
/// ```
#[derive(Default)]
pub struct FactlogBuilder {
    config: EngineConfig,
    path: Option<PathBuf>,
    transport: Option<Arc<dyn NotificationTransport>>,
}

impl std::fmt::Debug for FactlogBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactlogBuilder")
            .field("config", &self.config)
            .field("path", &self.path)
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

impl FactlogBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the storage directory of the append-log backend.
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Keep everything in memory.
    pub fn no_durability(mut self) -> Self {
        self.config.storage.durability = DurabilityMode::None;
        self
    }

    /// Write every append to disk without fsync.
    pub fn buffered(mut self) -> Self {
        self.config.storage.durability = DurabilityMode::Buffered;
        self
    }

    /// Write and fsync every append.
    pub fn strict(mut self) -> Self {
        self.config.storage.durability = DurabilityMode::Strict;
        self
    }

    /// Backend for domains without their own entry.
    pub fn default_backend(mut self, backend: impl Into<String>) -> Self {
        self.config.default_backend = backend.into();
        self
    }

    /// Add a per-domain entry.
    pub fn domain(mut self, domain: DomainConfig) -> Self {
        self.config.domains.push(domain);
        self
    }

    /// Publish notifications through `transport`.
    pub fn transport(mut self, transport: Arc<dyn NotificationTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Validate the configuration and open the store.
    pub fn open(self) -> Result<Factlog> {
        let mut config = self.config;
        if let Some(path) = self.path {
            config.storage.path = Some(path);
        }

        let mut engine = EngineBuilder::new().config(config);
        if let Some(transport) = self.transport {
            engine = engine.transport(transport);
        }

        Ok(Factlog {
            engine: engine.open()?,
            projectors: DashMap::new(),
            classifiers: DashMap::new(),
        })
    }
}
