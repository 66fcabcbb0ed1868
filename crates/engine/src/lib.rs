//! Engine layer for factlog
//!
//! Wires the storage backends to the outside world:
//! - [`config`]: TOML configuration, validated against the backend table
//! - [`backends`]: static table of backend constructors
//! - [`stream`]: the [`EventStream`] facade and its read handle
//! - [`notify`]: best-effort notifications with bounded retry
//! - [`engine`]: the [`Engine`] tying them together

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backends;
pub mod config;
pub mod engine;
pub mod notify;
pub mod stream;

pub use config::{ConfigError, DomainConfig, EngineConfig};
pub use engine::{Engine, EngineBuilder, EngineError};
pub use notify::{
    DeliveryOutcome, MemoryTransport, Notification, NotificationDispatcher,
    NotificationTransport, NullTransport, RetryPolicy, TransportError, TransportErrorKind,
};
pub use stream::{EventStream, EventStreamReader};
