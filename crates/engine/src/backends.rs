//! Static backend table
//!
//! Maps configuration names to constructors. The table is a `static` slice,
//! so it exists once for the life of the process and configuration can be
//! checked against it before anything is opened.
//!
//! Each entry also records whether the backend honours a file-backed
//! durability mode. The table store is an in-memory emulation and keeps
//! nothing across restarts.

use factlog_concurrency::LeaseConfig;
use factlog_core::StreamBackend;
use factlog_storage::{
    AppendLogStore, DurabilityMode, StorageError, TableStore, APPEND_LOG_BACKEND, TABLE_BACKEND,
};
use std::path::Path;
use std::sync::Arc;

/// Everything a backend constructor may need
#[derive(Debug, Clone, Copy)]
pub struct BackendSettings<'a> {
    /// Lease timing
    pub lease: LeaseConfig,
    /// Durability of file-backed stores
    pub durability: DurabilityMode,
    /// Storage root for file-backed stores
    pub path: Option<&'a Path>,
}

/// Backend constructor
pub type BackendConstructor =
    fn(&BackendSettings<'_>) -> Result<Arc<dyn StreamBackend>, StorageError>;

fn open_append_log(settings: &BackendSettings<'_>) -> Result<Arc<dyn StreamBackend>, StorageError> {
    let store = AppendLogStore::open(settings.path, settings.durability, settings.lease)?;
    Ok(Arc::new(store))
}

fn open_table(settings: &BackendSettings<'_>) -> Result<Arc<dyn StreamBackend>, StorageError> {
    Ok(Arc::new(TableStore::new(settings.lease)))
}

struct BackendEntry {
    name: &'static str,
    open: BackendConstructor,
    persistent: bool,
}

static BACKENDS: &[BackendEntry] = &[
    BackendEntry {
        name: APPEND_LOG_BACKEND,
        open: open_append_log,
        persistent: true,
    },
    BackendEntry {
        name: TABLE_BACKEND,
        open: open_table,
        persistent: false,
    },
];

fn entry(name: &str) -> Option<&'static BackendEntry> {
    BACKENDS.iter().find(|entry| entry.name == name)
}

/// Constructor registered under `name`
pub fn lookup(name: &str) -> Option<BackendConstructor> {
    entry(name).map(|entry| entry.open)
}

/// Whether `name` keeps its data on disk in file-backed durability modes
pub fn is_persistent(name: &str) -> bool {
    entry(name).map_or(false, |entry| entry.persistent)
}

/// Every registered backend name
pub fn names() -> impl Iterator<Item = &'static str> {
    BACKENDS.iter().map(|entry| entry.name)
}
