//! Durability mode for the append-log store.
//!
//! Defines when appended blocks and stream headers reach disk.

use serde::{Deserialize, Serialize};

/// Durability mode for append-log writes.
///
/// # Mode Comparison
///
/// | Mode | Files | fsync | Use Case |
/// |------|-------|-------|----------|
/// | None | no | no | Tests, local development |
/// | Buffered | yes | no | Survives process exit, not power loss |
/// | Strict | yes | every block and header | Production |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurabilityMode {
    /// No durability - all data lost when the store is dropped.
    ///
    /// No file I/O at all.
    #[default]
    None,

    /// Blocks and headers are written to files but never fsynced.
    ///
    /// The OS page cache decides when data reaches the medium.
    Buffered,

    /// fsync after every block append and every header write.
    ///
    /// An acknowledged append survives a crash.
    Strict,
}

impl DurabilityMode {
    /// Check if this mode writes files.
    ///
    /// Returns false for None mode, true for all others.
    pub fn requires_files(&self) -> bool {
        !matches!(self, DurabilityMode::None)
    }

    /// Check if this mode requires fsync on every write.
    ///
    /// Returns true only for Strict mode.
    pub fn requires_fsync(&self) -> bool {
        matches!(self, DurabilityMode::Strict)
    }

    /// Human-readable description of the mode.
    pub fn description(&self) -> &'static str {
        match self {
            DurabilityMode::None => "No durability (memory only)",
            DurabilityMode::Buffered => "Buffered files (no fsync)",
            DurabilityMode::Strict => "Sync fsync (safest, slowest)",
        }
    }
}
