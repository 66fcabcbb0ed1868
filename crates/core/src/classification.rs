//! Tri-state classification outcome

use serde::{Deserialize, Serialize};
use std::fmt;

/// Membership decision produced by a classification
///
/// `Unchanged` means "this event says nothing about membership". A
/// classification's final result is the latest non-`Unchanged` outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClassificationResult {
    /// No decision
    #[default]
    Unchanged,
    /// The entity is a member
    Include,
    /// The entity is not a member
    Exclude,
}

impl fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClassificationResult::Unchanged => "unchanged",
            ClassificationResult::Include => "include",
            ClassificationResult::Exclude => "exclude",
        };
        f.write_str(name)
    }
}
