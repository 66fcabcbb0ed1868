//! Write context: audit metadata carried alongside an appended event
//!
//! The context is orthogonal to the payload. It is persisted with every
//! event and surfaced in notifications, but replay never interprets it.

use serde::{Deserialize, Serialize};

/// Audit metadata for one append
///
/// All fields are optional. Use the builder-style setters:
///
/// ```
/// use factlog_core::WriteContext;
///
/// let ctx = WriteContext::new()
///     .with_who("teller-7")
///     .with_source("branch-api")
///     .with_correlation_id("req-42");
/// assert_eq!(ctx.who.as_deref(), Some("teller-7"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteContext {
    /// Who caused the write (user, service principal)
    pub who: Option<String>,
    /// Originating system or channel
    pub source: Option<String>,
    /// Free-text commentary
    pub commentary: Option<String>,
    /// Identifier tying together every write caused by one request
    pub correlation_id: Option<String>,
    /// Identifier of the message or event that directly caused this write
    pub causation_id: Option<String>,
}

impl WriteContext {
    /// Empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `who`
    pub fn with_who(mut self, who: impl Into<String>) -> Self {
        self.who = Some(who.into());
        self
    }

    /// Set `source`
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set `commentary`
    pub fn with_commentary(mut self, commentary: impl Into<String>) -> Self {
        self.commentary = Some(commentary.into());
        self
    }

    /// Set `correlation_id`
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Set `causation_id`
    pub fn with_causation_id(mut self, causation_id: impl Into<String>) -> Self {
        self.causation_id = Some(causation_id.into());
        self
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.who.is_none()
            && self.source.is_none()
            && self.commentary.is_none()
            && self.correlation_id.is_none()
            && self.causation_id.is_none()
    }
}
