//! Append-log backend
//!
//! - `persist`: file layout, recovery of torn tails and stale headers
//! - `store`: the [`AppendLogStore`] stream backend

mod persist;
pub mod store;

pub use store::{AppendLogStore, APPEND_LOG_BACKEND};
