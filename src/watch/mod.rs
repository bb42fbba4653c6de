// src/watch/mod.rs

//! File watching and change filtering.
//!
//! This module is responsible for:
//! - Keeping a notification source registered on every directory of the
//!   watched trees ([`watcher`]).
//! - Deciding which changes are build-relevant ([`patterns`]).
//! - Collapsing bursts of relevant changes into one event ([`filter`]).
//!
//! It knows nothing about building or running; it only produces settled
//! change events for the next stage.

pub mod filter;
pub mod path_utils;
pub mod patterns;
pub mod source;
pub mod watcher;

pub use filter::ChangeFilter;
pub use patterns::{build_globset, FilterRules, Verdict};
pub use source::{NotificationSource, NotifySource};
pub use watcher::{DirectoryWatcher, WatchSet};
