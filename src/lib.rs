//! cloudres - resource helpers for cloud command-line clients
//!
//! Resolves user-supplied names or ids into exactly one resource, polls
//! asynchronous operations until they settle, and sorts collections with a
//! `"key:dir,..."` specification.

pub mod config;
pub mod error;
pub mod format;
pub mod resource;
pub mod rest;
pub mod util;
pub mod wait;

pub use error::{BackendError, CommandError};
pub use resource::{find_resource, sort_items, FieldSource, Filter, Identifier, ResourceManager};
pub use wait::{wait_for_delete, wait_for_status, DeleteWait, StatusWait, WaitOutcome};
