//! REST backend adapter
//!
//! A generic manager over JSON REST collections, so the resolver and the
//! pollers can be used against a live API.
//!
//! # Module Structure
//!
//! - [`http`] - HTTP client, maps response statuses to backend failure kinds
//! - [`registry`] - Embedded resource kind definitions
//! - [`manager`] - [`RestManager`], the `ResourceManager` implementation
//!
//! # Example
//!
//! ```ignore
//! use cloudres::rest::RestManager;
//! use cloudres::resource::{find_resource, Filter};
//!
//! async fn example() -> Result<(), cloudres::CommandError> {
//!     let servers = RestManager::new("https://compute.example.com/v2.1", None, "servers")?;
//!     let server = find_resource(&servers, &"web-1".into(), &Filter::new()).await?;
//!     Ok(())
//! }
//! ```

pub mod http;
pub mod manager;
pub mod registry;

pub use http::RestHttpClient;
pub use manager::{PaginatedResult, RestManager};
pub use registry::{get_all_kind_keys, get_kind, ColumnDef, KindDef};
