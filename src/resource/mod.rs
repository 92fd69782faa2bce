//! Resource abstraction layer
//!
//! Everything needed to turn user input into concrete resources and to
//! present collections of them consistently.
//!
//! # Architecture
//!
//! - [`field`] - Uniform field access over JSON mappings and typed resources
//! - [`manager`] - The capability trait backends implement (get/find/list)
//! - [`resolver`] - Resolves a name or id through an ordered strategy chain
//! - [`sort`] - Multi-key sorting from a `"key:dir,..."` specification
//!
//! # Example
//!
//! ```ignore
//! use cloudres::resource::{find_resource, sort_items, Filter};
//!
//! async fn show(manager: &RestManager) -> Result<(), CommandError> {
//!     let server = find_resource(manager, &"web-1".into(), &Filter::new()).await?;
//!     let servers = sort_items(manager.list().await?, Some("status,name:desc"))?;
//!     Ok(())
//! }
//! ```

pub mod field;
pub mod manager;
pub mod resolver;
pub mod sort;

pub use field::{compare_values, get_field, get_field_or, FieldSource};
pub use manager::{Filter, Identifier, ResolutionOutcome, ResourceManager};
pub use resolver::find_resource;
pub use sort::{find_min_match, parse_sort_spec, sort_items, SortDirection, SortKey};
