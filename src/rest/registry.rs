//! Resource Kind Registry - Load resource kind definitions from JSON
//!
//! Kind definitions are embedded at compile time and describe how a REST
//! collection maps onto the manager contract: where items live in responses
//! and which fields carry the id and the name.

use crate::format::{get_item_properties, Formatter};
use crate::resource::FieldSource;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Embedded kind definitions (compiled into the binary)
const KIND_FILES: &[&str] = &[include_str!("../resources/kinds.json")];

/// Column shown when listing a kind
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnDef {
    pub header: String,
    pub field: String,
}

fn default_true() -> bool {
    true
}

/// Resource kind definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct KindDef {
    pub display_name: String,
    /// Lower-case singular name used in messages
    pub resource_kind: String,
    /// Path segment of the collection under the endpoint
    pub collection: String,
    /// Dot path of the item array in a collection response
    pub response_path: String,
    /// Key wrapping a single item in a get response, empty when unwrapped
    #[serde(default)]
    pub item_path: String,
    pub id_field: String,
    pub name_field: String,
    /// Whether the collection accepts field filters as query parameters
    #[serde(default = "default_true")]
    pub filterable: bool,
    #[serde(default)]
    pub columns: Vec<ColumnDef>,
}

impl KindDef {
    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.header.as_str()).collect()
    }

    /// One display row, reading each column from its `field`
    ///
    /// `formatters` is keyed by field name.
    pub fn row<R: FieldSource + ?Sized>(
        &self,
        item: &R,
        formatters: &HashMap<&str, Formatter>,
    ) -> Vec<Value> {
        let fields: Vec<&str> = self.columns.iter().map(|c| c.field.as_str()).collect();
        // Field names are used verbatim
        get_item_properties(item, &fields, &fields, formatters)
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct KindConfig {
    #[serde(default)]
    pub resources: HashMap<String, KindDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<KindConfig> = OnceLock::new();

/// Get the kind registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static KindConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = KindConfig {
            resources: HashMap::new(),
        };

        for content in KIND_FILES {
            let partial: KindConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded kind JSON: {}", e));
            final_config.resources.extend(partial.resources);
        }

        final_config
    })
}

/// Get a kind definition by key
pub fn get_kind(key: &str) -> Option<&'static KindDef> {
    get_registry().resources.get(key)
}

/// Get all kind keys, sorted
pub fn get_all_kind_keys() -> Vec<&'static str> {
    let mut keys: Vec<&'static str> = get_registry()
        .resources
        .keys()
        .map(|s| s.as_str())
        .collect();
    keys.sort_unstable();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_loads_successfully() {
        let registry = get_registry();
        assert!(!registry.resources.is_empty(), "Registry should have kinds");
    }

    #[test]
    fn test_servers_kind_exists() {
        let kind = get_kind("servers").expect("Servers kind should exist");
        assert_eq!(kind.resource_kind, "server");
        assert_eq!(kind.item_path, "server");
        assert!(kind.filterable);
    }

    #[test]
    fn test_volume_name_field_override() {
        let kind = get_kind("volumes").unwrap();
        assert_eq!(kind.name_field, "display_name");
    }

    #[test]
    fn test_flavors_not_filterable() {
        assert!(!get_kind("flavors").unwrap().filterable);
    }

    #[test]
    fn test_row_reads_column_fields() {
        let kind: KindDef = serde_json::from_value(serde_json::json!({
            "display_name": "Flavors",
            "resource_kind": "flavor",
            "collection": "flavors",
            "response_path": "flavors",
            "id_field": "id",
            "name_field": "name",
            "columns": [
                { "header": "ID", "field": "id" },
                { "header": "RAM", "field": "memory_mb" },
                { "header": "Disk", "field": "OS-FLV-EXT-DATA:ephemeral" }
            ]
        }))
        .unwrap();

        let item = serde_json::json!({"id": "7", "memory_mb": 2048, "OS-FLV-EXT-DATA:ephemeral": 0});
        assert_eq!(kind.headers(), vec!["ID", "RAM", "Disk"]);
        assert_eq!(
            kind.row(&item, &HashMap::new()),
            vec![serde_json::json!("7"), serde_json::json!(2048), serde_json::json!(0)]
        );

        fn doubled(value: &Value) -> Value {
            Value::from(value.as_i64().unwrap_or(0) * 2)
        }
        let mut formatters: HashMap<&str, Formatter> = HashMap::new();
        formatters.insert("memory_mb", doubled);
        assert_eq!(kind.row(&item, &formatters)[1], serde_json::json!(4096));
    }

    #[test]
    fn test_get_all_kind_keys() {
        let keys = get_all_kind_keys();
        assert!(keys.contains(&"projects"));
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}
