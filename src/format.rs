//! Display formatting
//!
//! Turns resources and field values into the strings and rows the CLI
//! prints.

use crate::resource::FieldSource;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Separator used by [`format_list`] when the caller has no preference
pub const DEFAULT_SEPARATOR: &str = ", ";

/// Formats a single field value for display
pub type Formatter = fn(&Value) -> Value;

/// Render a value as plain text: strings unquoted, everything else as JSON
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `key='value'` pairs sorted by key, comma separated
pub fn format_dict(data: &Map<String, Value>) -> String {
    let mut keys: Vec<&String> = data.keys().collect();
    keys.sort();
    keys.iter()
        .map(|k| format!("{}='{}'", k, display_value(&data[k.as_str()])))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Sorted strings joined by `separator`
pub fn format_list<S: AsRef<str>>(data: &[S], separator: &str) -> String {
    let mut items: Vec<&str> = data.iter().map(|s| s.as_ref()).collect();
    items.sort_unstable();
    items.join(separator)
}

/// One [`format_dict`] line per mapping
pub fn format_list_of_dicts(data: &[Map<String, Value>]) -> String {
    data.iter().map(format_dict).collect::<Vec<_>>().join("\n")
}

/// Extract a display row from a resource
///
/// Column names are lower-cased with spaces turned into underscores to find
/// the field, except for names listed in `mixed_case_fields`. Absent fields
/// show as an empty string. `formatters` is keyed by column name.
pub fn get_item_properties<R: FieldSource + ?Sized>(
    item: &R,
    fields: &[&str],
    mixed_case_fields: &[&str],
    formatters: &HashMap<&str, Formatter>,
) -> Vec<Value> {
    fields
        .iter()
        .map(|column| {
            let field_name = if mixed_case_fields.contains(column) {
                column.replace(' ', "_")
            } else {
                column.to_lowercase().replace(' ', "_")
            };
            let data = item
                .field(&field_name)
                .unwrap_or_else(|| Value::String(String::new()));
            match formatters.get(column) {
                Some(format) => format(&data),
                None => data,
            }
        })
        .collect()
}
