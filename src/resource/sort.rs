//! Collection Sorter
//!
//! Multi-key ordering driven by a `"key1:dir1,key2:dir2,..."` specification.

use super::field::{compare_values, get_field, FieldSource};
use super::manager::Filter;
use crate::error::CommandError;
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One `(field, direction)` pair of a sort specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

/// Parse a sort specification
///
/// The direction is optional and defaults to ascending. A blank specification
/// yields no keys.
pub fn parse_sort_spec(spec: &str) -> Result<Vec<SortKey>, CommandError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Ok(Vec::new());
    }

    spec.split(',')
        .map(|part| {
            let Some((field, direction)) = part.split_once(':') else {
                return Ok(SortKey {
                    field: part.to_string(),
                    direction: SortDirection::Asc,
                });
            };
            if field.is_empty() {
                return Err(CommandError::InvalidSortKey);
            }
            let direction = match direction {
                "asc" => SortDirection::Asc,
                "desc" => SortDirection::Desc,
                "" => {
                    return Err(CommandError::InvalidSortDirection {
                        key: field.to_string(),
                        direction: "<empty string>".to_string(),
                    })
                }
                other => {
                    return Err(CommandError::InvalidSortDirection {
                        key: field.to_string(),
                        direction: other.to_string(),
                    })
                }
            };
            Ok(SortKey {
                field: field.to_string(),
                direction,
            })
        })
        .collect()
}

/// Sort `items` according to `sort_spec`
///
/// Keys are applied last to first, one stable pass each, so the first listed
/// key ends up primary and later keys break ties. A missing field on any item
/// fails the whole sort.
pub fn sort_items<R: FieldSource>(
    items: Vec<R>,
    sort_spec: Option<&str>,
) -> Result<Vec<R>, CommandError> {
    let keys = match sort_spec {
        Some(spec) => parse_sort_spec(spec)?,
        None => Vec::new(),
    };
    if keys.is_empty() {
        return Ok(items);
    }

    let mut items = items;
    for key in keys.iter().rev() {
        let mut keyed = items
            .into_iter()
            .map(|item| get_field(&item, &key.field).map(|value| (value, item)))
            .collect::<Result<Vec<(Value, R)>, _>>()?;

        // `sort_by` is stable; comparing b to a keeps equal items in order
        match key.direction {
            SortDirection::Asc => keyed.sort_by(|(a, _), (b, _)| compare_values(a, b)),
            SortDirection::Desc => keyed.sort_by(|(a, _), (b, _)| compare_values(b, a)),
        }

        items = keyed.into_iter().map(|(_, item)| item).collect();
    }

    Ok(items)
}

/// Keep the items meeting every minimum in `minimums`, sorted by `sort_spec`
///
/// An item qualifies when each named field is greater than or equal to its
/// minimum value.
pub fn find_min_match<R: FieldSource>(
    items: Vec<R>,
    sort_spec: Option<&str>,
    minimums: &Filter,
) -> Result<Vec<R>, CommandError> {
    let mut kept = Vec::with_capacity(items.len());
    for item in items {
        let mut qualifies = true;
        for (field, minimum) in minimums {
            let value = get_field(&item, field)?;
            if compare_values(minimum, &value) == Ordering::Greater {
                qualifies = false;
                break;
            }
        }
        if qualifies {
            kept.push(item);
        }
    }
    sort_items(kept, sort_spec)
}
