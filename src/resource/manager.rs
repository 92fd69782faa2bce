//! Manager capability
//!
//! Backends expose some subset of get/find/list. Every single-resource
//! operation reports a [`ResolutionOutcome`] so the resolver never has to
//! guess what a failure meant.

use super::field::FieldSource;
use crate::error::BackendError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;

/// Extra query arguments passed alongside a token (e.g. a scoping id)
pub type Filter = Map<String, Value>;

/// Human-supplied identifier, ambiguous between id and name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Int(i64),
    Text(String),
}

impl Identifier {
    /// Integer form of the token: an integer, or a string made only of digits
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Text(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
                s.parse().ok()
            }
            Self::Text(_) => None,
        }
    }

    /// JSON form, used for filters and for comparing against resource fields
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(n) => Value::from(*n),
            Self::Text(s) => Value::from(s.clone()),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for Identifier {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<i64> for Identifier {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Outcome of a single-resource manager operation
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome<R> {
    Found(R),
    /// No such resource; carries the backend's failure when there was one
    NotFound(Option<BackendError>),
    Ambiguous,
    /// Anything else: unsupported operation, transport fault, backend bug
    Fault(BackendError),
}

impl<R> ResolutionOutcome<R> {
    pub fn found(self) -> Option<R> {
        match self {
            Self::Found(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Fold a plain backend result into an outcome
    ///
    /// Not-found and no-unique-match kinds become explicit variants; every
    /// other failure is a fault.
    pub fn from_result(result: Result<R, BackendError>) -> Self {
        match result {
            Ok(r) => Self::Found(r),
            Err(e) if e.is_not_found() => Self::NotFound(Some(e)),
            Err(e) if e.kind() == crate::error::NO_UNIQUE_MATCH => Self::Ambiguous,
            Err(e) => Self::Fault(e),
        }
    }
}

/// Capability handle over one kind of remote resource
///
/// All operations have an "unsupported" default so adapters implement only
/// what their backend offers.
#[async_trait]
pub trait ResourceManager: Send + Sync {
    type Resource: FieldSource + Send + Sync;

    /// Lower-case kind name used in messages ("project", "server"...)
    fn resource_kind(&self) -> &str;

    /// Field holding the resource id
    fn id_field(&self) -> &str {
        "id"
    }

    /// Field holding the resource name; override for kinds that name
    /// themselves differently
    fn name_field(&self) -> &str {
        "name"
    }

    async fn get(&self, _id: &Identifier) -> ResolutionOutcome<Self::Resource> {
        ResolutionOutcome::Fault(BackendError::unsupported("get"))
    }

    async fn get_filtered(
        &self,
        _id: &Identifier,
        _filter: &Filter,
    ) -> ResolutionOutcome<Self::Resource> {
        ResolutionOutcome::Fault(BackendError::unsupported("get"))
    }

    async fn find(&self, _filter: &Filter) -> ResolutionOutcome<Self::Resource> {
        ResolutionOutcome::Fault(BackendError::unsupported("find"))
    }

    async fn list(&self) -> Result<Vec<Self::Resource>, BackendError> {
        Err(BackendError::unsupported("list"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identifier_as_integer() {
        assert_eq!(Identifier::Int(7).as_integer(), Some(7));
        assert_eq!(Identifier::from("42").as_integer(), Some(42));
        assert_eq!(Identifier::from("").as_integer(), None);
        assert_eq!(Identifier::from("-1").as_integer(), None);
        assert_eq!(Identifier::from("4a").as_integer(), None);
        // Too large for i64
        assert_eq!(Identifier::from("99999999999999999999").as_integer(), None);
    }

    #[test]
    fn test_identifier_to_value() {
        assert_eq!(Identifier::Int(3).to_value(), json!(3));
        assert_eq!(Identifier::from("web").to_value(), json!("web"));
        assert_eq!(Identifier::from("web").to_string(), "web");
    }

    #[test]
    fn test_outcome_from_result() {
        let ok: Result<i32, BackendError> = Ok(1);
        assert_eq!(ResolutionOutcome::from_result(ok), ResolutionOutcome::Found(1));

        let gone: Result<i32, BackendError> = Err(BackendError::from_status(404, "x"));
        assert_eq!(
            ResolutionOutcome::from_result(gone),
            ResolutionOutcome::NotFound(Some(BackendError::from_status(404, "x")))
        );

        let many: Result<i32, BackendError> = Err(BackendError::no_unique_match("x"));
        assert_eq!(ResolutionOutcome::from_result(many), ResolutionOutcome::Ambiguous);

        let down: Result<i32, BackendError> = Err(BackendError::from_status(503, "x"));
        assert!(matches!(
            ResolutionOutcome::from_result(down),
            ResolutionOutcome::Fault(_)
        ));
    }
}
