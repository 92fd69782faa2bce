//! Resource Resolver
//!
//! Turns a human-supplied token (name, numeric id or opaque id) into exactly
//! one resource by walking an ordered chain of lookup strategies, cheapest
//! first.

use super::field::FieldSource;
use super::manager::{Filter, Identifier, ResolutionOutcome, ResourceManager};
use crate::error::{BackendError, CommandError};

/// One link of the resolution chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    /// `get(token)`
    DirectGet,
    /// `get(token, filter)`
    FilteredGet,
    /// `get(int(token), filter)` for numeric tokens
    IntegerGet,
    /// `find(name_field = token, filter)`
    NameFind,
    /// `list()` and compare id and name fields
    ListScan,
}

impl Strategy {
    const CHAIN: [Strategy; 5] = [
        Strategy::DirectGet,
        Strategy::FilteredGet,
        Strategy::IntegerGet,
        Strategy::NameFind,
        Strategy::ListScan,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::DirectGet => "direct-get",
            Self::FilteredGet => "filtered-get",
            Self::IntegerGet => "integer-get",
            Self::NameFind => "name-find",
            Self::ListScan => "list-scan",
        }
    }
}

enum Step<R> {
    Resolved(R),
    Next,
}

/// Resolve `token` to exactly one resource managed by `manager`
///
/// `filter` carries extra query arguments (a scoping id, for instance) and is
/// passed to every strategy that accepts them.
pub async fn find_resource<M>(
    manager: &M,
    token: &Identifier,
    filter: &Filter,
) -> Result<M::Resource, CommandError>
where
    M: ResourceManager + ?Sized,
{
    for strategy in Strategy::CHAIN {
        tracing::trace!(
            "resolving {} '{}' via {}",
            manager.resource_kind(),
            token,
            strategy.name()
        );
        if let Step::Resolved(resource) = run_strategy(strategy, manager, token, filter).await? {
            tracing::debug!(
                "resolved {} '{}' via {}",
                manager.resource_kind(),
                token,
                strategy.name()
            );
            return Ok(resource);
        }
    }

    // The list scan always resolves or fails
    Err(not_found(manager, token))
}

async fn run_strategy<M>(
    strategy: Strategy,
    manager: &M,
    token: &Identifier,
    filter: &Filter,
) -> Result<Step<M::Resource>, CommandError>
where
    M: ResourceManager + ?Sized,
{
    match strategy {
        Strategy::DirectGet => Ok(found_or_next(manager.get(token).await)),
        Strategy::FilteredGet => {
            if filter.is_empty() {
                // Same call as the direct get
                return Ok(Step::Next);
            }
            Ok(found_or_next(manager.get_filtered(token, filter).await))
        }
        Strategy::IntegerGet => integer_get(manager, token, filter).await,
        Strategy::NameFind => name_find(manager, token, filter).await,
        Strategy::ListScan => list_scan(manager, token).await.map(Step::Resolved),
    }
}

fn found_or_next<R>(outcome: ResolutionOutcome<R>) -> Step<R> {
    match outcome {
        ResolutionOutcome::Found(resource) => Step::Resolved(resource),
        ResolutionOutcome::Fault(e) => {
            tracing::trace!("lookup fault ignored: {}", e);
            Step::Next
        }
        _ => Step::Next,
    }
}

async fn integer_get<M>(
    manager: &M,
    token: &Identifier,
    filter: &Filter,
) -> Result<Step<M::Resource>, CommandError>
where
    M: ResourceManager + ?Sized,
{
    let Some(n) = token.as_integer() else {
        return Ok(Step::Next);
    };
    let id = Identifier::Int(n);

    let outcome = if filter.is_empty() {
        manager.get(&id).await
    } else {
        manager.get_filtered(&id, filter).await
    };

    match outcome {
        ResolutionOutcome::Found(resource) => Ok(Step::Resolved(resource)),
        ResolutionOutcome::NotFound(_) => Ok(Step::Next),
        ResolutionOutcome::Fault(e) if e.is_not_found() => Ok(Step::Next),
        ResolutionOutcome::Fault(e) => {
            tracing::warn!("integer lookup of {} {} failed: {}", manager.resource_kind(), n, e);
            Err(e.into())
        }
        ResolutionOutcome::Ambiguous => Err(BackendError::no_unique_match(format!(
            "get of {} {} matched more than one resource",
            manager.resource_kind(),
            n
        ))
        .into()),
    }
}

async fn name_find<M>(
    manager: &M,
    token: &Identifier,
    filter: &Filter,
) -> Result<Step<M::Resource>, CommandError>
where
    M: ResourceManager + ?Sized,
{
    let mut query = filter.clone();
    query.insert(manager.name_field().to_string(), token.to_value());

    match manager.find(&query).await {
        ResolutionOutcome::Found(resource) => Ok(Step::Resolved(resource)),
        ResolutionOutcome::NotFound(_) => Err(not_found(manager, token)),
        ResolutionOutcome::Ambiguous => Err(ambiguous(manager, token)),
        ResolutionOutcome::Fault(e) => {
            tracing::debug!("find on {} unavailable: {}", manager.resource_kind(), e);
            Ok(Step::Next)
        }
    }
}

async fn list_scan<M>(manager: &M, token: &Identifier) -> Result<M::Resource, CommandError>
where
    M: ResourceManager + ?Sized,
{
    let needle = token.to_value();
    let id_field = manager.id_field();
    let name_field = manager.name_field();

    let mut matches = manager.list().await?.into_iter().filter(|resource| {
        resource.field(id_field).as_ref() == Some(&needle)
            || resource.field(name_field).as_ref() == Some(&needle)
    });

    match (matches.next(), matches.next()) {
        (Some(resource), None) => Ok(resource),
        (None, _) => Err(not_found(manager, token)),
        (Some(_), Some(_)) => Err(ambiguous(manager, token)),
    }
}

fn not_found<M: ResourceManager + ?Sized>(manager: &M, token: &Identifier) -> CommandError {
    CommandError::NotFound {
        kind: manager.resource_kind().to_string(),
        token: token.to_string(),
    }
}

fn ambiguous<M: ResourceManager + ?Sized>(manager: &M, token: &Identifier) -> CommandError {
    CommandError::Ambiguous {
        kind: manager.resource_kind().to_string(),
        token: token.to_string(),
    }
}
