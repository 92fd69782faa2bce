//! REST Manager
//!
//! Implements the manager contract for one resource kind over a JSON REST
//! collection:
//!
//! - `get`   -> `GET {endpoint}/{collection}/{id}`
//! - `find`  -> `GET {endpoint}/{collection}?{filter}`
//! - `list`  -> `GET {endpoint}/{collection}`, following `nextPageToken`

use super::http::RestHttpClient;
use super::registry::{get_kind, KindDef};
use crate::error::BackendError;
use crate::resource::{Filter, Identifier, ResolutionOutcome, ResourceManager};
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

/// Result of paginated fetch
pub struct PaginatedResult {
    pub items: Vec<Value>,
    pub next_token: Option<String>,
}

/// Manager for one resource kind behind a REST endpoint
#[derive(Clone)]
pub struct RestManager {
    http: RestHttpClient,
    endpoint: Url,
    kind: KindDef,
}

impl RestManager {
    /// Create a manager for the registered kind `kind_key`
    pub fn new(endpoint: &str, token: Option<String>, kind_key: &str) -> Result<Self, BackendError> {
        let Some(kind) = get_kind(kind_key) else {
            return Err(BackendError::new(
                "UnknownKind",
                format!("Unknown resource kind: {}", kind_key),
            ));
        };
        let endpoint = Url::parse(endpoint)
            .map_err(|e| BackendError::new("InvalidEndpoint", format!("{}: {}", endpoint, e)))?;
        Self::with_kind(RestHttpClient::new(token)?, endpoint, kind.clone())
    }

    /// Create a manager from an explicit kind definition
    pub fn with_kind(http: RestHttpClient, endpoint: Url, kind: KindDef) -> Result<Self, BackendError> {
        if endpoint.cannot_be_a_base() {
            return Err(BackendError::new(
                "InvalidEndpoint",
                format!("{} cannot hold resource paths", endpoint),
            ));
        }
        Ok(Self { http, endpoint, kind })
    }

    pub fn kind(&self) -> &KindDef {
        &self.kind
    }

    // =========================================================================
    // URL helpers
    // =========================================================================

    /// Build the collection URL, with an optional trailing item segment
    fn resource_url(&self, id: Option<&Identifier>) -> Result<Url, BackendError> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                BackendError::new("InvalidEndpoint", self.endpoint.to_string())
            })?;
            segments.pop_if_empty().push(&self.kind.collection);
            if let Some(id) = id {
                segments.push(&id.to_string());
            }
        }
        Ok(url)
    }

    // =========================================================================
    // Fetching
    // =========================================================================

    /// Fetch a single resource by id
    pub async fn show(&self, id: &Identifier) -> Result<Value, BackendError> {
        self.show_filtered(id, &Filter::new()).await
    }

    async fn show_filtered(&self, id: &Identifier, filter: &Filter) -> Result<Value, BackendError> {
        let mut url = self.resource_url(Some(id))?;
        add_query_params(&mut url, filter, None);
        let response = self.http.get(&url).await?;
        self.unwrap_item(response)
    }

    fn unwrap_item(&self, mut response: Value) -> Result<Value, BackendError> {
        if self.kind.item_path.is_empty() {
            return Ok(response);
        }
        match response.get_mut(&self.kind.item_path) {
            Some(item) => Ok(item.take()),
            None => Err(BackendError::new(
                "InvalidResponse",
                format!("response has no '{}' member", self.kind.item_path),
            )),
        }
    }

    /// Fetch one page of the collection
    pub async fn fetch_page(
        &self,
        filter: &Filter,
        page_token: Option<&str>,
    ) -> Result<PaginatedResult, BackendError> {
        let mut url = self.resource_url(None)?;
        add_query_params(&mut url, filter, page_token);

        let response = self.http.get(&url).await?;
        let items = extract_items(&response, &self.kind.response_path);

        let next_token = response
            .get("nextPageToken")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Ok(PaginatedResult { items, next_token })
    }

    /// Fetch the whole collection (auto-paginate)
    pub async fn fetch_all(&self, filter: &Filter) -> Result<Vec<Value>, BackendError> {
        let mut all_items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let result = self.fetch_page(filter, page_token.as_deref()).await?;
            all_items.extend(result.items);

            if result.next_token.is_none() {
                break;
            }
            page_token = result.next_token;
        }

        tracing::debug!("fetched {} {} items", all_items.len(), self.kind.resource_kind);
        Ok(all_items)
    }
}

#[async_trait]
impl ResourceManager for RestManager {
    type Resource = Value;

    fn resource_kind(&self) -> &str {
        &self.kind.resource_kind
    }

    fn id_field(&self) -> &str {
        &self.kind.id_field
    }

    fn name_field(&self) -> &str {
        &self.kind.name_field
    }

    async fn get(&self, id: &Identifier) -> ResolutionOutcome<Value> {
        ResolutionOutcome::from_result(self.show(id).await)
    }

    async fn get_filtered(&self, id: &Identifier, filter: &Filter) -> ResolutionOutcome<Value> {
        if !self.kind.filterable {
            return ResolutionOutcome::Fault(BackendError::unsupported("get"));
        }
        ResolutionOutcome::from_result(self.show_filtered(id, filter).await)
    }

    async fn find(&self, filter: &Filter) -> ResolutionOutcome<Value> {
        if !self.kind.filterable {
            return ResolutionOutcome::Fault(BackendError::unsupported("find"));
        }
        let items = match self.fetch_all(filter).await {
            Ok(items) => items,
            Err(e) => return ResolutionOutcome::Fault(e),
        };

        // Servers may ignore filters they don't know; check client-side too
        let mut matched: Vec<Value> = items
            .into_iter()
            .filter(|item| filter.iter().all(|(k, v)| item.get(k) == Some(v)))
            .collect();

        match matched.len() {
            0 => ResolutionOutcome::NotFound(None),
            1 => ResolutionOutcome::Found(matched.remove(0)),
            _ => ResolutionOutcome::Ambiguous,
        }
    }

    async fn list(&self) -> Result<Vec<Value>, BackendError> {
        self.fetch_all(&Filter::new()).await
    }
}

/// Append filter values (and the page token) as query parameters
fn add_query_params(url: &mut Url, params: &Filter, page_token: Option<&str>) {
    if params.is_empty() && page_token.is_none() {
        return;
    }

    let mut query = url.query_pairs_mut();
    for (key, value) in params {
        match value {
            Value::String(s) => {
                query.append_pair(key, s);
            }
            Value::Number(n) => {
                query.append_pair(key, &n.to_string());
            }
            Value::Bool(b) => {
                query.append_pair(key, &b.to_string());
            }
            Value::Array(arr) => {
                for item in arr {
                    if let Value::String(s) = item {
                        query.append_pair(key, s);
                    }
                }
            }
            _ => {}
        }
    }
    if let Some(token) = page_token {
        query.append_pair("pageToken", token);
    }
}

/// Extract items from response using the response_path
fn extract_items(response: &Value, path: &str) -> Vec<Value> {
    if path.is_empty() {
        return response.as_array().cloned().unwrap_or_default();
    }

    let mut current = response;
    for part in path.split('.') {
        current = match current.get(part) {
            Some(v) => v,
            None => return vec![],
        };
    }

    current.as_array().cloned().unwrap_or_default()
}
