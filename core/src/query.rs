//! Queries and mutations on top of the request wrapper and the cache.
//!
//! # Design
//! `QueryClient` ties together the stateless `ApiClient`, a `QueryCache`
//! and a `Transport`. It hands out two kinds of handles:
//!
//! - `Query<T>` reads through the cache. Fresh data short-circuits the
//!   network; stale or missing data costs exactly one request, whose result
//!   overwrites the entry. Concurrent fetches of one key are not merged:
//!   whichever response lands last is what the cache holds.
//! - `Mutation<T>` always goes to the network and, only on success,
//!   invalidates its targets.
//!
//! Errors are stored as they come back from the request layer. Nothing here
//! retries or reclassifies them.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::watch;

use crate::cache::{Invalidate, QueryCache, QueryKey};
use crate::client::ApiClient;
use crate::error::ApiError;
use crate::request::ApiRequest;
use crate::transport::Transport;

/// What a consumer sees when it reads a query.
#[derive(Debug)]
pub struct QueryState<T> {
    pub data: Option<Arc<T>>,
    pub error: Option<ApiError>,
    pub is_loading: bool,
    /// The data was invalidated and will be replaced on the next fetch.
    pub is_stale: bool,
    /// `data` is the configured placeholder, not a server response.
    pub is_placeholder: bool,
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            is_loading: self.is_loading,
            is_stale: self.is_stale,
            is_placeholder: self.is_placeholder,
        }
    }
}

impl<T> QueryState<T> {
    fn idle() -> Self {
        Self {
            data: None,
            error: None,
            is_loading: false,
            is_stale: false,
            is_placeholder: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.data.is_some() && !self.is_placeholder
    }
}

/// Entry point for queries and mutations.
#[derive(Clone)]
pub struct QueryClient {
    api: ApiClient,
    cache: QueryCache,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient").field("api", &self.api).finish_non_exhaustive()
    }
}

impl QueryClient {
    pub fn new(api: ApiClient, cache: QueryCache, transport: Arc<dyn Transport>) -> Self {
        Self { api, cache, transport }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Execute `request` once and parse the response. Bypasses the cache.
    pub async fn send<T: DeserializeOwned>(&self, request: &ApiRequest<T>) -> Result<T, ApiError> {
        let http = request.http().clone();
        tracing::debug!(method = %http.method, url = %http.path, "sending request");
        let response = self.transport.execute(http).await?;
        tracing::debug!(status = response.status, "received response");
        request.parse(response)
    }

    /// A cached read of `request` under `key`.
    pub fn query<T>(&self, key: QueryKey, request: Result<ApiRequest<T>, ApiError>) -> Query<T> {
        Query {
            client: self.clone(),
            key,
            request,
            enabled: true,
            placeholder: None,
        }
    }

    /// A write that invalidates `invalidates` once it succeeds.
    pub fn mutation<T>(
        &self,
        request: Result<ApiRequest<T>, ApiError>,
        invalidates: Vec<Invalidate>,
    ) -> Mutation<T> {
        Mutation {
            client: self.clone(),
            request,
            invalidates,
            clear_cache: false,
        }
    }
}

/// Handle to one cached query.
pub struct Query<T> {
    client: QueryClient,
    key: QueryKey,
    request: Result<ApiRequest<T>, ApiError>,
    enabled: bool,
    placeholder: Option<Arc<T>>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            key: self.key.clone(),
            request: self.request.clone(),
            enabled: self.enabled,
            placeholder: self.placeholder.clone(),
        }
    }
}

impl<T> Query<T>
where
    T: DeserializeOwned + Any + Send + Sync,
{
    /// A disabled query never touches the network and reports no data and
    /// no error.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Data to report until the first response arrives.
    pub fn placeholder(mut self, value: T) -> Self {
        self.placeholder = Some(Arc::new(value));
        self
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current state as recorded in the cache.
    pub fn state(&self) -> QueryState<T> {
        if !self.enabled {
            return QueryState::idle();
        }
        let mut state = match self.client.cache.get(&self.key) {
            Some(entry) => QueryState {
                data: entry.data.and_then(|d| d.downcast::<T>().ok()),
                error: entry.error,
                is_loading: entry.is_loading,
                is_stale: entry.is_stale,
                is_placeholder: false,
            },
            None => QueryState::idle(),
        };
        // An error is a response too; the placeholder only covers the wait.
        if state.data.is_none() && state.error.is_none() {
            if let Some(placeholder) = &self.placeholder {
                state.data = Some(Arc::clone(placeholder));
                state.is_placeholder = true;
            }
        }
        state
    }

    /// Return cached data if it is fresh, otherwise fetch it.
    pub async fn fetch(&self) -> QueryState<T> {
        if !self.enabled {
            tracing::trace!(key = ?self.key, "query disabled");
            return self.state();
        }
        if self.client.cache.is_fresh(&self.key) {
            tracing::trace!(key = ?self.key, "cache hit");
            return self.state();
        }
        self.refetch().await
    }

    /// Fetch from the network regardless of what the cache holds.
    pub async fn refetch(&self) -> QueryState<T> {
        if !self.enabled {
            return self.state();
        }
        let cache = &self.client.cache;
        match &self.request {
            Ok(request) => {
                cache.set_loading(&self.key);
                match self.client.send(request).await {
                    Ok(value) => cache.set_data(&self.key, value),
                    Err(err) => cache.set_error(&self.key, err),
                }
            }
            Err(err) => cache.set_error(&self.key, err.clone()),
        }
        self.state()
    }

    /// Receiver that changes whenever this query's cache entry does.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.client.cache.subscribe(&self.key)
    }
}

/// Handle to one write request.
pub struct Mutation<T> {
    client: QueryClient,
    request: Result<ApiRequest<T>, ApiError>,
    invalidates: Vec<Invalidate>,
    clear_cache: bool,
}

impl<T: DeserializeOwned> Mutation<T> {
    /// Drop the whole cache on success instead of invalidating targets.
    pub fn clear_cache_on_success(mut self) -> Self {
        self.clear_cache = true;
        self
    }

    pub fn invalidates(&self) -> &[Invalidate] {
        &self.invalidates
    }

    /// Send the request. On success every target is invalidated once; on
    /// failure the cache is left untouched.
    pub async fn execute(&self) -> Result<T, ApiError> {
        let request = self.request.as_ref().map_err(|e| e.clone())?;
        let value = self.client.send(request).await?;
        if self.clear_cache {
            self.client.cache.clear();
        } else {
            let hit = self.client.cache.invalidate_all(&self.invalidates);
            tracing::debug!(hit, "mutation succeeded");
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, HttpResponse};
    use crate::transport::testing::StubTransport;

    #[derive(Debug, serde::Deserialize, PartialEq)]
    struct Id {
        id: String,
    }

    fn client_with(transport: Arc<StubTransport>) -> QueryClient {
        QueryClient::new(ApiClient::new("http://api"), QueryCache::new(), transport)
    }

    #[tokio::test]
    async fn send_issues_exactly_one_get_by_default() {
        let transport = StubTransport::ok(r#"{"id":"1"}"#);
        let client = client_with(transport.clone());
        let request = client.api().api("/anything").build::<Id>().unwrap();
        let parsed = client.send(&request).await.unwrap();
        assert_eq!(parsed, Id { id: "1".to_string() });
        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, HttpMethod::Get);
        assert_eq!(calls[0].path, "http://api/anything");
    }

    #[tokio::test]
    async fn fresh_cache_short_circuits() {
        let transport = StubTransport::ok(r#"{"id":"1"}"#);
        let client = client_with(transport.clone());
        let request = client.api().api("/users/me").build::<Id>();
        let query = client.query(QueryKey::CurrentUser, request);

        let first = query.fetch().await;
        let second = query.fetch().await;
        assert!(first.is_success());
        assert_eq!(second.data.unwrap().id, "1");
        assert_eq!(transport.calls().len(), 1);

        client.cache().invalidate(query.key());
        assert!(query.state().is_stale);
        query.fetch().await;
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn failures_land_in_error_state() {
        let transport = StubTransport::new(|_| HttpResponse::new(500, "database down"));
        let client = client_with(transport);
        let request = client.api().api("/inbox").build::<Vec<Id>>();
        let state = client.query(QueryKey::Inbox, request).fetch().await;
        assert!(state.data.is_none());
        assert!(!state.is_loading);
        let err = state.error.unwrap();
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("database down"));
    }

    #[tokio::test]
    async fn placeholder_gives_way_to_error() {
        let transport = StubTransport::new(|_| HttpResponse::new(500, "boom"));
        let client = client_with(transport);
        let request = client.api().api("/orgs/acme/members").build::<Vec<Id>>();
        let key = QueryKey::OrganizationMembers { slug: "acme".to_string() };
        let query = client.query(key, request).placeholder(Vec::new());
        assert!(query.state().is_placeholder);

        let state = query.fetch().await;
        assert_eq!(state.error, Some(ApiError::Request { status: 500, body: "boom".into() }));
        assert!(state.data.is_none());
        assert!(!state.is_placeholder);
    }

    #[tokio::test]
    async fn disabled_query_never_sends() {
        let transport = StubTransport::ok("{}");
        let client = client_with(transport.clone());
        let request = client.api().api("/inbox").build::<Vec<Id>>();
        let query = client.query(QueryKey::Inbox, request).enabled(false);
        let state = query.fetch().await;
        assert!(state.data.is_none());
        assert!(state.error.is_none());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_mutation_invalidates_nothing() {
        let transport = StubTransport::new(|req| match req.method {
            HttpMethod::Get => HttpResponse::new(200, "[]"),
            _ => HttpResponse::new(409, "conflict"),
        });
        let client = client_with(transport);
        let list = client.query(QueryKey::Organizations, client.api().api("/orgs").build::<Vec<Id>>());
        list.fetch().await;

        let create = client.mutation(
            client.api().api("/orgs").method(HttpMethod::Post).build::<Id>(),
            vec![QueryKey::Organizations.into()],
        );
        let err = create.execute().await.unwrap_err();
        assert_eq!(err.status(), Some(409));
        assert_eq!(client.cache().invalidation_count(&QueryKey::Organizations), 0);
    }

    #[tokio::test]
    async fn clearing_mutation_empties_cache() {
        let transport = StubTransport::new(|req| match req.method {
            HttpMethod::Get => HttpResponse::new(200, r#"{"id":"u"}"#),
            _ => HttpResponse::new(204, ""),
        });
        let client = client_with(transport);
        let me = client.query(QueryKey::CurrentUser, client.api().api("/users/me").build::<Id>());
        me.fetch().await;
        assert!(me.state().is_success());

        let logout = client
            .mutation(client.api().api("/auth/logout").method(HttpMethod::Post).build::<()>(), vec![])
            .clear_cache_on_success();
        logout.execute().await.unwrap();
        assert!(me.state().data.is_none());
    }
}
