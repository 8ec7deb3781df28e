//! Keyed query cache with explicit invalidation.
//!
//! # Design
//! Keys are a tagged enum, one variant per resource kind carrying the
//! parameters that scope it, so two different resources can never collide
//! on a string key. Values are type-erased (`Arc<dyn Any>`) and downcast by
//! the typed `Query<T>` handle that wrote them.
//!
//! `QueryCache` is a cheap `Clone` handle over shared state. It is created
//! by whoever owns the `QueryClient` and can be injected, inspected and
//! invalidated on its own in tests.
//!
//! Every entry owns a `watch` channel carrying a generation counter. Any
//! write (loading, data, error, invalidation, clear) bumps the counter, so
//! subscribers learn that the entry changed and re-read it.
//!
//! Invalidation keeps the current data (still displayable) and marks it
//! stale; the next `fetch` goes to the network.

use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use uuid::Uuid;

use crate::error::ApiError;

pub type CachedData = Arc<dyn Any + Send + Sync>;

/// Identifies one cached query: the resource kind plus its scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryKey {
    Organizations,
    Organization { slug: String },
    Units { slug: String },
    Unit { slug: String, unit_id: Uuid },
    OrganizationMembers { slug: String },
    UnitMembers { slug: String, unit_id: Uuid },
    Forms { slug: String, unit_id: Uuid },
    Form { form_id: Uuid },
    Questions { form_id: Uuid },
    Responses { form_id: Uuid },
    Inbox,
    InboxItem { id: Uuid },
    CurrentUser,
}

/// The resource kind of a `QueryKey`, without its scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Organizations,
    Organization,
    Units,
    Unit,
    OrganizationMembers,
    UnitMembers,
    Forms,
    Form,
    Questions,
    Responses,
    Inbox,
    InboxItem,
    CurrentUser,
}

impl QueryKey {
    pub fn kind(&self) -> QueryKind {
        match self {
            QueryKey::Organizations => QueryKind::Organizations,
            QueryKey::Organization { .. } => QueryKind::Organization,
            QueryKey::Units { .. } => QueryKind::Units,
            QueryKey::Unit { .. } => QueryKind::Unit,
            QueryKey::OrganizationMembers { .. } => QueryKind::OrganizationMembers,
            QueryKey::UnitMembers { .. } => QueryKind::UnitMembers,
            QueryKey::Forms { .. } => QueryKind::Forms,
            QueryKey::Form { .. } => QueryKind::Form,
            QueryKey::Questions { .. } => QueryKind::Questions,
            QueryKey::Responses { .. } => QueryKind::Responses,
            QueryKey::Inbox => QueryKind::Inbox,
            QueryKey::InboxItem { .. } => QueryKind::InboxItem,
            QueryKey::CurrentUser => QueryKind::CurrentUser,
        }
    }

    /// Slug of the organization this key is scoped under.
    pub fn org_slug(&self) -> Option<&str> {
        match self {
            QueryKey::Organization { slug }
            | QueryKey::Units { slug }
            | QueryKey::Unit { slug, .. }
            | QueryKey::OrganizationMembers { slug }
            | QueryKey::UnitMembers { slug, .. }
            | QueryKey::Forms { slug, .. } => Some(slug.as_str()),
            _ => None,
        }
    }

    /// Organization slug and unit id this key is scoped under.
    pub fn unit_scope(&self) -> Option<(&str, Uuid)> {
        match self {
            QueryKey::Unit { slug, unit_id }
            | QueryKey::UnitMembers { slug, unit_id }
            | QueryKey::Forms { slug, unit_id } => Some((slug.as_str(), *unit_id)),
            _ => None,
        }
    }
}

/// What a mutation invalidates once it succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidate {
    Key(QueryKey),
    Kind(QueryKind),
    /// The organization and every key scoped under it.
    Organization(String),
    /// The unit and every key scoped under it.
    Unit { slug: String, unit_id: Uuid },
}

impl Invalidate {
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            Invalidate::Key(k) => k == key,
            Invalidate::Kind(kind) => key.kind() == *kind,
            Invalidate::Organization(slug) => key.org_slug() == Some(slug.as_str()),
            Invalidate::Unit { slug, unit_id } => {
                key.unit_scope() == Some((slug.as_str(), *unit_id))
            }
        }
    }
}

impl From<QueryKey> for Invalidate {
    fn from(key: QueryKey) -> Self {
        Invalidate::Key(key)
    }
}

impl From<QueryKind> for Invalidate {
    fn from(kind: QueryKind) -> Self {
        Invalidate::Kind(kind)
    }
}

/// Point-in-time copy of one cache entry.
#[derive(Clone)]
pub struct CachedQuery {
    pub data: Option<CachedData>,
    pub error: Option<ApiError>,
    pub is_loading: bool,
    pub is_stale: bool,
}

struct CacheEntry {
    data: Option<CachedData>,
    error: Option<ApiError>,
    is_loading: bool,
    is_stale: bool,
    invalidations: u64,
    generation: watch::Sender<u64>,
}

impl CacheEntry {
    fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            data: None,
            error: None,
            is_loading: false,
            is_stale: false,
            invalidations: 0,
            generation,
        }
    }

    fn notify(&self) {
        self.generation.send_modify(|g| *g = g.wrapping_add(1));
    }

    fn snapshot(&self) -> CachedQuery {
        CachedQuery {
            data: self.data.clone(),
            error: self.error.clone(),
            is_loading: self.is_loading,
            is_stale: self.is_stale,
        }
    }
}

/// Shared, injectable query cache.
#[derive(Clone, Default)]
pub struct QueryCache {
    entries: Arc<Mutex<HashMap<QueryKey, CacheEntry>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, key: &QueryKey, f: impl FnOnce(&mut CacheEntry)) {
        let mut entries = self.lock();
        let entry = entries.entry(key.clone()).or_insert_with(CacheEntry::new);
        f(entry);
        entry.notify();
    }

    pub fn get(&self, key: &QueryKey) -> Option<CachedQuery> {
        self.lock().get(key).map(CacheEntry::snapshot)
    }

    /// Cached data for `key`, if present and of type `T`.
    pub fn get_data<T: Any + Send + Sync>(&self, key: &QueryKey) -> Option<Arc<T>> {
        self.get(key)?.data?.downcast::<T>().ok()
    }

    /// True when `key` holds data that has not been invalidated.
    pub fn is_fresh(&self, key: &QueryKey) -> bool {
        self.lock()
            .get(key)
            .is_some_and(|e| e.data.is_some() && !e.is_stale)
    }

    pub fn set_loading(&self, key: &QueryKey) {
        self.update(key, |e| e.is_loading = true);
    }

    /// Store a fetched value, overwriting whatever was there.
    pub fn set_data<T: Any + Send + Sync>(&self, key: &QueryKey, value: T) {
        tracing::trace!(?key, "cache write");
        self.update(key, |e| {
            e.data = Some(Arc::new(value));
            e.error = None;
            e.is_loading = false;
            e.is_stale = false;
        });
    }

    /// Record a failed fetch. Previously fetched data stays readable.
    pub fn set_error(&self, key: &QueryKey, error: ApiError) {
        tracing::trace!(?key, %error, "cache error");
        self.update(key, |e| {
            e.error = Some(error);
            e.is_loading = false;
        });
    }

    /// Mark `key` stale. Returns false when nothing is cached under it.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        entry.is_stale = true;
        entry.invalidations += 1;
        entry.notify();
        tracing::debug!(?key, "invalidated");
        true
    }

    /// Mark every cached key of `kind` stale. Returns how many were hit.
    pub fn invalidate_kind(&self, kind: QueryKind) -> usize {
        self.invalidate_all(&[Invalidate::Kind(kind)])
    }

    /// Resolve `targets` to cached keys and invalidate each key once, even
    /// when several targets match it.
    pub fn invalidate_all(&self, targets: &[Invalidate]) -> usize {
        let keys: BTreeSet<QueryKey> = {
            let entries = self.lock();
            entries
                .keys()
                .filter(|key| targets.iter().any(|t| t.matches(key)))
                .cloned()
                .collect()
        };
        keys.iter().filter(|key| self.invalidate(key)).count()
    }

    /// Drop all cached data and errors. Subscribers are notified; their
    /// receivers stay valid.
    pub fn clear(&self) {
        let mut entries = self.lock();
        for entry in entries.values_mut() {
            entry.data = None;
            entry.error = None;
            entry.is_loading = false;
            entry.is_stale = false;
            entry.notify();
        }
        tracing::debug!(entries = entries.len(), "cache cleared");
    }

    /// Watch `key` for changes. Creates an empty entry if needed.
    pub fn subscribe(&self, key: &QueryKey) -> watch::Receiver<u64> {
        let mut entries = self.lock();
        entries
            .entry(key.clone())
            .or_insert_with(CacheEntry::new)
            .generation
            .subscribe()
    }

    /// How many times `key` has been invalidated.
    pub fn invalidation_count(&self, key: &QueryKey) -> u64 {
        self.lock().get(key).map_or(0, |e| e.invalidations)
    }
}
