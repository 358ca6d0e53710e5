//! Query cache: the one piece of shared mutable state in the client.
//!
//! Views read through it; only the hook layer writes to it, and only via
//! [`QueryCache::settle`], [`QueryCache::invalidate`], [`QueryCache::remove`]
//! and [`QueryCache::collect_garbage`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::debug;

use crate::models::{GenerationResult, HistoryFilter, HistoryPage, ModelList, StatusInfo};

pub type RequestToken = u64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    History(HistoryFilter),
    Generation(String),
    Models,
    Status,
}

/// One cached query result and its fetch bookkeeping.
#[derive(Debug, Clone)]
pub struct Query<T> {
    data: Option<T>,
    error: Option<String>,
    updated_at: Option<Instant>,
    in_flight: Option<RequestToken>,
    last_applied: RequestToken,
    invalidated: bool,
}

impl<T> Default for Query<T> {
    fn default() -> Self {
        Query {
            data: None,
            error: None,
            updated_at: None,
            in_flight: None,
            last_applied: 0,
            invalidated: false,
        }
    }
}

impl<T> Query<T> {
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_fresh(&self, now: Instant, stale_time: Duration) -> bool {
        if self.invalidated {
            return false;
        }
        match self.updated_at {
            Some(at) => now.saturating_duration_since(at) < stale_time,
            None => false,
        }
    }

    /// An empty slot that still rejects responses to requests sent before `floor`.
    fn cleared(floor: RequestToken, in_flight: Option<RequestToken>) -> Self {
        Query {
            last_applied: floor,
            in_flight,
            ..Query::default()
        }
    }

    /// Unused for `idle`: nothing in flight and not settled within the window.
    fn is_idle(&self, now: Instant, idle: Duration) -> bool {
        self.in_flight.is_none()
            && self
                .updated_at
                .map_or(true, |at| now.saturating_duration_since(at) >= idle)
    }

    /// Whether a read of this slot should issue a fetch.
    pub fn needs_fetch(&self, now: Instant, stale_time: Duration) -> bool {
        !self.is_fetching() && !self.is_fresh(now, stale_time)
    }

    fn settle(&mut self, token: RequestToken, result: Result<T, String>, now: Instant) -> bool {
        if self.in_flight.map_or(false, |t| t <= token) {
            self.in_flight = None;
        }
        if token < self.last_applied {
            return false;
        }
        self.last_applied = token;
        self.updated_at = Some(now);
        self.invalidated = false;
        match result {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
            }
            // Keep the last good data; the error is reported alongside it.
            Err(e) => self.error = Some(e),
        }
        true
    }
}

pub struct QueryCache {
    history: HashMap<HistoryFilter, Query<HistoryPage>>,
    generations: HashMap<String, Query<GenerationResult>>,
    models: Query<ModelList>,
    status: Query<StatusInfo>,
    next_token: RequestToken,
    changes: watch::Sender<u64>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Typed result handed to [`QueryCache::settle`].
#[derive(Debug, Clone)]
pub enum QueryResult {
    History(Result<HistoryPage, String>),
    Generation(Result<GenerationResult, String>),
    Models(Result<ModelList, String>),
    Status(Result<StatusInfo, String>),
}

impl QueryCache {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        QueryCache {
            history: HashMap::new(),
            generations: HashMap::new(),
            models: Query::default(),
            status: Query::default(),
            next_token: 0,
            changes,
        }
    }

    /// Receiver bumped on every cache change; views use it to re-sync derived state.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version += 1);
    }

    pub fn history(&self, filter: &HistoryFilter) -> Option<&Query<HistoryPage>> {
        self.history.get(filter)
    }

    pub fn generation(&self, id: &str) -> Option<&Query<GenerationResult>> {
        self.generations.get(id)
    }

    pub fn models(&self) -> &Query<ModelList> {
        &self.models
    }

    pub fn status(&self) -> &Query<StatusInfo> {
        &self.status
    }

    /// Whether a read of `key` should fetch now.
    pub fn needs_fetch(&self, key: &QueryKey, now: Instant, stale_time: Duration) -> bool {
        match key {
            QueryKey::History(filter) => self
                .history
                .get(filter)
                .map_or(true, |q| q.needs_fetch(now, stale_time)),
            QueryKey::Generation(id) => self
                .generations
                .get(id)
                .map_or(true, |q| q.needs_fetch(now, stale_time)),
            QueryKey::Models => self.models.needs_fetch(now, stale_time),
            QueryKey::Status => self.status.needs_fetch(now, stale_time),
        }
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        match key {
            QueryKey::History(filter) => self.history.get(filter).map_or(false, Query::is_fetching),
            QueryKey::Generation(id) => self.generations.get(id).map_or(false, Query::is_fetching),
            QueryKey::Models => self.models.is_fetching(),
            QueryKey::Status => self.status.is_fetching(),
        }
    }

    /// Records that a request for `key` is about to be sent and returns its token.
    pub fn begin(&mut self, key: &QueryKey) -> RequestToken {
        self.next_token += 1;
        let token = self.next_token;
        match key {
            QueryKey::History(filter) => {
                self.history.entry(filter.clone()).or_default().in_flight = Some(token)
            }
            QueryKey::Generation(id) => {
                self.generations.entry(id.clone()).or_default().in_flight = Some(token)
            }
            QueryKey::Models => self.models.in_flight = Some(token),
            QueryKey::Status => self.status.in_flight = Some(token),
        }
        debug!(?key, token, "query fetch started");
        self.notify();
        token
    }

    /// Stores a response. Returns false when the response was older than
    /// one already applied to the same key and was discarded.
    pub fn settle(&mut self, key: &QueryKey, token: RequestToken, result: QueryResult, now: Instant) -> bool {
        let applied = match (key, result) {
            (QueryKey::History(filter), QueryResult::History(r)) => {
                self.history.entry(filter.clone()).or_default().settle(token, r, now)
            }
            (QueryKey::Generation(id), QueryResult::Generation(r)) => {
                self.generations.entry(id.clone()).or_default().settle(token, r, now)
            }
            (QueryKey::Models, QueryResult::Models(r)) => self.models.settle(token, r, now),
            (QueryKey::Status, QueryResult::Status(r)) => self.status.settle(token, r, now),
            (key, result) => {
                debug!(?key, ?result, "mismatched query result ignored");
                false
            }
        };
        if applied {
            self.notify();
        } else {
            debug!(?key, token, "stale response discarded");
        }
        applied
    }

    /// Marks a key stale so its next read refetches. Data stays visible meanwhile.
    pub fn invalidate(&mut self, key: &QueryKey) {
        match key {
            QueryKey::History(filter) => {
                if let Some(q) = self.history.get_mut(filter) {
                    q.invalidated = true;
                }
            }
            QueryKey::Generation(id) => {
                if let Some(q) = self.generations.get_mut(id) {
                    q.invalidated = true;
                }
            }
            QueryKey::Models => self.models.invalidated = true,
            QueryKey::Status => self.status.invalidated = true,
        }
        self.notify();
    }

    /// Invalidates every history list regardless of its search term.
    pub fn invalidate_history(&mut self) {
        for query in self.history.values_mut() {
            query.invalidated = true;
        }
        debug!(lists = self.history.len(), "history invalidated");
        self.notify();
    }

    /// Drops the cached value for `key`. Responses to requests already sent
    /// for it are discarded when they arrive.
    pub fn remove(&mut self, key: &QueryKey) {
        let floor = self.next_token + 1;
        match key {
            QueryKey::History(filter) => {
                if let Some(q) = self.history.get_mut(filter) {
                    *q = Query::cleared(floor, q.in_flight);
                }
            }
            QueryKey::Generation(id) => {
                if let Some(q) = self.generations.get_mut(id) {
                    *q = Query::cleared(floor, q.in_flight);
                }
            }
            QueryKey::Models => self.models = Query::cleared(floor, self.models.in_flight),
            QueryKey::Status => self.status = Query::cleared(floor, self.status.in_flight),
        }
        self.notify();
    }

    /// Evicts history lists and generations that nothing has read for `idle`.
    /// Slots named in `keep` and slots with a request in flight always stay.
    /// Returns how many slots were evicted.
    pub fn collect_garbage(&mut self, keep: &[QueryKey], now: Instant, idle: Duration) -> usize {
        let before = self.history.len() + self.generations.len();
        self.history.retain(|filter, q| {
            keep.iter().any(|k| matches!(k, QueryKey::History(f) if f == filter)) || !q.is_idle(now, idle)
        });
        self.generations.retain(|id, q| {
            keep.iter().any(|k| matches!(k, QueryKey::Generation(g) if g == id)) || !q.is_idle(now, idle)
        });
        let evicted = before - self.history.len() - self.generations.len();
        if evicted > 0 {
            debug!(evicted, "unused queries evicted");
        }
        evicted
    }
}
