//! Query and mutation hooks over the [`QueryCache`].
//!
//! Reads go through `use_*`, which decide whether a fetch is due and hand
//! back an [`ApiRequest`] for the shell to run. Completed requests come
//! back through [`Hooks::apply`]. Nothing here performs I/O.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ApiCall, ApiError, ApiOutcome};
use crate::config::ApiConfig;
use crate::models::{GenerationRequest, GenerationResult, HealthInfo, HistoryFilter};
use crate::query::{QueryCache, QueryKey, QueryResult, RequestToken};

/// How long a history list or single generation counts as fresh.
/// Reads inside this window share the cached value instead of refetching.
pub const DEDUPE_WINDOW: Duration = Duration::from_secs(2);

/// History lists and generations nobody has read for this long are evicted.
pub const UNUSED_QUERY_IDLE: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy)]
pub struct QueryTimings {
    pub fresh_window: Duration,
    pub models_stale: Duration,
    pub status_poll: Duration,
}

impl Default for QueryTimings {
    fn default() -> Self {
        QueryTimings {
            fresh_window: DEDUPE_WINDOW,
            models_stale: Duration::from_secs(5 * 60),
            status_poll: Duration::from_secs(30),
        }
    }
}

impl From<&ApiConfig> for QueryTimings {
    fn from(config: &ApiConfig) -> Self {
        QueryTimings {
            fresh_window: DEDUPE_WINDOW,
            models_stale: Duration::from_secs(config.models_stale_secs),
            status_poll: Duration::from_secs(config.status_poll_secs.max(1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub token: RequestToken,
    pub call: ApiCall,
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub token: RequestToken,
    pub outcome: ApiOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationState<T> {
    Idle,
    Pending,
    Failed(String),
    Succeeded(T),
}

impl<T> MutationState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, MutationState::Pending)
    }
}

/// What a completed request means for the views.
#[derive(Debug, Clone)]
pub enum HookEvent {
    Generated(Result<GenerationResult, ApiError>),
    Deleted(String, Result<(), ApiError>),
    QueryUpdated,
    Ignored,
}

pub struct Hooks {
    cache: QueryCache,
    timings: QueryTimings,
    generate: MutationState<GenerationResult>,
    generate_token: Option<RequestToken>,
    delete: MutationState<String>,
    delete_token: Option<RequestToken>,
    health: Option<Result<HealthInfo, String>>,
    next_mutation: RequestToken,
}

impl Hooks {
    pub fn new(timings: QueryTimings) -> Self {
        Hooks {
            cache: QueryCache::new(),
            timings,
            generate: MutationState::Idle,
            generate_token: None,
            delete: MutationState::Idle,
            delete_token: None,
            health: None,
            next_mutation: 0,
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn timings(&self) -> QueryTimings {
        self.timings
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.cache.subscribe()
    }

    fn fetch(&mut self, key: QueryKey, call: ApiCall) -> ApiRequest {
        let token = self.cache.begin(&key);
        ApiRequest { token, call }
    }

    fn fetch_if_needed(&mut self, key: QueryKey, call: ApiCall, stale_time: Duration, now: Instant) -> Option<ApiRequest> {
        if self.cache.needs_fetch(&key, now, stale_time) {
            Some(self.fetch(key, call))
        } else {
            None
        }
    }

    pub fn use_history(&mut self, filter: &HistoryFilter, now: Instant) -> Option<ApiRequest> {
        self.fetch_if_needed(
            QueryKey::History(filter.clone()),
            ApiCall::History(filter.clone()),
            self.timings.fresh_window,
            now,
        )
    }

    pub fn use_generation(&mut self, id: &str, now: Instant) -> Option<ApiRequest> {
        self.fetch_if_needed(
            QueryKey::Generation(id.to_string()),
            ApiCall::Generation(id.to_string()),
            self.timings.fresh_window,
            now,
        )
    }

    pub fn use_models(&mut self, now: Instant) -> Option<ApiRequest> {
        self.fetch_if_needed(QueryKey::Models, ApiCall::Models, self.timings.models_stale, now)
    }

    /// Fetches status once; afterwards only the poller and manual refreshes update it.
    pub fn use_status(&mut self, now: Instant) -> Option<ApiRequest> {
        self.fetch_if_needed(QueryKey::Status, ApiCall::Status, Duration::MAX, now)
    }

    /// Manual refresh. Skipped while a status request is already running.
    pub fn refetch_status(&mut self) -> Option<ApiRequest> {
        if self.cache.is_fetching(&QueryKey::Status) {
            debug!("status refresh skipped, request in flight");
            return None;
        }
        Some(self.fetch(QueryKey::Status, ApiCall::Status))
    }

    /// Evicts cached lists and generations other than the ones currently on screen.
    pub fn collect_garbage(&mut self, filter: &HistoryFilter, selected: Option<&str>, now: Instant) {
        let mut keep = vec![QueryKey::History(filter.clone())];
        if let Some(id) = selected {
            keep.push(QueryKey::Generation(id.to_string()));
        }
        self.cache.collect_garbage(&keep, now, UNUSED_QUERY_IDLE);
    }

    /// Poll tick. Always issues exactly one request.
    pub fn poll_status(&mut self) -> ApiRequest {
        self.fetch(QueryKey::Status, ApiCall::Status)
    }

    pub fn health_check(&mut self) -> ApiRequest {
        self.next_mutation += 1;
        ApiRequest {
            token: self.next_mutation,
            call: ApiCall::Health,
        }
    }

    pub fn health(&self) -> Option<&Result<HealthInfo, String>> {
        self.health.as_ref()
    }

    pub fn generate_state(&self) -> &MutationState<GenerationResult> {
        &self.generate
    }

    pub fn delete_state(&self) -> &MutationState<String> {
        &self.delete
    }

    /// Starts the generate mutation. Refuses invalid requests and a second
    /// request while one is pending.
    pub fn generate(&mut self, request: GenerationRequest) -> Option<ApiRequest> {
        if self.generate.is_pending() {
            debug!("generate ignored, request already pending");
            return None;
        }
        if let Err(e) = request.validate() {
            warn!(error = %e, "refusing to send invalid generation request");
            return None;
        }
        self.next_mutation += 1;
        self.generate = MutationState::Pending;
        self.generate_token = Some(self.next_mutation);
        info!(
            topic = %request.topic,
            blog_type = request.blog_type.as_str(),
            writing_style = request.writing_style.as_str(),
            "generating blog content"
        );
        Some(ApiRequest {
            token: self.next_mutation,
            call: ApiCall::Generate(request),
        })
    }

    pub fn delete(&mut self, id: &str) -> Option<ApiRequest> {
        if self.delete.is_pending() {
            debug!(id, "delete ignored, another delete pending");
            return None;
        }
        self.next_mutation += 1;
        self.delete = MutationState::Pending;
        self.delete_token = Some(self.next_mutation);
        info!(id, "deleting generation");
        Some(ApiRequest {
            token: self.next_mutation,
            call: ApiCall::Delete(id.to_string()),
        })
    }

    /// Applies a completed request to the cache and mutation state.
    pub fn apply(&mut self, response: ApiResponse, now: Instant) -> HookEvent {
        let ApiResponse { token, outcome } = response;
        match outcome {
            ApiOutcome::Generated(result) => {
                if self.generate_token != Some(token) {
                    return HookEvent::Ignored;
                }
                self.generate_token = None;
                match &result {
                    Ok(generated) => {
                        info!(id = %generated.id, words = generated.word_count, "generation complete");
                        self.generate = MutationState::Succeeded(generated.clone());
                        self.cache.invalidate_history();
                    }
                    Err(e) => {
                        warn!(error = %e, "generation failed");
                        self.generate = MutationState::Failed(e.user_message());
                    }
                }
                HookEvent::Generated(result)
            }
            ApiOutcome::Deleted(id, result) => {
                if self.delete_token != Some(token) {
                    return HookEvent::Ignored;
                }
                self.delete_token = None;
                match &result {
                    Ok(_) => {
                        self.delete = MutationState::Succeeded(id.clone());
                        self.cache.remove(&QueryKey::Generation(id.clone()));
                        self.cache.invalidate_history();
                    }
                    Err(e) => {
                        warn!(id = %id, error = %e, "delete failed");
                        self.delete = MutationState::Failed(e.user_message());
                    }
                }
                HookEvent::Deleted(id, result.map(|_| ()))
            }
            ApiOutcome::History(filter, result) => self.settle(
                QueryKey::History(filter),
                token,
                QueryResult::History(result.map_err(|e| e.user_message())),
                now,
            ),
            ApiOutcome::Generation(id, result) => {
                if let Err(e) = &result {
                    if e.is_not_found() {
                        debug!(id = %id, "generation no longer exists");
                    }
                }
                self.settle(
                    QueryKey::Generation(id),
                    token,
                    QueryResult::Generation(result.map_err(|e| e.user_message())),
                    now,
                )
            }
            ApiOutcome::Models(result) => self.settle(
                QueryKey::Models,
                token,
                QueryResult::Models(result.map_err(|e| e.user_message())),
                now,
            ),
            ApiOutcome::Status(result) => {
                let was_connected = self
                    .cache
                    .status()
                    .data()
                    .map_or(false, |s| s.lm_studio_connected);
                let now_connected = result.as_ref().map_or(false, |s| s.lm_studio_connected);
                let event = self.settle(
                    QueryKey::Status,
                    token,
                    QueryResult::Status(result.map_err(|e| e.user_message())),
                    now,
                );
                // A model list fetched while LM Studio was down is likely empty.
                if matches!(event, HookEvent::QueryUpdated) && now_connected && !was_connected {
                    info!("LM Studio connected");
                    self.cache.invalidate(&QueryKey::Models);
                }
                event
            }
            ApiOutcome::Health(result) => {
                match &result {
                    Ok(health) => info!(status = %health.status, "backend reachable"),
                    Err(e) => warn!(error = %e, "backend health check failed"),
                }
                self.health = Some(result.map_err(|e| e.user_message()));
                HookEvent::QueryUpdated
            }
        }
    }

    fn settle(&mut self, key: QueryKey, token: RequestToken, result: QueryResult, now: Instant) -> HookEvent {
        if self.cache.settle(&key, token, result, now) {
            HookEvent::QueryUpdated
        } else {
            HookEvent::Ignored
        }
    }
}
