use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{
    DeleteConfirmation, GenerationRequest, GenerationResult, HealthInfo, HistoryFilter,
    HistoryPage, ModelList, StatusInfo,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Failure of one backend call. Cloneable so it can ride inside UI messages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("not found: {}", .detail.as_deref().unwrap_or("no detail"))]
    NotFound { detail: Option<String> },
    #[error("HTTP {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Status { status: u16, detail: Option<String> },
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Text shown to the user: the backend's detail when it sent one,
    /// otherwise a generic message.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Transport(_) => "Network Error".to_string(),
            ApiError::NotFound { detail } => detail
                .clone()
                .unwrap_or_else(|| "Request failed with status code 404".to_string()),
            ApiError::Status { status, detail } => detail
                .clone()
                .unwrap_or_else(|| format!("Request failed with status code {}", status)),
            ApiError::Decode(e) => format!("Unexpected response from server: {}", e),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Transport(e.to_string())
    }
}

/// Pulls the `detail` field out of an error body. FastAPI validation errors
/// carry a list of `{ msg }` objects instead of a string.
fn extract_detail(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(entries) => {
            let messages: Vec<&str> = entries
                .iter()
                .filter_map(|e| e.get("msg").and_then(Value::as_str))
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// One backend operation described as data, so the hook layer can issue
/// requests without doing I/O itself.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Generate(GenerationRequest),
    History(HistoryFilter),
    Generation(String),
    Delete(String),
    Models,
    Status,
    Health,
}

#[derive(Debug, Clone)]
pub enum ApiOutcome {
    Generated(Result<GenerationResult, ApiError>),
    History(HistoryFilter, Result<HistoryPage, ApiError>),
    Generation(String, Result<GenerationResult, ApiError>),
    Deleted(String, Result<DeleteConfirmation, ApiError>),
    Models(Result<ModelList, ApiError>),
    Status(Result<StatusInfo, ApiError>),
    Health(Result<HealthInfo, ApiError>),
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        ApiClient {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The liveness endpoint sits at the server root, outside the API prefix.
    pub fn health_url(&self) -> String {
        match reqwest::Url::parse(&self.base_url).and_then(|base| base.join("/health")) {
            Ok(url) => url.to_string(),
            Err(e) => {
                debug!(error = %e, "base url not parseable, using it as a prefix");
                format!("{}/health", self.base_url)
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_url(method, format!("{}{}", self.base_url, path))
    }

    fn request_url(&self, method: Method, url: String) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response.bytes().await?;

        if !status.is_success() {
            let detail = extract_detail(&body);
            warn!(%url, status = status.as_u16(), ?detail, "backend returned an error");
            return Err(if status == StatusCode::NOT_FOUND {
                ApiError::NotFound { detail }
            } else {
                ApiError::Status {
                    status: status.as_u16(),
                    detail,
                }
            });
        }

        debug!(%url, bytes = body.len(), "backend response");
        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn generate_blog(&self, request: &GenerationRequest) -> Result<GenerationResult, ApiError> {
        self.send(self.request(Method::POST, "/generate").json(request))
            .await
    }

    pub async fn get_history(&self, filter: &HistoryFilter) -> Result<HistoryPage, ApiError> {
        let mut builder = self.request(Method::GET, "/history");
        if let Some(search) = &filter.search {
            builder = builder.query(&[("search", search)]);
        }
        self.send(builder).await
    }

    pub async fn get_generation(&self, id: &str) -> Result<GenerationResult, ApiError> {
        self.send(self.request(Method::GET, &format!("/history/{}", id)))
            .await
    }

    pub async fn delete_generation(&self, id: &str) -> Result<DeleteConfirmation, ApiError> {
        self.send(self.request(Method::DELETE, &format!("/history/{}", id)))
            .await
    }

    pub async fn get_models(&self) -> Result<ModelList, ApiError> {
        self.send(self.request(Method::GET, "/models")).await
    }

    pub async fn get_status(&self) -> Result<StatusInfo, ApiError> {
        self.send(self.request(Method::GET, "/status")).await
    }

    pub async fn health_check(&self) -> Result<HealthInfo, ApiError> {
        self.send(self.request_url(Method::GET, self.health_url())).await
    }

    /// Runs a described call. Takes `self` by value so the future is `'static`.
    pub async fn execute(self, call: ApiCall) -> ApiOutcome {
        match call {
            ApiCall::Generate(request) => ApiOutcome::Generated(self.generate_blog(&request).await),
            ApiCall::History(filter) => {
                let result = self.get_history(&filter).await;
                ApiOutcome::History(filter, result)
            }
            ApiCall::Generation(id) => {
                let result = self.get_generation(&id).await;
                ApiOutcome::Generation(id, result)
            }
            ApiCall::Delete(id) => {
                let result = self.delete_generation(&id).await;
                ApiOutcome::Deleted(id, result)
            }
            ApiCall::Models => ApiOutcome::Models(self.get_models().await),
            ApiCall::Status => ApiOutcome::Status(self.get_status().await),
            ApiCall::Health => ApiOutcome::Health(self.health_check().await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlogType, WritingStyle};
    use axum::{
        extract::{Path, Query},
        http::{HeaderMap, StatusCode as AxumStatus},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;
    use std::collections::HashMap;

    fn stored_items() -> Vec<Value> {
        vec![
            json!({"id": "1", "topic": "AI in healthcare", "content": "Hospitals adopt models",
                   "blog_type": "intro", "writing_style": "professional",
                   "created_at": "2025-01-01T10:00:00", "word_count": 3}),
            json!({"id": "2", "topic": "Gardening tips", "content": "Use AI to plan beds",
                   "blog_type": "listicle", "writing_style": "casual",
                   "created_at": "2025-01-02T10:00:00", "word_count": 5}),
            json!({"id": "3", "topic": "Sourdough", "content": "Flour, water, salt",
                   "blog_type": "tutorial", "writing_style": "casual",
                   "created_at": "2025-01-03T10:00:00", "word_count": 3}),
        ]
    }

    async fn generate(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
        assert_eq!(headers.get("content-type").unwrap(), "application/json");
        Json(json!({
            "id": "gen-1",
            "topic": body["topic"],
            "blog_type": body["blog_type"],
            "writing_style": body["writing_style"],
            "temperature": body["temperature"],
            "max_tokens": body["max_tokens"],
            "content": "Remote work lets teams focus.",
            "word_count": 5,
            "character_count": 29,
            "created_at": "2025-01-01T10:00:00.000001"
        }))
    }

    async fn history(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        let items: Vec<Value> = stored_items()
            .into_iter()
            .filter(|item| match params.get("search") {
                Some(term) => {
                    item["topic"].as_str().unwrap().contains(term.as_str())
                        || item["content"].as_str().unwrap().contains(term.as_str())
                }
                None => true,
            })
            .collect();
        let total = items.len();
        Json(json!({"items": items, "total": total}))
    }

    async fn get_one(Path(id): Path<String>) -> (AxumStatus, Json<Value>) {
        if id == "missing" {
            return (AxumStatus::NOT_FOUND, Json(json!({"detail": "Generation not found"})));
        }
        (
            AxumStatus::OK,
            Json(json!({
                "id": id, "topic": "AI in healthcare", "blog_type": "intro",
                "writing_style": "professional", "temperature": 0.7, "max_tokens": 512,
                "content": "Full text", "word_count": 2, "character_count": 9,
                "created_at": "2025-01-01T10:00:00"
            })),
        )
    }

    async fn delete_one(Path(id): Path<String>) -> (AxumStatus, Json<Value>) {
        if id == "missing" {
            return (AxumStatus::NOT_FOUND, Json(json!({"detail": "Generation not found"})));
        }
        (AxumStatus::OK, Json(json!({"message": "Generation deleted successfully"})))
    }

    async fn status(headers: HeaderMap) -> (AxumStatus, Json<Value>) {
        if headers.get("content-type").is_none() {
            return (AxumStatus::BAD_REQUEST, Json(json!({"detail": "missing content type"})));
        }
        (
            AxumStatus::OK,
            Json(json!({"lm_studio_connected": true, "status": "healthy",
                        "message": "LM Studio is connected"})),
        )
    }

    async fn spawn_backend() -> String {
        let app = Router::new()
            .route("/api/generate", post(generate))
            .route("/api/history", get(history))
            .route("/api/history/:id", get(get_one).delete(delete_one))
            .route("/api/models", get(|| async { Json(json!({"models": ["deepseek-r1", "qwen2"]})) }))
            .route("/api/status", get(status))
            .route("/health", get(|| async { Json(json!({"status": "healthy", "message": "API is operational"})) }))
            .route("/api/broken", get(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "boom") }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api", addr)
    }

    #[tokio::test]
    async fn test_generate_echoes_request() {
        let client = ApiClient::with_base_url(spawn_backend().await);
        let request = GenerationRequest {
            topic: "The benefits of remote work".to_string(),
            blog_type: BlogType::Intro,
            writing_style: WritingStyle::Professional,
            temperature: 0.7,
            max_tokens: 512,
        };

        let result = client.generate_blog(&request).await.unwrap();
        assert_eq!(result.topic, "The benefits of remote work");
        assert_eq!(result.blog_type, "intro");
        assert_eq!(result.writing_style, "professional");
        assert!((result.temperature - 0.7).abs() < f64::EPSILON);
        assert_eq!(result.max_tokens, Some(512));
        assert!(!result.content.is_empty());
        assert_eq!(result.word_count, 5);
        assert_eq!(result.character_count, 29);
    }

    #[tokio::test]
    async fn test_history_search_is_server_filtered() {
        let client = ApiClient::with_base_url(spawn_backend().await);

        let all = client.get_history(&HistoryFilter::default()).await.unwrap();
        assert_eq!(all.total, 3);

        let ai = client.get_history(&HistoryFilter::from_term("AI")).await.unwrap();
        let ids: Vec<&str> = ai.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);

        let none = client
            .get_history(&HistoryFilter::from_term("quantum"))
            .await
            .unwrap();
        assert!(none.items.is_empty());
        assert_eq!(none.total, 0);
    }

    #[tokio::test]
    async fn test_missing_generation_is_not_found_with_detail() {
        let client = ApiClient::with_base_url(spawn_backend().await);

        let err = client.get_generation("missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.user_message(), "Generation not found");

        let err = client.delete_generation("missing").await.unwrap_err();
        assert!(err.is_not_found());

        let ok = client.delete_generation("1").await.unwrap();
        assert_eq!(ok.message, "Generation deleted successfully");
    }

    #[tokio::test]
    async fn test_status_models_and_health() {
        let client = ApiClient::with_base_url(spawn_backend().await);

        let status = client.get_status().await.unwrap();
        assert!(status.lm_studio_connected);
        assert_eq!(status.status.as_deref(), Some("healthy"));

        let models = client.get_models().await.unwrap();
        assert_eq!(models.models, vec!["deepseek-r1", "qwen2"]);

        let health = client.health_check().await.unwrap();
        assert_eq!(health.status, "healthy");
    }

    #[tokio::test]
    async fn test_status_error_without_detail_uses_generic_message() {
        let client = ApiClient::with_base_url(spawn_backend().await);
        let err = client
            .send::<Value>(client.request(Method::GET, "/broken"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Status {
                status: 500,
                detail: None
            }
        );
        assert_eq!(err.user_message(), "Request failed with status code 500");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ApiClient::with_base_url(format!("http://{}/api", addr));
        let err = client.get_status().await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
        assert_eq!(err.user_message(), "Network Error");
    }

    #[tokio::test]
    async fn test_execute_tags_outcome_with_call_parameters() {
        let client = ApiClient::with_base_url(spawn_backend().await);
        match client.execute(ApiCall::Generation("missing".into())).await {
            ApiOutcome::Generation(id, Err(e)) => {
                assert_eq!(id, "missing");
                assert!(e.is_not_found());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_extract_detail_shapes() {
        assert_eq!(extract_detail(br#"{"detail": "boom"}"#).as_deref(), Some("boom"));
        assert_eq!(
            extract_detail(br#"{"detail": [{"msg": "field required"}, {"msg": "too short"}]}"#)
                .as_deref(),
            Some("field required; too short")
        );
        assert_eq!(extract_detail(b"<html>oops</html>"), None);
        assert_eq!(extract_detail(br#"{"error": "x"}"#), None);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = ApiClient::with_base_url("http://localhost:8000/api/");
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_health_url_drops_api_prefix() {
        let client = ApiClient::with_base_url("http://localhost:8000/api");
        assert_eq!(client.health_url(), "http://localhost:8000/health");

        let client = ApiClient::with_base_url("https://blog.example.com/v1/api/");
        assert_eq!(client.health_url(), "https://blog.example.com/health");
    }
}
