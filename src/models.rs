use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TOPIC_MIN_CHARS: usize = 3;
/// Display guideline only, never enforced.
pub const TOPIC_GUIDE_CHARS: usize = 500;
pub const TEMPERATURE_RANGE: (f64, f64) = (0.0, 1.0);
pub const MAX_TOKENS_RANGE: (u32, u32) = (50, 2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlogType {
    #[default]
    Intro,
    FullArticle,
    Listicle,
    Tutorial,
}

impl BlogType {
    pub const ALL: [BlogType; 4] = [
        BlogType::Intro,
        BlogType::FullArticle,
        BlogType::Listicle,
        BlogType::Tutorial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlogType::Intro => "intro",
            BlogType::FullArticle => "full_article",
            BlogType::Listicle => "listicle",
            BlogType::Tutorial => "tutorial",
        }
    }
}

impl fmt::Display for BlogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BlogType::Intro => "Blog Introduction",
            BlogType::FullArticle => "Full Article",
            BlogType::Listicle => "Listicle",
            BlogType::Tutorial => "Tutorial/How-to",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritingStyle {
    #[default]
    Professional,
    Casual,
    Technical,
    Creative,
}

impl WritingStyle {
    pub const ALL: [WritingStyle; 4] = [
        WritingStyle::Professional,
        WritingStyle::Casual,
        WritingStyle::Technical,
        WritingStyle::Creative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WritingStyle::Professional => "professional",
            WritingStyle::Casual => "casual",
            WritingStyle::Technical => "technical",
            WritingStyle::Creative => "creative",
        }
    }
}

impl fmt::Display for WritingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WritingStyle::Professional => "Professional",
            WritingStyle::Casual => "Casual",
            WritingStyle::Technical => "Technical",
            WritingStyle::Creative => "Creative",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Topic is required")]
    TopicRequired,
    #[error("Topic must be at least 3 characters")]
    TopicTooShort,
    #[error("Temperature must be between 0 and 1")]
    TemperatureOutOfRange,
    #[error("Max tokens must be between 50 and 2000")]
    MaxTokensOutOfRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub topic: String,
    pub blog_type: BlogType,
    pub writing_style: WritingStyle,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        GenerationRequest {
            topic: String::new(),
            blog_type: BlogType::Intro,
            writing_style: WritingStyle::Professional,
            temperature: 0.7,
            max_tokens: 512,
        }
    }
}

impl GenerationRequest {
    /// Checks every field constraint. A request that fails here must never be sent.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let topic = self.topic.trim();
        if topic.is_empty() {
            return Err(ValidationError::TopicRequired);
        }
        if topic.chars().count() < TOPIC_MIN_CHARS {
            return Err(ValidationError::TopicTooShort);
        }
        let (t_min, t_max) = TEMPERATURE_RANGE;
        if !(t_min..=t_max).contains(&self.temperature) {
            return Err(ValidationError::TemperatureOutOfRange);
        }
        let (m_min, m_max) = MAX_TOKENS_RANGE;
        if !(m_min..=m_max).contains(&self.max_tokens) {
            return Err(ValidationError::MaxTokensOutOfRange);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub id: String,
    pub topic: String,
    pub blog_type: String,
    pub writing_style: String,
    pub temperature: f64,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    pub content: String,
    pub word_count: u64,
    pub character_count: u64,
    pub created_at: String,
}

/// List entry; `content` is the backend's truncated preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub id: String,
    pub topic: String,
    pub content: String,
    pub blog_type: String,
    pub writing_style: String,
    pub created_at: String,
    pub word_count: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoryPage {
    pub items: Vec<HistoryItem>,
    pub total: u64,
}

impl HistoryPage {
    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct HistoryFilter {
    pub search: Option<String>,
}

impl HistoryFilter {
    /// Blank terms mean "no search", matching an absent query parameter.
    pub fn from_term(term: &str) -> Self {
        let term = term.trim();
        HistoryFilter {
            search: (!term.is_empty()).then(|| term.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusInfo {
    pub lm_studio_connected: bool,
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelList {
    pub models: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthInfo {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteConfirmation {
    pub message: String,
}

/// Renders a backend timestamp like "Mar 4, 2025, 09:15 AM".
/// Unparseable values are shown as received.
pub fn format_timestamp(raw: &str) -> String {
    const FORMAT: &str = "%b %-d, %Y, %I:%M %p";

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format(FORMAT).to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.format(FORMAT).to_string();
    }
    raw.to_string()
}

/// "full_article" -> "full article"
pub fn humanize(value: &str) -> String {
    value.replace('_', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(topic: &str) -> GenerationRequest {
        GenerationRequest {
            topic: topic.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_short_topics_rejected() {
        assert_eq!(request("").validate(), Err(ValidationError::TopicRequired));
        assert_eq!(request("   ").validate(), Err(ValidationError::TopicRequired));
        assert_eq!(request("ab").validate(), Err(ValidationError::TopicTooShort));
        assert_eq!(request("  ab  ").validate(), Err(ValidationError::TopicTooShort));
        assert!(request("abc").validate().is_ok());
    }

    #[test]
    fn test_parameter_ranges() {
        let mut req = request("Remote work");
        req.temperature = 1.2;
        assert_eq!(req.validate(), Err(ValidationError::TemperatureOutOfRange));

        req.temperature = 0.0;
        req.max_tokens = 20;
        assert_eq!(req.validate(), Err(ValidationError::MaxTokensOutOfRange));

        req.max_tokens = 2000;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_request_wire_format() {
        let req = GenerationRequest {
            topic: "The benefits of remote work".to_string(),
            blog_type: BlogType::FullArticle,
            writing_style: WritingStyle::Casual,
            temperature: 0.7,
            max_tokens: 512,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["blog_type"], "full_article");
        assert_eq!(value["writing_style"], "casual");
        assert_eq!(value["max_tokens"], 512);
    }

    #[test]
    fn test_history_filter_from_term() {
        assert_eq!(HistoryFilter::from_term("  ").search, None);
        assert_eq!(HistoryFilter::from_term(" AI ").search.as_deref(), Some("AI"));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp("2025-03-04T09:15:00.123456"), "Mar 4, 2025, 09:15 AM");
        assert_eq!(format_timestamp("2025-03-04T21:15:00Z"), "Mar 4, 2025, 09:15 PM");
        assert_eq!(format_timestamp("yesterday"), "yesterday");
    }

    #[test]
    fn test_status_without_coarse_state() {
        let status: StatusInfo =
            serde_json::from_str(r#"{"lm_studio_connected": false, "message": "down"}"#).unwrap();
        assert!(!status.lm_studio_connected);
        assert_eq!(status.status, None);
    }
}
