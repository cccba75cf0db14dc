//! LLM provider configuration

use super::{LlmService, LoggingService, OpenAiCompatService};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for the chat completions provider
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    /// Overrides the endpoint implied by whichever key is set
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            gemini_api_key: non_empty_var("GEMINI_API_KEY"),
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            base_url: non_empty_var("LLM_BASE_URL"),
            model: non_empty_var("LLM_MODEL"),
            timeout_secs: non_empty_var("LLM_TIMEOUT_SECS").and_then(|v| v.parse().ok()),
        }
    }

    /// Key and endpoint to use. Gemini wins when both keys are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let (key, default_url) = match (&self.gemini_api_key, &self.openai_api_key) {
            (Some(key), _) => (key.as_str(), GEMINI_BASE_URL),
            (None, Some(key)) => (key.as_str(), OPENAI_BASE_URL),
            (None, None) => return None,
        };
        Some((key, self.base_url.as_deref().unwrap_or(default_url)))
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Build a logged service, or `None` when no API key is configured
    pub fn build_service(&self) -> Option<Arc<dyn LlmService>> {
        let (api_key, base_url) = self.credentials()?;
        tracing::info!(model = %self.model(), base_url = %base_url, "Configured LLM provider");
        let service = OpenAiCompatService::new(api_key, self.model(), base_url, self.timeout());
        Some(Arc::new(LoggingService::new(Arc::new(service))))
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_key_selects_gemini_endpoint() {
        let config = LlmConfig {
            gemini_api_key: Some("g".to_string()),
            openai_api_key: Some("o".to_string()),
            ..LlmConfig::default()
        };
        assert_eq!(config.credentials(), Some(("g", GEMINI_BASE_URL)));
        assert_eq!(config.model(), DEFAULT_MODEL);
    }

    #[test]
    fn test_base_url_override_applies() {
        let config = LlmConfig {
            openai_api_key: Some("o".to_string()),
            base_url: Some("http://localhost:9999/v1".to_string()),
            model: Some("local-model".to_string()),
            ..LlmConfig::default()
        };
        assert_eq!(config.credentials(), Some(("o", "http://localhost:9999/v1")));
        let service = config.build_service().unwrap();
        assert_eq!(service.model_id(), "local-model");
    }

    #[test]
    fn test_no_key_means_no_service() {
        let config = LlmConfig::default();
        assert!(config.credentials().is_none());
        assert!(config.build_service().is_none());
        assert_eq!(config.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }
}
