//! Static backend descriptions derived from configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use teller_core::config::BackendConfig;

/// Provider protocol a backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    OpenAi,
    Ollama,
}

impl BackendKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Read-only description of one configured backend. Built once at
/// startup; the API key itself stays out and is handed straight to the
/// adapter.
#[derive(Debug, Clone)]
pub struct BackendDescriptor {
    pub name: String,
    pub kind: BackendKind,
    pub endpoint: String,
    pub model: String,
    pub priority: u32,
    pub timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f64,
    pub supports_streaming: bool,
}

impl BackendDescriptor {
    /// Build from configuration. Returns `None` for an unknown kind.
    pub fn from_config(config: &BackendConfig) -> Option<Self> {
        let kind = BackendKind::parse(&config.kind)?;
        Some(Self {
            name: config.name.clone(),
            kind,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            priority: config.priority,
            timeout: Duration::from_secs(config.timeout_secs),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            supports_streaming: config.supports_streaming,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_known_values() {
        assert_eq!(BackendKind::parse("openai"), Some(BackendKind::OpenAi));
        assert_eq!(BackendKind::parse("OpenAI"), Some(BackendKind::OpenAi));
        assert_eq!(BackendKind::parse("ollama"), Some(BackendKind::Ollama));
        assert_eq!(BackendKind::parse("OLLAMA"), Some(BackendKind::Ollama));
    }

    #[test]
    fn test_kind_parse_unknown_value() {
        assert_eq!(BackendKind::parse("claude"), None);
        assert_eq!(BackendKind::parse(""), None);
    }

    #[test]
    fn test_kind_display_round_trip() {
        for kind in [BackendKind::OpenAi, BackendKind::Ollama] {
            assert_eq!(BackendKind::parse(kind.as_str()), Some(kind));
            assert_eq!(kind.to_string(), kind.as_str());
        }
    }

    #[test]
    fn test_descriptor_from_config() {
        let config = BackendConfig::default();
        let descriptor = BackendDescriptor::from_config(&config).unwrap();
        assert_eq!(descriptor.name, "primary");
        assert_eq!(descriptor.kind, BackendKind::OpenAi);
        assert_eq!(descriptor.timeout, Duration::from_secs(30));
        assert_eq!(descriptor.max_tokens, 300);
        assert!(!descriptor.supports_streaming);
    }

    #[test]
    fn test_descriptor_rejects_unknown_kind() {
        let config = BackendConfig {
            kind: "bedrock".to_string(),
            ..BackendConfig::default()
        };
        assert!(BackendDescriptor::from_config(&config).is_none());
    }
}
