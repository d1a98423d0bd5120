use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, TellerError};
use crate::sanitize::DEFAULT_DENY_PATTERNS;

/// Top-level configuration for the Teller service.
///
/// Loaded from `teller.toml` by default. Each section corresponds to one
/// component of the request-processing core or a cross-cutting concern.
/// Immutable after startup; the composition root wraps it in an `Arc` and
/// hands clones to the components that need it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TellerConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub sanitize: SanitizeConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Configured language-model backends, highest priority first after
    /// sorting. Read once at startup; never mutated at runtime.
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendConfig>,
}

impl Default for TellerConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            input: InputConfig::default(),
            output: OutputConfig::default(),
            pipeline: PipelineConfig::default(),
            router: RouterConfig::default(),
            sanitize: SanitizeConfig::default(),
            api: ApiConfig::default(),
            storage: StorageConfig::default(),
            backends: default_backends(),
        }
    }
}

impl TellerConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TellerConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| TellerError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// Session lifecycle and rate-limit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds of inactivity before a session expires.
    pub idle_timeout_secs: u64,
    /// Token-bucket capacity per session (burst size).
    pub bucket_capacity: f64,
    /// Token-bucket refill rate in tokens per second.
    pub refill_per_sec: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 1800,
            bucket_capacity: 5.0,
            refill_per_sec: 1.0,
        }
    }
}

/// Input normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Maximum accepted input length in characters.
    pub max_chars: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { max_chars: 4000 }
    }
}

/// Response validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Maximum response length in characters before truncation.
    pub max_chars: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { max_chars: 2000 }
    }
}

/// Conversation pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bounded conversation window: turns kept per session, oldest evicted.
    pub context_turns: usize,
    /// Retry once on an alternate backend when a reply is empty.
    pub retry_on_empty: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            context_turns: 10,
            retry_on_empty: true,
        }
    }
}

/// Backend selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Backend used when a session has no preference. Falls back to
    /// priority order when unset or unknown.
    pub default_backend: Option<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_backend: Some("primary".to_string()),
        }
    }
}

/// Textual sanitization settings shared by input and output filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeConfig {
    /// Byte sequences removed from text in both directions. Matched
    /// ASCII-case-insensitively, never executed.
    pub deny_patterns: Vec<String>,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            deny_patterns: DEFAULT_DENY_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7600,
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path.
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "teller.db".to_string(),
        }
    }
}

/// One configured language-model backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Unique backend name, referenced by session preferences.
    pub name: String,
    /// Backend kind: "openai" or "ollama".
    pub kind: String,
    /// Base URL of the backend API.
    pub endpoint: String,
    /// Model identifier passed to the backend.
    pub model: String,
    /// Environment variable holding the API key, if the backend needs one.
    pub api_key_env: Option<String>,
    /// Selection priority; lower is tried first.
    pub priority: u32,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Completion token budget per reply.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Whether the backend can stream partial replies.
    pub supports_streaming: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            name: "primary".to_string(),
            kind: "openai".to_string(),
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            priority: 0,
            timeout_secs: 30,
            max_tokens: 300,
            temperature: 0.7,
            supports_streaming: false,
        }
    }
}

fn default_backends() -> Vec<BackendConfig> {
    vec![
        BackendConfig::default(),
        BackendConfig {
            name: "local".to_string(),
            kind: "ollama".to_string(),
            endpoint: "http://127.0.0.1:11434".to_string(),
            model: "mistral".to_string(),
            api_key_env: None,
            priority: 1,
            timeout_secs: 60,
            max_tokens: 1024,
            temperature: 0.7,
            supports_streaming: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = TellerConfig::default();
        assert_eq!(config.session.idle_timeout_secs, 1800);
        assert_eq!(config.session.bucket_capacity, 5.0);
        assert_eq!(config.session.refill_per_sec, 1.0);
        assert_eq!(config.input.max_chars, 4000);
        assert_eq!(config.output.max_chars, 2000);
        assert_eq!(config.pipeline.context_turns, 10);
        assert!(config.pipeline.retry_on_empty);
        assert_eq!(config.router.default_backend.as_deref(), Some("primary"));
        assert!(!config.sanitize.deny_patterns.is_empty());
        assert_eq!(config.api.host, "127.0.0.1");
        assert_eq!(config.api.port, 7600);
        assert_eq!(config.storage.database_path, "teller.db");
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[0].name, "primary");
        assert_eq!(config.backends[1].name, "local");
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[session]
idle_timeout_secs = 600
bucket_capacity = 10.0
refill_per_sec = 2.0

[input]
max_chars = 1000

[api]
host = "0.0.0.0"
port = 8080

[[backends]]
name = "fast"
kind = "ollama"
endpoint = "http://127.0.0.1:11434"
model = "tinyllama"
priority = 0
timeout_secs = 15
max_tokens = 256
temperature = 0.5
supports_streaming = false
"#;
        let file = create_temp_config(content);
        let config = TellerConfig::load(file.path()).unwrap();
        assert_eq!(config.session.idle_timeout_secs, 600);
        assert_eq!(config.session.bucket_capacity, 10.0);
        assert_eq!(config.input.max_chars, 1000);
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.backends.len(), 1);
        assert_eq!(config.backends[0].name, "fast");
        assert_eq!(config.backends[0].model, "tinyllama");
        // Untouched sections keep defaults
        assert_eq!(config.output.max_chars, 2000);
        assert_eq!(config.pipeline.context_turns, 10);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[pipeline]
context_turns = 4
"#;
        let file = create_temp_config(content);
        let config = TellerConfig::load(file.path()).unwrap();
        assert_eq!(config.pipeline.context_turns, 4);
        assert!(config.pipeline.retry_on_empty);
        assert_eq!(config.session.idle_timeout_secs, 1800);
        // Backends list falls back to the default pair
        assert_eq!(config.backends.len(), 2);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = TellerConfig::load_or_default(Path::new("/nonexistent/teller.toml"));
        assert_eq!(config.session.idle_timeout_secs, 1800);
        assert_eq!(config.input.max_chars, 4000);
    }

    #[test]
    fn test_load_invalid_toml() {
        let content = "this is {{ not valid TOML";
        let file = create_temp_config(content);
        let result = TellerConfig::load(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("teller.toml");

        let config = TellerConfig::default();
        config.save(&path).unwrap();

        let reloaded = TellerConfig::load(&path).unwrap();
        assert_eq!(
            reloaded.session.idle_timeout_secs,
            config.session.idle_timeout_secs
        );
        assert_eq!(reloaded.input.max_chars, config.input.max_chars);
        assert_eq!(reloaded.backends.len(), config.backends.len());
        assert_eq!(reloaded.backends[0].name, config.backends[0].name);
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("dir").join("teller.toml");

        let config = TellerConfig::default();
        config.save(&path).unwrap();

        assert!(path.exists());
        let reloaded = TellerConfig::load(&path).unwrap();
        assert_eq!(reloaded.api.port, 7600);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = TellerConfig::load(file.path()).unwrap();
        assert_eq!(config.session.bucket_capacity, 5.0);
        assert_eq!(config.output.max_chars, 2000);
        assert_eq!(config.backends.len(), 2);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = TellerConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let deserialized: TellerConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(
            deserialized.session.idle_timeout_secs,
            config.session.idle_timeout_secs
        );
        assert_eq!(
            deserialized.sanitize.deny_patterns,
            config.sanitize.deny_patterns
        );
        assert_eq!(deserialized.backends.len(), config.backends.len());
    }

    #[test]
    fn test_sub_config_defaults() {
        let session = SessionConfig::default();
        assert_eq!(session.idle_timeout_secs, 1800);
        assert_eq!(session.bucket_capacity, 5.0);
        assert_eq!(session.refill_per_sec, 1.0);

        let input = InputConfig::default();
        assert_eq!(input.max_chars, 4000);

        let output = OutputConfig::default();
        assert_eq!(output.max_chars, 2000);

        let pipeline = PipelineConfig::default();
        assert_eq!(pipeline.context_turns, 10);
        assert!(pipeline.retry_on_empty);

        let router = RouterConfig::default();
        assert_eq!(router.default_backend.as_deref(), Some("primary"));

        let api = ApiConfig::default();
        assert_eq!(api.host, "127.0.0.1");
        assert_eq!(api.port, 7600);

        let storage = StorageConfig::default();
        assert_eq!(storage.database_path, "teller.db");

        let backend = BackendConfig::default();
        assert_eq!(backend.name, "primary");
        assert_eq!(backend.kind, "openai");
        assert_eq!(backend.model, "gpt-3.5-turbo");
        assert_eq!(backend.max_tokens, 300);
        assert_eq!(backend.timeout_secs, 30);
    }

    #[test]
    fn test_backend_list_overrides_defaults_entirely() {
        let content = r#"
[[backends]]
name = "only"
kind = "openai"
endpoint = "https://example.test/v1"
model = "test-model"
priority = 0
timeout_secs = 5
max_tokens = 128
temperature = 0.2
supports_streaming = true
"#;
        let file = create_temp_config(content);
        let config = TellerConfig::load(file.path()).unwrap();
        assert_eq!(config.backends.len(), 1);
        assert_eq!(config.backends[0].name, "only");
        assert!(config.backends[0].supports_streaming);
        assert!(config.backends[0].api_key_env.is_none());
    }
}
