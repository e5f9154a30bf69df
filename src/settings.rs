use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::Config;

use crate::constants::{DEFAULT_CONFIG_CONTENT, DEFAULT_ENDPOINT_PATH, ENV_PREFIX, PROGRAM_NAME};

#[derive(Debug, serde::Deserialize)]
pub struct Settings {
    pub verbosity: Option<String>,
    pub ai_backend: String,
    pub server: ServerSettings,
    pub invocation: InvocationSettings,
    pub gemini_settings: GeminiSettings,
    pub aws_settings: AwsSettings,
}

#[derive(Debug, serde::Deserialize)]
pub struct ServerSettings {
    pub bind_address: String,
    pub port: u16,
    pub endpoint_path: String,
    pub allowed_origin: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct InvocationSettings {
    /// Zero disables the service-side timeout.
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

#[derive(serde::Deserialize)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct AwsSettings {
    pub profile: Option<String>,
    pub region: String,
    pub model_id: String,
}

// The key must never reach a log line.
impl fmt::Debug for GeminiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl InvocationSettings {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Settings {
    /// Loads settings from the per-user config file, creating it with defaults on first run.
    pub fn new() -> Result<Self, config::ConfigError> {
        let config_path = default_config_path();

        // Create the directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        if !config_path.exists() {
            std::fs::write(&config_path, DEFAULT_CONFIG_CONTENT).ok();
        }

        Self::build(config::File::from(config_path).required(false))
    }

    /// Loads settings from an explicit file, which must exist.
    pub fn from_path(path: &Path) -> Result<Self, config::ConfigError> {
        Self::build(config::File::from(path).required(true))
    }

    /// Uses `path` when given, the per-user file otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::new(),
        }
    }

    fn build<S>(file: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings = Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("ai_backend", "gemini")?
            .set_default("server.bind_address", "0.0.0.0")?
            .set_default("server.port", 3001_i64)?
            .set_default("server.endpoint_path", DEFAULT_ENDPOINT_PATH)?
            .set_default("server.allowed_origin", "*")?
            .set_default("invocation.timeout_secs", 30_i64)?
            .set_default("invocation.max_retries", 0_i64)?
            .set_default("invocation.retry_backoff_ms", 250_i64)?
            .set_default("gemini_settings.model", "gemini-2.5-flash")?
            .set_default(
                "gemini_settings.base_url",
                "https://generativelanguage.googleapis.com/v1beta",
            )?
            .set_default("aws_settings.region", "us-east-1")?
            .set_default(
                "aws_settings.model_id",
                "anthropic.claude-3-haiku-20240307-v1:0",
            )?
            .build()?;

        let mut settings: Settings = settings.try_deserialize()?;
        if settings.gemini_settings.api_key.is_none() {
            settings.gemini_settings.api_key = std::env::var("GOOGLE_API_KEY").ok();
        }
        Ok(settings)
    }
}

/// Serializes tests that load settings, since loading reads process environment.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|mut path| {
            path.push(PROGRAM_NAME);
            path.push("config.toml");
            path
        })
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::MutexGuard;

    fn env_lock() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_fill_missing_keys() {
        let _env = env_lock();
        let file = write_config("ai_backend = \"bedrock\"\n");
        let settings = Settings::from_path(file.path()).unwrap();

        assert_eq!(settings.ai_backend, "bedrock");
        assert_eq!(settings.server.port, 3001);
        assert_eq!(settings.server.endpoint_path, "/api/get-formula");
        assert_eq!(settings.server.allowed_origin, "*");
        assert_eq!(settings.invocation.max_retries, 0);
        assert_eq!(settings.invocation.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(settings.gemini_settings.model, "gemini-2.5-flash");
        assert_eq!(settings.aws_settings.region, "us-east-1");
    }

    #[test]
    fn file_values_override_defaults() {
        let _env = env_lock();
        let file = write_config(
            r#"
[server]
port = 8080
allowed_origin = "https://sheets.example.com"

[invocation]
timeout_secs = 0
max_retries = 2

[gemini_settings]
api_key = "file-key"
model = "gemini-pro"
"#,
        );
        let settings = Settings::from_path(file.path()).unwrap();

        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.allowed_origin, "https://sheets.example.com");
        assert_eq!(settings.invocation.timeout(), None);
        assert_eq!(settings.invocation.max_retries, 2);
        assert_eq!(settings.gemini_settings.api_key.as_deref(), Some("file-key"));
        assert_eq!(settings.gemini_settings.model, "gemini-pro");
    }

    #[test]
    fn environment_overrides_file() {
        let _env = env_lock();
        let file = write_config(
            r#"
ai_backend = "gemini"

[server]
port = 8080
allowed_origin = "https://sheets.example.com"
"#,
        );
        std::env::set_var("FORMULA_RELAY_SERVER__PORT", "9090");
        std::env::set_var("FORMULA_RELAY_AI_BACKEND", "bedrock");
        std::env::set_var("FORMULA_RELAY_INVOCATION__MAX_RETRIES", "3");
        let loaded = Settings::from_path(file.path());
        std::env::remove_var("FORMULA_RELAY_SERVER__PORT");
        std::env::remove_var("FORMULA_RELAY_AI_BACKEND");
        std::env::remove_var("FORMULA_RELAY_INVOCATION__MAX_RETRIES");

        let settings = loaded.unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.ai_backend, "bedrock");
        assert_eq!(settings.invocation.max_retries, 3);
        assert_eq!(settings.server.allowed_origin, "https://sheets.example.com");
    }

    #[test]
    fn google_api_key_fills_missing_gemini_key() {
        let _env = env_lock();
        let previous = std::env::var("GOOGLE_API_KEY").ok();
        std::env::remove_var("FORMULA_RELAY_GEMINI_SETTINGS__API_KEY");
        std::env::set_var("GOOGLE_API_KEY", "env-key");

        let without_key = write_config("[gemini_settings]\nmodel = \"gemini-pro\"\n");
        let fallback = Settings::from_path(without_key.path());
        let with_key = write_config("[gemini_settings]\napi_key = \"file-key\"\n");
        let explicit = Settings::from_path(with_key.path());

        match previous {
            Some(key) => std::env::set_var("GOOGLE_API_KEY", key),
            None => std::env::remove_var("GOOGLE_API_KEY"),
        }

        assert_eq!(
            fallback.unwrap().gemini_settings.api_key.as_deref(),
            Some("env-key")
        );
        assert_eq!(
            explicit.unwrap().gemini_settings.api_key.as_deref(),
            Some("file-key")
        );
    }

    #[test]
    fn shipped_default_file_parses() {
        let _env = env_lock();
        let file = write_config(DEFAULT_CONFIG_CONTENT);
        let settings = Settings::from_path(file.path()).unwrap();
        assert_eq!(settings.ai_backend, "gemini");
        assert_eq!(settings.server.bind_address, "0.0.0.0");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let _env = env_lock();
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::from_path(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let gemini = GeminiSettings {
            api_key: Some("super-secret".into()),
            model: "gemini-2.5-flash".into(),
            base_url: "https://example.invalid".into(),
        };
        let rendered = format!("{gemini:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
