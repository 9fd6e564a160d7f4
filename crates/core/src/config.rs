use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub catalogue: CatalogueConfig,
    pub summarizer: SummarizerConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

/// Paths to the vector index artifact and the cached product metadata it was
/// built from. The index file is presence-checked only; retrieval reads the
/// metadata.
#[derive(Clone, Debug)]
pub struct CatalogueConfig {
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct SummarizerConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl SummarizerConfig {
    pub fn enabled(&self) -> bool {
        self.api_key
            .as_ref()
            .map(|key| !key.expose_secret().trim().is_empty())
            .unwrap_or(false)
    }
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub per_minute: u32,
    pub burst_per_second: u32,
    pub exempt_paths: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub rate_limit_enabled: Option<bool>,
    pub catalogue_index_path: Option<PathBuf>,
    pub catalogue_metadata_path: Option<PathBuf>,
    pub summarizer_api_key: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://kopi.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                cors_allowed_origins: vec![
                    "http://localhost:5173".to_string(),
                    "http://127.0.0.1:5173".to_string(),
                ],
            },
            catalogue: CatalogueConfig {
                index_path: PathBuf::from("db/faiss/products.index"),
                metadata_path: PathBuf::from("db/faiss/products_metadata.json"),
            },
            summarizer: SummarizerConfig {
                api_key: None,
                base_url: "https://openrouter.ai/api/v1".to_string(),
                model: "minimax/minimax-m2:free".to_string(),
                timeout_secs: 30,
            },
            rate_limit: RateLimitConfig {
                enabled: true,
                per_minute: 60,
                burst_per_second: 5,
                exempt_paths: vec![
                    "/health".to_string(),
                    "/metrics".to_string(),
                    "/tools/*".to_string(),
                ],
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    /// Layered load: defaults, optional `kopi.toml`, `KOPI_*` environment
    /// overrides, then programmatic overrides, validated last.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("kopi.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(origins) = server.cors_allowed_origins {
                self.server.cors_allowed_origins = origins;
            }
        }

        if let Some(catalogue) = patch.catalogue {
            if let Some(index_path) = catalogue.index_path {
                self.catalogue.index_path = index_path;
            }
            if let Some(metadata_path) = catalogue.metadata_path {
                self.catalogue.metadata_path = metadata_path;
            }
        }

        if let Some(summarizer) = patch.summarizer {
            if let Some(api_key_value) = summarizer.api_key {
                self.summarizer.api_key = Some(secret_value(api_key_value));
            }
            if let Some(base_url) = summarizer.base_url {
                self.summarizer.base_url = base_url;
            }
            if let Some(model) = summarizer.model {
                self.summarizer.model = model;
            }
            if let Some(timeout_secs) = summarizer.timeout_secs {
                self.summarizer.timeout_secs = timeout_secs;
            }
        }

        if let Some(rate_limit) = patch.rate_limit {
            if let Some(enabled) = rate_limit.enabled {
                self.rate_limit.enabled = enabled;
            }
            if let Some(per_minute) = rate_limit.per_minute {
                self.rate_limit.per_minute = per_minute;
            }
            if let Some(burst_per_second) = rate_limit.burst_per_second {
                self.rate_limit.burst_per_second = burst_per_second;
            }
            if let Some(exempt_paths) = rate_limit.exempt_paths {
                self.rate_limit.exempt_paths = exempt_paths;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("KOPI_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("KOPI_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("KOPI_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("KOPI_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("KOPI_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("KOPI_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("KOPI_SERVER_PORT") {
            self.server.port = parse_u16("KOPI_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("KOPI_SERVER_CORS_ORIGINS") {
            self.server.cors_allowed_origins = value
                .split(',')
                .map(|origin| origin.trim().trim_end_matches('/').to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
        }

        if let Some(value) = read_env("KOPI_CATALOGUE_INDEX_PATH") {
            self.catalogue.index_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("KOPI_CATALOGUE_METADATA_PATH") {
            self.catalogue.metadata_path = PathBuf::from(value);
        }

        if let Some(value) = read_env("KOPI_SUMMARIZER_API_KEY") {
            self.summarizer.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("KOPI_SUMMARIZER_BASE_URL") {
            self.summarizer.base_url = value;
        }
        if let Some(value) = read_env("KOPI_SUMMARIZER_MODEL") {
            self.summarizer.model = value;
        }
        if let Some(value) = read_env("KOPI_SUMMARIZER_TIMEOUT_SECS") {
            self.summarizer.timeout_secs = parse_u64("KOPI_SUMMARIZER_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("KOPI_RATE_LIMIT_ENABLED") {
            self.rate_limit.enabled = parse_bool("KOPI_RATE_LIMIT_ENABLED", &value)?;
        }
        if let Some(value) = read_env("KOPI_RATE_LIMIT_PER_MINUTE") {
            self.rate_limit.per_minute = parse_u32("KOPI_RATE_LIMIT_PER_MINUTE", &value)?;
        }
        if let Some(value) = read_env("KOPI_RATE_LIMIT_BURST_PER_SECOND") {
            self.rate_limit.burst_per_second =
                parse_u32("KOPI_RATE_LIMIT_BURST_PER_SECOND", &value)?;
        }

        let log_level = read_env("KOPI_LOGGING_LEVEL").or_else(|| read_env("KOPI_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("KOPI_LOGGING_FORMAT").or_else(|| read_env("KOPI_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(enabled) = overrides.rate_limit_enabled {
            self.rate_limit.enabled = enabled;
        }
        if let Some(index_path) = overrides.catalogue_index_path {
            self.catalogue.index_path = index_path;
        }
        if let Some(metadata_path) = overrides.catalogue_metadata_path {
            self.catalogue.metadata_path = metadata_path;
        }
        if let Some(api_key) = overrides.summarizer_api_key {
            self.summarizer.api_key = Some(secret_value(api_key));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_summarizer(&self.summarizer)?;
        validate_rate_limit(&self.rate_limit)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("kopi.toml"), PathBuf::from("config/kopi.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    for origin in &server.cors_allowed_origins {
        if !origin.starts_with("http://") && !origin.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "server.cors_allowed_origins entry `{origin}` must start with http:// or https://"
            )));
        }
    }

    Ok(())
}

fn validate_summarizer(summarizer: &SummarizerConfig) -> Result<(), ConfigError> {
    if summarizer.timeout_secs == 0 || summarizer.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "summarizer.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if summarizer.enabled()
        && !summarizer.base_url.starts_with("http://")
        && !summarizer.base_url.starts_with("https://")
    {
        return Err(ConfigError::Validation(
            "summarizer.base_url must start with http:// or https://".to_string(),
        ));
    }

    if summarizer.enabled() && summarizer.model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "summarizer.model is required when an api key is configured".to_string(),
        ));
    }

    Ok(())
}

fn validate_rate_limit(rate_limit: &RateLimitConfig) -> Result<(), ConfigError> {
    if !rate_limit.enabled {
        return Ok(());
    }

    if rate_limit.per_minute == 0 {
        return Err(ConfigError::Validation(
            "rate_limit.per_minute must be greater than zero when rate limiting is enabled"
                .to_string(),
        ));
    }
    if rate_limit.burst_per_second == 0 {
        return Err(ConfigError::Validation(
            "rate_limit.burst_per_second must be greater than zero when rate limiting is enabled"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    catalogue: Option<CataloguePatch>,
    summarizer: Option<SummarizerPatch>,
    rate_limit: Option<RateLimitPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    cors_allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct CataloguePatch {
    index_path: Option<PathBuf>,
    metadata_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct SummarizerPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RateLimitPatch {
    enabled: Option<bool>,
    per_minute: Option<u32>,
    burst_per_second: Option<u32>,
    exempt_paths: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
