use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub price_tables: PriceTablesConfig,
    pub llm: LlmConfig,
    pub distance: DistanceConfig,
    pub pricing: PricingConfig,
    pub aliases: BTreeMap<String, String>,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct PriceTablesConfig {
    pub directory: PathBuf,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct DistanceConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub origin: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PricingConfig {
    pub installation_tiers: Vec<u32>,
    pub rate_per_km: Decimal,
    pub default_screen_height_mm: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Ollama,
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
    pub price_tables_directory: Option<PathBuf>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub distance_api_key: Option<String>,
    pub distance_base_url: Option<String>,
    pub distance_origin: Option<String>,
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

pub const DEFAULT_DISTANCE_BASE_URL: &str = "https://maps.googleapis.com/maps/api/distancematrix";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            price_tables: PriceTablesConfig { directory: PathBuf::from("ceniky") },
            llm: LlmConfig {
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: None,
                model: "gpt-4-turbo".to_string(),
                timeout_secs: 60,
                max_tokens: 1000,
            },
            distance: DistanceConfig {
                api_key: None,
                base_url: DEFAULT_DISTANCE_BASE_URL.to_string(),
                origin: "Blučina, Czechia".to_string(),
                timeout_secs: 30,
            },
            pricing: PricingConfig {
                installation_tiers: vec![12, 13, 14, 15],
                rate_per_km: Decimal::from(15),
                default_screen_height_mm: 2500,
            },
            aliases: BTreeMap::new(),
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl LlmConfig {
    /// Base URL used for requests, falling back to the provider's public endpoint.
    pub fn effective_base_url(&self) -> String {
        if let Some(base_url) = self.base_url.as_deref().filter(|value| !value.trim().is_empty()) {
            return base_url.trim_end_matches('/').to_string();
        }

        match self.provider {
            LlmProvider::OpenAi => "https://api.openai.com/v1".to_string(),
            LlmProvider::Anthropic => "https://api.anthropic.com/v1".to_string(),
            LlmProvider::Ollama => "http://localhost:11434/v1".to_string(),
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
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
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("sizequote.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(price_tables) = patch.price_tables {
            if let Some(directory) = price_tables.directory {
                self.price_tables.directory = directory;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
        }

        if let Some(distance) = patch.distance {
            if let Some(distance_api_key_value) = distance.api_key {
                self.distance.api_key = Some(secret_value(distance_api_key_value));
            }
            if let Some(base_url) = distance.base_url {
                self.distance.base_url = base_url;
            }
            if let Some(origin) = distance.origin {
                self.distance.origin = origin;
            }
            if let Some(timeout_secs) = distance.timeout_secs {
                self.distance.timeout_secs = timeout_secs;
            }
        }

        if let Some(pricing) = patch.pricing {
            if let Some(installation_tiers) = pricing.installation_tiers {
                self.pricing.installation_tiers = installation_tiers;
            }
            if let Some(rate_per_km) = pricing.rate_per_km {
                self.pricing.rate_per_km = rate_per_km;
            }
            if let Some(default_screen_height_mm) = pricing.default_screen_height_mm {
                self.pricing.default_screen_height_mm = default_screen_height_mm;
            }
        }

        if let Some(aliases) = patch.aliases {
            self.aliases.extend(aliases);
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
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
        if let Some(value) = read_env("SIZEQUOTE_PRICE_TABLES_DIRECTORY") {
            self.price_tables.directory = PathBuf::from(value);
        }

        if let Some(value) = read_env("SIZEQUOTE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        let llm_api_key =
            read_env("SIZEQUOTE_LLM_API_KEY").or_else(|| read_env("OPENAI_API_KEY"));
        if let Some(value) = llm_api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SIZEQUOTE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("SIZEQUOTE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("SIZEQUOTE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("SIZEQUOTE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SIZEQUOTE_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("SIZEQUOTE_LLM_MAX_TOKENS", &value)?;
        }

        let distance_api_key =
            read_env("SIZEQUOTE_DISTANCE_API_KEY").or_else(|| read_env("GOOGLE_API_KEY"));
        if let Some(value) = distance_api_key {
            self.distance.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SIZEQUOTE_DISTANCE_BASE_URL") {
            self.distance.base_url = value;
        }
        if let Some(value) = read_env("SIZEQUOTE_DISTANCE_ORIGIN") {
            self.distance.origin = value;
        }
        if let Some(value) = read_env("SIZEQUOTE_DISTANCE_TIMEOUT_SECS") {
            self.distance.timeout_secs = parse_u64("SIZEQUOTE_DISTANCE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SIZEQUOTE_PRICING_INSTALLATION_TIERS") {
            self.pricing.installation_tiers =
                parse_u32_list("SIZEQUOTE_PRICING_INSTALLATION_TIERS", &value)?;
        }
        if let Some(value) = read_env("SIZEQUOTE_PRICING_RATE_PER_KM") {
            self.pricing.rate_per_km = parse_decimal("SIZEQUOTE_PRICING_RATE_PER_KM", &value)?;
        }
        if let Some(value) = read_env("SIZEQUOTE_PRICING_DEFAULT_SCREEN_HEIGHT_MM") {
            self.pricing.default_screen_height_mm =
                parse_u32("SIZEQUOTE_PRICING_DEFAULT_SCREEN_HEIGHT_MM", &value)?;
        }

        if let Some(value) = read_env("SIZEQUOTE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SIZEQUOTE_SERVER_PORT") {
            self.server.port = parse_u16("SIZEQUOTE_SERVER_PORT", &value)?;
        }

        let log_level =
            read_env("SIZEQUOTE_LOGGING_LEVEL").or_else(|| read_env("SIZEQUOTE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SIZEQUOTE_LOGGING_FORMAT").or_else(|| read_env("SIZEQUOTE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(directory) = overrides.price_tables_directory {
            self.price_tables.directory = directory;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(llm_base_url);
        }
        if let Some(distance_api_key) = overrides.distance_api_key {
            self.distance.api_key = Some(secret_value(distance_api_key));
        }
        if let Some(distance_base_url) = overrides.distance_base_url {
            self.distance.base_url = distance_base_url;
        }
        if let Some(distance_origin) = overrides.distance_origin {
            self.distance.origin = distance_origin;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_price_tables(&self.price_tables)?;
        validate_llm(&self.llm)?;
        validate_distance(&self.distance)?;
        validate_pricing(&self.pricing)?;
        validate_aliases(&self.aliases)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("sizequote.toml"), PathBuf::from("config/sizequote.toml")]
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

fn validate_price_tables(price_tables: &PriceTablesConfig) -> Result<(), ConfigError> {
    if price_tables.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "price_tables.directory must point at a directory of CSV price lists".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if let Some(base_url) = &llm.base_url {
        if !is_http_url(base_url) {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    match llm.provider {
        LlmProvider::OpenAi | LlmProvider::Anthropic => {
            if secret_is_missing(llm.api_key.as_ref()) {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for openai/anthropic providers".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {}
    }

    Ok(())
}

fn validate_distance(distance: &DistanceConfig) -> Result<(), ConfigError> {
    if secret_is_missing(distance.api_key.as_ref()) {
        return Err(ConfigError::Validation(
            "distance.api_key is required to price delivery (Google Distance Matrix key)"
                .to_string(),
        ));
    }

    if !is_http_url(&distance.base_url) {
        return Err(ConfigError::Validation(
            "distance.base_url must start with http:// or https://".to_string(),
        ));
    }

    if distance.origin.trim().is_empty() {
        return Err(ConfigError::Validation("distance.origin must not be empty".to_string()));
    }

    if distance.timeout_secs == 0 || distance.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "distance.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigError> {
    if pricing.installation_tiers.is_empty() {
        return Err(ConfigError::Validation(
            "pricing.installation_tiers must list at least one percentage".to_string(),
        ));
    }

    if pricing.installation_tiers.iter().any(|tier| *tier == 0 || *tier > 100) {
        return Err(ConfigError::Validation(
            "pricing.installation_tiers entries must be in range 1..=100".to_string(),
        ));
    }

    if pricing.rate_per_km.is_sign_negative() {
        return Err(ConfigError::Validation(
            "pricing.rate_per_km must not be negative".to_string(),
        ));
    }

    if pricing.default_screen_height_mm == 0 {
        return Err(ConfigError::Validation(
            "pricing.default_screen_height_mm must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_aliases(aliases: &BTreeMap<String, String>) -> Result<(), ConfigError> {
    if let Some((alias, _)) =
        aliases.iter().find(|(alias, target)| alias.trim().is_empty() || target.trim().is_empty())
    {
        return Err(ConfigError::Validation(format!(
            "aliases entry `{alias}` must map a non-empty alias to a non-empty product"
        )));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
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

fn secret_is_missing(secret: Option<&SecretString>) -> bool {
    secret.map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true)
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    value.trim().parse::<Decimal>().map_err(|_| invalid_override(key, value))
}

fn parse_u32_list(key: &str, value: &str) -> Result<Vec<u32>, ConfigError> {
    value
        .split(',')
        .map(|part| part.trim().parse::<u32>().map_err(|_| invalid_override(key, value)))
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    price_tables: Option<PriceTablesPatch>,
    llm: Option<LlmPatch>,
    distance: Option<DistancePatch>,
    pricing: Option<PricingPatch>,
    aliases: Option<BTreeMap<String, String>>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct PriceTablesPatch {
    directory: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct DistancePatch {
    api_key: Option<String>,
    base_url: Option<String>,
    origin: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    installation_tiers: Option<Vec<u32>>,
    rate_per_km: Option<Decimal>,
    default_screen_height_mm: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use rust_decimal::Decimal;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const MANAGED_VARS: &[&str] = &[
        "SIZEQUOTE_PRICE_TABLES_DIRECTORY",
        "SIZEQUOTE_LLM_PROVIDER",
        "SIZEQUOTE_LLM_API_KEY",
        "SIZEQUOTE_LLM_BASE_URL",
        "SIZEQUOTE_LLM_MODEL",
        "SIZEQUOTE_DISTANCE_API_KEY",
        "SIZEQUOTE_PRICING_INSTALLATION_TIERS",
        "SIZEQUOTE_PRICING_RATE_PER_KM",
        "SIZEQUOTE_LOG_LEVEL",
        "SIZEQUOTE_LOG_FORMAT",
        "OPENAI_API_KEY",
        "GOOGLE_API_KEY",
        "TEST_LLM_KEY",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars() {
        for var in MANAGED_VARS {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("TEST_LLM_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("sizequote.toml");
            fs::write(
                &path,
                r#"
[llm]
api_key = "${TEST_LLM_KEY}"

[distance]
api_key = "maps-key"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            let key = config.llm.api_key.as_ref().map(|key| key.expose_secret().to_string());
            ensure(key.as_deref() == Some("sk-from-env"), "llm key should come from environment")
        })();

        clear_vars();
        result
    }

    #[test]
    fn legacy_secret_names_are_accepted() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("OPENAI_API_KEY", "sk-legacy");
        env::set_var("GOOGLE_API_KEY", "maps-legacy");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.llm.api_key.is_some(), "OPENAI_API_KEY should populate llm.api_key")?;
            ensure(
                config.distance.api_key.as_ref().map(|key| key.expose_secret() == "maps-legacy")
                    == Some(true),
                "GOOGLE_API_KEY should populate distance.api_key",
            )
        })();

        clear_vars();
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("SIZEQUOTE_PRICE_TABLES_DIRECTORY", "from-env");
        env::set_var("SIZEQUOTE_LLM_API_KEY", "sk-env");
        env::set_var("SIZEQUOTE_DISTANCE_API_KEY", "maps-env");
        env::set_var("SIZEQUOTE_PRICING_RATE_PER_KM", "17.5");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("sizequote.toml");
            fs::write(
                &path,
                r#"
[price_tables]
directory = "from-file"

[llm]
model = "gpt-4o"

[pricing]
installation_tiers = [10, 20]

[aliases]
"glass" = "alux glass"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.price_tables.directory.to_str() == Some("from-env"),
                "env directory should win over file",
            )?;
            ensure(config.llm.model == "gpt-4o", "file model should win over default")?;
            ensure(config.pricing.installation_tiers == vec![10, 20], "tiers come from file")?;
            ensure(
                config.pricing.rate_per_km == Decimal::new(175, 1),
                "rate per km should come from env",
            )?;
            ensure(
                config.aliases.get("glass").map(String::as_str) == Some("alux glass"),
                "file aliases should be merged",
            )?;
            ensure(config.logging.level == "debug", "override log level should win")
        })();

        clear_vars();
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("SIZEQUOTE_LLM_API_KEY", "sk-valid");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("distance.api_key")
            );
            ensure(has_message, "validation failure should mention distance.api_key")
        })();

        clear_vars();
        result
    }

    #[test]
    fn ollama_provider_does_not_require_api_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("SIZEQUOTE_LLM_PROVIDER", "ollama");
        env::set_var("SIZEQUOTE_DISTANCE_API_KEY", "maps-key");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.llm.provider == LlmProvider::Ollama, "provider should be ollama")?;
            ensure(
                config.llm.effective_base_url() == "http://localhost:11434/v1",
                "ollama should default to the local endpoint",
            )
        })();

        clear_vars();
        result
    }

    #[test]
    fn invalid_tier_list_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("SIZEQUOTE_LLM_API_KEY", "sk-valid");
        env::set_var("SIZEQUOTE_DISTANCE_API_KEY", "maps-key");
        env::set_var("SIZEQUOTE_PRICING_INSTALLATION_TIERS", "12, abc");

        let result = (|| -> Result<(), String> {
            let error = AppConfig::load(LoadOptions::default()).err();
            ensure(
                matches!(
                    error,
                    Some(ConfigError::InvalidEnvOverride { ref key, .. })
                        if key == "SIZEQUOTE_PRICING_INSTALLATION_TIERS"
                ),
                "malformed tier list should be reported as invalid override",
            )
        })();

        clear_vars();
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("SIZEQUOTE_LLM_API_KEY", "sk-secret-value");
        env::set_var("SIZEQUOTE_DISTANCE_API_KEY", "maps-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-secret-value"), "debug output should not contain llm key")?;
            ensure(
                !debug.contains("maps-secret-value"),
                "debug output should not contain distance key",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )
        })();

        clear_vars();
        result
    }
}
