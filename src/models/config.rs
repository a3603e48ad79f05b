//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::provider::{ProviderError, ProviderKind};

/// Root application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Search backend settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Notification channel settings
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults; environment overrides are applied
    /// either way.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::read(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Read only the TOML file, without environment overrides.
    ///
    /// Used when the result is written back, so overrides never leak into
    /// the file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        match fs::read_to_string(path.as_ref()) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            let mut config = Self::default();
            config.apply_env(|key| std::env::var(key).ok());
            config
        })
    }

    /// Write configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Default config file location: `<config_dir>/farewatch/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("farewatch").join("config.toml"))
    }

    /// Resolve the state directory holding the watch list.
    ///
    /// Precedence: explicit override, `FAREWATCH_STATE_DIR`, platform state
    /// dir, `~/.local/state`.
    pub fn state_dir(override_dir: Option<&Path>) -> Result<PathBuf> {
        if let Some(dir) = override_dir {
            return Ok(dir.to_path_buf());
        }
        if let Some(dir) = std::env::var_os("FAREWATCH_STATE_DIR").filter(|d| !d.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        dirs::state_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("state")))
            .map(|d| d.join("farewatch"))
            .ok_or_else(|| AppError::config("could not determine state directory"))
    }

    /// Apply `FAREWATCH_*` overrides from the given variable lookup.
    ///
    /// Numeric values that do not parse or are out of range are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("FAREWATCH_PROVIDER") {
            self.provider.kind = v;
        }
        if let Some(v) = get("FAREWATCH_SERPAPI_KEY") {
            self.provider.api_key = v;
        }
        if let Some(n) = get("FAREWATCH_PROVIDER_TIMEOUT_SECONDS").and_then(|v| v.parse::<u64>().ok()) {
            if n > 0 {
                self.provider.timeout_secs = n;
            }
        }
        if let Some(n) = get("FAREWATCH_PROVIDER_RETRIES").and_then(|v| v.parse::<u32>().ok()) {
            self.provider.retries = n;
        }
        if let Some(n) = get("FAREWATCH_PROVIDER_BACKOFF_MS").and_then(|v| v.parse::<u64>().ok()) {
            if n > 0 {
                self.provider.backoff_ms = n;
            }
        }
        if let Some(v) = get("FAREWATCH_WEBHOOK_URL") {
            self.notify.webhook_url = v;
        }
        if let Some(v) = get("FAREWATCH_SMTP_HOST") {
            self.notify.smtp.host = v;
        }
        if let Some(v) = get("FAREWATCH_SMTP_USER") {
            self.notify.smtp.username = v;
        }
        if let Some(v) = get("FAREWATCH_SMTP_PASS") {
            self.notify.smtp.password = v;
        }
        if let Some(v) = get("FAREWATCH_SMTP_SENDER") {
            self.notify.smtp.sender = v;
        }
        if let Some(v) = get("FAREWATCH_NOTIFY_EMAIL") {
            self.notify.default_email = v;
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        ProviderKind::parse(&self.provider.kind).ok_or_else(|| {
            AppError::validation(format!("unsupported provider {:?}", self.provider.kind))
        })?;
        if self.provider.timeout_secs == 0 {
            return Err(AppError::validation("provider.timeout_secs must be > 0"));
        }
        if self.provider.backoff_ms == 0 {
            return Err(AppError::validation("provider.backoff_ms must be > 0"));
        }
        if self.provider.base_url.trim().is_empty() {
            return Err(AppError::validation("provider.base_url is empty"));
        }
        url::Url::parse(&self.provider.base_url)?;
        if !self.notify.webhook_url.trim().is_empty() {
            url::Url::parse(self.notify.webhook_url.trim())?;
        }
        if self.notify.smtp.port == 0 {
            return Err(AppError::validation("notify.smtp.port must be > 0"));
        }
        if self.notify.webhook_timeout_secs == 0 {
            return Err(AppError::validation(
                "notify.webhook_timeout_secs must be > 0",
            ));
        }
        Ok(())
    }

    /// Check that the selected provider can run: a SerpApi key must be set.
    pub fn validate_provider(&self) -> Result<ProviderKind> {
        let kind = ProviderKind::parse(&self.provider.kind).ok_or_else(|| {
            AppError::validation(format!("unsupported provider {:?}", self.provider.kind))
        })?;
        if kind == ProviderKind::SerpApi && self.provider.api_key.trim().is_empty() {
            return Err(ProviderError::auth_required(
                "provider=serpapi requires serp_api_key",
            )
            .into());
        }
        Ok(kind)
    }

    /// Set a single value by its flat `config set` key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let parse_num = |v: &str| {
            v.parse::<u64>()
                .map_err(|_| AppError::validation(format!("{key} must be a non-negative integer")))
        };
        match key {
            "provider" => {
                ProviderKind::parse(value).ok_or_else(|| {
                    AppError::validation(format!("unsupported provider {value:?}"))
                })?;
                self.provider.kind = value.to_string();
            }
            "serp_api_key" => self.provider.api_key = value.to_string(),
            "provider_base_url" => self.provider.base_url = value.to_string(),
            "provider_timeout_seconds" => self.provider.timeout_secs = parse_num(value)?,
            "provider_retries" => {
                self.provider.retries = u32::try_from(parse_num(value)?)
                    .map_err(|_| AppError::validation("provider_retries is too large"))?;
            }
            "provider_backoff_ms" => self.provider.backoff_ms = parse_num(value)?,
            "webhook_url" => self.notify.webhook_url = value.to_string(),
            "notify_email" => self.notify.default_email = value.to_string(),
            "smtp_host" => self.notify.smtp.host = value.to_string(),
            "smtp_port" => {
                self.notify.smtp.port = u16::try_from(parse_num(value)?)
                    .map_err(|_| AppError::validation("smtp_port must be <= 65535"))?;
            }
            "smtp_user" => self.notify.smtp.username = value.to_string(),
            "smtp_pass" => self.notify.smtp.password = value.to_string(),
            "smtp_sender" => self.notify.smtp.sender = value.to_string(),
            _ => return Err(AppError::usage(format!("unknown config key: {key}"))),
        }
        self.validate()
    }

    /// Which credentials and channels are configured, without their values.
    pub fn auth_status(&self) -> AuthStatus {
        AuthStatus {
            provider: self.provider.kind.clone(),
            serpapi_key: !self.provider.api_key.trim().is_empty(),
            smtp_configured: self.notify.smtp.missing_fields().is_empty(),
            webhook_configured: !self.notify.webhook_url.trim().is_empty(),
        }
    }

    /// Store the provider and key given to `auth login`.
    ///
    /// Blank values leave the current setting alone. The provider is saved
    /// under its canonical name.
    pub fn login(&mut self, provider: Option<&str>, api_key: Option<&str>) -> Result<()> {
        if let Some(name) = provider.map(str::trim).filter(|p| !p.is_empty()) {
            let kind = ProviderKind::parse(name).ok_or_else(|| {
                AppError::usage(format!(
                    "unsupported provider {name:?} (expected serpapi|google-url)"
                ))
            })?;
            self.provider.kind = kind.as_str().to_string();
        }
        if let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) {
            self.provider.api_key = key.to_string();
        }
        Ok(())
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.provider.api_key = redact(&copy.provider.api_key);
        copy.notify.smtp.password = redact(&copy.notify.smtp.password);
        copy
    }
}

fn redact(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        "********".to_string()
    }
}

/// Credential summary reported by `auth status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthStatus {
    pub provider: String,
    pub serpapi_key: bool,
    pub smtp_configured: bool,
    pub webhook_configured: bool,
}

/// Search backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// `serpapi` or `google-url`
    #[serde(default = "defaults::provider_kind")]
    pub kind: String,

    /// SerpApi key
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Extra attempts after the first one
    #[serde(default = "defaults::retries")]
    pub retries: u32,

    /// Base backoff between attempts in milliseconds
    #[serde(default = "defaults::backoff")]
    pub backoff_ms: u64,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: defaults::provider_kind(),
            api_key: String::new(),
            base_url: defaults::base_url(),
            timeout_secs: defaults::timeout(),
            retries: defaults::retries(),
            backoff_ms: defaults::backoff(),
            user_agent: defaults::user_agent(),
        }
    }
}

/// Notification channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Fallback webhook URL when a watch has none
    #[serde(default)]
    pub webhook_url: String,

    /// Fallback email recipient when a watch has none
    #[serde(default)]
    pub default_email: String,

    #[serde(default = "defaults::webhook_timeout")]
    pub webhook_timeout_secs: u64,

    #[serde(default)]
    pub smtp: SmtpConfig,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            default_email: String::new(),
            webhook_timeout_secs: defaults::webhook_timeout(),
            smtp: SmtpConfig::default(),
        }
    }
}

/// SMTP transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "defaults::smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub sender: String,
}

impl SmtpConfig {
    /// Names of required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("smtp_host", &self.host),
            ("smtp_user", &self.username),
            ("smtp_pass", &self.password),
            ("smtp_sender", &self.sender),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: defaults::smtp_port(),
            username: String::new(),
            password: String::new(),
            sender: String::new(),
        }
    }
}

mod defaults {
    // Provider defaults
    pub fn provider_kind() -> String {
        "serpapi".into()
    }
    pub fn base_url() -> String {
        "https://serpapi.com".into()
    }
    pub fn timeout() -> u64 {
        20
    }
    pub fn retries() -> u32 {
        2
    }
    pub fn backoff() -> u64 {
        400
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; farewatch/0.1)".into()
    }

    // Notify defaults
    pub fn webhook_timeout() -> u64 {
        10
    }
    pub fn smtp_port() -> u16 {
        587
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::TempDir;

    use super::*;
    use crate::provider::ErrorKind;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn default_provider_settings() {
        let config = Config::default();
        assert_eq!(config.provider.timeout_secs, 20);
        assert_eq!(config.provider.retries, 2);
        assert_eq!(config.provider.backoff_ms, 400);
        assert_eq!(config.notify.smtp.port, 587);
    }

    #[test]
    fn validate_rejects_unknown_provider() {
        let mut config = Config::default();
        config.provider.kind = "skyscanner".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_provider_requires_key_for_serpapi() {
        let config = Config::default();
        match config.validate_provider() {
            Err(AppError::Provider(err)) => assert_eq!(err.kind(), ErrorKind::AuthRequired),
            other => panic!("expected auth error, got {other:?}"),
        }

        let mut config = Config::default();
        config.provider.kind = "google-url".to_string();
        assert_eq!(config.validate_provider().unwrap(), ProviderKind::GoogleUrl);
    }

    #[test]
    fn apply_env_overrides_and_ignores_bad_numbers() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("FAREWATCH_SERPAPI_KEY", "secret"),
            ("FAREWATCH_PROVIDER_RETRIES", "5"),
            ("FAREWATCH_PROVIDER_TIMEOUT_SECONDS", "0"),
            ("FAREWATCH_PROVIDER_BACKOFF_MS", "fast"),
            ("FAREWATCH_NOTIFY_EMAIL", "me@example.com"),
        ]);
        let mut config = Config::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.provider.api_key, "secret");
        assert_eq!(config.provider.retries, 5);
        assert_eq!(config.provider.timeout_secs, 20);
        assert_eq!(config.provider.backoff_ms, 400);
        assert_eq!(config.notify.default_email, "me@example.com");
    }

    #[test]
    fn set_and_save_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/config.toml");

        let mut config = Config::default();
        config.set("smtp_host", "smtp.example.com").unwrap();
        config.set("provider_retries", "4").unwrap();
        assert!(config.set("smtp_port", "70000").is_err());
        assert!(config.set("no_such_key", "x").is_err());
        config.save(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let loaded: Config = toml::from_str(&content).unwrap();
        assert_eq!(loaded.notify.smtp.host, "smtp.example.com");
        assert_eq!(loaded.provider.retries, 4);
    }

    #[test]
    fn validate_rejects_malformed_webhook_url() {
        let mut config = Config::default();
        config.notify.webhook_url = "not a url".into();
        assert!(matches!(config.validate(), Err(AppError::Url(_))));
        config.notify.webhook_url = "https://hooks.example.com/fares".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_or_default_falls_back_on_bad_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[notify\nwebhook_timeout_secs = 3").unwrap();

        let config = Config::load_or_default(&path);
        assert_eq!(config.notify.webhook_timeout_secs, 10);
        assert_eq!(config.notify.smtp.port, 587);

        fs::write(&path, "[notify]\nwebhook_timeout_secs = 3\n").unwrap();
        assert_eq!(Config::load_or_default(&path).notify.webhook_timeout_secs, 3);
    }

    #[test]
    fn auth_status_reports_presence_only() {
        let mut config = Config::default();
        let status = config.auth_status();
        assert_eq!(status.provider, "serpapi");
        assert!(!status.serpapi_key);
        assert!(!status.smtp_configured);
        assert!(!status.webhook_configured);

        config.provider.api_key = "abc".into();
        config.notify.webhook_url = "https://hooks.example.com/fares".into();
        config.notify.smtp.host = "smtp.example.com".into();
        let status = config.auth_status();
        assert!(status.serpapi_key);
        assert!(status.webhook_configured);
        assert!(!status.smtp_configured);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["serpapi_key"], true);
        assert!(json.get("api_key").is_none());
    }

    #[test]
    fn login_normalises_provider_and_keeps_blank_values() {
        let mut config = Config::default();
        config.provider.api_key = "old".into();

        config.login(Some(" Google "), Some("  ")).unwrap();
        assert_eq!(config.provider.kind, "google-url");
        assert_eq!(config.provider.api_key, "old");

        config.login(None, Some("new-key")).unwrap();
        assert_eq!(config.provider.kind, "google-url");
        assert_eq!(config.provider.api_key, "new-key");

        let err = config.login(Some("skyscanner"), None).unwrap_err();
        assert!(matches!(err, AppError::Usage(_)));
        assert_eq!(config.provider.kind, "google-url");
    }

    #[test]
    fn read_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = Config::read(tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[provider]\nkind = \"google-url\"\n").unwrap();
        assert_eq!(config.provider.kind, "google-url");
        assert_eq!(config.provider.timeout_secs, 20);
        assert_eq!(config.notify.webhook_timeout_secs, 10);
    }

    #[test]
    fn smtp_missing_fields() {
        let mut smtp = SmtpConfig::default();
        assert_eq!(smtp.missing_fields().len(), 4);
        smtp.host = "smtp.example.com".into();
        smtp.username = "u".into();
        smtp.password = "p".into();
        smtp.sender = "s@example.com".into();
        assert!(smtp.missing_fields().is_empty());
    }

    #[test]
    fn redacted_masks_secrets() {
        let mut config = Config::default();
        config.provider.api_key = "abc".into();
        let shown = config.redacted();
        assert_eq!(shown.provider.api_key, "********");
        assert_eq!(shown.notify.smtp.password, "");
    }
}
