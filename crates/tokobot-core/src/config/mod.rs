mod defaults;


use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::TokoError;
use defaults::*;

/// Shortest interval accepted between two session backups.
pub const MIN_BACKUP_INTERVAL_SECS: u64 = 60;

/// Top-level tokobot configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
}

/// General bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Key of the stored session this process resumes.
    #[serde(default = "default_client_identity")]
    pub client_identity: String,
    /// JSON array of products answered by `!produk`.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            client_identity: default_client_identity(),
            catalog_path: default_catalog_path(),
            log_level: default_log_level(),
        }
    }
}

/// Google Gemini settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_gemini_model(),
        }
    }
}

/// Telegram bot used to relay pairing QR codes to the operator.
///
/// Both `bot_token` and `chat_id` must be set for relaying to work;
/// either missing is reported when a relay is attempted, not at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_url: default_telegram_api_url(),
        }
    }
}

/// Remote session store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// SQLite URL (`sqlite:...`) or file path of the session database.
    #[serde(default = "default_store_url")]
    pub store_url: String,
    /// Upper bound for every store and relay call.
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
    /// How often a ready session is re-saved.
    #[serde(default = "default_backup_interval")]
    pub backup_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_url: default_store_url(),
            timeout_secs: default_store_timeout(),
            backup_interval_secs: default_backup_interval(),
        }
    }
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Backup interval, never shorter than [`MIN_BACKUP_INTERVAL_SECS`].
    pub fn backup_interval(&self) -> Duration {
        Duration::from_secs(self.backup_interval_secs.max(MIN_BACKUP_INTERVAL_SECS))
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

/// WhatsApp client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Name shown in the phone's "Linked devices" list.
    #[serde(default = "default_device_name")]
    pub device_name: String,
    /// Allowed phone numbers (e.g. `["6281234567890"]`). Empty = allow all.
    #[serde(default)]
    pub allowed_users: Vec<String>,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            allowed_users: Vec::new(),
        }
    }
}

impl Config {
    /// Overlay environment variables on top of file values.
    ///
    /// Returns a notice for every value that was present but ignored.
    pub fn apply_env_overrides(&mut self) -> Vec<String> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup`. Empty values are treated as unset.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
        let mut ignored = Vec::new();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GEMINI_API_KEY") {
            self.gemini.api_key = v;
        }
        if let Some(v) = get("GEMINI_MODEL") {
            self.gemini.model = v;
        }
        if let Some(v) = get("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(v);
        }
        if let Some(v) = get("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = Some(v);
        }
        if let Some(v) = get("SESSION_STORE_URL") {
            self.session.store_url = v;
        }
        if let Some(v) = get("TOKOBOT_CLIENT_ID") {
            self.bot.client_identity = v;
        }
        if let Some(v) = get("PORT") {
            match v.parse() {
                Ok(port) => self.api.port = port,
                Err(_) => ignored.push(format!("ignoring invalid PORT value '{v}'")),
            }
        }
        ignored
    }

    /// Reject configurations the bot cannot serve with.
    pub fn validate(&self) -> Result<(), TokoError> {
        let mut missing = Vec::new();
        if self.gemini.api_key.trim().is_empty() {
            missing.push("gemini.api_key (GEMINI_API_KEY)");
        }
        if self.session.store_url.trim().is_empty() {
            missing.push("session.store_url (SESSION_STORE_URL)");
        }
        if self.bot.client_identity.trim().is_empty() {
            missing.push("bot.client_identity (TOKOBOT_CLIENT_ID)");
        }
        if !missing.is_empty() {
            return Err(TokoError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }
        if self.session.timeout_secs == 0 {
            return Err(TokoError::Config(
                "session.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// A validated configuration plus what happened while loading it.
///
/// Loading runs before logging is installed, so notices are handed back for
/// the caller to log once a subscriber exists.
#[derive(Debug)]
pub struct Loaded {
    pub config: Config,
    pub notices: Vec<String>,
}

/// Load configuration: `.env`, the TOML file (defaults if absent), env overrides, validation.
pub fn load(path: &str) -> Result<Loaded, TokoError> {
    let env_file = dotenvy::dotenv().ok();
    let mut loaded = load_from(path, |key| std::env::var(key).ok())?;
    if let Some(env_path) = env_file {
        loaded
            .notices
            .insert(0, format!("loaded environment from {}", env_path.display()));
    }
    Ok(loaded)
}

/// [`load`] with overrides read from `lookup` instead of the process env.
pub fn load_from(path: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Loaded, TokoError> {
    let mut notices = Vec::new();
    if !Path::new(path).exists() {
        notices.push(format!("Config file not found at {path}, using defaults"));
    }

    let mut config = load_file(path)?;
    notices.extend(config.apply_overrides_from(lookup));
    config.validate()?;
    Ok(Loaded { config, notices })
}

/// Parse the TOML file only. Falls back to defaults if the file does not exist.
pub fn load_file(path: &str) -> Result<Config, TokoError> {
    let path = Path::new(path);
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| TokoError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    toml::from_str(&content).map_err(|e| TokoError::Config(format!("failed to parse config: {e}")))
}
