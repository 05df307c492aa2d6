//! Default value functions used by serde for config deserialization.

pub fn default_name() -> String {
    "Tokobot".to_string()
}

pub fn default_data_dir() -> String {
    "~/.tokobot".to_string()
}

pub fn default_client_identity() -> String {
    "tokobot".to_string()
}

pub fn default_catalog_path() -> String {
    "data/products.json".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

pub fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

pub fn default_store_url() -> String {
    "~/.tokobot/data/sessions.db".to_string()
}

pub fn default_store_timeout() -> u64 {
    10
}

pub fn default_backup_interval() -> u64 {
    300
}

pub fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_api_port() -> u16 {
    3000
}

pub fn default_device_name() -> String {
    "Tokobot".to_string()
}
