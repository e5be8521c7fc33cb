use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors that can occur when loading configuration or case fixtures.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read a file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Invalid regex pattern.
    InvalidRegex { pattern: String, source: regex::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse '{}': {}", path.display(), source)
            }
            Self::InvalidRegex { pattern, source } => {
                write!(f, "invalid regex pattern '{}': {}", pattern, source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::InvalidRegex { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_WHATSAPP_API_BASE: &str = "https://graph.facebook.com/v19.0";

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default = "default_bind_addr")]
    bind_addr: String,
    /// Telegram bot token. The Telegram adapter only runs when this is set.
    telegram_bot_token: Option<String>,
    /// WhatsApp Cloud API webhook settings.
    whatsapp: Option<WhatsAppFile>,
    /// Idle minutes before a session is evicted (0 = never).
    #[serde(default = "default_session_ttl_minutes")]
    session_ttl_minutes: u64,
    #[serde(default = "default_reap_interval_secs")]
    reap_interval_secs: u64,
    /// JSON file with case fixtures. Built-in cases are used when unset.
    fixtures_path: Option<String>,
    /// Directory of front-end assets served for unmatched routes.
    static_dir: Option<String>,
    /// Directory for state files (logs). Defaults to current directory.
    data_dir: Option<String>,
}

#[derive(Deserialize)]
struct WhatsAppFile {
    verify_token: String,
    access_token: Option<String>,
    phone_number_id: Option<String>,
    api_base: Option<String>,
}

fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.to_string()
}

fn default_session_ttl_minutes() -> u64 {
    120
}

fn default_reap_interval_secs() -> u64 {
    60
}

/// WhatsApp Cloud API settings.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    /// Token Meta echoes back during webhook verification.
    pub verify_token: String,
    /// Graph API token for sending replies. Replies are skipped without it.
    pub access_token: Option<String>,
    pub phone_number_id: Option<String>,
    pub api_base: String,
}

pub struct Config {
    /// Path the config was loaded from, if any.
    pub config_path: Option<PathBuf>,
    pub bind_addr: SocketAddr,
    pub telegram_bot_token: Option<String>,
    pub whatsapp: Option<WhatsAppConfig>,
    /// `None` disables eviction.
    pub session_ttl: Option<Duration>,
    pub reap_interval: Duration,
    pub fixtures_path: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
    /// Directory for state files (logs).
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: None,
            bind_addr: DEFAULT_BIND_ADDR.parse().expect("default bind address is valid"),
            telegram_bot_token: None,
            whatsapp: None,
            session_ttl: Some(Duration::from_secs(default_session_ttl_minutes() * 60)),
            reap_interval: Duration::from_secs(default_reap_interval_secs()),
            fixtures_path: None,
            static_dir: None,
            data_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        let bind_addr = file.bind_addr.parse::<SocketAddr>().map_err(|_| {
            ConfigError::Validation(format!("bind_addr '{}' is not a valid socket address", file.bind_addr))
        })?;

        let telegram_bot_token = match file.telegram_bot_token {
            Some(token) if token.trim().is_empty() => None,
            Some(token) => {
                // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
                let token_parts: Vec<&str> = token.split(':').collect();
                if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
                    return Err(ConfigError::Validation(
                        "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into(),
                    ));
                }
                Some(token)
            }
            None => None,
        };

        let whatsapp = file.whatsapp.map(validate_whatsapp).transpose()?;

        if file.reap_interval_secs == 0 {
            return Err(ConfigError::Validation("reap_interval_secs must be greater than 0".into()));
        }
        let session_ttl = match file.session_ttl_minutes {
            0 => None,
            minutes => Some(Duration::from_secs(minutes * 60)),
        };

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            config_path: Some(config_path),
            bind_addr,
            telegram_bot_token,
            whatsapp,
            session_ttl,
            reap_interval: Duration::from_secs(file.reap_interval_secs),
            fixtures_path: file.fixtures_path.map(PathBuf::from),
            static_dir: file.static_dir.map(PathBuf::from),
            data_dir,
        })
    }
}

fn validate_whatsapp(file: WhatsAppFile) -> Result<WhatsAppConfig, ConfigError> {
    if file.verify_token.trim().is_empty() {
        return Err(ConfigError::Validation("whatsapp.verify_token is required".into()));
    }
    let access_token = file.access_token.filter(|t| !t.trim().is_empty());
    let phone_number_id = file.phone_number_id.filter(|p| !p.trim().is_empty());
    if access_token.is_some() && phone_number_id.is_none() {
        return Err(ConfigError::Validation(
            "whatsapp.phone_number_id is required when access_token is set".into(),
        ));
    }
    Ok(WhatsAppConfig {
        verify_token: file.verify_token,
        access_token,
        phone_number_id,
        api_base: file
            .api_base
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_WHATSAPP_API_BASE.to_string()),
    })
}
