use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported backend providers for text generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Gemini,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub provider: Provider,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub chat_model: String,
    pub image_model: String,
    pub speech_model: String,
    pub log_level: Level,
    pub prompts_path: PathBuf,
    pub upload_dir: PathBuf,
    /// URL path under which `upload_dir` is served.
    pub public_media_path: String,
    /// Upper bound on chat sessions held in memory at once.
    pub max_sessions: usize,
    /// Sessions unused for this long are dropped from memory.
    pub session_idle_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let provider_str = std::env::var("CHAT_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "openai" => Provider::OpenAI,
            "gemini" => Provider::Gemini,
            other => {
                return Err(ConfigError::InvalidValue(
                    "CHAT_PROVIDER".to_string(),
                    format!("'{}' is not a supported provider", other),
                ));
            }
        };

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();

        let chat_model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let image_model = std::env::var("IMAGE_MODEL").unwrap_or_else(|_| "dall-e-3".to_string());
        let speech_model = std::env::var("SPEECH_MODEL").unwrap_or_else(|_| "tts-1".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));

        let upload_dir = std::env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./uploads"));

        let public_media_path =
            std::env::var("PUBLIC_MEDIA_PATH").unwrap_or_else(|_| "/media".to_string());
        if !public_media_path.starts_with('/') || public_media_path.len() < 2 {
            return Err(ConfigError::InvalidValue(
                "PUBLIC_MEDIA_PATH".to_string(),
                format!("'{}' must be an absolute path like /media", public_media_path),
            ));
        }
        let public_media_path = public_media_path.trim_end_matches('/').to_string();

        let max_sessions_str =
            std::env::var("MAX_SESSIONS").unwrap_or_else(|_| "10000".to_string());
        let max_sessions = max_sessions_str
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "MAX_SESSIONS".to_string(),
                    format!("'{}' is not a positive number", max_sessions_str),
                )
            })?;

        let idle_secs_str =
            std::env::var("SESSION_IDLE_SECS").unwrap_or_else(|_| "1800".to_string());
        let session_idle_timeout = idle_secs_str
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidValue("SESSION_IDLE_SECS".to_string(), e.to_string()))?;

        match provider {
            Provider::OpenAI => {
                if openai_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                    ));
                }
            }
            Provider::Gemini => {
                if gemini_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
                    ));
                }
            }
        }

        Ok(Self {
            bind_address,
            database_url,
            provider,
            openai_api_key,
            gemini_api_key,
            chat_model,
            image_model,
            speech_model,
            log_level,
            prompts_path,
            upload_dir,
            public_media_path,
            max_sessions,
            session_idle_timeout,
        })
    }
}
