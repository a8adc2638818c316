use chatvox_core::{
    session::DEFAULT_PERSONALITY,
    speech::{DEFAULT_OUTPUT_FORMAT, DEFAULT_TTS_MODEL},
};
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

/// Defines the supported backends for text generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Gemini,
}

impl Provider {
    /// Base URL of the provider's OpenAI-compatible chat API.
    pub fn api_base(&self) -> &'static str {
        match self {
            Provider::OpenAI => "https://api.openai.com/v1",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAI => "gpt-4o",
            Provider::Gemini => "gemini-2.0-flash-exp",
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub provider: Provider,
    pub llm_api_key: String,
    pub chat_model: String,
    pub elevenlabs_api_key: String,
    pub voice_id: String,
    pub tts_model: String,
    pub output_format: String,
    pub default_personality: String,
    pub gateway_timeout: Duration,
    pub static_dir: PathBuf,
    pub log_level: Level,
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str = match std::env::var("BIND_ADDRESS") {
            Ok(address) => address,
            Err(_) => {
                let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
                let port = port.parse::<u16>().map_err(|e| {
                    ConfigError::InvalidValue("PORT".to_string(), e.to_string())
                })?;
                format!("0.0.0.0:{port}")
            }
        };
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let provider_str = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "gemini".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "gemini" => Provider::Gemini,
            "openai" => Provider::OpenAI,
            other => {
                return Err(ConfigError::InvalidValue(
                    "LLM_PROVIDER".to_string(),
                    format!("'{other}' is not one of 'gemini', 'openai'"),
                ));
            }
        };

        let llm_api_key = match provider {
            Provider::Gemini => std::env::var("GEMINI_API_KEY").map_err(|_| {
                ConfigError::MissingVar(
                    "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
                )
            })?,
            Provider::OpenAI => std::env::var("OPENAI_API_KEY").map_err(|_| {
                ConfigError::MissingVar(
                    "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                )
            })?,
        };

        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| provider.default_model().to_string());

        let elevenlabs_api_key = required("ELEVENLABS_API_KEY")?;
        let voice_id = required("ELEVENLABS_VOICE_ID")?;
        let tts_model =
            std::env::var("ELEVENLABS_MODEL_ID").unwrap_or_else(|_| DEFAULT_TTS_MODEL.to_string());
        let output_format = std::env::var("ELEVENLABS_OUTPUT_FORMAT")
            .unwrap_or_else(|_| DEFAULT_OUTPUT_FORMAT.to_string());

        let default_personality = std::env::var("DEFAULT_PERSONALITY")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PERSONALITY.to_string());

        let timeout_str = std::env::var("GATEWAY_TIMEOUT_SECS").unwrap_or_else(|_| "30".to_string());
        let gateway_timeout = match timeout_str.parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                return Err(ConfigError::InvalidValue(
                    "GATEWAY_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", timeout_str),
                ));
            }
        };

        let static_dir = std::env::var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./public"));

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            provider,
            llm_api_key,
            chat_model,
            elevenlabs_api_key,
            voice_id,
            tts_model,
            output_format,
            default_personality,
            gateway_timeout,
            static_dir,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    const ALL_VARS: &[&str] = &[
        "BIND_ADDRESS",
        "PORT",
        "LLM_PROVIDER",
        "GEMINI_API_KEY",
        "OPENAI_API_KEY",
        "CHAT_MODEL",
        "ELEVENLABS_API_KEY",
        "ELEVENLABS_VOICE_ID",
        "ELEVENLABS_MODEL_ID",
        "ELEVENLABS_OUTPUT_FORMAT",
        "DEFAULT_PERSONALITY",
        "GATEWAY_TIMEOUT_SECS",
        "STATIC_DIR",
        "RUST_LOG",
    ];

    fn clear_env_vars() {
        unsafe {
            for var in ALL_VARS {
                env::remove_var(var);
            }
        }
    }

    fn set_minimal_env() {
        unsafe {
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
            env::set_var("ELEVENLABS_API_KEY", "test-elevenlabs-key");
            env::set_var("ELEVENLABS_VOICE_ID", "voice-123");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    fn test_provider_api_base() {
        assert!(Provider::Gemini.api_base().contains("generativelanguage"));
        assert!(Provider::OpenAI.api_base().contains("api.openai.com"));
    }

    #[test]
    #[serial]
    fn test_config_from_env_minimal() {
        clear_env_vars();
        set_minimal_env();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.provider, Provider::Gemini);
        assert_eq!(config.llm_api_key, "test-gemini-key");
        assert_eq!(config.chat_model, "gemini-2.0-flash-exp");
        assert_eq!(config.elevenlabs_api_key, "test-elevenlabs-key");
        assert_eq!(config.voice_id, "voice-123");
        assert_eq!(config.tts_model, "eleven_turbo_v2_5");
        assert_eq!(config.output_format, "mp3_44100_128");
        assert_eq!(config.default_personality, DEFAULT_PERSONALITY);
        assert_eq!(config.gateway_timeout, Duration::from_secs(30));
        assert_eq!(config.static_dir, PathBuf::from("./public"));
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    #[serial]
    fn test_config_port_sets_bind_address() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("PORT", "8080");
        }

        let config = Config::from_env().expect("Config should load successfully");
        assert_eq!(config.bind_address.to_string(), "0.0.0.0:8080");
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "127.0.0.1:9000");
            env::set_var("PORT", "8080");
            env::set_var("LLM_PROVIDER", "OpenAI");
            env::set_var("OPENAI_API_KEY", "custom-openai-key");
            env::set_var("CHAT_MODEL", "gpt-4o-mini");
            env::set_var("ELEVENLABS_API_KEY", "custom-elevenlabs-key");
            env::set_var("ELEVENLABS_VOICE_ID", "voice-xyz");
            env::set_var("ELEVENLABS_MODEL_ID", "eleven_multilingual_v2");
            env::set_var("ELEVENLABS_OUTPUT_FORMAT", "mp3_22050_32");
            env::set_var("DEFAULT_PERSONALITY", "You are a pirate.");
            env::set_var("GATEWAY_TIMEOUT_SECS", "5");
            env::set_var("STATIC_DIR", "/srv/chatvox");
            env::set_var("RUST_LOG", "debug");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:9000");
        assert_eq!(config.provider, Provider::OpenAI);
        assert_eq!(config.llm_api_key, "custom-openai-key");
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert_eq!(config.voice_id, "voice-xyz");
        assert_eq!(config.tts_model, "eleven_multilingual_v2");
        assert_eq!(config.output_format, "mp3_22050_32");
        assert_eq!(config.default_personality, "You are a pirate.");
        assert_eq!(config.gateway_timeout, Duration::from_secs(5));
        assert_eq!(config.static_dir, PathBuf::from("/srv/chatvox"));
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    #[serial]
    fn test_config_invalid_bind_address() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("BIND_ADDRESS", "not-a-valid-address");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "BIND_ADDRESS"),
            _ => panic!("Expected InvalidValue for BIND_ADDRESS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_port() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("PORT", "seventy");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "PORT"),
            _ => panic!("Expected InvalidValue for PORT"),
        }
    }

    #[test]
    #[serial]
    fn test_config_unknown_provider() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("LLM_PROVIDER", "claude");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "LLM_PROVIDER"),
            _ => panic!("Expected InvalidValue for LLM_PROVIDER"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_timeout() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("GATEWAY_TIMEOUT_SECS", "0");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "GATEWAY_TIMEOUT_SECS"),
            _ => panic!("Expected InvalidValue for GATEWAY_TIMEOUT_SECS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }

    #[test]
    #[serial]
    fn test_config_missing_gemini_key() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::remove_var("GEMINI_API_KEY");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(msg) => assert!(msg.contains("GEMINI_API_KEY")),
            _ => panic!("Expected MissingVar for GEMINI_API_KEY"),
        }
    }

    #[test]
    #[serial]
    fn test_config_missing_voice_id() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::remove_var("ELEVENLABS_VOICE_ID");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(var) => assert_eq!(var, "ELEVENLABS_VOICE_ID"),
            _ => panic!("Expected MissingVar for ELEVENLABS_VOICE_ID"),
        }
    }
}
