use std::env;

/// Load .env file if it exists (called automatically when using `from_env`)
pub fn load_dotenv() {
    // Silently ignore errors (file might not exist)
    let _ = dotenvy::dotenv();
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord bot token
    pub discord_token: String,
    /// Base URL of the remote ranking API (e.g. https://rank.example.com/api)
    pub rank_api_url: String,
    /// Override for the SQLite database file location
    pub db_path: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// This function automatically loads a .env file from the project root if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();
        Self::from_env_inner()
    }

    /// Internal method to load from env without loading .env
    fn from_env_inner() -> Result<Self, ConfigError> {
        let discord_token = env::var("DISCORD_TOKEN")
            .map_err(|_| ConfigError::MissingVar("DISCORD_TOKEN".to_string()))?;
        let rank_api_url = env::var("RANK_API_URL")
            .map_err(|_| ConfigError::MissingVar("RANK_API_URL".to_string()))?;

        Ok(Self {
            discord_token,
            rank_api_url: rank_api_url.trim_end_matches('/').to_string(),
            db_path: env::var("HARMARI_DB_PATH").ok(),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env vars are process-global; serialize the tests that touch them.
    static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn test_config_from_env() {
        let _guard = ENV_MUTEX.lock().unwrap();
        unsafe {
            env::set_var("DISCORD_TOKEN", "test-token");
            env::set_var("RANK_API_URL", "https://rank.example.com/api/");
            env::remove_var("HARMARI_DB_PATH");
        }

        let config = Config::from_env_inner().unwrap();

        assert_eq!(config.discord_token, "test-token");
        // Trailing slash is stripped so endpoint joins stay predictable
        assert_eq!(config.rank_api_url, "https://rank.example.com/api");
        assert!(config.db_path.is_none());
    }

    #[test]
    fn test_config_missing_token() {
        let _guard = ENV_MUTEX.lock().unwrap();
        unsafe {
            env::remove_var("DISCORD_TOKEN");
            env::set_var("RANK_API_URL", "https://rank.example.com/api");
        }

        let result = Config::from_env_inner();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("DISCORD_TOKEN"));
    }
}
