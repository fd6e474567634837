use serde::Deserialize;
use std::env;

const DEV_ADMIN_TOKEN: &str = "dev-admin-token-only-for-local-testing";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

impl StoreBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Some(StoreBackend::Mongo),
            "memory" => Some(StoreBackend::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaderboardSettings {
    pub default_limit: u64,
    pub max_limit: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationSettings {
    /// Treat `0` completion time, difficulty or moves as missing.
    pub reject_zero_metrics: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub store_backend: StoreBackend,
    pub mongo_uri: String,
    pub mongo_database: String,
    /// Shared secret gating organizer endpoints
    pub admin_token: String,
    /// Overrides the scheme/host derived from requests when building callback URLs
    pub public_base_url: Option<String>,
    pub leaderboard: LeaderboardSettings,
    pub validation: ValidationSettings,
    pub health_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "0.0.0.0:3000".to_string(),
            store_backend: StoreBackend::Mongo,
            mongo_uri: "mongodb://localhost:27017".to_string(),
            mongo_database: "puzzle_results".to_string(),
            admin_token: DEV_ADMIN_TOKEN.to_string(),
            public_base_url: None,
            leaderboard: LeaderboardSettings {
                default_limit: 10,
                max_limit: 1000,
            },
            validation: ValidationSettings {
                reject_zero_metrics: false,
            },
            health_timeout_ms: 1000,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first (two levels up), then the local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/{env}.toml + APP_ prefixed overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let defaults = Config::default();

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .or_else(|_| env::var("PORT").map(|port| format!("0.0.0.0:{}", port)))
            .unwrap_or(defaults.bind_addr);

        let store_backend = match settings
            .get_string("store.backend")
            .or_else(|_| env::var("STORE_BACKEND"))
        {
            Ok(value) => StoreBackend::parse(&value).ok_or_else(|| {
                config::ConfigError::Message(format!("Unknown store backend: {}", value))
            })?,
            Err(_) => defaults.store_backend,
        };

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or(defaults.mongo_uri);

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or(defaults.mongo_database);

        let admin_token = match settings
            .get_string("auth.admin_token")
            .or_else(|_| env::var("ADMIN_TOKEN"))
        {
            Ok(token) if !token.is_empty() => token,
            _ if env == "prod" => {
                return Err(config::ConfigError::Message(
                    "ADMIN_TOKEN must be set in production".to_string(),
                ));
            }
            _ => {
                tracing::warn!("Using default ADMIN_TOKEN (dev mode only!)");
                defaults.admin_token
            }
        };

        let public_base_url = settings
            .get_string("server.public_base_url")
            .or_else(|_| env::var("PUBLIC_BASE_URL"))
            .ok()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        let default_limit = read_u64(&settings, "leaderboard.default_limit")
            .unwrap_or(defaults.leaderboard.default_limit)
            .max(1);
        let max_limit = read_u64(&settings, "leaderboard.max_limit")
            .unwrap_or(defaults.leaderboard.max_limit)
            .max(default_limit);

        let reject_zero_metrics = settings
            .get_bool("validation.reject_zero_metrics")
            .unwrap_or(defaults.validation.reject_zero_metrics);

        let health_timeout_ms =
            read_u64(&settings, "health.timeout_ms").unwrap_or(defaults.health_timeout_ms);

        Ok(Config {
            bind_addr,
            store_backend,
            mongo_uri,
            mongo_database,
            admin_token,
            public_base_url,
            leaderboard: LeaderboardSettings {
                default_limit,
                max_limit,
            },
            validation: ValidationSettings {
                reject_zero_metrics,
            },
            health_timeout_ms,
        })
    }

    pub fn health_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.health_timeout_ms)
    }
}

fn read_u64(settings: &config::Config, key: &str) -> Option<u64> {
    settings
        .get_int(key)
        .ok()
        .and_then(|value| u64::try_from(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "APP_ENV",
        "ADMIN_TOKEN",
        "STORE_BACKEND",
        "MONGO_URI",
        "PUBLIC_BASE_URL",
        "SKIP_ROOT_ENV",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
        env::set_var("SKIP_ROOT_ENV", "1");
    }

    #[test]
    #[serial]
    fn test_defaults_in_dev() {
        clear_env();
        let config = Config::load().unwrap();
        assert_eq!(config.store_backend, StoreBackend::Mongo);
        assert_eq!(config.leaderboard.default_limit, 10);
        assert_eq!(config.admin_token, DEV_ADMIN_TOKEN);
        assert!(!config.validation.reject_zero_metrics);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        env::set_var("STORE_BACKEND", "memory");
        env::set_var("ADMIN_TOKEN", "s3cret");
        env::set_var("PUBLIC_BASE_URL", "https://results.example.com/");

        let config = Config::load().unwrap();
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.admin_token, "s3cret");
        assert_eq!(
            config.public_base_url.as_deref(),
            Some("https://results.example.com")
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_prod_requires_admin_token() {
        clear_env();
        env::set_var("APP_ENV", "prod");
        assert!(Config::load().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_unknown_backend_is_rejected() {
        clear_env();
        env::set_var("STORE_BACKEND", "sqlite");
        assert!(Config::load().is_err());
        clear_env();
    }
}
