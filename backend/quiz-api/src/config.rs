use serde::Deserialize;
use std::env;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8081";
pub const DEFAULT_KEY_PREFIX: &str = "quiz";
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub countdown_tick_interval_ms: u64,
    /// `user:password` expected on `/metrics`.
    pub metrics_auth: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Redis,
}

impl std::str::FromStr for StoreBackend {
    type Err = config::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "redis" => Ok(StoreBackend::Redis),
            other => Err(config::ConfigError::Message(format!(
                "unknown store backend '{}', expected 'memory' or 'redis'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub redis_uri: Option<String>,
    pub key_prefix: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let backend = settings
            .get_string("store.backend")
            .or_else(|_| env::var("STORE_BACKEND"))
            .unwrap_or_else(|_| "memory".to_string())
            .parse::<StoreBackend>()?;

        let redis_uri = settings
            .get_string("store.redis_uri")
            .or_else(|_| env::var("REDIS_URI"))
            .ok();

        if backend == StoreBackend::Redis && redis_uri.is_none() {
            return Err(config::ConfigError::Message(
                "store.redis_uri or REDIS_URI must be set for the redis backend".to_string(),
            ));
        }

        let key_prefix = settings
            .get_string("store.key_prefix")
            .unwrap_or_else(|_| DEFAULT_KEY_PREFIX.to_string());

        let jwt_secret = match settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
        {
            Ok(secret) => secret,
            Err(_) if app_env == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ));
            }
            Err(_) => {
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let bind_addr = settings
            .get_string("server.bind_addr")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        let countdown_tick_interval_ms = settings
            .get_int("countdown.tick_interval_ms")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_TICK_INTERVAL_MS);

        let metrics_auth = settings
            .get_string("metrics.auth")
            .or_else(|_| env::var("METRICS_AUTH"))
            .unwrap_or_else(|_| "admin:changeme".to_string());

        Ok(Config {
            store: StoreConfig {
                backend,
                redis_uri,
                key_prefix,
            },
            jwt_secret,
            bind_addr,
            countdown_tick_interval_ms,
            metrics_auth,
        })
    }

    /// In-memory configuration for local runs and tests.
    pub fn in_memory(jwt_secret: &str) -> Self {
        Config {
            store: StoreConfig {
                backend: StoreBackend::Memory,
                redis_uri: None,
                key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            },
            jwt_secret: jwt_secret.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            countdown_tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            metrics_auth: "admin:changeme".to_string(),
        }
    }
}
