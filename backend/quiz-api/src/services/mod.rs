use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, StoreBackend};
use crate::store::{MemoryStore, RedisStore, SessionStore};
use crate::utils::retry::{retry_async_with_config, RetryConfig};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn SessionStore>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn SessionStore> = match config.store.backend {
            StoreBackend::Memory => {
                tracing::info!("Using in-memory session store");
                Arc::new(MemoryStore::new())
            }
            StoreBackend::Redis => Arc::new(connect_redis(&config).await?),
        };

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: Arc<dyn SessionStore>) -> Self {
        Self { config, store }
    }
}

async fn connect_redis(config: &Config) -> anyhow::Result<RedisStore> {
    let uri = config
        .store
        .redis_uri
        .clone()
        .ok_or_else(|| anyhow::anyhow!("Redis backend selected without a redis URI"))?;
    let client = redis::Client::open(uri)?;

    tracing::info!("Attempting to connect to Redis...");

    let store = retry_async_with_config(RetryConfig::startup(), || async {
        let store = tokio::time::timeout(
            Duration::from_secs(30),
            RedisStore::connect(client.clone(), &config.store.key_prefix),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        tokio::time::timeout(Duration::from_secs(5), store.ping())
            .await
            .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        Ok::<_, anyhow::Error>(store)
    })
    .await?;

    tracing::info!(
        "Redis session store ready (prefix: {})",
        config.store.key_prefix
    );
    Ok(store)
}

pub mod activation_service;
pub mod answer_service;
pub mod grading_service;
pub mod leaderboard_service;
pub mod question_service;
pub mod session_service;
