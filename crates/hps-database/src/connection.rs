//! 数据库连接管理
//!
//! 连接池按请求签出连接，每次提交使用独立事务；
//! 池大小与超时显式配置。

use hps_core::config::DatabaseConfig;
use hps_core::{HpsError, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// 数据库连接池
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
    transaction_timeout: Duration,
}

impl DatabasePool {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| HpsError::Database(e.to_string()))?;

        tracing::info!(
            "Database pool connected ({}..{} connections, acquire timeout {}s)",
            config.min_connections,
            config.max_connections,
            config.acquire_timeout_secs
        );

        Ok(Self {
            pool,
            transaction_timeout: Duration::from_secs(config.transaction_timeout_secs),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 单次写事务允许的最长时间
    pub fn transaction_timeout(&self) -> Duration {
        self.transaction_timeout
    }
}
