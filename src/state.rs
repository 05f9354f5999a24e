use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::source::PgMetrics;

pub struct AppState {
    pub config: Config,
    pub pool: PgPool,
}

impl AppState {
    pub fn new(config: Config, pool: PgPool) -> Arc<Self> {
        Arc::new(Self { config, pool })
    }

    pub fn metrics(&self) -> PgMetrics {
        PgMetrics::new(self.pool.clone(), self.config.channel.clone())
    }
}
