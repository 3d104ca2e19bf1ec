use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use crate::config::DatabaseConfig;
use crate::error::{AppError, Result};
use std::time::Duration;

/// Creates a new database connection pool.
///
/// No connection is opened here; each data-access call checks one out on
/// demand and hands it back when the client is dropped.
pub fn create_pool(database: &DatabaseConfig) -> Result<Pool> {
    let mut cfg = Config::new();
    cfg.host = Some(database.host.clone());
    cfg.port = Some(database.port);
    cfg.dbname = Some(database.dbname.clone());
    cfg.user = Some(database.user.clone());
    cfg.password = Some(database.password.to_string());

    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    let mut pool_cfg = PoolConfig::new(32);
    pool_cfg.timeouts = deadpool_postgres::Timeouts {
        wait: Some(Duration::from_secs(5)),
        create: Some(Duration::from_secs(2)),
        recycle: Some(Duration::from_secs(1)),
    };
    cfg.pool = Some(pool_cfg);

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(AppError::from)
}
