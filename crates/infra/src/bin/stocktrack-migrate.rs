//! Apply the warehouse schema to the database named by `DATABASE_URL`.

use anyhow::Context;
use tracing::info;

use stocktrack_infra::{DatabaseConfig, PostgresWarehouseStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stocktrack_observability::init();

    let config = DatabaseConfig::from_env().context("loading database configuration")?;
    let pool = config.connect().await.context("connecting to the database")?;

    let store = PostgresWarehouseStore::new(pool);
    store.migrate().await.context("applying schema")?;

    info!("schema is up to date");
    Ok(())
}
