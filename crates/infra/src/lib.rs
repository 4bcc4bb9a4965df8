//! Infrastructure layer: storage, configuration and the inventory service.

pub mod config;
pub mod service;
pub mod store;


pub use config::{ConfigError, DatabaseConfig};
pub use service::{InventoryService, ServiceError, ServiceResult};
pub use store::{
    InMemoryWarehouseStore, PostgresWarehouseStore, StoreError, StoreResult, WarehouseStore,
    WarehouseTx,
};
