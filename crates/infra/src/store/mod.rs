//! Transactional storage boundary for the warehouse records.
//!
//! A [`WarehouseStore`] hands out [`WarehouseTx`] units of work. Everything a
//! service operation reads and writes goes through one transaction, which is
//! either committed as a whole or dropped (rolled back).
//!
//! ## Lock order
//!
//! Methods documented as locking hold their row until the transaction ends.
//! Callers take locks in one order only: shipment, then shipment line, then
//! item. A line is found through [`WarehouseTx::shipment_item`] (no lock),
//! its shipment locked, and the line then re-read with
//! [`WarehouseTx::lock_shipment_item`].

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use stocktrack_core::{CompanyId, ItemId, ShipmentId, ShipmentItemId};
use stocktrack_inventory::{Company, Item, ItemAllocation, Shipment, ShipmentItem};

pub use in_memory::InMemoryWarehouseStore;
pub use postgres::PostgresWarehouseStore;

/// Name of the unique constraint on company names.
pub const COMPANY_NAME_UNIQUE: &str = "companies_name_key";

/// Name of the unique constraint on item SKUs.
pub const ITEM_SKU_UNIQUE: &str = "items_sku_key";

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage failure.
///
/// Constraint violations are reported separately so the service layer can turn
/// them back into domain errors (e.g. a racing duplicate SKU insert).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint {constraint} violated: {message}")]
    UniqueViolation { constraint: String, message: String },

    #[error("foreign key violated: {0}")]
    ForeignKeyViolation(String),

    #[error("check constraint violated: {0}")]
    CheckViolation(String),

    #[error("no {table} row with id {id}")]
    MissingRow { table: &'static str, id: String },

    #[error("failed to decode {what}: {message}")]
    Decode { what: &'static str, message: String },

    #[error("database error in {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn missing_row(table: &'static str, id: impl core::fmt::Display) -> Self {
        Self::MissingRow {
            table,
            id: id.to_string(),
        }
    }

    pub fn is_unique_violation_of(&self, name: &str) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint, .. } if constraint == name)
    }
}

/// Factory for units of work.
#[async_trait]
pub trait WarehouseStore: Send + Sync {
    type Tx: WarehouseTx;

    /// Start a unit of work.
    async fn begin(&self) -> StoreResult<Self::Tx>;
}

/// One unit of work over companies, items, shipments and shipment lines.
///
/// Dropping a transaction without calling [`WarehouseTx::commit`] discards
/// every write made through it.
#[async_trait]
pub trait WarehouseTx: Send {
    async fn company(&mut self, id: CompanyId) -> StoreResult<Option<Company>>;
    async fn company_by_name(&mut self, name: &str) -> StoreResult<Option<Company>>;
    async fn insert_company(&mut self, company: &Company) -> StoreResult<()>;
    /// Whether any item or shipment still references the company.
    async fn company_has_dependents(&mut self, id: CompanyId) -> StoreResult<bool>;
    async fn delete_company(&mut self, id: CompanyId) -> StoreResult<()>;

    /// Load an item. The item stays locked against other writers until this
    /// transaction ends.
    async fn item(&mut self, id: ItemId) -> StoreResult<Option<Item>>;
    async fn item_by_sku(&mut self, sku: &str) -> StoreResult<Option<Item>>;
    async fn items_for_company(&mut self, company_id: CompanyId) -> StoreResult<Vec<Item>>;
    async fn insert_item(&mut self, item: &Item) -> StoreResult<()>;
    async fn update_item(&mut self, item: &Item) -> StoreResult<()>;
    /// Delete an item together with its (closed) shipment lines.
    async fn delete_item(&mut self, id: ItemId) -> StoreResult<()>;
    /// Open inbound/allocated quantity of an item on unshipped shipments.
    async fn item_allocation(&mut self, id: ItemId) -> StoreResult<ItemAllocation>;

    /// Load a shipment and lock it until this transaction ends.
    async fn shipment(&mut self, id: ShipmentId) -> StoreResult<Option<Shipment>>;
    async fn insert_shipment(&mut self, shipment: &Shipment) -> StoreResult<()>;
    async fn update_shipment(&mut self, shipment: &Shipment) -> StoreResult<()>;

    /// Load a shipment line without locking it.
    async fn shipment_item(&mut self, id: ShipmentItemId) -> StoreResult<Option<ShipmentItem>>;
    /// Load a shipment line and lock it. Lock its shipment first.
    async fn lock_shipment_item(&mut self, id: ShipmentItemId) -> StoreResult<Option<ShipmentItem>>;
    async fn shipment_items(&mut self, shipment_id: ShipmentId) -> StoreResult<Vec<ShipmentItem>>;
    async fn insert_shipment_item(&mut self, line: &ShipmentItem) -> StoreResult<()>;
    async fn update_shipment_item(&mut self, line: &ShipmentItem) -> StoreResult<()>;
    async fn delete_shipment_item(&mut self, id: ShipmentItemId) -> StoreResult<()>;

    /// Make every write in this unit of work durable.
    async fn commit(self) -> StoreResult<()>;
}
