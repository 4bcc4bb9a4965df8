//! Inventory error taxonomy.
//!
//! Every variant is a validation failure raised before anything is persisted.
//! Callers map them to user-facing messages through [`InventoryError::code`].

use thiserror::Error;

use stocktrack_core::{CompanyId, DomainError, ItemId, ShipmentId, ShipmentItemId};

pub type InventoryResult<T> = Result<T, InventoryError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// The item a shipment line refers to has no inventory record.
    #[error("no inventory record exists for item {item_id}")]
    MissingInventoryRecord { item_id: ItemId },

    #[error(
        "item {sku} belongs to company {item_company}, but the shipment belongs to company {shipment_company}"
    )]
    IncompatibleCompany {
        sku: String,
        item_company: CompanyId,
        shipment_company: CompanyId,
    },

    #[error("item {sku} is not shippable and cannot be added to an outbound shipment")]
    ItemNotShippable { sku: String },

    #[error("cannot allocate {requested} of item {sku}: only {available} available")]
    InvalidInventoryQuantity {
        sku: String,
        requested: i64,
        available: i64,
    },

    #[error(
        "cannot change the quantity of item {sku} from {current} to {requested}: only {available} available beyond the current line"
    )]
    InvalidInventoryQuantityEdit {
        sku: String,
        current: i64,
        requested: i64,
        available: i64,
    },

    #[error(
        "item {sku} cannot be deleted while on shipments ({inbound} inbound, {allocated} allocated)"
    )]
    ItemOnShipment {
        sku: String,
        inbound: i64,
        allocated: i64,
    },

    #[error(
        "shipping cannot be disabled for item {sku} while on shipments ({inbound} inbound, {allocated} allocated)"
    )]
    DisableItemOnShipment {
        sku: String,
        inbound: i64,
        allocated: i64,
    },

    #[error("an item with SKU {sku} already exists")]
    DuplicateSku { sku: String },

    #[error("a company named {name} already exists")]
    DuplicateCompanyName { name: String },

    #[error("company {name} still owns items or shipments")]
    CompanyInUse { name: String },

    #[error("shipment {shipment_id} has already been shipped; lines can no longer be added")]
    ShipmentAlreadyShipped { shipment_id: ShipmentId },

    #[error("shipment line {shipment_item_id} is closed")]
    ShipmentItemClosed { shipment_item_id: ShipmentItemId },

    #[error(
        "the direction of shipment {shipment_id} cannot change once it has lines or has shipped"
    )]
    ShipmentDirectionLocked { shipment_id: ShipmentId },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl InventoryError {
    /// Stable, machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            InventoryError::MissingInventoryRecord { .. } => "missing_inventory_record",
            InventoryError::IncompatibleCompany { .. } => "incompatible_company",
            InventoryError::ItemNotShippable { .. } => "item_not_shippable",
            InventoryError::InvalidInventoryQuantity { .. } => "invalid_inventory_quantity",
            InventoryError::InvalidInventoryQuantityEdit { .. } => {
                "invalid_inventory_quantity_edit"
            }
            InventoryError::ItemOnShipment { .. } => "item_on_shipment",
            InventoryError::DisableItemOnShipment { .. } => "disable_item_when_on_shipment",
            InventoryError::DuplicateSku { .. } => "duplicate_sku",
            InventoryError::DuplicateCompanyName { .. } => "duplicate_company_name",
            InventoryError::CompanyInUse { .. } => "company_in_use",
            InventoryError::ShipmentAlreadyShipped { .. } => "shipment_already_shipped",
            InventoryError::ShipmentItemClosed { .. } => "shipment_item_closed",
            InventoryError::ShipmentDirectionLocked { .. } => "shipment_direction_locked",
            InventoryError::Domain(e) => e.code(),
        }
    }
}
