//! Stocked items and their available quantity.
//!
//! `quantity_available` only moves through shipment lines (plus the opening
//! balance given at creation).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stocktrack_core::{CompanyId, DomainError, DomainResult, Entity, ItemId, require_text};

use crate::allocation::ItemAllocation;
use crate::error::{InventoryError, InventoryResult};
use crate::measure::{Dimensions, Weight};

/// Maximum length of a SKU.
pub const SKU_MAX_CHARS: usize = 16;

/// Maximum length of a product name.
pub const PRODUCT_NAME_MAX_CHARS: usize = 200;

/// Stored column values of an item.
///
/// Stores read and write this; everything else goes through [`Item`], which
/// is the only place `quantity_available` changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: ItemId,
    pub sku: String,
    pub company_id: CompanyId,
    pub product_name: String,
    pub quantity_available: i64,
    pub is_shippable: bool,
    pub weight: Weight,
    pub dimensions: Dimensions,
    pub created_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
}

/// Input for creating an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub sku: String,
    pub company_id: CompanyId,
    pub product_name: String,
    pub weight: Weight,
    pub dimensions: Dimensions,
    #[serde(default)]
    pub is_shippable: bool,
    /// Opening stock level; zero unless the item arrives with stock on hand.
    #[serde(default)]
    pub initial_quantity: i64,
}

/// Partial update of an item's descriptive fields.
///
/// `None` leaves a field unchanged. Quantity is deliberately absent: it only
/// moves through shipment lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub product_name: Option<String>,
    pub weight: Option<Weight>,
    pub dimensions: Option<Dimensions>,
    pub is_shippable: Option<bool>,
}

/// A stocked product owned by one company.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    record: ItemRecord,
}

impl Item {
    /// Validate input and build a new item.
    pub fn new(id: ItemId, input: NewItem, now: DateTime<Utc>) -> DomainResult<Self> {
        let sku = require_text("sku", &input.sku, SKU_MAX_CHARS)?;
        let product_name =
            require_text("product name", &input.product_name, PRODUCT_NAME_MAX_CHARS)?;
        input.weight.validate()?;
        input.dimensions.validate()?;
        if input.initial_quantity < 0 {
            return Err(DomainError::validation(format!(
                "initial quantity cannot be negative (got {})",
                input.initial_quantity
            )));
        }

        Ok(Self {
            record: ItemRecord {
                id,
                sku,
                company_id: input.company_id,
                product_name,
                quantity_available: input.initial_quantity,
                is_shippable: input.is_shippable,
                weight: input.weight,
                dimensions: input.dimensions,
                created_at: now,
                last_modified_at: now,
            },
        })
    }

    /// Rebuild an item from stored column values.
    pub fn from_record(record: ItemRecord) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &ItemRecord {
        &self.record
    }

    pub fn into_record(self) -> ItemRecord {
        self.record
    }

    pub fn sku(&self) -> &str {
        &self.record.sku
    }

    pub fn company_id(&self) -> CompanyId {
        self.record.company_id
    }

    pub fn product_name(&self) -> &str {
        &self.record.product_name
    }

    pub fn quantity_available(&self) -> i64 {
        self.record.quantity_available
    }

    pub fn is_shippable(&self) -> bool {
        self.record.is_shippable
    }

    pub fn weight(&self) -> Weight {
        self.record.weight
    }

    pub fn dimensions(&self) -> Dimensions {
        self.record.dimensions
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.record.created_at
    }

    pub fn last_modified_at(&self) -> DateTime<Utc> {
        self.record.last_modified_at
    }

    /// Toggle whether the item may go out on outbound shipments.
    ///
    /// Disabling fails while the item has open inbound or allocated quantity.
    pub fn set_shippable(
        &mut self,
        shippable: bool,
        allocation: &ItemAllocation,
        now: DateTime<Utc>,
    ) -> InventoryResult<()> {
        if !shippable && !allocation.can_have_shipping_disabled() {
            return Err(InventoryError::DisableItemOnShipment {
                sku: self.record.sku.clone(),
                inbound: allocation.quantity_inbound(),
                allocated: allocation.quantity_allocated(),
            });
        }
        if self.record.is_shippable != shippable {
            self.record.is_shippable = shippable;
            self.touch(now);
        }
        Ok(())
    }

    /// Apply a partial update. Every field is validated before any is changed.
    pub fn apply_patch(
        &mut self,
        patch: ItemPatch,
        allocation: &ItemAllocation,
        now: DateTime<Utc>,
    ) -> InventoryResult<()> {
        let product_name = patch
            .product_name
            .as_deref()
            .map(|name| require_text("product name", name, PRODUCT_NAME_MAX_CHARS))
            .transpose()?;
        if let Some(weight) = &patch.weight {
            weight.validate()?;
        }
        if let Some(dimensions) = &patch.dimensions {
            dimensions.validate()?;
        }
        if let Some(shippable) = patch.is_shippable {
            self.set_shippable(shippable, allocation, now)?;
        }

        if let Some(name) = product_name {
            self.record.product_name = name;
        }
        if let Some(weight) = patch.weight {
            self.record.weight = weight;
        }
        if let Some(dimensions) = patch.dimensions {
            self.record.dimensions = dimensions;
        }
        self.touch(now);
        Ok(())
    }

    /// Fails with `ItemOnShipment` unless the item is in a valid delete state.
    pub fn ensure_deletable(&self, allocation: &ItemAllocation) -> InventoryResult<()> {
        if allocation.in_valid_delete_state() {
            return Ok(());
        }
        Err(InventoryError::ItemOnShipment {
            sku: self.record.sku.clone(),
            inbound: allocation.quantity_inbound(),
            allocated: allocation.quantity_allocated(),
        })
    }

    /// Move `delta` units into (positive) or out of (negative) available stock.
    ///
    /// Callers validate business bounds first. A movement that would overflow
    /// the counter fails and leaves the item untouched.
    pub(crate) fn adjust_available(&mut self, delta: i64, now: DateTime<Utc>) -> DomainResult<()> {
        let next = self
            .record
            .quantity_available
            .checked_add(delta)
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "moving {delta} units would take the stock of item {} out of range",
                    self.record.sku
                ))
            })?;
        self.record.quantity_available = next;
        self.touch(now);
        Ok(())
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.record.last_modified_at = now;
    }
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> ItemId {
        self.record.id
    }
}
