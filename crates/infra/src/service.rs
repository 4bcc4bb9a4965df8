//! Application service: one unit of work per warehouse operation.
//!
//! Every operation follows the same shape:
//!
//! ```text
//! begin transaction
//!   ↓
//! load the records involved (shipment, line, item: the lock order)
//!   ↓
//! validate + mutate through the domain model (stocktrack-inventory)
//!   ↓
//! write the item first, then the line
//!   ↓
//! commit
//! ```
//!
//! Any error returns early and drops the transaction, which rolls back every
//! write made so far. Nothing half-applied is ever visible.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, instrument, warn};

use stocktrack_core::{CompanyId, DomainError, Entity, ItemId, ShipmentId, ShipmentItemId};
use stocktrack_inventory::{
    Company, InventoryError, Item, ItemAllocation, ItemPatch, NewItem, NewShipment, Shipment,
    ShipmentItem, ShipmentPatch, ShipmentStatus,
};

use crate::store::{COMPANY_NAME_UNIQUE, ITEM_SKU_UNIQUE, StoreError, WarehouseStore, WarehouseTx};

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Business rule or validation failure; nothing was written.
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// The store failed; the unit of work was rolled back.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        ServiceError::Inventory(InventoryError::Domain(value))
    }
}

impl ServiceError {
    /// Stable, machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Inventory(e) => e.code(),
            ServiceError::Store(_) => "store_error",
        }
    }

    /// The domain error, if this is one.
    pub fn as_inventory(&self) -> Option<&InventoryError> {
        match self {
            ServiceError::Inventory(e) => Some(e),
            ServiceError::Store(_) => None,
        }
    }
}

/// Turn a racing unique-constraint failure back into the domain error the
/// pre-insert lookup would have produced.
fn unique_as(
    err: StoreError,
    constraint: &str,
    domain: impl FnOnce() -> InventoryError,
) -> ServiceError {
    if err.is_unique_violation_of(constraint) {
        ServiceError::Inventory(domain())
    } else {
        ServiceError::Store(err)
    }
}

/// Warehouse operations over a [`WarehouseStore`].
#[derive(Debug, Clone)]
pub struct InventoryService<S> {
    store: S,
}

impl<S> InventoryService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

// Loaders shared by the operations below. They run inside the caller's tx.

async fn load_company<T: WarehouseTx>(tx: &mut T, id: CompanyId) -> ServiceResult<Company> {
    tx.company(id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("company {id}")).into())
}

async fn load_item<T: WarehouseTx>(tx: &mut T, id: ItemId) -> ServiceResult<Item> {
    tx.item(id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("item {id}")).into())
}

/// Item referenced by a shipment line. Absence is a domain error of its own.
async fn load_line_item<T: WarehouseTx>(tx: &mut T, id: ItemId) -> ServiceResult<Item> {
    tx.item(id)
        .await?
        .ok_or_else(|| InventoryError::MissingInventoryRecord { item_id: id }.into())
}

async fn load_shipment<T: WarehouseTx>(tx: &mut T, id: ShipmentId) -> ServiceResult<Shipment> {
    tx.shipment(id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("shipment {id}")).into())
}

/// Lock a line and its shipment, shipment first (see the store's lock order).
async fn lock_line<T: WarehouseTx>(
    tx: &mut T,
    id: ShipmentItemId,
) -> ServiceResult<(Shipment, ShipmentItem)> {
    let missing = || DomainError::not_found(format!("shipment item {id}"));

    let shipment_id = tx.shipment_item(id).await?.ok_or_else(missing)?.shipment_id();
    let shipment = load_shipment(tx, shipment_id).await?;
    let line = tx.lock_shipment_item(id).await?.ok_or_else(missing)?;
    Ok((shipment, line))
}

fn warn_if_negative(item: &Item) {
    if item.quantity_available() < 0 {
        warn!(
            item_id = %item.id(),
            quantity_available = item.quantity_available(),
            "inbound stock taken back after it was allocated"
        );
    }
}

impl<S: WarehouseStore> InventoryService<S> {
    // Companies

    #[instrument(skip(self), err)]
    pub async fn create_company(&self, name: &str) -> ServiceResult<Company> {
        let company = Company::new(CompanyId::new(), name)?;

        let mut tx = self.store.begin().await?;
        if tx.company_by_name(company.name()).await?.is_some() {
            return Err(InventoryError::DuplicateCompanyName {
                name: company.name().to_string(),
            }
            .into());
        }
        tx.insert_company(&company).await.map_err(|e| {
            unique_as(e, COMPANY_NAME_UNIQUE, || InventoryError::DuplicateCompanyName {
                name: company.name().to_string(),
            })
        })?;
        tx.commit().await?;

        info!(company_id = %company.id(), "company created");
        Ok(company)
    }

    #[instrument(skip(self), err)]
    pub async fn get_company(&self, id: CompanyId) -> ServiceResult<Company> {
        let mut tx = self.store.begin().await?;
        load_company(&mut tx, id).await
    }

    /// Delete a company that no longer owns any item or shipment.
    #[instrument(skip(self), err)]
    pub async fn delete_company(&self, id: CompanyId) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        let company = load_company(&mut tx, id).await?;
        if tx.company_has_dependents(id).await? {
            return Err(InventoryError::CompanyInUse {
                name: company.name().to_string(),
            }
            .into());
        }
        tx.delete_company(id).await?;
        tx.commit().await?;

        info!(company_id = %id, "company deleted");
        Ok(())
    }

    // Items

    /// Create an item. SKUs are unique across all companies.
    #[instrument(skip(self, input), fields(sku = %input.sku, company_id = %input.company_id), err)]
    pub async fn create_item(&self, input: NewItem) -> ServiceResult<Item> {
        let mut tx = self.store.begin().await?;
        load_company(&mut tx, input.company_id).await?;

        let item = Item::new(ItemId::new(), input, Utc::now())?;
        if tx.item_by_sku(item.sku()).await?.is_some() {
            return Err(InventoryError::DuplicateSku {
                sku: item.sku().to_string(),
            }
            .into());
        }
        tx.insert_item(&item).await.map_err(|e| {
            unique_as(e, ITEM_SKU_UNIQUE, || InventoryError::DuplicateSku {
                sku: item.sku().to_string(),
            })
        })?;
        tx.commit().await?;

        info!(
            item_id = %item.id(),
            quantity_available = item.quantity_available(),
            "item created"
        );
        Ok(item)
    }

    #[instrument(skip(self), err)]
    pub async fn get_item(&self, id: ItemId) -> ServiceResult<Item> {
        let mut tx = self.store.begin().await?;
        load_item(&mut tx, id).await
    }

    /// Items owned by a company, ordered by SKU.
    #[instrument(skip(self), err)]
    pub async fn list_items(&self, company_id: CompanyId) -> ServiceResult<Vec<Item>> {
        let mut tx = self.store.begin().await?;
        load_company(&mut tx, company_id).await?;
        let mut items = tx.items_for_company(company_id).await?;
        items.sort_by(|a, b| a.sku().cmp(b.sku()));
        Ok(items)
    }

    #[instrument(skip(self), err)]
    pub async fn item_allocation(&self, id: ItemId) -> ServiceResult<ItemAllocation> {
        let mut tx = self.store.begin().await?;
        load_item(&mut tx, id).await?;
        Ok(tx.item_allocation(id).await?)
    }

    #[instrument(skip(self), err)]
    pub async fn update_item(&self, id: ItemId, patch: ItemPatch) -> ServiceResult<Item> {
        let mut tx = self.store.begin().await?;
        let mut item = load_item(&mut tx, id).await?;
        let allocation = tx.item_allocation(id).await?;

        item.apply_patch(patch, &allocation, Utc::now())?;
        tx.update_item(&item).await?;
        tx.commit().await?;
        Ok(item)
    }

    #[instrument(skip(self), err)]
    pub async fn set_item_shippable(&self, id: ItemId, shippable: bool) -> ServiceResult<Item> {
        let mut tx = self.store.begin().await?;
        let mut item = load_item(&mut tx, id).await?;
        let allocation = tx.item_allocation(id).await?;

        item.set_shippable(shippable, &allocation, Utc::now())?;
        tx.update_item(&item).await?;
        tx.commit().await?;

        info!(item_id = %id, shippable, "item shippability changed");
        Ok(item)
    }

    /// Delete an item that has no open inbound or allocated quantity. Its
    /// closed lines go with it.
    #[instrument(skip(self), err)]
    pub async fn delete_item(&self, id: ItemId) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        let item = load_item(&mut tx, id).await?;
        let allocation = tx.item_allocation(id).await?;

        item.ensure_deletable(&allocation)?;
        tx.delete_item(id).await?;
        tx.commit().await?;

        info!(item_id = %id, sku = item.sku(), "item deleted");
        Ok(())
    }

    // Shipments

    #[instrument(
        skip(self, input),
        fields(company_id = %input.company_id, direction = %input.direction.as_str()),
        err
    )]
    pub async fn create_shipment(&self, input: NewShipment) -> ServiceResult<Shipment> {
        let mut tx = self.store.begin().await?;
        load_company(&mut tx, input.company_id).await?;

        let shipment = Shipment::new(ShipmentId::new(), input, Utc::now())?;
        tx.insert_shipment(&shipment).await?;
        tx.commit().await?;

        info!(shipment_id = %shipment.id(), "shipment created");
        Ok(shipment)
    }

    #[instrument(skip(self), err)]
    pub async fn get_shipment(&self, id: ShipmentId) -> ServiceResult<Shipment> {
        let mut tx = self.store.begin().await?;
        load_shipment(&mut tx, id).await
    }

    #[instrument(skip(self), err)]
    pub async fn shipment_status(&self, id: ShipmentId) -> ServiceResult<ShipmentStatus> {
        Ok(self.get_shipment(id).await?.status())
    }

    #[instrument(skip(self), err)]
    pub async fn shipment_items(&self, id: ShipmentId) -> ServiceResult<Vec<ShipmentItem>> {
        let mut tx = self.store.begin().await?;
        load_shipment(&mut tx, id).await?;
        Ok(tx.shipment_items(id).await?)
    }

    /// Edit a shipment header. The direction is locked once lines exist.
    #[instrument(skip(self), err)]
    pub async fn update_shipment(
        &self,
        id: ShipmentId,
        patch: ShipmentPatch,
    ) -> ServiceResult<Shipment> {
        let mut tx = self.store.begin().await?;
        let mut shipment = load_shipment(&mut tx, id).await?;
        let has_lines = !tx.shipment_items(id).await?.is_empty();

        shipment.apply_patch(patch, has_lines)?;
        tx.update_shipment(&shipment).await?;
        tx.commit().await?;
        Ok(shipment)
    }

    /// Mark a shipment shipped (OUT) or received (IN) and close its open lines.
    ///
    /// Quantities were already moved when the lines were created, so closing
    /// only takes the lines out of the allocation totals. Calling this again
    /// keeps the first shipping date.
    #[instrument(skip(self), err)]
    pub async fn mark_shipment_shipped(
        &self,
        id: ShipmentId,
        date_shipped: DateTime<Utc>,
    ) -> ServiceResult<Shipment> {
        let mut tx = self.store.begin().await?;
        let mut shipment = load_shipment(&mut tx, id).await?;

        if shipment.mark_shipped(date_shipped) {
            tx.update_shipment(&shipment).await?;
        }

        let mut closed = 0usize;
        for mut line in tx.shipment_items(id).await? {
            if line.close() {
                tx.update_shipment_item(&line).await?;
                closed += 1;
            }
        }
        tx.commit().await?;

        info!(
            shipment_id = %id,
            status = %shipment.status(),
            lines_closed = closed,
            "shipment closed"
        );
        Ok(shipment)
    }

    // Shipment lines

    /// Add a line to a shipment, moving stock for it.
    ///
    /// OUT lines take `quantity` out of the item's available stock; IN lines
    /// add it.
    #[instrument(skip(self), err)]
    pub async fn create_shipment_item(
        &self,
        shipment_id: ShipmentId,
        item_id: ItemId,
        quantity: i64,
    ) -> ServiceResult<ShipmentItem> {
        let mut tx = self.store.begin().await?;
        let shipment = load_shipment(&mut tx, shipment_id).await?;
        let mut item = load_line_item(&mut tx, item_id).await?;

        let line = ShipmentItem::open(
            ShipmentItemId::new(),
            &shipment,
            &mut item,
            quantity,
            Utc::now(),
        )?;
        tx.update_item(&item).await?;
        tx.insert_shipment_item(&line).await?;
        tx.commit().await?;

        info!(
            shipment_item_id = %line.id(),
            direction = shipment.direction().as_str(),
            quantity,
            quantity_available = item.quantity_available(),
            "shipment line created"
        );
        Ok(line)
    }

    /// Change the quantity of an open line, moving the difference.
    #[instrument(skip(self), err)]
    pub async fn update_shipment_item_quantity(
        &self,
        id: ShipmentItemId,
        quantity: i64,
    ) -> ServiceResult<ShipmentItem> {
        let mut tx = self.store.begin().await?;
        let (shipment, mut line) = lock_line(&mut tx, id).await?;
        let mut item = load_line_item(&mut tx, line.item_id()).await?;

        let previous = line.quantity();
        let moved = line.change_quantity(&shipment, &mut item, quantity, Utc::now())?;
        warn_if_negative(&item);
        tx.update_item(&item).await?;
        tx.update_shipment_item(&line).await?;
        tx.commit().await?;

        info!(
            shipment_item_id = %id,
            previous,
            quantity,
            moved,
            quantity_available = item.quantity_available(),
            "shipment line quantity changed"
        );
        Ok(line)
    }

    /// Remove an open line, reversing its stock movement.
    #[instrument(skip(self), err)]
    pub async fn delete_shipment_item(&self, id: ShipmentItemId) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        let (shipment, line) = lock_line(&mut tx, id).await?;
        let mut item = load_line_item(&mut tx, line.item_id()).await?;

        let moved = line.release(&shipment, &mut item, Utc::now())?;
        warn_if_negative(&item);
        tx.update_item(&item).await?;
        tx.delete_shipment_item(id).await?;
        tx.commit().await?;

        info!(
            shipment_item_id = %id,
            moved,
            quantity_available = item.quantity_available(),
            "shipment line deleted"
        );
        Ok(())
    }
}
