use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use stocktrack_core::{CompanyId, Entity, ItemId, ShipmentId, ShipmentItemId};
use stocktrack_inventory::{Company, Item, ItemAllocation, Shipment, ShipmentItem};

use super::{
    COMPANY_NAME_UNIQUE, ITEM_SKU_UNIQUE, StoreError, StoreResult, WarehouseStore, WarehouseTx,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    companies: BTreeMap<CompanyId, Company>,
    items: BTreeMap<ItemId, Item>,
    shipments: BTreeMap<ShipmentId, Shipment>,
    lines: BTreeMap<ShipmentItemId, ShipmentItem>,
}

/// In-memory warehouse store.
///
/// Intended for tests/dev. Transactions run one at a time: `begin` waits for
/// the previous transaction to finish, works on a private copy of the tables,
/// and `commit` swaps that copy in.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWarehouseStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryWarehouseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WarehouseStore for InMemoryWarehouseStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> StoreResult<InMemoryTx> {
        let committed = self.tables.clone().lock_owned().await;
        let working = committed.clone();
        Ok(InMemoryTx { committed, working })
    }
}

/// Unit of work over an [`InMemoryWarehouseStore`].
#[derive(Debug)]
pub struct InMemoryTx {
    committed: OwnedMutexGuard<Tables>,
    working: Tables,
}

impl InMemoryTx {
    fn lines_for_item(&self, item_id: ItemId) -> impl Iterator<Item = (&Shipment, &ShipmentItem)> {
        self.working
            .lines
            .values()
            .filter(move |line| line.item_id() == item_id)
            .filter_map(move |line| {
                self.working
                    .shipments
                    .get(&line.shipment_id())
                    .map(|shipment| (shipment, line))
            })
    }
}

#[async_trait]
impl WarehouseTx for InMemoryTx {
    async fn company(&mut self, id: CompanyId) -> StoreResult<Option<Company>> {
        Ok(self.working.companies.get(&id).cloned())
    }

    async fn company_by_name(&mut self, name: &str) -> StoreResult<Option<Company>> {
        Ok(self
            .working
            .companies
            .values()
            .find(|c| c.name() == name)
            .cloned())
    }

    async fn insert_company(&mut self, company: &Company) -> StoreResult<()> {
        if self.working.companies.values().any(|c| c.name() == company.name()) {
            return Err(StoreError::UniqueViolation {
                constraint: COMPANY_NAME_UNIQUE.to_string(),
                message: format!("company name {:?} already exists", company.name()),
            });
        }
        self.working.companies.insert(company.id(), company.clone());
        Ok(())
    }

    async fn company_has_dependents(&mut self, id: CompanyId) -> StoreResult<bool> {
        Ok(self.working.items.values().any(|i| i.company_id() == id)
            || self.working.shipments.values().any(|s| s.company_id() == id))
    }

    async fn delete_company(&mut self, id: CompanyId) -> StoreResult<()> {
        if self.company_has_dependents(id).await? {
            return Err(StoreError::ForeignKeyViolation(format!(
                "company {id} is still referenced"
            )));
        }
        self.working
            .companies
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::missing_row("companies", id))
    }

    async fn item(&mut self, id: ItemId) -> StoreResult<Option<Item>> {
        Ok(self.working.items.get(&id).cloned())
    }

    async fn item_by_sku(&mut self, sku: &str) -> StoreResult<Option<Item>> {
        Ok(self
            .working
            .items
            .values()
            .find(|i| i.sku() == sku)
            .cloned())
    }

    async fn items_for_company(&mut self, company_id: CompanyId) -> StoreResult<Vec<Item>> {
        Ok(self
            .working
            .items
            .values()
            .filter(|i| i.company_id() == company_id)
            .cloned()
            .collect())
    }

    async fn insert_item(&mut self, item: &Item) -> StoreResult<()> {
        if !self.working.companies.contains_key(&item.company_id()) {
            return Err(StoreError::ForeignKeyViolation(format!(
                "company {} does not exist",
                item.company_id()
            )));
        }
        if self.working.items.values().any(|i| i.sku() == item.sku()) {
            return Err(StoreError::UniqueViolation {
                constraint: ITEM_SKU_UNIQUE.to_string(),
                message: format!("sku {:?} already exists", item.sku()),
            });
        }
        self.working.items.insert(item.id(), item.clone());
        Ok(())
    }

    async fn update_item(&mut self, item: &Item) -> StoreResult<()> {
        let slot = self
            .working
            .items
            .get_mut(&item.id())
            .ok_or_else(|| StoreError::missing_row("items", item.id()))?;
        *slot = item.clone();
        Ok(())
    }

    async fn delete_item(&mut self, id: ItemId) -> StoreResult<()> {
        self.working
            .items
            .remove(&id)
            .ok_or_else(|| StoreError::missing_row("items", id))?;
        self.working.lines.retain(|_, line| line.item_id() != id);
        Ok(())
    }

    async fn item_allocation(&mut self, id: ItemId) -> StoreResult<ItemAllocation> {
        Ok(ItemAllocation::tally(id, self.lines_for_item(id)))
    }

    async fn shipment(&mut self, id: ShipmentId) -> StoreResult<Option<Shipment>> {
        Ok(self.working.shipments.get(&id).cloned())
    }

    async fn insert_shipment(&mut self, shipment: &Shipment) -> StoreResult<()> {
        if !self.working.companies.contains_key(&shipment.company_id()) {
            return Err(StoreError::ForeignKeyViolation(format!(
                "company {} does not exist",
                shipment.company_id()
            )));
        }
        self.working.shipments.insert(shipment.id(), shipment.clone());
        Ok(())
    }

    async fn update_shipment(&mut self, shipment: &Shipment) -> StoreResult<()> {
        let slot = self
            .working
            .shipments
            .get_mut(&shipment.id())
            .ok_or_else(|| StoreError::missing_row("shipments", shipment.id()))?;
        *slot = shipment.clone();
        Ok(())
    }

    async fn shipment_item(&mut self, id: ShipmentItemId) -> StoreResult<Option<ShipmentItem>> {
        Ok(self.working.lines.get(&id).cloned())
    }

    async fn lock_shipment_item(
        &mut self,
        id: ShipmentItemId,
    ) -> StoreResult<Option<ShipmentItem>> {
        // The whole store is already held for this transaction.
        self.shipment_item(id).await
    }

    async fn shipment_items(&mut self, shipment_id: ShipmentId) -> StoreResult<Vec<ShipmentItem>> {
        Ok(self
            .working
            .lines
            .values()
            .filter(|line| line.shipment_id() == shipment_id)
            .cloned()
            .collect())
    }

    async fn insert_shipment_item(&mut self, line: &ShipmentItem) -> StoreResult<()> {
        if !self.working.shipments.contains_key(&line.shipment_id()) {
            return Err(StoreError::ForeignKeyViolation(format!(
                "shipment {} does not exist",
                line.shipment_id()
            )));
        }
        if !self.working.items.contains_key(&line.item_id()) {
            return Err(StoreError::ForeignKeyViolation(format!(
                "item {} does not exist",
                line.item_id()
            )));
        }
        self.working.lines.insert(line.id(), line.clone());
        Ok(())
    }

    async fn update_shipment_item(&mut self, line: &ShipmentItem) -> StoreResult<()> {
        let slot = self
            .working
            .lines
            .get_mut(&line.id())
            .ok_or_else(|| StoreError::missing_row("shipment_items", line.id()))?;
        *slot = line.clone();
        Ok(())
    }

    async fn delete_shipment_item(&mut self, id: ShipmentItemId) -> StoreResult<()> {
        self.working
            .lines
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::missing_row("shipment_items", id))
    }

    async fn commit(self) -> StoreResult<()> {
        let InMemoryTx {
            mut committed,
            working,
        } = self;
        *committed = working;
        Ok(())
    }
}
