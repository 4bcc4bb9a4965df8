//! Postgres-backed warehouse store.
//!
//! Each [`PostgresTx`] wraps one SQL transaction. Shipments, locked lines and
//! items are read with `SELECT ... FOR UPDATE`, so two units of work moving
//! stock for the same item run one after the other instead of interleaving
//! their read-validate-write steps.
//!
//! Row locks are always taken in the order shipment, shipment line, item.
//! Marking a shipment shipped locks the shipment before it updates (and so
//! locks) the lines; every line edit therefore locks the shipment before the
//! line too, and never holds a line lock while waiting for its shipment.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` (with constraint name) |
//! | Database (foreign key violation) | `23503` | `ForeignKeyViolation` |
//! | Database (check constraint violation) | `23514` | `CheckViolation` |
//! | anything else | - | `Database` |

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument};

use stocktrack_core::{CompanyId, Entity, ItemId, ShipmentId, ShipmentItemId};
use stocktrack_inventory::{
    Company, Dimensions, Item, ItemAllocation, ItemRecord, Shipment, ShipmentItem,
    ShipmentItemRecord, ShipmentRecord, Weight,
};

use super::{StoreError, StoreResult, WarehouseStore, WarehouseTx};

/// Schema applied by [`PostgresWarehouseStore::migrate`]. Idempotent.
pub const SCHEMA: &str = include_str!("../../migrations/0001_initial.sql");

/// Postgres-backed warehouse store.
#[derive(Debug, Clone)]
pub struct PostgresWarehouseStore {
    pool: PgPool,
}

impl PostgresWarehouseStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the tables, constraints and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl WarehouseStore for PostgresWarehouseStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> StoreResult<PostgresTx> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        debug!("transaction started");
        Ok(PostgresTx { tx })
    }
}

/// Unit of work over a [`PostgresWarehouseStore`]. Rolls back on drop.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

const ITEM_COLUMNS: &str = r#"
    id, sku, company_id, product_name, quantity_available, is_shippable,
    weight_value, weight_unit,
    dimension_x_value, dimension_y_value, dimension_z_value, dimension_unit,
    created_at, last_modified_at
"#;

const SHIPMENT_COLUMNS: &str = r#"
    id, company_id, to_address, date_created, date_promised,
    is_shipped, date_shipped, direction
"#;

const SHIPMENT_ITEM_COLUMNS: &str = "id, shipment_id, item_id, quantity, is_open";

fn ensure_affected(rows: u64, table: &'static str, id: impl core::fmt::Display) -> StoreResult<()> {
    if rows == 0 {
        return Err(StoreError::missing_row(table, id));
    }
    Ok(())
}

#[async_trait]
impl WarehouseTx for PostgresTx {
    #[instrument(skip(self), fields(company_id = %id), err)]
    async fn company(&mut self, id: CompanyId) -> StoreResult<Option<Company>> {
        let row = sqlx::query("SELECT id, name FROM companies WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_company", e))?;
        row.as_ref().map(company_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn company_by_name(&mut self, name: &str) -> StoreResult<Option<Company>> {
        let row = sqlx::query("SELECT id, name FROM companies WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_company_by_name", e))?;
        row.as_ref().map(company_from_row).transpose()
    }

    #[instrument(skip(self, company), fields(company_id = %company.id()), err)]
    async fn insert_company(&mut self, company: &Company) -> StoreResult<()> {
        sqlx::query("INSERT INTO companies (id, name) VALUES ($1, $2)")
            .bind(company.id().as_uuid())
            .bind(company.name())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_company", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(company_id = %id), err)]
    async fn company_has_dependents(&mut self, id: CompanyId) -> StoreResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT
                EXISTS (SELECT 1 FROM items WHERE company_id = $1)
                OR EXISTS (SELECT 1 FROM shipments WHERE company_id = $1) AS in_use
            "#,
        )
        .bind(id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("company_has_dependents", e))?;
        row.try_get("in_use").map_err(|e| decode("company usage", e))
    }

    #[instrument(skip(self), fields(company_id = %id), err)]
    async fn delete_company(&mut self, id: CompanyId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_company", e))?;
        ensure_affected(result.rows_affected(), "companies", id)
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn item(&mut self, id: ItemId) -> StoreResult<Option<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_item", e))?;
        row.as_ref().map(item_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn item_by_sku(&mut self, sku: &str) -> StoreResult<Option<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE sku = $1");
        let row = sqlx::query(&sql)
            .bind(sku)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_item_by_sku", e))?;
        row.as_ref().map(item_from_row).transpose()
    }

    #[instrument(skip(self), fields(company_id = %company_id), err)]
    async fn items_for_company(&mut self, company_id: CompanyId) -> StoreResult<Vec<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE company_id = $1 ORDER BY sku");
        let rows = sqlx::query(&sql)
            .bind(company_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_items", e))?;
        rows.iter().map(item_from_row).collect()
    }

    #[instrument(skip(self, item), fields(item_id = %item.id()), err)]
    async fn insert_item(&mut self, item: &Item) -> StoreResult<()> {
        let r = item.record();
        sqlx::query(
            r#"
            INSERT INTO items (
                id, sku, company_id, product_name, quantity_available, is_shippable,
                weight_value, weight_unit,
                dimension_x_value, dimension_y_value, dimension_z_value, dimension_unit,
                created_at, last_modified_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(r.id.as_uuid())
        .bind(&r.sku)
        .bind(r.company_id.as_uuid())
        .bind(&r.product_name)
        .bind(r.quantity_available)
        .bind(r.is_shippable)
        .bind(r.weight.value)
        .bind(r.weight.unit.as_str())
        .bind(r.dimensions.x)
        .bind(r.dimensions.y)
        .bind(r.dimensions.z)
        .bind(r.dimensions.unit.as_str())
        .bind(r.created_at)
        .bind(r.last_modified_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;
        Ok(())
    }

    #[instrument(skip(self, item), fields(item_id = %item.id()), err)]
    async fn update_item(&mut self, item: &Item) -> StoreResult<()> {
        let r = item.record();
        let result = sqlx::query(
            r#"
            UPDATE items SET
                product_name = $2,
                quantity_available = $3,
                is_shippable = $4,
                weight_value = $5,
                weight_unit = $6,
                dimension_x_value = $7,
                dimension_y_value = $8,
                dimension_z_value = $9,
                dimension_unit = $10,
                last_modified_at = $11
            WHERE id = $1
            "#,
        )
        .bind(r.id.as_uuid())
        .bind(&r.product_name)
        .bind(r.quantity_available)
        .bind(r.is_shippable)
        .bind(r.weight.value)
        .bind(r.weight.unit.as_str())
        .bind(r.dimensions.x)
        .bind(r.dimensions.y)
        .bind(r.dimensions.z)
        .bind(r.dimensions.unit.as_str())
        .bind(r.last_modified_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_item", e))?;
        ensure_affected(result.rows_affected(), "items", r.id)
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn delete_item(&mut self, id: ItemId) -> StoreResult<()> {
        // shipment_items.item_id cascades.
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;
        ensure_affected(result.rows_affected(), "items", id)
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn item_allocation(&mut self, id: ItemId) -> StoreResult<ItemAllocation> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(si.quantity) FILTER (WHERE s.direction = 'IN'), 0)::BIGINT AS inbound,
                COALESCE(SUM(si.quantity) FILTER (WHERE s.direction = 'OUT'), 0)::BIGINT AS allocated
            FROM shipment_items si
            JOIN shipments s ON s.id = si.shipment_id
            WHERE si.item_id = $1
                AND si.is_open
                AND NOT s.is_shipped
            "#,
        )
        .bind(id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("item_allocation", e))?;

        let inbound: i64 = row.try_get("inbound").map_err(|e| decode("allocation", e))?;
        let allocated: i64 = row.try_get("allocated").map_err(|e| decode("allocation", e))?;
        Ok(ItemAllocation::new(inbound, allocated))
    }

    #[instrument(skip(self), fields(shipment_id = %id), err)]
    async fn shipment(&mut self, id: ShipmentId) -> StoreResult<Option<Shipment>> {
        let sql = format!("SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_shipment", e))?;
        row.as_ref().map(shipment_from_row).transpose()
    }

    #[instrument(skip(self, shipment), fields(shipment_id = %shipment.id()), err)]
    async fn insert_shipment(&mut self, shipment: &Shipment) -> StoreResult<()> {
        let r = shipment.record();
        sqlx::query(
            r#"
            INSERT INTO shipments (
                id, company_id, to_address, date_created, date_promised,
                is_shipped, date_shipped, direction
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(r.id.as_uuid())
        .bind(r.company_id.as_uuid())
        .bind(&r.to_address)
        .bind(r.date_created)
        .bind(r.date_promised)
        .bind(r.is_shipped)
        .bind(r.date_shipped)
        .bind(r.direction.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_shipment", e))?;
        Ok(())
    }

    #[instrument(skip(self, shipment), fields(shipment_id = %shipment.id()), err)]
    async fn update_shipment(&mut self, shipment: &Shipment) -> StoreResult<()> {
        let r = shipment.record();
        let result = sqlx::query(
            r#"
            UPDATE shipments SET
                to_address = $2,
                date_promised = $3,
                is_shipped = $4,
                date_shipped = $5,
                direction = $6
            WHERE id = $1
            "#,
        )
        .bind(r.id.as_uuid())
        .bind(&r.to_address)
        .bind(r.date_promised)
        .bind(r.is_shipped)
        .bind(r.date_shipped)
        .bind(r.direction.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_shipment", e))?;
        ensure_affected(result.rows_affected(), "shipments", r.id)
    }

    #[instrument(skip(self), fields(shipment_item_id = %id), err)]
    async fn shipment_item(&mut self, id: ShipmentItemId) -> StoreResult<Option<ShipmentItem>> {
        let sql = format!("SELECT {SHIPMENT_ITEM_COLUMNS} FROM shipment_items WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_shipment_item", e))?;
        row.as_ref().map(shipment_item_from_row).transpose()
    }

    #[instrument(skip(self), fields(shipment_item_id = %id), err)]
    async fn lock_shipment_item(
        &mut self,
        id: ShipmentItemId,
    ) -> StoreResult<Option<ShipmentItem>> {
        let sql =
            format!("SELECT {SHIPMENT_ITEM_COLUMNS} FROM shipment_items WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_shipment_item", e))?;
        row.as_ref().map(shipment_item_from_row).transpose()
    }

    #[instrument(skip(self), fields(shipment_id = %shipment_id), err)]
    async fn shipment_items(&mut self, shipment_id: ShipmentId) -> StoreResult<Vec<ShipmentItem>> {
        let sql = format!(
            "SELECT {SHIPMENT_ITEM_COLUMNS} FROM shipment_items WHERE shipment_id = $1 ORDER BY id"
        );
        let rows = sqlx::query(&sql)
            .bind(shipment_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_shipment_items", e))?;
        rows.iter().map(shipment_item_from_row).collect()
    }

    #[instrument(skip(self, line), fields(shipment_item_id = %line.id()), err)]
    async fn insert_shipment_item(&mut self, line: &ShipmentItem) -> StoreResult<()> {
        let r = line.record();
        sqlx::query(
            r#"
            INSERT INTO shipment_items (id, shipment_id, item_id, quantity, is_open)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(r.id.as_uuid())
        .bind(r.shipment_id.as_uuid())
        .bind(r.item_id.as_uuid())
        .bind(r.quantity)
        .bind(r.is_open)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_shipment_item", e))?;
        Ok(())
    }

    #[instrument(skip(self, line), fields(shipment_item_id = %line.id()), err)]
    async fn update_shipment_item(&mut self, line: &ShipmentItem) -> StoreResult<()> {
        let r = line.record();
        let result = sqlx::query(
            "UPDATE shipment_items SET quantity = $2, is_open = $3 WHERE id = $1",
        )
        .bind(r.id.as_uuid())
        .bind(r.quantity)
        .bind(r.is_open)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_shipment_item", e))?;
        ensure_affected(result.rows_affected(), "shipment_items", r.id)
    }

    #[instrument(skip(self), fields(shipment_item_id = %id), err)]
    async fn delete_shipment_item(&mut self, id: ShipmentItemId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM shipment_items WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_shipment_item", e))?;
        ensure_affected(result.rows_affected(), "shipment_items", id)
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        debug!("transaction committed");
        Ok(())
    }
}

// Row decoding

fn decode(what: &'static str, err: impl core::fmt::Display) -> StoreError {
    StoreError::Decode {
        what,
        message: err.to_string(),
    }
}

fn company_from_row(row: &PgRow) -> StoreResult<Company> {
    let id: uuid::Uuid = row.try_get("id").map_err(|e| decode("company", e))?;
    let name: String = row.try_get("name").map_err(|e| decode("company", e))?;
    Ok(Company::restore(CompanyId::from_uuid(id), name))
}

fn item_from_row(row: &PgRow) -> StoreResult<Item> {
    let get = |e: sqlx::Error| decode("item", e);
    let weight_unit: String = row.try_get("weight_unit").map_err(get)?;
    let dimension_unit: String = row.try_get("dimension_unit").map_err(get)?;

    Ok(Item::from_record(ItemRecord {
        id: ItemId::from_uuid(row.try_get("id").map_err(get)?),
        sku: row.try_get("sku").map_err(get)?,
        company_id: CompanyId::from_uuid(row.try_get("company_id").map_err(get)?),
        product_name: row.try_get("product_name").map_err(get)?,
        quantity_available: row.try_get("quantity_available").map_err(get)?,
        is_shippable: row.try_get("is_shippable").map_err(get)?,
        weight: Weight {
            value: row.try_get("weight_value").map_err(get)?,
            unit: weight_unit.parse().map_err(|e| decode("item", e))?,
        },
        dimensions: Dimensions {
            x: row.try_get("dimension_x_value").map_err(get)?,
            y: row.try_get("dimension_y_value").map_err(get)?,
            z: row.try_get("dimension_z_value").map_err(get)?,
            unit: dimension_unit.parse().map_err(|e| decode("item", e))?,
        },
        created_at: row.try_get("created_at").map_err(get)?,
        last_modified_at: row.try_get("last_modified_at").map_err(get)?,
    }))
}

fn shipment_from_row(row: &PgRow) -> StoreResult<Shipment> {
    let get = |e: sqlx::Error| decode("shipment", e);
    let direction: String = row.try_get("direction").map_err(get)?;

    Ok(Shipment::from_record(ShipmentRecord {
        id: ShipmentId::from_uuid(row.try_get("id").map_err(get)?),
        company_id: CompanyId::from_uuid(row.try_get("company_id").map_err(get)?),
        to_address: row.try_get("to_address").map_err(get)?,
        date_created: row.try_get("date_created").map_err(get)?,
        date_promised: row.try_get("date_promised").map_err(get)?,
        is_shipped: row.try_get("is_shipped").map_err(get)?,
        date_shipped: row.try_get("date_shipped").map_err(get)?,
        direction: direction.parse().map_err(|e| decode("shipment", e))?,
    }))
}

fn shipment_item_from_row(row: &PgRow) -> StoreResult<ShipmentItem> {
    let get = |e: sqlx::Error| decode("shipment item", e);
    Ok(ShipmentItem::from_record(ShipmentItemRecord {
        id: ShipmentItemId::from_uuid(row.try_get("id").map_err(get)?),
        shipment_id: ShipmentId::from_uuid(row.try_get("shipment_id").map_err(get)?),
        item_id: ItemId::from_uuid(row.try_get("item_id").map_err(get)?),
        quantity: row.try_get("quantity").map_err(get)?,
        is_open: row.try_get("is_open").map_err(get)?,
    }))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let message = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or_default().to_string(),
                    message,
                },
                Some("23503") => StoreError::ForeignKeyViolation(message),
                Some("23514") => StoreError::CheckViolation(message),
                _ => StoreError::Database { operation, message },
            }
        }
        sqlx::Error::PoolClosed => StoreError::Database {
            operation,
            message: "connection pool closed".to_string(),
        },
        _ => StoreError::Database {
            operation,
            message: err.to_string(),
        },
    }
}
