use async_trait::async_trait;
use chrono::Utc;
use fallah_core::{
    Adjustment, AdjustmentOutcome, AdjustmentReason, HistoryPage, InventoryItem,
    ItemDetailsPatch, ItemKind, QuantityLedgerEntry, StockError, StockResult, StockStore,
};
use sqlx::{PgExecutor, PgPool, Row, postgres::PgRow};
use tracing::error;
use uuid::Uuid;

const ITEM_COLUMNS: &str = "id, owner_id, kind, name, category, quantity, unit, low_stock_threshold, attributes, created_at, updated_at";

#[derive(Clone)]
pub struct PgStockStore {
    pool: PgPool,
}

impl PgStockStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StockStore for PgStockStore {
    async fn insert_item(&self, item: InventoryItem) -> StockResult<InventoryItem> {
        sqlx::query(
            r#"
            INSERT INTO inventory_items (
                id, owner_id, kind, name, category, quantity, unit, low_stock_threshold, attributes, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(item.id)
        .bind(item.owner_id)
        .bind(item.kind.as_str())
        .bind(&item.name)
        .bind(&item.category)
        .bind(item.quantity)
        .bind(&item.unit)
        .bind(item.low_stock_threshold)
        .bind(&item.attributes)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StockError::storage)?;

        Ok(item)
    }

    async fn find_item(
        &self,
        kind: ItemKind,
        owner_id: Uuid,
        item_id: Uuid,
    ) -> StockResult<Option<InventoryItem>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1 AND owner_id = $2 AND kind = $3"
        ))
        .bind(item_id)
        .bind(owner_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StockError::storage)?;

        row.as_ref().map(item_from_row).transpose()
    }

    async fn list_items(&self, kind: ItemKind, owner_id: Uuid) -> StockResult<Vec<InventoryItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE owner_id = $1 AND kind = $2 ORDER BY name, created_at"
        ))
        .bind(owner_id)
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(StockError::storage)?;

        rows.iter().map(item_from_row).collect()
    }

    async fn update_details(
        &self,
        kind: ItemKind,
        owner_id: Uuid,
        item_id: Uuid,
        patch: &ItemDetailsPatch,
    ) -> StockResult<Option<InventoryItem>> {
        let mut tx = self.pool.begin().await.map_err(StockError::storage)?;

        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1 AND owner_id = $2 AND kind = $3 FOR UPDATE"
        ))
        .bind(item_id)
        .bind(owner_id)
        .bind(kind.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(StockError::storage)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut item = item_from_row(&row)?;
        patch.apply(&mut item);

        sqlx::query(
            r#"
            UPDATE inventory_items
            SET name = $2, category = $3, unit = $4, low_stock_threshold = $5, attributes = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(&item.category)
        .bind(&item.unit)
        .bind(item.low_stock_threshold)
        .bind(&item.attributes)
        .bind(item.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(StockError::storage)?;

        tx.commit().await.map_err(StockError::storage)?;
        Ok(Some(item))
    }

    async fn delete_item(
        &self,
        kind: ItemKind,
        owner_id: Uuid,
        item_id: Uuid,
    ) -> StockResult<bool> {
        let result = sqlx::query(
            "DELETE FROM inventory_items WHERE id = $1 AND owner_id = $2 AND kind = $3",
        )
        .bind(item_id)
        .bind(owner_id)
        .bind(kind.as_str())
        .execute(&self.pool)
        .await
        .map_err(StockError::storage)?;

        Ok(result.rows_affected() > 0)
    }

    async fn apply_adjustment(
        &self,
        kind: ItemKind,
        owner_id: Uuid,
        item_id: Uuid,
        adjustment: &Adjustment,
        recent_history: usize,
    ) -> StockResult<AdjustmentOutcome> {
        let mut tx = self.pool.begin().await.map_err(StockError::storage)?;

        // The row lock serializes concurrent adjustments of the same item.
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1 AND owner_id = $2 AND kind = $3 FOR UPDATE"
        ))
        .bind(item_id)
        .bind(owner_id)
        .bind(kind.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(StockError::storage)?
        .ok_or_else(|| StockError::not_found(kind, item_id))?;

        let mut item = item_from_row(&row)?;
        let previous_quantity = item.quantity;
        let now = Utc::now();
        // Dropping the transaction on error releases the row lock.
        item.quantity = adjustment.apply_to(previous_quantity)?;
        item.updated_at = now;

        sqlx::query("UPDATE inventory_items SET quantity = $2, updated_at = $3 WHERE id = $1")
            .bind(item.id)
            .bind(item.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(StockError::storage)?;

        let entry = QuantityLedgerEntry {
            id: Uuid::new_v4(),
            item_id,
            reason: adjustment.reason,
            quantity: adjustment.delta,
            note: adjustment.note.clone(),
            created_at: now,
        };

        if let Err(err) = sqlx::query(
            r#"
            INSERT INTO quantity_ledger (id, item_id, reason, quantity, note, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.id)
        .bind(entry.item_id)
        .bind(entry.reason.as_str())
        .bind(entry.quantity)
        .bind(&entry.note)
        .bind(entry.created_at)
        .execute(&mut *tx)
        .await
        {
            error!(
                %item_id,
                %kind,
                previous_quantity = %previous_quantity,
                "ledger append failed after quantity update; rolling back: {err}"
            );
            return Err(StockError::storage(err));
        }

        let recent_history = if recent_history == 0 {
            Vec::new()
        } else {
            fetch_history(&mut *tx, item_id, HistoryPage::new(Some(recent_history), None)).await?
        };

        tx.commit().await.map_err(StockError::storage)?;

        Ok(AdjustmentOutcome {
            previous_quantity,
            item,
            entry,
            recent_history,
        })
    }

    async fn list_history(
        &self,
        kind: ItemKind,
        owner_id: Uuid,
        item_id: Uuid,
        page: HistoryPage,
    ) -> StockResult<Vec<QuantityLedgerEntry>> {
        let exists = sqlx::query(
            "SELECT 1 FROM inventory_items WHERE id = $1 AND owner_id = $2 AND kind = $3",
        )
        .bind(item_id)
        .bind(owner_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StockError::storage)?;
        if exists.is_none() {
            return Err(StockError::not_found(kind, item_id));
        }

        fetch_history(&self.pool, item_id, page).await
    }
}

async fn fetch_history<'e, E>(
    executor: E,
    item_id: Uuid,
    page: HistoryPage,
) -> StockResult<Vec<QuantityLedgerEntry>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query(
        r#"
        SELECT id, item_id, reason, quantity, note, created_at
        FROM quantity_ledger
        WHERE item_id = $1
        ORDER BY created_at DESC, seq DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(item_id)
    .bind(sql_count(page.limit))
    .bind(sql_count(page.offset))
    .fetch_all(executor)
    .await
    .map_err(StockError::storage)?;

    rows.iter().map(entry_from_row).collect()
}

fn sql_count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn item_from_row(row: &PgRow) -> StockResult<InventoryItem> {
    let kind: String = row.try_get("kind").map_err(StockError::storage)?;
    Ok(InventoryItem {
        id: row.try_get("id").map_err(StockError::storage)?,
        owner_id: row.try_get("owner_id").map_err(StockError::storage)?,
        kind: kind
            .parse()
            .map_err(|err| StockError::storage(anyhow::anyhow!("corrupt item row: {err}")))?,
        name: row.try_get("name").map_err(StockError::storage)?,
        category: row.try_get("category").map_err(StockError::storage)?,
        quantity: row.try_get("quantity").map_err(StockError::storage)?,
        unit: row.try_get("unit").map_err(StockError::storage)?,
        low_stock_threshold: row
            .try_get("low_stock_threshold")
            .map_err(StockError::storage)?,
        attributes: row.try_get("attributes").map_err(StockError::storage)?,
        created_at: row.try_get("created_at").map_err(StockError::storage)?,
        updated_at: row.try_get("updated_at").map_err(StockError::storage)?,
    })
}

fn entry_from_row(row: &PgRow) -> StockResult<QuantityLedgerEntry> {
    let reason: String = row.try_get("reason").map_err(StockError::storage)?;
    let reason: AdjustmentReason = reason
        .parse()
        .map_err(|err| StockError::storage(anyhow::anyhow!("corrupt ledger row: {err}")))?;

    Ok(QuantityLedgerEntry {
        id: row.try_get("id").map_err(StockError::storage)?,
        item_id: row.try_get("item_id").map_err(StockError::storage)?,
        reason,
        quantity: row.try_get("quantity").map_err(StockError::storage)?,
        note: row.try_get("note").map_err(StockError::storage)?,
        created_at: row.try_get("created_at").map_err(StockError::storage)?,
    })
}
