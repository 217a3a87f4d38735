use std::collections::HashMap;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use fallah_core::{
    Adjustment, AdjustmentOutcome, HistoryPage, InventoryItem, ItemDetailsPatch, ItemKind,
    QuantityLedgerEntry, StockError, StockResult, StockStore,
};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct StoreState {
    items: HashMap<Uuid, InventoryItem>,
    ledgers: HashMap<Uuid, Vec<QuantityLedgerEntry>>,
}

impl StoreState {
    fn visible(&self, kind: ItemKind, owner_id: Uuid, item_id: Uuid) -> Option<&InventoryItem> {
        self.items
            .get(&item_id)
            .filter(|item| item.kind == kind && item.owner_id == owner_id)
    }
}

/// Process-local store. One write lock covers both the item map and the
/// ledgers, so an adjustment is observed either entirely or not at all.
#[derive(Default)]
pub struct InMemoryStockStore {
    state: RwLock<StoreState>,
    #[cfg(test)]
    reject_ledger_appends: AtomicBool,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn ledger_len(&self, item_id: Uuid) -> usize {
        let state = self.state.read().await;
        state.ledgers.get(&item_id).map_or(0, Vec::len)
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn insert_item(&self, item: InventoryItem) -> StockResult<InventoryItem> {
        let mut state = self.state.write().await;
        if state.items.contains_key(&item.id) {
            return Err(StockError::storage(anyhow::anyhow!(
                "duplicate inventory item id {}",
                item.id
            )));
        }
        state.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn find_item(
        &self,
        kind: ItemKind,
        owner_id: Uuid,
        item_id: Uuid,
    ) -> StockResult<Option<InventoryItem>> {
        let state = self.state.read().await;
        Ok(state.visible(kind, owner_id, item_id).cloned())
    }

    async fn list_items(&self, kind: ItemKind, owner_id: Uuid) -> StockResult<Vec<InventoryItem>> {
        let state = self.state.read().await;
        let mut items: Vec<InventoryItem> = state
            .items
            .values()
            .filter(|item| item.kind == kind && item.owner_id == owner_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(items)
    }

    async fn update_details(
        &self,
        kind: ItemKind,
        owner_id: Uuid,
        item_id: Uuid,
        patch: &ItemDetailsPatch,
    ) -> StockResult<Option<InventoryItem>> {
        let mut state = self.state.write().await;
        if state.visible(kind, owner_id, item_id).is_none() {
            return Ok(None);
        }

        let Some(item) = state.items.get_mut(&item_id) else {
            return Ok(None);
        };
        patch.apply(item);
        Ok(Some(item.clone()))
    }

    async fn delete_item(
        &self,
        kind: ItemKind,
        owner_id: Uuid,
        item_id: Uuid,
    ) -> StockResult<bool> {
        let mut state = self.state.write().await;
        if state.visible(kind, owner_id, item_id).is_none() {
            return Ok(false);
        }

        state.items.remove(&item_id);
        state.ledgers.remove(&item_id);
        Ok(true)
    }

    async fn apply_adjustment(
        &self,
        kind: ItemKind,
        owner_id: Uuid,
        item_id: Uuid,
        adjustment: &Adjustment,
        recent_history: usize,
    ) -> StockResult<AdjustmentOutcome> {
        let mut state = self.state.write().await;
        let mut item = state
            .visible(kind, owner_id, item_id)
            .cloned()
            .ok_or_else(|| StockError::not_found(kind, item_id))?;

        let previous_quantity = item.quantity;
        let now = Utc::now();
        item.quantity = adjustment.apply_to(previous_quantity)?;
        item.updated_at = now;

        // Both writes are staged above; nothing is stored until the ledger
        // append is known to succeed.
        #[cfg(test)]
        if self.reject_ledger_appends.load(Ordering::SeqCst) {
            return Err(StockError::storage(anyhow::anyhow!(
                "ledger append rejected for item {item_id}"
            )));
        }

        let entry = QuantityLedgerEntry {
            id: Uuid::new_v4(),
            item_id,
            reason: adjustment.reason,
            quantity: adjustment.delta,
            note: adjustment.note.clone(),
            created_at: now,
        };

        let ledger = state.ledgers.entry(item_id).or_default();
        ledger.push(entry.clone());
        let recent_history = ledger.iter().rev().take(recent_history).cloned().collect();
        state.items.insert(item_id, item.clone());

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
        let state = self.state.read().await;
        if state.visible(kind, owner_id, item_id).is_none() {
            return Err(StockError::not_found(kind, item_id));
        }

        Ok(state
            .ledgers
            .get(&item_id)
            .map(|entries| {
                entries
                    .iter()
                    .rev()
                    .skip(page.offset)
                    .take(page.limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
