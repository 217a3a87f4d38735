use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    adjustment::{AdjustQuantity, Adjustment, AdjustmentOutcome},
    error::{StockError, StockResult},
    events::LowStockEvent,
    kinds::InventoryKind,
    models::{InventoryItem, ItemDetailsPatch, NewInventoryItem, QuantityLedgerEntry},
    storage::{HistoryPage, StockStore},
};

/// Result of a committed adjustment: the outcome plus the item's most recent
/// ledger entries, newest first.
#[derive(Debug, Clone)]
pub struct AdjustedItem {
    pub outcome: AdjustmentOutcome,
    pub history: Vec<QuantityLedgerEntry>,
}

impl From<AdjustmentOutcome> for AdjustedItem {
    fn from(mut outcome: AdjustmentOutcome) -> Self {
        let history = std::mem::take(&mut outcome.recent_history);
        Self { outcome, history }
    }
}

impl AdjustedItem {
    pub fn item(&self) -> &InventoryItem {
        &self.outcome.item
    }

    pub fn low_stock_event(&self) -> Option<LowStockEvent> {
        LowStockEvent::from_outcome(&self.outcome)
    }
}

#[derive(Clone)]
pub struct StockService {
    store: Arc<dyn StockStore>,
}

impl StockService {
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self { store }
    }

    pub async fn create<K: InventoryKind>(
        &self,
        owner_id: Uuid,
        request: NewInventoryItem,
    ) -> StockResult<InventoryItem> {
        let item = request.into_item::<K>(owner_id)?;
        let item = self.store.insert_item(item).await?;
        info!(item_id = %item.id, kind = %K::KIND, "inventory item created");
        Ok(item)
    }

    pub async fn get<K: InventoryKind>(
        &self,
        owner_id: Uuid,
        item_id: Uuid,
    ) -> StockResult<InventoryItem> {
        self.store
            .find_item(K::KIND, owner_id, item_id)
            .await?
            .ok_or_else(|| StockError::not_found(K::KIND, item_id))
    }

    pub async fn list<K: InventoryKind>(&self, owner_id: Uuid) -> StockResult<Vec<InventoryItem>> {
        self.store.list_items(K::KIND, owner_id).await
    }

    pub async fn low_stock<K: InventoryKind>(
        &self,
        owner_id: Uuid,
    ) -> StockResult<Vec<InventoryItem>> {
        let items = self.store.list_items(K::KIND, owner_id).await?;
        Ok(items.into_iter().filter(InventoryItem::is_low_stock).collect())
    }

    pub async fn update_details<K: InventoryKind>(
        &self,
        owner_id: Uuid,
        item_id: Uuid,
        patch: ItemDetailsPatch,
    ) -> StockResult<InventoryItem> {
        let patch = patch.validated()?;
        if patch.is_empty() {
            return Err(StockError::validation("no updatable fields provided"));
        }

        self.store
            .update_details(K::KIND, owner_id, item_id, &patch)
            .await?
            .ok_or_else(|| StockError::not_found(K::KIND, item_id))
    }

    pub async fn delete<K: InventoryKind>(&self, owner_id: Uuid, item_id: Uuid) -> StockResult<()> {
        if !self.store.delete_item(K::KIND, owner_id, item_id).await? {
            return Err(StockError::not_found(K::KIND, item_id));
        }
        info!(%item_id, kind = %K::KIND, "inventory item deleted with its ledger");
        Ok(())
    }

    /// Validates and applies one quantity adjustment.
    ///
    /// Input is checked before the store is touched, so a rejected request
    /// leaves both the item and its ledger unchanged. Once the store commits,
    /// the call succeeds; the embedded history comes from the same write.
    pub async fn adjust<K: InventoryKind>(
        &self,
        owner_id: Uuid,
        item_id: Uuid,
        command: AdjustQuantity,
        history_limit: usize,
    ) -> StockResult<AdjustedItem> {
        let adjustment = Adjustment::validate::<K>(command)?;

        let outcome = match self
            .store
            .apply_adjustment(K::KIND, owner_id, item_id, &adjustment, history_limit)
            .await
        {
            Ok(outcome) => outcome,
            Err(err @ StockError::Storage(_)) => {
                error!(%item_id, kind = %K::KIND, "quantity adjustment failed: {err}");
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        if outcome.applied_change() < adjustment.delta {
            warn!(
                %item_id,
                requested = %adjustment.delta,
                applied = %outcome.applied_change(),
                "decrease clamped at zero"
            );
        }
        info!(
            %item_id,
            kind = %K::KIND,
            reason = %adjustment.reason,
            delta = %adjustment.delta,
            quantity = %outcome.item.quantity,
            "quantity adjusted"
        );

        Ok(AdjustedItem::from(outcome))
    }

    pub async fn history<K: InventoryKind>(
        &self,
        owner_id: Uuid,
        item_id: Uuid,
        page: HistoryPage,
    ) -> StockResult<Vec<QuantityLedgerEntry>> {
        self.store
            .list_history(K::KIND, owner_id, item_id, page)
            .await
    }
}
