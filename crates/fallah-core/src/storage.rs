use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    adjustment::{Adjustment, AdjustmentOutcome},
    error::StockResult,
    kinds::ItemKind,
    models::{InventoryItem, ItemDetailsPatch, QuantityLedgerEntry},
};

pub const DEFAULT_HISTORY_LIMIT: usize = 100;
pub const MAX_HISTORY_LIMIT: usize = 500;
pub const MAX_HISTORY_OFFSET: usize = i64::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryPage {
    pub limit: usize,
    pub offset: usize,
}

impl HistoryPage {
    pub fn new(limit: Option<usize>, offset: Option<usize>) -> Self {
        Self {
            limit: limit
                .unwrap_or(DEFAULT_HISTORY_LIMIT)
                .clamp(1, MAX_HISTORY_LIMIT),
            // Stores hand the offset to SQL as a signed 64-bit integer.
            offset: offset.unwrap_or(0).min(MAX_HISTORY_OFFSET),
        }
    }
}

impl Default for HistoryPage {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Persistence for inventory items and their quantity ledgers.
///
/// Every lookup is scoped by kind and owner; an item that exists under a
/// different owner or kind is reported exactly like a missing one.
#[async_trait]
pub trait StockStore: Send + Sync {
    async fn insert_item(&self, item: InventoryItem) -> StockResult<InventoryItem>;

    async fn find_item(
        &self,
        kind: ItemKind,
        owner_id: Uuid,
        item_id: Uuid,
    ) -> StockResult<Option<InventoryItem>>;

    async fn list_items(&self, kind: ItemKind, owner_id: Uuid) -> StockResult<Vec<InventoryItem>>;

    async fn update_details(
        &self,
        kind: ItemKind,
        owner_id: Uuid,
        item_id: Uuid,
        patch: &ItemDetailsPatch,
    ) -> StockResult<Option<InventoryItem>>;

    /// Removes the item together with its ledger.
    async fn delete_item(&self, kind: ItemKind, owner_id: Uuid, item_id: Uuid)
    -> StockResult<bool>;

    /// Applies the adjustment and appends its ledger entry as one unit of
    /// work. Concurrent calls on the same item must serialize; neither write
    /// may be visible if the other fails.
    ///
    /// The newest `recent_history` ledger entries are read inside the same
    /// unit of work, so a committed adjustment never needs a second round
    /// trip to report its history.
    async fn apply_adjustment(
        &self,
        kind: ItemKind,
        owner_id: Uuid,
        item_id: Uuid,
        adjustment: &Adjustment,
        recent_history: usize,
    ) -> StockResult<AdjustmentOutcome>;

    /// Ledger entries newest first. Fails with `NotFound` when the item is
    /// not visible to the owner.
    async fn list_history(
        &self,
        kind: ItemKind,
        owner_id: Uuid,
        item_id: Uuid,
        page: HistoryPage,
    ) -> StockResult<Vec<QuantityLedgerEntry>>;
}
