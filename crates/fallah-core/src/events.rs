use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{adjustment::AdjustmentOutcome, kinds::ItemKind};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LowStockEvent {
    pub item_id: Uuid,
    pub owner_id: Uuid,
    pub kind: ItemKind,
    pub name: String,
    pub quantity: Decimal,
    pub unit: String,
    pub low_stock_threshold: Decimal,
    pub occurred_at: DateTime<Utc>,
}

impl LowStockEvent {
    /// Only adjustments that move an item across its threshold raise an alert.
    pub fn from_outcome(outcome: &AdjustmentOutcome) -> Option<Self> {
        if !outcome.entered_low_stock() {
            return None;
        }

        let item = &outcome.item;
        Some(Self {
            item_id: item.id,
            owner_id: item.owner_id,
            kind: item.kind,
            name: item.name.clone(),
            quantity: item.quantity,
            unit: item.unit.clone(),
            low_stock_threshold: item.low_stock_threshold,
            occurred_at: outcome.entry.created_at,
        })
    }
}
