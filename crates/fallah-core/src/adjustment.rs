use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    error::{StockError, StockResult},
    kinds::InventoryKind,
    models::{InventoryItem, QuantityLedgerEntry},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentReason {
    Add,
    Remove,
    Expired,
    Damaged,
}

impl AdjustmentReason {
    pub fn as_str(self) -> &'static str {
        match self {
            AdjustmentReason::Add => "add",
            AdjustmentReason::Remove => "remove",
            AdjustmentReason::Expired => "expired",
            AdjustmentReason::Damaged => "damaged",
        }
    }

    pub fn is_increase(self) -> bool {
        self == AdjustmentReason::Add
    }
}

impl fmt::Display for AdjustmentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdjustmentReason {
    type Err = StockError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "add" => Ok(AdjustmentReason::Add),
            "remove" => Ok(AdjustmentReason::Remove),
            "expired" => Ok(AdjustmentReason::Expired),
            "damaged" => Ok(AdjustmentReason::Damaged),
            _ => Err(StockError::validation(format!(
                "unknown adjustment type: {value}"
            ))),
        }
    }
}

/// Applies one adjustment to an on-hand quantity.
///
/// Decreases never drive the result below zero: a removal larger than what
/// is on hand clamps to zero instead of failing. An increase past the
/// largest representable decimal is rejected.
pub fn next_quantity(
    current: Decimal,
    delta: Decimal,
    reason: AdjustmentReason,
) -> StockResult<Decimal> {
    if reason.is_increase() {
        current
            .checked_add(delta)
            .ok_or_else(|| StockError::validation("quantity exceeds the supported range"))
    } else {
        Ok(current
            .checked_sub(delta)
            .map_or(Decimal::ZERO, |remaining| remaining.max(Decimal::ZERO)))
    }
}

/// An adjustment request as it arrives from a caller, before validation.
#[derive(Debug, Clone, Default)]
pub struct AdjustQuantity {
    pub delta: Option<Decimal>,
    pub reason: Option<String>,
    pub note: Option<String>,
}

/// A validated adjustment, ready to be applied by a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjustment {
    pub reason: AdjustmentReason,
    pub delta: Decimal,
    pub note: Option<String>,
}

impl Adjustment {
    pub fn validate<K: InventoryKind>(command: AdjustQuantity) -> StockResult<Self> {
        let delta = command
            .delta
            .ok_or_else(|| StockError::validation("quantity is required"))?;
        if delta <= Decimal::ZERO {
            return Err(StockError::validation("quantity must be a positive number"));
        }
        K::check_quantity_shape("quantity", delta)?;

        let raw_reason = command
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| StockError::validation("type is required"))?;
        let reason = K::parse_reason(raw_reason)?;

        let note = command
            .note
            .map(|note| note.trim().to_string())
            .filter(|note| !note.is_empty());

        Ok(Self {
            reason,
            delta,
            note,
        })
    }

    pub fn apply_to(&self, current: Decimal) -> StockResult<Decimal> {
        next_quantity(current, self.delta, self.reason)
    }
}

/// What a store reports back after committing one adjustment.
///
/// `recent_history` is read in the same unit of work as the write, so it
/// always contains `entry` unless the caller asked for no history at all.
#[derive(Debug, Clone)]
pub struct AdjustmentOutcome {
    pub previous_quantity: Decimal,
    pub item: InventoryItem,
    pub entry: QuantityLedgerEntry,
    pub recent_history: Vec<QuantityLedgerEntry>,
}

impl AdjustmentOutcome {
    /// The quantity actually removed or added, which may be smaller than the
    /// ledger entry's requested magnitude when a decrease was clamped.
    pub fn applied_change(&self) -> Decimal {
        (self.item.quantity - self.previous_quantity).abs()
    }

    pub fn entered_low_stock(&self) -> bool {
        self.previous_quantity > self.item.low_stock_threshold && self.item.is_low_stock()
    }
}
