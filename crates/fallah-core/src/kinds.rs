use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    adjustment::AdjustmentReason,
    error::{StockError, StockResult},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Stock,
    Feed,
    Seeds,
    Fertilizer,
    Equipment,
    Harvest,
    Tools,
}

impl ItemKind {
    pub const ALL: [ItemKind; 7] = [
        ItemKind::Stock,
        ItemKind::Feed,
        ItemKind::Seeds,
        ItemKind::Fertilizer,
        ItemKind::Equipment,
        ItemKind::Harvest,
        ItemKind::Tools,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Stock => "stock",
            ItemKind::Feed => "feed",
            ItemKind::Seeds => "seeds",
            ItemKind::Fertilizer => "fertilizer",
            ItemKind::Equipment => "equipment",
            ItemKind::Harvest => "harvest",
            ItemKind::Tools => "tools",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = StockError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        ItemKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| StockError::validation(format!("unknown inventory kind: {value}")))
    }
}

/// Capabilities that distinguish one inventory kind from another.
///
/// Every kind shares the same adjustment rule and ledger; only the reasons a
/// caller may use and the shape of acceptable quantities differ.
pub trait InventoryKind: Send + Sync + 'static {
    const KIND: ItemKind;
    const ALLOWED_REASONS: &'static [AdjustmentReason];

    /// Kinds counted in whole units (machines, hand tools) reject fractions.
    const WHOLE_UNITS: bool = false;

    fn parse_reason(raw: &str) -> StockResult<AdjustmentReason> {
        let allowed = || {
            Self::ALLOWED_REASONS
                .iter()
                .map(|reason| reason.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let reason: AdjustmentReason = raw.parse().map_err(|_| {
            StockError::validation(format!("type must be one of: {}", allowed()))
        })?;

        if !Self::ALLOWED_REASONS.contains(&reason) {
            return Err(StockError::validation(format!(
                "type '{}' is not allowed for {}; expected one of: {}",
                reason,
                Self::KIND,
                allowed()
            )));
        }

        Ok(reason)
    }

    fn check_quantity_shape(field: &str, value: Decimal) -> StockResult<()> {
        if Self::WHOLE_UNITS && !value.fract().is_zero() {
            return Err(StockError::validation(format!(
                "{field} must be a whole number for {}",
                Self::KIND
            )));
        }
        Ok(())
    }
}

const ALL_REASONS: &[AdjustmentReason] = &[
    AdjustmentReason::Add,
    AdjustmentReason::Remove,
    AdjustmentReason::Expired,
    AdjustmentReason::Damaged,
];

const DURABLE_REASONS: &[AdjustmentReason] = &[
    AdjustmentReason::Add,
    AdjustmentReason::Remove,
    AdjustmentReason::Damaged,
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Stock;

impl InventoryKind for Stock {
    const KIND: ItemKind = ItemKind::Stock;
    const ALLOWED_REASONS: &'static [AdjustmentReason] =
        &[AdjustmentReason::Add, AdjustmentReason::Remove];
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Feed;

impl InventoryKind for Feed {
    const KIND: ItemKind = ItemKind::Feed;
    const ALLOWED_REASONS: &'static [AdjustmentReason] = ALL_REASONS;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Seeds;

impl InventoryKind for Seeds {
    const KIND: ItemKind = ItemKind::Seeds;
    const ALLOWED_REASONS: &'static [AdjustmentReason] = ALL_REASONS;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Fertilizer;

impl InventoryKind for Fertilizer {
    const KIND: ItemKind = ItemKind::Fertilizer;
    const ALLOWED_REASONS: &'static [AdjustmentReason] = ALL_REASONS;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Harvest;

impl InventoryKind for Harvest {
    const KIND: ItemKind = ItemKind::Harvest;
    const ALLOWED_REASONS: &'static [AdjustmentReason] = ALL_REASONS;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Equipment;

impl InventoryKind for Equipment {
    const KIND: ItemKind = ItemKind::Equipment;
    const ALLOWED_REASONS: &'static [AdjustmentReason] = DURABLE_REASONS;
    const WHOLE_UNITS: bool = true;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Tools;

impl InventoryKind for Tools {
    const KIND: ItemKind = ItemKind::Tools;
    const ALLOWED_REASONS: &'static [AdjustmentReason] = DURABLE_REASONS;
    const WHOLE_UNITS: bool = true;
}
