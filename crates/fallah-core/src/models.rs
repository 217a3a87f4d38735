use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    adjustment::AdjustmentReason,
    error::{StockError, StockResult},
    kinds::{InventoryKind, ItemKind},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: ItemKind,
    pub name: String,
    pub category: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub low_stock_threshold: Decimal,
    pub attributes: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.low_stock_threshold
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuantityLedgerEntry {
    pub id: Uuid,
    pub item_id: Uuid,
    pub reason: AdjustmentReason,
    /// Requested magnitude, not the change actually applied to the item.
    pub quantity: Decimal,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewInventoryItem {
    pub name: String,
    pub category: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub low_stock_threshold: Option<Decimal>,
    pub attributes: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct ItemDetailsPatch {
    pub name: Option<String>,
    pub category: Option<Option<String>>,
    pub unit: Option<String>,
    pub low_stock_threshold: Option<Decimal>,
    pub attributes: Option<Value>,
}

impl NewInventoryItem {
    pub fn into_item<K: InventoryKind>(self, owner_id: Uuid) -> StockResult<InventoryItem> {
        let name = required_text("name", &self.name)?;
        let unit = required_text("unit", &self.unit)?;
        non_negative("quantity", self.quantity)?;
        K::check_quantity_shape("quantity", self.quantity)?;

        let low_stock_threshold = self.low_stock_threshold.unwrap_or(Decimal::ZERO);
        non_negative("lowStockThreshold", low_stock_threshold)?;

        let attributes = object_attributes(self.attributes)?;
        let now = Utc::now();

        Ok(InventoryItem {
            id: Uuid::new_v4(),
            owner_id,
            kind: K::KIND,
            name,
            category: optional_text(self.category),
            quantity: self.quantity,
            unit,
            low_stock_threshold,
            attributes,
            created_at: now,
            updated_at: now,
        })
    }
}

impl ItemDetailsPatch {
    /// Checks the patch in isolation so stores can apply it without
    /// re-validating field contents.
    pub fn validated(self) -> StockResult<Self> {
        let name = self
            .name
            .map(|name| required_text("name", &name))
            .transpose()?;
        let unit = self
            .unit
            .map(|unit| required_text("unit", &unit))
            .transpose()?;
        if let Some(threshold) = self.low_stock_threshold {
            non_negative("lowStockThreshold", threshold)?;
        }
        let attributes = match self.attributes {
            Some(value) => Some(object_attributes(Some(value))?),
            None => None,
        };

        Ok(Self {
            name,
            category: self.category.map(optional_text),
            unit,
            low_stock_threshold: self.low_stock_threshold,
            attributes,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.unit.is_none()
            && self.low_stock_threshold.is_none()
            && self.attributes.is_none()
    }

    pub fn apply(&self, item: &mut InventoryItem) {
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(category) = &self.category {
            item.category = category.clone();
        }
        if let Some(unit) = &self.unit {
            item.unit = unit.clone();
        }
        if let Some(threshold) = self.low_stock_threshold {
            item.low_stock_threshold = threshold;
        }
        if let Some(attributes) = &self.attributes {
            item.attributes = attributes.clone();
        }
        item.updated_at = Utc::now();
    }
}

fn required_text(field: &str, value: &str) -> StockResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StockError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn non_negative(field: &str, value: Decimal) -> StockResult<()> {
    if value < Decimal::ZERO {
        return Err(StockError::validation(format!(
            "{field} must not be negative"
        )));
    }
    Ok(())
}

fn object_attributes(value: Option<Value>) -> StockResult<Value> {
    match value {
        None | Some(Value::Null) => Ok(Value::Object(Default::default())),
        Some(value @ Value::Object(_)) => Ok(value),
        Some(_) => Err(StockError::validation("attributes must be a JSON object")),
    }
}
