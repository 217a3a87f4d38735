use std::str::FromStr;

use fallah_core::{
    AdjustQuantity, InventoryItem, ItemDetailsPatch, NewInventoryItem, QuantityLedgerEntry,
    StockError, StockResult,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Body of `PATCH /{kind}/{id}/quantity`.
///
/// Fields stay loosely typed so that missing or non-numeric values surface
/// as validation errors instead of deserialization rejections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdjustQuantityRequest {
    pub quantity: Option<Value>,
    #[serde(rename = "type")]
    pub reason: Option<String>,
    pub notes: Option<String>,
}

impl AdjustQuantityRequest {
    pub fn into_command(self) -> StockResult<AdjustQuantity> {
        Ok(AdjustQuantity {
            delta: self
                .quantity
                .as_ref()
                .map(|value| decimal_field("quantity", value))
                .transpose()?,
            reason: self.reason,
            note: self.notes,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub quantity: Option<Value>,
    pub unit: Option<String>,
    pub low_stock_threshold: Option<Value>,
    pub attributes: Option<Value>,
}

impl CreateItemRequest {
    pub fn into_new_item(self) -> StockResult<NewInventoryItem> {
        let quantity = match self.quantity.as_ref() {
            Some(value) => decimal_field("quantity", value)?,
            None => Decimal::ZERO,
        };

        Ok(NewInventoryItem {
            name: self.name.unwrap_or_default(),
            category: self.category,
            quantity,
            unit: self.unit.unwrap_or_default(),
            low_stock_threshold: self
                .low_stock_threshold
                .as_ref()
                .map(|value| decimal_field("lowStockThreshold", value))
                .transpose()?,
            attributes: self.attributes,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    /// `null` clears the category; an absent field leaves it alone.
    #[serde(default, deserialize_with = "explicit_null")]
    pub category: Option<Option<String>>,
    pub unit: Option<String>,
    pub low_stock_threshold: Option<Value>,
    pub attributes: Option<Value>,
    pub quantity: Option<Value>,
}

impl UpdateItemRequest {
    pub fn into_patch(self) -> StockResult<ItemDetailsPatch> {
        if self.quantity.is_some() {
            return Err(StockError::validation(
                "quantity cannot be edited directly; use the quantity adjustment endpoint",
            ));
        }

        Ok(ItemDetailsPatch {
            name: self.name,
            category: self.category,
            unit: self.unit,
            low_stock_threshold: self
                .low_stock_threshold
                .as_ref()
                .map(|value| decimal_field("lowStockThreshold", value))
                .transpose()?,
            attributes: self.attributes,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    #[serde(flatten)]
    pub item: InventoryItem,
    pub low_stock: bool,
}

impl From<InventoryItem> for ItemView {
    fn from(item: InventoryItem) -> Self {
        Self {
            low_stock: item.is_low_stock(),
            item,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemWithHistoryView {
    #[serde(flatten)]
    pub item: ItemView,
    pub history: Vec<QuantityLedgerEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn decimal_field(field: &str, value: &Value) -> StockResult<Decimal> {
    let parsed = match value {
        Value::Number(number) => {
            Decimal::from_str(&number.to_string()).or_else(|_| {
                Decimal::from_scientific(&number.to_string())
            })
        }
        Value::String(text) => Decimal::from_str(text.trim()),
        _ => {
            return Err(StockError::validation(format!("{field} must be a number")));
        }
    };

    parsed.map_err(|_| StockError::validation(format!("{field} must be a number")))
}

fn explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}
