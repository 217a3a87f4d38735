pub mod adjustment;
pub mod error;
pub mod events;
pub mod kinds;
pub mod models;
pub mod service;
pub mod storage;

pub use adjustment::{AdjustQuantity, Adjustment, AdjustmentOutcome, AdjustmentReason, next_quantity};
pub use error::{StockError, StockResult};
pub use events::LowStockEvent;
pub use kinds::{
    Equipment, Feed, Fertilizer, Harvest, InventoryKind, ItemKind, Seeds, Stock, Tools,
};
pub use models::{InventoryItem, ItemDetailsPatch, NewInventoryItem, QuantityLedgerEntry};
pub use service::{AdjustedItem, StockService};
pub use storage::{HistoryPage, StockStore};
