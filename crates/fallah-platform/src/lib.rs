pub mod config;
pub mod contracts;
pub mod db;
pub mod pg_store;
pub mod redis_bus;

pub use config::{ServiceConfig, StoreBackend};
pub use contracts::{
    AdjustQuantityRequest, CreateItemRequest, ErrorBody, HistoryQuery, ItemView,
    ItemWithHistoryView, UpdateItemRequest,
};
pub use db::{connect_database, ensure_schema};
pub use pg_store::PgStockStore;
pub use redis_bus::{LOW_STOCK_CHANNEL, RedisBus};
