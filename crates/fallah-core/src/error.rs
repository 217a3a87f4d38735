use thiserror::Error;
use uuid::Uuid;

use crate::kinds::ItemKind;

#[derive(Debug, Error)]
pub enum StockError {
    #[error("{0}")]
    Validation(String),
    #[error("{kind} item {item_id} not found")]
    NotFound { kind: ItemKind, item_id: Uuid },
    #[error("storage failure: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StockError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(kind: ItemKind, item_id: Uuid) -> Self {
        Self::NotFound { kind, item_id }
    }

    pub fn storage<E>(err: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        let err: anyhow::Error = err.into();
        Self::Storage(err.into())
    }

    /// Storage failures may be transient; input errors never are.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

pub type StockResult<T> = Result<T, StockError>;
