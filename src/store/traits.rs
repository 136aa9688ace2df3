use crate::model::{ExpandResult, KeyPredicate, Schema, StructuredType, WriteInstruction};
use anyhow::Result;
use std::sync::Arc;

pub trait MetadataProvider: Send + Sync {
    fn schema(&self) -> &Schema;
}

#[async_trait::async_trait]
pub trait QueryProvider: Send + Sync {
    /// Rows of `entity_type` matching the key predicates (all rows when
    /// empty), with one child result per expanded association alias
    async fn query(
        &self,
        entity_type: &Arc<StructuredType>,
        keys: &[KeyPredicate],
        expand: &[String],
    ) -> Result<ExpandResult>;
}

/// Applies a partial update. Errors that should reach the client with a
/// specific status are raised as `ProcessError`.
#[async_trait::async_trait]
pub trait WriteHandler: Send + Sync {
    async fn update_entity(&self, instruction: &WriteInstruction) -> Result<()>;
}

/// A unit of work on the data store
#[async_trait::async_trait]
pub trait Transaction: Send + Sync {
    async fn is_active(&self) -> bool;
    async fn begin(&self) -> Result<()>;
    async fn commit(&self) -> Result<()>;
    async fn rollback(&self) -> Result<()>;
}

/// Hands out one transaction per request. Writes made through the handle
/// between `begin` and `commit` or `rollback` belong to that transaction only.
pub trait TransactionProvider: Send + Sync {
    type Transaction: Transaction + WriteHandler + 'static;

    fn transaction(&self) -> Self::Transaction;
}

pub trait Store:
    MetadataProvider + QueryProvider + WriteHandler + TransactionProvider + Send + Sync
{
}
