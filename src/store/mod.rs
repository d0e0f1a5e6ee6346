//! Storage layer for workflows, triggers, executions and event history.
//!
//! Collections are registered on a [`Store`] by a [`DbStore`] backend and looked up
//! by record type. Only the in-memory [`MemStore`] ships with the crate; other
//! backends implement the same two traits.

pub mod data;
mod db;
pub mod query;
mod store;

use std::sync::PoisonError;

use strum::{AsRefStr, EnumIter};

use crate::{FlowError, Result};

use query::Query;

pub use db::MemStore;
pub use store::Store;

fn map_lock_err<T>(err: PoisonError<T>) -> FlowError {
    FlowError::Store(err.to_string())
}

/// Identifiers for different storage collections.
#[derive(Debug, Clone, AsRefStr, PartialEq, Hash, Eq, EnumIter)]
pub enum StoreIden {
    /// Deployed workflow definitions.
    #[strum(serialize = "workflows")]
    Workflows,
    /// Trigger id to workflow id bindings.
    #[strum(serialize = "triggers")]
    Triggers,
    /// Execution records.
    #[strum(serialize = "executions")]
    Executions,
    /// Published execution events.
    #[strum(serialize = "events")]
    Events,
}

/// Trait for types that can identify their storage collection.
pub trait DbCollectionIden {
    /// Returns the collection identifier for this type.
    fn iden() -> StoreIden;
}

/// Trait for database collection operations.
pub trait DbCollection: Send + Sync {
    /// The type of items stored in this collection.
    type Item;

    /// Checks if a record with the given ID exists.
    fn exists(
        &self,
        id: &str,
    ) -> Result<bool>;

    /// Finds a record by ID.
    fn find(
        &self,
        id: &str,
    ) -> Result<Self::Item>;

    /// Lists the records matching `query`.
    fn query(
        &self,
        query: &Query,
    ) -> Result<Vec<Self::Item>>;

    /// Creates a new record.
    fn create(
        &self,
        data: &Self::Item,
    ) -> Result<bool>;

    /// Updates an existing record.
    fn update(
        &self,
        data: &Self::Item,
    ) -> Result<bool>;

    /// Deletes a record by ID.
    fn delete(
        &self,
        id: &str,
    ) -> Result<bool>;
}

/// Trait for database store initialization.
pub trait DbStore {
    /// Initializes the database and registers collections with the store.
    fn init(
        &self,
        s: &Store,
    ) -> Result<()>;
}
