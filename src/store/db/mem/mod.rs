mod collect;
mod r#impl;

use std::{collections::HashMap, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;

use crate::{
    Result,
    store::{DbCollection, DbStore, Store, data::*},
};
pub use collect::Collect;

/// Process-local backend. Contents are lost when the engine stops.
#[derive(Debug, Clone)]
pub struct MemStore {
    workflows: Arc<Collect<Workflow>>,
    triggers: Arc<Collect<Trigger>>,
    executions: Arc<Collect<Execution>>,
    events: Arc<Collect<Event>>,
}

/// A record that can be indexed by [`Collect`].
pub trait DbDocument: Serialize + DeserializeOwned {
    fn id(&self) -> &str;
    /// Queryable fields of the record.
    fn doc(&self) -> Result<HashMap<String, JsonValue>>;
}

impl DbStore for MemStore {
    fn init(
        &self,
        s: &Store,
    ) -> Result<()> {
        s.register(self.workflows())?;
        s.register(self.triggers())?;
        s.register(self.executions())?;
        s.register(self.events())?;
        Ok(())
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            workflows: Arc::new(Collect::new("workflows")),
            triggers: Arc::new(Collect::new("triggers")),
            executions: Arc::new(Collect::new("executions")),
            events: Arc::new(Collect::new("events")),
        }
    }

    pub fn workflows(&self) -> Arc<dyn DbCollection<Item = Workflow> + Send + Sync> {
        self.workflows.clone()
    }

    pub fn triggers(&self) -> Arc<dyn DbCollection<Item = Trigger> + Send + Sync> {
        self.triggers.clone()
    }

    pub fn executions(&self) -> Arc<dyn DbCollection<Item = Execution> + Send + Sync> {
        self.executions.clone()
    }

    pub fn events(&self) -> Arc<dyn DbCollection<Item = Event> + Send + Sync> {
        self.events.clone()
    }
}
