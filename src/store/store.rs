use std::{
    any::Any,
    collections::HashMap,
    convert::AsRef,
    sync::{Arc, RwLock},
};

use tracing::trace;

use crate::{
    FlowError, Result, ShareLock,
    events::Envelope,
    model::{self, WorkflowModel},
    utils,
};

use super::{
    DbCollection, DbCollectionIden, StoreIden,
    data::*,
    map_lock_err,
    query::Query,
};

#[derive(Clone)]
pub struct DynDbSetRef<T>(Arc<dyn DbCollection<Item = T>>);

/// Typed registry of the collections a backend provides.
pub struct Store {
    collections: ShareLock<HashMap<StoreIden, Arc<dyn Any + Send + Sync + 'static>>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn collection<DATA>(&self) -> Result<Arc<dyn DbCollection<Item = DATA>>>
    where
        DATA: DbCollectionIden + Send + Sync + 'static,
    {
        let collections = self.collections.read().map_err(map_lock_err)?;
        collections
            .get(&DATA::iden())
            .and_then(|c| c.downcast_ref::<DynDbSetRef<DATA>>())
            .map(|v| v.0.clone())
            .ok_or_else(|| FlowError::Store(format!("collection {} is not registered", DATA::iden().as_ref())))
    }

    pub fn register<DATA>(
        &self,
        collection: Arc<dyn DbCollection<Item = DATA> + Send + Sync + 'static>,
    ) -> Result<()>
    where
        DATA: DbCollectionIden + 'static,
    {
        let mut collections = self.collections.write().map_err(map_lock_err)?;
        collections.insert(DATA::iden(), Arc::new(DynDbSetRef::<DATA>(collection)));
        Ok(())
    }

    pub fn workflows(&self) -> Result<Arc<dyn DbCollection<Item = Workflow>>> {
        self.collection()
    }

    pub fn triggers(&self) -> Result<Arc<dyn DbCollection<Item = Trigger>>> {
        self.collection()
    }

    pub fn executions(&self) -> Result<Arc<dyn DbCollection<Item = Execution>>> {
        self.collection()
    }

    pub fn events(&self) -> Result<Arc<dyn DbCollection<Item = Event>>> {
        self.collection()
    }

    /// Stores a definition under its id, replacing an earlier deployment.
    pub fn deploy(
        &self,
        workflow: &WorkflowModel,
    ) -> Result<bool> {
        trace!("store::deploy({})", workflow.id);
        if workflow.id.is_empty() {
            return Err(FlowError::Engine("missing id in workflow".into()));
        }
        let workflows = self.workflows()?;
        let text = serde_json::to_string(workflow)?;
        match workflows.find(&workflow.id) {
            Ok(m) => {
                let data = Workflow {
                    id: workflow.id.clone(),
                    name: workflow.name.clone(),
                    desc: workflow.desc.clone(),
                    data: text,
                    create_time: m.create_time,
                    update_time: utils::time::time_millis(),
                };
                workflows.update(&data)
            }
            Err(FlowError::NotFound(_)) => {
                let data = Workflow {
                    id: workflow.id.clone(),
                    name: workflow.name.clone(),
                    desc: workflow.desc.clone(),
                    data: text,
                    create_time: utils::time::time_millis(),
                    update_time: 0,
                };
                workflows.create(&data)
            }
            Err(err) => Err(err),
        }
    }

    pub fn load_workflow(
        &self,
        id: &str,
    ) -> Result<WorkflowModel> {
        let data = self.workflows()?.find(id)?;
        WorkflowModel::from_json(&data.data)
    }

    pub fn bind_trigger(
        &self,
        trigger_id: &str,
        workflow_id: &str,
    ) -> Result<bool> {
        trace!("store::bind_trigger({}, {})", trigger_id, workflow_id);
        let triggers = self.triggers()?;
        let data = Trigger {
            id: trigger_id.to_string(),
            workflow_id: workflow_id.to_string(),
            create_time: utils::time::time_millis(),
        };
        if triggers.exists(trigger_id)? {
            triggers.update(&data)
        } else {
            triggers.create(&data)
        }
    }

    /// Creates or refreshes the stored copy of an execution.
    pub fn save_execution(
        &self,
        exec: &model::Execution,
    ) -> Result<bool> {
        trace!("store::save_execution({}, {})", exec.id, exec.status);
        let executions = self.executions()?;
        let data = Execution {
            id: exec.id.clone(),
            workflow_id: exec.workflow_id.clone(),
            status: exec.status.to_string(),
            data: serde_json::to_string(exec)?,
            start_time: exec.started_at.timestamp_millis(),
            end_time: exec.completed_at.map(|t| t.timestamp_millis()).unwrap_or_default(),
            timestamp: utils::time::time_millis(),
        };
        if executions.exists(&exec.id)? {
            executions.update(&data)
        } else {
            executions.create(&data)
        }
    }

    pub fn load_execution(
        &self,
        id: &str,
    ) -> Result<model::Execution> {
        let data = self.executions()?.find(id)?;
        Ok(serde_json::from_str(&data.data)?)
    }

    pub fn append_event(
        &self,
        seq: u64,
        envelope: &Envelope,
    ) -> Result<bool> {
        let data = Event {
            id: utils::longid(),
            execution_id: envelope.execution_id.clone(),
            seq,
            node_id: envelope.node_id.clone(),
            event_type: envelope.event_type().to_string(),
            data: serde_json::to_string(envelope)?,
            timestamp: envelope.timestamp.timestamp_millis(),
        };
        self.events()?.create(&data)
    }

    /// Drops the recorded events of an execution, returning how many were removed.
    pub fn prune_history(
        &self,
        execution_id: &str,
    ) -> Result<usize> {
        trace!("store::prune_history({})", execution_id);
        let events = self.events()?;
        let mut removed = 0;
        for event in events.query(&Query::new().filter("execution_id", execution_id))? {
            if events.delete(&event.id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Recorded events of an execution in publish order.
    pub fn history(
        &self,
        execution_id: &str,
    ) -> Result<Vec<Envelope>> {
        let q = Query::new().filter("execution_id", execution_id).order_by("seq");
        self.events()?
            .query(&q)?
            .iter()
            .map(|e| serde_json::from_str::<Envelope>(&e.data).map_err(FlowError::from))
            .collect()
    }
}
