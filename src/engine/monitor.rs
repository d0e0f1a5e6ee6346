use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use tracing::{debug, error};

use crate::{
    Result,
    runtime::{EventBus, SubscribeOptions, SubscriptionHandle},
    store::Store,
};

/// Records every published event into the event history.
///
/// The history of the `retention` most recently finished executions is kept;
/// older ones are pruned as new executions finish.
pub struct Monitor {
    store: Arc<Store>,
    bus: Arc<EventBus>,
    seq: Arc<AtomicU64>,
    retention: usize,
    subscription: Mutex<Option<SubscriptionHandle>>,
}

impl Monitor {
    pub fn new(
        store: Arc<Store>,
        bus: Arc<EventBus>,
        retention: usize,
    ) -> Self {
        Self {
            store,
            bus,
            seq: Arc::new(AtomicU64::new(0)),
            retention,
            subscription: Mutex::new(None),
        }
    }

    pub fn monitor(&self) -> Result<()> {
        let mut subscription = self.subscription.lock().unwrap_or_else(|e| e.into_inner());
        if subscription.is_some() {
            return Ok(());
        }

        let store = self.store.clone();
        let seq = self.seq.clone();
        let retention = self.retention;
        let finished = Mutex::new(VecDeque::new());
        // publishers are serialized by the bus, so `seq` follows publish order
        let handle = self.bus.subscribe(SubscribeOptions::default(), move |envelope| {
            let n = seq.fetch_add(1, Ordering::Relaxed) + 1;
            if let Err(err) = store.append_event(n, envelope) {
                error!(execution_id = %envelope.execution_id, "failed to record event {}: {}", envelope.event_type(), err);
            }
            if !envelope.is_terminal() {
                return;
            }

            let mut finished = finished.lock().unwrap_or_else(|e| e.into_inner());
            finished.push_back(envelope.execution_id.clone());
            while finished.len() > retention {
                let Some(oldest) = finished.pop_front() else {
                    break;
                };
                match store.prune_history(&oldest) {
                    Ok(removed) => debug!(execution_id = %oldest, removed, "pruned event history"),
                    Err(err) => error!(execution_id = %oldest, "failed to prune event history: {}", err),
                }
            }
        })?;
        *subscription = Some(handle);
        Ok(())
    }

    pub fn stop(&self) {
        if let Some(handle) = self.subscription.lock().unwrap_or_else(|e| e.into_inner()).take() {
            self.bus.unsubscribe(handle);
        }
    }
}
