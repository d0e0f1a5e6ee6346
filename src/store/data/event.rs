use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Event {
    pub id: String,
    pub execution_id: String,
    /// global publish sequence number
    pub seq: u64,
    pub node_id: Option<String>,
    pub event_type: String,
    /// the published envelope as json
    pub data: String,
    pub timestamp: i64,
}

impl DbCollectionIden for Event {
    fn iden() -> StoreIden {
        StoreIden::Events
    }
}
