use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Execution {
    pub id: String,
    pub workflow_id: String,
    pub status: String,
    /// the full execution record as json
    pub data: String,
    pub start_time: i64,
    pub end_time: i64,
    pub timestamp: i64,
}

impl DbCollectionIden for Execution {
    fn iden() -> StoreIden {
        StoreIden::Executions
    }
}
