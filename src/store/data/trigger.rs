use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Trigger {
    pub id: String,
    pub workflow_id: String,
    pub create_time: i64,
}

impl DbCollectionIden for Trigger {
    fn iden() -> StoreIden {
        StoreIden::Triggers
    }
}
