use std::collections::HashMap;

use serde_json::{Value as JsonValue, json};

use crate::{
    Result,
    store::{data::Trigger, db::mem::DbDocument},
};

impl DbDocument for Trigger {
    fn id(&self) -> &str {
        &self.id
    }

    fn doc(&self) -> Result<HashMap<String, JsonValue>> {
        let mut map = HashMap::new();
        map.insert("id".to_string(), json!(self.id));
        map.insert("workflow_id".to_string(), json!(self.workflow_id));
        map.insert("create_time".to_string(), json!(self.create_time));
        Ok(map)
    }
}
