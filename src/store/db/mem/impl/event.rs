use std::collections::HashMap;

use serde_json::{Value as JsonValue, json};

use crate::{
    Result,
    store::{data::Event, db::mem::DbDocument},
};

impl DbDocument for Event {
    fn id(&self) -> &str {
        &self.id
    }

    fn doc(&self) -> Result<HashMap<String, JsonValue>> {
        let mut map = HashMap::new();
        map.insert("id".to_string(), json!(self.id));
        map.insert("execution_id".to_string(), json!(self.execution_id));
        map.insert("seq".to_string(), json!(self.seq));
        map.insert("node_id".to_string(), json!(self.node_id));
        map.insert("event_type".to_string(), json!(self.event_type));
        map.insert("timestamp".to_string(), json!(self.timestamp));
        Ok(map)
    }
}
