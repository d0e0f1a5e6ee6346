use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::RwLock,
};

use serde_json::Value as JsonValue;
use tracing::trace;

use super::DbDocument;
use crate::{
    FlowError, Result,
    store::{DbCollection, map_lock_err, query::Query},
};

/// A named in-memory collection keyed by record id.
#[derive(Debug)]
pub struct Collect<T> {
    name: String,
    items: RwLock<HashMap<String, T>>,
}

impl<T> Collect<T>
where
    T: DbDocument,
{
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            items: RwLock::new(HashMap::new()),
        }
    }

    fn matches(
        doc: &HashMap<String, JsonValue>,
        query: &Query,
    ) -> bool {
        query.filters.iter().all(|(field, value)| doc.get(field).unwrap_or(&JsonValue::Null) == value)
    }
}

fn compare(
    a: Option<&JsonValue>,
    b: Option<&JsonValue>,
) -> Ordering {
    match (a, b) {
        (Some(JsonValue::Number(a)), Some(JsonValue::Number(b))) => {
            let a = a.as_f64().unwrap_or_default();
            let b = b.as_f64().unwrap_or_default();
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(JsonValue::String(a)), Some(JsonValue::String(b))) => a.cmp(b),
        (Some(JsonValue::Null) | None, Some(JsonValue::Null) | None) => Ordering::Equal,
        (Some(JsonValue::Null) | None, _) => Ordering::Less,
        (_, Some(JsonValue::Null) | None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

impl<T> DbCollection for Collect<T>
where
    T: DbDocument + Clone + Send + Sync,
{
    type Item = T;

    fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        let items = self.items.read().map_err(map_lock_err)?;
        Ok(items.contains_key(id))
    }

    fn find(
        &self,
        id: &str,
    ) -> Result<T> {
        trace!("{}::find({})", self.name, id);
        let items = self.items.read().map_err(map_lock_err)?;
        items.get(id).cloned().ok_or_else(|| FlowError::NotFound(format!("{} {}", self.name, id)))
    }

    fn query(
        &self,
        query: &Query,
    ) -> Result<Vec<T>> {
        trace!("{}::query({:?})", self.name, query);
        let items = self.items.read().map_err(map_lock_err)?;

        let mut rows = Vec::new();
        for item in items.values() {
            let doc = item.doc()?;
            if Self::matches(&doc, query) {
                rows.push((doc, item.clone()));
            }
        }

        if let Some(field) = &query.order_by {
            rows.sort_by(|(a, _), (b, _)| compare(a.get(field), b.get(field)));
        }
        Ok(rows.into_iter().map(|(_, item)| item).collect())
    }

    fn create(
        &self,
        data: &T,
    ) -> Result<bool> {
        trace!("{}::create({})", self.name, data.id());
        let mut items = self.items.write().map_err(map_lock_err)?;
        if items.contains_key(data.id()) {
            return Err(FlowError::Store(format!("{} {} already exists", self.name, data.id())));
        }
        items.insert(data.id().to_string(), data.clone());
        Ok(true)
    }

    fn update(
        &self,
        data: &T,
    ) -> Result<bool> {
        trace!("{}::update({})", self.name, data.id());
        let mut items = self.items.write().map_err(map_lock_err)?;
        match items.get_mut(data.id()) {
            Some(item) => {
                *item = data.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        trace!("{}::delete({})", self.name, id);
        let mut items = self.items.write().map_err(map_lock_err)?;
        Ok(items.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::data::Event;

    fn event(
        id: &str,
        execution_id: &str,
        seq: u64,
    ) -> Event {
        Event {
            id: id.to_string(),
            execution_id: execution_id.to_string(),
            seq,
            node_id: None,
            event_type: "execution:log".to_string(),
            data: "{}".to_string(),
            timestamp: 0,
        }
    }

    #[test]
    fn test_collect_crud() {
        let c = Collect::<Event>::new("events");
        assert!(c.create(&event("e1", "x", 1)).unwrap());
        assert!(c.exists("e1").unwrap());
        assert!(c.create(&event("e1", "x", 1)).is_err());

        let mut e = c.find("e1").unwrap();
        e.seq = 7;
        assert!(c.update(&e).unwrap());
        assert_eq!(c.find("e1").unwrap().seq, 7);

        assert!(c.delete("e1").unwrap());
        assert!(!c.delete("e1").unwrap());
        assert!(matches!(c.find("e1"), Err(FlowError::NotFound(_))));
    }

    #[test]
    fn test_collect_query_filter_and_order() {
        let c = Collect::<Event>::new("events");
        c.create(&event("e3", "x", 3)).unwrap();
        c.create(&event("e1", "x", 1)).unwrap();
        c.create(&event("e2", "y", 2)).unwrap();
        c.create(&event("e4", "x", 4)).unwrap();

        let q = Query::new().filter("execution_id", json!("x")).order_by("seq");
        let ids: Vec<_> = c.query(&q).unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["e1", "e3", "e4"]);

        let ids: Vec<_> = c.query(&Query::new().order_by("seq")).unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["e1", "e2", "e3", "e4"]);
    }
}
