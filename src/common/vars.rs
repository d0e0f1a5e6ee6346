use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// Ordered JSON object used for node outputs, emitted variables and snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Vars {
    inner: Map<String, Value>,
}

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to any serializable value. Values that fail to serialize become `null`.
    pub fn set<T: Serialize>(
        &mut self,
        name: &str,
        value: T,
    ) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.inner.insert(name.to_string(), value);
    }

    pub fn insert(
        &mut self,
        name: String,
        value: Value,
    ) -> Option<Value> {
        self.inner.insert(name, value)
    }

    /// Builder-style `set`.
    pub fn with<T: Serialize>(
        mut self,
        name: &str,
        value: T,
    ) -> Self {
        self.set(name, value);
        self
    }

    /// Typed read. Returns `None` when missing or when the value does not deserialize into `T`.
    pub fn get<T: DeserializeOwned>(
        &self,
        name: &str,
    ) -> Option<T> {
        self.inner.get(name).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn get_value(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.inner.get(name)
    }

    pub fn contains(
        &self,
        name: &str,
    ) -> bool {
        self.inner.contains_key(name)
    }

    pub fn remove(
        &mut self,
        name: &str,
    ) -> Option<Value> {
        self.inner.remove(name)
    }

    pub fn extend(
        &mut self,
        other: Vars,
    ) {
        self.inner.extend(other.inner);
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn iter(&self) -> serde_json::map::Iter<'_> {
        self.inner.iter()
    }
}

impl From<Value> for Vars {
    /// Objects map one to one; any other value is stored under `value`.
    fn from(value: Value) -> Self {
        match value {
            Value::Object(inner) => Self {
                inner,
            },
            Value::Null => Self::new(),
            other => Self::new().with("value", other),
        }
    }
}

impl From<Map<String, Value>> for Vars {
    fn from(inner: Map<String, Value>) -> Self {
        Self {
            inner,
        }
    }
}

impl From<Vars> for Value {
    fn from(vars: Vars) -> Self {
        Value::Object(vars.inner)
    }
}

impl FromIterator<(String, Value)> for Vars {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Vars {
    type Item = (String, Value);
    type IntoIter = serde_json::map::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}
