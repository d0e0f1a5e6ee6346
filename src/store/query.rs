use serde_json::Value;

/// Equality filters plus an optional ascending sort field.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(
        mut self,
        field: &str,
        value: impl Into<Value>,
    ) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    /// Sorts matching records by `field`, smallest first.
    pub fn order_by(
        mut self,
        field: &str,
    ) -> Self {
        self.order_by = Some(field.to_string());
        self
    }
}
