//! Per-execution variable scope and `{{var}}` template resolution.
//!
//! Identifiers may be dotted paths into JSON objects and arrays:
//! `{{user.name}}`, `{{items.0}}`, `{{env.REGION}}`. Resolution never fails; an
//! identifier that does not resolve renders as an empty string and is reported
//! as a `warn` log entry.

use std::{fmt, sync::Arc, sync::LazyLock};

use regex::{Captures, Regex};
use serde_json::{Value, json};
use tracing::warn;

use crate::{common::Vars, events::LogEntry};

/// Format: `{{name}}` or `{{name.key.0}}`, surrounding whitespace allowed.
static TEMPLATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{\s*([^{}\s]+)\s*\}\}").expect("template pattern is valid"));

/// Receives the log entries produced while resolving templates.
pub type LogSink = Arc<dyn Fn(LogEntry) + Send + Sync>;

#[derive(Clone, Default)]
pub struct VariableStore {
    vars: Vars,
    sink: Option<LogSink>,
}

impl fmt::Debug for VariableStore {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("VariableStore").field("vars", &self.vars).finish()
    }
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(
        mut self,
        sink: LogSink,
    ) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Look up a name or a dotted path.
    pub fn get(
        &self,
        name: &str,
    ) -> Option<Value> {
        let mut segments = name.split('.');
        let first = segments.next()?;
        let mut current = self.vars.get_value(first)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }

    /// Last write wins. Returns the previous value.
    pub fn set(
        &mut self,
        name: &str,
        value: Value,
    ) -> Option<Value> {
        self.vars.insert(name.to_string(), value)
    }

    pub fn extend(
        &mut self,
        vars: Vars,
    ) {
        self.vars.extend(vars);
    }

    /// Substitute every placeholder in `template`.
    ///
    /// Strings render raw, other JSON values render as JSON text.
    pub fn resolve_template(
        &self,
        template: &str,
    ) -> String {
        TEMPLATE_PATTERN
            .replace_all(template, |caps: &Captures| match self.lookup(&caps[1]) {
                Some(Value::String(s)) => s,
                Some(v) => v.to_string(),
                None => String::new(),
            })
            .into_owned()
    }

    /// Like [`resolve_template`](Self::resolve_template), but a template that is
    /// exactly one placeholder yields the referenced value with its JSON type intact.
    pub fn resolve_value(
        &self,
        template: &str,
    ) -> Value {
        if let Some(caps) = TEMPLATE_PATTERN.captures(template.trim()) {
            if caps[0].len() == template.trim().len() {
                return self.lookup(&caps[1]).unwrap_or(Value::Null);
            }
        }
        Value::String(self.resolve_template(template))
    }

    /// Resolve templates in every string of a JSON structure.
    pub fn resolve_json(
        &self,
        value: &Value,
    ) -> Value {
        match value {
            Value::String(s) => self.resolve_value(s),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.resolve_json(v)).collect()),
            Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), self.resolve_json(v))).collect()),
            other => other.clone(),
        }
    }

    pub fn snapshot(&self) -> Vars {
        self.vars.clone()
    }

    fn lookup(
        &self,
        name: &str,
    ) -> Option<Value> {
        let value = self.get(name);
        if value.is_none() {
            warn!(variable = name, "unresolved template variable");
            if let Some(sink) = &self.sink {
                sink(LogEntry::warn(format!("unresolved template variable '{}'", name)).with_metadata(json!({ "variable": name })));
            }
        }
        value
    }
}
