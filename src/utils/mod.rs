pub mod time;

/// Random 21-character URL-safe id for timeline events, log entries and stored events.
pub fn longid() -> String {
    nanoid::nanoid!()
}

/// Id of a new execution.
pub fn execution_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
