//! The context mapping passed to a task's prompt composition (spec §4.4).
//!
//! `Context` is a thin wrapper over a JSON object. The scheduler seeds it
//! from caller `inputs` first, then layers reserved keys
//! (`previous_tasks_output`, `last_task_output`, ...) on top. Per the
//! resolved Open Question in spec §9, reserved keys always win; a caller
//! key with the same name is shadowed and logged at `warn` level exactly
//! once, at the point of collision.

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct Context {
    values: BTreeMap<String, serde_json::Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the context from caller-supplied inputs. These have the lowest
    /// precedence: any reserved key inserted afterwards silently shadows
    /// (with a logged warning) an input of the same name.
    pub fn from_inputs(inputs: &BTreeMap<String, serde_json::Value>) -> Self {
        Context {
            values: inputs.clone(),
        }
    }

    /// Insert a reserved (scheduler-owned) key, logging a warning if it
    /// shadows a caller-supplied input.
    pub fn insert_reserved(&mut self, key: &str, value: impl Serialize) {
        let json = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        if let Some(previous) = self.values.get(key) {
            if previous != &json {
                tracing::warn!(
                    key = key,
                    "caller input shadowed by reserved context key"
                );
            }
        }
        self.values.insert(key.to_string(), json);
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_str())
    }

    pub fn as_map(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.values
    }

    pub fn into_map(self) -> BTreeMap<String, serde_json::Value> {
        self.values
    }

    /// Renders the context as `key: value` lines, sorted by key, for
    /// splicing into a prompt. Values that are JSON strings are rendered
    /// unquoted; everything else is rendered as compact JSON.
    pub fn render(&self) -> String {
        self.values
            .iter()
            .map(|(key, value)| match value.as_str() {
                Some(text) => format!("{key}: {text}"),
                None => format!("{key}: {value}"),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
