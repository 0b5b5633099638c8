use std::collections::BTreeMap;

use flowprobe_core::types::{Expectations, FlowStep};
use serde_json::Value as JsonValue;

use crate::executor::http::HttpResponse;

/// Named JSON schemas that `expectations.schema` refers to.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, JsonValue>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, schema: JsonValue) {
        self.schemas.insert(name.into(), schema);
    }

    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.schemas.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl From<BTreeMap<String, JsonValue>> for SchemaRegistry {
    fn from(schemas: BTreeMap<String, JsonValue>) -> Self {
        Self { schemas }
    }
}

impl<K: Into<String>> FromIterator<(K, JsonValue)> for SchemaRegistry {
    fn from_iter<I: IntoIterator<Item = (K, JsonValue)>>(iter: I) -> Self {
        Self {
            schemas: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// What the engine is asked to validate.
pub struct ValidationInput<'a> {
    pub step: &'a FlowStep,
    pub response: &'a HttpResponse,
    pub expectations: &'a Expectations,
    pub schemas: &'a SchemaRegistry,
}

/// A response prepared once for all validators: the body is decoded a single time.
pub struct ValidationContext<'a> {
    pub step_name: &'a str,
    pub status: u16,
    pub headers: &'a BTreeMap<String, String>,
    pub body_text: String,
    pub body_json: Option<JsonValue>,
    pub expectations: &'a Expectations,
    pub schemas: &'a SchemaRegistry,
}

impl<'a> ValidationContext<'a> {
    pub fn from_input(input: &ValidationInput<'a>) -> Self {
        let body_text = String::from_utf8_lossy(&input.response.body).into_owned();
        let body_json = if body_text.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&body_text).ok()
        };
        Self {
            step_name: &input.step.name,
            status: input.response.status,
            headers: &input.response.headers,
            body_text,
            body_json,
            expectations: input.expectations,
            schemas: input.schemas,
        }
    }
}

pub(crate) const ROOT_FIELD: &str = "$";

pub(crate) fn child_key(parent: &str, key: &str) -> String {
    if parent.is_empty() || parent == ROOT_FIELD {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

pub(crate) fn child_index(parent: &str, index: usize) -> String {
    if parent.is_empty() || parent == ROOT_FIELD {
        format!("[{index}]")
    } else {
        format!("{parent}[{index}]")
    }
}

pub(crate) fn display_field(path: &str) -> &str {
    if path.is_empty() {
        ROOT_FIELD
    } else {
        path
    }
}
