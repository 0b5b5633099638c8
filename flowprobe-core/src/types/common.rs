use std::collections::BTreeMap;

pub type AnyValue = serde_json::Value;

/// Header names as written in the flow; lookups are case-insensitive at the point of use.
pub type Headers = BTreeMap<String, String>;
