use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use regex::Regex;
use serde_json::{Map, Value as JsonValue};

use crate::validate::context::{child_index, child_key, display_field, ValidationContext};
use crate::validate::issue::{rule_names, IssueCategory, ValidationIssue};
use crate::validate::ResponseValidator;

/// Keywords that hold a single subschema whose custom keywords are stripped but not evaluated.
const OPAQUE_SCHEMA_KEYWORDS: &[&str] = &["not", "if", "then", "else", "propertyNames", "contains"];
/// Keywords that hold a list of subschemas, stripped but not evaluated.
const OPAQUE_SCHEMA_LISTS: &[&str] = &["anyOf", "oneOf"];
/// Keywords that hold a map of subschemas, stripped but not evaluated.
const OPAQUE_SCHEMA_MAPS: &[&str] = &["$defs", "definitions", "patternProperties", "dependentSchemas"];

/// JSON Schema validation with three extra keywords.
///
/// - `notNull: true` rejects `null`.
/// - `contains: "<text>"` requires a string value to contain `<text>`. A schema-valued
///   `contains` keeps its standard array meaning.
/// - `regex: "<pattern>"` requires a string value to match `<pattern>`.
///
/// The extra keywords are read from the root schema and through `properties`, `items`,
/// `prefixItems`, `additionalProperties` and `allOf`. Everything else goes to
/// `jsonschema`. Local `$ref`s (`#/$defs/...`, `#/definitions/...`) are followed when
/// collecting them; a reference cycle is followed once. Standard `format` assertions are
/// enforced.
///
/// Compiled schemas are cached by name. A cached entry is reused only while the registry
/// still holds an identical schema under that name.
#[derive(Default)]
pub struct SchemaValidator {
    cache: Mutex<HashMap<String, CacheEntry>>,
}

struct CacheEntry {
    source: JsonValue,
    compiled: Arc<CompiledSchema>,
}

struct CompiledSchema {
    standard: jsonschema::Validator,
    custom: CustomNode,
}

#[derive(Debug, Default)]
struct CustomNode {
    assertions: Vec<CustomAssertion>,
    properties: BTreeMap<String, CustomNode>,
    items: Option<Box<CustomNode>>,
    prefix_items: Vec<CustomNode>,
    additional: Option<Box<CustomNode>>,
}

impl CustomNode {
    fn is_empty(&self) -> bool {
        self.assertions.is_empty()
            && self.properties.values().all(CustomNode::is_empty)
            && self.items.as_ref().map_or(true, |n| n.is_empty())
            && self.prefix_items.iter().all(CustomNode::is_empty)
            && self.additional.as_ref().map_or(true, |n| n.is_empty())
    }
}

#[derive(Debug)]
enum CustomAssertion {
    NotNull,
    Contains(String),
    Regex(Regex),
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    pub fn cached_len(&self) -> usize {
        self.lock_cache().len()
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn compiled(&self, name: &str, schema: &JsonValue) -> Result<Arc<CompiledSchema>, String> {
        if let Some(hit) = self.lock_cache().get(name) {
            if hit.source == *schema {
                return Ok(hit.compiled.clone());
            }
        }
        let compiled = Arc::new(compile(schema)?);
        tracing::debug!(schema = name, "compiled response schema");
        self.lock_cache().insert(
            name.to_string(),
            CacheEntry {
                source: schema.clone(),
                compiled: compiled.clone(),
            },
        );
        Ok(compiled)
    }
}

impl ResponseValidator for SchemaValidator {
    fn category(&self) -> IssueCategory {
        IssueCategory::Schema
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<ValidationIssue> {
        let Some(name) = ctx.expectations.schema.as_deref() else {
            return Vec::new();
        };
        let Some(schema) = ctx.schemas.get(name) else {
            return vec![ValidationIssue::error(
                IssueCategory::Schema,
                rule_names::SCHEMA_NOT_FOUND,
                format!("schema `{name}` is not registered"),
            )];
        };
        let compiled = match self.compiled(name, schema) {
            Ok(c) => c,
            Err(e) => {
                return vec![ValidationIssue::error(
                    IssueCategory::Schema,
                    rule_names::SCHEMA_COMPILE_FAILURE,
                    format!("schema `{name}` failed to compile: {e}"),
                )];
            }
        };
        let Some(body) = &ctx.body_json else {
            return vec![ValidationIssue::error(
                IssueCategory::Schema,
                rule_names::SCHEMA_BODY_NOT_JSON,
                format!("response body is not JSON; cannot validate against schema `{name}`"),
            )];
        };

        let mut issues: Vec<ValidationIssue> = compiled
            .standard
            .iter_errors(body)
            .map(|e| {
                ValidationIssue::error(
                    IssueCategory::Schema,
                    rule_names::SCHEMA_VIOLATION,
                    e.to_string(),
                )
            })
            .collect();
        evaluate(&compiled.custom, body, "", &mut issues);
        issues
    }
}

fn compile(schema: &JsonValue) -> Result<CompiledSchema, String> {
    let mut custom = CustomNode::default();
    let mut splitter = Splitter {
        root: schema,
        resolving: vec!["#".to_string()],
    };
    let standard_schema = splitter.split(schema, &mut custom)?;
    let standard = jsonschema::options()
        .should_validate_formats(true)
        .build(&standard_schema)
        .map_err(|e| e.to_string())?;
    Ok(CompiledSchema { standard, custom })
}

struct Splitter<'a> {
    root: &'a JsonValue,
    /// Local references currently being followed.
    resolving: Vec<String>,
}

impl Splitter<'_> {
    /// Moves custom keywords out of `schema` into `node` and returns the standard remainder.
    fn split(&mut self, schema: &JsonValue, node: &mut CustomNode) -> Result<JsonValue, String> {
        let JsonValue::Object(map) = schema else {
            return Ok(schema.clone());
        };
        let mut out = Map::new();
        for (key, value) in map {
            match (key.as_str(), value) {
                ("notNull", JsonValue::Bool(flag)) => {
                    if *flag {
                        node.assertions.push(CustomAssertion::NotNull);
                    }
                }
                ("contains", JsonValue::String(needle)) => {
                    node.assertions.push(CustomAssertion::Contains(needle.clone()));
                }
                ("regex", JsonValue::String(pattern)) => {
                    let re = Regex::new(pattern).map_err(|e| format!("invalid regex `{pattern}`: {e}"))?;
                    node.assertions.push(CustomAssertion::Regex(re));
                }
                ("$ref", JsonValue::String(reference)) => {
                    self.follow_local_ref(reference, node)?;
                    out.insert(key.clone(), value.clone());
                }
                ("properties", JsonValue::Object(props)) => {
                    let mut cleaned = Map::new();
                    for (name, sub) in props {
                        let child = node.properties.entry(name.clone()).or_default();
                        cleaned.insert(name.clone(), self.split(sub, child)?);
                    }
                    out.insert(key.clone(), JsonValue::Object(cleaned));
                }
                ("items", JsonValue::Object(_)) => {
                    let child = node.items.get_or_insert_with(Box::default);
                    out.insert(key.clone(), self.split(value, child)?);
                }
                ("items", JsonValue::Array(list)) | ("prefixItems", JsonValue::Array(list)) => {
                    if node.prefix_items.len() < list.len() {
                        node.prefix_items.resize_with(list.len(), CustomNode::default);
                    }
                    let cleaned = list
                        .iter()
                        .zip(node.prefix_items.iter_mut())
                        .map(|(sub, child)| self.split(sub, child))
                        .collect::<Result<Vec<_>, _>>()?;
                    out.insert(key.clone(), JsonValue::Array(cleaned));
                }
                ("additionalProperties", JsonValue::Object(_)) => {
                    let child = node.additional.get_or_insert_with(Box::default);
                    out.insert(key.clone(), self.split(value, child)?);
                }
                ("allOf", JsonValue::Array(list)) => {
                    let cleaned = list
                        .iter()
                        .map(|sub| self.split(sub, node))
                        .collect::<Result<Vec<_>, _>>()?;
                    out.insert(key.clone(), JsonValue::Array(cleaned));
                }
                (k, JsonValue::Object(_)) if OPAQUE_SCHEMA_KEYWORDS.contains(&k) => {
                    out.insert(key.clone(), self.split(value, &mut CustomNode::default())?);
                }
                (k, JsonValue::Array(list)) if OPAQUE_SCHEMA_LISTS.contains(&k) => {
                    let cleaned = list
                        .iter()
                        .map(|sub| self.split(sub, &mut CustomNode::default()))
                        .collect::<Result<Vec<_>, _>>()?;
                    out.insert(key.clone(), JsonValue::Array(cleaned));
                }
                (k, JsonValue::Object(subs)) if OPAQUE_SCHEMA_MAPS.contains(&k) => {
                    let mut cleaned = Map::new();
                    for (name, sub) in subs {
                        cleaned.insert(name.clone(), self.split(sub, &mut CustomNode::default())?);
                    }
                    out.insert(key.clone(), JsonValue::Object(cleaned));
                }
                _ => {
                    out.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(JsonValue::Object(out))
    }

    /// Collects custom keywords from the target of a local `$ref` into `node`.
    fn follow_local_ref(&mut self, reference: &str, node: &mut CustomNode) -> Result<(), String> {
        let Some(pointer) = reference.strip_prefix('#') else {
            return Ok(());
        };
        if self.resolving.iter().any(|r| r == reference) {
            return Ok(());
        }
        let root = self.root;
        let Some(target) = root.pointer(pointer) else {
            return Err(format!("unresolvable reference `{reference}`"));
        };
        self.resolving.push(reference.to_string());
        let result = self.split(target, node).map(|_| ());
        self.resolving.pop();
        result
    }
}

fn evaluate(node: &CustomNode, value: &JsonValue, path: &str, issues: &mut Vec<ValidationIssue>) {
    if node.is_empty() {
        return;
    }
    for assertion in &node.assertions {
        match (assertion, value) {
            (CustomAssertion::NotNull, JsonValue::Null) => issues.push(
                ValidationIssue::error(
                    IssueCategory::Schema,
                    rule_names::SCHEMA_NOT_NULL,
                    format!("`{}` must not be null", display_field(path)),
                )
                .with_field(display_field(path)),
            ),
            (CustomAssertion::Contains(needle), JsonValue::String(s)) if !s.contains(needle.as_str()) => {
                issues.push(
                    ValidationIssue::error(
                        IssueCategory::Schema,
                        rule_names::SCHEMA_CONTAINS,
                        format!("`{}` must contain \"{needle}\"", display_field(path)),
                    )
                    .with_field(display_field(path))
                    .with_expected(JsonValue::String(needle.clone()))
                    .with_actual(value.clone()),
                )
            }
            (CustomAssertion::Regex(re), JsonValue::String(s)) if !re.is_match(s) => issues.push(
                ValidationIssue::error(
                    IssueCategory::Schema,
                    rule_names::SCHEMA_REGEX,
                    format!("`{}` must match /{}/", display_field(path), re.as_str()),
                )
                .with_field(display_field(path))
                .with_expected(JsonValue::String(re.as_str().to_string()))
                .with_actual(value.clone()),
            ),
            _ => {}
        }
    }

    match value {
        JsonValue::Object(map) => {
            for (name, child) in &node.properties {
                if let Some(v) = map.get(name) {
                    evaluate(child, v, &child_key(path, name), issues);
                }
            }
            if let Some(extra) = &node.additional {
                for (k, v) in map.iter().filter(|(k, _)| !node.properties.contains_key(*k)) {
                    evaluate(extra, v, &child_key(path, k), issues);
                }
            }
        }
        JsonValue::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                let child = node.prefix_items.get(i).or(node.items.as_deref());
                if let Some(child) = child {
                    evaluate(child, v, &child_index(path, i), issues);
                }
            }
        }
        _ => {}
    }
}
