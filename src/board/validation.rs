//! Task shape validation.
//!
//! Validation is a strategy picked when the store is built: [`NoopValidator`]
//! when no schema is configured (or it cannot be loaded), [`SchemaValidator`]
//! otherwise. The schema validator understands the subset of JSON Schema a
//! task document needs: `type`, `required`, `properties`,
//! `additionalProperties`, `enum`, `const`, `items`, `minLength`, `maxLength`,
//! `pattern`, `minimum`, `maximum` and `format: date-time`.

use crate::error::{BoardError, Result};
use regex_lite::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Task schema shipped with the crate.
pub const BUNDLED_TASK_SCHEMA: &str = include_str!("../../schemas/task.schema.json");

pub trait TaskValidator: Send + Sync {
    /// Check a task document before it is persisted.
    fn validate(&self, task: &Value) -> Result<()>;

    /// Whether this validator checks anything at all.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Accepts every task. Used when no schema is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopValidator;

impl TaskValidator for NoopValidator {
    fn validate(&self, _task: &Value) -> Result<()> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Validates tasks against a JSON Schema document.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    schema: Value,
    /// Compiled `pattern` keywords, keyed by source.
    patterns: HashMap<String, Regex>,
}

impl SchemaValidator {
    pub fn new(schema: Value) -> std::result::Result<Self, String> {
        if !schema.is_object() {
            return Err("schema root must be an object".to_string());
        }
        let mut patterns = HashMap::new();
        collect_patterns(&schema, &mut patterns)?;
        Ok(Self { schema, patterns })
    }

    /// Parse a schema from a JSON string.
    pub fn from_json(text: &str) -> std::result::Result<Self, String> {
        let schema: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
        Self::new(schema)
    }

    pub fn from_file(path: &Path) -> std::result::Result<Self, String> {
        let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        Self::from_json(&text)
    }

    /// The schema bundled with the crate.
    pub fn bundled() -> std::result::Result<Self, String> {
        Self::from_json(BUNDLED_TASK_SCHEMA)
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Every violation found, as `path: message` strings.
    pub fn violations(&self, instance: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        self.check(&self.schema, instance, "", &mut errors);
        errors
    }

    fn check(&self, schema: &Value, instance: &Value, path: &str, errors: &mut Vec<String>) {
        let Some(schema) = schema.as_object() else {
            return;
        };
        let at = if path.is_empty() { "task" } else { path };

        if let Some(expected) = schema.get("type")
            && !type_matches(expected, instance)
        {
            errors.push(format!(
                "{}: expected {}, found {}",
                at,
                describe_type(expected),
                json_type_name(instance)
            ));
            return;
        }

        if let Some(allowed) = schema.get("enum").and_then(Value::as_array)
            && !allowed.contains(instance)
        {
            let options: Vec<String> = allowed.iter().map(render_scalar).collect();
            errors.push(format!(
                "{}: {} is not one of [{}]",
                at,
                render_scalar(instance),
                options.join(", ")
            ));
        }

        if let Some(expected) = schema.get("const")
            && expected != instance
        {
            errors.push(format!("{}: must equal {}", at, render_scalar(expected)));
        }

        match instance {
            Value::Object(map) => self.check_object(schema, map, path, errors),
            Value::Array(items) => {
                if let Some(item_schema) = schema.get("items") {
                    for (i, item) in items.iter().enumerate() {
                        self.check(item_schema, item, &format!("{}/{}", path, i), errors);
                    }
                }
            }
            Value::String(s) => self.check_string(schema, s, at, errors),
            Value::Number(n) => {
                if let Some(value) = n.as_f64() {
                    if let Some(min) = schema.get("minimum").and_then(Value::as_f64)
                        && value < min
                    {
                        errors.push(format!("{}: {} is below minimum {}", at, value, min));
                    }
                    if let Some(max) = schema.get("maximum").and_then(Value::as_f64)
                        && value > max
                    {
                        errors.push(format!("{}: {} is above maximum {}", at, value, max));
                    }
                }
            }
            _ => {}
        }
    }

    fn check_object(
        &self,
        schema: &Map<String, Value>,
        map: &Map<String, Value>,
        path: &str,
        errors: &mut Vec<String>,
    ) {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for field in required.iter().filter_map(Value::as_str) {
                if !map.contains_key(field) {
                    errors.push(format!("missing required field '{}{}'", path_prefix(path), field));
                }
            }
        }

        let properties = schema.get("properties").and_then(Value::as_object);
        for (key, value) in map {
            let child = format!("{}/{}", path, key);
            match properties.and_then(|p| p.get(key)) {
                Some(prop_schema) => self.check(prop_schema, value, &child, errors),
                None => match schema.get("additionalProperties") {
                    Some(Value::Bool(false)) => {
                        errors.push(format!("{}: unexpected field", child));
                    }
                    Some(extra_schema @ Value::Object(_)) => {
                        self.check(extra_schema, value, &child, errors)
                    }
                    _ => {}
                },
            }
        }
    }

    fn check_string(
        &self,
        schema: &Map<String, Value>,
        s: &str,
        at: &str,
        errors: &mut Vec<String>,
    ) {
        let len = s.chars().count() as u64;
        if let Some(min) = schema.get("minLength").and_then(Value::as_u64)
            && len < min
        {
            errors.push(format!("{}: shorter than {} characters", at, min));
        }
        if let Some(max) = schema.get("maxLength").and_then(Value::as_u64)
            && len > max
        {
            errors.push(format!("{}: longer than {} characters", at, max));
        }
        if let Some(pattern) = schema.get("pattern").and_then(Value::as_str)
            && let Some(re) = self.patterns.get(pattern)
            && !re.is_match(s)
        {
            errors.push(format!("{}: does not match pattern {}", at, pattern));
        }
        if schema.get("format").and_then(Value::as_str) == Some("date-time")
            && chrono::DateTime::parse_from_rfc3339(s).is_err()
        {
            errors.push(format!("{}: '{}' is not an RFC 3339 date-time", at, s));
        }
    }
}

impl TaskValidator for SchemaValidator {
    fn validate(&self, task: &Value) -> Result<()> {
        let errors = self.violations(task);
        if errors.is_empty() {
            return Ok(());
        }
        let task_id = task
            .get("task_id")
            .and_then(Value::as_str)
            .unwrap_or("<no task_id>");
        Err(BoardError::invalid(task_id, errors.join("; ")))
    }
}

/// Pick a validator for an optional schema path.
///
/// An unreadable or invalid schema disables validation with a single warning
/// rather than failing startup.
pub fn validator_for(schema_path: Option<&Path>) -> Arc<dyn TaskValidator> {
    let Some(path) = schema_path else {
        info!("No task schema configured; validation disabled");
        return Arc::new(NoopValidator);
    };
    match SchemaValidator::from_file(path) {
        Ok(validator) => {
            info!(schema = %path.display(), "Task schema validation enabled");
            Arc::new(validator)
        }
        Err(e) => {
            warn!(
                schema = %path.display(),
                error = %e,
                "Task schema unavailable; validation disabled"
            );
            Arc::new(NoopValidator)
        }
    }
}

fn collect_patterns(schema: &Value, out: &mut HashMap<String, Regex>) -> std::result::Result<(), String> {
    match schema {
        Value::Object(map) => {
            if let Some(pattern) = map.get("pattern").and_then(Value::as_str)
                && !out.contains_key(pattern)
            {
                let re = Regex::new(pattern)
                    .map_err(|e| format!("invalid pattern '{}': {}", pattern, e))?;
                out.insert(pattern.to_string(), re);
            }
            for value in map.values() {
                collect_patterns(value, out)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_patterns(item, out)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn path_prefix(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!("{}/", path.trim_start_matches('/'))
    }
}

fn type_matches(expected: &Value, instance: &Value) -> bool {
    match expected {
        Value::String(name) => single_type_matches(name, instance),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| single_type_matches(name, instance)),
        _ => true,
    }
}

fn single_type_matches(name: &str, instance: &Value) -> bool {
    match name {
        "object" => instance.is_object(),
        "array" => instance.is_array(),
        "string" => instance.is_string(),
        "number" => instance.is_number(),
        "integer" => instance.is_i64() || instance.is_u64(),
        "boolean" => instance.is_boolean(),
        "null" => instance.is_null(),
        _ => true,
    }
}

fn describe_type(expected: &Value) -> String {
    match expected {
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
        other => other.as_str().unwrap_or("?").to_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
