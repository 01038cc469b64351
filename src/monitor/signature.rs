//! Argument redaction and structural query signatures
//!
//! Signatures describe the *shape* of a call (which keys and clause kinds are
//! present) and never include literal values, so grouping by them neither
//! leaks PII nor splits identical queries that differ only by parameters.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Replacement for deny-listed argument values
pub const REDACTED: &str = "[REDACTED]";

/// Field name fragments whose values are never recorded (case-insensitive)
const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "passwd",
    "token",
    "secret",
    "apikey",
    "api_key",
    "authorization",
    "cookie",
    "creditcard",
    "ssn",
];

/// Clause kinds tracked in the structural signature, in display order
const CLAUSES: &[&str] = &["where", "include", "select", "orderBy"];

/// Check whether a field name is on the deny-list
pub fn is_sensitive_field(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    SENSITIVE_FIELDS.iter().any(|field| lowered.contains(field))
}

/// Copy of `args` with every deny-listed field replaced by [`REDACTED`]
pub fn redact_args(args: &Value) -> Value {
    match args {
        Value::Object(map) => {
            let redacted: Map<String, Value> = map
                .iter()
                .map(|(key, value)| {
                    if is_sensitive_field(key) {
                        (key.clone(), Value::String(REDACTED.to_string()))
                    } else {
                        (key.clone(), redact_args(value))
                    }
                })
                .collect();
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_args).collect()),
        other => other.clone(),
    }
}

/// Shape of a JSON value: keys kept, leaves replaced by type tags
///
/// Arrays collapse to the shape of their first element so that `IN`-style
/// lists of different lengths share a shape.
pub fn value_shape(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Number(_) => "num".to_string(),
        Value::String(_) => "str".to_string(),
        Value::Array(items) => match items.first() {
            Some(first) => format!("[{}]", value_shape(first)),
            None => "[]".to_string(),
        },
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|key| format!("{}:{}", key, value_shape(&map[key])))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
    }
}

/// Stable 16-hex-char hash of `model.action` plus the argument shape
pub fn query_hash(model: &str, action: &str, args: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update(b".");
    hasher.update(action.as_bytes());
    hasher.update(b":");
    hasher.update(value_shape(args).as_bytes());
    let digest = hasher.finalize();
    hex_encode(&digest[..8])
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Clause kinds present at the top level of the arguments
pub fn clause_kinds(args: &Value) -> Vec<&'static str> {
    let Some(map) = args.as_object() else {
        return Vec::new();
    };

    CLAUSES
        .iter()
        .copied()
        .filter(|clause| map.contains_key(*clause))
        .collect()
}

/// Grouping key: `Model.action[clause,...]`
pub fn structural_signature(model: &str, action: &str, args: &Value) -> String {
    let clauses = clause_kinds(args);
    if clauses.is_empty() {
        format!("{}.{}", model, action)
    } else {
        format!("{}.{}[{}]", model, action, clauses.join(","))
    }
}
