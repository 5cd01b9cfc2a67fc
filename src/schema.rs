// src/schema.rs

//! Exact-shape validation of inbound payloads.
//!
//! Every response body is checked against a JSON Schema before it is
//! deserialized. Records must carry exactly the listed fields with the listed
//! JSON types; a single mismatch rejects the whole payload and the error
//! carries every violation found.

use std::fmt;
use std::sync::LazyLock;

use jsonschema::error::ValidationErrorKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::models::{CsrfInfo, FailingObjectPage, Validator};

/// One mismatch between a payload and its schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaViolation {
    /// JSON path of the offending value (`$` is the document root)
    pub path: String,
    pub message: String,
}

impl SchemaViolation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Shape of one `validator-summary` record.
pub fn validator_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "integer" },
            "app_label": { "type": "string" },
            "model_name": { "type": "string" },
            "method_name": { "type": "string" },
            "description": { "type": "string" },
            "is_class_method": { "type": "boolean" },
            "last_run_time": { "type": ["string", "null"] },
            "status": { "type": "integer", "enum": [0, 1, 2, 3, 4] },
            "num_passing": { "type": ["integer", "null"], "minimum": 0 },
            "num_failing": { "type": ["integer", "null"], "minimum": 0 },
            "num_na": { "type": ["integer", "null"], "minimum": 0 },
            "num_allowed_to_fail": { "type": ["integer", "null"], "minimum": 0 },
            "exc_type": { "type": ["string", "null"] },
            "exc_traceback": { "type": ["string", "null"] },
            "exc_obj_pk": { "type": ["integer", "null"] }
        },
        "additionalProperties": false,
        "required": [
            "id", "app_label", "model_name", "method_name", "description",
            "is_class_method", "last_run_time", "status", "num_passing",
            "num_failing", "num_na", "num_allowed_to_fail", "exc_type",
            "exc_traceback", "exc_obj_pk"
        ]
    })
}

/// Shape of one `failing-objects` record.
pub fn failing_object_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "integer" },
            "validator": { "type": "integer" },
            "object_pk": { "type": "integer" },
            "comment": { "type": "string" },
            "allowed_to_fail": { "type": "boolean" },
            "allowed_to_fail_justification": { "type": "string" },
            "admin_page": { "type": "string" }
        },
        "additionalProperties": false,
        "required": [
            "id", "validator", "object_pk", "comment", "allowed_to_fail",
            "allowed_to_fail_justification", "admin_page"
        ]
    })
}

/// Envelope of a failing-objects page; pagination metadata such as `count`
/// and `previous` may accompany it.
pub fn failing_object_page_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "next": { "type": ["string", "null"] },
            "results": { "type": "array", "items": failing_object_schema() }
        },
        "additionalProperties": true,
        "required": ["next", "results"]
    })
}

pub fn csrf_info_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "csrf_header_name": { "type": "string" },
            "csrf_cookie_name": { "type": "string" }
        },
        "additionalProperties": false,
        "required": ["csrf_header_name", "csrf_cookie_name"]
    })
}

/// A compiled schema, or the reason it failed to compile.
type Compiled = std::result::Result<jsonschema::Validator, String>;

fn compile(schema: &Value) -> Compiled {
    jsonschema::options().build(schema).map_err(|e| e.to_string())
}

static VALIDATOR_LIST: LazyLock<Compiled> =
    LazyLock::new(|| compile(&json!({ "type": "array", "items": validator_schema() })));
static FAILING_OBJECT_PAGE: LazyLock<Compiled> =
    LazyLock::new(|| compile(&failing_object_page_schema()));
static CSRF_INFO: LazyLock<Compiled> = LazyLock::new(|| compile(&csrf_info_schema()));
static OBJECT_COUNT: LazyLock<Compiled> =
    LazyLock::new(|| compile(&json!({ "type": "integer", "minimum": 0 })));

/// Render a JSON pointer (`/results/0/valid`) as `$.results[0].valid`.
fn display_path(pointer: &str) -> String {
    let mut path = String::from("$");
    for segment in pointer.split('/').skip(1) {
        let segment = segment.replace("~1", "/").replace("~0", "~");
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            path.push_str(&format!("[{segment}]"));
        } else {
            path.push('.');
            path.push_str(&segment);
        }
    }
    path
}

/// Every violation of `value` against `schema`.
pub fn check(schema: &jsonschema::Validator, value: &Value) -> Vec<SchemaViolation> {
    let mut violations = Vec::new();
    for error in schema.iter_errors(value) {
        let path = display_path(&error.instance_path.to_string());
        match &error.kind {
            ValidationErrorKind::AdditionalProperties { unexpected } => {
                violations.extend(
                    unexpected
                        .iter()
                        .map(|key| SchemaViolation::new(format!("{path}.{key}"), "unexpected field")),
                );
            }
            _ => violations.push(SchemaViolation::new(path, error.to_string())),
        }
    }
    violations
}

fn decode<T: DeserializeOwned>(context: &str, schema: &Compiled, value: Value) -> Result<T> {
    let violations = match schema {
        Ok(schema) => check(schema, &value),
        Err(reason) => vec![SchemaViolation::new(
            "$",
            format!("schema does not compile: {reason}"),
        )],
    };
    if !violations.is_empty() {
        return Err(AppError::schema(context, violations));
    }
    Ok(serde_json::from_value(value)?)
}

/// Validate and decode the `validator-summary/` list.
pub fn decode_validators(value: Value) -> Result<Vec<Validator>> {
    decode("validator-summary", &VALIDATOR_LIST, value)
}

/// Validate and decode one `failing-objects/` page.
pub fn decode_failing_object_page(value: Value) -> Result<FailingObjectPage> {
    decode("failing-objects", &FAILING_OBJECT_PAGE, value)
}

/// Validate and decode the `meta/csrf/` answer.
pub fn decode_csrf_info(value: Value) -> Result<CsrfInfo> {
    decode("meta/csrf", &CSRF_INFO, value)
}

/// Validate and decode the `meta/object-counts/` answer (a bare integer).
pub fn decode_object_count(value: Value) -> Result<u64> {
    decode("meta/object-counts", &OBJECT_COUNT, value)
}
