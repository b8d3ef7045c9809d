//! Turning a request value into a path, query string and body.

use crate::{ClientError, ClientResult};
use covenant_core::Contract;
use serde::Serialize;
use serde_json::{Map, Value};

/// A request laid out for the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRequest {
    /// Path with parameters substituted, plus `?query` when there is one.
    pub path_and_query: String,
    /// JSON body for methods that send one.
    pub body: Option<Value>,
}

/// Lays out `request` according to `contract`.
///
/// `:name` segments take the matching field, percent-encoded, and that field
/// is consumed. A segment whose field is absent or null stays as written.
/// Remaining fields become the query string (skipping nulls) for methods
/// without a body, or the JSON body otherwise. In the query, arrays and
/// objects are written as JSON text and an empty string stays present as
/// `name=`.
///
/// # Errors
///
/// Returns [`ClientError::Encode`] if the request does not serialize to a
/// JSON object.
pub fn render<Req: Serialize, Res>(
    contract: &Contract<Req, Res>,
    request: &Req,
) -> ClientResult<RenderedRequest> {
    let mut fields = match serde_json::to_value(request) {
        Ok(Value::Object(fields)) => fields,
        Ok(Value::Null) => Map::new(),
        Ok(other) => {
            return Err(ClientError::Encode(format!(
                "request must serialize to an object, got {}",
                kind(&other)
            )))
        }
        Err(e) => return Err(ClientError::Encode(e.to_string())),
    };

    let path = substitute_path(contract.path(), &mut fields, &contract.operation());

    if contract.has_body() {
        return Ok(RenderedRequest {
            path_and_query: path,
            body: Some(Value::Object(fields)),
        });
    }

    let pairs: Vec<(String, String)> = fields
        .into_iter()
        .filter_map(|(name, value)| to_text(&value).map(|text| (name, text)))
        .collect();
    let query =
        serde_urlencoded::to_string(&pairs).map_err(|e| ClientError::Encode(e.to_string()))?;

    let path_and_query = if query.is_empty() {
        path
    } else {
        format!("{path}?{query}")
    };

    Ok(RenderedRequest {
        path_and_query,
        body: None,
    })
}

fn substitute_path(template: &str, fields: &mut Map<String, Value>, operation: &str) -> String {
    template
        .split('/')
        .map(|segment| {
            let Some(name) = segment.strip_prefix(':') else {
                return segment.to_string();
            };
            match fields.remove(name).as_ref().and_then(to_text) {
                Some(text) => urlencoding::encode(&text).into_owned(),
                None => {
                    tracing::warn!(
                        operation,
                        param = name,
                        "path parameter missing from request, leaving segment as written"
                    );
                    segment.to_string()
                }
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Textual form of a field; `None` for null.
fn to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
