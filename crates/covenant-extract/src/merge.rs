//! Request merging.
//!
//! A Covenant handler receives one request value, regardless of where its
//! fields travelled. [`MergedRequest`] collects those fields from the raw
//! request parts according to the HTTP method:
//!
//! | Method | Sources (later wins) |
//! |--------|----------------------|
//! | `GET`, `DELETE` | query string, path parameters |
//! | `POST`, `PUT`, `PATCH` | JSON body, path parameters |
//!
//! A body that is empty, is not valid JSON, or is not a JSON object is
//! treated as `{}`.
//!
//! Path and query values arrive as text. They are held as [`FieldValue::Text`]
//! and coerced on demand while deserializing, so `"7"` becomes a `u64`,
//! `"true"` a `bool`, and so on. Sequences, maps and structs travel as JSON
//! text (`tags=["a","b"]`), which is how the client renders them. An absent
//! field is `None`; a present but empty one is `Some("")`. Body values keep
//! their JSON types.
//!
//! # Example
//!
//! ```rust
//! use covenant_core::Validate;
//! use covenant_extract::merge;
//! use http::Method;
//! use serde::{Deserialize, Serialize};
//! use std::collections::HashMap;
//!
//! #[derive(Serialize, Deserialize)]
//! struct GetUser {
//!     id: u64,
//!     verbose: Option<bool>,
//! }
//!
//! impl Validate for GetUser {}
//!
//! let params = HashMap::from([("id".to_string(), "7".to_string())]);
//! let request: GetUser = merge(&Method::GET, &params, Some("verbose=true"), b"").unwrap();
//! assert_eq!(request.id, 7);
//! assert_eq!(request.verbose, Some(true));
//! ```

use crate::{ExtractionError, ExtractionSource};
use covenant_core::contract::method_has_body;
use covenant_core::RequestShape;
use http::Method;
use serde::de::value::{MapDeserializer, StringDeserializer};
use serde::de::{self, Deserializer as _, IntoDeserializer, Unexpected, Visitor};
use serde::{forward_to_deserialize_any, Deserialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// One merged request field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A value taken from the JSON body.
    Json(Value),
    /// A value taken from the path or query string.
    Text(String),
}

impl FieldValue {
    /// Returns the value as JSON, rendering text as a JSON string.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Json(value) => value.clone(),
            Self::Text(text) => Value::String(text.clone()),
        }
    }
}

/// The fields of a request, merged from path, query and body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedRequest {
    fields: BTreeMap<String, FieldValue>,
}

impl MergedRequest {
    /// Merges raw request parts according to `method`.
    ///
    /// Fails only if the query string cannot be parsed; body problems fall
    /// back to an empty object.
    pub fn from_parts(
        method: &Method,
        path_params: &HashMap<String, String>,
        query: Option<&str>,
        body: &[u8],
    ) -> Result<Self, ExtractionError> {
        let mut fields = BTreeMap::new();

        if method_has_body(method) {
            for (name, value) in parse_body(body) {
                fields.insert(name, FieldValue::Json(value));
            }
        } else if let Some(query) = query.filter(|q| !q.is_empty()) {
            let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
                .map_err(|e| ExtractionError::malformed(ExtractionSource::Query, e.to_string()))?;
            for (name, value) in pairs {
                fields.insert(name, FieldValue::Text(value));
            }
        }

        for (name, value) in path_params {
            fields.insert(name.clone(), FieldValue::Text(value.clone()));
        }

        Ok(Self { fields })
    }

    /// Returns a merged field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Returns the number of merged fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if nothing was merged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Renders the merged fields as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }

    /// Deserializes the fields into `Req` and runs its validation.
    pub fn into_request<Req: RequestShape>(self) -> Result<Req, ExtractionError> {
        let deserializer =
            MapDeserializer::<_, serde_json::Error>::new(self.fields.into_iter());
        let request = Req::deserialize(deserializer).map_err(|e| ExtractionError::Deserialize {
            message: e.to_string(),
        })?;

        request
            .validate()
            .map_err(|issues| ExtractionError::Validation { issues })?;
        Ok(request)
    }
}

/// Merges raw request parts and produces a validated `Req`.
pub fn merge<Req: RequestShape>(
    method: &Method,
    path_params: &HashMap<String, String>,
    query: Option<&str>,
    body: &[u8],
) -> Result<Req, ExtractionError> {
    MergedRequest::from_parts(method, path_params, query, body)?.into_request()
}

fn parse_body(body: &[u8]) -> serde_json::Map<String, Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return serde_json::Map::new();
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            tracing::debug!(kind = json_kind(&other), "non-object body treated as empty");
            serde_json::Map::new()
        }
        Err(e) => {
            tracing::debug!(error = %e, "unparseable body treated as empty");
            serde_json::Map::new()
        }
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl<'de> IntoDeserializer<'de, serde_json::Error> for FieldValue {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self::Deserializer {
        self
    }
}

/// Parses text as JSON when it holds the expected kind of value; hands the
/// text back otherwise so the caller can report it as-is.
fn structured(text: String, expected: fn(&Value) -> bool) -> Result<Value, String> {
    match serde_json::from_str::<Value>(&text) {
        Ok(value) if expected(&value) => Ok(value),
        _ => Err(text),
    }
}

macro_rules! deserialize_parsed {
    ($($method:ident => $visit:ident: $ty:ty),* $(,)?) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
            match self {
                Self::Json(value) => value.$method(visitor),
                Self::Text(text) => match text.parse::<$ty>() {
                    Ok(parsed) => visitor.$visit(parsed),
                    Err(_) => Err(de::Error::invalid_value(Unexpected::Str(&text), &visitor)),
                },
            }
        }
    )*};
}

macro_rules! deserialize_forwarded {
    ($($method:ident),* $(,)?) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
            match self {
                Self::Json(value) => value.$method(visitor),
                Self::Text(text) => visitor.visit_string(text),
            }
        }
    )*};
}

impl<'de> de::Deserializer<'de> for FieldValue {
    type Error = serde_json::Error;

    deserialize_parsed! {
        deserialize_bool => visit_bool: bool,
        deserialize_i8 => visit_i8: i8,
        deserialize_i16 => visit_i16: i16,
        deserialize_i32 => visit_i32: i32,
        deserialize_i64 => visit_i64: i64,
        deserialize_u8 => visit_u8: u8,
        deserialize_u16 => visit_u16: u16,
        deserialize_u32 => visit_u32: u32,
        deserialize_u64 => visit_u64: u64,
        deserialize_f32 => visit_f32: f32,
        deserialize_f64 => visit_f64: f64,
    }

    deserialize_forwarded! {
        deserialize_any,
        deserialize_char,
        deserialize_str,
        deserialize_string,
        deserialize_bytes,
        deserialize_byte_buf,
        deserialize_unit,
        deserialize_identifier,
        deserialize_ignored_any,
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self {
            Self::Json(value) => value.deserialize_option(visitor),
            text @ Self::Text(_) => visitor.visit_some(text),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self {
            Self::Json(value) => value.deserialize_enum(name, variants, visitor),
            Self::Text(text) => match structured(text, Value::is_object) {
                Ok(value) => value.deserialize_enum(name, variants, visitor),
                Err(text) => visitor.visit_enum(StringDeserializer::<serde_json::Error>::new(text)),
            },
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self {
            Self::Json(value) => value.deserialize_newtype_struct(name, visitor),
            text @ Self::Text(_) => visitor.visit_newtype_struct(text),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self {
            Self::Json(value) => value.deserialize_unit_struct(name, visitor),
            Self::Text(text) => visitor.visit_string(text),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self {
            Self::Json(value) => value.deserialize_tuple(len, visitor),
            Self::Text(text) => match structured(text, Value::is_array) {
                Ok(value) => value.deserialize_tuple(len, visitor),
                Err(text) => visitor.visit_string(text),
            },
        }
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self {
            Self::Json(value) => value.deserialize_tuple_struct(name, len, visitor),
            Self::Text(text) => match structured(text, Value::is_array) {
                Ok(value) => value.deserialize_tuple_struct(name, len, visitor),
                Err(text) => visitor.visit_string(text),
            },
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self {
            Self::Json(value) => value.deserialize_struct(name, fields, visitor),
            Self::Text(text) => match structured(text, Value::is_object) {
                Ok(value) => value.deserialize_struct(name, fields, visitor),
                Err(text) => visitor.visit_string(text),
            },
        }
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self {
            Self::Json(value) => value.deserialize_seq(visitor),
            Self::Text(text) => match structured(text, Value::is_array) {
                Ok(value) => value.deserialize_seq(visitor),
                Err(text) => visitor.visit_string(text),
            },
        }
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self {
            Self::Json(value) => value.deserialize_map(visitor),
            Self::Text(text) => match structured(text, Value::is_object) {
                Ok(value) => value.deserialize_map(visitor),
                Err(text) => visitor.visit_string(text),
            },
        }
    }

    forward_to_deserialize_any! { i128 u128 }
}
