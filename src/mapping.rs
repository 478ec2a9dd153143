//! Conversion between structured payloads and domain models.
//!
//! [`Json`] is the intermediate representation every model converts through.
//! Models implement [`RawEncodable`] to be sent and [`RawDecodable`] to be
//! received; serde-derived types can forward to [`to_raw_via_serde`] and
//! [`from_raw_via_serde`].

use crate::error::MappingError;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// Structured payload: a JSON object.
pub type Json = serde_json::Map<String, Value>;

/// Key under which top-level arrays are wrapped.
pub const ARRAY_KEY: &str = "_array";

/// A model that can be converted into a raw payload.
pub trait RawEncodable {
    fn to_raw(&self) -> Result<Json, MappingError>;
}

/// A model that can be built from a raw payload.
pub trait RawDecodable: Sized {
    fn from_raw(raw: Json) -> Result<Self, MappingError>;
}

/// Serialize any serde type that maps onto a JSON object.
pub fn to_raw_via_serde<T: Serialize + ?Sized>(value: &T) -> Result<Json, MappingError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(MappingError::NotAnObject),
    }
}

/// Deserialize a serde type from a raw payload.
pub fn from_raw_via_serde<T: DeserializeOwned>(raw: Json) -> Result<T, MappingError> {
    Ok(serde_json::from_value(Value::Object(raw))?)
}

/// Wrap a JSON value so it can travel as a payload.
///
/// Objects pass through, arrays go under [`ARRAY_KEY`], `null` becomes the
/// empty payload. Any other scalar is rejected.
pub fn wrap_value(value: Value) -> Result<Json, MappingError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Array(items) => {
            let mut map = Json::new();
            map.insert(ARRAY_KEY.to_string(), Value::Array(items));
            Ok(map)
        }
        Value::Null => Ok(Json::new()),
        _ => Err(MappingError::NotAnObject),
    }
}

impl<T: RawEncodable> RawEncodable for Vec<T> {
    fn to_raw(&self) -> Result<Json, MappingError> {
        let items = self
            .iter()
            .map(|item| item.to_raw().map(Value::Object))
            .collect::<Result<Vec<_>, _>>()?;
        let mut map = Json::new();
        map.insert(ARRAY_KEY.to_string(), Value::Array(items));
        Ok(map)
    }
}

impl<T: RawDecodable> RawDecodable for Vec<T> {
    /// An empty payload is an empty list. A non-empty payload must carry
    /// [`ARRAY_KEY`] holding an array of objects.
    fn from_raw(raw: Json) -> Result<Self, MappingError> {
        if raw.is_empty() {
            return Ok(Vec::new());
        }

        let items = match raw.get(ARRAY_KEY) {
            Some(Value::Array(items)) => items.clone(),
            _ => return Err(MappingError::CantFindKeyInRaw(raw)),
        };

        items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => T::from_raw(map),
                _ => Err(MappingError::NotAnObject),
            })
            .collect()
    }
}

impl RawEncodable for Json {
    fn to_raw(&self) -> Result<Json, MappingError> {
        Ok(self.clone())
    }
}

impl RawDecodable for Json {
    fn from_raw(raw: Json) -> Result<Self, MappingError> {
        Ok(raw)
    }
}

/// No payload. Encodes to `{}` and accepts any payload.
impl RawEncodable for () {
    fn to_raw(&self) -> Result<Json, MappingError> {
        Ok(Json::new())
    }
}

impl RawDecodable for () {
    fn from_raw(_raw: Json) -> Result<Self, MappingError> {
        Ok(())
    }
}
