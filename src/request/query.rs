//! URL query encoding.
//!
//! Flattens a [`Json`] payload into `name=value` pairs. Nested structure is
//! expressed through key names, with pluggable strategies for arrays,
//! dictionaries and booleans:
//!
//! | value                    | default rendering          |
//! |--------------------------|----------------------------|
//! | `{"ids": [1, 2]}`        | `ids[]=1&ids[]=2`          |
//! | `{"f": {"name": "x"}}`   | `f[name]=x`                |
//! | `{"on": true}`           | `on=1`                     |

use crate::mapping::Json;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// How booleans are written into the query.
pub trait BoolEncodingStrategy: Send + Sync {
    fn encode(&self, value: bool) -> String;
}

/// How the key of an array value is written.
pub trait ArrayKeyEncodingStrategy: Send + Sync {
    fn encode(&self, key: &str) -> String;
}

/// How the key of a nested dictionary entry is written.
pub trait DictKeyEncodingStrategy: Send + Sync {
    fn encode(&self, query_key: &str, dict_key: &str) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoolEncoding {
    /// `0` / `1`
    #[default]
    AsInt,
    /// `false` / `true`
    AsBool,
}

impl BoolEncodingStrategy for BoolEncoding {
    fn encode(&self, value: bool) -> String {
        match (self, value) {
            (BoolEncoding::AsInt, false) => "0".into(),
            (BoolEncoding::AsInt, true) => "1".into(),
            (BoolEncoding::AsBool, false) => "false".into(),
            (BoolEncoding::AsBool, true) => "true".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayKeyEncoding {
    /// `key[]`
    #[default]
    Brackets,
    /// `key`
    NoBrackets,
}

impl ArrayKeyEncodingStrategy for ArrayKeyEncoding {
    fn encode(&self, key: &str) -> String {
        match self {
            ArrayKeyEncoding::Brackets => format!("{key}[]"),
            ArrayKeyEncoding::NoBrackets => key.to_string(),
        }
    }
}

/// `parent[child]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DefaultDictKeyEncoding;

impl DictKeyEncodingStrategy for DefaultDictKeyEncoding {
    fn encode(&self, query_key: &str, dict_key: &str) -> String {
        format!("{query_key}[{dict_key}]")
    }
}

/// Static query parameters plus the strategies used to flatten them.
#[derive(Clone)]
pub struct QueryConfig {
    pub query: Json,
    pub bool_encoding: Arc<dyn BoolEncodingStrategy>,
    pub array_encoding: Arc<dyn ArrayKeyEncodingStrategy>,
    pub dict_encoding: Arc<dyn DictKeyEncodingStrategy>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self::new(Json::new())
    }
}

impl fmt::Debug for QueryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryConfig")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

impl QueryConfig {
    /// Config with the default strategies: `AsInt`, `Brackets`, `parent[child]`.
    pub fn new(query: Json) -> Self {
        Self {
            query,
            bool_encoding: Arc::new(BoolEncoding::default()),
            array_encoding: Arc::new(ArrayKeyEncoding::default()),
            dict_encoding: Arc::new(DefaultDictKeyEncoding),
        }
    }

    pub fn with_bool_encoding(mut self, strategy: impl BoolEncodingStrategy + 'static) -> Self {
        self.bool_encoding = Arc::new(strategy);
        self
    }

    pub fn with_array_encoding(
        mut self,
        strategy: impl ArrayKeyEncodingStrategy + 'static,
    ) -> Self {
        self.array_encoding = Arc::new(strategy);
        self
    }

    pub fn with_dict_encoding(mut self, strategy: impl DictKeyEncodingStrategy + 'static) -> Self {
        self.dict_encoding = Arc::new(strategy);
        self
    }

    /// Flatten one value under `key`.
    pub fn make_query_items(&self, value: &Value, key: &str) -> Vec<(String, String)> {
        match value {
            Value::Array(items) => {
                let key = self.array_encoding.encode(key);
                items
                    .iter()
                    .flat_map(|item| self.make_query_items(item, &key))
                    .collect()
            }
            Value::Object(map) => map
                .iter()
                .flat_map(|(dict_key, item)| {
                    let key = self.dict_encoding.encode(key, dict_key);
                    self.make_query_items(item, &key)
                })
                .collect(),
            Value::Bool(b) => vec![(key.to_string(), self.bool_encoding.encode(*b))],
            Value::String(s) => vec![(key.to_string(), s.clone())],
            Value::Number(n) => vec![(key.to_string(), n.to_string())],
            Value::Null => vec![(key.to_string(), String::new())],
        }
    }

    /// Flatten a whole payload. Pairs are sorted by name; values of the
    /// same name keep their order.
    pub fn encode(&self, payload: &Json) -> Vec<(String, String)> {
        let mut items: Vec<(String, String)> = payload
            .iter()
            .flat_map(|(key, value)| self.make_query_items(value, key))
            .collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));
        items
    }

    /// Flattened [`query`](Self::query).
    pub fn items(&self) -> Vec<(String, String)> {
        self.encode(&self.query)
    }

    /// Replace the URL's query with the configured parameters.
    ///
    /// No-op when no parameters are configured. Parameters that flatten to
    /// no items (empty arrays or dictionaries) leave the URL without a query.
    pub fn apply_to(&self, url: &mut Url) {
        if self.query.is_empty() {
            return;
        }
        let items = self.items();
        if items.is_empty() {
            url.set_query(None);
            return;
        }
        url.query_pairs_mut().clear().extend_pairs(items);
    }
}

/// Append `pairs` to the URL's existing query.
pub fn append_pairs(url: &mut Url, pairs: &[(String, String)]) {
    if pairs.is_empty() {
        return;
    }
    url.query_pairs_mut().extend_pairs(pairs);
}
