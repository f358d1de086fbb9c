//! Request parameters and cache key normalization

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::error::Error;

/// A scalar that can be sent as a query parameter.
///
/// `None` becomes null, which stays in the cache key but is left off the
/// query string.
pub trait ParamValue {
    fn into_param(self) -> Value;
}

macro_rules! param_value_via_json {
    ($($ty:ty),*) => {
        $(impl ParamValue for $ty {
            fn into_param(self) -> Value {
                Value::from(self)
            }
        })*
    };
}

param_value_via_json!(&str, String, bool, i32, i64, u32, u64, usize, f64, Number);

impl<T: ParamValue> ParamValue for Option<T> {
    fn into_param(self) -> Value {
        self.map_or(Value::Null, ParamValue::into_param)
    }
}

/// Query parameters of an upstream request.
///
/// Backed by an ordered map, so two parameter sets built in different orders
/// compare, serialize, and fingerprint identically. Values are scalars only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, Value>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl ParamValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl ParamValue) {
        self.0.insert(name.into(), value.into_param());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Pairs to put on the query string. Null values are dropped; strings are
    /// sent verbatim and other scalars in their JSON form.
    pub fn query_pairs(&self) -> Vec<(&str, String)> {
        self.0
            .iter()
            .filter_map(|(name, value)| {
                let rendered = match value {
                    Value::Null => return None,
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((name.as_str(), rendered))
            })
            .collect()
    }
}

impl<K: Into<String>, V: ParamValue> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into_param()))
                .collect(),
        )
    }
}

/// Build from untyped JSON, rejecting arrays and objects.
impl TryFrom<Vec<(String, Value)>> for Params {
    type Error = Error;

    fn try_from(pairs: Vec<(String, Value)>) -> Result<Self, Self::Error> {
        let mut params = BTreeMap::new();
        for (name, value) in pairs {
            if value.is_array() || value.is_object() {
                return Err(Error::InvalidParam(name));
            }
            params.insert(name, value);
        }
        Ok(Self(params))
    }
}

/// Renders the parameters as a compact JSON object with sorted keys.
impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let object: Map<String, Value> = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        write!(f, "{}", Value::Object(object))
    }
}

/// Generate a deterministic cache key from endpoint and parameters.
///
/// The key stays human readable (`/agents::{"limit":500}`) so that entries for
/// one upstream resource can be dropped by substring.
pub fn cache_key(endpoint: &str, params: &Params) -> String {
    format!("{}::{}", endpoint, params)
}
