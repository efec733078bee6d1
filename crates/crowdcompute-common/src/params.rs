//! Typed rendering of the plugin parameter bag.
//!
//! The original prototype carries `params` as an untyped `Dict[str, Any]`
//! (see `core/common/schema.py`). A Rust-native plugin contract still needs a
//! dynamic bag — plugins coerce and validate their own fields — but it should
//! not be `serde_json::Value` everywhere, since most of the engine never
//! needs to look inside it. `ParamValue` covers the scalar shapes the
//! reference plugins and the HTTP form-field submission path actually use.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// A `BTreeMap` rather than a `HashMap` so that params serialize in a
/// deterministic order — useful for the `/tasks` inspection endpoint and for
/// reproducible tests.
pub type ParamMap = BTreeMap<String, ParamValue>;

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            ParamValue::Float(f) => Some(*f as i64),
            ParamValue::String(s) => s.parse().ok(),
            ParamValue::Bool(_) => None,
        }
    }
}

/// Reads an integer-valued param, falling back to `default` when absent or
/// unparseable — mirrors the Python prototype's `params.get("num_chunks", 10)`.
pub fn param_usize(params: &ParamMap, key: &str, default: usize) -> usize {
    params
        .get(key)
        .and_then(ParamValue::as_i64)
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(default)
}

pub fn param_string(params: &ParamMap, key: &str) -> Option<String> {
    params.get(key).and_then(ParamValue::as_str).map(str::to_string)
}
