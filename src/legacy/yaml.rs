//! Lookups over loosely typed YAML sections.
//!
//! The old files were written by a config library that stored numbers as
//! numbers or strings interchangeably and sometimes left integer-looking
//! keys unquoted, so every accessor here accepts both.

use std::path::Path;
use std::time::Instant;

use serde_yml::{Mapping, Value};
use tracing::{debug, info};

use crate::error::LegacyError;

/// Loads above this duration get an info note
const SLOW_LOAD_MS: u128 = 15_000;

/// Parse a YAML file. `None` when the file does not exist.
pub fn read_file(path: &Path) -> Result<Option<Value>, LegacyError> {
    if !path.exists() {
        return Ok(None);
    }

    let start = Instant::now();
    let content = std::fs::read_to_string(path)?;
    let value: Value = if content.trim().is_empty() {
        Value::Mapping(Mapping::new())
    } else {
        serde_yml::from_str(&content)?
    };

    let elapsed = start.elapsed().as_millis();
    if elapsed > SLOW_LOAD_MS {
        info!(
            "Loading {:?} took {:.1}s, large barrel inventories slow this down",
            path,
            elapsed as f64 / 1000.0
        );
    } else {
        debug!("Loading {:?}: {}ms", path, elapsed);
    }
    Ok(Some(value))
}

/// Key as text, whatever scalar type the writer used
pub fn key_string(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Entries of a mapping with their keys as text
pub fn entries(map: &Mapping) -> impl Iterator<Item = (String, &Value)> {
    map.iter()
        .filter_map(|(key, value)| key_string(key).map(|key| (key, value)))
}

pub fn field<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| key_string(k).as_deref() == Some(key))
        .map(|(_, v)| v)
}

/// Walk a dotted path of nested mappings
pub fn section<'a>(map: &'a Mapping, path: &str) -> Option<&'a Mapping> {
    path.split('.')
        .try_fold(map, |current, key| field(current, key)?.as_mapping())
}

pub fn root(value: &Value) -> Option<&Mapping> {
    value.as_mapping()
}

pub fn get_str<'a>(map: &'a Mapping, key: &str) -> Option<&'a str> {
    field(map, key)?.as_str()
}

/// Scalar as text, numbers included
pub fn get_text(map: &Mapping, key: &str) -> Option<String> {
    field(map, key).and_then(key_string)
}

pub fn get_i64(map: &Mapping, key: &str) -> Option<i64> {
    let value = field(map, key)?;
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn get_i32(map: &Mapping, key: &str) -> Option<i32> {
    get_i64(map, key).map(|v| v as i32)
}

pub fn get_f64(map: &Mapping, key: &str) -> Option<f64> {
    let value = field(map, key)?;
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn get_bool(map: &Mapping, key: &str) -> Option<bool> {
    let value = field(map, key)?;
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// List of integers. Entries that are not integers are dropped.
pub fn get_i64_list(map: &Mapping, key: &str) -> Vec<i64> {
    field(map, key)
        .and_then(Value::as_sequence)
        .map(|seq| seq.iter().filter_map(value_i64).collect())
        .unwrap_or_default()
}

pub fn get_i32_list(map: &Mapping, key: &str) -> Vec<i32> {
    get_i64_list(map, key).into_iter().map(|v| v as i32).collect()
}

/// Integer that falls back to 0 when unreadable
pub fn parse_int_or_zero(text: &str) -> i32 {
    text.trim().parse().unwrap_or(0)
}
