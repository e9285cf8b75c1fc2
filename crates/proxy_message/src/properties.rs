use std::collections::BTreeMap;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Well-known property names shared by the layered message capabilities.
pub mod keys {
    pub const REQUEST_ID: &str = "RequestId";
    pub const ERROR: &str = "Error";
    pub const WORKFLOW_CONTEXT_ID: &str = "WorkflowContextId";
    pub const ACTIVITY_CONTEXT_ID: &str = "ActivityContextId";
}

/// String keyed property bag backing every message.
///
/// A key is either absent, present with a `null` value, or present with a
/// string value. All typed accessors are views over the string form so the
/// bag round-trips through the wire exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyBag {
    map: BTreeMap<String, Option<String>>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// `None` when the key is absent, `Some(None)` when it is present but null.
    pub fn raw(&self, key: &str) -> Option<Option<&str>> {
        self.map.get(key).map(|v| v.as_deref())
    }

    pub fn set_raw(&mut self, key: impl Into<String>, value: Option<String>) {
        self.map.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Option<String>> {
        self.map.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    // -------------------------------------------------------------------------
    // strings

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned().flatten()
    }

    pub fn set_string(&mut self, key: &str, value: Option<&str>) {
        self.set_raw(key, value.map(str::to_owned));
    }

    // -------------------------------------------------------------------------
    // numbers and flags, defaulting to zero/false

    fn parse<T: std::str::FromStr + Default>(&self, key: &str, what: &str) -> T {
        match self.map.get(key).and_then(|v| v.as_deref()) {
            None => T::default(),
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(key, raw, "property is not a valid {}", what);
                T::default()
            }),
        }
    }

    pub fn get_int(&self, key: &str) -> i32 {
        self.parse(key, "i32")
    }

    pub fn set_int(&mut self, key: &str, value: i32) {
        self.set_raw(key, Some(value.to_string()));
    }

    pub fn get_long(&self, key: &str) -> i64 {
        self.parse(key, "i64")
    }

    pub fn set_long(&mut self, key: &str, value: i64) {
        self.set_raw(key, Some(value.to_string()));
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.parse(key, "bool")
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.set_raw(key, Some(value.to_string()));
    }

    /// Durations travel as integer nanoseconds.
    pub fn get_duration(&self, key: &str) -> Duration {
        let nanos: i64 = self.parse(key, "duration");
        Duration::from_nanos(nanos.max(0) as u64)
    }

    pub fn set_duration(&mut self, key: &str, value: Duration) {
        let nanos = i64::try_from(value.as_nanos()).unwrap_or(i64::MAX);
        self.set_long(key, nanos);
    }

    // -------------------------------------------------------------------------
    // encoded values, `None` when absent, null or unreadable

    pub fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        let raw = self.map.get(key)?.as_deref()?;
        match STANDARD.decode(raw) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                warn!(key, %err, "property is not valid base64");
                None
            }
        }
    }

    pub fn set_bytes(&mut self, key: &str, value: Option<&[u8]>) {
        self.set_raw(key, value.map(|b| STANDARD.encode(b)));
    }

    pub fn get_timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        let raw = self.map.get(key)?.as_deref()?;
        match DateTime::parse_from_rfc3339(raw) {
            Ok(ts) => Some(ts.with_timezone(&Utc)),
            Err(err) => {
                warn!(key, raw, %err, "property is not an RFC 3339 timestamp");
                None
            }
        }
    }

    pub fn set_timestamp(&mut self, key: &str, value: Option<DateTime<Utc>>) {
        self.set_raw(key, value.map(|ts| ts.to_rfc3339_opts(SecondsFormat::Nanos, true)));
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.map.get(key)?.as_deref()?;
        match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, %err, "property does not hold the expected JSON");
                None
            }
        }
    }

    pub fn set_json<T: Serialize + ?Sized>(&mut self, key: &str, value: Option<&T>) {
        let encoded = match value {
            None => None,
            Some(v) => match serde_json::to_string(v) {
                Ok(json) => Some(json),
                Err(err) => {
                    warn!(key, %err, "could not encode property as JSON");
                    None
                }
            },
        };
        self.set_raw(key, encoded);
    }
}

impl FromIterator<(String, Option<String>)> for PropertyBag {
    fn from_iter<I: IntoIterator<Item = (String, Option<String>)>>(iter: I) -> Self {
        Self { map: iter.into_iter().collect() }
    }
}
