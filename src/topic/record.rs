// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Records as delivered by the backend.
//!
//! Upstream values are loosely typed (the same topic can report `"on"`,
//! `21.5` or `true`), so [`TopicValue`] keeps the original shape and
//! compares by its string rendering.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar topic value.
///
/// # Example
///
/// ```
/// use topic_cache::TopicValue;
///
/// let v: TopicValue = serde_json::from_str("21.5").unwrap();
/// assert_eq!(v.to_string(), "21.5");
/// assert!(v.matches("21.5"));
///
/// // Whole floats render without a fraction
/// let v: TopicValue = serde_json::from_str("21.0").unwrap();
/// assert!(v.matches("21"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TopicValue {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

/// Largest integer an `f64` carries exactly (2^53 - 1).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

impl TopicValue {
    /// String equality after coercion. This is the only comparison used to
    /// confirm a change.
    #[must_use]
    pub fn matches(&self, expected: &str) -> bool {
        match self {
            Self::Text(s) => s == expected,
            other => other.to_string() == expected,
        }
    }
}

impl fmt::Display for TopicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => match n.as_f64() {
                Some(x) if n.is_f64() && x.fract() == 0.0 && x.abs() <= MAX_SAFE_INTEGER => {
                    write!(f, "{}", x as i64)
                }
                _ => write!(f, "{}", n),
            },
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for TopicValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for TopicValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for TopicValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

/// One step of the provenance chain: which producer touched the value and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reason {
    pub timestamp: String,
    pub message: String,
}

impl Reason {
    pub fn new(timestamp: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            message: message.into(),
        }
    }
}

/// A prior value of a topic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<TopicValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Vec<Reason>>,
}

/// A single topic update from the backend.
///
/// Every field is optional on the wire. A record without a topic is
/// ignored on merge.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TopicRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<TopicValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Vec<Reason>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEntry>>,
}

impl TopicRecord {
    /// Record carrying a topic and a value.
    pub fn new(topic: impl Into<String>, value: impl Into<TopicValue>) -> Self {
        Self {
            topic: Some(topic.into()),
            value: Some(value.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: Vec<Reason>) -> Self {
        self.reason = Some(reason);
        self
    }

    #[must_use]
    pub fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.history = Some(history);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_untagged_deserialize() {
        let text: TopicValue = serde_json::from_value(json!("on")).unwrap();
        let num: TopicValue = serde_json::from_value(json!(42)).unwrap();
        let flag: TopicValue = serde_json::from_value(json!(true)).unwrap();
        assert_eq!(text, TopicValue::Text("on".into()));
        assert!(matches!(num, TopicValue::Number(_)));
        assert_eq!(flag, TopicValue::Bool(true));
    }

    #[test]
    fn test_value_coerced_comparison() {
        assert!(TopicValue::from(42i64).matches("42"));
        assert!(TopicValue::Bool(false).matches("false"));
        assert!(TopicValue::from("on").matches("on"));
        assert!(!TopicValue::from("on").matches("On"));
        // No numeric tolerance: "42.0" is a different string
        assert!(!TopicValue::from(42i64).matches("42.0"));
    }

    #[test]
    fn test_whole_float_renders_as_integer() {
        let parse = |raw: &str| serde_json::from_str::<TopicValue>(raw).unwrap();
        assert!(parse("21.0").matches("21"));
        assert!(!parse("21.0").matches("21.0"));
        assert_eq!(parse("1e3").to_string(), "1000");
        assert_eq!(parse("-4.0").to_string(), "-4");
        assert_eq!(parse("21.5").to_string(), "21.5");
        // Beyond 2^53 integers are not exact; keep the float rendering
        assert_eq!(parse("1e300").to_string(), serde_json::Number::from_f64(1e300).unwrap().to_string());
    }

    #[test]
    fn test_record_sparse_fields() {
        let record: TopicRecord = serde_json::from_value(json!({
            "topic": "living/light",
            "value": "on",
            "time": "2024-01-01 10:00:00"
        }))
        .unwrap();
        assert_eq!(record.topic.as_deref(), Some("living/light"));
        assert!(record.reason.is_none());
        assert!(record.history.is_none());
    }

    #[test]
    fn test_record_full_fields() {
        let record: TopicRecord = serde_json::from_value(json!({
            "topic": "living/temp",
            "value": 21.5,
            "reason": [{"timestamp": "t1", "message": "sensor"}],
            "history": [{"time": "t0", "value": "21.0"}]
        }))
        .unwrap();
        assert_eq!(record.reason.unwrap()[0].message, "sensor");
        let history = record.history.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].reason.is_none());
    }

    #[test]
    fn test_record_serializes_without_absent_fields() {
        let record = TopicRecord::new("a/b", "1");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"topic": "a/b", "value": "1"}));
    }
}
