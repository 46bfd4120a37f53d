use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single buffered metric value.
///
/// Values are grouped by their type name when a ping is assembled, so two
/// metrics of different types may share an identifier without colliding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricValue {
    Counter(i64),
    Quantity(i64),
    Boolean(bool),
    String(String),
    StringList(Vec<String>),
}

impl MetricValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            MetricValue::Counter(_) => "counter",
            MetricValue::Quantity(_) => "quantity",
            MetricValue::Boolean(_) => "boolean",
            MetricValue::String(_) => "string",
            MetricValue::StringList(_) => "string_list",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            MetricValue::Counter(v) | MetricValue::Quantity(v) => serde_json::Value::from(*v),
            MetricValue::Boolean(v) => serde_json::Value::from(*v),
            MetricValue::String(v) => serde_json::Value::from(v.as_str()),
            MetricValue::StringList(v) => serde_json::Value::from(v.clone()),
        }
    }
}

/// An event recorded by the application, buffered until its ping is assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub category: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl RecordedEvent {
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            category: category.into(),
            name: name.into(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}
