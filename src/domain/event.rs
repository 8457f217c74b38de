// Wire-level event model
//
// Events arrive as open records. Numbers keep non-finite values, which is why
// this is not serde_json::Value.
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WireValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<WireValue>),
    Record(BTreeMap<String, WireValue>),
}

impl WireValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            WireValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            WireValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&WireValue> {
        match self {
            WireValue::Record(fields) => fields.get(name),
            _ => None,
        }
    }

    pub fn element(&self, index: usize) -> Option<&WireValue> {
        match self {
            WireValue::List(items) => items.get(index),
            _ => None,
        }
    }

    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            WireValue::Null => "null",
            WireValue::Bool(_) => "bool",
            WireValue::Number(_) => "number",
            WireValue::Text(_) => "string",
            WireValue::List(_) => "list",
            WireValue::Record(_) => "record",
        }
    }
}

/// Text form of a wire value. Used as the dedup key, so strings render
/// without quotes.
impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireValue::Null => f.write_str("null"),
            WireValue::Bool(b) => write!(f, "{}", b),
            WireValue::Number(n) => write!(f, "{}", n),
            WireValue::Text(s) => f.write_str(s),
            WireValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            WireValue::Record(fields) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}:{}", name, value)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// One telemetry event: an open record of named fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Event {
    fields: BTreeMap<String, WireValue>,
}

impl Event {
    pub fn new(fields: BTreeMap<String, WireValue>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&WireValue> {
        self.fields.get(name)
    }

    /// Record kind tag carried by snapshot records, if any.
    pub fn kind(&self) -> Option<&str> {
        self.get("_name_").and_then(WireValue::as_str)
    }
}

impl From<BTreeMap<String, WireValue>> for Event {
    fn from(fields: BTreeMap<String, WireValue>) -> Self {
        Self::new(fields)
    }
}

/// Inbound push-channel message: one event for one stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PushMessage {
    pub stream: String,
    pub event: Event,
}
