// Value types - decode, nominal value and scale factory per semantic domain
use crate::domain::error::{ChartError, ChartResult};
use crate::domain::event::WireValue;
use crate::domain::scale::{Scale, ScaleKind};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const NUMERIC: &str = "numeric";
pub const TIMESTAMP: &str = "timestamp";

/// Native (decoded) value of one point coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Real(f64),
    Instant(DateTime<Utc>),
}

impl Value {
    /// Position on the continuous axis: the number itself, or epoch milliseconds.
    pub fn scalar(&self) -> f64 {
        match self {
            Value::Real(v) => *v,
            Value::Instant(t) => t.timestamp_micros() as f64 / 1_000.0,
        }
    }

    pub fn is_nan(&self) -> bool {
        self.scalar().is_nan()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Real(v) => write!(f, "{}", v),
            Value::Instant(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

/// Closed interval `[lo, hi]` over one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub lo: Value,
    pub hi: Value,
}

impl Span {
    pub fn new(lo: Value, hi: Value) -> Self {
        Self { lo, hi }
    }

    pub fn point(v: Value) -> Self {
        Self { lo: v, hi: v }
    }

    /// Smallest span covering both inputs.
    pub fn outer(self, other: Span) -> Span {
        let lo = if other.lo.scalar() < self.lo.scalar() { other.lo } else { self.lo };
        let hi = if other.hi.scalar() > self.hi.scalar() { other.hi } else { self.hi };
        Span { lo, hi }
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.lo.scalar() <= other.lo.scalar() && self.hi.scalar() >= other.hi.scalar()
    }
}

pub type DecodeFn = fn(&WireValue) -> ChartResult<Value>;

/// Decode/scale/nominal triple for one semantic value domain.
#[derive(Debug, Clone)]
pub struct ValueType {
    tag: String,
    nominal: Value,
    decode: DecodeFn,
    scale_kind: ScaleKind,
}

impl ValueType {
    pub fn new(tag: impl Into<String>, nominal: Value, decode: DecodeFn, scale_kind: ScaleKind) -> Self {
        Self {
            tag: tag.into(),
            nominal,
            decode,
            scale_kind,
        }
    }

    pub fn numeric() -> Self {
        Self::new(NUMERIC, Value::Real(0.0), decode_numeric, ScaleKind::Linear)
    }

    /// Nominal value is the instant this type was constructed.
    pub fn timestamp() -> Self {
        Self::new(TIMESTAMP, Value::Instant(Utc::now()), decode_timestamp, ScaleKind::Time)
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn nominal(&self) -> Value {
        self.nominal
    }

    pub fn decode(&self, wire: &WireValue) -> ChartResult<Value> {
        (self.decode)(wire)
    }

    /// Scale for this type's values over `domain`, onto pixel `range`.
    pub fn make_scale(&self, domain: Span, range: (f64, f64)) -> Scale {
        Scale::new(self.scale_kind, domain, range)
    }
}

fn decode_error(tag: &str, wire: &WireValue, reason: impl Into<String>) -> ChartError {
    ChartError::Decode {
        tag: tag.to_string(),
        value: wire.to_string(),
        reason: reason.into(),
    }
}

fn decode_numeric(wire: &WireValue) -> ChartResult<Value> {
    match wire {
        WireValue::Number(n) => Ok(Value::Real(*n)),
        other => Err(decode_error(NUMERIC, other, format!("expected number, got {}", other.kind()))),
    }
}

fn decode_timestamp(wire: &WireValue) -> ChartResult<Value> {
    match wire {
        WireValue::Text(s) => parse_instant(s)
            .map(Value::Instant)
            .ok_or_else(|| decode_error(TIMESTAMP, wire, "not an RFC 3339 / ISO 8601 timestamp")),
        WireValue::Number(ms) if ms.is_finite() => DateTime::from_timestamp_millis(*ms as i64)
            .map(Value::Instant)
            .ok_or_else(|| decode_error(TIMESTAMP, wire, "epoch milliseconds out of range")),
        other => Err(decode_error(TIMESTAMP, other, format!("expected string, got {}", other.kind()))),
    }
}

/// RFC 3339 first, then a zone-less ISO 8601 form taken as UTC.
fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Registry of value types by tag. Populated at startup, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ValueTypeRegistry {
    types: HashMap<String, Arc<ValueType>>,
}

impl ValueTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the `numeric` and `timestamp` types.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for value_type in [ValueType::numeric(), ValueType::timestamp()] {
            registry
                .register(value_type)
                .expect("builtin value type tags are distinct");
        }
        registry
    }

    pub fn register(&mut self, value_type: ValueType) -> ChartResult<Arc<ValueType>> {
        if self.types.contains_key(value_type.tag()) {
            return Err(ChartError::DuplicateValueType(value_type.tag().to_string()));
        }
        let value_type = Arc::new(value_type);
        self.types.insert(value_type.tag().to_string(), value_type.clone());
        Ok(value_type)
    }

    pub fn lookup(&self, tag: &str) -> ChartResult<Arc<ValueType>> {
        self.types
            .get(tag)
            .cloned()
            .ok_or_else(|| ChartError::UnknownValueType(tag.to_string()))
    }
}
