// Series traits and per-series accumulators
use crate::domain::error::{ChartError, ChartResult};
use crate::domain::event::{Event, WireValue};
use crate::domain::value_type::{Span, Value, ValueType};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Field(String),
    Index(usize),
}

/// Location of a value inside an event, e.g. `tm`, `x[0]`, `P[0][0]`, `kf.x[1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPath {
    text: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn parse(text: &str) -> ChartResult<Self> {
        let invalid = |reason: &str| ChartError::InvalidFieldPath {
            path: text.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut chars = text.chars().peekable();
        let mut expect_name = true;

        while let Some(&c) = chars.peek() {
            match c {
                '[' => {
                    if expect_name {
                        return Err(invalid("expected a field name before '['"));
                    }
                    chars.next();
                    let mut digits = String::new();
                    while let Some(&d) = chars.peek() {
                        if d == ']' {
                            break;
                        }
                        digits.push(d);
                        chars.next();
                    }
                    if chars.next() != Some(']') {
                        return Err(invalid("unclosed '['"));
                    }
                    let index = digits
                        .trim()
                        .parse::<usize>()
                        .map_err(|_| invalid("index must be a non-negative integer"))?;
                    segments.push(Segment::Index(index));
                    expect_name = false;
                }
                '.' => {
                    if expect_name {
                        return Err(invalid("empty field name"));
                    }
                    chars.next();
                    expect_name = true;
                }
                _ => {
                    if !expect_name {
                        return Err(invalid("expected '.' or '[' after index"));
                    }
                    let mut name = String::new();
                    while let Some(&n) = chars.peek() {
                        if n == '.' || n == '[' {
                            break;
                        }
                        name.push(n);
                        chars.next();
                    }
                    let name = name.trim();
                    if name.is_empty() {
                        return Err(invalid("empty field name"));
                    }
                    segments.push(Segment::Field(name.to_string()));
                    expect_name = false;
                }
            }
        }

        if expect_name {
            return Err(invalid("empty field name"));
        }

        Ok(Self {
            text: text.to_string(),
            segments,
        })
    }

    pub fn resolve<'e>(&self, event: &'e Event) -> ChartResult<&'e WireValue> {
        let missing = || ChartError::MissingField(self.text.clone());

        let mut segments = self.segments.iter();
        let mut current = match segments.next() {
            Some(Segment::Field(name)) => event.get(name).ok_or_else(missing)?,
            _ => return Err(missing()),
        };
        for segment in segments {
            current = match segment {
                Segment::Field(name) => current.field(name),
                Segment::Index(i) => current.element(*i),
            }
            .ok_or_else(missing)?;
        }
        Ok(current)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// `mean + sigmas * sqrt(variance)`, clamped to `[min, max]` when given.
#[derive(Debug, Clone, PartialEq)]
pub struct SigmaBand {
    pub mean: FieldPath,
    pub variance: FieldPath,
    pub sigmas: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl SigmaBand {
    pub fn into_extractor(self) -> Extractor {
        Extractor::custom(move |event| self.evaluate(event))
    }

    fn evaluate(&self, event: &Event) -> ChartResult<WireValue> {
        let number = |path: &FieldPath| -> ChartResult<f64> {
            let wire = path.resolve(event)?;
            wire.as_f64().ok_or_else(|| ChartError::Decode {
                tag: "number".to_string(),
                value: wire.to_string(),
                reason: format!("field [{}] is a {}", path, wire.kind()),
            })
        };

        let mut value = number(&self.mean)? + self.sigmas * number(&self.variance)?.sqrt();
        if !value.is_nan() {
            if let Some(min) = self.min {
                value = value.max(min);
            }
            if let Some(max) = self.max {
                value = value.min(max);
            }
        }
        Ok(WireValue::Number(value))
    }
}

pub type ExtractFn = dyn Fn(&Event) -> ChartResult<WireValue> + Send + Sync;

/// Pulls one wire value out of an event.
#[derive(Clone)]
pub enum Extractor {
    Path(FieldPath),
    Custom(Arc<ExtractFn>),
}

impl Extractor {
    pub fn path(text: &str) -> ChartResult<Self> {
        FieldPath::parse(text).map(Extractor::Path)
    }

    pub fn custom(f: impl Fn(&Event) -> ChartResult<WireValue> + Send + Sync + 'static) -> Self {
        Extractor::Custom(Arc::new(f))
    }

    pub fn extract(&self, event: &Event) -> ChartResult<WireValue> {
        match self {
            Extractor::Path(path) => path.resolve(event).cloned(),
            Extractor::Custom(f) => f(event),
        }
    }
}

impl fmt::Debug for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extractor::Path(path) => write!(f, "Path({})", path),
            Extractor::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Field extraction and typing for one chart series.
#[derive(Debug, Clone)]
pub struct SeriesTrait {
    x: Extractor,
    x_type: Arc<ValueType>,
    y: Extractor,
    y_type: Arc<ValueType>,
}

impl SeriesTrait {
    pub fn new(x: Extractor, x_type: Arc<ValueType>, y: Extractor, y_type: Arc<ValueType>) -> Self {
        Self { x, x_type, y, y_type }
    }

    pub fn x_type(&self) -> &ValueType {
        &self.x_type
    }

    pub fn y_type(&self) -> &ValueType {
        &self.y_type
    }

    /// Dedup key: the raw x field, before decoding.
    pub fn key(&self, event: &Event) -> ChartResult<String> {
        self.x.extract(event).map(|raw| raw.to_string())
    }

    pub fn x_value(&self, event: &Event) -> ChartResult<Value> {
        self.x_type.decode(&self.x.extract(event)?)
    }

    pub fn y_value(&self, event: &Event) -> ChartResult<Value> {
        self.y_type.decode(&self.y.extract(event)?)
    }

    pub fn nominal(&self) -> Extent {
        Extent {
            x: Span::point(self.x_type.nominal()),
            y: Span::point(self.y_type.nominal()),
        }
    }
}

/// One retained datum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub ordinal: u64,
    pub x: Value,
    pub y: Value,
}

/// Decoded point waiting to be committed, with its dedup key.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPoint {
    key: String,
    x: Value,
    y: Value,
}

/// x and y spans together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub x: Span,
    pub y: Span,
}

impl Extent {
    pub fn outer(self, other: Extent) -> Extent {
        Extent {
            x: self.x.outer(other.x),
            y: self.y.outer(other.y),
        }
    }
}

/// Deduplicated, insertion-ordered points for one series.
///
/// The cached range is refreshed only by [`SeriesAccumulator::recalc_range`].
#[derive(Debug, Clone)]
pub struct SeriesAccumulator {
    series_trait: SeriesTrait,
    index_by_key: HashMap<String, usize>,
    points: Vec<Point>,
    next_ordinal: u64,
    range: Extent,
}

impl SeriesAccumulator {
    pub fn new(series_trait: SeriesTrait) -> Self {
        let range = series_trait.nominal();
        Self {
            series_trait,
            index_by_key: HashMap::new(),
            points: Vec::new(),
            next_ordinal: 0,
            range,
        }
    }

    pub fn series_trait(&self) -> &SeriesTrait {
        &self.series_trait
    }

    /// Extract and decode the point carried by `event` without storing it.
    /// `None` when its key is already present.
    pub fn prepare(&self, event: &Event) -> ChartResult<Option<PendingPoint>> {
        let key = self.series_trait.key(event)?;
        if self.index_by_key.contains_key(&key) {
            tracing::trace!("Skipping duplicate key {}", key);
            return Ok(None);
        }

        let x = self.series_trait.x_value(event)?;
        let y = self.series_trait.y_value(event)?;
        Ok(Some(PendingPoint { key, x, y }))
    }

    /// Store a point obtained from [`SeriesAccumulator::prepare`] on this accumulator.
    pub fn commit(&mut self, pending: PendingPoint) {
        let PendingPoint { key, x, y } = pending;
        let point = Point {
            ordinal: self.next_ordinal,
            x,
            y,
        };
        self.next_ordinal += 1;
        self.index_by_key.insert(key, self.points.len());
        self.points.push(point);
    }

    /// Add the point carried by `event`. Returns `false` when its key was
    /// already present; the existing point is kept as is.
    pub fn append(&mut self, event: &Event) -> ChartResult<bool> {
        match self.prepare(event)? {
            Some(pending) => {
                self.commit(pending);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Full rescan of the points. NaN coordinates do not contribute, infinities
    /// do; an axis with nothing to contribute falls back to its nominal value.
    pub fn recalc_range(&mut self) {
        let nominal = self.series_trait.nominal();
        let x = axis_span(self.points.iter().map(|p| p.x)).unwrap_or(nominal.x);
        let y = axis_span(self.points.iter().map(|p| p.y)).unwrap_or(nominal.y);
        self.range = Extent { x, y };
    }

    pub fn range(&self) -> Extent {
        self.range
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index_by_key.contains_key(key)
    }
}

fn axis_span(values: impl Iterator<Item = Value>) -> Option<Span> {
    values
        .filter(|v| !v.is_nan())
        .fold(None, |acc: Option<Span>, v| match acc {
            None => Some(Span::point(v)),
            Some(span) => Some(span.outer(Span::point(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_type::ValueTypeRegistry;
    use chrono::{DateTime, Utc};

    fn event(json: &str) -> Event {
        serde_json::from_str(json).unwrap()
    }

    fn upx_trait() -> SeriesTrait {
        let registry = ValueTypeRegistry::builtin();
        SeriesTrait::new(
            Extractor::path("tm").unwrap(),
            registry.lookup("timestamp").unwrap(),
            Extractor::path("upx").unwrap(),
            registry.lookup("numeric").unwrap(),
        )
    }

    fn upx(minute: u32, value: f64) -> Event {
        event(&format!(r#"{{"tm": "2024-01-01T00:{:02}:00Z", "upx": {}}}"#, minute, value))
    }

    // non-finite numbers have no JSON spelling
    fn upx_raw(minute: u32, value: f64) -> Event {
        Event::new(
            [
                ("tm".to_string(), WireValue::Text(format!("2024-01-01T00:{:02}:00Z", minute))),
                ("upx".to_string(), WireValue::Number(value)),
            ]
            .into_iter()
            .collect(),
        )
    }

    #[test]
    fn test_field_path_parse() {
        let path = FieldPath::parse("P[0][1]").unwrap();
        let ev = event(r#"{"P": [[1.0, 2.5], [3.0, 4.0]]}"#);
        assert_eq!(path.resolve(&ev).unwrap(), &WireValue::Number(2.5));

        let nested = FieldPath::parse("kf.x[1]").unwrap();
        let ev = event(r#"{"kf": {"x": [0.1, 0.2]}}"#);
        assert_eq!(nested.resolve(&ev).unwrap(), &WireValue::Number(0.2));

        for bad in ["", "[0]", "x[", "x[a]", "x..y", "x.", "x[0]y", "x.[0]"] {
            assert!(
                matches!(FieldPath::parse(bad), Err(ChartError::InvalidFieldPath { .. })),
                "expected [{}] to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_missing_field_is_reported() {
        let mut acc = SeriesAccumulator::new(upx_trait());
        let err = acc.append(&event(r#"{"tm": "2024-01-01T00:00:00Z"}"#)).unwrap_err();
        assert!(matches!(err, ChartError::MissingField(path) if path == "upx"));
        assert!(acc.is_empty());
    }

    #[test]
    fn test_sigma_band_clamps() {
        let band = |sigmas: f64| {
            SigmaBand {
                mean: FieldPath::parse("x[0]").unwrap(),
                variance: FieldPath::parse("P[0][0]").unwrap(),
                sigmas,
                min: Some(0.0),
                max: Some(1.0),
            }
            .into_extractor()
        };
        let ev = event(r#"{"x": [0.5], "P": [[0.04]]}"#);

        assert_eq!(band(-2.0).extract(&ev).unwrap(), WireValue::Number(0.5 - 0.4));
        assert_eq!(band(-5.0).extract(&ev).unwrap(), WireValue::Number(0.0));
        assert_eq!(band(5.0).extract(&ev).unwrap(), WireValue::Number(1.0));
    }

    #[test]
    fn test_custom_extractor() {
        let registry = ValueTypeRegistry::builtin();
        let spread = Extractor::custom(|ev| {
            let hi = FieldPath::parse("hi")?.resolve(ev)?.as_f64().unwrap_or(f64::NAN);
            let lo = FieldPath::parse("lo")?.resolve(ev)?.as_f64().unwrap_or(f64::NAN);
            Ok(WireValue::Number(hi - lo))
        });
        let mut acc = SeriesAccumulator::new(SeriesTrait::new(
            Extractor::path("tm").unwrap(),
            registry.lookup("timestamp").unwrap(),
            spread,
            registry.lookup("numeric").unwrap(),
        ));

        assert!(acc.append(&event(r#"{"tm": "2024-01-01T00:00:00Z", "hi": 0.75, "lo": 0.25}"#)).unwrap());
        assert_eq!(acc.points()[0].y, Value::Real(0.5));
        assert!(matches!(
            acc.append(&event(r#"{"tm": "2024-01-01T00:01:00Z", "hi": 0.75}"#)),
            Err(ChartError::MissingField(path)) if path == "lo"
        ));
        assert_eq!(acc.len(), 1);
    }

    #[test]
    fn test_duplicate_suppressed() {
        let mut acc = SeriesAccumulator::new(upx_trait());
        let ev = upx(0, 0.42);

        assert!(acc.append(&ev).unwrap());
        acc.recalc_range();
        let once = (acc.points().to_vec(), acc.range());

        assert!(!acc.append(&ev).unwrap());
        acc.recalc_range();

        assert_eq!(acc.len(), 1);
        assert_eq!((acc.points().to_vec(), acc.range()), once);
    }

    #[test]
    fn test_redelivery_with_new_value_keeps_first() {
        let mut acc = SeriesAccumulator::new(upx_trait());
        acc.append(&upx(0, 0.42)).unwrap();
        acc.append(&upx(0, 0.99)).unwrap();

        assert_eq!(acc.len(), 1);
        assert_eq!(acc.points()[0].y, Value::Real(0.42));
    }

    #[test]
    fn test_ordinals_strictly_increase() {
        let mut acc = SeriesAccumulator::new(upx_trait());
        for (minute, value) in [(0, 0.1), (1, 0.3), (1, 0.3), (2, 0.2), (0, 0.1), (3, 0.5)] {
            acc.append(&upx(minute, value)).unwrap();
        }

        let ordinals: Vec<u64> = acc.points().iter().map(|p| p.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3]);
        assert!(acc.contains_key("2024-01-01T00:02:00Z"));
    }

    #[test]
    fn test_range_tracks_min_max() {
        let mut acc = SeriesAccumulator::new(upx_trait());
        let nominal = acc.series_trait().nominal();

        acc.recalc_range();
        assert_eq!(acc.range(), nominal);

        for (minute, value) in [(5, 0.3), (6, -0.2), (7, 0.9), (8, 0.1)] {
            acc.append(&upx(minute, value)).unwrap();
        }
        // not refreshed until asked
        assert_eq!(acc.range(), nominal);

        acc.recalc_range();
        let t = |m: &str| Value::Instant(DateTime::parse_from_rfc3339(m).unwrap().with_timezone(&Utc));
        assert_eq!(acc.range().x, Span::new(t("2024-01-01T00:05:00Z"), t("2024-01-01T00:08:00Z")));
        assert_eq!(acc.range().y, Span::new(Value::Real(-0.2), Value::Real(0.9)));
    }

    #[test]
    fn test_infinities_widen_range() {
        let mut acc = SeriesAccumulator::new(upx_trait());
        acc.append(&upx(0, 0.5)).unwrap();
        acc.append(&upx_raw(1, f64::INFINITY)).unwrap();
        acc.append(&upx_raw(2, f64::NEG_INFINITY)).unwrap();

        acc.recalc_range();
        assert_eq!(
            acc.range().y,
            Span::new(Value::Real(f64::NEG_INFINITY), Value::Real(f64::INFINITY))
        );
    }

    #[test]
    fn test_nan_excluded_from_range() {
        let mut acc = SeriesAccumulator::new(upx_trait());
        acc.append(&upx(0, 0.5)).unwrap();
        acc.append(&upx_raw(1, f64::NAN)).unwrap();

        acc.recalc_range();
        assert_eq!(acc.len(), 2);
        assert_eq!(acc.range().y, Span::point(Value::Real(0.5)));
    }
}
