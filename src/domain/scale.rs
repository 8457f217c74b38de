// Axis scales - map a value domain onto a pixel range
use crate::domain::value_type::{Span, Value};
use chrono::DateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleKind {
    Linear,
    Time,
}

/// Candidate tick intervals for time scales, in milliseconds.
const TIME_INTERVALS_MS: [f64; 16] = [
    1_000.0,
    5_000.0,
    15_000.0,
    30_000.0,
    60_000.0,
    300_000.0,
    900_000.0,
    1_800_000.0,
    3_600_000.0,
    10_800_000.0,
    21_600_000.0,
    43_200_000.0,
    86_400_000.0,
    172_800_000.0,
    604_800_000.0,
    2_592_000_000.0,
];

/// Continuous scale. Mutated in place when the domain changes so axes keep
/// their identity across updates.
#[derive(Debug, Clone, PartialEq)]
pub struct Scale {
    kind: ScaleKind,
    domain: Span,
    range: (f64, f64),
}

impl Scale {
    pub fn new(kind: ScaleKind, domain: Span, range: (f64, f64)) -> Self {
        Self { kind, domain, range }
    }

    pub fn domain(&self) -> Span {
        self.domain
    }

    pub fn range(&self) -> (f64, f64) {
        self.range
    }

    pub fn set_domain(&mut self, domain: Span) {
        self.domain = domain;
    }

    /// Pixel position of `value`. A zero-width domain maps to the middle of
    /// the range.
    pub fn apply(&self, value: &Value) -> f64 {
        let (d0, d1) = (self.domain.lo.scalar(), self.domain.hi.scalar());
        let (r0, r1) = self.range;
        let span = d1 - d0;
        if span == 0.0 || !span.is_finite() {
            return (r0 + r1) / 2.0;
        }
        r0 + (value.scalar() - d0) / span * (r1 - r0)
    }

    /// Widen a linear domain to round tick boundaries. Time domains are left as is.
    pub fn nice(&mut self, count: usize) {
        if self.kind != ScaleKind::Linear {
            return;
        }
        let (mut lo, mut hi) = (self.domain.lo.scalar(), self.domain.hi.scalar());
        if !(lo.is_finite() && hi.is_finite()) || lo >= hi {
            return;
        }
        let mut prev_step = f64::NAN;
        for _ in 0..10 {
            let step = tick_step(lo, hi, count);
            if step == prev_step || step <= 0.0 {
                break;
            }
            lo = (lo / step).floor() * step;
            hi = (hi / step).ceil() * step;
            prev_step = step;
        }
        self.domain = Span::new(Value::Real(lo), Value::Real(hi));
    }

    /// Roughly `count` tick positions (domain scalars) inside the domain.
    pub fn ticks(&self, count: usize) -> Vec<f64> {
        let (lo, hi) = (self.domain.lo.scalar(), self.domain.hi.scalar());
        if !(lo.is_finite() && hi.is_finite()) || count == 0 {
            return Vec::new();
        }
        if lo == hi {
            return vec![lo];
        }
        let step = self.step(count);
        if step <= 0.0 || !step.is_finite() {
            return Vec::new();
        }
        let start = (lo / step).ceil() as i64;
        let stop = (hi / step).floor() as i64;
        (start..=stop).map(|i| i as f64 * step).collect()
    }

    /// Text for a tick at domain scalar `at`, given the tick count in use.
    pub fn tick_label(&self, at: f64, count: usize) -> String {
        let step = self.step(count);
        match self.kind {
            ScaleKind::Linear => {
                let decimals = if step > 0.0 && step.is_finite() {
                    (-step.log10().floor()).max(0.0) as usize
                } else {
                    0
                };
                format!("{:.*}", decimals, at)
            }
            ScaleKind::Time => {
                let Some(t) = DateTime::from_timestamp_millis(at as i64) else {
                    return String::new();
                };
                let fmt = if step < 60_000.0 {
                    "%H:%M:%S"
                } else if step < 86_400_000.0 {
                    "%H:%M"
                } else {
                    "%Y-%m-%d"
                };
                t.format(fmt).to_string()
            }
        }
    }

    fn step(&self, count: usize) -> f64 {
        let (lo, hi) = (self.domain.lo.scalar(), self.domain.hi.scalar());
        match self.kind {
            ScaleKind::Linear => tick_step(lo, hi, count),
            ScaleKind::Time => {
                let target = (hi - lo).abs() / count.max(1) as f64;
                TIME_INTERVALS_MS
                    .iter()
                    .copied()
                    .find(|interval| *interval >= target)
                    .unwrap_or_else(|| tick_step(lo, hi, count))
            }
        }
    }
}

/// 1-2-5 tick increment covering `[lo, hi]` in about `count` steps.
fn tick_step(lo: f64, hi: f64, count: usize) -> f64 {
    let raw = (hi - lo).abs() / count.max(1) as f64;
    if raw == 0.0 || !raw.is_finite() {
        return 0.0;
    }
    let power = raw.log10().floor();
    let base = 10f64.powf(power);
    let error = raw / base;
    let factor = if error >= 50f64.sqrt() {
        10.0
    } else if error >= 10f64.sqrt() {
        5.0
    } else if error >= 2f64.sqrt() {
        2.0
    } else {
        1.0
    };
    factor * base
}
