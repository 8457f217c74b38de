// Line chart renderer - retained SVG scene driven by a Dataset
//
//     <------- width ---------->
//     +------------------------+ ^
//     |   +----------------+   | |
//     |   |        /\      | padding
//     |   |  /\   /  \     |   | height
//     |   | /  \_/    \_/  |   | |
//     |   +----------------+   | |
//     +------------------------+ v
//
// Scene:
//   <svg>
//     <g id=x_axis class=xaxis>
//     <g id=y_axis class=yaxis>
//     <g id=pts-<i> class=pts> <path id=line class=line>   (one per series)
use crate::domain::dataset::Dataset;
use crate::domain::error::{ChartError, ChartResult};
use crate::domain::scale::Scale;
use crate::domain::series::Point;
use crate::domain::value_type::Value;

const AXIS_TICKS: usize = 10;
const TICK_SIZE: f64 = 6.0;
const DEFAULT_STROKE: &str = "black";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartLayout {
    pub width: f64,
    pub height: f64,
    pub padding: f64,
}

impl ChartLayout {
    pub fn new(width: f64, height: f64, padding: f64) -> Self {
        Self {
            width,
            height,
            padding,
        }
    }

    pub fn x_pixels(&self) -> (f64, f64) {
        (self.padding, self.width - self.padding)
    }

    /// Inverted: larger values draw higher up.
    pub fn y_pixels(&self) -> (f64, f64) {
        (self.height - self.padding, self.padding)
    }
}

impl Default for ChartLayout {
    fn default() -> Self {
        Self::new(500.0, 250.0, 50.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrient {
    Bottom,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub offset: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    orient: AxisOrient,
    ticks: Vec<Tick>,
}

impl Axis {
    fn new(orient: AxisOrient, scale: &Scale) -> Self {
        let mut axis = Self {
            orient,
            ticks: Vec::with_capacity(AXIS_TICKS + 1),
        };
        axis.rebuild(scale);
        axis
    }

    fn rebuild(&mut self, scale: &Scale) {
        self.ticks.clear();
        for at in scale.ticks(AXIS_TICKS) {
            let offset = scale.apply(&Value::Real(at));
            self.ticks.push(Tick {
                offset,
                label: scale.tick_label(at, AXIS_TICKS),
            });
        }
    }
}

/// Turns points into SVG path data through the shared scales. Non-finite
/// points break the line.
#[derive(Debug, Clone, Copy, Default)]
struct LineGenerator;

impl LineGenerator {
    fn write(&self, x: &Scale, y: &Scale, points: &[Point], out: &mut String) {
        out.clear();
        let mut pen_down = false;
        for point in points {
            let (px, py) = (x.apply(&point.x), y.apply(&point.y));
            if !(px.is_finite() && py.is_finite()) {
                pen_down = false;
                continue;
            }
            let cmd = if pen_down { 'L' } else { 'M' };
            out.push_str(&format!("{}{:.3},{:.3}", cmd, px, py));
            pen_down = true;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathElement {
    pub id: String,
    pub stroke: String,
    pub d: String,
}

#[derive(Debug, Clone)]
struct ChartGeometry {
    parent: String,
    x_scale: Scale,
    y_scale: Scale,
    line: LineGenerator,
    x_axis: Axis,
    y_axis: Axis,
    paths: Vec<PathElement>,
}

#[derive(Debug, Clone)]
enum GuiState {
    Uninitialized,
    Ready(Box<ChartGeometry>),
}

/// Element id for the i'th series group.
pub fn series_element_id(index: usize) -> String {
    format!("pts-{}", index)
}

#[derive(Debug, Clone)]
pub struct ChartRenderer {
    layout: ChartLayout,
    strokes: Vec<String>,
    state: GuiState,
}

impl ChartRenderer {
    pub fn new(layout: ChartLayout) -> Self {
        Self {
            layout,
            strokes: Vec::new(),
            state: GuiState::Uninitialized,
        }
    }

    /// Per-series stroke colors, by series index. Missing entries draw black.
    pub fn with_strokes(mut self, strokes: Vec<String>) -> Self {
        self.strokes = strokes;
        self
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, GuiState::Ready(_))
    }

    /// Build scales, axes and one path per series, attached under `parent`.
    /// Only the first call does anything; returns whether it built.
    pub fn require_gui(&mut self, parent: &str, dataset: &Dataset) -> bool {
        if self.is_ready() {
            return false;
        }

        let mut x_scale = dataset.make_x_scale(self.layout.x_pixels());
        let mut y_scale = dataset.make_y_scale(self.layout.y_pixels());
        x_scale.nice(AXIS_TICKS);
        y_scale.nice(AXIS_TICKS);

        let line = LineGenerator;
        let paths = dataset
            .iter()
            .enumerate()
            .map(|(i, series)| {
                let mut d = String::new();
                line.write(&x_scale, &y_scale, series.points(), &mut d);
                PathElement {
                    id: series_element_id(i),
                    stroke: self.strokes.get(i).cloned().unwrap_or_else(|| DEFAULT_STROKE.to_string()),
                    d,
                }
            })
            .collect();

        let geometry = ChartGeometry {
            parent: parent.to_string(),
            x_axis: Axis::new(AxisOrient::Bottom, &x_scale),
            y_axis: Axis::new(AxisOrient::Left, &y_scale),
            x_scale,
            y_scale,
            line,
            paths,
        };
        tracing::debug!(
            "Built chart geometry under {} with {} series",
            parent,
            geometry.paths.len()
        );
        self.state = GuiState::Ready(Box::new(geometry));
        true
    }

    /// Re-bind scale domains and series paths to the dataset's current contents.
    pub fn update_chart(&mut self, dataset: &Dataset) -> ChartResult<()> {
        let GuiState::Ready(geometry) = &mut self.state else {
            return Err(ChartError::GeometryNotInitialized);
        };
        let geometry = &mut **geometry;
        if geometry.paths.len() != dataset.series_count() {
            return Err(ChartError::SeriesCountMismatch {
                expected: geometry.paths.len(),
                actual: dataset.series_count(),
            });
        }

        geometry.x_scale.set_domain(dataset.x_range());
        geometry.y_scale.set_domain(dataset.y_range());
        geometry.x_axis.rebuild(&geometry.x_scale);
        geometry.y_axis.rebuild(&geometry.y_scale);

        for (path, series) in geometry.paths.iter_mut().zip(dataset.iter()) {
            geometry
                .line
                .write(&geometry.x_scale, &geometry.y_scale, series.points(), &mut path.d);
        }
        Ok(())
    }

    /// Serialize the current scene as a standalone SVG document.
    pub fn to_svg(&self) -> ChartResult<String> {
        let GuiState::Ready(geometry) = &self.state else {
            return Err(ChartError::GeometryNotInitialized);
        };
        let ChartLayout {
            width,
            height,
            padding,
        } = self.layout;

        let mut svg = String::new();
        svg.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" data-parent="{}" width="{}" height="{}">"#,
            escape(&geometry.parent),
            width,
            height
        ));
        svg.push_str(&format!(
            r#"<g class="xaxis" id="x_axis" transform="translate(0,{})">"#,
            height - padding
        ));
        write_axis(&mut svg, &geometry.x_axis, self.layout);
        svg.push_str("</g>");
        svg.push_str(&format!(
            r#"<g class="yaxis" id="y_axis" transform="translate({},0)">"#,
            padding
        ));
        write_axis(&mut svg, &geometry.y_axis, self.layout);
        svg.push_str("</g>");

        for path in &geometry.paths {
            svg.push_str(&format!(
                r#"<g class="pts" id="{}"><path class="line" id="line" fill="none" stroke="{}" d="{}"/></g>"#,
                path.id,
                escape(&path.stroke),
                path.d
            ));
        }
        svg.push_str("</svg>");
        Ok(svg)
    }
}

fn write_axis(svg: &mut String, axis: &Axis, layout: ChartLayout) {
    let (lo, hi) = match axis.orient {
        AxisOrient::Bottom => layout.x_pixels(),
        AxisOrient::Left => layout.y_pixels(),
    };
    match axis.orient {
        AxisOrient::Bottom => {
            svg.push_str(&format!(r#"<path class="domain" stroke="currentColor" d="M{},0H{}"/>"#, lo, hi));
            for tick in &axis.ticks {
                svg.push_str(&format!(
                    r#"<g class="tick" transform="translate({:.3},0)"><line stroke="currentColor" y2="{}"/><text y="{}" text-anchor="middle">{}</text></g>"#,
                    tick.offset,
                    TICK_SIZE,
                    TICK_SIZE + 12.0,
                    escape(&tick.label)
                ));
            }
        }
        AxisOrient::Left => {
            svg.push_str(&format!(r#"<path class="domain" stroke="currentColor" d="M0,{}V{}"/>"#, lo, hi));
            for tick in &axis.ticks {
                svg.push_str(&format!(
                    r#"<g class="tick" transform="translate(0,{:.3})"><line stroke="currentColor" x2="-{}"/><text x="-{}" dy="0.32em" text-anchor="end">{}</text></g>"#,
                    tick.offset,
                    TICK_SIZE,
                    TICK_SIZE + 3.0,
                    escape(&tick.label)
                ));
            }
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::{Event, WireValue};
    use crate::domain::series::{Extractor, SeriesTrait};
    use crate::domain::value_type::ValueTypeRegistry;
    use approx::assert_relative_eq;

    impl ChartRenderer {
        fn paths(&self) -> ChartResult<&[PathElement]> {
            match &self.state {
                GuiState::Ready(geometry) => Ok(&geometry.paths),
                GuiState::Uninitialized => Err(ChartError::GeometryNotInitialized),
            }
        }

        fn scales(&self) -> ChartResult<(&Scale, &Scale)> {
            match &self.state {
                GuiState::Ready(geometry) => Ok((&geometry.x_scale, &geometry.y_scale)),
                GuiState::Uninitialized => Err(ChartError::GeometryNotInitialized),
            }
        }
    }

    fn numeric_dataset(series: usize) -> Dataset {
        let registry = ValueTypeRegistry::builtin();
        let numeric = registry.lookup("numeric").unwrap();
        let traits = (0..series)
            .map(|i| {
                SeriesTrait::new(
                    Extractor::path("t").unwrap(),
                    numeric.clone(),
                    Extractor::path(&format!("y[{}]", i)).unwrap(),
                    numeric.clone(),
                )
            })
            .collect();
        Dataset::new(traits).unwrap()
    }

    fn feed(dataset: &mut Dataset, t: f64, ys: &[f64]) {
        let ys: Vec<String> = ys.iter().map(|y| y.to_string()).collect();
        let event: Event = serde_json::from_str(&format!(r#"{{"t": {}, "y": [{}]}}"#, t, ys.join(","))).unwrap();
        dataset.update(&event).unwrap();
        dataset.recalc_all();
    }

    #[test]
    fn test_update_before_require_gui_fails() {
        let dataset = numeric_dataset(1);
        let mut renderer = ChartRenderer::new(ChartLayout::default());

        assert!(matches!(renderer.update_chart(&dataset), Err(ChartError::GeometryNotInitialized)));
        assert!(matches!(renderer.to_svg(), Err(ChartError::GeometryNotInitialized)));
    }

    #[test]
    fn test_require_gui_is_idempotent() {
        let mut dataset = numeric_dataset(2);
        feed(&mut dataset, 0.0, &[1.0, 0.5]);
        feed(&mut dataset, 1.0, &[2.0, 1.5]);

        let mut renderer = ChartRenderer::new(ChartLayout::default());
        assert!(renderer.require_gui("#kfs", &dataset));
        let once = renderer.to_svg().unwrap();

        assert!(!renderer.require_gui("#kfs", &dataset));
        let twice = renderer.to_svg().unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice.matches(r#"class="pts""#).count(), 2);
        assert_eq!(twice.matches(r#"id="x_axis""#).count(), 1);
        assert!(twice.contains(r#"id="pts-0""#) && twice.contains(r#"id="pts-1""#));
    }

    #[test]
    fn test_scales_map_onto_padded_area() {
        let mut dataset = numeric_dataset(1);
        feed(&mut dataset, 0.0, &[0.0]);
        feed(&mut dataset, 10.0, &[1.0]);

        let mut renderer = ChartRenderer::new(ChartLayout::new(500.0, 250.0, 50.0));
        renderer.require_gui("#uls", &dataset);
        let (x, y) = renderer.scales().unwrap();

        assert_relative_eq!(x.apply(&Value::Real(0.0)), 50.0);
        assert_relative_eq!(x.apply(&Value::Real(10.0)), 450.0);
        assert_relative_eq!(y.apply(&Value::Real(0.0)), 200.0);
        assert_relative_eq!(y.apply(&Value::Real(1.0)), 50.0);

        let paths = renderer.paths().unwrap();
        assert_eq!(paths[0].d, "M50.000,200.000L450.000,50.000");
    }

    #[test]
    fn test_update_rebinds_scales_in_place() {
        let mut dataset = numeric_dataset(1);
        feed(&mut dataset, 0.0, &[0.0]);
        feed(&mut dataset, 10.0, &[1.0]);

        let mut renderer = ChartRenderer::new(ChartLayout::default());
        renderer.require_gui("#uls", &dataset);

        feed(&mut dataset, 20.0, &[3.0]);
        renderer.update_chart(&dataset).unwrap();

        let (x, y) = renderer.scales().unwrap();
        assert_eq!(x.domain(), dataset.x_range());
        assert_eq!(y.domain(), dataset.y_range());
        assert_eq!(x.range(), ChartLayout::default().x_pixels());

        let d = &renderer.paths().unwrap()[0].d;
        assert_eq!(d.matches('L').count(), 2);
        assert!(d.ends_with("L450.000,50.000"));
    }

    #[test]
    fn test_series_count_mismatch() {
        let one = numeric_dataset(1);
        let two = numeric_dataset(2);

        let mut renderer = ChartRenderer::new(ChartLayout::default());
        renderer.require_gui("#uls", &one);
        assert!(matches!(
            renderer.update_chart(&two),
            Err(ChartError::SeriesCountMismatch { expected: 1, actual: 2 })
        ));
    }

    #[test]
    fn test_non_finite_points_break_the_line() {
        let mut dataset = numeric_dataset(1);
        feed(&mut dataset, 0.0, &[0.0]);
        feed(&mut dataset, 10.0, &[1.0]);

        let mut renderer = ChartRenderer::new(ChartLayout::default());
        renderer.require_gui("#uls", &dataset);

        dataset
            .update(&Event::new(
                [
                    ("t".to_string(), WireValue::Number(5.0)),
                    ("y".to_string(), WireValue::List(vec![WireValue::Number(f64::NAN)])),
                ]
                .into_iter()
                .collect(),
            ))
            .unwrap();
        feed(&mut dataset, 20.0, &[1.0]);
        renderer.update_chart(&dataset).unwrap();

        let d = &renderer.paths().unwrap()[0].d;
        assert_eq!(d.matches('M').count(), 2);
        assert_eq!(d.matches('L').count(), 1);
    }

    #[test]
    fn test_strokes_by_series_index() {
        let dataset = numeric_dataset(2);
        let mut renderer = ChartRenderer::new(ChartLayout::default()).with_strokes(vec!["steelblue".into()]);
        renderer.require_gui("#kfs", &dataset);

        let paths = renderer.paths().unwrap();
        assert_eq!(paths[0].stroke, "steelblue");
        assert_eq!(paths[1].stroke, "black");
    }
}
