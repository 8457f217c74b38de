// Dataset - several series fed from the same event stream
use crate::domain::error::{ChartError, ChartResult};
use crate::domain::event::Event;
use crate::domain::scale::Scale;
use crate::domain::series::{Extent, SeriesAccumulator, SeriesTrait};
use crate::domain::value_type::Span;

/// Fixed, ordered set of series plus the union of their ranges.
#[derive(Debug, Clone)]
pub struct Dataset {
    series: Vec<SeriesAccumulator>,
    outer: Extent,
}

impl Dataset {
    pub fn new(traits: Vec<SeriesTrait>) -> ChartResult<Self> {
        let series: Vec<SeriesAccumulator> = traits.into_iter().map(SeriesAccumulator::new).collect();
        let first = series.first().ok_or(ChartError::NoSeries)?;
        let outer = first.range();

        let mut dataset = Self { series, outer };
        dataset.recalc_outer();
        Ok(dataset)
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    pub fn series(&self, index: usize) -> ChartResult<&SeriesAccumulator> {
        self.series.get(index).ok_or(ChartError::IndexOutOfRange {
            index,
            len: self.series.len(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &SeriesAccumulator> {
        self.series.iter()
    }

    /// Offer `event` to every series. Returns how many of them stored a new
    /// point. If any series cannot read the event, none of them store it.
    pub fn update(&mut self, event: &Event) -> ChartResult<usize> {
        let pending = self
            .series
            .iter()
            .map(|series| series.prepare(event))
            .collect::<ChartResult<Vec<_>>>()?;

        let mut added = 0;
        for (series, point) in self.series.iter_mut().zip(pending) {
            if let Some(point) = point {
                series.commit(point);
                added += 1;
            }
        }
        Ok(added)
    }

    /// Refresh every member range, then the union across members.
    pub fn recalc_all(&mut self) {
        for series in &mut self.series {
            series.recalc_range();
        }
        self.recalc_outer();
    }

    fn recalc_outer(&mut self) {
        let mut ranges = self.series.iter().map(SeriesAccumulator::range);
        if let Some(seed) = ranges.next() {
            self.outer = ranges.fold(seed, Extent::outer);
        }
    }

    pub fn x_range(&self) -> Span {
        self.outer.x
    }

    pub fn y_range(&self) -> Span {
        self.outer.y
    }

    pub fn total_points(&self) -> usize {
        self.series.iter().map(SeriesAccumulator::len).sum()
    }

    /// Series 0's x value type builds the scale for the whole dataset.
    pub fn make_x_scale(&self, pixels: (f64, f64)) -> Scale {
        self.series[0].series_trait().x_type().make_scale(self.x_range(), pixels)
    }

    pub fn make_y_scale(&self, pixels: (f64, f64)) -> Scale {
        self.series[0].series_trait().y_type().make_scale(self.y_range(), pixels)
    }
}
