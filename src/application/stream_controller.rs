// Stream controller - merges a one-shot snapshot with the push feed for one chart
use crate::application::chart_renderer::ChartRenderer;
use crate::application::snapshot_source::{SnapshotRequest, SnapshotSource, WireRecord};
use crate::domain::dataset::Dataset;
use crate::domain::error::ChartResult;
use crate::domain::event::Event;
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Idle,
    SnapshotPending,
    Live,
}

/// Latest published state of one chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartView {
    pub state: ControllerState,
    pub points: usize,
    pub svg: Option<Arc<str>>,
}

/// Counts from applying one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub records: usize,
    pub added: usize,
    pub dropped: usize,
    pub failed: usize,
}

pub struct StreamController {
    id: String,
    title: String,
    stream: String,
    snapshot: SnapshotRequest,
    dataset: Dataset,
    renderer: ChartRenderer,
    state: ControllerState,
    renders: u64,
    view: watch::Sender<ChartView>,
}

impl StreamController {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        stream: impl Into<String>,
        snapshot: SnapshotRequest,
        dataset: Dataset,
        renderer: ChartRenderer,
    ) -> Self {
        let (view, _) = watch::channel(ChartView {
            state: ControllerState::Idle,
            points: 0,
            svg: None,
        });
        Self {
            id: id.into(),
            title: title.into(),
            stream: stream.into(),
            snapshot,
            dataset,
            renderer,
            state: ControllerState::Idle,
            renders: 0,
            view,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Number of completed renders.
    pub fn renders(&self) -> u64 {
        self.renders
    }

    pub fn subscribe(&self) -> watch::Receiver<ChartView> {
        self.view.subscribe()
    }

    /// Build the chart under `parent` and publish its first frame.
    pub fn require_gui(&mut self, parent: &str) -> ChartResult<()> {
        if self.renderer.require_gui(parent, &self.dataset) {
            let svg = self.renderer.to_svg()?;
            self.publish(Some(Arc::from(svg)));
        }
        Ok(())
    }

    /// Mark a snapshot as requested and describe what to fetch.
    pub fn begin_snapshot(&mut self) -> SnapshotRequest {
        if self.state == ControllerState::Idle {
            self.state = ControllerState::SnapshotPending;
            self.publish(None);
        }
        tracing::info!("[{}] Requesting snapshot {}", self.id, self.snapshot.path);
        self.snapshot.clone()
    }

    /// Apply a fetched snapshot as one batch: every record, then one range
    /// recompute and one render. A failed fetch leaves the dataset alone.
    pub fn on_snapshot(&mut self, result: anyhow::Result<Vec<WireRecord>>) -> anyhow::Result<SnapshotSummary> {
        let records = match result {
            Ok(records) => records,
            Err(e) => {
                if self.state == ControllerState::SnapshotPending {
                    self.state = ControllerState::Idle;
                    self.publish(None);
                }
                tracing::error!("[{}] Snapshot fetch failed: {:#}", self.id, e);
                return Err(e.context(format!("snapshot for chart {}", self.id)));
            }
        };

        let mut summary = SnapshotSummary {
            records: records.len(),
            ..SnapshotSummary::default()
        };
        for record in records {
            match record {
                WireRecord::Event(event) => match self.dataset.update(&event) {
                    Ok(added) => summary.added += added,
                    Err(e) => {
                        tracing::warn!("[{}] Skipping snapshot record: {}", self.id, e);
                        summary.failed += 1;
                    }
                },
                WireRecord::Unrecognized { kind } => {
                    tracing::warn!("[{}] Unexpected snapshot record kind {:?}", self.id, kind);
                    summary.dropped += 1;
                }
            }
        }

        self.dataset.recalc_all();
        self.state = ControllerState::Live;
        self.render()
            .with_context(|| format!("rendering chart {}", self.id))?;

        tracing::info!(
            "[{}] Snapshot applied: {} records, {} points added, {} dropped, {} failed",
            self.id,
            summary.records,
            summary.added,
            summary.dropped,
            summary.failed
        );
        Ok(summary)
    }

    /// Fetch and apply a snapshot in one go.
    pub async fn request_snapshot(&mut self, source: &dyn SnapshotSource) -> anyhow::Result<SnapshotSummary> {
        let request = self.begin_snapshot();
        let result = source.fetch_snapshot(&request).await;
        self.on_snapshot(result)
    }

    /// Apply one pushed event: update, recompute ranges, render. No batching.
    pub fn on_push_event(&mut self, event: &Event) -> ChartResult<usize> {
        let added = self.dataset.update(event)?;
        self.dataset.recalc_all();
        self.render()?;
        tracing::debug!("[{}] Push event applied, {} new points", self.id, added);
        Ok(added)
    }

    fn render(&mut self) -> ChartResult<()> {
        self.renderer.update_chart(&self.dataset)?;
        let svg = self.renderer.to_svg()?;
        self.renders += 1;
        self.publish(Some(Arc::from(svg)));
        Ok(())
    }

    /// Push the current state to subscribers, keeping the last SVG when
    /// `svg` is `None`.
    fn publish(&self, svg: Option<Arc<str>>) {
        let state = self.state;
        let points = self.dataset.total_points();
        self.view.send_modify(|view| {
            view.state = state;
            view.points = points;
            if svg.is_some() {
                view.svg = svg;
            }
        });
    }
}
