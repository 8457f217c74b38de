// Snapshot source trait - bulk fetch of the events preceding the live feed
use crate::domain::event::Event;
use async_trait::async_trait;

/// What a controller asks its snapshot source for.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRequest {
    pub path: String,
    /// Record kinds (`_name_`) this chart consumes. Empty accepts all.
    pub record_kinds: Vec<String>,
}

impl SnapshotRequest {
    pub fn new(path: impl Into<String>, record_kinds: Vec<String>) -> Self {
        Self {
            path: path.into(),
            record_kinds,
        }
    }

    pub fn accepts(&self, kind: Option<&str>) -> bool {
        if self.record_kinds.is_empty() {
            return true;
        }
        kind.is_some_and(|k| self.record_kinds.iter().any(|accepted| accepted == k))
    }
}

/// A snapshot record after kind routing.
#[derive(Debug, Clone, PartialEq)]
pub enum WireRecord {
    Event(Event),
    Unrecognized { kind: Option<String> },
}

impl WireRecord {
    /// Route `event` by its record kind against what `request` accepts.
    pub fn route(event: Event, request: &SnapshotRequest) -> Self {
        if request.accepts(event.kind()) {
            WireRecord::Event(event)
        } else {
            WireRecord::Unrecognized {
                kind: event.kind().map(str::to_string),
            }
        }
    }
}

#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch and decode the snapshot described by `request`.
    async fn fetch_snapshot(&self, request: &SnapshotRequest) -> anyhow::Result<Vec<WireRecord>>;
}
