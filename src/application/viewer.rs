// Viewer - owns every stream controller and drives them from one task
use crate::application::snapshot_source::{SnapshotSource, WireRecord};
use crate::application::stream_controller::{ChartView, StreamController};
use crate::domain::event::PushMessage;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Read-side handle on one chart, for the presentation layer.
#[derive(Debug, Clone)]
pub struct ChartHandle {
    pub id: String,
    pub title: String,
    pub stream: String,
    pub view: watch::Receiver<ChartView>,
}

type SnapshotResult = (usize, anyhow::Result<Vec<WireRecord>>);

pub struct Viewer {
    controllers: Vec<StreamController>,
    source: Arc<dyn SnapshotSource>,
    refresh_tx: mpsc::Sender<String>,
    refresh_rx: mpsc::Receiver<String>,
}

impl Viewer {
    pub fn new(controllers: Vec<StreamController>, source: Arc<dyn SnapshotSource>) -> Self {
        let (refresh_tx, refresh_rx) = mpsc::channel(16);
        Self {
            controllers,
            source,
            refresh_tx,
            refresh_rx,
        }
    }

    /// Stream ids to subscribe to on the push channel.
    pub fn streams(&self) -> Vec<String> {
        self.controllers.iter().map(|c| c.stream().to_string()).collect()
    }

    pub fn handles(&self) -> Vec<ChartHandle> {
        self.controllers
            .iter()
            .map(|c| ChartHandle {
                id: c.id().to_string(),
                title: c.title().to_string(),
                stream: c.stream().to_string(),
                view: c.subscribe(),
            })
            .collect()
    }

    /// Sender accepting chart ids whose snapshot should be fetched again.
    pub fn refresh_sender(&self) -> mpsc::Sender<String> {
        self.refresh_tx.clone()
    }

    pub fn controllers(&self) -> &[StreamController] {
        &self.controllers
    }

    /// Deliver one push message to the controller owning its stream.
    /// Returns whether a controller took it.
    pub fn route(&mut self, msg: PushMessage) -> bool {
        route(&mut self.controllers, msg)
    }

    /// Request every snapshot, then apply snapshot results, refresh requests
    /// and push messages as they come.
    ///
    /// The end of the push channel only stops live updates. The loop returns
    /// once the push channel has ended, every refresh sender is dropped and no
    /// snapshot is in flight.
    pub async fn run<S>(self, push: S) -> anyhow::Result<()>
    where
        S: Stream<Item = anyhow::Result<PushMessage>> + Send,
    {
        let Viewer {
            mut controllers,
            source,
            refresh_tx,
            mut refresh_rx,
        } = self;
        drop(refresh_tx);

        let (snap_tx, mut snap_rx) = mpsc::channel::<SnapshotResult>(controllers.len().max(1));
        let mut in_flight = 0usize;
        for (index, controller) in controllers.iter_mut().enumerate() {
            spawn_snapshot(controller, index, &source, &snap_tx);
            in_flight += 1;
        }

        tokio::pin!(push);
        let mut push_open = true;
        let mut refresh_open = true;
        while push_open || refresh_open || in_flight > 0 {
            tokio::select! {
                Some((index, result)) = snap_rx.recv(), if in_flight > 0 => {
                    in_flight -= 1;
                    let _ = controllers[index].on_snapshot(result);
                }
                id = refresh_rx.recv(), if refresh_open => match id {
                    Some(id) => match controllers.iter().position(|c| c.id() == id) {
                        Some(index) => {
                            spawn_snapshot(&mut controllers[index], index, &source, &snap_tx);
                            in_flight += 1;
                        }
                        None => tracing::warn!("Refresh requested for unknown chart [{}]", id),
                    },
                    None => refresh_open = false,
                },
                msg = push.next(), if push_open => match msg {
                    Some(Ok(msg)) => {
                        route(&mut controllers, msg);
                    }
                    Some(Err(e)) => tracing::warn!("Dropping undecodable push message: {:#}", e),
                    None => {
                        tracing::warn!("Push channel closed, live updates stopped");
                        push_open = false;
                    }
                },
            }
        }

        Ok(())
    }
}

fn route(controllers: &mut [StreamController], msg: PushMessage) -> bool {
    let Some(controller) = controllers.iter_mut().find(|c| c.stream() == msg.stream) else {
        tracing::warn!("Dropping message for unknown stream [{}]", msg.stream);
        return false;
    };
    if let Err(e) = controller.on_push_event(&msg.event) {
        tracing::warn!("[{}] Dropping push event: {}", controller.id(), e);
    }
    true
}

fn spawn_snapshot(
    controller: &mut StreamController,
    index: usize,
    source: &Arc<dyn SnapshotSource>,
    tx: &mpsc::Sender<SnapshotResult>,
) {
    let request = controller.begin_snapshot();
    let source = source.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = source.fetch_snapshot(&request).await;
        let _ = tx.send((index, result)).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::stream_controller::ControllerState;
    use crate::application::chart_renderer::{ChartLayout, ChartRenderer};
    use crate::application::snapshot_source::SnapshotRequest;
    use crate::domain::dataset::Dataset;
    use crate::domain::event::Event;
    use crate::domain::series::{Extractor, SeriesTrait};
    use crate::domain::value_type::ValueTypeRegistry;
    use async_trait::async_trait;

    struct EmptySource;

    #[async_trait]
    impl SnapshotSource for EmptySource {
        async fn fetch_snapshot(&self, _request: &SnapshotRequest) -> anyhow::Result<Vec<WireRecord>> {
            Ok(Vec::new())
        }
    }

    fn controller(id: &str, stream: &str) -> StreamController {
        let registry = ValueTypeRegistry::builtin();
        let dataset = Dataset::new(vec![SeriesTrait::new(
            Extractor::path("tm").unwrap(),
            registry.lookup("timestamp").unwrap(),
            Extractor::path("upx").unwrap(),
            registry.lookup("numeric").unwrap(),
        )])
        .unwrap();
        let mut ctl = StreamController::new(
            id,
            id,
            stream,
            SnapshotRequest::new(format!("/dyn/{}/snap", id), Vec::new()),
            dataset,
            ChartRenderer::new(ChartLayout::default()),
        );
        ctl.require_gui(&format!("#{}", id)).unwrap();
        ctl
    }

    fn push(stream: &str, minute: u32) -> PushMessage {
        let event: Event = serde_json::from_str(&format!(
            r#"{{"tm": "2024-01-01T00:{:02}:00Z", "upx": 0.5}}"#,
            minute
        ))
        .unwrap();
        PushMessage {
            stream: stream.to_string(),
            event,
        }
    }

    #[test]
    fn test_route_by_stream() {
        let mut viewer = Viewer::new(
            vec![controller("uls", "/ws/uls"), controller("kfs", "/ws/kfs")],
            Arc::new(EmptySource),
        );

        assert!(viewer.route(push("/ws/kfs", 0)));
        assert!(!viewer.route(push("/ws/other", 1)));

        assert_eq!(viewer.controllers()[0].dataset().total_points(), 0);
        assert_eq!(viewer.controllers()[1].dataset().total_points(), 1);
        assert_eq!(viewer.streams(), vec!["/ws/uls".to_string(), "/ws/kfs".to_string()]);
    }

    #[tokio::test]
    async fn test_run_until_push_channel_ends() {
        let viewer = Viewer::new(vec![controller("uls", "/ws/uls")], Arc::new(EmptySource));
        let handles = viewer.handles();

        let messages = vec![
            Ok(push("/ws/uls", 0)),
            Err(anyhow::anyhow!("bad frame")),
            Ok(push("/ws/uls", 1)),
            Ok(push("/ws/nope", 2)),
        ];
        viewer.run(futures::stream::iter(messages)).await.unwrap();

        let view = handles[0].view.borrow().clone();
        assert_eq!(view.points, 2);
        assert!(view.svg.is_some());
    }

    struct SlowSource;

    #[async_trait]
    impl SnapshotSource for SlowSource {
        async fn fetch_snapshot(&self, _request: &SnapshotRequest) -> anyhow::Result<Vec<WireRecord>> {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            Ok(vec![WireRecord::Event(push("/ws/uls", 0).event)])
        }
    }

    #[tokio::test]
    async fn test_snapshot_lands_after_push_channel_ends() {
        let viewer = Viewer::new(vec![controller("uls", "/ws/uls")], Arc::new(SlowSource));
        let handles = viewer.handles();

        viewer.run(futures::stream::empty()).await.unwrap();

        let view = handles[0].view.borrow().clone();
        assert_eq!(view.state, ControllerState::Live);
        assert_eq!(view.points, 1);
    }

    #[tokio::test]
    async fn test_refresh_served_after_push_channel_ends() {
        let viewer = Viewer::new(vec![controller("uls", "/ws/uls")], Arc::new(SlowSource));
        let handles = viewer.handles();
        let refresh = viewer.refresh_sender();

        let run = tokio::spawn(viewer.run(futures::stream::empty()));
        refresh.send("uls".to_string()).await.unwrap();
        refresh.send("nope".to_string()).await.unwrap();
        drop(refresh);
        run.await.unwrap().unwrap();

        let view = handles[0].view.borrow().clone();
        assert_eq!(view.state, ControllerState::Live);
        assert_eq!(view.points, 1);
    }
}
