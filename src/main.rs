// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{future::IntoFuture, net::SocketAddr, sync::Arc};
use anyhow::Context;
use futures::{stream::BoxStream, StreamExt};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::chart_renderer::{ChartLayout, ChartRenderer};
use crate::application::snapshot_source::SnapshotRequest;
use crate::application::stream_controller::StreamController;
use crate::application::viewer::Viewer;
use crate::domain::dataset::Dataset;
use crate::domain::event::PushMessage;
use crate::domain::value_type::ValueTypeRegistry;
use crate::infrastructure::config::{load_viewer_config, ChartConfig};
use crate::infrastructure::http_snapshot::HttpSnapshotSource;
use crate::infrastructure::push_channel::connect_push_channel;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{chart_svg, health_check, list_charts, refresh_chart};

fn build_controller(chart: &ChartConfig, registry: &ValueTypeRegistry) -> anyhow::Result<StreamController> {
    let dataset = Dataset::new(chart.series_traits(registry)?)
        .with_context(|| format!("Invalid series for chart {}", chart.id))?;
    let renderer = ChartRenderer::new(ChartLayout::new(chart.width, chart.height, chart.padding))
        .with_strokes(chart.strokes());

    let mut controller = StreamController::new(
        chart.id.clone(),
        chart.title.clone(),
        chart.stream.clone(),
        SnapshotRequest::new(chart.snapshot_path.clone(), chart.record_kinds.clone()),
        dataset,
        renderer,
    );
    controller.require_gui(&format!("#{}", chart.id))?;
    Ok(controller)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_viewer_config()?;
    let registry = ValueTypeRegistry::builtin();

    // One controller per configured chart; absent from config means disabled
    let controllers = config
        .charts
        .iter()
        .map(|chart| build_controller(chart, &registry))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let source = Arc::new(HttpSnapshotSource::new(config.feed.base_url.clone()));
    let viewer = Viewer::new(controllers, source);

    // Create application state
    let state = Arc::new(AppState {
        charts: viewer.handles(),
        refresh: viewer.refresh_sender(),
    });

    // Snapshots and HTTP keep working without the live feed
    let push: BoxStream<'static, anyhow::Result<PushMessage>> = match connect_push_channel(
        &config.feed.websocket_url(),
        &config.feed.ws_protocol,
        &viewer.streams(),
    )
    .await
    {
        Ok(push) => push.boxed(),
        Err(e) => {
            tracing::error!("Push channel unavailable, serving snapshots only: {:#}", e);
            futures::stream::empty().boxed()
        }
    };

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/charts", get(list_charts))
        .route("/charts/:id", get(chart_svg))
        .route("/charts/:id/refresh", post(refresh_chart))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.bind))?;
    tracing::info!("Starting telemetry-viewer on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tokio::select! {
        result = axum::serve(listener, router).into_future() => result?,
        result = viewer.run(push) => result?,
    }

    Ok(())
}
