// HTTP request handlers
use crate::application::stream_controller::ControllerState;
use crate::infrastructure::http_response::{accepts_brotli, svg_response};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct ChartSummary {
    pub id: String,
    pub title: String,
    pub stream: String,
    pub state: ControllerState,
    pub points: usize,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// List configured charts and where each one stands
pub async fn list_charts(State(state): State<Arc<AppState>>) -> Json<Vec<ChartSummary>> {
    let charts = state
        .charts
        .iter()
        .map(|c| {
            let view = c.view.borrow();
            ChartSummary {
                id: c.id.clone(),
                title: c.title.clone(),
                stream: c.stream.clone(),
                state: view.state,
                points: view.points,
            }
        })
        .collect();
    Json(charts)
}

/// Latest rendered SVG for one chart
pub async fn chart_svg(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let Some(chart) = state.chart(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    // clone out of the watch guard before awaiting
    let svg = chart.view.borrow().svg.clone();
    let Some(svg) = svg else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    match svg_response(&svg, accepts_brotli(&headers)).await {
        Ok(response) => response.into_response(),
        Err(status) => status.into_response(),
    }
}

/// Ask for a fresh snapshot of one chart
pub async fn refresh_chart(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> StatusCode {
    if state.chart(&id).is_none() {
        return StatusCode::NOT_FOUND;
    }
    match state.refresh.send(id).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(e) => {
            tracing::error!("Refresh request dropped: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
