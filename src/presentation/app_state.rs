// Application state for HTTP handlers
use crate::application::viewer::ChartHandle;
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct AppState {
    pub charts: Vec<ChartHandle>,
    pub refresh: mpsc::Sender<String>,
}

impl AppState {
    pub fn chart(&self, id: &str) -> Option<&ChartHandle> {
        self.charts.iter().find(|c| c.id == id)
    }
}
