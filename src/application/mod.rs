// Application layer - Rendering, orchestration and collaborator seams
pub mod chart_renderer;
pub mod snapshot_source;
pub mod stream_controller;
pub mod viewer;
