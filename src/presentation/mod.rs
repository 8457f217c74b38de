// Presentation layer - HTTP surface over the rendered charts
pub mod app_state;
pub mod handlers;
