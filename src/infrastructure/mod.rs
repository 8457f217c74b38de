// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod http_response;
pub mod http_snapshot;
pub mod push_channel;
pub mod wire;
