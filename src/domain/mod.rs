// Domain layer - Aggregation engine and its value model
pub mod dataset;
pub mod error;
pub mod event;
pub mod scale;
pub mod series;
pub mod value_type;
