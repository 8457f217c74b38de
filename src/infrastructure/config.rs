use crate::domain::error::ChartResult;
use anyhow::Context;
use crate::domain::series::{Extractor, FieldPath, SeriesTrait, SigmaBand};
use crate::domain::value_type::ValueTypeRegistry;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct ViewerConfig {
    #[serde(default)]
    pub server: ServerSettings,
    pub feed: FeedSettings,
    #[serde(default)]
    pub charts: Vec<ChartConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedSettings {
    pub base_url: String,
    pub ws_url: Option<String>,
    #[serde(default = "default_ws_protocol")]
    pub ws_protocol: String,
}

impl FeedSettings {
    /// Explicit `ws_url`, or one derived from the base URL's host.
    pub fn websocket_url(&self) -> String {
        self.ws_url
            .clone()
            .unwrap_or_else(|| websocket_url_for(&self.base_url))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChartConfig {
    pub id: String,
    pub title: String,
    pub stream: String,
    pub snapshot_path: String,
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
    #[serde(default = "default_padding")]
    pub padding: f64,
    #[serde(default)]
    pub record_kinds: Vec<String>,
    #[serde(default)]
    pub series: Vec<SeriesConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeriesConfig {
    pub name: String,
    pub color: Option<String>,
    pub x: AxisConfig,
    pub y: AxisConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AxisConfig {
    pub path: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub band: Option<BandConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BandConfig {
    pub variance: String,
    pub sigmas: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_ws_protocol() -> String {
    "lws-minimal".to_string()
}

fn default_width() -> f64 {
    500.0
}

fn default_height() -> f64 {
    250.0
}

fn default_padding() -> f64 {
    50.0
}

pub fn load_viewer_config() -> anyhow::Result<ViewerConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/viewer"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

impl AxisConfig {
    fn extractor(&self) -> ChartResult<Extractor> {
        let path = FieldPath::parse(&self.path)?;
        match &self.band {
            None => Ok(Extractor::Path(path)),
            Some(band) => Ok(SigmaBand {
                mean: path,
                variance: FieldPath::parse(&band.variance)?,
                sigmas: band.sigmas,
                min: band.min,
                max: band.max,
            }
            .into_extractor()),
        }
    }
}

impl SeriesConfig {
    pub fn to_trait(&self, registry: &ValueTypeRegistry) -> ChartResult<SeriesTrait> {
        Ok(SeriesTrait::new(
            self.x.extractor()?,
            registry.lookup(&self.x.value_type)?,
            self.y.extractor()?,
            registry.lookup(&self.y.value_type)?,
        ))
    }
}

impl ChartConfig {
    pub fn series_traits(&self, registry: &ValueTypeRegistry) -> anyhow::Result<Vec<SeriesTrait>> {
        self.series
            .iter()
            .map(|s| {
                tracing::debug!("[{}] series {}: x={} y={}", self.id, s.name, s.x.path, s.y.path);
                s.to_trait(registry)
                    .with_context(|| format!("Invalid series [{}] in chart {}", s.name, self.id))
            })
            .collect()
    }

    pub fn strokes(&self) -> Vec<String> {
        self.series
            .iter()
            .map(|s| s.color.clone().unwrap_or_else(|| "black".to_string()))
            .collect()
    }
}

/// `https://host:port/x` becomes `wss://host:port/`, `http://` becomes `ws://`.
pub fn websocket_url_for(base_url: &str) -> String {
    let (scheme, rest) = if let Some(rest) = base_url.strip_prefix("https://") {
        ("wss://", rest)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        ("ws://", rest)
    } else {
        ("ws://", base_url)
    };
    let host = rest.split('/').next().unwrap_or_default();
    format!("{}{}/", scheme, host)
}
