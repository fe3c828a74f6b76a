/// Satellite imagery query client.
///
/// Radar backscatter and soil-moisture rasters are both served by one
/// imagery gateway that understands a small JSON query language:
///
/// - a `CollectionQuery` selects acquisitions from a collection by region,
///   date range, property filters and band;
/// - `POST /collections/{id}/acquisitions` lists the acquisition dates the
///   query matches;
/// - `POST /reduce` reduces an image expression (a latest/mean composite,
///   or the absolute difference of two composites) to its area mean over a
///   region at a given scale.
///
/// Every gateway call runs inside a session opened by
/// `HttpImageryService::connect`. Failing to open the session is the one
/// fatal condition for the whole pipeline and is reported before any
/// assessment starts.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

use crate::config::{DateRange, ImageryConfig};
use crate::model::FetchError;

// ---------------------------------------------------------------------------
// Query language
// ---------------------------------------------------------------------------

/// Geometry an image is filtered by and reduced over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Region {
    Point { latitude: f64, longitude: f64 },
    /// Disc of `radius_m` metres around a point.
    Buffer { latitude: f64, longitude: f64, radius_m: f64 },
}

/// Metadata filter on acquisitions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PropertyFilter {
    /// List-valued property must contain `value`.
    ListContains { property: String, value: String },
    Equals { property: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionQuery {
    pub collection: String,
    pub region: Region,
    pub range: DateRange,
    pub filters: Vec<PropertyFilter>,
    pub band: String,
}

/// Single image built from a collection query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reducer", content = "query", rename_all = "snake_case")]
pub enum Composite {
    /// Most recent acquisition.
    Latest(CollectionQuery),
    /// Per-pixel mean of all acquisitions.
    Mean(CollectionQuery),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageExpr {
    Composite { composite: Composite },
    /// Per-pixel `|a - b|`.
    AbsDifference { a: Composite, b: Composite },
}

/// Area-mean reduction request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reduction {
    pub image: ImageExpr,
    pub region: Region,
    pub scale_m: f64,
    pub max_pixels: u64,
}

/// Imagery archive capable of listing acquisitions and reducing images.
pub trait ImageryService: Send + Sync {
    /// Acquisition dates matched by `query`, in any order.
    fn acquisitions(&self, query: &CollectionQuery) -> Result<Vec<NaiveDate>, FetchError>;

    /// Mean of the reduced band over the region. `None` when every pixel
    /// in the region is masked.
    fn reduce_mean(&self, reduction: &Reduction) -> Result<Option<f64>, FetchError>;
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct AcquisitionsResponse {
    acquisitions: Vec<String>,
}

#[derive(Deserialize)]
struct ReduceResponse {
    mean: Option<f64>,
}

#[derive(Deserialize)]
struct SessionResponse {
    session: String,
}

/// Parses an acquisitions listing (`{"acquisitions": ["YYYY-MM-DD", ...]}`).
pub fn parse_acquisitions(json: &str) -> Result<Vec<NaiveDate>, FetchError> {
    let response: AcquisitionsResponse = serde_json::from_str(json)
        .map_err(|e| FetchError::Parse(format!("JSON deserialization failed: {}", e)))?;

    response
        .acquisitions
        .iter()
        .map(|d| {
            // Gateways may return full timestamps; the date prefix is enough.
            let day = d.get(..10).unwrap_or(d);
            NaiveDate::parse_from_str(day, "%Y-%m-%d")
                .map_err(|e| FetchError::Parse(format!("Failed to parse acquisition date '{}': {}", d, e)))
        })
        .collect()
}

/// Parses a reduction result (`{"mean": 1.23}` or `{"mean": null}`).
pub fn parse_reduction(json: &str) -> Result<Option<f64>, FetchError> {
    let response: ReduceResponse = serde_json::from_str(json)
        .map_err(|e| FetchError::Parse(format!("JSON deserialization failed: {}", e)))?;

    match response.mean {
        Some(v) if !v.is_finite() => Err(FetchError::Parse(format!("non-finite reduction result {}", v))),
        other => Ok(other),
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Failure to establish the imagery session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("imagery API token not set; export {0} or add it to .env")]
    MissingToken(String),

    #[error("invalid imagery gateway URL '{0}'")]
    InvalidBaseUrl(String),

    #[error("cannot reach imagery gateway: {0}")]
    Connect(#[from] reqwest::Error),

    #[error("imagery gateway refused session ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("unexpected session response: {0}")]
    BadResponse(String),
}

/// Blocking HTTP client for the imagery gateway, bound to one session.
pub struct HttpImageryService {
    http: reqwest::blocking::Client,
    base_url: String,
    token: String,
    session: String,
}

impl HttpImageryService {
    /// Opens a session with the gateway described by `config`.
    pub fn connect(config: &ImageryConfig) -> Result<Self, SessionError> {
        dotenv::dotenv().ok();

        let token = env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| SessionError::MissingToken(config.token_env.clone()))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(SessionError::InvalidBaseUrl(config.base_url.clone()));
        }

        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let response = http
            .post(format!("{}/session", base_url))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "project": config.project }))
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(SessionError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let session: SessionResponse =
            serde_json::from_str(&body).map_err(|e| SessionError::BadResponse(e.to_string()))?;

        tracing::info!(gateway = %base_url, "imagery session established");

        Ok(Self {
            http,
            base_url,
            token,
            session: session.session,
        })
    }

    fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<String, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "imagery query");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .header("X-Imagery-Session", &self.session)
            .json(body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(FetchError::Transport(format!("imagery gateway error {}: {}", status, text)));
        }
        Ok(text)
    }
}

impl ImageryService for HttpImageryService {
    fn acquisitions(&self, query: &CollectionQuery) -> Result<Vec<NaiveDate>, FetchError> {
        let path = format!("/collections/{}/acquisitions", urlencoding::encode(&query.collection));
        let body = self.post_json(&path, query)?;
        parse_acquisitions(&body)
    }

    fn reduce_mean(&self, reduction: &Reduction) -> Result<Option<f64>, FetchError> {
        let body = self.post_json("/reduce", reduction)?;
        parse_reduction(&body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
