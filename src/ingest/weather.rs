/// Hourly weather time-series client (Open-Meteo archive and forecast APIs).
///
/// Handles URL construction and JSON response parsing for:
///   https://archive-api.open-meteo.com/v1/archive   (past windows)
///   https://api.open-meteo.com/v1/forecast          (rolling forecast)
///
/// Both endpoints return the same envelope: an `hourly` object of
/// parallel arrays keyed by variable name, with `null` for missing hours.
/// See `fixtures.rs` for annotated examples.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::time::Duration;

use crate::config::WeatherConfig;
use crate::model::FetchError;

// ---------------------------------------------------------------------------
// Serde structures for the hourly envelope
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct HourlyResponse {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    reason: Option<String>,
    hourly: Option<HourlyArrays>,
}

#[derive(Deserialize)]
struct HourlyArrays {
    time: Vec<String>,
    #[serde(default)]
    rain: Option<Vec<Option<f64>>>,
    #[serde(default)]
    precipitation_probability: Option<Vec<Option<f64>>>,
}

// ---------------------------------------------------------------------------
// Parsed series
// ---------------------------------------------------------------------------

/// One hourly series: parallel arrays with one entry per hour.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HourlySeries {
    pub times: Vec<NaiveDateTime>,
    /// Rain (mm) per hour; `None` where the provider had no value.
    pub rain: Vec<Option<f64>>,
    /// Precipitation probability (%) per hour. Empty when not requested.
    pub probability: Vec<Option<f64>>,
}

impl HourlySeries {
    /// True when there is no hour carrying a rain value.
    pub fn is_empty(&self) -> bool {
        self.rain.iter().all(|r| r.is_none())
    }

    pub fn hours(&self) -> usize {
        self.times.len()
    }

    pub fn total_rain(&self) -> f64 {
        self.rain.iter().flatten().sum()
    }

    pub fn peak_rain(&self) -> Option<f64> {
        max_present(&self.rain)
    }

    pub fn peak_probability(&self) -> Option<f64> {
        max_present(&self.probability)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.times.first().map(|t| t.date())
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.times.last().map(|t| t.date())
    }
}

fn max_present(values: &[Option<f64>]) -> Option<f64> {
    values.iter().flatten().copied().fold(None, |acc, v| match acc {
        Some(m) if m >= v => Some(m),
        _ => Some(v),
    })
}

// ---------------------------------------------------------------------------
// Query and client trait
// ---------------------------------------------------------------------------

/// Time window for an hourly series request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeriesWindow {
    /// Archived observations, both dates inclusive.
    Archive { start: NaiveDate, end: NaiveDate },
    /// Forecast starting today, `days` days long.
    Forecast { days: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub window: SeriesWindow,
}

/// Source of hourly precipitation series.
pub trait WeatherClient: Send + Sync {
    fn hourly_series(&self, query: &WeatherQuery) -> Result<HourlySeries, FetchError>;
}

// ---------------------------------------------------------------------------
// URL construction
// ---------------------------------------------------------------------------

/// Builds an archive URL requesting hourly rain for `[start, end]`.
pub fn build_archive_url(base: &str, latitude: f64, longitude: f64, start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "{}?latitude={}&longitude={}&start_date={}&end_date={}&hourly=rain",
        base,
        latitude,
        longitude,
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
    )
}

/// Builds a forecast URL requesting hourly rain and precipitation
/// probability for the next `days` days.
pub fn build_forecast_url(base: &str, latitude: f64, longitude: f64, days: u32) -> String {
    format!(
        "{}?latitude={}&longitude={}&hourly=rain,precipitation_probability&forecast_days={}",
        base, latitude, longitude, days
    )
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Parses an hourly response body into a `HourlySeries`.
///
/// # Errors
/// - `FetchError::Transport` - provider answered with an error envelope.
/// - `FetchError::Parse` - malformed JSON, bad timestamps, or arrays whose
///   lengths disagree with `time`.
/// - `FetchError::NoData` - the `time` array is empty.
pub fn parse_hourly_response(json: &str) -> Result<HourlySeries, FetchError> {
    let response: HourlyResponse = serde_json::from_str(json)
        .map_err(|e| FetchError::Parse(format!("JSON deserialization failed: {}", e)))?;

    if response.error {
        return Err(FetchError::Transport(format!(
            "weather provider rejected request: {}",
            response.reason.unwrap_or_else(|| "no reason given".to_string())
        )));
    }

    let hourly = response
        .hourly
        .ok_or_else(|| FetchError::Parse("Missing hourly object".to_string()))?;

    if hourly.time.is_empty() {
        return Err(FetchError::NoData("Hourly series is empty".to_string()));
    }

    let times = hourly
        .time
        .iter()
        .map(|t| {
            NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M")
                .map_err(|e| FetchError::Parse(format!("Failed to parse time '{}': {}", t, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let rain = hourly.rain.unwrap_or_default();
    if rain.len() != times.len() {
        return Err(FetchError::Parse(format!(
            "rain has {} entries but time has {}",
            rain.len(),
            times.len()
        )));
    }

    let probability = hourly.precipitation_probability.unwrap_or_default();
    if !probability.is_empty() && probability.len() != times.len() {
        return Err(FetchError::Parse(format!(
            "precipitation_probability has {} entries but time has {}",
            probability.len(),
            times.len()
        )));
    }

    Ok(HourlySeries {
        times,
        rain,
        probability,
    })
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// Blocking Open-Meteo client.
pub struct OpenMeteoClient {
    http: reqwest::blocking::Client,
    config: WeatherConfig,
}

impl OpenMeteoClient {
    pub fn new(config: WeatherConfig) -> Result<Self, FetchError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("slidemon_service/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    fn url_for(&self, query: &WeatherQuery) -> String {
        match query.window {
            SeriesWindow::Archive { start, end } => {
                build_archive_url(&self.config.archive_url, query.latitude, query.longitude, start, end)
            }
            SeriesWindow::Forecast { days } => {
                build_forecast_url(&self.config.forecast_url, query.latitude, query.longitude, days)
            }
        }
    }
}

impl WeatherClient for OpenMeteoClient {
    fn hourly_series(&self, query: &WeatherQuery) -> Result<HourlySeries, FetchError> {
        let url = self.url_for(query);
        tracing::debug!(%url, "fetching hourly series");

        let response = self.http.get(&url).header("Accept", "application/json").send()?;
        let status = response.status();
        let body = response.text()?;

        // Error envelopes carry a reason; surface it before the status code.
        if !status.is_success() {
            return match parse_hourly_response(&body) {
                Err(FetchError::Transport(reason)) => Err(FetchError::Transport(reason)),
                _ => Err(FetchError::Transport(format!("weather API error: {}", status))),
            };
        }

        parse_hourly_response(&body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
