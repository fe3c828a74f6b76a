/// Engine configuration loader - parses slidemon.toml
///
/// Separates provider endpoints, data windows and rule thresholds from
/// code, making it easy to retune a site or point at a different imagery
/// gateway without recompiling the service. Every field has a default, so
/// a missing file (or a file that only overrides one section) is valid.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::AssessmentMode;
use crate::sites::{default_sites, Site};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "slidemon.toml";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Configuration structures
// ---------------------------------------------------------------------------

/// Root configuration structure for TOML parsing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub weather: WeatherConfig,
    pub imagery: ImageryConfig,
    pub radar: RadarConfig,
    pub soil: SoilConfig,
    pub thresholds: RuleThresholds,
    #[serde(rename = "site")]
    pub sites: Vec<Site>,
}

/// Open-Meteo style hourly weather endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub archive_url: String,
    pub forecast_url: String,
    /// Length of the archive window ending at the target date.
    pub historical_window_days: u64,
    /// Forecast horizon; 2 days gives the rolling 48-hour window.
    pub forecast_days: u32,
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            archive_url: "https://archive-api.open-meteo.com/v1/archive".to_string(),
            forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            historical_window_days: 10,
            forecast_days: 2,
            timeout_secs: 30,
        }
    }
}

/// Satellite imagery gateway session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageryConfig {
    pub base_url: String,
    /// Cloud project the gateway bills queries against, if it needs one.
    pub project: Option<String>,
    /// Environment variable holding the API token.
    pub token_env: String,
    pub timeout_secs: u64,
}

impl Default for ImageryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8700/api/v1".to_string(),
            project: None,
            token_env: "IMAGERY_API_TOKEN".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Half-open date range `[start, end)`, matching how imagery archives
/// filter acquisitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

/// Recent/baseline windows for change detection, all expressed in days
/// before the reference date.
///
/// The recent composite is the latest acquisition in
/// `[ref - recent_lookback_days, ref]`; the baseline is the mean of
/// acquisitions in `[ref - baseline_start_days, ref - baseline_end_days)`.
/// The gap between the two keeps the most recent passes out of the
/// baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneWindow {
    pub recent_lookback_days: u64,
    pub baseline_start_days: u64,
    pub baseline_end_days: u64,
    /// Recent composites older than this are reported STALE.
    pub stale_after_days: Option<i64>,
}

impl SceneWindow {
    /// `[reference - recent_lookback_days, reference]`. `None` when the
    /// window leaves the calendar chrono can represent.
    pub fn recent_range(&self, reference: NaiveDate) -> Option<DateRange> {
        Some(DateRange {
            start: days_before(reference, self.recent_lookback_days)?,
            end: reference.checked_add_days(Days::new(1))?,
        })
    }

    pub fn baseline_range(&self, reference: NaiveDate) -> Option<DateRange> {
        Some(DateRange {
            start: days_before(reference, self.baseline_start_days)?,
            end: days_before(reference, self.baseline_end_days)?,
        })
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.recent_lookback_days == 0 {
            return Err(ConfigError::Invalid(format!("{}: recent_lookback_days must be > 0", name)));
        }
        check_day_count(&format!("{}.recent_lookback_days", name), self.recent_lookback_days)?;
        check_day_count(&format!("{}.baseline_start_days", name), self.baseline_start_days)?;
        if self.baseline_start_days <= self.baseline_end_days {
            return Err(ConfigError::Invalid(format!(
                "{}: baseline_start_days ({}) must exceed baseline_end_days ({})",
                name, self.baseline_start_days, self.baseline_end_days
            )));
        }
        if self.baseline_end_days == 0 {
            return Err(ConfigError::Invalid(format!(
                "{}: baseline_end_days must be > 0 so the baseline excludes the reference date",
                name
            )));
        }
        // Recent window starts `recent_lookback_days` back; the baseline must end by then.
        if self.baseline_end_days < self.recent_lookback_days {
            return Err(ConfigError::Invalid(format!(
                "{}: baseline_end_days ({}) must be >= recent_lookback_days ({}) so the windows do not overlap",
                name, self.baseline_end_days, self.recent_lookback_days
            )));
        }
        if matches!(self.stale_after_days, Some(days) if days < 0) {
            return Err(ConfigError::Invalid(format!("{}: stale_after_days must not be negative", name)));
        }
        Ok(())
    }
}

/// Synthetic-aperture radar change detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarConfig {
    pub collection: String,
    pub band: String,
    /// Required entry in `transmitterReceiverPolarisation`.
    pub polarization: String,
    pub instrument_mode: String,
    /// Radius of the region of interest around the site.
    pub buffer_m: f64,
    pub scale_m: f64,
    pub historical: SceneWindow,
    pub forecast: SceneWindow,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            collection: "COPERNICUS/S1_GRD".to_string(),
            band: "VV".to_string(),
            polarization: "VV".to_string(),
            instrument_mode: "IW".to_string(),
            buffer_m: 500.0,
            scale_m: 10.0,
            historical: SceneWindow {
                recent_lookback_days: 12,
                baseline_start_days: 30,
                baseline_end_days: 13,
                stale_after_days: None,
            },
            forecast: SceneWindow {
                recent_lookback_days: 12,
                baseline_start_days: 90,
                baseline_end_days: 15,
                stale_after_days: Some(10),
            },
        }
    }
}

impl RadarConfig {
    pub fn window(&self, mode: AssessmentMode) -> &SceneWindow {
        match mode {
            AssessmentMode::Historical => &self.historical,
            AssessmentMode::Forecast => &self.forecast,
        }
    }
}

/// Daily soil-moisture product settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoilConfig {
    pub collection: String,
    pub band: String,
    /// Trailing window `[ref - window_days, ref)`.
    pub window_days: u64,
    pub scale_m: f64,
}

impl Default for SoilConfig {
    fn default() -> Self {
        Self {
            collection: "NASA/SMAP/SPL3SMP_E/006".to_string(),
            band: "soil_moisture_am".to_string(),
            window_days: 3,
            scale_m: 9000.0,
        }
    }
}

impl SoilConfig {
    pub fn window(&self, reference: NaiveDate) -> Option<DateRange> {
        Some(DateRange {
            start: days_before(reference, self.window_days)?,
            end: reference,
        })
    }
}

/// Rule thresholds. Every comparison against these is strict `>`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleThresholds {
    /// Radar change score.
    pub ground_shift: f64,
    /// Volumetric soil moisture (0-1).
    pub soil_saturation: f64,
    /// Archive window rainfall total (mm).
    pub extreme_rainfall_mm: f64,
    /// 48-hour forecast rainfall total (mm).
    pub heavy_rain_forecast_mm: f64,
    /// Peak hourly precipitation probability (%).
    pub storm_probability_pct: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            ground_shift: 2.0,
            soil_saturation: 0.4,
            extreme_rainfall_mm: 200.0,
            heavy_rain_forecast_mm: 80.0,
            storm_probability_pct: 90.0,
        }
    }
}

impl RuleThresholds {
    fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("ground_shift", self.ground_shift),
            ("soil_saturation", self.soil_saturation),
            ("extreme_rainfall_mm", self.extreme_rainfall_mm),
            ("heavy_rain_forecast_mm", self.heavy_rain_forecast_mm),
            ("storm_probability_pct", self.storm_probability_pct),
        ];
        for (name, value) in named {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!("thresholds.{} must be positive, got {}", name, value)));
            }
        }
        Ok(())
    }
}

impl Config {
    /// Sites from the file, or the built-in registry when none are listed.
    pub fn sites(&self) -> Vec<Site> {
        if self.sites.is_empty() {
            default_sites()
        } else {
            self.sites.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;
        self.radar.historical.validate("radar.historical")?;
        self.radar.forecast.validate("radar.forecast")?;

        check_day_count("soil.window_days", self.soil.window_days)?;
        check_day_count("weather.historical_window_days", self.weather.historical_window_days)?;
        if self.soil.window_days == 0 {
            return Err(ConfigError::Invalid("soil.window_days must be > 0".to_string()));
        }
        if self.weather.historical_window_days == 0 {
            return Err(ConfigError::Invalid("weather.historical_window_days must be > 0".to_string()));
        }
        if !(1..=16).contains(&self.weather.forecast_days) {
            return Err(ConfigError::Invalid(format!(
                "weather.forecast_days must be between 1 and 16, got {}",
                self.weather.forecast_days
            )));
        }
        if self.radar.buffer_m <= 0.0 || self.radar.scale_m <= 0.0 || self.soil.scale_m <= 0.0 {
            return Err(ConfigError::Invalid("buffer and scale values must be positive".to_string()));
        }
        Ok(())
    }
}

/// Upper bound for any day-count setting (ten years).
pub const MAX_WINDOW_DAYS: u64 = 3660;

fn check_day_count(name: &str, days: u64) -> Result<(), ConfigError> {
    if days > MAX_WINDOW_DAYS {
        return Err(ConfigError::Invalid(format!(
            "{} must be at most {} days, got {}",
            name, MAX_WINDOW_DAYS, days
        )));
    }
    Ok(())
}

pub fn days_before(reference: NaiveDate, days: u64) -> Option<NaiveDate> {
    reference.checked_sub_days(Days::new(days))
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parses and validates configuration from a TOML string.
pub fn parse_config(contents: &str, path: &Path) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads configuration from `path`. The file must exist.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents, path)
}

/// Loads `slidemon.toml` from the working directory, falling back to
/// built-in defaults when the file is absent.
pub fn load_config() -> Result<Config, ConfigError> {
    let path = Path::new(DEFAULT_CONFIG_PATH);
    if !path.exists() {
        tracing::info!("{} not found, using built-in defaults", DEFAULT_CONFIG_PATH);
        return Ok(Config::default());
    }
    load_config_from(path)
}
