/// Precipitation adapter.
///
/// Historical mode sums archived hourly rain over the configured window
/// ending at the target date; `peak` is the wettest hour (mm/h).
/// Forecast mode sums the rolling forecast horizon; `peak` is the highest
/// hourly precipitation probability (%).
///
/// A forecast that carries probabilities but no rain amounts is still
/// usable: it reports a 0 mm total with the probability as `peak`, so the
/// storm rule can fire while the heavy-rain rule cannot.

use std::sync::Arc;
use std::time::Instant;

use super::{absorb, SourceAdapter};
use crate::config::{days_before, WeatherConfig};
use crate::ingest::weather::{SeriesWindow, WeatherClient, WeatherQuery};
use crate::model::{AssessmentMode, AssessmentRequest, FetchError, SignalSample, SourceKind};

pub struct PrecipitationAdapter {
    client: Arc<dyn WeatherClient>,
    config: WeatherConfig,
}

impl PrecipitationAdapter {
    pub fn new(client: Arc<dyn WeatherClient>, config: WeatherConfig) -> Self {
        Self { client, config }
    }

    fn query_for(&self, request: &AssessmentRequest) -> Result<WeatherQuery, FetchError> {
        let window = match request.mode {
            AssessmentMode::Historical => SeriesWindow::Archive {
                start: days_before(request.reference_date, self.config.historical_window_days).ok_or_else(|| {
                    FetchError::Parse(format!(
                        "Archive window before {} falls outside the calendar",
                        request.reference_date
                    ))
                })?,
                end: request.reference_date,
            },
            AssessmentMode::Forecast => SeriesWindow::Forecast {
                days: self.config.forecast_days,
            },
        };

        Ok(WeatherQuery {
            latitude: request.latitude,
            longitude: request.longitude,
            window,
        })
    }

    fn collect(&self, request: &AssessmentRequest) -> Result<SignalSample, FetchError> {
        let query = self.query_for(request)?;
        let series = self.client.hourly_series(&query)?;

        let probability_only = request.mode == AssessmentMode::Forecast && series.peak_probability().is_some();
        if series.is_empty() && !probability_only {
            return Err(FetchError::NoData(format!(
                "No hourly rain values in {} hours returned",
                series.hours()
            )));
        }

        let total = series.total_rain();

        let sample = match request.mode {
            AssessmentMode::Historical => {
                let peak = series.peak_rain().unwrap_or(0.0);
                let sample = SignalSample::ok(
                    total,
                    series.last_date(),
                    format!(
                        "{}-day archive: {:.1} mm over {} hours, peak {:.1} mm/h",
                        self.config.historical_window_days,
                        total,
                        series.hours(),
                        peak
                    ),
                );
                sample.with_peak(peak)
            }
            AssessmentMode::Forecast => {
                let horizon_hours = self.config.forecast_days * 24;
                match series.peak_probability() {
                    Some(probability) if series.is_empty() => SignalSample::ok(
                        total,
                        series.first_date(),
                        format!(
                            "{}h forecast: rain amounts unavailable, peak probability {:.0}%",
                            horizon_hours, probability
                        ),
                    )
                    .with_peak(probability),
                    Some(probability) => SignalSample::ok(
                        total,
                        series.first_date(),
                        format!(
                            "{}h forecast: {:.1} mm expected, peak probability {:.0}%",
                            horizon_hours, total, probability
                        ),
                    )
                    .with_peak(probability),
                    None => SignalSample::ok(
                        total,
                        series.first_date(),
                        format!("{}h forecast: {:.1} mm expected, probability unavailable", horizon_hours, total),
                    ),
                }
            }
        };

        Ok(sample)
    }
}

impl SourceAdapter for PrecipitationAdapter {
    fn source(&self) -> SourceKind {
        SourceKind::Precipitation
    }

    fn fetch(&self, request: &AssessmentRequest) -> SignalSample {
        let started = Instant::now();
        absorb(self.source(), started, self.collect(request))
    }
}
