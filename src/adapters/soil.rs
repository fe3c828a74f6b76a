/// Soil moisture adapter.
///
/// Averages the daily morning-pass soil-moisture product over a short
/// trailing window and reduces it to the value at the site. Volumetric
/// water content (cm3/cm3); above ~0.4 most hillslope soils are close to
/// saturation.

use std::sync::Arc;
use std::time::Instant;

use super::{absorb, SourceAdapter};
use crate::config::SoilConfig;
use crate::ingest::imagery::{CollectionQuery, Composite, ImageExpr, ImageryService, Reduction, Region};
use crate::model::{AssessmentRequest, FetchError, SignalSample, SourceKind};

pub struct SoilMoistureAdapter {
    imagery: Arc<dyn ImageryService>,
    config: SoilConfig,
}

impl SoilMoistureAdapter {
    pub fn new(imagery: Arc<dyn ImageryService>, config: SoilConfig) -> Self {
        Self { imagery, config }
    }

    fn collect(&self, request: &AssessmentRequest) -> Result<SignalSample, FetchError> {
        let region = Region::Point {
            latitude: request.latitude,
            longitude: request.longitude,
        };
        let range = self.config.window(request.reference_date).ok_or_else(|| {
            FetchError::Parse(format!("Soil window before {} falls outside the calendar", request.reference_date))
        })?;

        let query = CollectionQuery {
            collection: self.config.collection.clone(),
            region,
            range,
            filters: Vec::new(),
            band: self.config.band.clone(),
        };

        let passes = self.imagery.acquisitions(&query)?;
        let latest = passes.iter().max().copied().ok_or_else(|| {
            FetchError::NoData(format!("No soil moisture passes between {} and {}", range.start, range.end))
        })?;

        let reduction = Reduction {
            image: ImageExpr::Composite {
                composite: Composite::Mean(query),
            },
            region,
            scale_m: self.config.scale_m,
            max_pixels: 1_000_000,
        };

        let moisture = self
            .imagery
            .reduce_mean(&reduction)?
            .ok_or_else(|| FetchError::NoData("Soil moisture masked at the site".to_string()))?;

        Ok(SignalSample::ok(
            moisture,
            Some(latest),
            format!(
                "Mean of {} daily passes {}..{} at {:.0} km",
                passes.len(),
                range.start,
                range.end,
                self.config.scale_m / 1000.0
            ),
        ))
    }
}

impl SourceAdapter for SoilMoistureAdapter {
    fn source(&self) -> SourceKind {
        SourceKind::SoilMoisture
    }

    fn fetch(&self, request: &AssessmentRequest) -> SignalSample {
        let started = Instant::now();
        absorb(self.source(), started, self.collect(request))
    }
}
