/// Radar change adapter.
///
/// Compares the most recent SAR pass against a baseline composite and
/// reports the area-mean absolute backscatter difference over a small
/// disc around the site. A high score means the ground surface texture
/// changed: fresh debris, slumped soil, stripped vegetation.
///
/// Insufficient data policy: the recent window and the baseline window
/// must each hold at least one acquisition. The windows never overlap,
/// so an `Ok` score always compares two distinct passes. When either side
/// is empty the sample is `NoData` and the metadata names which side.

use std::sync::Arc;
use std::time::Instant;

use super::{absorb, SourceAdapter};
use crate::config::{DateRange, RadarConfig};
use crate::ingest::imagery::{
    CollectionQuery, Composite, ImageExpr, ImageryService, PropertyFilter, Reduction, Region,
};
use crate::model::{AssessmentRequest, FetchError, SignalSample, SourceKind};

const MAX_PIXELS: u64 = 1_000_000_000;

pub struct RadarChangeAdapter {
    imagery: Arc<dyn ImageryService>,
    config: RadarConfig,
}

impl RadarChangeAdapter {
    pub fn new(imagery: Arc<dyn ImageryService>, config: RadarConfig) -> Self {
        Self { imagery, config }
    }

    fn region(&self, request: &AssessmentRequest) -> Region {
        Region::Buffer {
            latitude: request.latitude,
            longitude: request.longitude,
            radius_m: self.config.buffer_m,
        }
    }

    fn query(&self, request: &AssessmentRequest, range: DateRange) -> CollectionQuery {
        CollectionQuery {
            collection: self.config.collection.clone(),
            region: self.region(request),
            range,
            filters: vec![
                PropertyFilter::ListContains {
                    property: "transmitterReceiverPolarisation".to_string(),
                    value: self.config.polarization.clone(),
                },
                PropertyFilter::Equals {
                    property: "instrumentMode".to_string(),
                    value: self.config.instrument_mode.clone(),
                },
            ],
            band: self.config.band.clone(),
        }
    }

    fn collect(&self, request: &AssessmentRequest) -> Result<SignalSample, FetchError> {
        let window = self.config.window(request.mode);
        let (Some(recent_range), Some(baseline_range)) = (
            window.recent_range(request.reference_date),
            window.baseline_range(request.reference_date),
        ) else {
            return Err(FetchError::Parse(format!(
                "Scene windows around {} fall outside the calendar",
                request.reference_date
            )));
        };

        let recent_query = self.query(request, recent_range);
        let recent_passes = self.imagery.acquisitions(&recent_query)?;
        let last_pass = recent_passes.iter().max().copied().ok_or_else(|| {
            FetchError::NoData(format!(
                "No recent pass between {} and {}",
                recent_range.start, recent_range.end
            ))
        })?;

        let baseline_query = self.query(request, baseline_range);
        let baseline_passes = self.imagery.acquisitions(&baseline_query)?;
        if baseline_passes.is_empty() {
            return Err(FetchError::NoData(format!(
                "No baseline passes between {} and {}",
                baseline_range.start, baseline_range.end
            )));
        }

        let reduction = Reduction {
            image: ImageExpr::AbsDifference {
                a: Composite::Latest(recent_query),
                b: Composite::Mean(baseline_query),
            },
            region: self.region(request),
            scale_m: self.config.scale_m,
            max_pixels: MAX_PIXELS,
        };

        let score = self
            .imagery
            .reduce_mean(&reduction)?
            .ok_or_else(|| FetchError::NoData("Change image fully masked over the site".to_string()))?;

        let sample = SignalSample::ok(
            score,
            Some(last_pass),
            format!(
                "Last pass {}; baseline mean of {} passes {}..{}",
                last_pass,
                baseline_passes.len(),
                baseline_range.start,
                baseline_range.end
            ),
        );

        Ok(sample.check_freshness(request.reference_date, window.stale_after_days))
    }
}

impl SourceAdapter for RadarChangeAdapter {
    fn source(&self) -> SourceKind {
        SourceKind::RadarChange
    }

    fn fetch(&self, request: &AssessmentRequest) -> SignalSample {
        let started = Instant::now();
        absorb(self.source(), started, self.collect(request))
    }
}
