//! CHIRPS v2.0 monthly precipitation from the NOAA CoastWatch ERDDAP.

use crate::error::Result;
use crate::models::{
    CoordRange, DateRange, GriddedDataset, Indexer, Indexers, RegionSet, TimeSelector,
    ZonalMeanTable, TIME_DIM,
};
use crate::processors::ZonalAggregator;
use crate::sources::{DataFetcher, DatasetOpener, DatasetRequest};
use async_trait::async_trait;
use tracing::debug;

pub const OPENDAP_URL: &str =
    "https://coastwatch.pfeg.noaa.gov/erddap/griddap/chirps20GlobalMonthlyP05";

pub const LON_NAME: &str = "longitude";
pub const LAT_NAME: &str = "latitude";
pub const VARIABLE: &str = "precip";

/// Precipitation in millimetres. Every source variable is kept.
#[derive(Clone)]
pub struct Precipitation {
    opener: DatasetOpener,
    url: String,
}

impl Precipitation {
    pub fn new(opener: DatasetOpener) -> Self {
        Self {
            opener,
            url: OPENDAP_URL.to_string(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn zonal_means(
        &self,
        aggregator: &ZonalAggregator,
        regions: &RegionSet,
        time: TimeSelector,
    ) -> Result<ZonalMeanTable> {
        aggregator
            .zonal_means(regions, self, LON_NAME, LAT_NAME, time)
            .await
    }
}

/// A single date selects the same-day range `[d, d]`.
fn time_range(time: TimeSelector) -> DateRange {
    match time {
        TimeSelector::Date(date) => DateRange::day(date),
        TimeSelector::Range(range) => range,
    }
}

#[async_trait]
impl DataFetcher for Precipitation {
    async fn fetch(
        &self,
        longitude: Option<CoordRange>,
        latitude: Option<CoordRange>,
        time: Option<TimeSelector>,
    ) -> Result<GriddedDataset> {
        let indexers = Indexers::compress([
            (LON_NAME, longitude.map(Indexer::Coord)),
            (LAT_NAME, latitude.map(Indexer::Coord)),
            (TIME_DIM, time.map(|t| Indexer::Time(time_range(t)))),
        ]);
        debug!(url = %self.url, filters = indexers.len(), "Fetching precipitation");

        self.opener
            .open_dataset(&self.url, &DatasetRequest::new(indexers))
            .await
    }
}
