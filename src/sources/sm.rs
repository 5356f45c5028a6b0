//! ASCAT soil moisture from the ICDC (University of Hamburg) THREDDS server.

use crate::error::Result;
use crate::models::{
    CoordRange, DateRange, GriddedDataset, Indexer, Indexers, RegionSet, TimeSelector,
    ZonalMeanTable, TIME_DIM,
};
use crate::processors::ZonalAggregator;
use crate::sources::{DataFetcher, DatasetOpener, DatasetRequest};
use async_trait::async_trait;
use tracing::debug;

pub const OPENDAP_URL: &str = "https://icdc.cen.uni-hamburg.de/thredds/dodsC/ascat_soilmoisture_asc";

pub const LON_NAME: &str = "lon";
pub const LAT_NAME: &str = "lat";
pub const VARIABLE: &str = "sm";

/// Name of the soil moisture variable on the server.
pub const SOURCE_VARIABLE: &str = "sm_ext";

/// Soil moisture as a percentage of saturation.
#[derive(Clone)]
pub struct SoilMoisture {
    opener: DatasetOpener,
    url: String,
}

impl SoilMoisture {
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

/// Query window for a time selector; a single date spans its whole month.
pub fn query_window(time: TimeSelector) -> DateRange {
    match time {
        TimeSelector::Date(date) => DateRange::month_of(date),
        TimeSelector::Range(range) => range,
    }
}

#[async_trait]
impl DataFetcher for SoilMoisture {
    async fn fetch(
        &self,
        longitude: Option<CoordRange>,
        latitude: Option<CoordRange>,
        time: Option<TimeSelector>,
    ) -> Result<GriddedDataset> {
        let indexers = Indexers::compress([
            (LON_NAME, longitude.map(Indexer::Coord)),
            (LAT_NAME, latitude.map(Indexer::Coord)),
            (TIME_DIM, time.map(|t| Indexer::Time(query_window(t)))),
        ]);
        debug!(url = %self.url, filters = indexers.len(), "Fetching soil moisture");

        let request = DatasetRequest::new(indexers).with_variables(&[SOURCE_VARIABLE]);
        self.opener
            .open_dataset(&self.url, &request)
            .await?
            .rename_variable(SOURCE_VARIABLE, VARIABLE)
    }
}
