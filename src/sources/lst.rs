//! ESA CCI land surface temperature, one remote file per month, served by the
//! CEDA archive over OPeNDAP.

use crate::error::{ProcessingError, Result};
use crate::models::{CoordRange, GriddedDataset, Indexer, Indexers, RegionSet, TimeSelector, ZonalMeanTable};
use crate::processors::ZonalAggregator;
use crate::sources::{DataFetcher, DatasetOpener, DatasetRequest};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use tracing::debug;

pub const LON_NAME: &str = "lon";
pub const LAT_NAME: &str = "lat";
pub const VARIABLE: &str = "lst";

/// Offset between Kelvin and degrees Celsius.
pub const KELVIN_OFFSET: f64 = 273.15;

const BASE_URL: &str = "https://dap.ceda.ac.uk/thredds/dodsC/neodc/esacci/\
land_surface_temperature/data/MULTISENSOR_IRCDR/L3S/0.01/v2.00/monthly";

/// OPeNDAP URL of the monthly LST file for the month containing `date`.
pub fn opendap_url(date: NaiveDate) -> String {
    let (year, month) = (date.year(), date.month());
    format!(
        "{BASE_URL}/{year}/{month:02}/ESACCI-LST-L3S-LST-IRCDR_-0.01deg_1\
         MONTHLY_DAY-{year}{month:02}01000000-fv2.00.nc"
    )
}

/// Monthly land surface temperature in Kelvin.
#[derive(Clone)]
pub struct LandSurfaceTemperature {
    opener: DatasetOpener,
}

impl LandSurfaceTemperature {
    pub fn new(opener: DatasetOpener) -> Self {
        Self { opener }
    }

    /// Zonal means converted from Kelvin to Celsius.
    pub async fn zonal_means(
        &self,
        aggregator: &ZonalAggregator,
        regions: &RegionSet,
        time: TimeSelector,
    ) -> Result<ZonalMeanTable> {
        aggregator
            .zonal_means(regions, self, LON_NAME, LAT_NAME, time)
            .await?
            .map_column(VARIABLE, |kelvin| kelvin - KELVIN_OFFSET)
    }
}

#[async_trait]
impl DataFetcher for LandSurfaceTemperature {
    async fn fetch(
        &self,
        longitude: Option<CoordRange>,
        latitude: Option<CoordRange>,
        time: Option<TimeSelector>,
    ) -> Result<GriddedDataset> {
        let time = time.ok_or_else(|| {
            ProcessingError::MissingData(
                "Land surface temperature requires a time selection".to_string(),
            )
        })?;

        let indexers = Indexers::compress([
            (LON_NAME, longitude.map(Indexer::Coord)),
            (LAT_NAME, latitude.map(Indexer::Coord)),
        ]);

        // A single date is not widened: only month starts inside the range count.
        let urls: Vec<String> = time
            .as_range()
            .month_starts()
            .into_iter()
            .map(opendap_url)
            .collect();
        debug!(time = %time, files = urls.len(), "Fetching land surface temperature");

        let request = DatasetRequest::new(indexers).with_variables(&[VARIABLE]);
        self.opener.open_mfdataset(&urls, &request).await
    }

    /// One part per monthly file.
    fn time_parts(&self, time: TimeSelector) -> Result<Vec<TimeSelector>> {
        let months = time.as_range().month_starts();
        if months.is_empty() {
            return Err(ProcessingError::MissingData(format!(
                "No monthly land surface temperature files start within {}",
                time
            )));
        }
        Ok(months.into_iter().map(TimeSelector::Date).collect())
    }
}
