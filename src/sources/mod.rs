pub mod engine;
pub mod lst;
#[cfg(feature = "netcdf")]
pub mod netcdf_engine;
pub mod precip;
pub mod retry;
pub mod sm;

pub use engine::{DatasetEngine, DatasetOpener, DatasetRequest, InMemoryEngine};
pub use lst::LandSurfaceTemperature;
#[cfg(feature = "netcdf")]
pub use netcdf_engine::NetcdfEngine;
pub use precip::Precipitation;
pub use retry::RetryPolicy;
pub use sm::SoilMoisture;

use crate::error::Result;
use crate::models::{CoordRange, GriddedDataset, RegionSet, TimeSelector, ZonalMeanTable};
use crate::processors::ZonalAggregator;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Uniform access to a gridded source: restrict by optional longitude,
/// latitude and time filters and return the normalized dataset.
///
/// Unset filters are never forwarded to the underlying selection.
#[async_trait]
pub trait DataFetcher: Send + Sync {
    async fn fetch(
        &self,
        longitude: Option<CoordRange>,
        latitude: Option<CoordRange>,
        time: Option<TimeSelector>,
    ) -> Result<GriddedDataset>;

    /// Split `time` into selections that can be fetched and reduced one after
    /// another, so only one part is resident at a time. Ranges are cut at
    /// month boundaries; a single date stays whole.
    fn time_parts(&self, time: TimeSelector) -> Result<Vec<TimeSelector>> {
        Ok(match time {
            TimeSelector::Date(_) => vec![time],
            TimeSelector::Range(range) => range
                .month_windows()
                .into_iter()
                .map(TimeSelector::Range)
                .collect(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum DatasetKind {
    /// ESA CCI monthly land surface temperature
    Lst,
    /// CHIRPS monthly precipitation
    Precip,
    /// ASCAT soil moisture
    Sm,
}

impl DatasetKind {
    pub fn variable(&self) -> &'static str {
        match self {
            DatasetKind::Lst => lst::VARIABLE,
            DatasetKind::Precip => precip::VARIABLE,
            DatasetKind::Sm => sm::VARIABLE,
        }
    }

    /// Longitude and latitude coordinate names used by the source.
    pub fn coord_names(&self) -> (&'static str, &'static str) {
        match self {
            DatasetKind::Lst => (lst::LON_NAME, lst::LAT_NAME),
            DatasetKind::Precip => (precip::LON_NAME, precip::LAT_NAME),
            DatasetKind::Sm => (sm::LON_NAME, sm::LAT_NAME),
        }
    }

    /// Units of the zonal-mean output.
    pub fn units(&self) -> &'static str {
        match self {
            DatasetKind::Lst => "°C",
            DatasetKind::Precip => "mm",
            DatasetKind::Sm => "%",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DatasetKind::Lst => "Land Surface Temperature",
            DatasetKind::Precip => "Precipitation",
            DatasetKind::Sm => "Soil Moisture",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            DatasetKind::Lst => "lst",
            DatasetKind::Precip => "precip",
            DatasetKind::Sm => "sm",
        }
    }
}

/// Zonal means of `kind` over `regions`, in the source's output units.
pub async fn zonal_means(
    kind: DatasetKind,
    opener: DatasetOpener,
    aggregator: &ZonalAggregator,
    regions: &RegionSet,
    time: TimeSelector,
) -> Result<ZonalMeanTable> {
    match kind {
        DatasetKind::Lst => {
            LandSurfaceTemperature::new(opener)
                .zonal_means(aggregator, regions, time)
                .await
        }
        DatasetKind::Precip => {
            Precipitation::new(opener)
                .zonal_means(aggregator, regions, time)
                .await
        }
        DatasetKind::Sm => SoilMoisture::new(opener).zonal_means(aggregator, regions, time).await,
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
