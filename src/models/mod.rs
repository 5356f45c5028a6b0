pub mod dataset;
pub mod outbreak;
pub mod region;
pub mod selector;
pub mod zonal;

pub use dataset::{GriddedDataset, TIME_DIM};
pub use outbreak::OutbreakRecord;
pub use region::{Region, RegionSet};
pub use selector::{CoordRange, DateRange, Indexer, Indexers, TimeSelector};
pub use zonal::{ZonalMeanRow, ZonalMeanTable};
