pub mod compute;
pub mod indexers;
pub mod zonal_aggregator;
pub mod zone_mask;

pub use compute::ComputeContext;
pub use indexers::lonlat_indexers;
pub use zonal_aggregator::{grouped_means, ZonalAggregator};
pub use zone_mask::ZoneMask;
