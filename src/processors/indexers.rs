use crate::error::Result;
use crate::models::{CoordRange, RegionSet};

/// Longitude and latitude ranges covering the total bounds of `regions`,
/// usable as selection indexers on any source.
///
/// The result is one rectangle for the whole set, not one per region: the
/// fetch is rectangular and the zone mask does the exact clipping.
pub fn lonlat_indexers(regions: &RegionSet) -> Result<(CoordRange, CoordRange)> {
    let bounds = regions.total_bounds()?;
    let (min, max) = (bounds.min(), bounds.max());
    Ok((CoordRange::new(min.x, max.x), CoordRange::new(min.y, max.y)))
}
