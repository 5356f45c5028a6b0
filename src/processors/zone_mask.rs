use crate::models::RegionSet;
use geo::{BoundingRect, Intersects, Point, Rect};
use ndarray::{Array2, Axis};
use rayon::prelude::*;

/// Grid-aligned `(lat, lon)` array holding the id of the region covering each
/// cell centre, or `None` when no region does.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneMask {
    zones: Array2<Option<i64>>,
}

impl ZoneMask {
    /// Rasterize `regions` onto the grid spanned by the coordinate vectors.
    ///
    /// A cell belongs to a region when its centre lies inside the polygon or
    /// on its boundary. Where polygons overlap, the last region in set order
    /// wins, so with id-sorted regions the highest id takes the cell. Rows are
    /// rasterized in parallel on the current rayon pool.
    pub fn rasterize(regions: &RegionSet, longitudes: &[f64], latitudes: &[f64]) -> Self {
        let candidates: Vec<(i64, Option<Rect<f64>>, &geo::MultiPolygon<f64>)> = regions
            .iter()
            .map(|r| (r.location_period_id, r.geometry.bounding_rect(), &r.geometry))
            .collect();

        let mut zones = Array2::from_elem((latitudes.len(), longitudes.len()), None);
        zones
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(latitudes.par_iter())
            .for_each(|(mut row, &lat)| {
                for (cell, &lon) in row.iter_mut().zip(longitudes) {
                    let point = Point::new(lon, lat);
                    *cell = candidates
                        .iter()
                        .filter(|(_, bbox, _)| bbox.map_or(false, |b| in_rect(&b, lon, lat)))
                        .rfind(|(_, _, geometry)| geometry.intersects(&point))
                        .map(|(id, _, _)| *id);
                }
            });

        Self { zones }
    }

    pub fn from_array(zones: Array2<Option<i64>>) -> Self {
        Self { zones }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.zones.dim()
    }

    pub fn get(&self, lat: usize, lon: usize) -> Option<i64> {
        self.zones.get((lat, lon)).copied().flatten()
    }

    pub fn zones(&self) -> &Array2<Option<i64>> {
        &self.zones
    }

    /// Number of cells assigned to any region.
    pub fn covered_cells(&self) -> usize {
        self.zones.iter().filter(|z| z.is_some()).count()
    }

    /// Distinct zone ids present on the grid, ascending.
    pub fn zone_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.zones.iter().flatten().copied().collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

fn in_rect(rect: &Rect<f64>, x: f64, y: f64) -> bool {
    rect.min().x <= x && x <= rect.max().x && rect.min().y <= y && y <= rect.max().y
}
