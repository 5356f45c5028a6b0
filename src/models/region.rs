use crate::error::{ProcessingError, Result};
use geo::{BoundingRect, Coord, MultiPolygon, Rect};

/// A named administrative polygon keyed by its location-period identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub location_period_id: i64,
    pub geometry: MultiPolygon<f64>,
}

impl Region {
    pub fn new(location_period_id: i64, geometry: MultiPolygon<f64>) -> Self {
        Self {
            location_period_id,
            geometry,
        }
    }

    /// Axis-aligned rectangle `[min_x, max_x] x [min_y, max_y]` as a region.
    pub fn rectangle(location_period_id: i64, min: (f64, f64), max: (f64, f64)) -> Self {
        let rect = Rect::new(Coord { x: min.0, y: min.1 }, Coord { x: max.0, y: max.1 });
        Self::new(location_period_id, MultiPolygon::new(vec![rect.to_polygon()]))
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }
}

/// Ordered collection of regions; order decides which region claims a grid
/// cell shared by several polygons.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionSet {
    regions: Vec<Region>,
}

impl RegionSet {
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Region> {
        self.regions.iter()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn ids(&self) -> Vec<i64> {
        self.regions.iter().map(|r| r.location_period_id).collect()
    }

    /// Combined bounds of every geometry in the set.
    pub fn total_bounds(&self) -> Result<Rect<f64>> {
        if self.regions.is_empty() {
            return Err(ProcessingError::InvalidGeometry(
                "Region set is empty".to_string(),
            ));
        }

        let mut min = Coord {
            x: f64::INFINITY,
            y: f64::INFINITY,
        };
        let mut max = Coord {
            x: f64::NEG_INFINITY,
            y: f64::NEG_INFINITY,
        };

        for region in &self.regions {
            let rect = region.bounding_rect().ok_or_else(|| {
                ProcessingError::InvalidGeometry(format!(
                    "Region {} has an empty geometry",
                    region.location_period_id
                ))
            })?;

            let (lo, hi) = (rect.min(), rect.max());
            if ![lo.x, lo.y, hi.x, hi.y].iter().all(|v| v.is_finite()) {
                return Err(ProcessingError::InvalidGeometry(format!(
                    "Region {} has non-finite coordinates",
                    region.location_period_id
                )));
            }

            min.x = min.x.min(lo.x);
            min.y = min.y.min(lo.y);
            max.x = max.x.max(hi.x);
            max.y = max.y.max(hi.y);
        }

        Ok(Rect::new(min, max))
    }
}

impl FromIterator<Region> for RegionSet {
    fn from_iter<T: IntoIterator<Item = Region>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a RegionSet {
    type Item = &'a Region;
    type IntoIter = std::slice::Iter<'a, Region>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_bounds_spans_all_regions() {
        let regions = RegionSet::new(vec![
            Region::rectangle(1, (10.0, -5.0), (12.0, -1.0)),
            Region::rectangle(2, (-3.0, 4.0), (0.5, 8.0)),
        ]);

        let bounds = regions.total_bounds().unwrap();
        assert_eq!(bounds.min(), Coord { x: -3.0, y: -5.0 });
        assert_eq!(bounds.max(), Coord { x: 12.0, y: 8.0 });
    }

    #[test]
    fn test_empty_set_has_no_bounds() {
        let regions = RegionSet::default();
        assert!(matches!(
            regions.total_bounds(),
            Err(ProcessingError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_empty_geometry_is_rejected() {
        let regions = RegionSet::new(vec![Region::new(7, MultiPolygon::new(vec![]))]);
        assert!(regions.total_bounds().is_err());
    }

    #[test]
    fn test_ids_preserve_order() {
        let regions: RegionSet = [3, 1, 2]
            .into_iter()
            .map(|id| Region::rectangle(id, (0.0, 0.0), (1.0, 1.0)))
            .collect();
        assert_eq!(regions.ids(), vec![3, 1, 2]);
    }
}
