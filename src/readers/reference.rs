use crate::error::{ProcessingError, Result};
use crate::models::selector::first_of_month;
use crate::models::{DateRange, OutbreakRecord, Region, RegionSet};
use crate::readers::{OutbreakReader, ShapeReader};
use crate::utils::constants::{
    DEFAULT_RESOURCES_DIR, OUTBREAKS_FILE, RESOURCES_DIR_ENV, SHAPES_DIR, SHAPES_FILE,
};
use chrono::NaiveDate;
use geo::CoordsIter;
use once_cell::sync::{Lazy, OnceCell};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::info;

static GLOBAL: Lazy<ReferenceData> = Lazy::new(|| {
    let dir = std::env::var_os(RESOURCES_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RESOURCES_DIR));
    ReferenceData::new(dir)
});

/// Packaged outbreak table and Africa admin shapes, each loaded once on first
/// use.
pub struct ReferenceData {
    resources_dir: PathBuf,
    outbreaks: OnceCell<Vec<OutbreakRecord>>,
    shapes: OnceCell<RegionSet>,
}

impl ReferenceData {
    pub fn new(resources_dir: impl Into<PathBuf>) -> Self {
        Self {
            resources_dir: resources_dir.into(),
            outbreaks: OnceCell::new(),
            shapes: OnceCell::new(),
        }
    }

    /// Process-wide instance rooted at `$CHOLERA_RESOURCES_DIR`, or
    /// `resources` when unset.
    pub fn global() -> &'static ReferenceData {
        &GLOBAL
    }

    pub fn resources_dir(&self) -> &Path {
        &self.resources_dir
    }

    pub fn outbreaks_path(&self) -> PathBuf {
        self.resources_dir.join(OUTBREAKS_FILE)
    }

    pub fn shapes_path(&self) -> PathBuf {
        self.resources_dir.join(SHAPES_DIR).join(SHAPES_FILE)
    }

    pub fn outbreaks(&self) -> Result<&[OutbreakRecord]> {
        self.outbreaks
            .get_or_try_init(|| {
                let records = OutbreakReader::new().read_outbreaks(&self.outbreaks_path())?;
                info!(records = records.len(), "Loaded outbreak table");
                Ok(records)
            })
            .map(Vec::as_slice)
    }

    pub fn africa_shapes(&self) -> Result<&RegionSet> {
        self.shapes.get_or_try_init(|| {
            let shapes = ShapeReader::new().read_regions(&self.shapes_path())?;
            info!(shapes = shapes.len(), "Loaded Africa admin shapes");
            Ok(shapes)
        })
    }

    pub fn within_admin2(&self) -> Result<Vec<OutbreakRecord>> {
        Ok(self
            .outbreaks()?
            .iter()
            .filter(|r| r.is_admin2())
            .cloned()
            .collect())
    }

    /// Shapes of the given outbreaks (admin2 outbreaks when `None`), sorted
    /// by location-period id.
    pub fn regions(&self, outbreaks: Option<&[OutbreakRecord]>) -> Result<RegionSet> {
        let ids: BTreeSet<i64> = match outbreaks {
            Some(records) => records.iter().map(|r| r.location_period_id).collect(),
            None => self.within_admin2()?.iter().map(|r| r.location_period_id).collect(),
        };
        Ok(join_regions(self.africa_shapes()?, &ids))
    }

    /// Month starts from the earliest to the latest outbreak start month,
    /// inclusive (admin2 outbreaks when `None`).
    pub fn start_month_range(&self, outbreaks: Option<&[OutbreakRecord]>) -> Result<Vec<NaiveDate>> {
        match outbreaks {
            Some(records) => start_months(records),
            None => start_months(&self.within_admin2()?),
        }
    }
}

/// Shapes whose id is in `ids`, ordered by id. Geometries occurring more than
/// once are dropped entirely.
pub fn join_regions(shapes: &RegionSet, ids: &BTreeSet<i64>) -> RegionSet {
    let mut joined: Vec<&Region> = shapes
        .iter()
        .filter(|r| ids.contains(&r.location_period_id))
        .collect();
    joined.sort_by_key(|r| r.location_period_id);

    let mut occurrences: HashMap<Vec<(u64, u64)>, usize> = HashMap::new();
    let keys: Vec<Vec<(u64, u64)>> = joined.iter().map(|r| geometry_key(r)).collect();
    for key in &keys {
        *occurrences.entry(key.clone()).or_default() += 1;
    }

    joined
        .into_iter()
        .zip(&keys)
        .filter(|(_, key)| occurrences[*key] == 1)
        .map(|(region, _)| region.clone())
        .collect()
}

fn geometry_key(region: &Region) -> Vec<(u64, u64)> {
    region
        .geometry
        .coords_iter()
        .map(|c| (c.x.to_bits(), c.y.to_bits()))
        .collect()
}

pub fn start_months(records: &[OutbreakRecord]) -> Result<Vec<NaiveDate>> {
    let first = records.iter().map(|r| first_of_month(r.start_date)).min();
    let last = records.iter().map(|r| first_of_month(r.start_date)).max();
    match (first, last) {
        (Some(first), Some(last)) => Ok(DateRange::new(first, last)?.month_starts()),
        _ => Err(ProcessingError::MissingData(
            "No outbreaks to derive a start month range from".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn outbreak(start: NaiveDate, scale: &str, id: i64) -> OutbreakRecord {
        OutbreakRecord::new(start, start, scale.to_string(), id)
    }

    #[test]
    fn test_join_regions_sorts_and_drops_duplicate_geometries() {
        let shapes = RegionSet::new(vec![
            Region::rectangle(30, (0.0, 0.0), (1.0, 1.0)),
            Region::rectangle(10, (2.0, 0.0), (3.0, 1.0)),
            Region::rectangle(20, (4.0, 0.0), (5.0, 1.0)),
            // same geometry as 10
            Region::rectangle(40, (2.0, 0.0), (3.0, 1.0)),
            Region::rectangle(50, (6.0, 0.0), (7.0, 1.0)),
        ]);
        let ids: BTreeSet<i64> = [10, 20, 30, 40].into_iter().collect();

        let regions = join_regions(&shapes, &ids);
        assert_eq!(regions.ids(), vec![20, 30]);
    }

    #[test]
    fn test_start_months_inclusive() {
        let records = vec![
            outbreak(date(2011, 2, 14), "admin2", 1),
            outbreak(date(2010, 11, 30), "admin2", 2),
        ];
        assert_eq!(
            start_months(&records).unwrap(),
            vec![date(2010, 11, 1), date(2010, 12, 1), date(2011, 1, 1), date(2011, 2, 1)]
        );
        assert!(start_months(&[]).is_err());
    }

    #[test]
    fn test_outbreaks_are_memoized() -> Result<()> {
        let dir = TempDir::new()?;
        fs::write(
            dir.path().join(OUTBREAKS_FILE),
            "start_date,end_date,spatial_scale,location_period_id\n\
             2015-03-02,2015-06-01,admin2,5\n\
             2016-01-10,2016-02-01,admin1,6\n\
             2014-12-25,2015-01-01,admin2,7\n",
        )?;

        let reference = ReferenceData::new(dir.path());
        assert_eq!(reference.outbreaks()?.len(), 3);

        // Later edits are not observed once loaded.
        fs::remove_file(dir.path().join(OUTBREAKS_FILE))?;
        assert_eq!(reference.outbreaks()?.len(), 3);

        let admin2 = reference.within_admin2()?;
        assert_eq!(admin2.iter().map(|r| r.location_period_id).collect::<Vec<_>>(), vec![5, 7]);
        assert_eq!(
            reference.start_month_range(None)?,
            vec![date(2014, 12, 1), date(2015, 1, 1), date(2015, 2, 1), date(2015, 3, 1)]
        );
        Ok(())
    }

    #[test]
    fn test_missing_resources_are_errors() {
        let dir = TempDir::new().unwrap();
        let reference = ReferenceData::new(dir.path());
        assert!(reference.outbreaks().is_err());
        assert!(reference.africa_shapes().is_err());
        assert!(reference.regions(None).is_err());
    }

    #[test]
    fn test_paths() {
        let reference = ReferenceData::new("/data/cholera");
        assert_eq!(reference.outbreaks_path(), PathBuf::from("/data/cholera/outbreaks.csv"));
        assert_eq!(
            reference.shapes_path(),
            PathBuf::from("/data/cholera/AfricaShapefiles/total_shp_0427.shp")
        );
    }
}
