use crate::error::{ProcessingError, Result};
use crate::models::{GriddedDataset, RegionSet, TimeSelector, ZonalMeanRow, ZonalMeanTable};
use crate::processors::compute::ComputeContext;
use crate::processors::indexers::lonlat_indexers;
use crate::processors::zone_mask::ZoneMask;
use crate::sources::DataFetcher;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info};

/// Computes per-region, per-time-step spatial means of fetched variables.
pub struct ZonalAggregator {
    max_workers: usize,
}

impl ZonalAggregator {
    pub fn new(max_workers: usize) -> Self {
        Self { max_workers }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Fetch the bounding box of `regions` for `time` and reduce every
    /// variable to its skip-missing mean per `(time, zone)`.
    ///
    /// `lon_name` and `lat_name` are the coordinate names the fetcher's
    /// source uses. The selection is fetched and reduced one part at a time
    /// (see [`DataFetcher::time_parts`]), so only one part of the dataset is
    /// resident. Rows without a single valid cell are dropped, so zone ids in
    /// the result are always a subset of the region ids.
    pub async fn zonal_means(
        &self,
        regions: &RegionSet,
        fetcher: &dyn DataFetcher,
        lon_name: &str,
        lat_name: &str,
        time: TimeSelector,
    ) -> Result<ZonalMeanTable> {
        let (lon, lat) = lonlat_indexers(regions)?;
        let context = ComputeContext::acquire(self.max_workers)?;
        let parts = fetcher.time_parts(time)?;

        info!(
            regions = regions.len(),
            longitude = %lon,
            latitude = %lat,
            time = %time,
            parts = parts.len(),
            "Computing zonal means"
        );

        let mut columns: Option<Vec<String>> = None;
        let mut grid: Option<(Vec<f64>, Vec<f64>, ZoneMask)> = None;
        let mut rows = Vec::new();

        for part in parts {
            let values = fetcher.fetch(Some(lon), Some(lat), Some(part)).await?;

            for (expected, actual) in [(lon_name, values.lon_name()), (lat_name, values.lat_name())] {
                if expected != actual {
                    return Err(ProcessingError::Indexing(format!(
                        "Dataset has no coordinate named '{}' (found '{}')",
                        expected, actual
                    )));
                }
            }

            let names: Vec<String> = values.variable_names().iter().map(|s| s.to_string()).collect();
            if let Some(existing) = columns.as_ref().filter(|existing| **existing != names) {
                return Err(ProcessingError::InvalidFormat(format!(
                    "Variables changed between parts: {:?} then {:?}",
                    existing, names
                )));
            }
            if columns.is_none() {
                columns = Some(names);
            }

            // parts normally share one grid; rasterize again only if it moves
            let reuse = matches!(&grid, Some((lons, lats, _))
                if lons.as_slice() == values.longitudes() && lats.as_slice() == values.latitudes());
            if !reuse {
                let mask = context.install(|| {
                    ZoneMask::rasterize(regions, values.longitudes(), values.latitudes())
                });
                debug!(
                    grid = ?mask.shape(),
                    covered_cells = mask.covered_cells(),
                    zones = mask.zone_ids().len(),
                    "Rasterized zone mask"
                );
                grid = Some((values.longitudes().to_vec(), values.latitudes().to_vec(), mask));
            }

            if let Some((_, _, mask)) = &grid {
                let part_rows = context.install(|| grouped_means(&values, mask));
                debug!(time = %part, rows = part_rows.len(), "Reduced part");
                rows.extend(part_rows);
            }
        }

        let table = ZonalMeanTable::new(columns.unwrap_or_default(), rows)?;

        info!(rows = table.len(), zones = table.zones().len(), "Zonal means complete");
        Ok(table)
    }
}

impl Default for ZonalAggregator {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

/// Skip-missing mean of every variable per time step and zone, one row per
/// `(time, zone)` whose means are all defined. Variables are emitted in the
/// dataset's variable order. Time steps are reduced in parallel.
pub fn grouped_means(dataset: &GriddedDataset, mask: &ZoneMask) -> Vec<ZonalMeanRow> {
    let zone_ids = mask.zone_ids();
    let zone_index: HashMap<i64, usize> = zone_ids.iter().enumerate().map(|(i, z)| (*z, i)).collect();

    // (lat, lon, zone slot) for every covered cell
    let cells: Vec<(usize, usize, usize)> = mask
        .zones()
        .indexed_iter()
        .filter_map(|((y, x), zone)| zone.map(|z| (y, x, zone_index[&z])))
        .collect();

    let variables: Vec<_> = dataset.variables().map(|(_, data)| data).collect();
    let times = dataset.times();

    (0..times.len())
        .into_par_iter()
        .flat_map_iter(|t| {
            let mut sums = vec![vec![0.0f64; variables.len()]; zone_ids.len()];
            let mut counts = vec![vec![0usize; variables.len()]; zone_ids.len()];

            for &(y, x, slot) in &cells {
                for (v, data) in variables.iter().enumerate() {
                    let value = data[[t, y, x]];
                    if !value.is_nan() {
                        sums[slot][v] += value;
                        counts[slot][v] += 1;
                    }
                }
            }

            let time = times[t];
            zone_ids
                .iter()
                .enumerate()
                .filter_map(|(slot, &zone)| {
                    let values: Vec<f64> = sums[slot]
                        .iter()
                        .zip(&counts[slot])
                        .map(|(&sum, &n)| if n > 0 { sum / n as f64 } else { f64::NAN })
                        .collect();
                    if values.iter().any(|v| v.is_nan()) {
                        None
                    } else {
                        Some(ZonalMeanRow { time, zone, values })
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect()
}
