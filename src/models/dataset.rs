use crate::error::{ProcessingError, Result};
use crate::models::selector::{Indexer, Indexers};
use chrono::NaiveDate;
use ndarray::{concatenate, Array3, Axis};
use std::collections::BTreeMap;

/// Name of the time coordinate shared by every source.
pub const TIME_DIM: &str = "time";

/// Labelled `(time, lat, lon)` grid with one or more named variables.
///
/// Missing values are `NaN`. Latitude and longitude coordinate names follow
/// the source (`lat`/`lon` or `latitude`/`longitude`).
#[derive(Debug, Clone, PartialEq)]
pub struct GriddedDataset {
    lon_name: String,
    lat_name: String,
    times: Vec<NaiveDate>,
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
    variables: BTreeMap<String, Array3<f64>>,
}

impl GriddedDataset {
    pub fn new(
        lon_name: impl Into<String>,
        lat_name: impl Into<String>,
        times: Vec<NaiveDate>,
        latitudes: Vec<f64>,
        longitudes: Vec<f64>,
    ) -> Self {
        Self {
            lon_name: lon_name.into(),
            lat_name: lat_name.into(),
            times,
            latitudes,
            longitudes,
            variables: BTreeMap::new(),
        }
    }

    /// Attach a variable; its shape must be `(time, lat, lon)`.
    pub fn with_variable(mut self, name: impl Into<String>, data: Array3<f64>) -> Result<Self> {
        let name = name.into();
        let expected = self.shape();
        if data.dim() != expected {
            return Err(ProcessingError::InvalidFormat(format!(
                "Variable '{}' has shape {:?}, expected {:?}",
                name,
                data.dim(),
                expected
            )));
        }
        self.variables.insert(name, data);
        Ok(self)
    }

    pub fn lon_name(&self) -> &str {
        &self.lon_name
    }

    pub fn lat_name(&self) -> &str {
        &self.lat_name
    }

    pub fn times(&self) -> &[NaiveDate] {
        &self.times
    }

    pub fn latitudes(&self) -> &[f64] {
        &self.latitudes
    }

    pub fn longitudes(&self) -> &[f64] {
        &self.longitudes
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.times.len(), self.latitudes.len(), self.longitudes.len())
    }

    pub fn variable(&self, name: &str) -> Option<&Array3<f64>> {
        self.variables.get(name)
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.keys().map(String::as_str).collect()
    }

    pub fn variables(&self) -> impl Iterator<Item = (&str, &Array3<f64>)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Numeric coordinate values by name.
    pub fn coordinate(&self, name: &str) -> Option<&[f64]> {
        if name == self.lon_name {
            Some(&self.longitudes)
        } else if name == self.lat_name {
            Some(&self.latitudes)
        } else {
            None
        }
    }

    /// Label-based selection. Every indexer must name a coordinate of this
    /// dataset. A range matching no labels yields an empty axis.
    pub fn sel(&self, indexers: &Indexers) -> Result<Self> {
        let mut time_idx: Vec<usize> = (0..self.times.len()).collect();
        let mut lat_idx: Vec<usize> = (0..self.latitudes.len()).collect();
        let mut lon_idx: Vec<usize> = (0..self.longitudes.len()).collect();

        for (name, indexer) in indexers.iter() {
            match indexer {
                Indexer::Time(range) if name == TIME_DIM => {
                    time_idx = select_where(&self.times, |t| range.contains(*t));
                }
                Indexer::Coord(range) if name == self.lat_name || name == self.lon_name => {
                    let (values, target) = if name == self.lat_name {
                        (&self.latitudes, &mut lat_idx)
                    } else {
                        (&self.longitudes, &mut lon_idx)
                    };
                    *target = select_where(values, |v| range.contains(*v));
                }
                Indexer::Time(_) => {
                    return Err(ProcessingError::Indexing(format!(
                        "'{}' is not a time coordinate",
                        name
                    )))
                }
                Indexer::Coord(_) => {
                    return Err(ProcessingError::Indexing(format!(
                        "Dataset has no coordinate named '{}'",
                        name
                    )))
                }
            }
        }

        let variables = self
            .variables
            .iter()
            .map(|(name, data)| {
                let selected = data
                    .select(Axis(0), &time_idx)
                    .select(Axis(1), &lat_idx)
                    .select(Axis(2), &lon_idx);
                (name.clone(), selected)
            })
            .collect();

        Ok(Self {
            lon_name: self.lon_name.clone(),
            lat_name: self.lat_name.clone(),
            times: time_idx.iter().map(|&i| self.times[i]).collect(),
            latitudes: lat_idx.iter().map(|&i| self.latitudes[i]).collect(),
            longitudes: lon_idx.iter().map(|&i| self.longitudes[i]).collect(),
            variables,
        })
    }

    /// Keep only the named variables.
    pub fn retain_variables(mut self, names: &[&str]) -> Result<Self> {
        if let Some(missing) = names.iter().find(|n| !self.variables.contains_key(**n)) {
            return Err(ProcessingError::MissingData(format!(
                "Dataset has no variable named '{}'",
                missing
            )));
        }
        self.variables.retain(|name, _| names.contains(&name.as_str()));
        Ok(self)
    }

    pub fn rename_variable(mut self, from: &str, to: &str) -> Result<Self> {
        let data = self.variables.remove(from).ok_or_else(|| {
            ProcessingError::MissingData(format!("Dataset has no variable named '{}'", from))
        })?;
        self.variables.insert(to.to_string(), data);
        Ok(self)
    }

    /// Concatenate datasets sharing one spatial grid along time, ordered by
    /// their first time step.
    pub fn concat_time(mut datasets: Vec<Self>) -> Result<Self> {
        if datasets.is_empty() {
            return Err(ProcessingError::MissingData(
                "No datasets to concatenate".to_string(),
            ));
        }
        if datasets.len() == 1 {
            return Ok(datasets.remove(0));
        }

        datasets.sort_by_key(|ds| ds.times.first().copied());
        let first = &datasets[0];

        for other in &datasets[1..] {
            if other.latitudes != first.latitudes
                || other.longitudes != first.longitudes
                || other.lat_name != first.lat_name
                || other.lon_name != first.lon_name
            {
                return Err(ProcessingError::InvalidFormat(
                    "Cannot concatenate datasets on different grids".to_string(),
                ));
            }
            if other.variables.keys().ne(first.variables.keys()) {
                return Err(ProcessingError::InvalidFormat(
                    "Cannot concatenate datasets with different variables".to_string(),
                ));
            }
        }

        let mut variables = BTreeMap::new();
        for name in first.variables.keys() {
            let views: Vec<_> = datasets.iter().map(|ds| ds.variables[name].view()).collect();
            let joined = concatenate(Axis(0), &views).map_err(|e| {
                ProcessingError::InvalidFormat(format!("Failed to concatenate '{}': {}", name, e))
            })?;
            variables.insert(name.clone(), joined);
        }

        Ok(Self {
            lon_name: first.lon_name.clone(),
            lat_name: first.lat_name.clone(),
            times: datasets.iter().flat_map(|ds| ds.times.iter().copied()).collect(),
            latitudes: first.latitudes.clone(),
            longitudes: first.longitudes.clone(),
            variables,
        })
    }
}

fn select_where<T>(values: &[T], keep: impl Fn(&T) -> bool) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| keep(v))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::selector::{CoordRange, DateRange};
    use ndarray::Array3;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> GriddedDataset {
        let times = vec![date(2020, 1, 1), date(2020, 2, 1)];
        let lats = vec![-1.0, 0.0, 1.0];
        let lons = vec![30.0, 31.0, 32.0, 33.0];
        let data = Array3::from_shape_fn((2, 3, 4), |(t, y, x)| (t * 100 + y * 10 + x) as f64);
        GriddedDataset::new("lon", "lat", times, lats, lons)
            .with_variable("lst", data)
            .unwrap()
    }

    #[test]
    fn test_sel_subsets_each_axis() {
        let ds = sample();
        let indexers = Indexers::compress([
            ("lon", Some(Indexer::Coord(CoordRange::new(31.0, 32.0)))),
            ("lat", Some(Indexer::Coord(CoordRange::new(0.0, 5.0)))),
            ("time", Some(Indexer::Time(DateRange::day(date(2020, 2, 1))))),
        ]);

        let selected = ds.sel(&indexers).unwrap();
        assert_eq!(selected.shape(), (1, 2, 2));
        assert_eq!(selected.longitudes(), &[31.0, 32.0]);
        assert_eq!(selected.latitudes(), &[0.0, 1.0]);
        assert_eq!(selected.times(), &[date(2020, 2, 1)]);
        assert_eq!(selected.variable("lst").unwrap()[[0, 0, 0]], 111.0);
    }

    #[test]
    fn test_sel_without_indexers_is_identity() {
        let ds = sample();
        assert_eq!(ds.sel(&Indexers::new()).unwrap(), ds);
    }

    #[test]
    fn test_sel_unknown_coordinate_is_indexing_error() {
        let ds = sample();
        let indexers = Indexers::compress([(
            "longitude",
            Some(Indexer::Coord(CoordRange::new(0.0, 1.0))),
        )]);
        assert!(matches!(ds.sel(&indexers), Err(ProcessingError::Indexing(_))));
    }

    #[test]
    fn test_sel_out_of_range_is_empty() {
        let ds = sample();
        let indexers = Indexers::compress([
            ("lat", Some(Indexer::Coord(CoordRange::new(40.0, 50.0)))),
            ("time", Some(Indexer::Time(DateRange::day(date(2020, 1, 15))))),
        ]);

        let selected = ds.sel(&indexers).unwrap();
        assert_eq!(selected.shape(), (0, 0, 4));
        assert_eq!(selected.variable("lst").unwrap().len(), 0);
        assert_eq!(selected.variable_names(), vec!["lst"]);
    }

    #[test]
    fn test_rename_and_retain() {
        let ds = sample()
            .with_variable("qc", Array3::zeros((2, 3, 4)))
            .unwrap()
            .rename_variable("lst", "temperature")
            .unwrap()
            .retain_variables(&["temperature"])
            .unwrap();
        assert_eq!(ds.variable_names(), vec!["temperature"]);
        assert!(sample().retain_variables(&["sm"]).is_err());
    }

    #[test]
    fn test_with_variable_checks_shape() {
        let ds = GriddedDataset::new("lon", "lat", vec![date(2020, 1, 1)], vec![0.0], vec![0.0]);
        assert!(ds.with_variable("x", Array3::zeros((1, 2, 1))).is_err());
    }

    #[test]
    fn test_concat_time_orders_by_time() {
        let ds = sample();
        let jan = ds
            .sel(&Indexers::compress([(
                "time",
                Some(Indexer::Time(DateRange::day(date(2020, 1, 1)))),
            )]))
            .unwrap();
        let feb = ds
            .sel(&Indexers::compress([(
                "time",
                Some(Indexer::Time(DateRange::day(date(2020, 2, 1)))),
            )]))
            .unwrap();

        let joined = GriddedDataset::concat_time(vec![feb, jan]).unwrap();
        assert_eq!(joined, ds);
    }
}
