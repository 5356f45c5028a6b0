//! Remote access through netCDF-C. With a DAP-enabled libnetcdf the library
//! opens OPeNDAP URLs directly and honours `~/.dodsrc` for client certificates.

use crate::error::{ProcessingError, Result};
use crate::models::{GriddedDataset, Indexer, Indexers, TIME_DIM};
use crate::sources::{DatasetEngine, DatasetRequest};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use ndarray::Array3;
use std::ops::Range;
use tracing::debug;

const LON_CANDIDATES: [&str; 2] = ["lon", "longitude"];
const LAT_CANDIDATES: [&str; 2] = ["lat", "latitude"];

#[derive(Debug, Clone, Default)]
pub struct NetcdfEngine;

impl NetcdfEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DatasetEngine for NetcdfEngine {
    async fn open_dataset(&self, url: &str, request: &DatasetRequest) -> Result<GriddedDataset> {
        let url = url.to_string();
        let request = request.clone();
        tokio::task::spawn_blocking(move || read_selection(&url, &request)).await?
    }
}

fn read_selection(url: &str, request: &DatasetRequest) -> Result<GriddedDataset> {
    let file = netcdf::open(url)
        .map_err(|e| ProcessingError::Transport(format!("Failed to open {}: {}", url, e)))?;

    let lon_name = find_variable(&file, &LON_CANDIDATES)?;
    let lat_name = find_variable(&file, &LAT_CANDIDATES)?;

    let longitudes = read_coordinate(&file, &lon_name)?;
    let latitudes = read_coordinate(&file, &lat_name)?;
    let times = read_times(&file)?;

    let lon_range = coordinate_range(&request.indexers, &lon_name, &longitudes)?;
    let lat_range = coordinate_range(&request.indexers, &lat_name, &latitudes)?;
    let time_range = time_range(&request.indexers, &times)?;

    if let Some((name, _)) = request
        .indexers
        .iter()
        .find(|(name, _)| *name != lon_name && *name != lat_name && *name != TIME_DIM)
    {
        return Err(ProcessingError::Indexing(format!(
            "Dataset has no coordinate named '{}'",
            name
        )));
    }

    let names: Vec<String> = match &request.variables {
        Some(names) => names.clone(),
        None => gridded_variables(&file, &lon_name, &lat_name),
    };

    let mut dataset = GriddedDataset::new(
        lon_name.clone(),
        lat_name.clone(),
        times[time_range.clone()].to_vec(),
        latitudes[lat_range.clone()].to_vec(),
        longitudes[lon_range.clone()].to_vec(),
    );

    for name in names {
        let var = file.variable(&name).ok_or_else(|| {
            ProcessingError::MissingData(format!("Dataset has no variable named '{}'", name))
        })?;
        let shape = (time_range.len(), lat_range.len(), lon_range.len());
        // nothing selected: no hyperslab to read
        if shape.0 == 0 || shape.1 == 0 || shape.2 == 0 {
            dataset = dataset.with_variable(name, Array3::zeros(shape))?;
            continue;
        }
        let raw: Vec<f64> = var.get_values((
            time_range.clone(),
            lat_range.clone(),
            lon_range.clone(),
        ))?;
        let values = unpack(&var, raw);
        let data = Array3::from_shape_vec(shape, values)
            .map_err(|e| ProcessingError::InvalidFormat(format!("Variable '{}': {}", name, e)))?;
        dataset = dataset.with_variable(name, data)?;
    }

    debug!(url = %url, shape = ?dataset.shape(), "Read remote selection");
    Ok(dataset)
}

fn find_variable(file: &netcdf::File, candidates: &[&str]) -> Result<String> {
    candidates
        .iter()
        .find(|name| file.variable(name).is_some())
        .map(|name| name.to_string())
        .ok_or_else(|| {
            ProcessingError::InvalidFormat(format!("None of the coordinates {:?} found", candidates))
        })
}

fn read_coordinate(file: &netcdf::File, name: &str) -> Result<Vec<f64>> {
    let var = file
        .variable(name)
        .ok_or_else(|| ProcessingError::MissingData(format!("{} variable", name)))?;
    Ok(var.get_values::<f64, _>(..)?)
}

/// Decode a CF `"<unit> since <date>"` time axis to calendar dates.
fn read_times(file: &netcdf::File) -> Result<Vec<NaiveDate>> {
    let var = file
        .variable(TIME_DIM)
        .ok_or_else(|| ProcessingError::MissingData("time variable".to_string()))?;
    let units = match var.attribute_value("units") {
        Some(Ok(netcdf::AttributeValue::Str(units))) => units,
        _ => {
            return Err(ProcessingError::InvalidFormat(
                "time variable has no units".to_string(),
            ))
        }
    };
    let offsets: Vec<f64> = var.get_values(..)?;
    decode_times(&units, &offsets)
}

fn decode_times(units: &str, offsets: &[f64]) -> Result<Vec<NaiveDate>> {
    let (unit, origin) = units
        .split_once(" since ")
        .ok_or_else(|| ProcessingError::InvalidFormat(format!("Unsupported time units '{}'", units)))?;

    let origin = origin.trim();
    let origin = NaiveDateTime::parse_from_str(origin, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(origin, "%Y-%m-%dT%H:%M:%SZ"))
        .or_else(|_| {
            NaiveDate::parse_from_str(&origin[..origin.len().min(10)], "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        })?;

    let seconds_per_unit = match unit.trim() {
        "seconds" | "second" | "s" => 1.0,
        "minutes" | "minute" => 60.0,
        "hours" | "hour" | "h" => 3600.0,
        "days" | "day" | "d" => 86400.0,
        other => {
            return Err(ProcessingError::InvalidFormat(format!(
                "Unsupported time unit '{}'",
                other
            )))
        }
    };

    Ok(offsets
        .iter()
        .map(|&offset| {
            let seconds = (offset * seconds_per_unit).round() as i64;
            (origin + Duration::seconds(seconds)).date()
        })
        .collect())
}

/// Contiguous index range selected on a monotonic coordinate; empty when the
/// range matches nothing.
fn coordinate_range(indexers: &Indexers, name: &str, values: &[f64]) -> Result<Range<usize>> {
    match indexers.get(name) {
        None => Ok(0..values.len()),
        Some(Indexer::Coord(range)) => Ok(contiguous(values.iter().map(|v| range.contains(*v)))),
        Some(Indexer::Time(_)) => Err(ProcessingError::Indexing(format!(
            "'{}' is not a time coordinate",
            name
        ))),
    }
}

fn time_range(indexers: &Indexers, times: &[NaiveDate]) -> Result<Range<usize>> {
    match indexers.get(TIME_DIM) {
        None => Ok(0..times.len()),
        Some(Indexer::Time(range)) => Ok(contiguous(times.iter().map(|t| range.contains(*t)))),
        Some(Indexer::Coord(_)) => Err(ProcessingError::Indexing(
            "time must be selected with a date range".to_string(),
        )),
    }
}

fn contiguous(mask: impl Iterator<Item = bool>) -> Range<usize> {
    let selected: Vec<usize> = mask.enumerate().filter(|(_, m)| *m).map(|(i, _)| i).collect();
    match (selected.first(), selected.last()) {
        (Some(&first), Some(&last)) => first..last + 1,
        _ => 0..0,
    }
}

fn gridded_variables(file: &netcdf::File, lon_name: &str, lat_name: &str) -> Vec<String> {
    file.variables()
        .filter(|var| {
            let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
            dims.len() == 3 && dims[0] == TIME_DIM && dims[1] == lat_name && dims[2] == lon_name
        })
        .map(|var| var.name())
        .collect()
}

fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn get_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f64::try_from(attr_value).ok()
}

/// Apply `_FillValue`, `scale_factor` and `add_offset`.
fn unpack(var: &netcdf::Variable, raw: Vec<f64>) -> Vec<f64> {
    let fill = get_f64_attr(var, "_FillValue");
    let scale = get_f64_attr(var, "scale_factor").unwrap_or(1.0);
    let offset = get_f64_attr(var, "add_offset").unwrap_or(0.0);

    raw.into_iter()
        .map(|v| match fill {
            Some(fill) if v == fill => f64::NAN,
            _ => v * scale + offset,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_days_since() {
        let dates = decode_times("days since 1970-01-01 00:00:00", &[0.0, 31.0]).unwrap();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(1970, 2, 1).unwrap()
            ]
        );
    }

    #[test]
    fn test_contiguous_range() {
        assert_eq!(contiguous([false, true, true, false].into_iter()), 1..3);
        assert!(contiguous([false, false].into_iter()).is_empty());
    }
}
