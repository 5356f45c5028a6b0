use crate::error::{ProcessingError, Result};
use crate::models::{Region, RegionSet};
use crate::utils::constants::SHAPE_ID_FIELD;
use geo::MultiPolygon;
use shapefile::dbase::{FieldValue, Record};
use shapefile::Polygon;
use std::path::Path;
use tracing::debug;

/// Reads administrative polygons and their location-period ids from a
/// polygon shapefile with dBase attributes.
pub struct ShapeReader {
    id_field: String,
}

impl ShapeReader {
    pub fn new() -> Self {
        Self {
            id_field: SHAPE_ID_FIELD.to_string(),
        }
    }

    pub fn with_id_field(id_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
        }
    }

    pub fn read_regions(&self, path: &Path) -> Result<RegionSet> {
        let shapes = shapefile::read_as::<_, Polygon, Record>(path)?;
        let regions = self.regions_from_shapes(shapes)?;
        debug!(path = %path.display(), regions = regions.len(), "Read shapefile");
        Ok(regions)
    }

    pub fn regions_from_shapes(&self, shapes: Vec<(Polygon, Record)>) -> Result<RegionSet> {
        shapes
            .into_iter()
            .map(|(polygon, record)| {
                let id = record_id(&record, &self.id_field)?;
                Ok(Region::new(id, MultiPolygon::<f64>::from(polygon)))
            })
            .collect()
    }
}

impl Default for ShapeReader {
    fn default() -> Self {
        Self::new()
    }
}

fn record_id(record: &Record, field: &str) -> Result<i64> {
    let value = record.get(field).ok_or_else(|| {
        ProcessingError::MissingData(format!("Shape record has no '{}' field", field))
    })?;

    let id = match value {
        FieldValue::Numeric(Some(v)) | FieldValue::Double(v) => float_id(*v),
        FieldValue::Float(Some(v)) => float_id(f64::from(*v)),
        FieldValue::Integer(v) => Some(i64::from(*v)),
        FieldValue::Character(Some(s)) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().and_then(float_id))
        }
        _ => None,
    };

    id.ok_or_else(|| {
        ProcessingError::InvalidFormat(format!("Invalid '{}' value: {:?}", field, value))
    })
}

fn float_id(value: f64) -> Option<i64> {
    (value.is_finite() && value.fract() == 0.0).then_some(value as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;
    use shapefile::{Point, PolygonRing};

    fn record(value: FieldValue) -> Record {
        let mut record = Record::default();
        record.insert(SHAPE_ID_FIELD.to_string(), value);
        record
    }

    fn square(x: f64, y: f64) -> Polygon {
        Polygon::new(PolygonRing::Outer(vec![
            Point::new(x, y),
            Point::new(x, y + 1.0),
            Point::new(x + 1.0, y + 1.0),
            Point::new(x + 1.0, y),
            Point::new(x, y),
        ]))
    }

    #[test]
    fn test_record_id_variants() {
        assert_eq!(record_id(&record(FieldValue::Numeric(Some(1234.0))), SHAPE_ID_FIELD).unwrap(), 1234);
        assert_eq!(record_id(&record(FieldValue::Integer(7)), SHAPE_ID_FIELD).unwrap(), 7);
        assert_eq!(
            record_id(&record(FieldValue::Character(Some(" 42 ".to_string()))), SHAPE_ID_FIELD).unwrap(),
            42
        );
        assert!(record_id(&record(FieldValue::Numeric(None)), SHAPE_ID_FIELD).is_err());
        assert!(record_id(&record(FieldValue::Numeric(Some(1.5))), SHAPE_ID_FIELD).is_err());
        assert!(record_id(&Record::default(), SHAPE_ID_FIELD).is_err());
    }

    #[test]
    fn test_regions_from_shapes() {
        let shapes = vec![
            (square(10.0, 0.0), record(FieldValue::Numeric(Some(5.0)))),
            (square(12.0, 3.0), record(FieldValue::Numeric(Some(6.0)))),
        ];

        let regions = ShapeReader::new().regions_from_shapes(shapes).unwrap();
        assert_eq!(regions.ids(), vec![5, 6]);

        let first = &regions.regions()[0];
        assert!((first.geometry.unsigned_area() - 1.0).abs() < 1e-12);
        let bounds = regions.total_bounds().unwrap();
        assert_eq!((bounds.min().x, bounds.min().y), (10.0, 0.0));
        assert_eq!((bounds.max().x, bounds.max().y), (13.0, 4.0));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = ShapeReader::new().read_regions(Path::new("does/not/exist.shp"));
        assert!(result.is_err());
    }
}
