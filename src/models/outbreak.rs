use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError};

/// Spatial scale label of second-level administrative outbreaks.
pub const ADMIN2_SCALE: &str = "admin2";

/// One row of the packaged outbreak table. Columns not listed here are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_period"))]
pub struct OutbreakRecord {
    pub start_date: NaiveDate,

    pub end_date: NaiveDate,

    #[validate(length(min = 1))]
    pub spatial_scale: String,

    #[serde(deserialize_with = "deserialize_id")]
    pub location_period_id: i64,
}

impl OutbreakRecord {
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        spatial_scale: String,
        location_period_id: i64,
    ) -> Self {
        Self {
            start_date,
            end_date,
            spatial_scale,
            location_period_id,
        }
    }

    pub fn start_year(&self) -> i32 {
        self.start_date.year()
    }

    pub fn start_month(&self) -> u32 {
        self.start_date.month()
    }

    /// Whole calendar months between the start and end months.
    pub fn duration_months(&self) -> i32 {
        12 * (self.end_date.year() - self.start_year()) + self.end_date.month() as i32
            - self.start_month() as i32
    }

    pub fn is_admin2(&self) -> bool {
        self.spatial_scale == ADMIN2_SCALE
    }
}

fn validate_period(record: &OutbreakRecord) -> Result<(), ValidationError> {
    if record.end_date < record.start_date {
        return Err(ValidationError::new("end_date_before_start_date"));
    }
    Ok(())
}

// Identifiers are sometimes exported as floats ("1234.0").
fn deserialize_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    if let Ok(id) = trimmed.parse::<i64>() {
        return Ok(id);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.fract() == 0.0 && value.is_finite() => Ok(value as i64),
        _ => Err(serde::de::Error::custom(format!(
            "invalid location_period_id '{}'",
            raw
        ))),
    }
}
