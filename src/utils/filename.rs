use crate::utils::constants::DEFAULT_OUTPUT_DIR;
use chrono::{Datelike, Local, NaiveDate};
use std::path::PathBuf;

/// Default output path: output/{kind}-zonal-means-{YYMMDD}.{ext}
pub fn default_output_filename(kind: &str, extension: &str) -> PathBuf {
    output_filename_for(kind, extension, Local::now().date_naive())
}

pub fn output_filename_for(kind: &str, extension: &str, date: NaiveDate) -> PathBuf {
    let filename = format!(
        "{}-zonal-means-{:02}{:02}{:02}.{}",
        kind,
        date.year() % 100,
        date.month(),
        date.day(),
        extension
    );
    PathBuf::from(DEFAULT_OUTPUT_DIR).join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_filename_for_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        let path = output_filename_for("precip", "parquet", date);
        assert_eq!(path, PathBuf::from("output/precip-zonal-means-240307.parquet"));
    }

    #[test]
    fn test_default_output_filename() {
        let filename = default_output_filename("lst", "csv");
        let filename_str = filename.to_string_lossy();

        assert!(filename_str.starts_with("output/"));
        assert!(filename_str.contains("lst-zonal-means-"));
        assert!(filename_str.ends_with(".csv"));
    }
}
