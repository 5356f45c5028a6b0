use crate::error::Result;
use crate::models::OutbreakRecord;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;
use validator::Validate;

/// Reads the outbreak table (CSV with a header row).
pub struct OutbreakReader {
    validate: bool,
}

impl OutbreakReader {
    pub fn new() -> Self {
        Self { validate: true }
    }

    pub fn with_validation(validate: bool) -> Self {
        Self { validate }
    }

    pub fn read_outbreaks(&self, path: &Path) -> Result<Vec<OutbreakRecord>> {
        let file = File::open(path)?;
        let records = self.read_from(file)?;
        debug!(path = %path.display(), records = records.len(), "Read outbreak table");
        Ok(records)
    }

    pub fn read_from<R: Read>(&self, reader: R) -> Result<Vec<OutbreakRecord>> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        for result in csv_reader.deserialize() {
            let record: OutbreakRecord = result?;
            if self.validate {
                record.validate()?;
            }
            records.push(record);
        }

        Ok(records)
    }
}

impl Default for OutbreakReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessingError;
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TABLE: &str = "\
outbreak_number,start_date,end_date,spatial_scale,location_period_id,total_suspected_cases
1,2010-11-20,2011-02-03,admin2,1234,55
2,2012-01-05,2012-03-30,admin1,77.0,12
";

    #[test]
    fn test_read_outbreaks_file() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        write!(temp_file, "{}", TABLE)?;

        let records = OutbreakReader::new().read_outbreaks(temp_file.path())?;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].start_date, NaiveDate::from_ymd_opt(2010, 11, 20).unwrap());
        assert_eq!(records[0].location_period_id, 1234);
        assert!(records[0].is_admin2());
        assert_eq!(records[1].location_period_id, 77);
        assert_eq!(records[1].duration_months(), 2);
        Ok(())
    }

    #[test]
    fn test_invalid_period_is_rejected() {
        let table = "start_date,end_date,spatial_scale,location_period_id\n2012-05-01,2012-04-01,admin2,1\n";

        let strict = OutbreakReader::new().read_from(table.as_bytes());
        assert!(matches!(strict, Err(ProcessingError::Validation(_))));

        let lenient = OutbreakReader::with_validation(false).read_from(table.as_bytes());
        assert_eq!(lenient.unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_id_is_csv_error() {
        let table = "start_date,end_date,spatial_scale,location_period_id\n2012-01-01,2012-04-01,admin2,12.5\n";
        let result = OutbreakReader::new().read_from(table.as_bytes());
        assert!(matches!(result, Err(ProcessingError::Csv(_))));
    }
}
