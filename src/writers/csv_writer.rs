use crate::error::Result;
use crate::models::ZonalMeanTable;
use std::io::Write;
use std::path::Path;

/// Writes zonal-mean tables as `time,zone,<variables...>` CSV.
pub struct CsvWriter {
    delimiter: u8,
}

impl CsvWriter {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn write_table(&self, table: &ZonalMeanTable, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_to(table, file)
    }

    pub fn write_to<W: Write>(&self, table: &ZonalMeanTable, writer: W) -> Result<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(writer);

        let mut header = vec!["time".to_string(), "zone".to_string()];
        header.extend(table.columns().iter().cloned());
        csv_writer.write_record(&header)?;

        for row in table.rows() {
            let mut record = vec![row.time.format("%Y-%m-%d").to_string(), row.zone.to_string()];
            record.extend(row.values.iter().map(|v| v.to_string()));
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self::new()
    }
}
