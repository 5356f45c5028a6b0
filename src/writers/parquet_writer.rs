use crate::error::{ProcessingError, Result};
use crate::models::ZonalMeanTable;
use crate::utils::constants::DEFAULT_ROW_GROUP_SIZE;
use arrow::array::{ArrayRef, Date32Array, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

pub struct ParquetWriter {
    compression: Compression,
    row_group_size: usize,
}

impl ParquetWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            "snappy" => Compression::SNAPPY,
            "gzip" => Compression::GZIP(GzipLevel::default()),
            "lz4" => Compression::LZ4,
            "zstd" => Compression::ZSTD(ZstdLevel::default()),
            "none" => Compression::UNCOMPRESSED,
            _ => {
                return Err(ProcessingError::Config(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size.max(1);
        self
    }

    /// Write a zonal-mean table: `time` (Date32), `zone` (Int64), then one
    /// Float64 column per variable.
    pub fn write_table(&self, table: &ZonalMeanTable, path: &Path) -> Result<()> {
        let schema = Self::create_schema(table);
        let batch = Self::table_to_batch(table, schema.clone())?;

        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        Ok(())
    }

    fn create_schema(table: &ZonalMeanTable) -> Arc<Schema> {
        let mut fields = vec![
            Field::new("time", DataType::Date32, false),
            Field::new("zone", DataType::Int64, false),
        ];
        fields.extend(
            table
                .columns()
                .iter()
                .map(|name| Field::new(name.as_str(), DataType::Float64, false)),
        );

        Arc::new(Schema::new(fields))
    }

    fn table_to_batch(table: &ZonalMeanTable, schema: Arc<Schema>) -> Result<RecordBatch> {
        let rows = table.rows();

        let times: Vec<i32> = rows.iter().map(|r| days_since_epoch(r.time)).collect();
        let zones: Vec<i64> = rows.iter().map(|r| r.zone).collect();

        let mut arrays: Vec<ArrayRef> = vec![
            Arc::new(Date32Array::from(times)),
            Arc::new(Int64Array::from(zones)),
        ];
        for column in 0..table.columns().len() {
            let values: Vec<f64> = rows.iter().map(|r| r.values[column]).collect();
            arrays.push(Arc::new(Float64Array::from(values)));
        }

        Ok(RecordBatch::try_new(schema, arrays)?)
    }

    /// Get file statistics
    pub fn get_file_info(&self, path: &Path) -> Result<ParquetFileInfo> {
        use parquet::file::reader::{FileReader, SerializedFileReader};

        let file = File::open(path)?;
        let reader = SerializedFileReader::new(file)?;
        let metadata = reader.metadata();

        let file_metadata = metadata.file_metadata();
        let row_groups = metadata.num_row_groups();
        let total_rows = file_metadata.num_rows();
        let file_size = std::fs::metadata(path)?.len();

        let row_group_sizes = (0..row_groups)
            .map(|i| metadata.row_group(i).num_rows())
            .collect();

        Ok(ParquetFileInfo {
            total_rows,
            row_groups: row_groups as i32,
            row_group_sizes,
            file_size,
            compression: self.compression,
        })
    }
}

impl Default for ParquetWriter {
    fn default() -> Self {
        Self::new()
    }
}

// NaiveDate::default() is 1970-01-01
fn days_since_epoch(date: NaiveDate) -> i32 {
    (date - NaiveDate::default()).num_days() as i32
}

#[derive(Debug)]
pub struct ParquetFileInfo {
    pub total_rows: i64,
    pub row_groups: i32,
    pub row_group_sizes: Vec<i64>,
    pub file_size: u64,
    pub compression: Compression,
}

impl ParquetFileInfo {
    pub fn summary(&self) -> String {
        format!(
            "Parquet File Summary:\n\
            - Total rows: {}\n\
            - Row groups: {}\n\
            - File size: {:.2} MB\n\
            - Compression: {:?}\n\
            - Avg rows per group: {:.0}",
            self.total_rows,
            self.row_groups,
            self.file_size as f64 / 1_048_576.0,
            self.compression,
            self.total_rows as f64 / self.row_groups.max(1) as f64
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ZonalMeanRow;
    use arrow::array::Array;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::NamedTempFile;

    fn table() -> ZonalMeanTable {
        let date = |m| NaiveDate::from_ymd_opt(2021, m, 1).unwrap();
        ZonalMeanTable::new(
            vec!["precip".to_string()],
            vec![
                ZonalMeanRow { time: date(2), zone: 7, values: vec![12.5] },
                ZonalMeanRow { time: date(1), zone: 9, values: vec![3.0] },
                ZonalMeanRow { time: date(1), zone: 7, values: vec![1.5] },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_days_since_epoch() {
        assert_eq!(days_since_epoch(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()), 0);
        assert_eq!(days_since_epoch(NaiveDate::from_ymd_opt(1970, 2, 1).unwrap()), 31);
    }

    #[test]
    fn test_write_table() -> Result<()> {
        let writer = ParquetWriter::new();
        let temp_file = NamedTempFile::new()?;

        writer.write_table(&table(), temp_file.path())?;

        let info = writer.get_file_info(temp_file.path())?;
        assert_eq!(info.total_rows, 3);
        assert!(info.summary().contains("Total rows: 3"));

        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(temp_file.path())?)?.build()?;
        let batch = reader.into_iter().next().unwrap()?;
        assert_eq!(batch.schema().field(0).name(), "time");
        assert_eq!(batch.schema().field(2).name(), "precip");

        let zones = batch.column(1).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(zones.values().to_vec(), vec![7, 9, 7]);
        let values = batch.column(2).as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(values.value(0), 1.5);
        assert_eq!(values.len(), 3);
        Ok(())
    }

    #[test]
    fn test_different_compressions() -> Result<()> {
        for compression in ["snappy", "gzip", "lz4", "zstd", "none"] {
            let writer = ParquetWriter::new().with_compression(compression)?;
            let temp_file = NamedTempFile::new()?;

            let result = writer.write_table(&table(), temp_file.path());
            assert!(result.is_ok(), "Failed with compression: {}", compression);
        }

        assert!(ParquetWriter::new().with_compression("brotli-ish").is_err());
        Ok(())
    }

    #[test]
    fn test_row_group_size() -> Result<()> {
        let writer = ParquetWriter::new().with_row_group_size(2);
        let temp_file = NamedTempFile::new()?;

        writer.write_table(&table(), temp_file.path())?;

        let info = writer.get_file_info(temp_file.path())?;
        assert_eq!(info.row_groups, 2);
        assert_eq!(info.row_group_sizes, vec![2, 1]);
        Ok(())
    }

    #[test]
    fn test_write_empty_table() -> Result<()> {
        let writer = ParquetWriter::new();
        let temp_file = NamedTempFile::new()?;
        let empty = ZonalMeanTable::new(vec!["sm".to_string()], vec![])?;

        writer.write_table(&empty, temp_file.path())?;
        assert_eq!(writer.get_file_info(temp_file.path())?.total_rows, 0);
        Ok(())
    }
}
