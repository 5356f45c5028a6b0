use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Date parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("Parquet write error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    #[cfg(feature = "netcdf")]
    #[error("netCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Indexing error: {0}")]
    Indexing(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Missing required data: {0}")]
    MissingData(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl ProcessingError {
    /// Whether the failure is a transport-level I/O problem worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            ProcessingError::Io(_) | ProcessingError::Transport(_) => true,
            ProcessingError::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}
