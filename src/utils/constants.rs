// Reference data layout
pub const DEFAULT_RESOURCES_DIR: &str = "resources";
pub const RESOURCES_DIR_ENV: &str = "CHOLERA_RESOURCES_DIR";
pub const OUTBREAKS_FILE: &str = "outbreaks.csv";
pub const SHAPES_DIR: &str = "AfricaShapefiles";
pub const SHAPES_FILE: &str = "total_shp_0427.shp";
pub const SHAPE_ID_FIELD: &str = "lctn_pr";

// Output
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;

// Compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_LZ4: &str = "lz4";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";

// Configuration
pub const DEFAULT_CONFIG_FILE: &str = "cholera.toml";
pub const CONFIG_ENV_PREFIX: &str = "CHOLERA";

// CEDA credentials
pub const DEFAULT_MIN_TTL_MINUTES: i64 = 30;
