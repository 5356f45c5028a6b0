use crate::models::TimeSelector;
use crate::sources::DatasetKind;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cholera-climate")]
#[command(about = "Zonal means of climate datasets over cholera outbreak regions")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Settings file [default: cholera.toml]")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute zonal means of a dataset over the admin2 outbreak regions
    ZonalMeans {
        #[arg(short, long, value_enum)]
        dataset: DatasetKind,

        #[arg(
            short,
            long,
            value_parser = parse_time,
            help = "Date (YYYY-MM-DD) or range (YYYY-MM-DD..YYYY-MM-DD)"
        )]
        time: TimeSelector,

        #[arg(
            short,
            long,
            help = "Output file path [default: output/{dataset}-zonal-means-{YYMMDD}.{ext}]"
        )]
        output_file: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Parquet)]
        format: OutputFormat,

        #[arg(short, long, help = "Parquet compression [default: from settings]")]
        compression: Option<String>,

        #[arg(long)]
        max_workers: Option<usize>,

        #[arg(long, help = "Directory holding outbreaks.csv and AfricaShapefiles/")]
        resources_dir: Option<PathBuf>,
    },

    /// Obtain a CEDA client certificate and write ~/.dodsrc
    Auth {
        #[arg(short, long, env = "CEDA_USERNAME")]
        username: String,

        #[arg(short, long, env = "CEDA_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long, help = "Renew even if the cached certificate is still valid")]
        force: bool,

        #[arg(long, value_parser = clap::value_parser!(i64).range(0..=525_600))]
        min_ttl_minutes: Option<i64>,
    },

    /// Summarize the packaged outbreak table
    Outbreaks {
        #[arg(long)]
        resources_dir: Option<PathBuf>,
    },

    /// Print the OPeNDAP URL of the monthly LST file for a date
    LstUrl {
        #[arg(short, long)]
        date: NaiveDate,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

fn parse_time(s: &str) -> Result<TimeSelector, String> {
    s.parse::<TimeSelector>().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_zonal_means() {
        let cli = Cli::try_parse_from([
            "cholera-climate",
            "zonal-means",
            "--dataset",
            "sm",
            "--time",
            "2019-01-01..2019-03-31",
            "--format",
            "csv",
        ])
        .unwrap();

        match cli.command {
            Commands::ZonalMeans {
                dataset,
                time,
                format,
                output_file,
                ..
            } => {
                assert_eq!(dataset, DatasetKind::Sm);
                assert!(matches!(time, TimeSelector::Range(_)));
                assert_eq!(format, OutputFormat::Csv);
                assert!(output_file.is_none());
            }
            _ => panic!("expected zonal-means"),
        }
    }

    #[test]
    fn test_invalid_time_is_rejected() {
        let result = Cli::try_parse_from([
            "cholera-climate",
            "zonal-means",
            "--dataset",
            "precip",
            "--time",
            "2019-03-01..2019-01-01",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_lst_url() {
        let cli = Cli::try_parse_from(["cholera-climate", "-v", "lst-url", "--date", "2004-02-15"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::LstUrl { .. }));
    }

    #[test]
    fn test_min_ttl_minutes_is_bounded() {
        let args = |ttl: &str| {
            Cli::try_parse_from([
                "cholera-climate",
                "auth",
                "--username",
                "someone",
                "--password",
                "secret",
                "--min-ttl-minutes",
                ttl,
            ])
        };

        assert!(args("45").is_ok());
        assert!(args("-1").is_err());
        assert!(args(&i64::MAX.to_string()).is_err());
    }
}
