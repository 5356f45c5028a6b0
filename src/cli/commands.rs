use crate::auth::{authenticate, AuthOptions, CredentialPaths, OnlineCaClient};
use crate::cli::args::{Cli, Commands, OutputFormat};
use crate::config::{min_ttl_from_minutes, Settings};
use crate::error::Result;
use crate::processors::ZonalAggregator;
use crate::readers::ReferenceData;
use crate::sources::{self, lst, DatasetEngine, DatasetOpener};
use crate::utils::constants::DEFAULT_CONFIG_FILE;
use crate::utils::filename::default_output_filename;
use crate::utils::progress::ProgressReporter;
use crate::writers::{CsvWriter, ParquetWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose);

    let config_file = cli
        .config
        .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE).to_path_buf());
    let settings = Settings::load(Some(&config_file))?;

    match cli.command {
        Commands::ZonalMeans {
            dataset,
            time,
            output_file,
            format,
            compression,
            max_workers,
            resources_dir,
        } => {
            let dir = resources_dir.unwrap_or_else(|| settings.resources_dir.clone());
            let regions = with_reference(dir, |reference| reference.regions(None))?;
            println!("Computing {} zonal means for {}", dataset.display_name(), time);
            println!("Regions: {}", regions.len());

            let opener = DatasetOpener::new(dataset_engine()?).with_policy(settings.retry.to_policy()?);
            let aggregator = ZonalAggregator::new(max_workers.unwrap_or(settings.max_workers));
            println!("Workers: {}", aggregator.max_workers());

            let progress = ProgressReporter::new_spinner("Fetching and aggregating...", false);
            let table = sources::zonal_means(dataset, opener, &aggregator, &regions, time).await?;
            progress.finish_with_message(&format!(
                "Computed {} rows over {} zones ({})",
                table.len(),
                table.zones().len(),
                dataset.units()
            ));

            let output_file = output_file
                .unwrap_or_else(|| default_output_filename(dataset.slug(), format.extension()));
            if let Some(parent) = output_file.parent() {
                std::fs::create_dir_all(parent)?;
            }

            match format {
                OutputFormat::Csv => CsvWriter::new().write_table(&table, &output_file)?,
                OutputFormat::Parquet => {
                    let compression = compression.unwrap_or_else(|| settings.output.compression.clone());
                    let writer = ParquetWriter::new().with_compression(&compression)?;
                    writer.write_table(&table, &output_file)?;
                    println!("\n{}", writer.get_file_info(&output_file)?.summary());
                }
            }

            info!(path = %output_file.display(), rows = table.len(), "Wrote zonal means");
            println!("Output file: {}", output_file.display());
        }

        Commands::Auth {
            username,
            password,
            force,
            min_ttl_minutes,
        } => {
            let min_ttl = match min_ttl_minutes {
                Some(minutes) => min_ttl_from_minutes(minutes)?,
                None => settings.auth.min_ttl()?,
            };
            let options = AuthOptions::new(CredentialPaths::from_home()?)
                .with_min_ttl(min_ttl)
                .with_force(force);

            let ca = OnlineCaClient::new()?;
            let not_after = authenticate(&ca, &username, &password, &options).await?;

            println!("Certificate: {}", options.paths.pem_file.display());
            println!("OPeNDAP client config: {}", options.paths.dodsrc_file.display());
            println!("Valid until: {}", not_after);
        }

        Commands::Outbreaks { resources_dir } => {
            let dir = resources_dir.unwrap_or_else(|| settings.resources_dir.clone());
            with_reference(dir, |reference| {
                let outbreaks = reference.outbreaks()?;
                let admin2 = reference.within_admin2()?;
                let months = reference.start_month_range(None)?;

                println!("Outbreaks: {}", outbreaks.len());
                println!("Admin2 outbreaks: {}", admin2.len());
                if let (Some(first), Some(last)) = (months.first(), months.last()) {
                    println!(
                        "Admin2 start months: {} to {} ({} months)",
                        first.format("%Y-%m"),
                        last.format("%Y-%m"),
                        months.len()
                    );
                }
                println!("Admin2 regions with shapes: {}", reference.regions(None)?.len());
                Ok(())
            })?;
        }

        Commands::LstUrl { date } => {
            println!("{}", lst::opendap_url(date));
        }
    }

    Ok(())
}

/// Run `f` against the process-wide reference data when it is rooted at
/// `dir`, so repeated lookups share its memoized tables.
fn with_reference<T>(dir: PathBuf, f: impl FnOnce(&ReferenceData) -> Result<T>) -> Result<T> {
    let global = ReferenceData::global();
    if global.resources_dir() == dir.as_path() {
        f(global)
    } else {
        f(&ReferenceData::new(dir))
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    // A subscriber may already be installed (tests, embedding applications).
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(feature = "netcdf")]
fn dataset_engine() -> Result<Arc<dyn DatasetEngine>> {
    Ok(Arc::new(sources::NetcdfEngine::new()))
}

#[cfg(not(feature = "netcdf"))]
fn dataset_engine() -> Result<Arc<dyn DatasetEngine>> {
    Err(crate::error::ProcessingError::Config(
        "Remote dataset access needs the `netcdf` feature (cargo build --features netcdf)"
            .to_string(),
    ))
}
