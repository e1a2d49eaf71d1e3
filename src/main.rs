mod config;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use sparkscan_blob::{AzureBlobService, BlobStore, ClientSecretCredential, LocalStore};
use sparkscan_logs::{
    ConsoleSink, DEFAULT_DRIVER_SEGMENT, DEFAULT_LOG_SUFFIX, LogScanner, RecordFormat, ScanPolicy,
    ScanSummary,
};

use crate::config::ScanConfig;

/// Directory under `--local-dir` that receives written-back records
const LOCAL_OUTPUT_DIR: &str = ".sparkscan-out";

/// Sparkscan - Extract job and user context from Spark driver event logs
#[derive(Parser, Debug)]
#[command(name = "sparkscan")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Service principal config file (JSON, or TOML by extension)
    #[arg(short, long, value_name = "PATH", default_value = "spnconfig.json")]
    config: PathBuf,

    /// Scan a local directory tree instead of the storage account
    #[arg(long, value_name = "DIR")]
    local_dir: Option<PathBuf>,

    /// Upload each driver log's records to the destination container
    #[arg(long)]
    write_back: bool,

    /// Print each record on a single line
    #[arg(long)]
    compact: bool,

    /// Only print records, no progress lines
    #[arg(short, long)]
    quiet: bool,

    /// Path segment identifying driver logs
    #[arg(long, default_value = DEFAULT_DRIVER_SEGMENT)]
    driver_segment: String,

    /// Name suffix identifying event logs
    #[arg(long, default_value = DEFAULT_LOG_SUFFIX)]
    log_suffix: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let policy = ScanPolicy::default()
        .with_driver_segment(args.driver_segment.as_str())
        .with_log_suffix(args.log_suffix.as_str());

    let format = if args.compact {
        RecordFormat::Compact
    } else {
        RecordFormat::Pretty
    };
    let mut sink = ConsoleSink::new(io::stdout()).with_format(format);
    if args.quiet {
        sink = sink.quiet();
    }

    let summary = match &args.local_dir {
        Some(dir) => {
            let destination = args
                .write_back
                .then(|| LocalStore::new(dir.join(LOCAL_OUTPUT_DIR)));
            scan(LocalStore::new(dir), destination, policy, sink).await?
        }
        None => {
            let config = ScanConfig::load(&args.config)?;
            info!(?config, "loaded configuration");

            let service = connect(&config)?;
            let source = service.container(&config.src_container_name)?;
            let destination = if args.write_back {
                Some(service.container(&config.dest_container_name)?)
            } else {
                None
            };
            scan(source, destination, policy, sink)
                .await
                .with_context(|| format!("Scan of container {} failed", config.src_container_name))?
        }
    };

    if !args.quiet {
        eprintln!(
            "Scanned {} driver log(s) in {} folder(s): {} record(s), {} unreadable event(s)",
            summary.driver_logs,
            summary.folders,
            summary.records_emitted,
            summary.extraction_failures
        );
    }

    Ok(())
}

async fn scan<S: BlobStore>(
    source: S,
    destination: Option<S>,
    policy: ScanPolicy,
    sink: ConsoleSink<io::Stdout>,
) -> Result<ScanSummary> {
    let mut scanner = LogScanner::new(source, policy, sink);
    if let Some(destination) = destination {
        scanner = scanner.with_destination(destination);
    }
    Ok(scanner.scan().await?)
}

/// Build the storage client for the configured account
fn connect(config: &ScanConfig) -> Result<AzureBlobService> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("sparkscan/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")?;

    let credential = ClientSecretCredential::new(
        &config.tenant_id,
        &config.client_id,
        &config.client_secret,
        http.clone(),
    )
    .with_authority_host(config.authority_host());

    AzureBlobService::new(
        &config.storage_account_name,
        config.blob_endpoint_suffix(),
        credential,
        http,
    )
    .with_context(|| {
        format!(
            "Failed to create client for storage account {}",
            config.storage_account_name
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["sparkscan"]);
        assert_eq!(args.config, PathBuf::from("spnconfig.json"));
        assert_eq!(args.driver_segment, "driver/");
        assert_eq!(args.log_suffix, "spark-events");
        assert!(!args.write_back);
    }

    #[test]
    fn test_connect_builds_account_url() {
        let config = ScanConfig::parse(
            r#"{
                "tenant_id": "t", "client_id": "c", "client_secret": "s",
                "storage_account_name": "acct",
                "src_container_name": "logs", "dest_container_name": "out"
            }"#,
            config::ConfigFormat::Json,
        )
        .unwrap();
        let service = connect(&config).unwrap();
        assert_eq!(
            service.account_url().as_str(),
            "https://acct.blob.core.windows.net/"
        );
    }
}
