use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use twitter_imager::downloader::HttpDownloader;
use twitter_imager::logging::{self, LOG_PREFIX};
use twitter_imager::secrets::SecretManagerClient;
use twitter_imager::storage::S3Connector;
use twitter_imager::{
    remove_duplicates, AppError, Config, Export, PubSubMessage, TriggerFile, TwitterImager,
};

/// Exit status for failures another delivery of the same trigger will not fix.
const EXIT_FATAL: i32 = 1;
/// Exit status for transient failures worth redelivering.
const EXIT_RETRYABLE: i32 = 2;

#[derive(Parser)]
#[command(name = "twitter-imager", version, about = "Archive the images referenced by a Twitter export")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process one export: download its images and upload them next to it
    Run {
        /// Pub/Sub push envelope as JSON, from a file or `-` for stdin
        #[arg(long, conflicts_with_all = ["path", "name"])]
        message: Option<String>,

        /// Folder of the export in the bucket
        #[arg(long, requires = "name")]
        path: Option<String>,

        /// File name of the export
        #[arg(long, requires = "path")]
        name: Option<String>,
    },
    /// Print the deduplicated image URLs of a local export file
    Extract { export: PathBuf },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init_with_target(log_target(&cli.command));

    let result = match cli.command {
        Command::Run {
            message,
            path,
            name,
        } => run(message, path, name).await,
        Command::Extract { export } => extract(export),
    };

    if let Err(e) = result {
        log::error!("{} {:#}", LOG_PREFIX, e);
        std::process::exit(exit_code(&e));
    }
}

/// `extract` prints its result on stdout, so its logs go to stderr.
fn log_target(command: &Command) -> env_logger::Target {
    match command {
        Command::Extract { .. } => env_logger::Target::Stderr,
        Command::Run { .. } => env_logger::Target::Stdout,
    }
}

fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<AppError>() {
        Some(e) if !e.is_fatal() => EXIT_RETRYABLE,
        _ => EXIT_FATAL,
    }
}

async fn run(
    message: Option<String>,
    path: Option<String>,
    name: Option<String>,
) -> anyhow::Result<()> {
    let trigger = match (message, path, name) {
        (Some(source), _, _) => read_trigger(&source)?,
        (None, Some(path), Some(name)) => TriggerFile::new(path, name),
        _ => bail!("either --message or both --path and --name are required"),
    };

    let config = Config::from_env().context("loading configuration")?;
    let connector = S3Connector::new(&config.region, &config.endpoint_url, &config.bucket);
    let secrets = SecretManagerClient::new().context("building secret manager client")?;
    let downloader = HttpDownloader::new().context("building download client")?;

    let imager = TwitterImager::new(
        config,
        Arc::new(secrets),
        Arc::new(connector),
        Arc::new(downloader),
    );

    let report = imager
        .run(&trigger)
        .await
        .with_context(|| format!("processing {}", trigger.object_key()))?;

    log::debug!("Run report: {}", serde_json::to_string(&report)?);
    Ok(())
}

fn read_trigger(source: &str) -> anyhow::Result<TriggerFile> {
    let raw = if source == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("reading message from stdin")?;
        raw
    } else {
        std::fs::read_to_string(source).with_context(|| format!("reading {}", source))?
    };

    Ok(PubSubMessage::from_json(&raw)?.decode()?)
}

fn extract(export: PathBuf) -> anyhow::Result<()> {
    let body = std::fs::read(&export).with_context(|| format!("reading {}", export.display()))?;
    let export = Export::from_slice(&body).context("decoding export")?;

    let urls = remove_duplicates(export.image_urls());
    for url in &urls {
        println!("{}", url);
    }

    log::info!("{} Extracted {} URLs.", LOG_PREFIX, urls.len());
    Ok(())
}
