//! Hakobi - policy-driven file uploader
//!
//! Stores local files (or stdin) into an upload directory under the rules
//! of a named policy and prints the per-file results as JSON.

use anyhow::Context;
use clap::Parser;
use hakobi::upload::persist::{LocalPersister, TransferMode};
use hakobi::upload::spool::SpooledFile;
use hakobi::{metrics, Config, ErrorMode, IncomingFile, Policy, Uploader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Hakobi - validate, name and store uploaded files
#[derive(Parser, Debug)]
#[command(name = "hakobi")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Policy to apply, looked up in the configuration file
    #[arg(short, long, default_value = "default")]
    policy: String,

    /// Override the policy's upload directory
    #[arg(short = 'd', long)]
    upload_dir: Option<PathBuf>,

    /// MIME type declared for every file
    #[arg(short = 't', long, default_value = "application/octet-stream")]
    content_type: String,

    /// Client filename to record (required name for stdin, optional for a single file)
    #[arg(short, long)]
    name: Option<String>,

    /// Move files instead of copying them
    #[arg(long = "move")]
    move_files: bool,

    /// Stop at the first failure and exit with an error
    #[arg(long)]
    throw: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Print Prometheus metrics to stderr when done
    #[arg(long)]
    metrics: bool,

    /// Files to upload; `-` reads stdin
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    init_logging(&args)?;
    debug!("Starting Hakobi v{}", hakobi::VERSION);

    let mut policy = load_policy(&args)?;
    if args.files.len() > 1 {
        policy.set_multiple(true);
    }

    let mode = if args.move_files {
        TransferMode::Move
    } else {
        TransferMode::Copy
    };
    let uploader = Uploader::with_persister(policy, LocalPersister::new(mode))?;

    // Spooled stdin must outlive the upload.
    let mut spooled = Vec::new();
    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        if path.as_os_str() == "-" {
            let spool = SpooledFile::from_reader(std::io::stdin().lock())
                .context("Failed to read upload from stdin")?;
            let name = args.name.clone().unwrap_or_else(|| "stdin".to_string());
            files.push(spool.incoming(name, args.content_type.as_str()));
            spooled.push(spool);
        } else {
            let name = match (&args.name, args.files.len()) {
                (Some(name), 1) => name.clone(),
                _ => client_filename(path),
            };
            files.push(incoming_from_path(path, name, &args.content_type));
        }
    }

    let error_mode = if args.throw {
        ErrorMode::Raise
    } else {
        ErrorMode::Report
    };
    let report = uploader.upload(files, error_mode)?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if args.metrics {
        eprint!("{}", metrics::render());
    }

    if report.all_stored() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("Invalid log level")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    Ok(())
}

fn load_policy(args: &Args) -> anyhow::Result<Policy> {
    let mut policy = match &args.config {
        Some(path) => {
            let config = Config::load(path)
                .with_context(|| format!("Failed to load configuration from {:?}", path))?;
            info!("Loaded configuration from {:?}", path);
            config.policy(&args.policy)?
        }
        None => {
            let policy = Policy::default().named(args.policy.as_str());
            if args.upload_dir.is_none() {
                std::fs::create_dir_all(&policy.upload_dir).with_context(|| {
                    format!("Failed to create {}", policy.upload_dir.display())
                })?;
            }
            policy
        }
    };

    if let Some(dir) = &args.upload_dir {
        policy.set_upload_dir(dir)?;
    }

    Ok(policy)
}

fn client_filename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Unreadable paths become entries without a source, reported as `NoFile`.
fn incoming_from_path(path: &Path, name: String, content_type: &str) -> IncomingFile {
    match IncomingFile::from_path(path, name.as_str(), content_type) {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read upload source");
            IncomingFile {
                client_filename: name,
                declared_mime_type: content_type.to_string(),
                size: 0,
                transport_error: 0,
                source: None,
            }
        }
    }
}
