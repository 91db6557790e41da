//! SFTP upload client binary
//!
//! Usage: sftp-put <local-file> <user@host:remote-dir>
//!
//! Run with: cargo run --bin sftp-put -- report.csv bob@examplehost:/incoming

use anyhow::Context;
use clap::Parser;
use secrecy::SecretString;
use sftp_put::{
    logging, upload_file, ClientConfig, Error, HostKeyPolicy, LogFormat, RemoteTarget,
    RusshConnector, UploadReport,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Upload a file to a remote directory over SFTP", long_about = None)]
struct Args {
    /// Local file to upload
    local: PathBuf,

    /// Destination in the form user@host:remote-dir
    target: String,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SSH port
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// Private key used when no password is given
    #[arg(short = 'i', long)]
    identity: Option<PathBuf>,

    /// Seconds allowed for each connection attempt
    #[arg(long)]
    timeout: Option<u64>,

    /// Host key checking mode
    #[arg(long, value_enum)]
    host_key_policy: Option<HostKeyPolicy>,

    /// Skip the password prompt and authenticate with the private key
    #[arg(long)]
    no_password: bool,

    /// Verbose logging (debug level)
    #[arg(short, long)]
    verbose: bool,

    /// Log format (json or text)
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Log file path
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    };

    let log_guard = match logging::init(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    let exit_code = match run(&args, &config).await {
        Ok(report) => {
            println!(
                "File: '{}' uploaded successfully ({} bytes)",
                report.remote_path, report.bytes
            );
            0
        }
        Err(e) => {
            if e.is_client_error() {
                warn!(
                    event = "upload_failed",
                    exit_code = e.exit_code(),
                    "Upload failed: {}",
                    e
                );
            } else {
                error!(
                    event = "upload_failed",
                    exit_code = e.exit_code(),
                    "Upload failed: {}",
                    e
                );
            }
            eprintln!("error: {}", e);
            e.exit_code()
        }
    };

    // Flush the file writer before exiting
    drop(log_guard);
    std::process::exit(exit_code);
}

/// Merge the optional config file with command-line overrides
fn load_config(args: &Args) -> anyhow::Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ClientConfig::default(),
    };

    if let Some(port) = args.port {
        config.port = port;
    }

    if let Some(identity) = &args.identity {
        config.key_path = identity.clone();
    }

    if let Some(timeout) = args.timeout {
        config.connect_timeout_secs = timeout;
    }

    if let Some(policy) = args.host_key_policy {
        config.host_key_policy = policy;
    }

    if args.verbose {
        config.logging.level = "debug".to_string();
    }

    if let Some(format) = args.log_format {
        config.logging.format = format;
    }

    if let Some(log_file) = &args.log_file {
        config.logging.file = Some(log_file.clone());
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn run(args: &Args, config: &ClientConfig) -> sftp_put::Result<UploadReport> {
    let target = RemoteTarget::parse(&args.target)?;

    // Checked before prompting so a typo does not cost a password entry
    if !args.local.is_file() {
        return Err(Error::LocalFileNotFound(args.local.clone()));
    }

    let password = if args.no_password {
        None
    } else {
        let password = rpassword::prompt_password("Enter password: ")?;
        Some(SecretString::from(password))
    };

    info!(
        event = "upload_starting",
        local = %args.local.display(),
        target = %target,
        "Uploading {} to {}",
        args.local.display(),
        target
    );

    let connector = Arc::new(RusshConnector::new(config));
    upload_file(&args.local, &target, password, config, connector).await
}
