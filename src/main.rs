//! coffer command-line front end.
//!
//! Thin caller of the kernel controllers.
//!
//! Usage:
//!   coffer mkdir / docs
//!   coffer put /docs ~/Downloads/report.pdf
//!   coffer get /docs report.pdf -o report.pdf
//!   coffer ls /docs
//!   coffer check --repair
//!
//! Logging goes to stderr; `RUST_LOG` wins over `logging.filter`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coffer_kernel::{Coffer, CofferConfig, StorageError, StorageResult};
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Encrypted file vault with a self-healing metadata index.
#[derive(Parser, Debug)]
#[command(name = "coffer")]
#[command(about = "Encrypted file vault with a self-healing metadata index")]
struct Args {
    /// Config file (default: ~/.config/coffer/config.ron)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encrypt a local file into a vault directory
    Put {
        /// Vault directory
        dir: PathBuf,
        /// Local file to read
        file: PathBuf,
        /// Name inside the vault (default: the local file name)
        #[arg(long)]
        name: Option<String>,
        /// Overwrite an existing entry
        #[arg(long)]
        replace: bool,
    },
    /// Decrypt a file to stdout or a local path
    Get {
        dir: PathBuf,
        name: String,
        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show a file's record
    Info { dir: PathBuf, name: String },
    /// Move or rename a file
    MvFile {
        from_dir: PathBuf,
        from_name: String,
        to_dir: PathBuf,
        to_name: String,
    },
    /// Delete a file
    RmFile { dir: PathBuf, name: String },
    /// Create a directory
    Mkdir { dir: PathBuf, name: String },
    /// Move or rename a directory with everything in it
    MvDir {
        from_dir: PathBuf,
        from_name: String,
        to_dir: PathBuf,
        to_name: String,
    },
    /// Delete a directory with everything in it
    RmDir { dir: PathBuf, name: String },
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        dir: PathBuf,
    },
    /// Compare the filesystem against the index
    Check {
        /// Fix every mismatch found
        #[arg(long)]
        repair: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match CofferConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("coffer: {e}");
            return ExitCode::FAILURE;
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(args.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("coffer: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &CofferConfig) -> Result<()> {
    let coffer = Coffer::open(config).context("opening store")?;
    let result = dispatch(&coffer, command).await;
    settle(result, coffer.close().await)
}

/// Combine the command outcome with the close outcome. A command failure
/// wins; a close failure after it is only logged.
fn settle(result: Result<()>, closed: StorageResult<()>) -> Result<()> {
    match (result, closed) {
        (Err(e), Err(close)) => {
            tracing::warn!(error = %close, "failed to close store");
            Err(e)
        }
        (result, closed) => result.and(closed.context("closing store")),
    }
}

async fn dispatch(coffer: &Coffer, command: Command) -> Result<()> {
    let files = coffer.files();
    let dirs = coffer.dirs();

    match command {
        Command::Put {
            dir,
            file,
            name,
            replace,
        } => {
            let local = expand(&file);
            let data = tokio::fs::read(&local)
                .await
                .with_context(|| format!("reading {}", local.display()))?;
            let name = match name {
                Some(name) => name,
                None => local
                    .file_name()
                    .context("local path has no file name")?
                    .to_string_lossy()
                    .into_owned(),
            };
            let location = files.create_file(&dir, &name, &data, replace).await?;
            println!("{}", location.display());
        }
        Command::Get { dir, name, output } => {
            let data = files.get_file(&dir, &name).await?;
            match output {
                Some(path) => {
                    let path = expand(&path);
                    tokio::fs::write(&path, &data)
                        .await
                        .with_context(|| format!("writing {}", path.display()))?;
                }
                None => {
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(&data).await?;
                    stdout.flush().await?;
                }
            }
        }
        Command::Info { dir, name } => {
            let record = files.file_info(&dir, &name).await?;
            println!("location:   {}", record.path.join(&record.filename).display());
            println!("kind:       {}", record.kind());
            println!("icon:       {} bytes", record.icon.len());
            println!("nonce:      {}", hex::encode(record.nonce));
            println!("created_at: {}", record.created_at);
            if let Some(updated_at) = record.updated_at {
                println!("updated_at: {updated_at}");
            }
        }
        Command::MvFile {
            from_dir,
            from_name,
            to_dir,
            to_name,
        } => {
            let location = files
                .rename_file(&from_dir, &from_name, &to_dir, &to_name)
                .await?;
            println!("{}", location.display());
        }
        Command::RmFile { dir, name } => files.delete_file(&dir, &name).await?,
        Command::Mkdir { dir, name } => {
            let location = dirs.create_dir(&dir, &name).await?;
            println!("{}", location.display());
        }
        Command::MvDir {
            from_dir,
            from_name,
            to_dir,
            to_name,
        } => {
            let location = dirs
                .rename_dir(&from_dir, &from_name, &to_dir, &to_name)
                .await?;
            println!("{}", location.display());
        }
        Command::RmDir { dir, name } => dirs.delete_dir(&dir, &name).await?,
        Command::Ls { dir } => {
            for location in dirs.list(&dir).await? {
                println!("{}", location.display());
            }
        }
        Command::Check { repair: false } => {
            dirs.check_integrity().await?;
            println!("consistent");
        }
        Command::Check { repair: true } => {
            let report = dirs.scan().await?;
            if report.is_clean() {
                println!("consistent");
            } else {
                println!("{report}");
                let fixed = dirs.repair(&report).await?;
                println!("repaired {fixed} location(s)");
            }
        }
    }

    Ok(())
}

fn expand(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}
