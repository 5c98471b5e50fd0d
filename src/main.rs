//! Command-line client for the drive service.
//!
//! Usage:
//!   efsdrive [--url URL] [--proxy PROXY] [--session-file FILE] [-v] <COMMAND>

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use efsdrive::config::{ENV_URL, ENV_PROXY};
use efsdrive::progress::TransferProgress;
use efsdrive::{ClientConfig, DriveError, FileEntry, Result, SessionHandle};

const DEFAULT_SESSION_FILE: &str = ".efsdrive_session";

#[derive(Parser, Debug)]
#[command(name = "efsdrive", version, about = "Client for the drive file-storage service")]
struct Cli {
    /// Backend base URL
    #[arg(long, global = true, env = ENV_URL)]
    url: Option<String>,

    /// HTTP/SOCKS proxy for all requests
    #[arg(long, global = true, env = ENV_PROXY)]
    proxy: Option<String>,

    /// File holding the signed-in session between runs
    #[arg(long, global = true, default_value = DEFAULT_SESSION_FILE)]
    session_file: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new account
    Signup {
        username: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign in and save the session
    Signin {
        username: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// End the session and remove the session file
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List a directory
    Ls {
        #[arg(default_value = "")]
        dir: String,
        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
    },
    /// Create directory NAME inside DIR
    Mkdir { dir: String, name: String },
    /// Upload a local file into DIR (the root by default)
    Upload {
        local: PathBuf,
        #[arg(default_value = "")]
        dir: String,
    },
    /// Download a drive file
    Download {
        path: String,
        local: Option<PathBuf>,
    },
    /// Delete a file or directory
    Rm { path: String },
    /// Rename an entry in the listing of this run
    Rename { old: String, new: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let session_file = cli.session_file.clone();
    if let Err(e) = run(cli).await {
        if e.is_unauthorized() {
            let _ = std::fs::remove_file(&session_file);
            eprintln!("Error: {}", e);
            eprintln!("Run `efsdrive signin <USERNAME>` to start a new session.");
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "efsdrive=debug" } else { "efsdrive=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = ClientConfig::from_env();
    if let Some(url) = cli.url {
        config = config.with_base_url(url);
    }
    if let Some(proxy) = cli.proxy {
        config = config.with_proxy(proxy);
    }
    let session_file = cli.session_file;

    match cli.command {
        Command::Signup { username, password } => {
            let password = password_or_prompt(password)?;
            SessionHandle::signup(&config, &username, &password).await?;
            println!("✅ Account {} created", username);
        }
        Command::Signin { username, password } => {
            let password = password_or_prompt(password)?;
            let session = SessionHandle::signin(config, &username, &password).await?;
            session.save(&session_file).await?;
            println!("Logged in as: {}", username);
            println!("💾 Session saved to {}", session_file.display());
            session.shutdown().await;
        }
        Command::Logout => {
            if let Some(session) = SessionHandle::load(config, &session_file).await? {
                session.logout().await?;
                session.shutdown().await;
            }
            remove_session_file(&session_file)?;
            println!("Logged out");
        }
        Command::Whoami => {
            let session = resume(config, &session_file).await?;
            let info = session.account_info().await?;
            println!("User: {}", info.username.as_deref().unwrap_or("(unknown)"));
            if let Some(left) = info.token_expires_in {
                println!("Token expires in {}s", left.as_secs());
            }
            session.shutdown().await;
        }
        Command::Ls { dir, recursive } => {
            let session = resume(config, &session_file).await?;
            let entries = if recursive {
                session.list_recursive(&dir).await?
            } else {
                session.list(&dir).await?
            };
            print_entries(&entries);
            session.shutdown().await;
        }
        Command::Mkdir { dir, name } => {
            let session = resume(config, &session_file).await?;
            let entry = session.mkdir(&dir, &name).await?;
            println!("📁 Created {}", entry.key);
            session.shutdown().await;
        }
        Command::Upload { local, dir } => {
            let session = resume(config, &session_file).await?;
            let bar = progress_bar();
            session.watch_status(progress_callback(bar.clone())).await?;
            let entry = session.upload(&local, &dir).await?;
            bar.finish_and_clear();
            println!("⬆️  Uploaded {}", entry.key);
            session.shutdown().await;
        }
        Command::Download { path, local } => {
            let session = resume(config, &session_file).await?;
            let local = match local {
                Some(local) => local,
                None => PathBuf::from(efsdrive::fs::path::split_path(&path).1),
            };
            let bar = progress_bar();
            session.watch_status(progress_callback(bar.clone())).await?;
            let bytes = session.download_to_file(&path, &local).await?;
            bar.finish_and_clear();
            println!("⬇️  Downloaded {} bytes to {}", bytes, local.display());
            session.shutdown().await;
        }
        Command::Rm { path } => {
            let session = resume(config, &session_file).await?;
            session.rm(&path).await?;
            println!("🗑️  Deleted {}", path);
            session.shutdown().await;
        }
        Command::Rename { old, new } => {
            let session = resume(config, &session_file).await?;
            let (old_parent, _) = efsdrive::fs::path::split_path(old.trim_end_matches('/'));
            session.list(old_parent).await?;
            let changed = session.rename(&old, &new).await?;
            println!("Renamed {} entries (this run only)", changed);
            let files = session.files().await?;
            print_entries(files.entries());
            session.shutdown().await;
        }
    }
    Ok(())
}

async fn resume(config: ClientConfig, session_file: &Path) -> Result<SessionHandle> {
    SessionHandle::load(config, session_file)
        .await?
        .ok_or(DriveError::Unauthorized)
}

fn remove_session_file(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    match password {
        Some(password) => Ok(password),
        None => Ok(rpassword::prompt_password("Password: ")?),
    }
}

fn print_entries(entries: &[FileEntry]) {
    for entry in entries {
        let icon = if entry.is_directory() { "📁" } else { "📄" };
        println!("{} {}", icon, entry.key);
    }
    println!("{} items", entries.len());
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );
    bar
}

fn progress_callback(bar: ProgressBar) -> efsdrive::ProgressCallback {
    Box::new(move |progress: &TransferProgress| {
        match progress.total {
            Some(total) => {
                bar.set_length(total);
                bar.set_position(progress.done.min(total));
            }
            None => {
                bar.set_length(progress.done.max(1));
                bar.set_position(progress.done);
            }
        }
        bar.set_message(progress.filename.clone());
        true
    })
}
