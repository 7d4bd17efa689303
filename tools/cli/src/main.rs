//! GitBox CLI - share files through a git repository, end-to-end encrypted.
//!
//! Files are encrypted locally, committed to a public repository as opaque
//! envelopes, and shared as links carrying the secret in their fragment.

mod settings;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use gitbox_common::{AccessToken, GitRepository};
use gitbox_crypto::CryptoBackend;
use gitbox_queue::{
    DrainOutcome, FsBlobCache, Removal, TaskLedger, UploadQueue, UploadStatus, UploadTask,
};
use gitbox_storage::{AccessChecker, GitHubAccessChecker, GitHubClient, GitHubStore};
use gitbox_transport::{sanitize_filename, GitBoxTransport};

use settings::{parse_repository_url, Settings};

#[derive(Parser)]
#[command(name = "gitbox")]
#[command(about = "GitBox - End-to-end encrypted file sharing over git repositories")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (default: <config dir>/gitbox/settings.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage repository and token settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Queue files for upload and upload every pending file.
    Upload {
        /// Files to upload.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Retry pending and failed uploads.
    Retry,

    /// List upload tasks.
    Tasks,

    /// Remove an upload task, deleting its remote object if it was uploaded.
    Remove {
        /// Task id (or a unique prefix of it).
        id: String,
    },

    /// Download and decrypt a shared file.
    Download {
        /// Share link.
        link: String,

        /// Output directory.
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },

    /// Delete the remote object behind a share link.
    Delete {
        /// Share link.
        link: String,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Verify and store the target repository and token.
    Set {
        /// Repository URL (https://github.com/<owner>/<repo>) or <owner>/<repo>.
        #[arg(short, long)]
        repo: String,

        /// Access token (prompted for when omitted).
        #[arg(short, long)]
        token: Option<String>,

        /// Branch receiving uploads (default: the repository's default branch).
        #[arg(short, long)]
        branch: Option<String>,

        /// Crypto backend: "secretbox" or "aes256gcm".
        #[arg(long)]
        backend: Option<CryptoBackend>,
    },

    /// Show current settings.
    Show,

    /// Remove stored settings.
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings_path = match cli.config {
        Some(path) => path,
        None => Settings::default_path()?,
    };

    match cli.command {
        Commands::Settings { action } => match action {
            SettingsAction::Set {
                repo,
                token,
                branch,
                backend,
            } => cmd_settings_set(&settings_path, &repo, token, branch, backend).await,
            SettingsAction::Show => cmd_settings_show(&settings_path),
            SettingsAction::Clear => cmd_settings_clear(&settings_path),
        },

        Commands::Upload { files } => cmd_upload(&settings_path, &files).await,

        Commands::Retry => cmd_retry(&settings_path).await,

        Commands::Tasks => cmd_tasks(&settings_path).await,

        Commands::Remove { id } => cmd_remove(&settings_path, &id).await,

        Commands::Download {
            link,
            output,
            force,
        } => cmd_download(&settings_path, &link, &output, force).await,

        Commands::Delete { link } => cmd_delete(&settings_path, &link).await,

        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "gitbox", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Prompt for the token without echoing it.
fn prompt_token() -> Result<AccessToken> {
    let token = rpassword::prompt_password("Access token: ").context("Failed to read token")?;
    Ok(AccessToken::new(token))
}

/// Transport over the GitHub store and access check.
fn build_transport(settings: &Settings) -> Result<Arc<GitBoxTransport>> {
    let client = GitHubClient::new()?;
    Ok(Arc::new(GitBoxTransport::from_config(
        settings.transport.clone(),
        Arc::new(GitHubStore::with_client(client.clone())),
        Arc::new(GitHubAccessChecker::with_client(client)),
    )))
}

/// Upload queue persisted under `<data dir>/gitbox`.
async fn open_queue(settings: &Settings) -> Result<UploadQueue> {
    let data_dir = dirs::data_dir()
        .context("No data directory on this platform")?
        .join("gitbox");

    let queue = UploadQueue::open(
        build_transport(settings)?,
        Arc::new(FsBlobCache::new(data_dir.join("payloads"))),
        TaskLedger::new(data_dir.join("upload_tasks.json")),
    )
    .await
    .context("Failed to open upload queue")?;

    Ok(queue)
}

/// Verify and store repository settings.
async fn cmd_settings_set(
    path: &Path,
    repo: &str,
    token: Option<String>,
    branch: Option<String>,
    backend: Option<CryptoBackend>,
) -> Result<()> {
    let (owner, name) = parse_repository_url(repo)?;
    let token = match token {
        Some(token) => AccessToken::new(token),
        None => prompt_token()?,
    };

    info!("Verifying write access to {}/{}", owner, name);
    let checker = GitHubAccessChecker::new()?;
    let default_branch = checker
        .check_write_access(&owner, &name, &token)
        .await
        .map_err(|e| anyhow::anyhow!("{} {}", e.code(), e))?;

    let mut settings = Settings::load(path)?;
    let branch = branch.unwrap_or(default_branch);
    settings.repository = Some(GitRepository::new(owner, name, branch));
    settings.token = token;
    if let Some(backend) = backend {
        settings.transport.crypto_backend = backend;
    }
    settings.save(path)?;

    println!("Settings saved to {}", path.display());
    if let Some(repository) = &settings.repository {
        println!("  Repository: {}", repository);
    }
    println!("  Crypto: {}", settings.transport.crypto_backend);

    Ok(())
}

/// Print settings with the token redacted.
fn cmd_settings_show(path: &Path) -> Result<()> {
    let settings = Settings::load(path)?;

    println!("Settings ({}):", path.display());
    match &settings.repository {
        Some(repository) => println!("  Repository: {}", repository),
        None => println!("  Repository: (not set)"),
    }
    let token = if settings.token().is_empty() {
        "(not set)"
    } else {
        "(set)"
    };
    println!("  Token: {}", token);
    println!("  App URL: {}", settings.transport.app_url);
    println!("  Crypto: {}", settings.transport.crypto_backend);
    println!("  Trusted hosts: {}", settings.transport.trusted_raw_hosts.join(", "));

    Ok(())
}

/// Remove the settings file.
fn cmd_settings_clear(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => println!("Settings cleared."),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => println!("No settings to clear."),
        Err(e) => return Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
    Ok(())
}

/// Enqueue files and drain the queue.
async fn cmd_upload(settings_path: &Path, files: &[PathBuf]) -> Result<()> {
    let settings = Settings::load(settings_path)?;
    let repository = settings.require_repository()?.clone();
    let queue = open_queue(&settings).await?;

    for file in files {
        let data = tokio::fs::read(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let modified_at = tokio::fs::metadata(file)
            .await
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());

        let metadata = queue.enqueue(name, &data, modified_at).await?;
        println!("Queued {} ({})", metadata.name, format_bytes(metadata.size));
    }

    drain_and_report(&queue, &repository, &settings.token()).await
}

/// Drain the queue without adding files.
async fn cmd_retry(settings_path: &Path) -> Result<()> {
    let settings = Settings::load(settings_path)?;
    let repository = settings.require_repository()?.clone();
    let queue = open_queue(&settings).await?;

    drain_and_report(&queue, &repository, &settings.token()).await
}

async fn drain_and_report(
    queue: &UploadQueue,
    repository: &GitRepository,
    token: &AccessToken,
) -> Result<()> {
    match queue.drain(repository, token).await? {
        DrainOutcome::AlreadyRunning => println!("An upload pass is already running."),
        DrainOutcome::Completed(report) => {
            println!(
                "Uploaded {}, failed {}, gave up on {}.",
                report.uploaded, report.failed, report.exhausted
            );
        }
    }

    print_tasks(&queue.tasks().await);
    Ok(())
}

/// List upload tasks.
async fn cmd_tasks(settings_path: &Path) -> Result<()> {
    let settings = Settings::load(settings_path)?;
    let queue = open_queue(&settings).await?;
    print_tasks(&queue.tasks().await);
    Ok(())
}

fn print_tasks(tasks: &[UploadTask]) {
    if tasks.is_empty() {
        println!("No upload tasks.");
        return;
    }

    for task in tasks {
        println!(
            "  [{:<8}] {}  {} ({})",
            task.status.as_str(),
            &task.file.id[..task.file.id.len().min(8)],
            task.file.name,
            format_bytes(task.file.size)
        );
        match task.status {
            UploadStatus::Uploaded => {
                if let Some(link) = &task.download_link {
                    println!("             {}", link);
                }
            }
            UploadStatus::Failed => {
                if let Some(error) = &task.last_error {
                    println!(
                        "             {} {} (retries: {})",
                        error.code, error.message, task.retry_count
                    );
                }
            }
            _ => {}
        }
    }
}

/// Remove a task by id or unique id prefix.
async fn cmd_remove(settings_path: &Path, id: &str) -> Result<()> {
    let settings = Settings::load(settings_path)?;
    let queue = open_queue(&settings).await?;

    let removal = remove_matching(&queue, id, &settings.token()).await?;
    let name = removal.task.file.name;
    if let Some(e) = removal.remote_error {
        return Err(anyhow::Error::new(e))
            .with_context(|| format!("Task {} removed, but its remote object was not", name));
    }

    println!("Removed {}", name);
    Ok(())
}

/// Remove the one task whose id starts with `id`.
async fn remove_matching(queue: &UploadQueue, id: &str, token: &AccessToken) -> Result<Removal> {
    let matches: Vec<UploadTask> = queue
        .tasks()
        .await
        .into_iter()
        .filter(|t| t.file.id.starts_with(id))
        .collect();
    let task = match matches.as_slice() {
        [task] => task,
        [] => bail!("No task matches {}", id),
        _ => bail!("{} matches {} tasks, use a longer prefix", id, matches.len()),
    };

    let removal = queue
        .remove_task(&task.file.id, token)
        .await
        .with_context(|| format!("Task {} was not removed", task.file.name))?;
    Ok(removal)
}

/// Download a shared file into `output`.
async fn cmd_download(settings_path: &Path, link: &str, output: &Path, force: bool) -> Result<()> {
    let settings = Settings::load(settings_path)?;
    let transport = build_transport(&settings)?;

    let file = transport
        .resolve_share_link(link)
        .await
        .map_err(|e| anyhow::anyhow!("{} {}", e.code(), e))?;

    let target = output.join(sanitize_filename(&file.name));
    if !force && tokio::fs::try_exists(&target).await.unwrap_or(false) {
        bail!("{} already exists, use --force to overwrite", target.display());
    }

    tokio::fs::create_dir_all(output)
        .await
        .with_context(|| format!("Failed to create {}", output.display()))?;
    tokio::fs::write(&target, &file.content)
        .await
        .with_context(|| format!("Failed to write {}", target.display()))?;

    println!(
        "Downloaded {} ({})",
        target.display(),
        format_bytes(file.content.len() as u64)
    );
    Ok(())
}

/// Delete the remote object behind a link.
async fn cmd_delete(settings_path: &Path, link: &str) -> Result<()> {
    let settings = Settings::load(settings_path)?;
    let transport = build_transport(&settings)?;

    transport
        .delete_shared_object(link, &settings.token())
        .await
        .map_err(|e| anyhow::anyhow!("{} {}", e.code(), e))?;

    println!("Deleted. The envelope is still reachable through the repository history.");
    Ok(())
}

/// Human-readable size with decimal units.
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 7] = ["bytes", "KB", "MB", "GB", "TB", "PB", "EB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }

    if unit > 0 && value < 10.0 {
        format!("{:.1} {}", value, UNITS[unit])
    } else {
        format!("{:.0} {}", value, UNITS[unit])
    }
}
