//! Command-line interface.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::archive;
use crate::auth;
use crate::config::{validate_month, Config};
use crate::error::{ExporterError, Result};
use crate::exporter::{self, DownloadOptions};
use crate::posts::MonthRange;
use crate::validation::validate_export;

/// LiveJournal exporter - download journal content into a portable archive.
#[derive(Parser)]
#[command(name = "lj-exporter")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download posts, comments and inbox messages into one archive file.
    Download(DownloadArgs),

    /// Convert an existing archive between formats (picked by extension).
    Convert {
        /// Archive to read
        input: PathBuf,

        /// Archive to write
        output: PathBuf,
    },

    /// Report data-quality findings for an archive without changing it.
    Validate {
        /// Archive to check
        input: PathBuf,
    },
}

#[derive(Args)]
pub struct DownloadArgs {
    /// LiveJournal username (overrides the config file)
    #[arg(short, long)]
    pub username: Option<String>,

    /// LiveJournal password (overrides the config file)
    #[arg(short, long)]
    pub password: Option<String>,

    /// Output file path; the extension picks the format (.yaml, .json, .xml)
    #[arg(short, long, default_value = "lj-backup.yaml")]
    pub output: PathBuf,

    /// Skip posts
    #[arg(long)]
    pub no_posts: bool,

    /// Skip comments
    #[arg(long)]
    pub no_comments: bool,

    /// Skip inbox messages
    #[arg(long)]
    pub no_inbox: bool,

    /// Start year for posts (the four range bounds go together)
    #[arg(long)]
    pub start_year: Option<i32>,

    /// Start month for posts (1-12)
    #[arg(long)]
    pub start_month: Option<u32>,

    /// End year for posts
    #[arg(long)]
    pub end_year: Option<i32>,

    /// End month for posts (1-12)
    #[arg(long)]
    pub end_month: Option<u32>,

    /// Inbox folder view to download (repeatable; default: all)
    #[arg(long = "folder")]
    pub folders: Vec<String>,

    /// Config file path (default: ~/.lj-exporter/config.yaml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Download(args) => download_command(&args),
        Commands::Convert { input, output } => convert_command(&input, &output),
        Commands::Validate { input } => validate_command(&input),
    }
}

/// Execute the download command.
fn download_command(args: &DownloadArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(username) = &args.username {
        config.username = Some(username.clone());
    }
    if let Some(password) = &args.password {
        config.password = Some(password.clone());
    }
    if !args.folders.is_empty() {
        config.inbox_folders = args.folders.clone();
    }

    let (Some(username), Some(password)) = (config.username.clone(), config.password.clone())
    else {
        return Err(ExporterError::MissingCredentials);
    };

    let range = resolve_range(&config, args)?;

    println!(
        "{} journal of {} to {}",
        style("Exporting").bold(),
        style(&username).cyan(),
        style(args.output.display()).green()
    );
    println!();

    let pb = spinner();
    pb.enable_steady_tick(Duration::from_millis(100));

    pb.set_message("Authenticating...");
    let session = match auth::login(&config, &username, &password) {
        Ok(session) => session,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e);
        }
    };

    let options = DownloadOptions {
        posts: !args.no_posts,
        comments: !args.no_comments,
        inbox: !args.no_inbox,
        range,
    };

    pb.set_message("Downloading content...");
    let mut export = match exporter::download_journal(&session, &config, &username, &options) {
        Ok(export) => export,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e);
        }
    };

    pb.set_message("Writing archive...");
    let saved = archive::save(&mut export, &args.output);
    pb.finish_and_clear();
    saved?;

    println!(
        "{} {}",
        style("Saved to:").green().bold(),
        args.output.display()
    );
    println!("  Posts: {}", export.metadata.post_count);
    println!("  Comments: {}", export.metadata.comment_count);
    println!("  Usermap: {} users", export.usermap.len());
    println!("  Inbox: {} messages", export.metadata.inbox_count);

    Ok(())
}

/// Execute the convert command.
fn convert_command(input: &Path, output: &Path) -> Result<()> {
    let mut export = archive::load(input)?;
    archive::save(&mut export, output)?;

    println!(
        "{} {} to {}",
        style("Converted").green().bold(),
        input.display(),
        output.display()
    );
    Ok(())
}

/// Execute the validate command. Findings are advisory and never change the
/// exit code.
fn validate_command(input: &Path) -> Result<()> {
    let export = archive::load(input)?;
    let findings = validate_export(&export);

    if findings.is_empty() {
        println!("{} no issues found", style("OK:").green().bold());
    } else {
        println!(
            "{} {} finding(s):",
            style("Warning:").yellow().bold(),
            findings.len()
        );
        for finding in findings {
            println!("  - {finding}");
        }
    }

    Ok(())
}

/// Load configuration: explicit path, then the default location, then
/// built-in defaults.
fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return Config::load(path);
    }

    match Config::default_path() {
        Some(path) if path.exists() => Config::load(&path),
        _ => Ok(Config::default()),
    }
}

/// Merge CLI range flags over config values; all four bounds go together.
fn resolve_range(config: &Config, args: &DownloadArgs) -> Result<Option<MonthRange>> {
    let start_year = args.start_year.or(config.posts_start_year);
    let start_month = args.start_month.or(config.posts_start_month);
    let end_year = args.end_year.or(config.posts_end_year);
    let end_month = args.end_month.or(config.posts_end_month);

    match (start_year, start_month, end_year, end_month) {
        (None, None, None, None) => Ok(None),
        (Some(start_year), Some(start_month), Some(end_year), Some(end_month)) => {
            validate_month(start_month)?;
            validate_month(end_month)?;
            Ok(Some(MonthRange {
                start_year,
                start_month,
                end_year,
                end_month,
            }))
        }
        _ => Err(ExporterError::IncompleteRange),
    }
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb
}
