//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use wikiport_core::{MigrateResult, ProgressReporter};
use wikiport_crawler::{HtmlNavigationReader, HttpFetcher, NavSelectors};
use wikiport_shared::{AppConfig, MigrateConfig, init_config, load_config, load_config_from};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// wikiport: move a wiki into a static docs tree without breaking its links.
#[derive(Parser)]
#[command(
    name = "wikiport",
    version,
    about = "Migrate a navigated documentation wiki into a static document tree.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.wikiport/wikiport.toml).
    #[arg(long, global = true, env = "WIKIPORT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Read the source site, resolve content and links, write documents and the index.
    Migrate(MigrateArgs),

    /// Write documents from a previously persisted index, without fetching.
    Emit {
        /// Index file to read (defaults to output.index_path).
        #[arg(long)]
        index: Option<PathBuf>,

        /// Output document root (defaults to output.target_dir).
        #[arg(long, env = "WIKIPORT_OUTPUT_DIR")]
        out: Option<PathBuf>,
    },

    /// Fix remaining anchor and source links in an already-emitted tree.
    FixLinks {
        /// Index file to read (defaults to output.index_path).
        #[arg(long)]
        index: Option<PathBuf>,

        /// Emitted document root (defaults to output.target_dir).
        #[arg(long, env = "WIKIPORT_OUTPUT_DIR")]
        docs: Option<PathBuf>,

        /// Repository blob URL prefix for source links.
        #[arg(long, env = "WIKIPORT_REPO_URL")]
        repo_url: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `wikiport migrate`.
#[derive(Args, Debug, Default)]
pub(crate) struct MigrateArgs {
    /// Base URL of the source site.
    #[arg(long, env = "WIKIPORT_SOURCE_URL")]
    pub source_url: Option<String>,

    /// Repository blob URL prefix for source links.
    #[arg(long, env = "WIKIPORT_REPO_URL")]
    pub repo_url: Option<String>,

    /// Output document root.
    #[arg(long, env = "WIKIPORT_OUTPUT_DIR")]
    pub out: Option<PathBuf>,

    /// Where to write the JSON index.
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// Only write the index, no documents.
    #[arg(long)]
    pub no_emit: bool,

    /// Exit with an error if any page ends up without content.
    #[arg(long)]
    pub strict: bool,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "wikiport=info",
        1 => "wikiport=debug",
        _ => "wikiport=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Migrate(args) => cmd_migrate(config_path, &args).await,
        Command::Emit { index, out } => cmd_emit(config_path, index, out),
        Command::FixLinks {
            index,
            docs,
            repo_url,
        } => cmd_fix_links(config_path, index, docs, repo_url),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

/// Layer `migrate` flags over file values.
fn apply_migrate_args(config: &mut AppConfig, args: &MigrateArgs) {
    if let Some(url) = &args.source_url {
        config.source.base_url = url.clone();
    }
    if let Some(url) = &args.repo_url {
        config.repository.blob_url_prefix = url.clone();
    }
    if let Some(out) = &args.out {
        config.output.target_dir = out.to_string_lossy().into_owned();
    }
    if let Some(index) = &args.index {
        config.output.index_path = index.to_string_lossy().into_owned();
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_migrate(config_path: Option<&Path>, args: &MigrateArgs) -> Result<()> {
    let mut app = load_app_config(config_path)?;
    apply_migrate_args(&mut app, args);
    let config = MigrateConfig::try_from(&app)?;

    info!(
        source_url = %config.source_url,
        target_dir = %config.target_dir.display(),
        emit = !args.no_emit,
        "migrating documentation site"
    );

    let fetcher = HttpFetcher::from_config(&config)?;
    let navigation = HtmlNavigationReader::new(fetcher.clone(), NavSelectors::from_config(&config));
    let reporter = CliProgress::new();

    let result =
        wikiport_core::migrate(&config, &navigation, &fetcher, !args.no_emit, &reporter).await?;

    println!();
    println!("  Migration complete!");
    println!("  Run:         {}", result.run_id);
    println!("  Pages:       {}", result.pages);
    println!(
        "  Content:     {} bulk, {} fallback, {} missing",
        result.content.from_bulk,
        result.content.from_fallback,
        result.pages_without_content()
    );
    println!(
        "  Links:       {} rewritten, {} unresolved",
        result.links.links, result.links.unresolved
    );
    if let Some(emitted) = &result.emitted {
        println!(
            "  Documents:   {} written to {}, {} failed",
            emitted.written,
            config.target_dir.display(),
            emitted.failed
        );
    }
    println!("  Index:       {}", result.index_path.display());
    println!("  Time:        {:.1}s", result.elapsed.as_secs_f64());
    println!();

    if args.strict && result.pages_without_content() > 0 {
        for reference in &result.content.without_content {
            eprintln!("  no content: {reference}");
        }
        return Err(eyre!(
            "{} page(s) have no content (--strict)",
            result.pages_without_content()
        ));
    }

    Ok(())
}

fn cmd_emit(config_path: Option<&Path>, index: Option<PathBuf>, out: Option<PathBuf>) -> Result<()> {
    let app = load_app_config(config_path)?;
    let index = index.unwrap_or_else(|| PathBuf::from(&app.output.index_path));
    let out = out.unwrap_or_else(|| PathBuf::from(&app.output.target_dir));

    info!(index = %index.display(), out = %out.display(), "emitting from index");

    let reporter = CliProgress::new();
    let report = wikiport_core::emit_from_index(&index, &out, &app.output.extension, &reporter)?;
    reporter.spinner.finish_and_clear();

    println!(
        "Wrote {} document(s) to {} ({} without content, {} skipped, {} failed)",
        report.written,
        out.display(),
        report.empty,
        report.skipped,
        report.failed
    );
    Ok(())
}

fn cmd_fix_links(
    config_path: Option<&Path>,
    index: Option<PathBuf>,
    docs: Option<PathBuf>,
    repo_url: Option<String>,
) -> Result<()> {
    let app = load_app_config(config_path)?;
    let index = index.unwrap_or_else(|| PathBuf::from(&app.output.index_path));
    let docs = docs.unwrap_or_else(|| PathBuf::from(&app.output.target_dir));
    let repo_url = repo_url.unwrap_or_else(|| app.repository.blob_url_prefix.clone());

    if repo_url.trim().is_empty() {
        return Err(eyre!(
            "repository.blob_url_prefix is not set (use --repo-url or WIKIPORT_REPO_URL)"
        ));
    }

    let report =
        wikiport_core::fix_links_from_index(&index, &docs, &app.output.extension, &repo_url)?;

    println!(
        "Scanned {} file(s), changed {}: {} anchor(s) converted, {} citation(s) fixed",
        report.files_scanned, report.files_changed, report.anchors_converted, report.citations_fixed
    );
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load_app_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn page_fetched(&self, reference: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Fetching [{current}/{total}] {reference}"));
    }

    fn page_emitted(&self, path: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Writing [{current}/{total}] {path}"));
    }

    fn done(&self, _result: &MigrateResult) {
        self.spinner.finish_and_clear();
    }
}
