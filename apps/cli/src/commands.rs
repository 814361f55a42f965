//! CLI command definitions and routing.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use pagepitch_core::{ProgressReporter, load_leads, run_outreach};
use pagepitch_leads::sanitize_url;
use pagepitch_renderer::ReportRenderer;
use pagepitch_scorer::PageSpeedClient;
use pagepitch_shared::{
    AppConfig, LeadRecord, RecordOutcome, RenderConfig, RunTally, RuntimeConfig, ScoringConfig,
    init_config, load_config, load_config_from,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// PagePitch: PageSpeed-backed outreach for lead spreadsheets.
#[derive(Parser)]
#[command(
    name = "pagepitch",
    version,
    about = "Score lead websites with PageSpeed Insights and email each lead a PDF report.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.pagepitch/pagepitch.toml).
    #[arg(long, global = true, env = "PAGEPITCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Directory for per-run log files.
    #[arg(long, default_value = "logs", global = true)]
    pub log_dir: PathBuf,

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
    /// Score, render and email every lead in a spreadsheet.
    Run {
        /// Lead spreadsheet (defaults to [input].spreadsheet).
        spreadsheet: Option<PathBuf>,

        /// Worksheet name (defaults to the first sheet).
        #[arg(long)]
        sheet: Option<String>,
    },

    /// Resolve columns and sanitize a spreadsheet without contacting anyone.
    Leads {
        /// Lead spreadsheet.
        spreadsheet: PathBuf,

        /// Worksheet name (defaults to the first sheet).
        #[arg(long)]
        sheet: Option<String>,
    },

    /// Fetch the PageSpeed report for one website.
    Score {
        /// Website, with or without scheme.
        url: String,
    },

    /// Render the hosted PageSpeed report for one website to a PDF.
    Render {
        /// Website, with or without scheme.
        url: String,

        /// Output PDF path.
        output: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

impl Command {
    /// Only full pipeline runs keep a log file.
    pub(crate) fn writes_log_file(&self) -> bool {
        matches!(self, Self::Run { .. })
    }
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
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli, log_file: Option<PathBuf>) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run { spreadsheet, sheet } => {
            cmd_run(config_path, spreadsheet, sheet, log_file.as_deref()).await
        }
        Command::Leads { spreadsheet, sheet } => cmd_leads(&spreadsheet, sheet.as_deref()),
        Command::Score { url } => cmd_score(config_path, &url).await,
        Command::Render { url, output } => cmd_render(config_path, &url, &output).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn app_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    config_path: Option<&Path>,
    spreadsheet: Option<PathBuf>,
    sheet: Option<String>,
    log_file: Option<&Path>,
) -> Result<()> {
    // Credentials are checked before any record is read.
    let config = app_config(config_path)?;
    let runtime = RuntimeConfig::resolve(&config, spreadsheet, sheet)?;

    info!(
        spreadsheet = %runtime.spreadsheet.display(),
        artifacts = %runtime.pipeline.artifact_dir.display(),
        "starting outreach run"
    );

    let reporter = CliProgress::new();
    let tally = run_outreach(&runtime, &reporter).await?;

    println!();
    println!("  Sent:    {}", tally.sent);
    println!("  Failed:  {}", tally.failed);
    println!("  Skipped: {}", tally.skipped);
    if let Some(path) = log_file {
        println!("  Log:     {}", path.display());
    }
    println!();

    Ok(())
}

fn cmd_leads(spreadsheet: &Path, sheet: Option<&str>) -> Result<()> {
    let sanitized = load_leads(spreadsheet, sheet)?;

    for (i, lead) in sanitized.leads.iter().enumerate() {
        println!("{:>4}  {} | {} | {}", i + 1, lead.name, lead.website, lead.email);
    }

    println!();
    println!("  Leads:            {}", sanitized.leads.len());
    println!("  Missing fields:   {}", sanitized.dropped_missing);
    println!("  Invalid email:    {}", sanitized.dropped_invalid_email);
    println!("  Duplicate email:  {}", sanitized.dropped_duplicates);
    println!();

    Ok(())
}

async fn cmd_score(config_path: Option<&Path>, url: &str) -> Result<()> {
    let config = app_config(config_path)?;
    let client = PageSpeedClient::new(&ScoringConfig::resolve(&config)?)?;

    let report = client
        .score(url)
        .await
        .map_err(|e| eyre!("could not score '{url}': {e}"))?;

    println!();
    println!("  URL:                     {}", report.tested_url);
    println!("  Performance:             {}/100", report.score);
    println!("  First Contentful Paint:  {}", report.first_contentful_paint);
    println!("  Speed Index:             {}", report.speed_index);
    println!("  Time to Interactive:     {}", report.time_to_interactive);
    println!();

    Ok(())
}

async fn cmd_render(config_path: Option<&Path>, url: &str, output: &Path) -> Result<()> {
    let config = app_config(config_path)?;
    let target = sanitize_url(url).ok_or_else(|| eyre!("'{url}' is not a usable website URL"))?;
    let renderer = ReportRenderer::new(&RenderConfig::from(&config))?;

    let spinner = spinner();
    spinner.set_message(format!("Rendering report for {target}"));
    let result = renderer.render(&target, output).await;
    spinner.finish_and_clear();

    let success = result.map_err(|e| eyre!("report rendering failed: {e}"))?;
    if !output.is_file() {
        return Err(eyre!("renderer finished but {} was not written", output.display()));
    }

    println!(
        "Report written to {} ({:?} attempt{})",
        output.display(),
        success.attempt,
        if success.markers_complete { "" } else { ", partial page" }
    );
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = app_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        Self { spinner: spinner() }
    }
}

impl ProgressReporter for CliProgress {
    fn started(&self, total: usize) {
        self.spinner.set_message(format!("{total} leads to process"));
    }

    fn record_started(&self, index: usize, total: usize, lead: &LeadRecord) {
        self.spinner
            .set_message(format!("[{index}/{total}] {} ({})", lead.website, lead.email));
    }

    fn record_finished(&self, _index: usize, outcome: &RecordOutcome) {
        if let RecordOutcome::Failed { reason } = outcome {
            self.spinner.set_message(format!("last send failed: {reason}"));
        }
    }

    fn done(&self, tally: &RunTally) {
        self.spinner.finish_with_message(format!("Completed. {tally}"));
    }
}
