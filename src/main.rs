use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use loader::ItemFilter;
use sprint::SprintAggregator;
use types::MetricsTable;

mod config;
mod debug_log;
mod loader;
mod report;
mod sprint;
mod types;
mod utils;
mod work_item;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "sprintlens")]
#[command(version)]
#[command(disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Jira CSV export to analyze (defaults to a file from the datasets directory)
    #[arg(long)]
    file: Option<PathBuf>,

    /// Directory searched for CSV exports
    #[arg(long)]
    datasets_dir: Option<PathBuf>,

    /// Sprint start date (YYYY-MM-DD); inferred when omitted
    #[arg(long, value_parser = utils::parse_cli_date)]
    start: Option<NaiveDate>,

    /// Sprint end date (YYYY-MM-DD); inferred when omitted
    #[arg(long, value_parser = utils::parse_cli_date)]
    end: Option<NaiveDate>,

    /// Only include items on this platform
    #[arg(long)]
    platform: Option<String>,

    /// Only include items with this status
    #[arg(long)]
    status: Option<String>,

    /// Only include items of this issue type
    #[arg(long)]
    issue_type: Option<String>,

    /// Output as JSON instead of text tables
    #[arg(long)]
    json: bool,

    /// Pretty-print JSON instead of a single line
    #[arg(long)]
    pretty: bool,

    /// Use comma-separated number formatting
    #[arg(long)]
    number_comma: bool,

    /// Locale for number formatting (en, de, fr, es, it, ja, ko, zh)
    #[arg(long)]
    locale: Option<String>,

    /// Number of decimal places for story points
    #[arg(long)]
    decimal_places: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sprint-level headline metrics (default)
    Summary,
    /// Metrics broken down by platform
    Platforms,
    /// Metrics broken down by label within one platform
    Labels(LabelsArgs),
    /// Per-contributor delivery within one platform
    Contributors(ContributorsArgs),
    /// Completed story points by platform and issue type
    Types,
    /// Items closed within the sprint
    Closed,
    /// Details for a single issue
    Issue {
        /// Issue key, e.g. BE-123
        key: String,
    },
    /// List available CSV exports
    Datasets,
    /// Manage configuration
    Config(ConfigArgs),
}

#[derive(Args)]
struct LabelsArgs {
    #[arg(long)]
    platform: String,

    /// Only show labels starting with this prefix, e.g. team_
    #[arg(long)]
    prefix: Option<String>,
}

#[derive(Args)]
struct ContributorsArgs {
    #[arg(long)]
    platform: String,

    /// Restrict to items carrying this label
    #[arg(long)]
    label: Option<String>,
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    subcommand: ConfigSubcommands,
}

#[derive(Subcommand)]
enum ConfigSubcommands {
    /// Create default configuration file
    Init {
        #[arg(long, default_value_t = false)]
        overwrite: bool,
    },
    /// Show current configuration
    Show,
    /// Set configuration value
    Set {
        /// Configuration key (full-time-threshold, ai-label, require-platform, datasets-dir, number-comma, locale, decimal-places)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() {
    debug_log::init();
    let mut cli = Cli::parse();

    let config = match config::Config::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            utils::warn_once(format!("WARNING: Ignoring config file: {e:#}"));
            config::Config::default()
        }
    };

    // Merge config defaults with CLI overrides
    let mut format_options = config.number_format();
    format_options.use_comma |= cli.number_comma;
    if let Some(locale) = cli.locale.take() {
        format_options.locale = locale;
    }
    if let Some(places) = cli.decimal_places {
        format_options.decimal_places = places;
    }

    match cli.command.take().unwrap_or(Commands::Summary) {
        Commands::Config(config_args) => handle_config_subcommand(config_args),
        Commands::Datasets => {
            if let Err(e) = run_datasets(&cli, &config) {
                eprintln!("Error listing datasets: {e:#}");
                std::process::exit(1);
            }
        }
        command => {
            if let Err(e) = run_report(&cli, command, &config, &format_options) {
                eprintln!("Error generating report: {e:#}");
                std::process::exit(1);
            }
        }
    }
}

fn datasets_dir(cli: &Cli, config: &config::Config) -> PathBuf {
    cli.datasets_dir
        .clone()
        .unwrap_or_else(|| config.datasets_dir())
}

fn print_json<T: Serialize>(cli: &Cli, value: &T) -> Result<()> {
    let json = report::to_json(value, cli.pretty)?;
    println!("{json}");
    Ok(())
}

fn run_datasets(cli: &Cli, config: &config::Config) -> Result<()> {
    let dir = datasets_dir(cli, config);
    let datasets = loader::discover_datasets(&dir)?;
    let selected = match &cli.file {
        Some(file) => Some(file.clone()),
        None => loader::default_dataset(&dir)?,
    };

    if cli.json {
        let names: Vec<String> = datasets.iter().map(|p| p.display().to_string()).collect();
        return print_json(cli, &names);
    }

    let mut out = std::io::stdout().lock();
    report::render_datasets(&mut out, &dir, &datasets, selected.as_deref())?;
    out.flush()?;
    Ok(())
}

fn resolve_dataset(cli: &Cli, config: &config::Config) -> Result<PathBuf> {
    if let Some(file) = &cli.file {
        return Ok(file.clone());
    }

    let dir = datasets_dir(cli, config);
    loader::default_dataset(&dir)?
        .with_context(|| format!("No CSV datasets found in {}", dir.display()))
}

fn sprint_window(cli: &Cli, path: &Path, items: &[work_item::WorkItem]) -> (NaiveDate, NaiveDate) {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let today = chrono::Local::now().date_naive();
    let (inferred_start, inferred_end) = loader::infer_sprint_window(&file_name, items, today);

    let start = cli.start.unwrap_or(inferred_start);
    let end = cli.end.unwrap_or(inferred_end);
    if start > end {
        utils::warn_once(format!(
            "WARNING: Sprint start {start} is after end {end}; nothing can close in this window."
        ));
    }
    (start, end)
}

fn run_report(
    cli: &Cli,
    command: Commands,
    config: &config::Config,
    format_options: &utils::NumberFormatOptions,
) -> Result<()> {
    let path = resolve_dataset(cli, config)?;
    let load_report = loader::load_csv(&path, &config.loader_options())?;
    if !cli.json {
        report::render_load_report(&mut std::io::stderr().lock(), &path, &load_report)?;
    }

    let (start, end) = sprint_window(cli, &path, &load_report.items);
    let filter = ItemFilter {
        platform: cli.platform.clone(),
        status: cli.status.clone(),
        issue_type: cli.issue_type.clone(),
    };
    let items = filter.apply(load_report.items);
    let sprint = SprintAggregator::with_thresholds(items, start, end, config.metric_thresholds());
    debug_log::log("CLI", "aggregate", &sprint.to_string());

    let mut out = std::io::stdout().lock();
    match command {
        Commands::Summary => {
            let summary = sprint.summary();
            if cli.json {
                return print_json(cli, &summary);
            }
            report::render_summary(&mut out, &summary, format_options)?;
            report::render_label_insights(&mut out, &sprint.label_insights())?;
        }
        Commands::Platforms => {
            let table = MetricsTable {
                key_column: "Platform",
                rows: sprint.platform_metrics(),
            };
            if cli.json {
                return print_json(cli, &table);
            }
            report::render_group_table(
                &mut out,
                "SPRINT METRICS BY PLATFORM",
                table.key_column,
                table.rows,
                format_options,
            )?;
        }
        Commands::Labels(args) => {
            let mut rows = sprint.label_metrics(&args.platform);
            if let Some(prefix) = &args.prefix {
                rows.retain(|row| row.group.starts_with(prefix.as_str()));
            }
            let table = MetricsTable {
                key_column: "Label",
                rows: &rows,
            };
            if cli.json {
                return print_json(cli, &table);
            }
            report::render_group_table(
                &mut out,
                &format!("{} LABEL BREAKDOWN", args.platform.to_uppercase()),
                table.key_column,
                table.rows,
                format_options,
            )?;
        }
        Commands::Contributors(args) => {
            let rows = sprint.contributor_breakdown(&args.platform, args.label.as_deref());
            if cli.json {
                return print_json(cli, &rows);
            }
            report::render_contributors(
                &mut out,
                &args.platform,
                args.label.as_deref(),
                &rows,
                format_options,
            )?;
        }
        Commands::Types => {
            let rows = sprint.capacity_by_type();
            if cli.json {
                return print_json(cli, &rows);
            }
            report::render_capacity_by_type(&mut out, &rows, format_options)?;
        }
        Commands::Closed => {
            let rows = sprint.closed_item_rows();
            if cli.json {
                return print_json(cli, &rows);
            }
            report::render_closed_items(&mut out, &rows, format_options)?;
        }
        Commands::Issue { key } => {
            let Some(item) = sprint.find_item(&key) else {
                let project = key.split('-').next().unwrap_or(&key);
                let similar = sprint.similar_keys(project, 5);
                if similar.is_empty() {
                    anyhow::bail!("Issue {key} not found");
                }
                anyhow::bail!("Issue {key} not found. Similar keys: {}", similar.join(", "));
            };
            let detail = report::ItemDetail {
                item,
                insight: sprint.item_insight(item),
            };
            if cli.json {
                return print_json(cli, &detail);
            }
            report::render_item(&mut out, &detail, format_options)?;
        }
        // Dispatched in main before any dataset is loaded.
        Commands::Datasets | Commands::Config(_) => return Ok(()),
    }

    out.flush()?;
    Ok(())
}

fn handle_config_subcommand(config_args: ConfigArgs) {
    match config_args.subcommand {
        ConfigSubcommands::Init { overwrite } => {
            if let Err(e) = config::create_default_config(overwrite) {
                eprintln!("Error creating config: {e:#}");
                std::process::exit(1);
            }
        }
        ConfigSubcommands::Show => {
            if let Err(e) = config::show_config() {
                eprintln!("Error showing config: {e:#}");
                std::process::exit(1);
            }
        }
        ConfigSubcommands::Set { key, value } => {
            if let Err(e) = config::set_config_value(&key, &value) {
                eprintln!("Error setting config: {e:#}");
                std::process::exit(1);
            }
        }
    }
}
