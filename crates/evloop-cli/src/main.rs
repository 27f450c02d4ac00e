#![deny(unsafe_code)]

//! evloop CLI: run configured record-processing analyses.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use evloop_config::AppConfig;
use evloop_core::{BuildInfo, EventLoop, LogCollector, LogReader, RunReport};

/// evloop: drive a chain of tools over every record of a dataset.
#[derive(Debug, Parser)]
#[command(name = "evloop", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "evloop.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the configured tool chain over the input records.
    Run(RunArgs),

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },

    /// List configured tools in execution order.
    Tools,

    /// Show version and build information.
    Version,
}

#[derive(Debug, Default, clap::Args)]
struct RunArgs {
    /// Input files or directories, comma-separated. Replaces `input.files`.
    #[arg(short, long)]
    input: Option<String>,

    /// Output store file. Replaces `output.file`.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum number of records to process (negative = all).
    #[arg(long, allow_negative_numbers = true)]
    nov: Option<i64>,

    /// Suppress progress reports.
    #[arg(long)]
    mute_progress: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(input) = &self.input {
            config.input.files = vec![input.clone()];
        }
        if let Some(output) = &self.output {
            config.output.file = output.to_string_lossy().into_owned();
        }
        if let Some(nov) = self.nov {
            config.engine.nov = nov;
        }
        if self.mute_progress {
            config.engine.mute_progress = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, found) = load_config(&cli.config).await?;
    let logs = init_tracing(cli.verbose, &config.logging.level);
    if !found {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Run(args) => cmd_run(config, &args, &logs).await?,
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
        Commands::Tools => print!("{}", format_tools(&config)),
        Commands::Version => println!("{}", BuildInfo::current()),
    }

    Ok(())
}

/// `RUST_LOG` wins, then `-v`, then the configured level.
fn log_filter(verbose: u8, configured: &str) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

fn init_tracing(verbose: u8, configured: &str) -> LogReader {
    let collector = LogCollector::new(4096);
    let reader = collector.reader();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_filter(verbose, configured)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(collector)
        .init();
    reader
}

async fn cmd_run(mut config: AppConfig, args: &RunArgs, logs: &LogReader) -> Result<()> {
    args.apply(&mut config);
    config.validate().context("invalid configuration after overrides")?;
    if config.input.files.is_empty() {
        anyhow::bail!("no input files: set input.files or pass --input");
    }

    let build = BuildInfo::current();
    info!(
        engine = %config.engine.name,
        version = %build.short(),
        built_at = build.built_at,
        tools = config.tools.len(),
        "Starting run"
    );

    // The engine is synchronous; keep it off the async workers.
    let report = tokio::task::spawn_blocking(move || -> Result<RunReport> {
        let engine = EventLoop::from_config(&config).context("failed to build event loop")?;
        let report = engine.run(config.engine.nov).context("run aborted")?;
        Ok(report)
    })
    .await
    .context("event loop worker panicked")??;

    let (warnings, errors) = logs.warnings_and_errors();
    println!("{}", format_report(&report, warnings, errors));
    Ok(())
}

fn format_report(report: &RunReport, warnings: usize, errors: usize) -> String {
    format!(
        "Engine:            {}\n\
         Records:           {}/{}\n\
         Watchdog trips:    {}\n\
         Execute failures:  {}\n\
         Unreadable:        {}\n\
         Finalize failures: {}\n\
         Output:            {}\n\
         Logged:            {warnings} warning(s), {errors} error(s)",
        report.engine,
        report.processed,
        report.total_records,
        report.watchdog_trips,
        report.execute_failures,
        report.load_failures,
        report.finalize_failures,
        report.destination,
    )
}

fn format_tools(config: &AppConfig) -> String {
    if config.tools.is_empty() {
        return "No tools configured.\n".to_string();
    }
    config
        .tools
        .iter()
        .enumerate()
        .map(|(i, tool)| {
            let status = if tool.enabled { "enabled" } else { "disabled" };
            format!("{:>3}. {:<20} {:<10} {status}\n", i + 1, tool.name, tool.kind_name())
        })
        .collect()
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str = toml::to_string_pretty(config).context("failed to render configuration")?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

/// Load and validate the config file; defaults when it does not exist.
/// The flag tells whether the file was found.
async fn load_config(path: &Path) -> Result<(AppConfig, bool)> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        let config = AppConfig::load(path)
            .await
            .with_context(|| format!("failed to load '{}'", path.display()))?;
        Ok((config, true))
    } else {
        Ok((AppConfig::default(), false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evloop_test_utils::{TestConfigBuilder, TestDataset};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::try_parse_from([
            "evloop", "-c", "a.toml", "-vv", "run", "--input", "x.jsonl,y.jsonl", "--nov", "-1",
            "--mute-progress",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("a.toml"));
        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.input.as_deref(), Some("x.jsonl,y.jsonl"));
        assert_eq!(args.nov, Some(-1));
        assert!(args.mute_progress);
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = TestConfigBuilder::new().input("old.jsonl").nov(5).build();
        let args = RunArgs {
            input: Some("new.jsonl".to_string()),
            output: Some(PathBuf::from("out.json")),
            nov: Some(2),
            mute_progress: false,
        };
        args.apply(&mut config);
        assert_eq!(config.input.files, vec!["new.jsonl".to_string()]);
        assert_eq!(config.output.file, "out.json");
        assert_eq!(config.engine.nov, 2);

        RunArgs::default().apply(&mut config);
        assert_eq!(config.engine.nov, 2);
    }

    #[test]
    fn test_version_command_shows_build_time() {
        let cli = Cli::try_parse_from(["evloop", "version"]).unwrap();
        assert!(matches!(cli.command, Commands::Version));
        let text = BuildInfo::current().to_string();
        assert!(text.starts_with("evloop "));
        assert!(text.contains("commit:"));
        assert!(text.contains(&format!("built:   {}", BuildInfo::current().built_at)));
    }

    #[test]
    fn test_log_filter_precedence() {
        assert_eq!(log_filter(0, "warn"), "warn");
        assert_eq!(log_filter(1, "warn"), "debug");
        assert_eq!(log_filter(3, "warn"), "trace");
    }

    #[test]
    fn test_format_tools() {
        let config = TestConfigBuilder::new()
            .counter("all")
            .counter("spare")
            .disabled()
            .build();
        let listing = format_tools(&config);
        let lines: Vec<_> = listing.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("all") && lines[0].ends_with("enabled"));
        assert!(lines[1].contains("counter") && lines[1].ends_with("disabled"));
        assert_eq!(format_tools(&AppConfig::default()), "No tools configured.\n");
    }

    #[test]
    fn test_format_report() {
        let report = RunReport {
            engine: "evloop".to_string(),
            total_records: 10,
            processed: 4,
            destination: "h.json".to_string(),
            ..RunReport::default()
        };
        let text = format_report(&report, 1, 2);
        assert!(text.contains("Records:           4/10"));
        assert!(text.ends_with("1 warning(s), 2 error(s)"));
    }

    #[tokio::test]
    async fn test_missing_config_uses_defaults() {
        let data = TestDataset::new();
        let (config, found) = load_config(&data.output("absent.toml")).await.unwrap();
        assert!(!found);
        assert_eq!(config.engine.name, "evloop");
    }

    #[tokio::test]
    async fn test_invalid_config_is_an_error() {
        let data = TestDataset::new();
        let path = data.raw("bad.toml", "[logging]\nlevel = \"loud\"\n");
        let err = load_config(&path).await.unwrap_err();
        assert!(err.to_string().starts_with("failed to load"));
    }

    #[tokio::test]
    async fn test_run_command_writes_output() {
        let data = TestDataset::new();
        let input = data.raw("a.jsonl", "{\"x\": 1}\n{\"x\": 2}\n");
        let output = data.output("histos.json");
        let config = TestConfigBuilder::new().counter("n").build();
        let args = RunArgs {
            input: Some(input.to_string_lossy().into_owned()),
            output: Some(output.clone()),
            nov: None,
            mute_progress: true,
        };
        let logs = LogCollector::new(16).reader();

        cmd_run(config, &args, &logs).await.unwrap();

        let histos = evloop_core::HistogramStore::read(&output).unwrap();
        assert_eq!(histos["n"].entries(), 2);
    }

    #[tokio::test]
    async fn test_run_without_inputs_fails() {
        let logs = LogCollector::new(16).reader();
        let err = cmd_run(AppConfig::default(), &RunArgs::default(), &logs)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no input files"));
    }
}
