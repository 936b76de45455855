use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};

use ec_dashboard::export::ExportFormat;
use ec_dashboard::pipeline;
use ec_dashboard::{DashboardConfig, DashboardState, EnvironmentDiscovery, SchoolSelection};

/// Compare plant growth across schools running different nutrient EC levels.
#[derive(Parser)]
#[command(name = "ec-dashboard", version, about)]
struct Cli {
    /// JSON configuration file (defaults to the built-in four-school setup).
    #[arg(short, long, env = "EC_DASHBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory, overriding the configuration.
    #[arg(short, long, env = "EC_DASHBOARD_DATA")]
    data_dir: Option<PathBuf>,

    /// Environment file discovery rule, overriding the configuration.
    #[arg(long, value_enum)]
    discovery: Option<Discovery>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Discovery {
    /// School name or alias contained in the file name
    Keyword,
    /// Every `.csv`, keyed by the file name's leading token
    Extension,
}

#[derive(Subcommand)]
enum Command {
    /// Print per-school means and the best EC level (default).
    Summary {
        /// Emit JSON instead of a text table.
        #[arg(long)]
        json: bool,
    },
    /// Show which file was picked for each school and for growth data.
    Locate,
    /// Write environment tables, one file per selected school.
    ExportEnv {
        /// School name or alias, or `all`.
        #[arg(short, long, default_value = "all")]
        school: SchoolSelection,
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        /// Output directory.
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Write all growth sheets to one workbook.
    ExportGrowth {
        /// Output file.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<DashboardConfig> {
    let mut config = match &cli.config {
        Some(path) => DashboardConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => DashboardConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    match cli.discovery {
        Some(Discovery::Keyword) => config.environment = EnvironmentDiscovery::Keyword,
        Some(Discovery::Extension) => {
            if !matches!(config.environment, EnvironmentDiscovery::Extension { .. }) {
                config.environment = EnvironmentDiscovery::Extension {
                    extension: "csv".into(),
                    separator: '_',
                };
            }
        }
        None => {}
    }
    config.normalized().context("invalid configuration")
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    info!("data directory {}", config.data_dir.display());

    let command = cli.command.unwrap_or(Command::Summary { json: false });
    if let Command::Locate = command {
        for (school, path) in pipeline::locate_environment_files(&config)? {
            println!("{school}\t{}", path.display());
        }
        let growth = pipeline::locate_growth_workbook(&config)?;
        println!("growth\t{}", growth.display());
        return Ok(());
    }

    let mut state = DashboardState::new(config);
    state
        .datasets()
        .context("data could not be loaded; nothing will be shown")?;

    match command {
        Command::Summary { json } => {
            let summary = state.summary()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{summary}");
            }
        }
        Command::ExportEnv {
            school,
            format,
            out,
        } => {
            state.selection = school;
            for path in state.export_environment(format, &out)? {
                println!("{}", path.display());
            }
        }
        Command::ExportGrowth { out } => {
            let path = state.export_growth(out.as_deref())?;
            println!("{}", path.display());
        }
        Command::Locate => {}
    }
    Ok(())
}
