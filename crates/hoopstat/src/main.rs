// hoopstat entry point.
//
// Startup sequence:
// 1. Parse the command line
// 2. Initialize tracing (stderr, or a file under logs/ with --log-file)
// 3. Load config, copying defaults/ into config/ on first run
// 4. Run the requested stage for each selected competition

mod config;
mod pipeline;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use hoopstat_core::season::Competition;
use pipeline::{Pipeline, Stage};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "hoopstat")]
#[command(about = "Merge, impute, and aggregate per-season basketball statistics", long_about = None)]
struct Cli {
    /// Directory holding defaults/, config/, and the configured input and output dirs
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    /// Write logs to logs/hoopstat.log instead of stderr
    #[arg(long)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge raw season files, then impute and aggregate careers
    Run(StageArgs),
    /// Merge raw season files into the canonical merged table only
    Merge(StageArgs),
    /// Impute and aggregate careers from previously merged tables
    Careers(StageArgs),
}

#[derive(Args, Debug)]
struct StageArgs {
    /// Which competition to process
    #[arg(long, value_enum, default_value_t = CompetitionArg::Both)]
    competition: CompetitionArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CompetitionArg {
    Regular,
    Postseason,
    Both,
}

impl CompetitionArg {
    fn competitions(self) -> Vec<Competition> {
        match self {
            CompetitionArg::Regular => vec![Competition::RegularSeason],
            CompetitionArg::Postseason => vec![Competition::Postseason],
            CompetitionArg::Both => Competition::ALL.to_vec(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.base_dir, cli.log_file)?;
    info!("hoopstat starting up");

    let config = config::load_config(&cli.base_dir).context("failed to load configuration")?;
    info!(
        "Config loaded: input={}, output={}",
        config.input.dir, config.output.dir
    );

    let (stage, args) = match &cli.command {
        Command::Run(args) => (Stage::Run, args),
        Command::Merge(args) => (Stage::Merge, args),
        Command::Careers(args) => (Stage::Careers, args),
    };

    let pipeline = Pipeline::new(&config, &cli.base_dir)?;
    for competition in args.competition.competitions() {
        pipeline
            .run(competition, stage)
            .with_context(|| format!("{} pipeline failed", competition.label()))?;
    }

    info!("hoopstat finished");
    Ok(())
}

/// Set up the tracing subscriber. `RUST_LOG` overrides the default filter.
fn init_tracing(base_dir: &Path, to_file: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hoopstat=info,hoopstat_core=info,warn"));

    if to_file {
        let log_dir = base_dir.join("logs");
        std::fs::create_dir_all(&log_dir)?;
        let log_file = std::fs::File::create(log_dir.join("hoopstat.log"))?;

        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_line_number(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("failed to set tracing subscriber")?;
    } else {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_line_number(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("failed to set tracing subscriber")?;
    }

    Ok(())
}
