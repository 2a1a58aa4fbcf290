// stepler command line: run or list the cloud validation suite

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::error;

use stepler::config::RunConfig;
use stepler::fixture::Registry;
use stepler::runner::{ExitStatus, RunError, RunOptions, Runner};
use stepler::suite::{standard_registry, Suite};
use stepler::telemetry::init_logging;

#[derive(Parser)]
#[command(name = "stepler", version)]
#[command(about = "Fixture-driven end-to-end tests for OpenStack clouds", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct Selection {
    /// Keyword expression, e.g. "volume and not cli"
    #[arg(short = 'k', long = "keyword")]
    keyword: Option<String>,

    /// Mark expression, e.g. "cinder or ironic"
    #[arg(short = 'm', long = "marks")]
    marks: Option<String>,
}

impl From<Selection> for RunOptions {
    fn from(selection: Selection) -> Self {
        RunOptions {
            keyword: selection.keyword,
            marks: selection.marks,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run the selected tests against the cloud in OS_* variables
    Run {
        #[command(flatten)]
        selection: Selection,

        /// Run in the configured project instead of a fresh one per test
        #[arg(long)]
        use_default_project: bool,

        /// Root of <service>/<name>.yaml templates
        #[arg(long, env = "STEPLER_TEMPLATES_DIR")]
        templates_dir: Option<PathBuf>,

        /// Directory for interprocess lock files
        #[arg(long, env = "STEPLER_LOCK_DIR")]
        lock_dir: Option<PathBuf>,
    },

    /// Print the selected tests with their idempotent IDs
    List {
        #[command(flatten)]
        selection: Selection,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let status = match execute(cli.command).await {
        Ok(status) => status,
        Err(e) => {
            error!(error = %e, "Run aborted");
            eprintln!("stepler: {e}");
            e.exit_status()
        }
    };
    status.into()
}

async fn execute(command: Command) -> Result<ExitStatus, RunError> {
    let mut stdout = std::io::stdout();
    match command {
        Command::List { selection } => {
            let runner = Runner::new(Suite::standard(), &selection.into())?;
            runner.list(&mut stdout)
        }
        Command::Run {
            selection,
            use_default_project,
            templates_dir,
            lock_dir,
        } => {
            let runner = Runner::new(Suite::standard(), &selection.into())?;
            // OS_* settings are only read once some test is selected
            let registry = || -> Result<Registry, RunError> {
                let mut config = RunConfig::from_env()?;
                if use_default_project {
                    config = config.use_default_project(true);
                }
                if let Some(dir) = templates_dir {
                    config = config.templates_dir(dir);
                }
                if let Some(dir) = lock_dir {
                    config = config.lock_dir(dir);
                }
                Ok(standard_registry(config))
            };
            let report = runner.run(&mut stdout, registry).await?;
            Ok(report.exit_status())
        }
    }
}
