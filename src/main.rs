use anyhow::Result;
use cadfolio::cli::ReportSource;
use cadfolio::cli::growth::GrowthOptions;
use cadfolio::core::growth::GrowthWindow;
use cadfolio::core::log::init_logging;
use chrono::NaiveDate;
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// An export to import, or the id of a saved report.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct SourceArgs {
    /// Brokerage activity export (.xlsx, .xls or .csv)
    file: Option<PathBuf>,

    /// Id of a previously saved report
    #[arg(long = "report", value_name = "ID")]
    report: Option<String>,
}

impl From<SourceArgs> for ReportSource {
    fn from(args: SourceArgs) -> ReportSource {
        match (args.file, args.report) {
            (_, Some(id)) => ReportSource::Stored(id),
            (Some(file), None) => ReportSource::File(file),
            (None, None) => unreachable!("clap requires one report source"),
        }
    }
}

impl From<Commands> for cadfolio::AppCommand {
    fn from(cmd: Commands) -> cadfolio::AppCommand {
        match cmd {
            Commands::Summary { source, account } => cadfolio::AppCommand::Summary {
                source: source.into(),
                account,
            },
            Commands::Portfolio {
                source,
                account,
                all,
            } => cadfolio::AppCommand::Portfolio {
                source: source.into(),
                account,
                all,
            },
            Commands::Contributions { source, json } => cadfolio::AppCommand::Contributions {
                source: source.into(),
                json,
            },
            Commands::Growth {
                source,
                accounts,
                start,
                end,
                by_symbol,
                json,
            } => cadfolio::AppCommand::Growth {
                source: source.into(),
                options: GrowthOptions {
                    accounts,
                    window: GrowthWindow { start, end },
                    by_symbol,
                    json,
                },
            },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display category totals and returns
    Summary {
        #[command(flatten)]
        source: SourceArgs,
        /// Only include this account
        #[arg(long)]
        account: Option<i64>,
    },
    /// Display shares held per account and symbol
    Portfolio {
        #[command(flatten)]
        source: SourceArgs,
        /// Only include this account
        #[arg(long)]
        account: Option<i64>,
        /// Include liquidated positions
        #[arg(long)]
        all: bool,
    },
    /// Display the cumulative net amount over time
    Contributions {
        #[command(flatten)]
        source: SourceArgs,
        /// Print chart points as JSON
        #[arg(long)]
        json: bool,
    },
    /// Display the daily market value of the portfolio
    Growth {
        #[command(flatten)]
        source: SourceArgs,
        /// Only include these accounts
        #[arg(long, num_args = 1..)]
        accounts: Vec<i64>,
        /// First date shown (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last date shown (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
        /// One series per symbol instead of the total
        #[arg(long)]
        by_symbol: bool,
        /// Print chart points as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => cadfolio::cli::setup::setup(),
        Some(cmd) => cadfolio::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
