use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use siteregen::cli::commands;

#[derive(Parser)]
#[command(name = "siteregen")]
#[command(
    version,
    about = "Incremental regeneration engine for a static publishing site"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize siteregen in the current directory
    Init {
        #[arg(long, short, help = "Overwrite existing initialization")]
        force: bool,
    },

    /// Apply items, tag flags and removals from a JSON file
    Import {
        #[arg(help = "JSON file with items, exclusions and removed ids")]
        file: PathBuf,
    },

    /// Compute the changed set and commit it
    Run {
        #[arg(long = "dry-run", help = "Compute everything but commit nothing")]
        dry_run: bool,
        #[arg(long, help = "Treat every published item as changed")]
        full: bool,
        #[arg(long, help = "Print every obligation of the plan")]
        plan: bool,
    },

    /// Show project status
    Status {
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// List the committed changed set
    Changed {
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
        #[arg(long, help = "Show the obligations instead of the ids")]
        plan: bool,
    },

    /// List committed runs
    Log {
        #[arg(short = 'n', long, default_value = "20", help = "Number of runs")]
        limit: usize,
    },

    /// Prune old run history
    Clean {
        #[arg(long, help = "Remove all siteregen data")]
        all: bool,
        #[arg(long, default_value = "5", help = "Committed runs to keep")]
        keep: usize,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'g', long, help = "Show global config file only")]
        global: bool,
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31msiteregen encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Init { force } => commands::init::run(force)?,
        Commands::Import { file } => commands::import::run(&file)?,
        Commands::Run {
            dry_run,
            full,
            plan,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::run::run(dry_run, full, cli.quiet, plan))?;
        }
        Commands::Status { format } => commands::status::run(&format)?,
        Commands::Changed { format, plan } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::changed::run(&format, plan))?;
        }
        Commands::Log { limit } => commands::log::run(limit)?,
        Commands::Clean { all, keep } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::clean::run(all, keep))?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { global, format } => commands::config::show(global, &format)?,
            ConfigAction::Path => commands::config::path()?,
            ConfigAction::Init { global, force } => {
                if global {
                    commands::config::init_global(force)?;
                } else {
                    commands::config::init_project(force)?;
                }
            }
        },
    }

    Ok(())
}
