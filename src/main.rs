use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use palmer::cli::commands::analyze::{AnalyzeOptions, parse_option};

#[derive(Parser)]
#[command(name = "palmer")]
#[command(
    version,
    about = "Multi-agent site intelligence with resilient agent coordination"
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
    /// Analyze a website with the coordinated agents
    Analyze {
        #[arg(help = "Target URL")]
        url: String,
        #[arg(
            short = 't',
            long = "type",
            help = "Analysis type: comprehensive, competitive, technical, content"
        )]
        analysis_type: Option<String>,
        #[arg(short = 's', long, help = "Execution strategy: parallel, sequential, adaptive")]
        strategy: Option<String>,
        #[arg(
            short = 'o',
            long = "option",
            value_parser = parse_option,
            help = "Agent input as key=value (JSON values allowed), repeatable"
        )]
        options: Vec<(String, serde_json::Value)>,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Show agent health and circuit breaker states
    Health {
        #[arg(long, help = "Run a technical analysis against this URL first")]
        probe: Option<String>,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json, prometheus"
        )]
        format: String,
    },

    /// Clear the persisted page cache
    Clean,

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
            help = "Output format: toml, json, yaml"
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
        eprintln!("\x1b[31mPalmer encountered an unexpected error:\x1b[0m");
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
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
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
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Analyze {
            url,
            analysis_type,
            strategy,
            options,
            format,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(palmer::cli::commands::analyze::run(AnalyzeOptions {
                url,
                analysis_type,
                strategy,
                options,
                format,
            }))?;
        }
        Commands::Health { probe, format } => {
            let rt = Runtime::new()?;
            rt.block_on(palmer::cli::commands::health::run(&format, probe.as_deref()))?;
        }
        Commands::Clean => {
            let rt = Runtime::new()?;
            rt.block_on(palmer::cli::commands::clean::run())?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { global, format } => {
                palmer::cli::commands::config::show(global, &format)?;
            }
            ConfigAction::Path => {
                palmer::cli::commands::config::path()?;
            }
            ConfigAction::Init { global, force } => {
                palmer::cli::commands::config::init(global, force)?;
            }
        },
    }

    Ok(())
}
