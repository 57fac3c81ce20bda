pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sizequote_core::config::{AppConfig, LogFormat};
use tracing_subscriber::EnvFilter;

use crate::commands::{CommandResult, GlobalOptions};

#[derive(Debug, Parser)]
#[command(
    name = "sizequote",
    about = "Sizequote operator CLI",
    long_about = "Quote products from free-text descriptions using CSV price tables, \
                  and inspect configuration and readiness.",
    after_help = "Examples:\n  sizequote quote \"ALUX Glass 6000x2500 Brno\"\n  sizequote repl\n  sizequote tables --json\n  sizequote doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a sizequote.toml config file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Directory of CSV price tables (overrides config)")]
    tables: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Quote one free-text submission and print the result table")]
    Quote {
        #[arg(required = true, help = "Products, dimensions and delivery place")]
        text: Vec<String>,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Interactive session with history and debug log")]
    Repl,
    #[command(about = "List loaded price tables with their size axes and aliases")]
    Tables {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, price tables, and provider credentials")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = GlobalOptions { config_path: cli.config, tables_dir: cli.tables };
    init_logging(&options);

    let result: CommandResult = match cli.command {
        Command::Quote { text, json } => commands::quote::run(&options, &text.join(" "), json),
        Command::Repl => commands::repl::run(&options),
        Command::Tables { json } => commands::tables::run(&options, json),
        Command::Config => commands::config::run(&options),
        Command::Doctor { json } => commands::doctor::run(&options, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Level and format for the operator log. `SIZEQUOTE_CLI_LOG` overrides the configured
/// level; an unloadable config falls back to `warn` in compact form.
pub fn logging_settings(options: &GlobalOptions) -> (String, LogFormat) {
    let configured = AppConfig::load(options.load_options()).ok().map(|config| config.logging);
    let format = configured.as_ref().map_or(LogFormat::Compact, |logging| logging.format);
    let level = std::env::var("SIZEQUOTE_CLI_LOG")
        .ok()
        .filter(|level| !level.trim().is_empty())
        .or_else(|| configured.map(|logging| logging.level))
        .unwrap_or_else(|| "warn".to_string());
    (level, format)
}

/// Operator logs go to stderr so command output stays parseable.
fn init_logging(options: &GlobalOptions) {
    let (level, format) = logging_settings(options);
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter);

    let _ = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
