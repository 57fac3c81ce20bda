use std::sync::Arc;

use sizequote_agent::runtime::{QuoteRuntime, SubmissionOutcome};
use sizequote_core::config::AppConfig;
use sizequote_core::domain::quote::QuoteResult;
use sizequote_core::pricing::store::PriceTableStore;
use sizequote_core::session::QuoteSession;

use crate::commands::{
    CommandResult, GlobalOptions, EXIT_CONFIG, EXIT_PRICE_TABLES, EXIT_SUBMISSION,
};

pub fn run(options: &GlobalOptions, text: &str, json_output: bool) -> CommandResult {
    let runtime = match prepare_runtime("quote", options) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    let executor = match executor("quote") {
        Ok(executor) => executor,
        Err(failure) => return failure,
    };

    let mut session = QuoteSession::new();
    let outcome = executor.block_on(runtime.submit(&mut session, text));

    match outcome {
        Ok(outcome) if json_output => match serde_json::to_string_pretty(&outcome) {
            Ok(output) => CommandResult::text(output),
            Err(error) => CommandResult::failure("quote", "serialization", error.to_string(), 1),
        },
        Ok(SubmissionOutcome::Quoted { result }) => CommandResult::text(render_result(1, &result)),
        Ok(SubmissionOutcome::NotFound { message, .. }) => {
            CommandResult::text(format!("! {message}"))
        }
        Err(error) => {
            CommandResult::failure("quote", "submission", error.to_string(), EXIT_SUBMISSION)
        }
    }
}

/// Config, price tables and HTTP clients, or a failure result naming the step.
pub(crate) fn prepare_runtime(
    command: &str,
    options: &GlobalOptions,
) -> Result<QuoteRuntime, CommandResult> {
    let config = AppConfig::load(options.load_options()).map_err(|error| {
        CommandResult::failure(command, "config_validation", error.to_string(), EXIT_CONFIG)
    })?;

    let store = PriceTableStore::load_dir(&config.price_tables.directory).map_err(|error| {
        CommandResult::failure(command, "price_tables", error.to_string(), EXIT_PRICE_TABLES)
    })?;

    QuoteRuntime::from_config(&config, Arc::new(store)).map_err(|error| {
        CommandResult::failure(command, "runtime_init", error.to_string(), EXIT_CONFIG)
    })
}

pub(crate) fn executor(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            1,
        )
    })
}

/// "Výsledek N" heading, the row table, then any skipped-item notices.
pub fn render_result(number: usize, result: &QuoteResult) -> String {
    let mut lines = vec![format!("Výsledek {number}")];
    if result.rows.is_empty() {
        lines.push("(žádné položky)".to_string());
    } else {
        lines.push(result.render_table());
        lines.push(format!("Celkem bez DPH: {}", result.total()));
    }
    for issue in &result.issues {
        lines.push(format!("! {issue}"));
    }
    lines.join("\n")
}
