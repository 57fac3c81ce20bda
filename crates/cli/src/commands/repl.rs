use std::io::{self, BufRead, Write};

use sizequote_agent::runtime::{QuoteRuntime, SubmissionOutcome};
use sizequote_core::session::QuoteSession;
use tokio::runtime::Runtime;

use crate::commands::quote::{executor, prepare_runtime, render_result};
use crate::commands::{CommandResult, GlobalOptions};

const HELP: &str = "Enter a product description to quote it, or one of:\n  \
                    :history  show all results, newest first\n  \
                    :log      show the debug log\n  \
                    :reset    clear history and debug log\n  \
                    :quit     leave";

pub fn run(options: &GlobalOptions) -> CommandResult {
    let runtime = match prepare_runtime("repl", options) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    let executor = match executor("repl") {
        Ok(executor) => executor,
        Err(failure) => return failure,
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    match drive(&runtime, &executor, stdin.lock(), &mut stdout) {
        Ok(session) => CommandResult::success(
            "repl",
            format!("session ended with {} result(s)", session.len()),
        ),
        Err(error) => CommandResult::failure("repl", "io", error.to_string(), 1),
    }
}

/// Reads submissions and session commands line by line until EOF or `:quit`.
pub fn drive<R: BufRead, W: Write>(
    runtime: &QuoteRuntime,
    executor: &Runtime,
    input: R,
    output: &mut W,
) -> io::Result<QuoteSession> {
    let mut session = QuoteSession::new();
    writeln!(output, "{HELP}")?;

    for line in input.lines() {
        let line = line?;
        let line = line.trim();

        match line {
            "" => continue,
            ":quit" | ":q" => break,
            ":help" => writeln!(output, "{HELP}")?,
            ":history" => {
                if session.is_empty() {
                    writeln!(output, "(no results yet)")?;
                }
                for (number, result) in session.numbered_history() {
                    writeln!(output, "{}\n", render_result(number, result))?;
                }
            }
            ":log" => writeln!(output, "{}", session.debug_log().render())?,
            ":reset" => {
                session.reset();
                writeln!(output, "session cleared")?;
            }
            text => match executor.block_on(runtime.submit(&mut session, text)) {
                Ok(SubmissionOutcome::Quoted { result }) => {
                    writeln!(output, "{}", render_result(session.len(), &result))?;
                }
                Ok(SubmissionOutcome::NotFound { message, .. }) => {
                    writeln!(output, "Výsledek {}\n! {message}", session.len())?
                }
                Err(error) => writeln!(output, "error: {error}")?,
            },
        }
    }

    output.flush()?;
    Ok(session)
}
