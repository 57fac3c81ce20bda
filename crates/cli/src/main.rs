use std::process::ExitCode;

fn main() -> ExitCode {
    sizequote_cli::run()
}
