pub mod config;
pub mod doctor;
pub mod quote;
pub mod repl;
pub mod tables;

use std::path::PathBuf;

use serde::Serialize;
use sizequote_core::config::{ConfigOverrides, LoadOptions};

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_PRICE_TABLES: u8 = 3;
pub const EXIT_SUBMISSION: u8 = 4;
pub const EXIT_DOCTOR: u8 = 5;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn text(output: impl Into<String>) -> Self {
        Self { exit_code: 0, output: output.into() }
    }
}

/// Global flags shared by every subcommand.
#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub config_path: Option<PathBuf>,
    pub tables_dir: Option<PathBuf>,
}

impl GlobalOptions {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config_path.clone(),
            require_file: self.config_path.is_some(),
            overrides: ConfigOverrides {
                price_tables_directory: self.tables_dir.clone(),
                ..ConfigOverrides::default()
            },
        }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
