use serde::Serialize;
use sizequote_core::config::{AppConfig, LlmProvider};
use sizequote_core::pricing::store::PriceTableStore;

use crate::commands::{CommandResult, GlobalOptions, EXIT_DOCTOR};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(options: &GlobalOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { EXIT_DOCTOR };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: &GlobalOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.load_options()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_price_tables(&config));
            checks.push(check_llm_credentials(&config));
            checks.push(check_distance_credentials(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["price_tables", "llm_credentials", "distance_credentials"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_price_tables(config: &AppConfig) -> DoctorCheck {
    let directory = &config.price_tables.directory;
    match PriceTableStore::load_dir(directory) {
        Ok(store) => {
            let unusable = store
                .tables()
                .filter(|table| !table.is_usable())
                .map(|table| table.product().to_string())
                .collect::<Vec<_>>();

            if unusable.is_empty() {
                DoctorCheck {
                    name: "price_tables",
                    status: CheckStatus::Pass,
                    details: format!(
                        "{} price table(s) loaded from `{}`",
                        store.len(),
                        directory.display()
                    ),
                }
            } else {
                DoctorCheck {
                    name: "price_tables",
                    status: CheckStatus::Fail,
                    details: format!("tables without numeric axes: {}", unusable.join(", ")),
                }
            }
        }
        Err(error) => {
            DoctorCheck {
                name: "price_tables",
                status: CheckStatus::Fail,
                details: error.to_string(),
            }
        }
    }
}

fn check_llm_credentials(config: &AppConfig) -> DoctorCheck {
    let details = match (config.llm.provider, config.llm.api_key.is_some()) {
        (LlmProvider::Ollama, _) => {
            format!("ollama at `{}` needs no api key", config.llm.effective_base_url())
        }
        (provider, true) => format!("{provider:?} api key present, model `{}`", config.llm.model),
        (provider, false) => {
            return DoctorCheck {
                name: "llm_credentials",
                status: CheckStatus::Fail,
                details: format!("{provider:?} requires llm.api_key"),
            }
        }
    };

    DoctorCheck { name: "llm_credentials", status: CheckStatus::Pass, details }
}

fn check_distance_credentials(config: &AppConfig) -> DoctorCheck {
    if config.distance.api_key.is_some() {
        DoctorCheck {
            name: "distance_credentials",
            status: CheckStatus::Pass,
            details: format!("distance api key present, origin `{}`", config.distance.origin),
        }
    } else {
        DoctorCheck {
            name: "distance_credentials",
            status: CheckStatus::Fail,
            details: "distance.api_key is not configured".to_string(),
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
