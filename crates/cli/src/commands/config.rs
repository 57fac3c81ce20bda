use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use sizequote_core::config::AppConfig;
use toml::Value;

use crate::commands::{CommandResult, GlobalOptions, EXIT_CONFIG};

struct ConfigLine {
    key_path: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run(options: &GlobalOptions) -> CommandResult {
    let config = match AppConfig::load(options.load_options()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult {
                exit_code: EXIT_CONFIG,
                output: format!("config validation failed: {error}"),
            }
        }
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for line in effective_lines(&config) {
        let source = if line.key_path == "price_tables.directory" && options.tables_dir.is_some() {
            "flag (--tables)".to_string()
        } else {
            field_source(
                line.key_path,
                line.env_keys,
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            )
        };
        lines.push(render_line(line.key_path, &line.value, source));
    }

    for (alias, target) in &config.aliases {
        lines.push(format!("- aliases.\"{alias}\" = {target} (source: file)"));
    }

    CommandResult::text(lines.join("\n"))
}

fn effective_lines(config: &AppConfig) -> Vec<ConfigLine> {
    let tiers = config
        .pricing
        .installation_tiers
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");

    vec![
        ConfigLine {
            key_path: "price_tables.directory",
            value: config.price_tables.directory.display().to_string(),
            env_keys: &["SIZEQUOTE_PRICE_TABLES_DIRECTORY"],
        },
        ConfigLine {
            key_path: "llm.provider",
            value: format!("{:?}", config.llm.provider),
            env_keys: &["SIZEQUOTE_LLM_PROVIDER"],
        },
        ConfigLine {
            key_path: "llm.model",
            value: config.llm.model.clone(),
            env_keys: &["SIZEQUOTE_LLM_MODEL"],
        },
        ConfigLine {
            key_path: "llm.base_url",
            value: config.llm.effective_base_url(),
            env_keys: &["SIZEQUOTE_LLM_BASE_URL"],
        },
        ConfigLine {
            key_path: "llm.api_key",
            value: redact_secret(config.llm.api_key.as_ref()),
            env_keys: &["SIZEQUOTE_LLM_API_KEY", "OPENAI_API_KEY"],
        },
        ConfigLine {
            key_path: "llm.timeout_secs",
            value: config.llm.timeout_secs.to_string(),
            env_keys: &["SIZEQUOTE_LLM_TIMEOUT_SECS"],
        },
        ConfigLine {
            key_path: "llm.max_tokens",
            value: config.llm.max_tokens.to_string(),
            env_keys: &["SIZEQUOTE_LLM_MAX_TOKENS"],
        },
        ConfigLine {
            key_path: "distance.base_url",
            value: config.distance.base_url.clone(),
            env_keys: &["SIZEQUOTE_DISTANCE_BASE_URL"],
        },
        ConfigLine {
            key_path: "distance.api_key",
            value: redact_secret(config.distance.api_key.as_ref()),
            env_keys: &["SIZEQUOTE_DISTANCE_API_KEY", "GOOGLE_API_KEY"],
        },
        ConfigLine {
            key_path: "distance.origin",
            value: config.distance.origin.clone(),
            env_keys: &["SIZEQUOTE_DISTANCE_ORIGIN"],
        },
        ConfigLine {
            key_path: "distance.timeout_secs",
            value: config.distance.timeout_secs.to_string(),
            env_keys: &["SIZEQUOTE_DISTANCE_TIMEOUT_SECS"],
        },
        ConfigLine {
            key_path: "pricing.installation_tiers",
            value: tiers,
            env_keys: &["SIZEQUOTE_PRICING_INSTALLATION_TIERS"],
        },
        ConfigLine {
            key_path: "pricing.rate_per_km",
            value: config.pricing.rate_per_km.to_string(),
            env_keys: &["SIZEQUOTE_PRICING_RATE_PER_KM"],
        },
        ConfigLine {
            key_path: "pricing.default_screen_height_mm",
            value: config.pricing.default_screen_height_mm.to_string(),
            env_keys: &["SIZEQUOTE_PRICING_DEFAULT_SCREEN_HEIGHT_MM"],
        },
        ConfigLine {
            key_path: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["SIZEQUOTE_SERVER_BIND_ADDRESS"],
        },
        ConfigLine {
            key_path: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["SIZEQUOTE_SERVER_PORT"],
        },
        ConfigLine {
            key_path: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["SIZEQUOTE_LOGGING_LEVEL", "SIZEQUOTE_LOG_LEVEL"],
        },
        ConfigLine {
            key_path: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["SIZEQUOTE_LOGGING_FORMAT", "SIZEQUOTE_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("sizequote.toml"), PathBuf::from("config/sizequote.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a short prefix such as `sk-` and hides the rest.
fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };

    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        if prefix.len() <= 4 {
            return format!("{prefix}-***");
        }
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::redact_secret;

    #[test]
    fn secrets_never_render_in_full() {
        assert_eq!(redact_secret(None), "<unset>");
        assert_eq!(redact_secret(Some(&SecretString::from("sk-abcdef".to_string()))), "sk-***");
        assert_eq!(
            redact_secret(Some(&SecretString::from("AIzaSyD-long-google-key".to_string()))),
            "<redacted>"
        );
        assert_eq!(redact_secret(Some(&SecretString::from("  ".to_string()))), "<empty>");
    }
}
