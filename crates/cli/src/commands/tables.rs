use serde::Serialize;
use sizequote_core::config::AppConfig;
use sizequote_core::pricing::aliases::AliasTable;
use sizequote_core::pricing::store::PriceTableStore;

use crate::commands::{CommandResult, GlobalOptions, EXIT_CONFIG, EXIT_PRICE_TABLES};

#[derive(Debug, Serialize)]
struct TableSummary {
    product: String,
    widths: Vec<u32>,
    heights: Vec<u32>,
    cells: usize,
    aliases: Vec<String>,
}

pub fn run(options: &GlobalOptions, json_output: bool) -> CommandResult {
    let config = match AppConfig::load(options.load_options()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "tables",
                "config_validation",
                error.to_string(),
                EXIT_CONFIG,
            )
        }
    };

    let store = match PriceTableStore::load_dir(&config.price_tables.directory) {
        Ok(store) => store,
        Err(error) => {
            return CommandResult::failure(
                "tables",
                "price_tables",
                error.to_string(),
                EXIT_PRICE_TABLES,
            )
        }
    };

    let mut aliases = AliasTable::default();
    aliases.extend(config.aliases.iter().map(|(alias, target)| (alias.as_str(), target.as_str())));

    let summaries = summarize(&store, &aliases);
    if json_output {
        return match serde_json::to_string_pretty(&summaries) {
            Ok(output) => CommandResult::text(output),
            Err(error) => CommandResult::failure("tables", "serialization", error.to_string(), 1),
        };
    }

    let mut lines = vec![format!(
        "{} price table(s) in `{}`:",
        summaries.len(),
        config.price_tables.directory.display()
    )];
    for summary in &summaries {
        lines.push(format!(
            "- {}: widths {:?}, heights {:?}, {} priced cell(s)",
            summary.product, summary.widths, summary.heights, summary.cells
        ));
        if !summary.aliases.is_empty() {
            lines.push(format!("  aliases: {}", summary.aliases.join(", ")));
        }
    }

    CommandResult::text(lines.join("\n"))
}

fn summarize(store: &PriceTableStore, aliases: &AliasTable) -> Vec<TableSummary> {
    store
        .tables()
        .map(|table| TableSummary {
            product: table.product().to_string(),
            widths: table.widths().to_vec(),
            heights: table.heights().to_vec(),
            cells: table.cell_count(),
            aliases: aliases
                .aliases_for(table.product())
                .into_iter()
                .map(ToString::to_string)
                .collect(),
        })
        .collect()
}
