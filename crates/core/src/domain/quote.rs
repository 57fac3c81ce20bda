use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::product::ProductKey;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub String);

impl SubmissionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One line item extracted from free text, with the product already canonicalized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub product: ProductKey,
    pub width_mm: u32,
    pub height_mm: Option<u32>,
    pub place: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowKind {
    Item,
    Installation { percent: u32 },
    Delivery,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRow {
    #[serde(flatten)]
    pub kind: RowKind,
    pub label: String,
    pub description: String,
    pub price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteResult {
    pub id: SubmissionId,
    pub created_at: DateTime<Utc>,
    pub input: String,
    pub rows: Vec<QuoteRow>,
    /// User-facing notices for items that were skipped.
    pub issues: Vec<String>,
}

impl QuoteResult {
    pub fn new(id: SubmissionId, input: impl Into<String>) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            input: input.into(),
            rows: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn total(&self) -> Decimal {
        self.rows.iter().map(|row| row.price).sum()
    }

    pub fn render_table(&self) -> String {
        render_rows(&self.rows)
    }
}

const HEADERS: [&str; 3] = ["POLOŽKA", "ROZMĚR", "CENA bez DPH"];

/// Fixed-width text rendering with the price column right-aligned.
pub fn render_rows(rows: &[QuoteRow]) -> String {
    let cells = rows
        .iter()
        .map(|row| [row.label.clone(), row.description.clone(), row.price.to_string()])
        .collect::<Vec<_>>();

    let mut widths = HEADERS.map(|header| header.chars().count());
    for row in &cells {
        for (index, cell) in row.iter().enumerate() {
            widths[index] = widths[index].max(cell.chars().count());
        }
    }

    let mut lines = Vec::with_capacity(cells.len() + 1);
    lines.push(format_line(&HEADERS.map(str::to_string), &widths));
    for row in &cells {
        lines.push(format_line(row, &widths));
    }
    lines.join("\n")
}

fn format_line(cells: &[String; 3], widths: &[usize; 3]) -> String {
    let label = pad_right(&cells[0], widths[0]);
    let description = pad_right(&cells[1], widths[1]);
    let price = pad_left(&cells[2], widths[2]);
    format!("{label}  {description}  {price}").trim_end().to_string()
}

fn pad_right(value: &str, width: usize) -> String {
    let padding = width.saturating_sub(value.chars().count());
    format!("{value}{}", " ".repeat(padding))
}

fn pad_left(value: &str, width: usize) -> String {
    let padding = width.saturating_sub(value.chars().count());
    format!("{}{value}", " ".repeat(padding))
}

impl fmt::Display for QuoteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_table())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{QuoteResult, QuoteRow, RowKind, SubmissionId};

    fn result() -> QuoteResult {
        let mut result =
            QuoteResult::new(SubmissionId("sub-1".to_string()), "ALUX Glass 6000x2500");
        result.rows = vec![
            QuoteRow {
                kind: RowKind::Item,
                label: "alux glass".to_string(),
                description: "6000 × 2500 mm".to_string(),
                price: Decimal::from(10_000),
            },
            QuoteRow {
                kind: RowKind::Installation { percent: 12 },
                label: "Montáž 12%".to_string(),
                description: String::new(),
                price: Decimal::from(1_200),
            },
        ];
        result
    }

    #[test]
    fn total_sums_every_row() {
        assert_eq!(result().total(), Decimal::from(11_200));
    }

    #[test]
    fn table_rendering_aligns_columns_by_character_count() {
        let rendered = result().render_table();
        let lines = rendered.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("POLOŽKA"));
        assert!(lines[1].ends_with("10000"));
        assert!(lines[2].ends_with(" 1200"));
        assert_eq!(lines[0].chars().count(), lines[1].chars().count());
    }

    #[test]
    fn rows_serialize_with_flattened_kind() {
        let row = &result().rows[1];
        let json = serde_json::to_value(row).expect("row serializes");
        assert_eq!(json["kind"], "installation");
        assert_eq!(json["percent"], 12);
        assert_eq!(json["label"], "Montáž 12%");
    }
}
