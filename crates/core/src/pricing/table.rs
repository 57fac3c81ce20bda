use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::domain::product::ProductKey;

/// Parses a number that may carry locale formatting: `"12 345"`, `"1234,5"`,
/// non-breaking or narrow spaces as thousands separators.
pub fn parse_locale_decimal(raw: &str) -> Option<Decimal> {
    let compact = raw
        .chars()
        .filter(|ch| !ch.is_whitespace() && *ch != '\u{a0}' && *ch != '\u{202f}')
        .map(|ch| if ch == ',' { '.' } else { ch })
        .collect::<String>();

    if compact.is_empty() {
        return None;
    }

    Decimal::from_str(&compact).ok()
}

/// Axis labels must be non-negative integers once normalized (`"2 500"`, `"2500,0"`).
pub fn parse_dimension_label(raw: &str) -> Option<u32> {
    let value = parse_locale_decimal(raw)?;
    if value.is_sign_negative() || !value.fract().is_zero() {
        return None;
    }
    value.to_u32()
}

/// A product price list: widths across, heights down, prices in the cells.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PriceTable {
    product: ProductKey,
    widths: Vec<u32>,
    heights: Vec<u32>,
    #[serde(skip)]
    cells: HashMap<(u32, u32), Decimal>,
}

impl PriceTable {
    pub fn product(&self) -> &ProductKey {
        &self.product
    }

    /// Sorted, de-duplicated column sizes.
    pub fn widths(&self) -> &[u32] {
        &self.widths
    }

    /// Sorted, de-duplicated row sizes.
    pub fn heights(&self) -> &[u32] {
        &self.heights
    }

    pub fn price_at(&self, width_mm: u32, height_mm: u32) -> Option<Decimal> {
        self.cells.get(&(height_mm, width_mm)).copied()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn is_usable(&self) -> bool {
        !self.widths.is_empty() && !self.heights.is_empty()
    }

    /// Parses CSV content where the header row holds widths and the first
    /// column holds heights. The top-left cell is ignored.
    pub fn from_csv_str(product: ProductKey, content: &str) -> Result<Self, csv::Error> {
        let content = content.trim_start_matches('\u{feff}');
        let delimiter = detect_delimiter(content);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let mut records = reader.records();
        let header = match records.next() {
            Some(record) => record?,
            None => return Ok(Self::empty(product)),
        };

        let column_widths =
            header.iter().skip(1).map(parse_dimension_label).collect::<Vec<Option<u32>>>();
        for (index, label) in header.iter().skip(1).enumerate() {
            if column_widths[index].is_none() && !label.is_empty() {
                debug!(product = %product, label, "ignoring non-numeric width label");
            }
        }

        let mut heights = Vec::new();
        let mut cells = HashMap::new();
        for record in records {
            let record = record?;
            let mut fields = record.iter();
            let Some(row_label) = fields.next() else {
                continue;
            };
            let Some(height) = parse_dimension_label(row_label) else {
                if !row_label.is_empty() {
                    debug!(
                        product = %product,
                        label = row_label,
                        "ignoring non-numeric height label"
                    );
                }
                continue;
            };
            heights.push(height);

            for (index, raw_price) in fields.enumerate() {
                let Some(Some(width)) = column_widths.get(index) else {
                    continue;
                };
                if let Some(price) = parse_locale_decimal(raw_price) {
                    cells.entry((height, *width)).or_insert(price);
                }
            }
        }

        let mut widths = column_widths.into_iter().flatten().collect::<Vec<_>>();
        widths.sort_unstable();
        widths.dedup();
        heights.sort_unstable();
        heights.dedup();

        Ok(Self { product, widths, heights, cells })
    }

    fn empty(product: ProductKey) -> Self {
        Self { product, widths: Vec::new(), heights: Vec::new(), cells: HashMap::new() }
    }
}

/// Picks the delimiter that splits the header into the most fields consistently
/// across the first lines. Semicolons are common in comma-decimal locales.
fn detect_delimiter(content: &str) -> u8 {
    let candidates = [b',', b';', b'\t'];
    let sample_lines =
        content.lines().filter(|line| !line.trim().is_empty()).take(10).collect::<Vec<_>>();

    let mut best = b',';
    let mut best_score = 0usize;

    for delimiter in candidates {
        let counts = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delimiter)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(Result::ok)
                    .map(|record| record.len())
                    .unwrap_or(1)
            })
            .collect::<Vec<_>>();

        let Some(&target) = counts.first() else {
            continue;
        };
        if target <= 1 {
            continue;
        }

        let consistent = counts.iter().filter(|count| **count == target).count();
        let score = consistent * target;
        if score > best_score {
            best_score = score;
            best = delimiter;
        }
    }

    best
}
