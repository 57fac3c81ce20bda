use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductKey;
use crate::errors::{Axis, DomainError};
use crate::pricing::table::PriceTable;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSize {
    pub width_mm: u32,
    pub height_mm: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPrice {
    pub product: ProductKey,
    pub size: ResolvedSize,
    pub price: Decimal,
}

/// Smallest available size not below `requested`, capped at the largest one.
/// `available` must be sorted ascending.
pub fn round_up_to_available(available: &[u32], requested: u32) -> Option<u32> {
    available.iter().copied().find(|size| *size >= requested).or_else(|| available.last().copied())
}

pub fn resolve_size(
    table: &PriceTable,
    width_mm: u32,
    height_mm: u32,
) -> Result<ResolvedSize, DomainError> {
    let width_mm = round_up_to_available(table.widths(), width_mm).ok_or_else(|| {
        DomainError::EmptyAxis { product: table.product().clone(), axis: Axis::Width }
    })?;
    let height_mm = round_up_to_available(table.heights(), height_mm).ok_or_else(|| {
        DomainError::EmptyAxis { product: table.product().clone(), axis: Axis::Height }
    })?;

    Ok(ResolvedSize { width_mm, height_mm })
}

pub fn resolve_price(
    table: &PriceTable,
    width_mm: u32,
    height_mm: u32,
) -> Result<ResolvedPrice, DomainError> {
    let size = resolve_size(table, width_mm, height_mm)?;
    let price = table.price_at(size.width_mm, size.height_mm).ok_or_else(|| {
        DomainError::MissingPriceCell {
            product: table.product().clone(),
            width_mm: size.width_mm,
            height_mm: size.height_mm,
        }
    })?;

    Ok(ResolvedPrice { product: table.product().clone(), size, price })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{resolve_price, round_up_to_available, ResolvedSize};
    use crate::domain::product::ProductKey;
    use crate::errors::{Axis, DomainError};
    use crate::pricing::table::PriceTable;

    fn glass() -> PriceTable {
        PriceTable::from_csv_str(
            ProductKey::new("ALUX Glass"),
            ",5000,6000,7000\n2000,8000,9000,9500\n2500,8500,10000,11000\n3000,9000,,12000\n",
        )
        .expect("table parses")
    }

    #[test]
    fn picks_smallest_size_not_below_request() {
        let sizes = [5000, 6000, 7000];
        assert_eq!(round_up_to_available(&sizes, 5000), Some(5000));
        assert_eq!(round_up_to_available(&sizes, 5001), Some(6000));
        assert_eq!(round_up_to_available(&sizes, 1), Some(5000));
    }

    #[test]
    fn clamps_oversized_requests_to_largest_size() {
        assert_eq!(round_up_to_available(&[5000, 6000, 7000], 9000), Some(7000));
    }

    #[test]
    fn empty_axis_has_no_resolution() {
        assert_eq!(round_up_to_available(&[], 100), None);
    }

    #[test]
    fn selection_matches_min_of_qualifying_sizes_for_every_request() {
        let sizes = [1200, 1800, 2400, 3600];
        for requested in (0..4000).step_by(37) {
            let expected = sizes
                .iter()
                .copied()
                .filter(|size| *size >= requested)
                .min()
                .unwrap_or(*sizes.iter().max().expect("non-empty"));
            assert_eq!(round_up_to_available(&sizes, requested), Some(expected));
        }
    }

    #[test]
    fn resolves_exact_cell() {
        let resolved = resolve_price(&glass(), 6000, 2500).expect("resolves");
        assert_eq!(resolved.size, ResolvedSize { width_mm: 6000, height_mm: 2500 });
        assert_eq!(resolved.price, Decimal::from(10_000));
    }

    #[test]
    fn rounds_each_axis_up_independently() {
        let resolved = resolve_price(&glass(), 5100, 2001).expect("resolves");
        assert_eq!(resolved.size, ResolvedSize { width_mm: 6000, height_mm: 2500 });
        assert_eq!(resolved.price, Decimal::from(10_000));

        let capped = resolve_price(&glass(), 9000, 1000).expect("resolves");
        assert_eq!(capped.size, ResolvedSize { width_mm: 7000, height_mm: 2000 });
        assert_eq!(capped.price, Decimal::from(9_500));
    }

    #[test]
    fn absent_cell_is_reported() {
        let error = resolve_price(&glass(), 5500, 2600).expect_err("cell is blank");
        assert_eq!(
            error,
            DomainError::MissingPriceCell {
                product: ProductKey::new("alux glass"),
                width_mm: 6000,
                height_mm: 3000,
            }
        );
    }

    #[test]
    fn unusable_table_reports_empty_axis() {
        let table =
            PriceTable::from_csv_str(ProductKey::new("pergola"), "x,wide\n2500,1\n")
                .expect("parses");
        let error = resolve_price(&table, 100, 100).expect_err("no widths");
        assert!(matches!(error, DomainError::EmptyAxis { axis: Axis::Width, .. }));
    }
}
