use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::domain::quote::{QuoteRequest, QuoteRow, RowKind};
use crate::errors::{ApplicationError, DomainError};
use crate::pricing::policy::{round_price, PricingPolicy};
use crate::pricing::resolver::{resolve_price, ResolvedPrice};
use crate::pricing::store::PriceTableStore;
use crate::session::DebugLog;

pub const INSTALLATION_LABEL: &str = "Montáž";
pub const DELIVERY_LABEL: &str = "Doprava";

/// Road distance between two free-text locations, in kilometres.
#[async_trait]
pub trait DistanceLookup: Send + Sync {
    async fn distance_km(
        &self,
        origin: &str,
        destination: &str,
        log: &mut DebugLog,
    ) -> Result<Decimal, ApplicationError>;
}

/// Rows for one line item, plus the distance failure that suppressed its delivery row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComposedItem {
    pub rows: Vec<QuoteRow>,
    pub delivery_error: Option<ApplicationError>,
}

/// Turns a resolved price into the rows shown for one line item.
#[derive(Clone, Debug, Default)]
pub struct LineItemComposer {
    policy: PricingPolicy,
}

impl LineItemComposer {
    pub fn new(policy: PricingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PricingPolicy {
        &self.policy
    }

    /// Resolves the table price for `request` and composes its rows.
    pub async fn quote_item(
        &self,
        store: &PriceTableStore,
        request: &QuoteRequest,
        distance: &dyn DistanceLookup,
        log: &mut DebugLog,
    ) -> Result<ComposedItem, DomainError> {
        let height_mm = self.policy.effective_height(request)?;
        log.record(format!(
            "item: product={}, size={} × {}, place={}",
            request.product,
            request.width_mm,
            height_mm,
            request.place.as_deref().unwrap_or("")
        ));

        let table = store
            .get(&request.product)
            .ok_or_else(|| DomainError::UnknownProduct(request.product.clone()))?;
        log.record(format!(
            "table axes: widths {:?}, heights {:?}",
            table.widths(),
            table.heights()
        ));

        let resolved = resolve_price(table, request.width_mm, height_mm)?;
        log.record(format!(
            "selected size: {} × {}",
            resolved.size.width_mm, resolved.size.height_mm
        ));
        log.record(format!("price found: {}", resolved.price));
        debug!(
            event_name = "pricing.item.resolved",
            product = %resolved.product,
            width_mm = resolved.size.width_mm,
            height_mm = resolved.size.height_mm,
            price = %resolved.price,
            "price resolved"
        );

        Ok(self.compose(request, height_mm, &resolved, distance, log).await)
    }

    pub async fn compose(
        &self,
        request: &QuoteRequest,
        height_mm: u32,
        resolved: &ResolvedPrice,
        distance: &dyn DistanceLookup,
        log: &mut DebugLog,
    ) -> ComposedItem {
        let mut rows = self.priced_rows(request.width_mm, height_mm, resolved, log);
        match self.delivery_row(request, distance, log).await {
            Ok(delivery) => {
                rows.extend(delivery);
                ComposedItem { rows, delivery_error: None }
            }
            Err(error) => ComposedItem { rows, delivery_error: Some(error) },
        }
    }

    /// Base row plus one installation row per tier for non-exempt products.
    pub fn priced_rows(
        &self,
        width_mm: u32,
        height_mm: u32,
        resolved: &ResolvedPrice,
        log: &mut DebugLog,
    ) -> Vec<QuoteRow> {
        let mut rows = vec![QuoteRow {
            kind: RowKind::Item,
            label: resolved.product.to_string(),
            description: format!("{width_mm} × {height_mm} mm"),
            price: round_price(resolved.price),
        }];

        if self.policy.is_installation_exempt(&resolved.product) {
            return rows;
        }

        for percent in &self.policy.installation_tiers {
            let price = self.policy.installation_surcharge(resolved.price, *percent);
            log.record(format!("installation {percent}% = {price}"));
            rows.push(QuoteRow {
                kind: RowKind::Installation { percent: *percent },
                label: format!("{INSTALLATION_LABEL} {percent}%"),
                description: String::new(),
                price,
            });
        }

        rows
    }

    /// `Ok(None)` when no delivery applies; `Err` when the distance lookup failed.
    pub async fn delivery_row(
        &self,
        request: &QuoteRequest,
        distance: &dyn DistanceLookup,
        log: &mut DebugLog,
    ) -> Result<Option<QuoteRow>, ApplicationError> {
        let Some(place) = self.policy.delivery_place(request) else {
            return Ok(None);
        };

        let distance_km = match distance.distance_km(&self.policy.origin, place, log).await {
            Ok(distance_km) => distance_km,
            Err(error) => {
                warn!(
                    event_name = "pricing.delivery.unavailable",
                    place,
                    error = %error,
                    "distance lookup failed, delivery omitted"
                );
                log.record(format!("distance lookup failed for `{place}`: {error}"));
                return Err(error);
            }
        };

        if distance_km <= Decimal::ZERO {
            log.record(format!("distance to `{place}` is zero, delivery omitted"));
            return Ok(None);
        }

        let price = self.policy.delivery_cost(distance_km);
        let shown_km = distance_km.round_dp(1);
        log.record(format!("delivery {shown_km:.1} km = {price}"));

        Ok(Some(QuoteRow {
            kind: RowKind::Delivery,
            label: DELIVERY_LABEL.to_string(),
            description: format!("{shown_km:.1} km"),
            price,
        }))
    }
}
