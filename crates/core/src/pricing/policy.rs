use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::AppConfig;
use crate::domain::product::ProductKey;
use crate::domain::quote::QuoteRequest;
use crate::errors::DomainError;
use crate::pricing::aliases::SCREEN_FAMILY;

/// Delivery is charged for the drive there and back.
const ROUND_TRIP_FACTOR: u32 = 2;

/// Place values the extraction model uses for "no delivery requested".
const EMPTY_PLACE_MARKERS: [&str; 2] = ["neuvedeno", "nedodáno"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricingPolicy {
    pub installation_tiers: Vec<u32>,
    pub rate_per_km: Decimal,
    pub default_screen_height_mm: u32,
    pub exempt_family: String,
    pub origin: String,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            installation_tiers: vec![12, 13, 14, 15],
            rate_per_km: Decimal::from(15),
            default_screen_height_mm: 2500,
            exempt_family: SCREEN_FAMILY.to_string(),
            origin: "Blučina, Czechia".to_string(),
        }
    }
}

impl PricingPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            installation_tiers: config.pricing.installation_tiers.clone(),
            rate_per_km: config.pricing.rate_per_km,
            default_screen_height_mm: config.pricing.default_screen_height_mm,
            exempt_family: SCREEN_FAMILY.to_string(),
            origin: config.distance.origin.clone(),
        }
    }

    pub fn is_installation_exempt(&self, product: &ProductKey) -> bool {
        product.belongs_to_family(&self.exempt_family)
    }

    /// Requested height, or the family default when the exempt family omits it.
    pub fn effective_height(&self, request: &QuoteRequest) -> Result<u32, DomainError> {
        match request.height_mm {
            Some(height_mm) => Ok(height_mm),
            None if self.is_installation_exempt(&request.product) => {
                Ok(self.default_screen_height_mm)
            }
            None => Err(DomainError::MissingDimension {
                product: request.product.clone(),
                field: "hloubka_výška".to_string(),
            }),
        }
    }

    pub fn delivery_place<'a>(&self, request: &'a QuoteRequest) -> Option<&'a str> {
        let place = request.place.as_deref()?.trim();
        if place.is_empty() {
            return None;
        }

        let lowered = place.to_lowercase();
        if EMPTY_PLACE_MARKERS.contains(&lowered.as_str()) {
            return None;
        }

        Some(place)
    }

    pub fn installation_surcharge(&self, base_price: Decimal, percent: u32) -> Decimal {
        round_price(base_price * Decimal::from(percent) / Decimal::ONE_HUNDRED)
    }

    pub fn delivery_cost(&self, distance_km: Decimal) -> Decimal {
        round_price(distance_km * Decimal::from(ROUND_TRIP_FACTOR) * self.rate_per_km)
    }
}

/// Whole-unit rounding with ties to even.
pub fn round_price(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
}
