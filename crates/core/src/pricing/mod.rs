pub mod aliases;
pub mod composer;
pub mod policy;
pub mod resolver;
pub mod store;
pub mod table;

pub use aliases::{AliasTable, SCREEN_FAMILY};
pub use composer::{
    ComposedItem, DistanceLookup, LineItemComposer, DELIVERY_LABEL, INSTALLATION_LABEL,
};
pub use policy::{round_price, PricingPolicy};
pub use resolver::{resolve_price, resolve_size, round_up_to_available, ResolvedPrice, ResolvedSize};
pub use store::{PriceTableError, PriceTableStore};
pub use table::PriceTable;
