pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;
pub mod session;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::product::ProductKey;
pub use domain::quote::{QuoteRequest, QuoteResult, QuoteRow, RowKind, SubmissionId};
pub use errors::{ApplicationError, Axis, DomainError, InterfaceError, ReplyFault};
pub use pricing::{
    AliasTable, DistanceLookup, LineItemComposer, PriceTable, PriceTableStore, PricingPolicy,
};
pub use session::{DebugEntry, DebugLog, QuoteSession};
