//! Submission pipeline around the pricing core.
//!
//! - `llm`: pluggable chat client (OpenAI-compatible, Anthropic, Ollama)
//! - `extraction`: prompt construction and defensive parsing of the model reply
//! - `distance`: Google Distance Matrix lookups for delivery pricing
//! - `runtime`: `QuoteRuntime`, which drives one submission against a `QuoteSession`
//!
//! The model is strictly a translator. Prices, surcharges and delivery costs
//! are computed by `sizequote-core` from the loaded price tables.

pub mod distance;
pub mod extraction;
pub mod llm;
pub mod runtime;

pub use distance::{DistanceError, GoogleDistanceClient};
pub use extraction::{ExtractionError, ExtractionOutcome};
pub use llm::LlmClient;
pub use runtime::{QuoteRuntime, SubmissionOutcome};
