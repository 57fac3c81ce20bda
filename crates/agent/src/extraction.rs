//! Prompt construction and parsing of the model's line-item reply.
//!
//! The model is only a translator from free text to line items. It never
//! chooses prices; every reply is parsed defensively and each item is
//! validated on its own so one bad item does not sink the others.

use rust_decimal::prelude::ToPrimitive;
use serde_json::{Map, Value};
use sizequote_core::domain::product::ProductKey;
use sizequote_core::domain::quote::QuoteRequest;
use sizequote_core::errors::{ApplicationError, DomainError, ReplyFault};
use sizequote_core::pricing::aliases::AliasTable;
use sizequote_core::pricing::table::parse_locale_decimal;
use thiserror::Error;

pub const FIELD_PRODUCT: &str = "produkt";
pub const FIELD_WIDTH: &str = "šířka";
pub const FIELD_HEIGHT: &str = "hloubka_výška";
pub const FIELD_PLACE: &str = "misto";
pub const FIELD_NOT_FOUND: &str = "nenalezeno";
pub const FIELD_MESSAGE: &str = "zprava";
pub const DEFAULT_NOT_FOUND_MESSAGE: &str = "Produkt nenalezen.";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("language model returned an empty response")]
    EmptyResponse,
    #[error("language model response contains no JSON array")]
    MissingJsonArray,
    #[error("language model JSON could not be parsed: {0}")]
    InvalidJson(String),
    #[error("language model JSON is not an array")]
    NotAnArray,
    #[error("language model request failed: {0}")]
    Transport(String),
    #[error("language model endpoint returned HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("language model completion is malformed: {0}")]
    MalformedCompletion(String),
}

impl ExtractionError {
    /// The reply arrived but cannot be used; `None` for transport-level failures.
    pub fn reply_fault(&self) -> Option<ReplyFault> {
        match self {
            Self::EmptyResponse => Some(ReplyFault::EmptyResponse),
            Self::MissingJsonArray => Some(ReplyFault::MissingJsonArray),
            Self::InvalidJson(_) => Some(ReplyFault::InvalidJson),
            Self::NotAnArray => Some(ReplyFault::NotAnArray),
            Self::MalformedCompletion(_) => Some(ReplyFault::MalformedCompletion),
            Self::Transport(_) | Self::UnexpectedStatus { .. } => None,
        }
    }
}

impl From<ExtractionError> for ApplicationError {
    fn from(error: ExtractionError) -> Self {
        match error.reply_fault() {
            Some(fault) => ApplicationError::ModelReply { fault, message: error.to_string() },
            None => ApplicationError::Extraction(error.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// One entry per extracted item, in reply order.
    Recognized(Vec<Result<QuoteRequest, DomainError>>),
    Unrecognized { message: String },
}

/// System instruction naming every priceable product.
pub fn build_system_prompt<'a>(products: impl IntoIterator<Item = &'a ProductKey>) -> String {
    let names = products.into_iter().map(ProductKey::as_str).collect::<Vec<_>>().join(", ");

    format!(
        "Z následujícího textu vypiš VŠECHNY produkty. U každého uveď název, šířku v mm, \
         hloubku nebo výšku v mm a místo dodání. \
         Název vyber co nejpřesněji z tohoto seznamu produktů: {names}. \
         Výrazy 'screen', 'screenová roleta' a 'boční screen' vždy přiřaď k produktu 'screen'. \
         Rozměry zadané výpočtem (např. 3590-240) vždy vypočítej. \
         Odpověz POUZE validním JSON polem, např. \
         [{{\"{FIELD_PRODUCT}\": \"...\", \"{FIELD_WIDTH}\": ..., \"{FIELD_HEIGHT}\": ..., \"{FIELD_PLACE}\": \"...\"}}] \
         nebo [{{\"{FIELD_NOT_FOUND}\": true, \"{FIELD_MESSAGE}\": \"...\"}}]."
    )
}

/// The slice from the first `[` to the last `]`, tolerating prose around it.
pub fn extract_json_block(raw: &str) -> Result<&str, ExtractionError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ExtractionError::EmptyResponse);
    }

    match (raw.find('['), raw.rfind(']')) {
        (Some(start), Some(end)) if start < end => Ok(&raw[start..=end]),
        _ => Err(ExtractionError::MissingJsonArray),
    }
}

pub fn parse_outcome(
    block: &str,
    aliases: &AliasTable,
) -> Result<ExtractionOutcome, ExtractionError> {
    let value: Value =
        serde_json::from_str(block).map_err(|error| {
            ExtractionError::InvalidJson(error.to_string())
        })?;
    let Value::Array(items) = value else {
        return Err(ExtractionError::NotAnArray);
    };

    if let Some(message) = items.first().and_then(not_found_message) {
        return Ok(ExtractionOutcome::Unrecognized { message });
    }

    Ok(ExtractionOutcome::Recognized(items.iter().map(|item| parse_item(item, aliases)).collect()))
}

/// Full reply handling: boundary slice then parse.
pub fn parse_reply(raw: &str, aliases: &AliasTable) -> Result<ExtractionOutcome, ExtractionError> {
    parse_outcome(extract_json_block(raw)?, aliases)
}

fn not_found_message(first: &Value) -> Option<String> {
    let object = first.as_object()?;
    object.get(FIELD_NOT_FOUND)?;

    let message = object
        .get(FIELD_MESSAGE)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .unwrap_or(DEFAULT_NOT_FOUND_MESSAGE);
    Some(message.to_string())
}

pub fn parse_item(item: &Value, aliases: &AliasTable) -> Result<QuoteRequest, DomainError> {
    let Some(object) = item.as_object() else {
        return Err(DomainError::MalformedItem(format!("expected an object, got `{item}`")));
    };

    let raw_product = match object.get(FIELD_PRODUCT) {
        Some(Value::String(name)) if !name.trim().is_empty() => name,
        Some(other) => {
            return Err(DomainError::MalformedItem(format!("invalid {FIELD_PRODUCT}: `{other}`")))
        }
        None => return Err(DomainError::MalformedItem(format!("missing {FIELD_PRODUCT}"))),
    };
    let product = aliases.canonicalize(raw_product);

    let width_mm = match optional_field(object, FIELD_WIDTH) {
        Some(value) => coerce_dimension(FIELD_WIDTH, value)?,
        None => {
            return Err(DomainError::MissingDimension { product, field: FIELD_WIDTH.to_string() })
        }
    };

    let height_mm = optional_field(object, FIELD_HEIGHT)
        .map(|value| coerce_dimension(FIELD_HEIGHT, value))
        .transpose()?;

    let place = match optional_field(object, FIELD_PLACE) {
        Some(Value::String(place)) => Some(place.clone()),
        Some(other) => {
            return Err(DomainError::MalformedItem(format!("invalid {FIELD_PLACE}: `{other}`")))
        }
        None => None,
    };

    Ok(QuoteRequest { product, width_mm, height_mm, place })
}

/// Missing keys and explicit nulls both count as absent.
fn optional_field<'a>(object: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    object.get(field).filter(|value| !value.is_null())
}

/// Accepts numbers or numeric strings; fractions truncate toward zero.
pub fn coerce_dimension(field: &str, value: &Value) -> Result<u32, DomainError> {
    let invalid =
        || DomainError::InvalidDimension { field: field.to_string(), value: value.to_string() };

    let millimetres = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_locale_decimal(text).and_then(|decimal| decimal.to_f64()),
        _ => None,
    }
    .ok_or_else(invalid)?;

    let truncated = millimetres.trunc();
    if !(truncated >= 1.0 && truncated <= f64::from(u32::MAX)) {
        return Err(invalid());
    }
    Ok(truncated as u32)
}
