use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::domain::product::ProductKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Width,
    Height,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Width => f.write_str("width"),
            Self::Height => f.write_str("height"),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("no price table for product `{0}`")]
    UnknownProduct(ProductKey),
    #[error("price table `{product}` has no numeric {axis} sizes")]
    EmptyAxis { product: ProductKey, axis: Axis },
    #[error("price table `{product}` has no price for {width_mm} × {height_mm} mm")]
    MissingPriceCell { product: ProductKey, width_mm: u32, height_mm: u32 },
    #[error("invalid {field}: `{value}`")]
    InvalidDimension { field: String, value: String },
    #[error("missing {field} for product `{product}`")]
    MissingDimension { product: ProductKey, field: String },
    #[error("malformed line item: {0}")]
    MalformedItem(String),
    #[error("submission text is empty")]
    EmptySubmission,
}

/// Ways a model reply can arrive but still be unusable for extraction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyFault {
    EmptyResponse,
    MissingJsonArray,
    InvalidJson,
    NotAnArray,
    MalformedCompletion,
}

impl ReplyFault {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyResponse => "empty_response",
            Self::MissingJsonArray => "missing_json_array",
            Self::InvalidJson => "invalid_json",
            Self::NotAnArray => "not_an_array",
            Self::MalformedCompletion => "malformed_completion",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("extraction failure: {0}")]
    Extraction(String),
    #[error("unusable model reply: {message}")]
    ModelReply { fault: ReplyFault, message: String },
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("unusable upstream reply: {message}")]
    UpstreamReply { fault: ReplyFault, message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::UpstreamReply { .. } => {
                "The language model reply could not be turned into line items. Try rephrasing."
            }
            Self::ServiceUnavailable { .. } => {
                "The quoting service could not reach an external provider. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    /// Diagnostic text safe to show alongside `user_message`; internal errors carry none.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::BadRequest { message, .. }
            | Self::UpstreamReply { message, .. }
            | Self::ServiceUnavailable { message, .. } => Some(message),
            Self::Internal { .. } => None,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::UpstreamReply { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::UpstreamReply { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => Self::BadRequest {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::ModelReply { fault, message } => {
                Self::UpstreamReply { fault, message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Extraction(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
