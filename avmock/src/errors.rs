use crate::callback::DeliveryError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// The caller did not say where clean files should be forwarded
    #[error("Missing targetUrl header")]
    MissingTargetUrl,

    /// The request body could not be read (transport failure or over the size limit)
    #[error("Error reading request body: {message}")]
    BodyRead { message: String },

    /// The request body was read successfully but contained no bytes
    #[error("No file content received")]
    EmptyPayload,

    /// Forwarding a clean file to the callback target failed
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// Configuration failed validation at startup
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MissingTargetUrl | Error::BodyRead { .. } | Error::EmptyPayload => StatusCode::BAD_REQUEST,
            Error::Delivery(_) | Error::InvalidConfig { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the plain-text body sent back to the caller.
    ///
    /// Collaborating test suites assert on these strings, so the wording is part of the contract.
    pub fn user_message(&self) -> String {
        match self {
            Error::MissingTargetUrl | Error::BodyRead { .. } | Error::EmptyPayload => self.to_string(),
            Error::Delivery(delivery) => delivery.to_string(),
            Error::InvalidConfig { .. } => format!("Internal server error: {self}"),
            Error::Other(e) => format!("Internal server error: {e:#}"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::InvalidConfig { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Delivery(_) => {
                tracing::error!("Callback delivery failed: {}", self);
            }
            Error::MissingTargetUrl | Error::BodyRead { .. } | Error::EmptyPayload => {
                tracing::warn!("Client error: {}", self);
            }
        }

        (self.status_code(), self.user_message()).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
