//! Error types for the three pipeline stages.
//!
//! Each stage has its own error enum; none of them is recovered from
//! internally. Errors cross the binary boundary through `anyhow` in `main`.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while fetching a GRIB2 file from the remote archive.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("remote returned {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while extracting fields or rendering a product.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid GRIB2 data: {0}")]
    Grib(String),

    #[error("product '{product}' is missing field {field}")]
    MissingField {
        product: &'static str,
        field: &'static str,
    },

    #[error("product '{product}': expected {expected} grid points, file has {actual}")]
    GridMismatch {
        product: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

impl RenderError {
    /// The product a per-product error is attributable to, if any.
    pub fn product(&self) -> Option<&'static str> {
        match self {
            RenderError::MissingField { product, .. }
            | RenderError::GridMismatch { product, .. } => Some(product),
            _ => None,
        }
    }
}

/// Errors raised while packaging images or sending the e-mail.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("no products to deliver")]
    NoProducts,

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid e-mail address '{address}': {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP transport failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("no SMTP password: pass --password or set EMAIL_PASSWORD")]
    MissingCredentials,
}
