//! Bridge error types

use thiserror::Error;

use crate::hid::PointerError;

/// Errors that end a bridge session
///
/// Only the fatal failure domain lives here. Per-frame decode problems are
/// [`crate::notify::DecodeError`] and never reach the caller; they are
/// logged and the frame is dropped.
#[derive(Error, Debug)]
pub enum BridgeError {
    // Bus-level failures
    #[error("D-Bus connection error: {0}")]
    Connection(#[from] zbus::Error),

    #[error("Object tree query failed: {0}")]
    ObjectQuery(#[source] zbus::fdo::Error),

    #[error("Reading {property} on {path} failed: {source}")]
    PropertyRead {
        property: &'static str,
        path: String,
        #[source]
        source: zbus::Error,
    },

    #[error("{operation} on {path} failed: {source}")]
    Call {
        operation: &'static str,
        path: String,
        #[source]
        source: zbus::Error,
    },

    // Discovery failures
    #[error("No characteristic with UUID {0} found")]
    CharacteristicNotFound(String),

    // Virtual input device failures
    #[error("Virtual pointer error: {0}")]
    Pointer(#[from] PointerError),
}
