//! Errors

use thiserror::Error;

/// Cashier common Error
#[derive(Debug, Error)]
pub enum Error {
    /// A wire string did not match any known variant
    #[error("Unknown {kind} `{value}`")]
    UnknownWireValue {
        /// Type being parsed
        kind: &'static str,
        /// Offending value
        value: String,
    },
    /// Link id is not a UUID
    #[error("Invalid link id `{0}`")]
    InvalidLinkId(String),
    /// Principal text is empty or malformed
    #[error("Invalid principal `{0}`")]
    InvalidPrincipal(String),
    /// Batch plan has no `trigger_transaction` request
    #[error("Batch plan has no trigger_transaction request")]
    MissingTriggerTransaction,
    /// Batch plan has more than one `trigger_transaction` request
    #[error("Batch plan has {0} trigger_transaction requests")]
    DuplicateTriggerTransaction(usize),
    /// `trigger_transaction` request carries no nonce
    #[error("trigger_transaction request has no nonce")]
    MissingNonce,
    /// Request argument could not be decoded for its method
    #[error("Invalid argument for `{method}`: {reason}")]
    InvalidArgument {
        /// Request method
        method: String,
        /// Decode failure
        reason: String,
    },
    /// Max use must be positive
    #[error("Max use must be greater than zero")]
    ZeroMaxUse,
    /// Serde Error
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    /// Uuid Error
    #[error(transparent)]
    Uuid(#[from] uuid::Error),
}
