//! Errors

use cashier_common::batch::Method;
use cashier_common::LinkType;
use thiserror::Error;

/// Cashier Error
#[derive(Debug, Error)]
pub enum Error {
    /// Draft has no asset
    #[error("Please add at least one asset")]
    MissingAsset,
    /// Draft has more assets than its link type allows
    #[error("A {link_type} link can carry at most {max} asset(s)")]
    TooManyAssets {
        /// Link type
        link_type: LinkType,
        /// Allowed number of assets
        max: usize,
    },
    /// Asset address is blank
    #[error("Asset address cannot be empty")]
    BlankAddress,
    /// Asset amount is zero
    #[error("Amount must be greater than zero")]
    NonPositiveAmount,
    /// Wallet balance does not cover the draft
    #[error("Insufficient balance: {required} {symbol} required, {available} {symbol} available")]
    InsufficientBalance {
        /// Ledger address
        address: String,
        /// Token symbol
        symbol: String,
        /// Required amount in token units
        required: String,
        /// Available amount in token units
        available: String,
    },
    /// Any other balance check failure, message as reported
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
    /// Title is empty
    #[error("Title cannot be empty")]
    EmptyTitle,
    /// Link type cannot be created through the wizard
    #[error("Link type `{0}` is not supported")]
    UnsupportedLinkType(LinkType),
    /// First wizard step has no predecessor
    #[error("No previous step")]
    NoPreviousStep,
    /// Wizard finished
    #[error("Link creation is complete")]
    TerminalStep,
    /// Draft field belongs to another wizard step
    #[error("{field} cannot be changed at step {step}")]
    LockedField {
        /// Draft field
        field: &'static str,
        /// Current step
        step: String,
    },
    /// Link is active; further progress goes through actions
    #[error("Link is active, use process_action")]
    UseProcessAction,
    /// Draft not found in the local store
    #[error("Draft `{0}` not found")]
    DraftNotFound(String),
    /// Authority rejected a call
    #[error("{0}")]
    Remote(String),
    /// Ledger call failed
    #[error("Ledger `{ledger}` {method} failed: {message}")]
    Ledger {
        /// Ledger canister
        ledger: String,
        /// Method called
        method: Method,
        /// Failure reported by the ledger
        message: String,
    },
    /// Batch plan is malformed
    #[error("Protocol violation: {0}")]
    Protocol(String),
    /// Common Error
    #[error(transparent)]
    Common(#[from] cashier_common::Error),
    /// Database Error
    #[error(transparent)]
    Database(#[from] cashier_common::database::Error),
    /// Config Error
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// Serde Error
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    /// Custom Error
    #[error("`{0}`")]
    Custom(String),
}

