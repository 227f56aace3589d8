//! Fake Authority Error

use cashier_common::{ActionType, LinkState, ValidationFailure};
use thiserror::Error;

/// Fake Authority Error
#[derive(Debug, Error)]
pub enum Error {
    /// Link does not exist
    #[error("Link `{0}` not found")]
    LinkNotFound(String),
    /// Action does not exist
    #[error("Action `{0}` not found")]
    ActionNotFound(String),
    /// Link is not in a state that allows the action
    #[error("Link is in state {0}")]
    LinkNotActive(LinkState),
    /// Every use of the link has been taken
    #[error("Link has no uses left")]
    LinkExhausted,
    /// Only the creator may run this action
    #[error("Only the link creator can run {0}")]
    NotCreator(ActionType),
    /// Caller is not the action creator
    #[error("Action belongs to another caller")]
    NotActionCreator,
    /// Action type cannot be run anonymously
    #[error("{0} cannot be run anonymously")]
    AnonymousNotAllowed(ActionType),
    /// Action type does not match the stored action
    #[error("Action is a {0} action")]
    ActionTypeMismatch(ActionType),
    /// Action already completed
    #[error("Action is already success")]
    AlreadySuccess,
    /// Finalize token is stale or unknown
    #[error("Invalid finalize token `{0}`")]
    InvalidNonce(String),
    /// Link input rejected
    #[error("Invalid link input: {0}")]
    InvalidInput(String),
    /// Creator's balance cannot fund the link
    #[error("{0}")]
    BalanceCheck(ValidationFailure),
    /// User state cannot move in the requested direction
    #[error("Cannot move user state {0}")]
    InvalidUserState(String),
    /// Ledger account cannot cover the call
    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds {
        /// Account balance
        balance: u128,
        /// Amount plus fee
        required: u128,
    },
    /// Allowance cannot cover the call
    #[error("Insufficient allowance: allowance {allowance}, required {required}")]
    InsufficientAllowance {
        /// Remaining allowance
        allowance: u128,
        /// Amount plus fee
        required: u128,
    },
    /// Caller supplied fee differs from the ledger fee
    #[error("Bad fee, expected {expected}")]
    BadFee {
        /// Ledger fee
        expected: u128,
    },
    /// Injected ledger failure
    #[error("{0}")]
    Injected(String),
    /// Arithmetic overflow
    #[error("Amount overflow")]
    AmountOverflow,
    /// Common Error
    #[error(transparent)]
    Common(#[from] cashier_common::Error),
}

impl From<Error> for cashier::Error {
    fn from(e: Error) -> Self {
        Self::Remote(e.to_string())
    }
}
