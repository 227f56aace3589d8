//! Balance validation failures
//!
//! Balance checks report failures as text. [`ValidationFailure::parse`] turns
//! that text into a typed value at the boundary so nothing past it matches on
//! raw strings.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static INSUFFICIENT_BALANCE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)insufficient balance for (?:asset|token)\s+([A-Za-z0-9\-]+)\D*?required\D*?(\d+)\D*?available\D*?(\d+)",
    )
    .ok()
});

/// Failure returned by a balance check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationFailure {
    /// Wallet holds less than the draft needs
    InsufficientBalance {
        /// Ledger address of the asset
        address: String,
        /// Required base units
        required: u128,
        /// Available base units
        available: u128,
        /// Message as reported
        message: String,
    },
    /// Any other failure
    Other {
        /// Message as reported
        message: String,
    },
}

impl ValidationFailure {
    /// Typed failure for an insufficient balance, with its canonical message
    pub fn insufficient_balance(address: &str, required: u128, available: u128) -> Self {
        Self::InsufficientBalance {
            address: address.to_string(),
            required,
            available,
            message: format!(
                "Insufficient balance for asset {address}: required {required}, available {available}"
            ),
        }
    }

    /// Parse a raw failure message
    pub fn parse(raw: &str) -> Self {
        let captures = INSUFFICIENT_BALANCE
            .as_ref()
            .and_then(|re| re.captures(raw));

        let parsed = captures.and_then(|caps| {
            let address = caps.get(1)?.as_str().to_string();
            let required = caps.get(2)?.as_str().parse().ok()?;
            let available = caps.get(3)?.as_str().parse().ok()?;
            Some((address, required, available))
        });

        match parsed {
            Some((address, required, available)) => Self::InsufficientBalance {
                address,
                required,
                available,
                message: raw.to_string(),
            },
            None => {
                tracing::warn!("Validation failure did not match a known pattern: {}", raw);
                Self::Other {
                    message: raw.to_string(),
                }
            }
        }
    }

    /// Message as reported
    pub fn message(&self) -> &str {
        match self {
            Self::InsufficientBalance { message, .. } | Self::Other { message } => message,
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Token held by the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Ledger address
    pub address: String,
    /// Ticker symbol
    pub symbol: String,
    /// Decimal places
    pub decimals: u8,
    /// Balance in base units
    pub balance: u128,
}

/// Live view of the wallet's tokens
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    /// Tokens
    pub tokens: Vec<TokenInfo>,
}

impl WalletSnapshot {
    /// Create new [`WalletSnapshot`]
    pub fn new(tokens: Vec<TokenInfo>) -> Self {
        Self { tokens }
    }

    /// Look up a token by ledger address
    pub fn token(&self, address: &str) -> Option<&TokenInfo> {
        self.tokens.iter().find(|token| token.address == address)
    }
}
