//! Balance validation
//!
//! A [`ValidationService`] checks a draft against the live wallet before the
//! wizard leaves the asset step. Failures come back typed and are rendered for
//! display with the token's decimals and symbol.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use cashier_common::util::format_token_amount;
use cashier_common::validation::{TokenInfo, ValidationFailure, WalletSnapshot};
use cashier_common::{Account, Draft};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::connector::LedgerConnector;
use crate::Error;

/// Checks requested amounts against live wallet balances
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait ValidationService: Debug {
    /// Check that the wallet can fund `draft`
    async fn validate(&self, draft: &Draft) -> Result<(), ValidationFailure>;

    /// Current tokens held by the wallet
    async fn wallet_snapshot(&self) -> Result<WalletSnapshot, Error>;
}

/// Token the wallet knows about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    /// Ledger address
    pub address: String,
    /// Ticker symbol
    pub symbol: String,
    /// Decimal places
    pub decimals: u8,
}

/// [`ValidationService`] backed by ledger balance queries
#[derive(Debug, Clone)]
pub struct LedgerBalanceValidator {
    ledger: Arc<dyn LedgerConnector + Send + Sync>,
    account: Account,
    tokens: Vec<TokenMetadata>,
}

impl LedgerBalanceValidator {
    /// Create new [`LedgerBalanceValidator`]
    pub fn new(
        ledger: Arc<dyn LedgerConnector + Send + Sync>,
        account: Account,
        tokens: Vec<TokenMetadata>,
    ) -> Self {
        Self {
            ledger,
            account,
            tokens,
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl ValidationService for LedgerBalanceValidator {
    #[instrument(skip_all)]
    async fn validate(&self, draft: &Draft) -> Result<(), ValidationFailure> {
        let snapshot = self
            .wallet_snapshot()
            .await
            .map_err(|e| ValidationFailure::Other {
                message: e.to_string(),
            })?;

        for asset in &draft.assets {
            let required = asset
                .use_amount
                .checked_mul(u128::from(draft.max_use.get()))
                .ok_or_else(|| ValidationFailure::Other {
                    message: format!("Amount overflow for asset {}", asset.address),
                })?;

            let available = snapshot
                .token(&asset.address)
                .map(|token| token.balance)
                .ok_or_else(|| ValidationFailure::Other {
                    message: format!("Unknown token {}", asset.address),
                })?;

            if available < required {
                return Err(ValidationFailure::insufficient_balance(
                    &asset.address,
                    required,
                    available,
                ));
            }
        }

        Ok(())
    }

    #[instrument(skip_all)]
    async fn wallet_snapshot(&self) -> Result<WalletSnapshot, Error> {
        let mut tokens = Vec::with_capacity(self.tokens.len());
        for token in &self.tokens {
            let balance = self
                .ledger
                .icrc1_balance_of(&token.address, &self.account)
                .await?;
            tokens.push(TokenInfo {
                address: token.address.clone(),
                symbol: token.symbol.clone(),
                decimals: token.decimals,
                balance,
            });
        }

        Ok(WalletSnapshot::new(tokens))
    }
}

/// Turn a balance check failure into a displayable [`Error`]
///
/// An insufficient balance is rendered in token units using the snapshot;
/// without a matching token the reported message is kept verbatim.
pub fn render_failure(failure: ValidationFailure, snapshot: Option<&WalletSnapshot>) -> Error {
    match failure {
        ValidationFailure::InsufficientBalance {
            address,
            required,
            available,
            message,
        } => match snapshot.and_then(|snapshot| snapshot.token(&address)) {
            Some(token) => Error::InsufficientBalance {
                symbol: token.symbol.clone(),
                required: format_token_amount(required, token.decimals),
                available: format_token_amount(available, token.decimals),
                address,
            },
            None => Error::ValidationFailed(message),
        },
        ValidationFailure::Other { message } => Error::ValidationFailed(message),
    }
}
