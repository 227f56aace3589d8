//! Fake ICRC ledgers
//!
//! Any number of ledgers share one [`FakeLedger`], keyed by ledger canister
//! id. Balances start at zero and are seeded with [`FakeLedger::mint`]. Every
//! successful call appends a [`Block`] so the authority can look transfers up
//! by memo the way it would query a real ledger's history.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use cashier::wallet::{BlockIndex, LedgerConnector};
use cashier_common::batch::{ApproveArg, Method, TransferArg};
use cashier_common::{Account, Principal};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::error::Error;

/// Fee of a ledger without an explicit one
pub const DEFAULT_FEE: u128 = 10_000;

/// Ledger operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Tokens created out of thin air
    Mint {
        /// Credited account
        to: Account,
        /// Amount
        amount: u128,
    },
    /// ICRC-1 transfer
    Transfer {
        /// Debited account
        from: Account,
        /// Credited account
        to: Account,
        /// Amount, fee excluded
        amount: u128,
    },
    /// ICRC-2 approve
    Approve {
        /// Approving account
        from: Account,
        /// Account allowed to spend
        spender: Account,
        /// Allowance
        amount: u128,
    },
    /// ICRC-2 transfer_from
    TransferFrom {
        /// Spending account
        spender: Account,
        /// Debited account
        from: Account,
        /// Credited account
        to: Account,
        /// Amount, fee excluded
        amount: u128,
    },
}

/// Ledger block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Ledger canister id
    pub ledger: String,
    /// Index within the ledger
    pub index: BlockIndex,
    /// Operation
    pub operation: Operation,
    /// Memo
    pub memo: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<(String, Account), u128>,
    allowances: HashMap<(String, Account, Account), u128>,
    fees: HashMap<String, u128>,
    blocks: Vec<Block>,
    failures: VecDeque<(Method, String)>,
}

impl LedgerState {
    fn fee(&self, ledger: &str) -> u128 {
        self.fees.get(ledger).copied().unwrap_or(DEFAULT_FEE)
    }

    fn check_fee(&self, ledger: &str, fee: Option<u128>) -> Result<u128, Error> {
        let expected = self.fee(ledger);
        match fee {
            Some(fee) if fee != expected => Err(Error::BadFee { expected }),
            _ => Ok(expected),
        }
    }

    fn take_failure(&mut self, method: Method) -> Option<String> {
        let position = self.failures.iter().position(|(m, _)| *m == method)?;
        self.failures.remove(position).map(|(_, message)| message)
    }

    fn balance(&self, ledger: &str, account: &Account) -> u128 {
        self.balances
            .get(&(ledger.to_string(), account.clone()))
            .copied()
            .unwrap_or_default()
    }

    fn debit(&mut self, ledger: &str, account: &Account, required: u128) -> Result<(), Error> {
        let balance = self.balance(ledger, account);
        if balance < required {
            return Err(Error::InsufficientFunds { balance, required });
        }
        self.balances
            .insert((ledger.to_string(), account.clone()), balance - required);
        Ok(())
    }

    fn credit(&mut self, ledger: &str, account: &Account, amount: u128) -> Result<(), Error> {
        let balance = self
            .balance(ledger, account)
            .checked_add(amount)
            .ok_or(Error::AmountOverflow)?;
        self.balances
            .insert((ledger.to_string(), account.clone()), balance);
        Ok(())
    }

    fn push(&mut self, ledger: &str, operation: Operation, memo: Option<Vec<u8>>) -> BlockIndex {
        let index = self
            .blocks
            .iter()
            .filter(|block| block.ledger == ledger)
            .count() as BlockIndex;
        self.blocks.push(Block {
            ledger: ledger.to_string(),
            index,
            operation,
            memo,
        });
        index
    }
}

/// In-memory ICRC ledgers
#[derive(Debug, Clone, Default)]
pub struct FakeLedger {
    inner: Arc<Mutex<LedgerState>>,
}

impl FakeLedger {
    /// Create new [`FakeLedger`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger view acting on behalf of `caller`
    pub fn connector(&self, caller: Principal) -> FakeLedgerConnector {
        FakeLedgerConnector {
            ledger: self.clone(),
            caller,
        }
    }

    /// Set the transfer fee of a ledger
    pub async fn set_fee(&self, ledger: &str, fee: u128) {
        self.inner.lock().await.fees.insert(ledger.to_string(), fee);
    }

    /// Transfer fee of a ledger
    pub async fn fee(&self, ledger: &str) -> u128 {
        self.inner.lock().await.fee(ledger)
    }

    /// Fail the next call of `method` with `message`
    pub async fn fail_next(&self, method: Method, message: &str) {
        self.inner
            .lock()
            .await
            .failures
            .push_back((method, message.to_string()));
    }

    /// Credit `amount` to `to`
    pub async fn mint(&self, ledger: &str, to: &Account, amount: u128) -> Result<BlockIndex, Error> {
        let mut state = self.inner.lock().await;
        state.credit(ledger, to, amount)?;
        Ok(state.push(
            ledger,
            Operation::Mint {
                to: to.clone(),
                amount,
            },
            None,
        ))
    }

    /// Balance of an account
    pub async fn balance_of(&self, ledger: &str, account: &Account) -> u128 {
        self.inner.lock().await.balance(ledger, account)
    }

    /// Remaining allowance of `spender` over `from`
    pub async fn allowance(&self, ledger: &str, from: &Account, spender: &Account) -> u128 {
        self.inner
            .lock()
            .await
            .allowances
            .get(&(ledger.to_string(), from.clone(), spender.clone()))
            .copied()
            .unwrap_or_default()
    }

    /// Latest block of `ledger` carrying `memo`
    pub async fn find_by_memo(&self, ledger: &str, memo: &[u8]) -> Option<Block> {
        self.inner
            .lock()
            .await
            .blocks
            .iter()
            .rev()
            .find(|block| block.ledger == ledger && block.memo.as_deref() == Some(memo))
            .cloned()
    }

    /// Every block of every ledger in append order
    pub async fn blocks(&self) -> Vec<Block> {
        self.inner.lock().await.blocks.clone()
    }

    /// ICRC-1 transfer from `caller`
    #[instrument(skip(self, arg), fields(amount = arg.amount))]
    pub async fn transfer(
        &self,
        ledger: &str,
        caller: &Principal,
        arg: TransferArg,
    ) -> Result<BlockIndex, Error> {
        let mut state = self.inner.lock().await;
        if let Some(message) = state.take_failure(Method::Icrc1Transfer) {
            tracing::warn!("Injected icrc1_transfer failure on {}", ledger);
            return Err(Error::Injected(message));
        }

        let fee = state.check_fee(ledger, arg.fee)?;
        let from = Account {
            owner: caller.clone(),
            subaccount: arg.from_subaccount,
        };
        let required = arg.amount.checked_add(fee).ok_or(Error::AmountOverflow)?;

        state.debit(ledger, &from, required)?;
        state.credit(ledger, &arg.to, arg.amount)?;

        let index = state.push(
            ledger,
            Operation::Transfer {
                from,
                to: arg.to,
                amount: arg.amount,
            },
            arg.memo,
        );
        tracing::debug!("icrc1_transfer on {} settled in block {}", ledger, index);

        Ok(index)
    }

    /// ICRC-2 approve from `caller`
    ///
    /// Replaces any existing allowance; the fee is charged to the approver.
    #[instrument(skip(self, arg), fields(amount = arg.amount))]
    pub async fn approve(
        &self,
        ledger: &str,
        caller: &Principal,
        arg: ApproveArg,
    ) -> Result<BlockIndex, Error> {
        let mut state = self.inner.lock().await;
        if let Some(message) = state.take_failure(Method::Icrc2Approve) {
            tracing::warn!("Injected icrc2_approve failure on {}", ledger);
            return Err(Error::Injected(message));
        }

        let fee = state.check_fee(ledger, arg.fee)?;
        let from = Account {
            owner: caller.clone(),
            subaccount: arg.from_subaccount,
        };
        let key = (ledger.to_string(), from.clone(), arg.spender.clone());

        if let Some(expected) = arg.expected_allowance {
            let current = state.allowances.get(&key).copied().unwrap_or_default();
            if current != expected {
                return Err(Error::InsufficientAllowance {
                    allowance: current,
                    required: expected,
                });
            }
        }

        state.debit(ledger, &from, fee)?;
        state.allowances.insert(key, arg.amount);

        Ok(state.push(
            ledger,
            Operation::Approve {
                from,
                spender: arg.spender,
                amount: arg.amount,
            },
            arg.memo,
        ))
    }

    /// ICRC-2 transfer_from, spending an allowance granted to `spender`
    #[instrument(skip(self, memo))]
    pub async fn transfer_from(
        &self,
        ledger: &str,
        spender: &Account,
        from: &Account,
        to: &Account,
        amount: u128,
        memo: Option<Vec<u8>>,
    ) -> Result<BlockIndex, Error> {
        let mut state = self.inner.lock().await;
        let fee = state.fee(ledger);
        let required = amount.checked_add(fee).ok_or(Error::AmountOverflow)?;

        let key = (ledger.to_string(), from.clone(), spender.clone());
        let allowance = state.allowances.get(&key).copied().unwrap_or_default();
        if allowance < required {
            return Err(Error::InsufficientAllowance {
                allowance,
                required,
            });
        }

        state.debit(ledger, from, required)?;
        state.credit(ledger, to, amount)?;
        state.allowances.insert(key, allowance - required);

        Ok(state.push(
            ledger,
            Operation::TransferFrom {
                spender: spender.clone(),
                from: from.clone(),
                to: to.clone(),
                amount,
            },
            memo,
        ))
    }
}

/// [`LedgerConnector`] over a [`FakeLedger`] for one caller
#[derive(Debug, Clone)]
pub struct FakeLedgerConnector {
    ledger: FakeLedger,
    caller: Principal,
}

#[async_trait]
impl LedgerConnector for FakeLedgerConnector {
    async fn icrc1_transfer(
        &self,
        ledger: &str,
        arg: TransferArg,
    ) -> Result<BlockIndex, cashier::Error> {
        Ok(self.ledger.transfer(ledger, &self.caller, arg).await?)
    }

    async fn icrc2_approve(
        &self,
        ledger: &str,
        arg: ApproveArg,
    ) -> Result<BlockIndex, cashier::Error> {
        Ok(self.ledger.approve(ledger, &self.caller, arg).await?)
    }

    async fn icrc1_balance_of(
        &self,
        ledger: &str,
        account: &Account,
    ) -> Result<u128, cashier::Error> {
        Ok(self.ledger.balance_of(ledger, account).await)
    }

    async fn icrc1_fee(&self, ledger: &str) -> Result<u128, cashier::Error> {
        Ok(self.ledger.fee(ledger).await)
    }
}
