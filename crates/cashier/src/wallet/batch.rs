//! Batch plan execution
//!
//! Executes the ICRC-112 plan returned when an action is confirmed. Rows run
//! in order and the requests of a row run concurrently; the next row starts
//! only once every request of the current row has succeeded. A failing request
//! does not cancel its siblings, which are already on their way to the
//! ledger; the row is awaited in full and the first failure ends the plan.
//! After the last row the action is marked as externally complete and the
//! plan's finalize token is handed back to the authority.
//!
//! Every ledger request must match the transaction it executes. Transfers pay
//! into the link vault and approvals name the link authority as spender.
//!
//! The executor keeps nothing between attempts. When a previous attempt
//! failed part way, confirming the action again yields a plan covering only
//! the unresolved operations, and that plan is executed from scratch.

use std::str::FromStr;

use cashier_common::batch::{ApproveArg, Method, Request, TransferArg};
use cashier_common::{transaction_memo, Account, Action, BatchPlan, Protocol, Transaction};
use futures::future::join_all;
use tracing::instrument;
use uuid::Uuid;

use super::connector::BlockIndex;
use super::LinkWallet;
use crate::Error;

/// Executes a batch plan for one action
#[derive(Debug)]
pub struct BatchExecutor<'a> {
    wallet: &'a LinkWallet,
    action: &'a Action,
}

impl<'a> BatchExecutor<'a> {
    /// Create new [`BatchExecutor`]
    pub fn new(wallet: &'a LinkWallet, action: &'a Action) -> Self {
        Self { wallet, action }
    }

    /// Execute `plan` and finalize the action
    ///
    /// Returns the action as reported by the authority after
    /// `trigger_transaction`. Any failing step aborts the plan and its error
    /// is returned unchanged; nothing is retried.
    #[instrument(skip_all, fields(action_id = %self.action.id, link_id = %self.action.link_id))]
    pub async fn execute(&self, plan: &BatchPlan) -> Result<Action, Error> {
        let nonce = plan
            .finalize_nonce()
            .map_err(|e| Error::Protocol(e.to_string()))?
            .to_string();

        tracing::info!(
            "Executing batch plan with {} row(s) for {} action {}",
            plan.len(),
            self.action.action_type,
            self.action.id
        );

        for (index, row) in plan.rows().iter().enumerate() {
            let calls = row
                .iter()
                .filter(|request| {
                    if request.method.is_ledger_call() {
                        true
                    } else {
                        tracing::debug!("Row {} skipping {} request", index, request.method);
                        false
                    }
                })
                .map(|request| self.execute_request(request));

            let blocks = join_all(calls)
                .await
                .into_iter()
                .collect::<Result<Vec<_>, _>>()?;
            tracing::debug!("Row {} settled in {} ledger call(s)", index, blocks.len());
        }

        self.wallet
            .client
            .update_action(&self.action.id, &self.action.link_id, true)
            .await?;

        let action = self
            .wallet
            .client
            .trigger_transaction(&self.action.id, &self.action.link_id, &nonce)
            .await?;

        tracing::info!("Action {} is {}", action.id, action.state);

        Ok(action)
    }

    async fn execute_request(&self, request: &Request) -> Result<BlockIndex, Error> {
        let transaction = self.owning_transaction(request)?;
        let memo = transaction_memo(&transaction.id).to_vec();

        tracing::debug!(
            "{} on {} for transaction {}",
            request.method,
            request.canister_id,
            transaction.id
        );

        let result = match request.method {
            Method::Icrc1Transfer => {
                let mut arg: TransferArg = request.decode_arg()?;
                check_memo(&arg.memo, &memo)?;
                check_terms(transaction, &arg.to, arg.amount)?;
                self.check_recipient(&arg.to)?;
                arg.memo = Some(memo);
                self.wallet
                    .ledger
                    .icrc1_transfer(&request.canister_id, arg)
                    .await
            }
            Method::Icrc2Approve => {
                let mut arg: ApproveArg = request.decode_arg()?;
                check_memo(&arg.memo, &memo)?;
                check_terms(transaction, &arg.spender, arg.amount)?;
                if arg.spender.owner != self.wallet.authority {
                    return Err(Error::Protocol(format!(
                        "Approval names {} as spender instead of the link authority",
                        arg.spender.owner
                    )));
                }
                arg.memo = Some(memo);
                self.wallet
                    .ledger
                    .icrc2_approve(&request.canister_id, arg)
                    .await
            }
            Method::TriggerTransaction | Method::UpdateAction => {
                return Err(Error::Protocol(format!(
                    "{} is not a ledger call",
                    request.method
                )))
            }
        };

        result.map_err(|err| Error::Ledger {
            ledger: request.canister_id.clone(),
            method: request.method,
            message: err.to_string(),
        })
    }

    /// Transaction of the action a ledger request executes
    fn owning_transaction(&self, request: &Request) -> Result<&'a Transaction, Error> {
        let nonce = request.nonce.as_deref().ok_or_else(|| {
            Error::Protocol(format!("{} request has no transaction id", request.method))
        })?;
        let id = Uuid::from_str(nonce)
            .map_err(|_| Error::Protocol(format!("Invalid transaction id `{nonce}`")))?;

        let transaction = self.action.transaction(&id).ok_or_else(|| {
            Error::Protocol(format!("Transaction {id} is not part of the action"))
        })?;

        let expected = match transaction.protocol {
            Protocol::Icrc1Transfer => Method::Icrc1Transfer,
            Protocol::Icrc2Approve => Method::Icrc2Approve,
        };
        if expected != request.method {
            return Err(Error::Protocol(format!(
                "Transaction {id} is {} but the request is {}",
                transaction.protocol, request.method
            )));
        }

        Ok(transaction)
    }

    /// Whatever the wallet sends goes to the link's vault
    fn check_recipient(&self, to: &Account) -> Result<(), Error> {
        let vault = Account::link_vault(&self.wallet.authority, &self.action.link_id)?;
        if to != &vault {
            return Err(Error::Protocol(format!(
                "Transfer to {to} is not the vault of link {}",
                self.action.link_id
            )));
        }

        Ok(())
    }
}

fn check_terms(transaction: &Transaction, to: &Account, amount: u128) -> Result<(), Error> {
    if to != &transaction.to || amount != transaction.amount {
        return Err(Error::Protocol(format!(
            "Request pays {amount} to {to} but transaction {} pays {} to {}",
            transaction.id, transaction.amount, transaction.to
        )));
    }

    Ok(())
}

fn check_memo(memo: &Option<Vec<u8>>, expected: &[u8]) -> Result<(), Error> {
    match memo {
        Some(memo) if memo.as_slice() != expected => Err(Error::Protocol(
            "Request memo does not match its transaction".to_string(),
        )),
        _ => Ok(()),
    }
}
