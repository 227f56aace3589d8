//! ICRC-112 batch plans
//!
//! Confirming an action that needs client side ledger work returns a
//! [`BatchPlan`]: rows of [`Request`]s. Rows are dependency boundaries, every
//! request of a row may assume all earlier rows completed. Exactly one request
//! in the whole plan is a `trigger_transaction` whose nonce is the token that
//! finalizes the action.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::account::{Account, Subaccount};
use crate::error::Error;

wire_enum! {
    /// Method a request invokes on its target canister
    pub enum Method {
        /// ICRC-1 transfer on a ledger
        Icrc1Transfer => "icrc1_transfer",
        /// ICRC-2 approve on a ledger
        Icrc2Approve => "icrc2_approve",
        /// Hand control back to the authority
        TriggerTransaction => "trigger_transaction",
        /// Attest that off-chain steps completed
        UpdateAction => "update_action",
    }
}

impl Method {
    /// Whether the request moves funds on a ledger
    pub fn is_ledger_call(&self) -> bool {
        matches!(self, Method::Icrc1Transfer | Method::Icrc2Approve)
    }
}

/// One call in a batch plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Method
    pub method: Method,
    /// Target canister
    pub canister_id: String,
    /// For ledger calls the owning transaction id, for `trigger_transaction`
    /// the finalize token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Method argument, JSON encoded
    pub arg: String,
}

impl Request {
    /// Build a request, encoding `arg`
    pub fn new<A: Serialize>(
        method: Method,
        canister_id: impl Into<String>,
        nonce: Option<String>,
        arg: &A,
    ) -> Result<Self, Error> {
        Ok(Self {
            method,
            canister_id: canister_id.into(),
            nonce,
            arg: serde_json::to_string(arg)?,
        })
    }

    /// Decode the argument as `A`
    pub fn decode_arg<A: DeserializeOwned>(&self) -> Result<A, Error> {
        serde_json::from_str(&self.arg).map_err(|e| Error::InvalidArgument {
            method: self.method.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Argument of `icrc1_transfer`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferArg {
    /// Paying subaccount of the caller
    #[serde(default)]
    pub from_subaccount: Option<Subaccount>,
    /// Recipient
    pub to: Account,
    /// Amount in base units
    pub amount: u128,
    /// Expected ledger fee
    #[serde(default)]
    pub fee: Option<u128>,
    /// Memo
    #[serde(default)]
    pub memo: Option<Vec<u8>>,
    /// Deduplication timestamp in nanoseconds
    #[serde(default)]
    pub created_at_time: Option<u64>,
}

/// Argument of `icrc2_approve`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveArg {
    /// Approving subaccount of the caller
    #[serde(default)]
    pub from_subaccount: Option<Subaccount>,
    /// Account allowed to spend
    pub spender: Account,
    /// Allowance in base units
    pub amount: u128,
    /// Allowance the caller expects to replace
    #[serde(default)]
    pub expected_allowance: Option<u128>,
    /// Expiry in nanoseconds
    #[serde(default)]
    pub expires_at: Option<u64>,
    /// Expected ledger fee
    #[serde(default)]
    pub fee: Option<u128>,
    /// Memo
    #[serde(default)]
    pub memo: Option<Vec<u8>>,
    /// Deduplication timestamp in nanoseconds
    #[serde(default)]
    pub created_at_time: Option<u64>,
}

/// Argument of `trigger_transaction`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerTransactionArg {
    /// Action id
    pub action_id: String,
    /// Link id
    pub link_id: String,
    /// Finalize token
    pub transaction_id: String,
}

/// Argument of `update_action`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateActionArg {
    /// Action id
    pub action_id: String,
    /// Link id
    pub link_id: String,
    /// Off-chain steps completed
    pub external: bool,
}

/// Ordered rows of requests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchPlan(pub Vec<Vec<Request>>);

impl BatchPlan {
    /// Create plan from rows
    pub fn new(rows: Vec<Vec<Request>>) -> Self {
        Self(rows)
    }

    /// Rows
    pub fn rows(&self) -> &[Vec<Request>] {
        &self.0
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Plan has no rows
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All requests in row order
    pub fn requests(&self) -> impl Iterator<Item = &Request> {
        self.0.iter().flatten()
    }

    /// Nonce of the single `trigger_transaction` request
    pub fn finalize_nonce(&self) -> Result<&str, Error> {
        let mut triggers = self
            .requests()
            .filter(|request| request.method == Method::TriggerTransaction);

        let trigger = triggers.next().ok_or(Error::MissingTriggerTransaction)?;
        let extra = triggers.count();
        if extra > 0 {
            return Err(Error::DuplicateTriggerTransaction(extra + 1));
        }

        trigger.nonce.as_deref().ok_or(Error::MissingNonce)
    }
}
