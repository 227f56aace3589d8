//! Actions, intents and transactions
//!
//! An [`Action`] is one lifecycle attempt against a link. It is made of
//! [`Intent`]s, each of which owns one or more ledger [`Transaction`]s. All
//! three carry a state that mirrors the action state machine; the state
//! strings are stable wire constants.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::{transaction_memo, Account, Principal};
use crate::batch::BatchPlan;

wire_enum! {
    /// Kind of action
    pub enum ActionType {
        /// Fund a freshly created link
        CreateLink => "CreateLink",
        /// Redeem a link
        Use => "Use",
        /// Redeem a link into an anonymous wallet
        Claim => "Claim",
        /// Creator takes the remaining funds back
        Withdraw => "Withdraw",
    }
}

wire_enum! {
    /// Action state
    pub enum ActionState {
        /// Created, not yet confirmed
        Created => "Action_state_created",
        /// Confirmed, waiting for ledger operations
        Processing => "Action_state_processing",
        /// All intents succeeded
        Success => "Action_state_success",
        /// At least one intent failed
        Fail => "Action_state_fail",
    }
}

impl ActionState {
    /// Whether the action has completed successfully
    pub fn is_success(&self) -> bool {
        matches!(self, ActionState::Success)
    }
}

wire_enum! {
    /// Intent state
    pub enum IntentState {
        /// Created
        Created => "Intent_state_created",
        /// Waiting for ledger operations
        Processing => "Intent_state_processing",
        /// Settled
        Success => "Intent_state_success",
        /// Not settled in time
        Fail => "Intent_state_fail",
    }
}

wire_enum! {
    /// Transaction state
    pub enum TransactionState {
        /// Created
        Created => "Transaction_state_created",
        /// Handed to the caller for execution
        Processing => "Transaction_state_processing",
        /// Observed on the ledger
        Success => "Transaction_state_success",
        /// Not observed in time
        Fail => "Transaction_state_fail",
    }
}

wire_enum! {
    /// Ledger protocol of a transaction
    pub enum Protocol {
        /// ICRC-1 transfer
        Icrc1Transfer => "Icrc1Transfer",
        /// ICRC-2 approve
        Icrc2Approve => "Icrc2Approve",
    }
}

/// Single ledger operation owned by an intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Content addressed id, also the transfer memo
    pub id: Uuid,
    /// State
    pub state: TransactionState,
    /// Ledger protocol
    pub protocol: Protocol,
    /// Ledger canister
    pub asset: String,
    /// Paying account
    pub from: Account,
    /// Receiving account, or spender for approvals
    pub to: Account,
    /// Amount in base units
    pub amount: u128,
    /// Transactions that must settle first
    #[serde(default)]
    pub dependency: Vec<Uuid>,
    /// Execution group; lower groups run first
    pub group: u16,
    /// Creation time in nanoseconds
    pub created_at: u64,
}

impl Transaction {
    /// Memo the ledger transfer must carry
    pub fn memo(&self) -> [u8; 32] {
        transaction_memo(&self.id)
    }
}

/// Logical transfer goal of an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    /// Intent id
    pub id: Uuid,
    /// State
    pub state: IntentState,
    /// Authority task label, e.g. `transfer_wallet_to_link`
    pub task: String,
    /// Transactions
    pub transactions: Vec<Transaction>,
}

/// Action as returned by the authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Action id
    pub id: String,
    /// Link this action belongs to
    pub link_id: String,
    /// Action type
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// State
    pub state: ActionState,
    /// Principal that created the action
    pub creator: Principal,
    /// Intents
    pub intents: Vec<Intent>,
    /// Ledger operations the caller has to execute, present after a confirm
    /// that requires client side work
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icrc_112_requests: Option<BatchPlan>,
}

impl Action {
    /// Intent states in order
    pub fn intent_states(&self) -> Vec<IntentState> {
        self.intents.iter().map(|intent| intent.state).collect()
    }

    /// Find a transaction by id
    pub fn transaction(&self, id: &Uuid) -> Option<&Transaction> {
        self.intents
            .iter()
            .flat_map(|intent| intent.transactions.iter())
            .find(|tx| &tx.id == id)
    }
}
