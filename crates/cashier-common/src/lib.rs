//! Cashier shared types and functions.
//!
//! This crate is the base foundation to build things that can interact with a
//! Cashier link authority and the ICRC ledgers that fund links.
//!
//! It contains the wire types exchanged with the link authority, the draft
//! model persisted while a link is being created, and the storage trait that
//! draft backends implement.

#[macro_use]
mod macros;

pub mod account;
pub mod action;
pub mod batch;
pub mod database;
pub mod draft;
pub mod error;
pub mod link;
pub mod util;
pub mod validation;

pub use self::account::{link_id_to_subaccount, transaction_memo, Account, Principal, Subaccount};
pub use self::action::{
    Action, ActionState, ActionType, Intent, IntentState, Protocol, Transaction, TransactionState,
};
pub use self::batch::{ApproveArg, BatchPlan, Method, Request, TransferArg};
pub use self::draft::{Draft, DraftAsset, TempLink, TempLinkState, TempLinkUpdate};
pub use self::error::Error;
pub use self::link::{
    AssetInfo, Chain, Link, LinkState, LinkType, LinkUserState, Template, UserStateGoto,
};
pub use self::validation::{TokenInfo, ValidationFailure, WalletSnapshot};
