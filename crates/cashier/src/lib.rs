//! Client library for Cashier links
//!
//! Walks a link through its creation wizard, persisting the draft at every
//! step, and drives the ledger operations the link authority hands back when
//! an action is confirmed.

#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub mod cashier_database {
    //! Cashier Database
    pub use cashier_common::database::{DraftDatabase, DynDraftDatabase, Error};
}

pub mod error;
#[cfg(feature = "wallet")]
pub mod wallet;

/// Re-export common types
#[doc(hidden)]
pub use cashier_common::{
    account, action, batch, draft, link, util, validation, Account, Action, ActionState,
    ActionType, BatchPlan, Draft, DraftAsset, Link, LinkState, LinkType, Principal, Subaccount,
    TempLink, TempLinkState,
};

pub use self::error::Error;
#[cfg(feature = "wallet")]
#[doc(hidden)]
pub use self::wallet::{LinkWallet, LinkWalletBuilder};
