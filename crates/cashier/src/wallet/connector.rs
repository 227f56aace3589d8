//! Remote interfaces
//!
//! [`LinkConnector`] connects a wallet to the link authority and
//! [`LedgerConnector`] to the ICRC ledgers. Both act on behalf of the caller
//! the connector was built for.

use std::fmt::Debug;

use async_trait::async_trait;
use cashier_common::batch::{ApproveArg, TransferArg};
use cashier_common::link::{
    CreateLinkInput, CreateLinkOutput, LinkGetUserStateInput, LinkGetUserStateOutput,
    LinkUpdateUserStateInput,
};
use cashier_common::{Account, Action, ActionType, Link, Principal};

use crate::Error;

/// Ledger block index
pub type BlockIndex = u128;

/// Interface that connects a wallet to the link authority
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait LinkConnector: Debug {
    /// Create a link and its CreateLink action
    async fn create_link_v2(&self, input: CreateLinkInput) -> Result<CreateLinkOutput, Error>;

    /// Get a link
    async fn get_link(&self, link_id: &str) -> Result<Link, Error>;

    /// Create an action, or return the one already in flight for the same
    /// link, type and caller
    async fn create_action(&self, link_id: &str, action_type: ActionType)
        -> Result<Action, Error>;

    /// Create an action for a caller identified only by wallet address
    async fn create_action_anonymous(
        &self,
        link_id: &str,
        action_type: ActionType,
        wallet_address: &Principal,
    ) -> Result<Action, Error>;

    /// Confirm an action. Returns the batch plan in `icrc_112_requests` when
    /// the caller has ledger work to do
    async fn process_action(
        &self,
        link_id: &str,
        action_id: &str,
        action_type: ActionType,
    ) -> Result<Action, Error>;

    /// Confirm an action created anonymously
    async fn process_action_anonymous(
        &self,
        link_id: &str,
        action_id: &str,
        action_type: ActionType,
        wallet_address: &Principal,
    ) -> Result<Action, Error>;

    /// Attest that off-chain steps of an action completed
    async fn update_action(
        &self,
        action_id: &str,
        link_id: &str,
        external: bool,
    ) -> Result<Action, Error>;

    /// Hand control back to the authority with the plan's finalize token
    async fn trigger_transaction(
        &self,
        action_id: &str,
        link_id: &str,
        transaction_id: &str,
    ) -> Result<Action, Error>;

    /// Caller progress on a link
    async fn link_get_user_state(
        &self,
        input: LinkGetUserStateInput,
    ) -> Result<Option<LinkGetUserStateOutput>, Error>;

    /// Move caller progress on a link
    async fn link_update_user_state(
        &self,
        input: LinkUpdateUserStateInput,
    ) -> Result<Option<LinkGetUserStateOutput>, Error>;
}

/// Interface that connects a wallet to ICRC ledgers
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait LedgerConnector: Debug {
    /// ICRC-1 transfer from the caller
    async fn icrc1_transfer(&self, ledger: &str, arg: TransferArg) -> Result<BlockIndex, Error>;

    /// ICRC-2 approve from the caller
    async fn icrc2_approve(&self, ledger: &str, arg: ApproveArg) -> Result<BlockIndex, Error>;

    /// Balance of an account
    async fn icrc1_balance_of(&self, ledger: &str, account: &Account) -> Result<u128, Error>;

    /// Transfer fee of a ledger
    async fn icrc1_fee(&self, ledger: &str) -> Result<u128, Error>;
}
