#![doc = include_str!("./README.md")]

use std::sync::Arc;

use cashier_common::link::{
    LinkGetUserStateInput, LinkGetUserStateOutput, LinkUpdateUserStateInput, UserStateGoto,
};
use cashier_common::{Action, ActionType, Link, Principal, TempLink};
use tracing::instrument;

use crate::cashier_database::DynDraftDatabase;
use crate::error::Error;

pub mod batch;
pub mod builder;
pub mod connector;
pub mod create_link;
pub mod settings;
#[cfg(test)]
mod test_utils;
pub mod validation;

pub use self::batch::BatchExecutor;
pub use self::builder::LinkWalletBuilder;
pub use self::connector::{BlockIndex, LedgerConnector, LinkConnector};
pub use self::create_link::{LinkCreation, Step, StepKind};
pub use self::settings::Settings;
pub use self::validation::{LedgerBalanceValidator, TokenMetadata, ValidationService};

/// Cashier link wallet
///
/// Creates links through the [`LinkCreation`] wizard and runs actions against
/// existing links for a single owner.
#[derive(Debug, Clone)]
pub struct LinkWallet {
    /// Caller
    pub owner: Principal,
    /// Link authority, spender of approvals and owner of link vaults
    pub authority: Principal,
    /// Draft storage backend
    pub localstore: DynDraftDatabase,
    client: Arc<dyn LinkConnector + Send + Sync>,
    ledger: Arc<dyn LedgerConnector + Send + Sync>,
    validator: Arc<dyn ValidationService + Send + Sync>,
}

impl LinkWallet {
    /// Create new [`LinkWallet`]
    pub fn new(
        owner: Principal,
        authority: Principal,
        localstore: DynDraftDatabase,
        client: Arc<dyn LinkConnector + Send + Sync>,
        ledger: Arc<dyn LedgerConnector + Send + Sync>,
        validator: Arc<dyn ValidationService + Send + Sync>,
    ) -> Self {
        Self {
            owner,
            authority,
            localstore,
            client,
            ledger,
            validator,
        }
    }

    /// Start creating a new link
    pub async fn start_link_creation(&self) -> Result<LinkCreation<'_>, Error> {
        LinkCreation::start(self).await
    }

    /// Continue a persisted draft
    pub async fn resume_link_creation(&self, id: &str) -> Result<LinkCreation<'_>, Error> {
        LinkCreation::resume(self, id).await
    }

    /// Drafts of the owner, oldest first
    #[instrument(skip(self))]
    pub async fn list_link_drafts(&self) -> Result<Vec<TempLink>, Error> {
        Ok(self.localstore.get(&self.owner).await?)
    }

    /// Drop a draft
    #[instrument(skip(self))]
    pub async fn discard_link_draft(&self, id: &str) -> Result<(), Error> {
        self.localstore.delete(id, &self.owner).await?;
        tracing::info!("Discarded link draft {}", id);
        Ok(())
    }

    /// Get a link from the authority
    #[instrument(skip(self))]
    pub async fn get_link(&self, link_id: &str) -> Result<Link, Error> {
        self.client.get_link(link_id).await
    }

    /// Run an action on a link to completion
    ///
    /// Creates the action, or picks up the one already in flight for this
    /// link, type and owner, confirms it and executes the returned batch plan.
    /// Calling again after a failure retries with whatever the authority still
    /// considers unresolved.
    #[instrument(skip(self))]
    pub async fn process_action(
        &self,
        link_id: &str,
        action_type: ActionType,
    ) -> Result<Action, Error> {
        let action = self.client.create_action(link_id, action_type).await?;
        if action.state.is_success() {
            return Ok(action);
        }

        tracing::debug!("Confirming {} action {}", action_type, action.id);

        let confirmed = self
            .client
            .process_action(link_id, &action.id, action_type)
            .await?;

        self.execute_batch(confirmed).await
    }

    /// Run an action for a wallet that is not the authenticated caller
    #[instrument(skip(self))]
    pub async fn process_action_anonymous(
        &self,
        link_id: &str,
        action_type: ActionType,
        wallet_address: &Principal,
    ) -> Result<Action, Error> {
        let action = self
            .client
            .create_action_anonymous(link_id, action_type, wallet_address)
            .await?;
        if action.state.is_success() {
            return Ok(action);
        }

        let confirmed = self
            .client
            .process_action_anonymous(link_id, &action.id, action_type, wallet_address)
            .await?;

        self.execute_batch(confirmed).await
    }

    /// Execute the batch plan carried by a confirmed action
    ///
    /// Actions without client side ledger work are returned unchanged.
    pub async fn execute_batch(&self, action: Action) -> Result<Action, Error> {
        let Some(plan) = action
            .icrc_112_requests
            .clone()
            .filter(|plan| !plan.is_empty())
        else {
            return Ok(action);
        };

        BatchExecutor::new(self, &action).execute(&plan).await
    }

    /// Caller progress on a link
    #[instrument(skip(self))]
    pub async fn link_get_user_state(
        &self,
        link_id: &str,
        action_type: ActionType,
        anonymous_wallet_address: Option<Principal>,
    ) -> Result<Option<LinkGetUserStateOutput>, Error> {
        self.client
            .link_get_user_state(LinkGetUserStateInput {
                link_id: link_id.to_string(),
                action_type,
                anonymous_wallet_address,
            })
            .await
    }

    /// Move caller progress on a link
    #[instrument(skip(self))]
    pub async fn link_update_user_state(
        &self,
        link_id: &str,
        action_type: ActionType,
        goto: UserStateGoto,
        anonymous_wallet_address: Option<Principal>,
    ) -> Result<Option<LinkGetUserStateOutput>, Error> {
        self.client
            .link_update_user_state(LinkUpdateUserStateInput {
                link_id: link_id.to_string(),
                action_type,
                goto,
                anonymous_wallet_address,
            })
            .await
    }
}
