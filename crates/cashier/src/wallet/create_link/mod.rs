//! Link creation wizard
//!
//! [`LinkCreation`] walks a draft through the wizard steps of [`Step`]. Every
//! transition and every draft mutation persists the [`TempLink`] record before
//! returning, so a wizard can be picked up again with
//! [`LinkWallet::resume_link_creation`] after a reload.
//!
//! # Step Flow
//!
//! ```text
//! ChoosingType ─> AddTipAsset | AddAsset ─> Preview ─> Created ─> Active
//! ```
//!
//! # Persistence
//!
//! - Every editing step: record state is the step's [`TempLinkState`]
//! - While `create_link_v2` is in flight: `CreateLink`, reverted to `Preview` on failure
//! - After the link is created: record deleted
//!
//! Each draft field can only be edited at the step that owns it, and preview
//! checks the whole draft again before anything is sent to the authority.

use std::num::NonZeroU64;

use cashier_common::draft::{TempLink, TempLinkState, TempLinkUpdate};
use cashier_common::validation::{ValidationFailure, WalletSnapshot};
use cashier_common::{Action, ActionType, Draft, DraftAsset, LinkState, LinkType};
use tracing::instrument;

pub use self::state::{Step, StepKind};
use super::validation::render_failure;
use super::LinkWallet;
use crate::Error;

pub mod state;

/// Steps where the title, description and link type can change
const TYPE_STEPS: &[StepKind] = &[StepKind::ChoosingType];

/// Steps where assets and max use can change
const ASSET_STEPS: &[StepKind] = &[StepKind::AddTipAsset, StepKind::AddAsset];

/// Link creation wizard bound to a wallet
#[derive(Debug)]
pub struct LinkCreation<'a> {
    wallet: &'a LinkWallet,
    temp_link: TempLink,
    step: Step,
}

impl<'a> LinkCreation<'a> {
    /// Start a new wizard, persisting its first record
    #[instrument(skip_all)]
    pub(crate) async fn start(wallet: &'a LinkWallet) -> Result<Self, Error> {
        let temp_link = TempLink::new(&wallet.owner);
        wallet
            .localstore
            .create(&wallet.owner, temp_link.clone())
            .await?;

        tracing::info!("Started link draft {}", temp_link.id);

        Ok(Self {
            wallet,
            temp_link,
            step: Step::ChoosingType,
        })
    }

    /// Reopen a persisted record
    #[instrument(skip(wallet))]
    pub(crate) async fn resume(wallet: &'a LinkWallet, id: &str) -> Result<Self, Error> {
        let temp_link = wallet
            .localstore
            .get_one(&wallet.owner, id)
            .await?
            .ok_or_else(|| Error::DraftNotFound(id.to_string()))?;

        let step = Step::resume(temp_link.state, temp_link.draft.link_type);

        let mut creation = Self {
            wallet,
            temp_link,
            step,
        };

        if creation.temp_link.state == TempLinkState::CreateLink {
            tracing::warn!(
                "Draft {} was left while its link was being created, reopening at preview",
                creation.temp_link.id
            );
            creation.persist().await?;
        }

        Ok(creation)
    }

    /// Draft record id
    pub fn id(&self) -> &str {
        &self.temp_link.id
    }

    /// Current step
    pub fn step(&self) -> &Step {
        &self.step
    }

    /// Current draft
    pub fn draft(&self) -> &Draft {
        &self.temp_link.draft
    }

    /// Persisted record as last written
    pub fn temp_link(&self) -> &TempLink {
        &self.temp_link
    }

    /// Set the title
    pub async fn set_title(&mut self, title: impl Into<String>) -> Result<(), Error> {
        let title = title.into();
        self.mutate("title", TYPE_STEPS, |draft| draft.title = title).await
    }

    /// Set the description
    pub async fn set_description(&mut self, description: Option<String>) -> Result<(), Error> {
        self.mutate("description", TYPE_STEPS, |draft| {
            draft.description = description
        })
        .await
    }

    /// Set the link type
    pub async fn set_link_type(&mut self, link_type: LinkType) -> Result<(), Error> {
        self.mutate("link type", TYPE_STEPS, |draft| {
            draft.link_type = link_type
        })
        .await
    }

    /// Append an asset
    pub async fn add_asset(&mut self, asset: DraftAsset) -> Result<(), Error> {
        self.mutate("assets", ASSET_STEPS, |draft| draft.assets.push(asset)).await
    }

    /// Replace the asset at `index`
    pub async fn update_asset(&mut self, index: usize, asset: DraftAsset) -> Result<(), Error> {
        if index >= self.temp_link.draft.assets.len() {
            return Err(Error::Custom(format!("No asset at index {index}")));
        }
        self.mutate("assets", ASSET_STEPS, |draft| {
            draft.assets[index] = asset
        })
        .await
    }

    /// Remove the asset at `index`
    pub async fn remove_asset(&mut self, index: usize) -> Result<DraftAsset, Error> {
        if index >= self.temp_link.draft.assets.len() {
            return Err(Error::Custom(format!("No asset at index {index}")));
        }
        let mut removed = None;
        self.mutate("assets", ASSET_STEPS, |draft| {
            removed = Some(draft.assets.remove(index))
        })
        .await?;
        removed.ok_or_else(|| Error::Custom(format!("No asset at index {index}")))
    }

    /// Set the maximum number of uses
    pub async fn set_max_use(&mut self, max_use: u64) -> Result<(), Error> {
        let max_use = NonZeroU64::new(max_use).ok_or(cashier_common::Error::ZeroMaxUse)?;
        self.mutate("max use", ASSET_STEPS, |draft| {
            draft.max_use = max_use
        })
        .await
    }

    /// Advance one step
    ///
    /// From preview this creates the link on the authority. On failure the
    /// wizard stays at preview and the error is returned.
    #[instrument(skip(self), fields(id = %self.temp_link.id))]
    pub async fn go_next(&mut self) -> Result<&Step, Error> {
        let kind = self.step.kind();
        let next = match kind {
            StepKind::ChoosingType => state::check_choosing_type(&self.temp_link.draft)?,
            StepKind::AddTipAsset | StepKind::AddAsset => {
                state::check_assets(kind, &self.temp_link.draft)?;
                self.check_balances().await?;
                Step::Preview
            }
            StepKind::Preview => {
                let draft = &self.temp_link.draft;
                state::check_choosing_type(draft)?;
                state::check_assets(Step::add_asset_for(draft.link_type).kind(), draft)?;
                return self.create_link().await;
            }
            StepKind::Created => return Err(Error::TerminalStep),
            StepKind::Active => return Err(Error::UseProcessAction),
        };

        tracing::info!("Link draft moving {} -> {}", kind, next.kind());

        self.step = next;
        self.persist().await?;

        Ok(&self.step)
    }

    /// Go back one step
    #[instrument(skip(self), fields(id = %self.temp_link.id))]
    pub async fn go_back(&mut self) -> Result<&Step, Error> {
        let previous = self.step.previous(&self.temp_link.draft)?;

        tracing::info!(
            "Link draft moving back {} -> {}",
            self.step.kind(),
            previous.kind()
        );

        self.step = previous;
        self.persist().await?;

        Ok(&self.step)
    }

    /// Fund the created link
    ///
    /// Runs the link's CreateLink action to completion. The wizard becomes
    /// [`Step::Active`] once the action succeeds; otherwise it stays at
    /// [`Step::Created`] and calling this again retries. A link the authority
    /// already reports as funded moves straight to [`Step::Active`].
    #[instrument(skip(self), fields(id = %self.temp_link.id))]
    pub async fn fund(&mut self) -> Result<Action, Error> {
        let link_id = match &self.step {
            Step::Created { link } => link.id.clone(),
            Step::Active { .. } => return Err(Error::UseProcessAction),
            _ => return Err(Error::Custom("Link has not been created".to_string())),
        };

        let link = self.wallet.get_link(&link_id).await?;
        if link.state != LinkState::CreateLink {
            if let Some(state) = self
                .wallet
                .link_get_user_state(&link_id, ActionType::CreateLink, None)
                .await?
                .filter(|state| state.action.state.is_success())
            {
                tracing::info!("Link {} already funded, now {}", link_id, link.state);
                self.step = Step::Active {
                    link: Box::new(link),
                    action: Box::new(state.action.clone()),
                };
                return Ok(state.action);
            }
        }

        let action = self
            .wallet
            .process_action(&link_id, ActionType::CreateLink)
            .await?;

        if action.state.is_success() {
            let link = self.wallet.get_link(&link_id).await?;
            tracing::info!("Link {} is {}", link_id, link.state);
            self.step = Step::Active {
                link: Box::new(link),
                action: Box::new(action.clone()),
            };
        } else {
            tracing::warn!("CreateLink action {} ended {}", action.id, action.state);
        }

        Ok(action)
    }

    async fn check_balances(&self) -> Result<(), Error> {
        if let Err(failure) = self.wallet.validator.validate(&self.temp_link.draft).await {
            let snapshot = self.snapshot().await;
            return Err(render_failure(failure, snapshot.as_ref()));
        }

        Ok(())
    }

    async fn snapshot(&self) -> Option<WalletSnapshot> {
        match self.wallet.validator.wallet_snapshot().await {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                tracing::warn!("Could not load wallet snapshot: {}", err);
                None
            }
        }
    }

    /// Authority rejections that carry a balance shortfall render like local ones
    async fn render_remote(&self, err: Error) -> Error {
        let Error::Remote(message) = err else {
            return err;
        };

        match ValidationFailure::parse(&message) {
            failure @ ValidationFailure::InsufficientBalance { .. } => {
                let snapshot = self.snapshot().await;
                render_failure(failure, snapshot.as_ref())
            }
            ValidationFailure::Other { .. } => Error::Remote(message),
        }
    }

    async fn create_link(&mut self) -> Result<&Step, Error> {
        self.write_state(TempLinkState::CreateLink).await?;

        let input = state::create_link_input(&self.temp_link.draft);
        let output = match self.wallet.client.create_link_v2(input).await {
            Ok(output) => output,
            Err(err) => {
                tracing::error!("Could not create link: {}", err);
                if let Err(revert) = self.write_state(TempLinkState::Preview).await {
                    tracing::error!(
                        "Could not revert draft {} to preview: {}",
                        self.temp_link.id,
                        revert
                    );
                }
                return Err(self.render_remote(err).await);
            }
        };

        self.wallet
            .localstore
            .delete(&self.temp_link.id, &self.wallet.owner)
            .await?;

        tracing::info!(
            "Created link {} from draft {}",
            output.link_id,
            self.temp_link.id
        );

        self.step = Step::Created {
            link: Box::new(output.link),
        };

        Ok(&self.step)
    }

    async fn mutate<F>(
        &mut self,
        field: &'static str,
        steps: &[StepKind],
        f: F,
    ) -> Result<(), Error>
    where
        F: FnOnce(&mut Draft),
    {
        if self.step.temp_link_state().is_none() {
            return Err(Error::TerminalStep);
        }
        let kind = self.step.kind();
        if !steps.contains(&kind) {
            return Err(Error::LockedField {
                field,
                step: kind.to_string(),
            });
        }

        let mut draft = self.temp_link.draft.clone();
        f(&mut draft);

        self.temp_link = self
            .wallet
            .localstore
            .update(
                &self.wallet.owner,
                &self.temp_link.id,
                TempLinkUpdate {
                    state: None,
                    draft: Some(draft),
                },
            )
            .await?;

        Ok(())
    }

    async fn persist(&mut self) -> Result<(), Error> {
        match self.step.temp_link_state() {
            Some(state) => self.write_state(state).await,
            None => Ok(()),
        }
    }

    async fn write_state(&mut self, state: TempLinkState) -> Result<(), Error> {
        self.temp_link = self
            .wallet
            .localstore
            .update(
                &self.wallet.owner,
                &self.temp_link.id,
                TempLinkUpdate {
                    state: Some(state),
                    draft: Some(self.temp_link.draft.clone()),
                },
            )
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cashier_common::ValidationFailure;

    use super::*;
    use crate::wallet::test_utils::{create_test_wallet, TestHarness};

    #[tokio::test]
    async fn every_transition_is_persisted() {
        let TestHarness { wallet, .. } = create_test_wallet().await;
        let mut creation = wallet.start_link_creation().await.unwrap();
        let id = creation.id().to_string();

        creation.set_title("coffee").await.unwrap();
        let stored = wallet.list_link_drafts().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].draft.title, "coffee");

        creation.go_next().await.unwrap();
        assert_eq!(creation.step(), &Step::AddTipAsset);

        creation
            .add_asset(DraftAsset::new("ryjl3-tyaaa-aaaaa-aaaba-cai", 1_000))
            .await
            .unwrap();
        creation.go_next().await.unwrap();

        let resumed = wallet.resume_link_creation(&id).await.unwrap();
        assert_eq!(resumed.step(), &Step::Preview);
        assert_eq!(resumed.draft().assets.len(), 1);
        assert_eq!(resumed.temp_link().state, TempLinkState::Preview);
    }

    #[tokio::test]
    async fn tip_validation_order() {
        let TestHarness { wallet, .. } = create_test_wallet().await;
        let mut creation = wallet.start_link_creation().await.unwrap();
        creation.set_title("tip").await.unwrap();
        creation.go_next().await.unwrap();

        assert!(matches!(creation.go_next().await, Err(Error::MissingAsset)));

        creation.add_asset(DraftAsset::new("", 0)).await.unwrap();
        creation.add_asset(DraftAsset::new("b", 0)).await.unwrap();
        assert!(matches!(
            creation.go_next().await,
            Err(Error::TooManyAssets { max: 1, .. })
        ));

        creation.remove_asset(1).await.unwrap();
        assert!(matches!(creation.go_next().await, Err(Error::BlankAddress)));

        creation
            .update_asset(0, DraftAsset::new("ledger", 0))
            .await
            .unwrap();
        assert!(matches!(
            creation.go_next().await,
            Err(Error::NonPositiveAmount)
        ));

        assert_eq!(creation.step(), &Step::AddTipAsset);
    }

    #[tokio::test]
    async fn insufficient_balance_is_rendered() {
        let harness = create_test_wallet().await;
        harness.validator.fail_with(ValidationFailure::insufficient_balance(
            "ryjl3-tyaaa-aaaaa-aaaba-cai",
            300_000_000,
            100_000_000,
        ));

        let mut creation = harness.wallet.start_link_creation().await.unwrap();
        creation.set_title("tip").await.unwrap();
        creation.go_next().await.unwrap();
        creation
            .add_asset(DraftAsset::new("ryjl3-tyaaa-aaaaa-aaaba-cai", 300_000_000))
            .await
            .unwrap();

        let err = creation.go_next().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Insufficient balance: 3 ICP required, 1 ICP available"
        );
    }

    #[tokio::test]
    async fn failed_create_reverts_to_preview() {
        let harness = create_test_wallet().await;
        harness.client.fail_create_link("link authority unavailable");

        let mut creation = harness.wallet.start_link_creation().await.unwrap();
        creation.set_title("tip").await.unwrap();
        creation.go_next().await.unwrap();
        creation
            .add_asset(DraftAsset::new("ryjl3-tyaaa-aaaaa-aaaba-cai", 10))
            .await
            .unwrap();
        creation.go_next().await.unwrap();

        let err = creation.go_next().await.unwrap_err();
        assert_eq!(err.to_string(), "link authority unavailable");
        assert_eq!(creation.step(), &Step::Preview);

        let stored = harness
            .wallet
            .resume_link_creation(creation.id())
            .await
            .unwrap();
        assert_eq!(stored.temp_link().state, TempLinkState::Preview);
    }

    #[tokio::test]
    async fn remote_balance_rejection_is_rendered() {
        let harness = create_test_wallet().await;
        harness.client.fail_create_link(
            "Insufficient balance for asset ryjl3-tyaaa-aaaaa-aaaba-cai: \
             required 300000000, available 100000000",
        );

        let mut creation = harness.wallet.start_link_creation().await.unwrap();
        creation.set_title("tip").await.unwrap();
        creation.go_next().await.unwrap();
        creation
            .add_asset(DraftAsset::new("ryjl3-tyaaa-aaaaa-aaaba-cai", 300_000_000))
            .await
            .unwrap();
        creation.go_next().await.unwrap();

        let err = creation.go_next().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Insufficient balance: 3 ICP required, 1 ICP available"
        );
        assert_eq!(creation.step(), &Step::Preview);
    }

    #[tokio::test]
    async fn fields_are_locked_outside_their_step() {
        let harness = create_test_wallet().await;

        let mut creation = harness.wallet.start_link_creation().await.unwrap();
        assert!(matches!(
            creation
                .add_asset(DraftAsset::new("ryjl3-tyaaa-aaaaa-aaaba-cai", 10))
                .await,
            Err(Error::LockedField { field: "assets", .. })
        ));

        creation.set_title("tip").await.unwrap();
        creation.go_next().await.unwrap();
        assert!(matches!(
            creation.set_link_type(LinkType::ReceivePayment).await,
            Err(Error::LockedField {
                field: "link type",
                ..
            })
        ));
        creation
            .add_asset(DraftAsset::new("ryjl3-tyaaa-aaaaa-aaaba-cai", 10))
            .await
            .unwrap();
        creation.go_next().await.unwrap();

        let err = creation
            .set_link_type(LinkType::ReceivePayment)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "link type cannot be changed at step preview");
        assert!(matches!(
            creation.set_max_use(5).await,
            Err(Error::LockedField { field: "max use", .. })
        ));
        assert_eq!(creation.draft().link_type, LinkType::Tip);

        creation.go_next().await.unwrap();
        let link = creation.step().link().unwrap();
        assert_eq!(link.link_type, LinkType::Tip);
        assert_eq!(link.link_use_action_max_count, 1);
    }

    #[tokio::test]
    async fn preview_rechecks_stored_draft() {
        let harness = create_test_wallet().await;
        let creation = harness.wallet.start_link_creation().await.unwrap();
        let id = creation.id().to_string();

        let mut draft = creation.draft().clone();
        draft.title = "payment".to_string();
        draft.link_type = LinkType::ReceivePayment;
        draft
            .assets
            .push(DraftAsset::new("ryjl3-tyaaa-aaaaa-aaaba-cai", 10));
        harness
            .wallet
            .localstore
            .update(
                &harness.wallet.owner,
                &id,
                TempLinkUpdate {
                    state: Some(TempLinkState::Preview),
                    draft: Some(draft),
                },
            )
            .await
            .unwrap();

        let mut resumed = harness.wallet.resume_link_creation(&id).await.unwrap();
        assert_eq!(resumed.step(), &Step::Preview);
        assert!(matches!(
            resumed.go_next().await,
            Err(Error::UnsupportedLinkType(LinkType::ReceivePayment))
        ));
        assert_eq!(resumed.step(), &Step::Preview);
        assert_eq!(harness.wallet.list_link_drafts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn created_link_deletes_draft() {
        let harness = create_test_wallet().await;

        let mut creation = harness.wallet.start_link_creation().await.unwrap();
        creation.set_title("tip").await.unwrap();
        creation.go_next().await.unwrap();
        creation
            .add_asset(DraftAsset::new("ryjl3-tyaaa-aaaaa-aaaba-cai", 10))
            .await
            .unwrap();
        creation.go_next().await.unwrap();
        creation.go_next().await.unwrap();

        assert_eq!(creation.step().kind(), StepKind::Created);
        assert!(harness.wallet.list_link_drafts().await.unwrap().is_empty());
        assert!(matches!(creation.go_next().await, Err(Error::TerminalStep)));
        assert!(matches!(creation.go_back().await, Err(Error::TerminalStep)));
        assert!(matches!(
            creation.set_title("late").await,
            Err(Error::TerminalStep)
        ));
    }

    #[tokio::test]
    async fn resume_in_flight_create_reopens_preview() {
        let harness = create_test_wallet().await;
        let creation = harness.wallet.start_link_creation().await.unwrap();
        let id = creation.id().to_string();

        harness
            .wallet
            .localstore
            .update(
                &harness.wallet.owner,
                &id,
                TempLinkUpdate {
                    state: Some(TempLinkState::CreateLink),
                    draft: None,
                },
            )
            .await
            .unwrap();

        let resumed = harness.wallet.resume_link_creation(&id).await.unwrap();
        assert_eq!(resumed.step(), &Step::Preview);
        assert_eq!(resumed.temp_link().state, TempLinkState::Preview);
    }

    #[tokio::test]
    async fn going_back_from_first_step_fails() {
        let TestHarness { wallet, .. } = create_test_wallet().await;
        let mut creation = wallet.start_link_creation().await.unwrap();

        assert!(matches!(
            creation.go_back().await,
            Err(Error::NoPreviousStep)
        ));

        creation.set_title("basket").await.unwrap();
        creation.set_link_type(LinkType::TokenBasket).await.unwrap();
        creation.go_next().await.unwrap();
        assert_eq!(creation.step(), &Step::AddAsset);

        creation.go_back().await.unwrap();
        assert_eq!(creation.step(), &Step::ChoosingType);
        assert!(matches!(
            creation.set_max_use(0).await,
            Err(Error::Common(cashier_common::Error::ZeroMaxUse))
        ));
    }
}
