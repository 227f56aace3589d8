//! Wizard steps
//!
//! [`Step`] is a closed set: adding a step forces every transition below to
//! handle it. The checks here are pure; persistence and remote calls live in
//! [`super::LinkCreation`].

use std::fmt;

use cashier_common::draft::TempLinkState;
use cashier_common::link::{AssetInfo, Chain, CreateLinkInput, Template};
use cashier_common::{Action, Draft, Link, LinkType};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Step of the link creation wizard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Choosing title and link type
    ChoosingType,
    /// Adding the single asset of a tip
    AddTipAsset,
    /// Adding assets for any other link type
    AddAsset,
    /// Reviewing before the link is created
    Preview,
    /// Link exists on the authority, not yet funded
    Created {
        /// Created link
        link: Box<Link>,
    },
    /// Link funded
    Active {
        /// Funded link
        link: Box<Link>,
        /// Successful CreateLink action
        action: Box<Action>,
    },
}

/// Discriminant of [`Step`]
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    /// [`Step::ChoosingType`]
    ChoosingType,
    /// [`Step::AddTipAsset`]
    AddTipAsset,
    /// [`Step::AddAsset`]
    AddAsset,
    /// [`Step::Preview`]
    Preview,
    /// [`Step::Created`]
    Created,
    /// [`Step::Active`]
    Active,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepKind::ChoosingType => "choosing_type",
            StepKind::AddTipAsset => "add_tip_asset",
            StepKind::AddAsset => "add_asset",
            StepKind::Preview => "preview",
            StepKind::Created => "created",
            StepKind::Active => "active",
        };
        f.write_str(name)
    }
}

impl Step {
    /// Discriminant
    pub fn kind(&self) -> StepKind {
        match self {
            Step::ChoosingType => StepKind::ChoosingType,
            Step::AddTipAsset => StepKind::AddTipAsset,
            Step::AddAsset => StepKind::AddAsset,
            Step::Preview => StepKind::Preview,
            Step::Created { .. } => StepKind::Created,
            Step::Active { .. } => StepKind::Active,
        }
    }

    /// Asset step matching `link_type`
    pub fn add_asset_for(link_type: LinkType) -> Self {
        match link_type {
            LinkType::Tip => Step::AddTipAsset,
            _ => Step::AddAsset,
        }
    }

    /// Step a persisted record reopens at
    ///
    /// A record left in `CreateLink` did not see the authority's answer and
    /// reopens at preview.
    pub fn resume(state: TempLinkState, link_type: LinkType) -> Self {
        match state {
            TempLinkState::ChoosingType => Step::ChoosingType,
            TempLinkState::AddingAsset => Step::add_asset_for(link_type),
            TempLinkState::Preview | TempLinkState::CreateLink => Step::Preview,
        }
    }

    /// State recorded in the draft store, `None` once the link exists
    pub fn temp_link_state(&self) -> Option<TempLinkState> {
        match self {
            Step::ChoosingType => Some(TempLinkState::ChoosingType),
            Step::AddTipAsset | Step::AddAsset => Some(TempLinkState::AddingAsset),
            Step::Preview => Some(TempLinkState::Preview),
            Step::Created { .. } | Step::Active { .. } => None,
        }
    }

    /// Link once created
    pub fn link(&self) -> Option<&Link> {
        match self {
            Step::Created { link } | Step::Active { link, .. } => Some(link.as_ref()),
            _ => None,
        }
    }

    /// Step reached by going back
    pub fn previous(&self, draft: &Draft) -> Result<Step, Error> {
        match self {
            Step::ChoosingType => Err(Error::NoPreviousStep),
            Step::AddTipAsset | Step::AddAsset => Ok(Step::ChoosingType),
            Step::Preview => Ok(Step::add_asset_for(draft.link_type)),
            Step::Created { .. } | Step::Active { .. } => Err(Error::TerminalStep),
        }
    }
}

/// Leave the type step: title set and a creatable link type
pub fn check_choosing_type(draft: &Draft) -> Result<Step, Error> {
    if draft.title.trim().is_empty() {
        return Err(Error::EmptyTitle);
    }

    match draft.link_type {
        LinkType::Tip | LinkType::Airdrop | LinkType::TokenBasket => {
            Ok(Step::add_asset_for(draft.link_type))
        }
        LinkType::ReceivePayment => Err(Error::UnsupportedLinkType(draft.link_type)),
    }
}

/// Shape checks of an asset step, first failure wins
///
/// Missing asset, too many assets, blank address, zero amount. Balances are
/// checked afterwards by the validation service.
pub fn check_assets(step: StepKind, draft: &Draft) -> Result<(), Error> {
    if draft.assets.is_empty() {
        return Err(Error::MissingAsset);
    }

    let max = match step {
        StepKind::AddTipAsset => 1,
        _ => draft.link_type.max_assets(),
    };
    if draft.assets.len() > max {
        return Err(Error::TooManyAssets {
            link_type: draft.link_type,
            max,
        });
    }

    if draft
        .assets
        .iter()
        .any(|asset| asset.address.trim().is_empty())
    {
        return Err(Error::BlankAddress);
    }

    if draft.assets.iter().any(|asset| asset.use_amount == 0) {
        return Err(Error::NonPositiveAmount);
    }

    Ok(())
}

/// `create_link_v2` input for a draft
pub fn create_link_input(draft: &Draft) -> CreateLinkInput {
    let asset_info = draft
        .assets
        .iter()
        .map(|asset| AssetInfo {
            chain: Chain::Ic,
            address: asset.address.clone(),
            label: draft.link_type.asset_label(&asset.address),
            amount_per_link_use_action: asset.use_amount,
        })
        .collect();

    CreateLinkInput {
        title: draft.title.clone(),
        asset_info,
        link_type: draft.link_type,
        description: draft.description.clone(),
        link_image_url: None,
        template: Template::default(),
        link_use_action_max_count: draft.max_use.get(),
        nft_image: None,
    }
}
