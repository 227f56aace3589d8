//! Link types
//!
//! A link is a shareable, ledger funded object created by a user and later
//! redeemed by one or more counterparties. Links are owned by the remote link
//! authority; the client only reads them.

use serde::{Deserialize, Serialize};

use crate::account::Principal;

/// Maximum number of assets in a token basket
pub const MAX_TOKEN_BASKET_ASSETS: usize = 10;

wire_enum! {
    /// Kind of link
    pub enum LinkType {
        /// Single token tip, one use
        Tip => "SendTip",
        /// Single token split across many uses
        Airdrop => "SendAirdrop",
        /// Several tokens claimed together
        TokenBasket => "SendTokenBasket",
        /// Payment request paid by the counterparty
        ReceivePayment => "ReceivePayment",
    }
}

impl LinkType {
    /// Number of distinct assets a link of this type may carry
    pub fn max_assets(&self) -> usize {
        match self {
            LinkType::Tip | LinkType::Airdrop | LinkType::ReceivePayment => 1,
            LinkType::TokenBasket => MAX_TOKEN_BASKET_ASSETS,
        }
    }

    /// Asset label expected by the authority for an asset at `address`
    pub fn asset_label(&self, address: &str) -> String {
        match self {
            LinkType::Tip => "SEND_TIP_ASSET".to_string(),
            LinkType::Airdrop => "SEND_AIRDROP_ASSET".to_string(),
            LinkType::TokenBasket => format!("SEND_TOKEN_BASKET_ASSET_{address}"),
            LinkType::ReceivePayment => "RECEIVE_PAYMENT_ASSET".to_string(),
        }
    }
}

wire_enum! {
    /// Link lifecycle state
    pub enum LinkState {
        /// Creator is picking the link type
        ChoosingType => "Link_state_choosing_type",
        /// Creator is adding assets
        AddAssets => "Link_state_add_assets",
        /// Link exists but its CreateLink action has not succeeded
        CreateLink => "Link_state_create_link",
        /// Funded and redeemable
        Active => "Link_state_active",
        /// Paused by the creator
        Inactive => "Link_state_inactive",
        /// Use counter reached its maximum
        Exhausted => "Link_state_exhausted",
        /// Withdrawn by the creator
        Cancelled => "Link_state_cancelled",
    }
}

impl LinkState {
    /// Whether new `Use` actions are accepted
    pub fn accepts_use(&self) -> bool {
        matches!(self, LinkState::Active)
    }
}

wire_enum! {
    /// Chain an asset lives on
    pub enum Chain {
        /// Internet Computer
        Ic => "IC",
    }
}

wire_enum! {
    /// Landing page template
    pub enum Template {
        /// Centered layout
        Central => "Central",
        /// Left aligned layout
        Left => "Left",
        /// Right aligned layout
        Right => "Right",
    }
}

impl Default for Template {
    fn default() -> Self {
        Template::Central
    }
}

/// Asset carried by a link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Chain
    pub chain: Chain,
    /// Ledger canister address
    pub address: String,
    /// Authority label for the asset
    pub label: String,
    /// Amount released by every use action
    pub amount_per_link_use_action: u128,
}

/// Link as returned by the authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Link id, a UUID
    pub id: String,
    /// State
    pub state: LinkState,
    /// Title
    pub title: String,
    /// Link type
    pub link_type: LinkType,
    /// Creator
    pub creator: Principal,
    /// Assets
    pub asset_info: Vec<AssetInfo>,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Image shown on the landing page
    #[serde(default)]
    pub link_image_url: Option<String>,
    /// Landing page template
    #[serde(default)]
    pub template: Template,
    /// NFT image
    #[serde(default)]
    pub nft_image: Option<String>,
    /// Number of successful use actions
    pub link_use_action_counter: u64,
    /// Maximum number of use actions
    pub link_use_action_max_count: u64,
    /// Creation time in nanoseconds
    pub create_at: u64,
}

impl Link {
    /// Whether no use actions remain
    pub fn is_exhausted(&self) -> bool {
        self.link_use_action_counter >= self.link_use_action_max_count
    }
}

/// Input of `create_link_v2`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLinkInput {
    /// Title
    pub title: String,
    /// Assets
    pub asset_info: Vec<AssetInfo>,
    /// Link type
    pub link_type: LinkType,
    /// Description
    pub description: Option<String>,
    /// Landing page image
    pub link_image_url: Option<String>,
    /// Landing page template
    pub template: Template,
    /// Maximum number of use actions
    pub link_use_action_max_count: u64,
    /// NFT image
    pub nft_image: Option<String>,
}

/// Output of `create_link_v2`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLinkOutput {
    /// Link
    pub link: Link,
    /// Link id
    pub link_id: String,
}

wire_enum! {
    /// Per caller progress on a link
    pub enum LinkUserState {
        /// Caller still has to pick a wallet
        ChooseWallet => "User_state_choose_wallet",
        /// Caller completed the link
        CompletedLink => "User_state_completed_link",
    }
}

wire_enum! {
    /// Direction of a user state update
    pub enum UserStateGoto {
        /// Advance
        Continue => "Continue",
        /// Go back
        Back => "Back",
    }
}

/// Query for `link_get_user_state`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkGetUserStateInput {
    /// Link id
    pub link_id: String,
    /// Action type being tracked
    pub action_type: crate::action::ActionType,
    /// Wallet address for callers that are not authenticated
    pub anonymous_wallet_address: Option<Principal>,
}

/// Input for `link_update_user_state`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkUpdateUserStateInput {
    /// Link id
    pub link_id: String,
    /// Action type being tracked
    pub action_type: crate::action::ActionType,
    /// Requested move
    pub goto: UserStateGoto,
    /// Wallet address for callers that are not authenticated
    pub anonymous_wallet_address: Option<Principal>,
}

/// Caller progress on a link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkGetUserStateOutput {
    /// Action the caller is tracking
    pub action: crate::action::Action,
    /// Caller progress
    pub link_user_state: LinkUserState,
}
