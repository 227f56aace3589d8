//! Link drafts
//!
//! A [`Draft`] describes a link while it is being created. It is wrapped in a
//! [`TempLink`] that is persisted locally on every wizard transition so the
//! wizard can be resumed after a reload.

use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

use crate::account::Principal;
use crate::link::LinkType;
use crate::util::unix_time_nanos;

/// Asset requested by a draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftAsset {
    /// Ledger canister address
    pub address: String,
    /// Amount released per use, in base units
    pub use_amount: u128,
}

impl DraftAsset {
    /// Create new [`DraftAsset`]
    pub fn new(address: impl Into<String>, use_amount: u128) -> Self {
        Self {
            address: address.into(),
            use_amount,
        }
    }
}

/// Link being created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    /// Title
    pub title: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Link type
    pub link_type: LinkType,
    /// Assets in the order the user added them
    pub assets: Vec<DraftAsset>,
    /// Maximum number of uses
    pub max_use: NonZeroU64,
}

impl Default for Draft {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: None,
            link_type: LinkType::Tip,
            assets: Vec::new(),
            max_use: NonZeroU64::MIN,
        }
    }
}

wire_enum! {
    /// Wizard step recorded with a [`TempLink`]
    pub enum TempLinkState {
        /// Choosing title and type
        ChoosingType => "ChoosingType",
        /// Adding assets
        AddingAsset => "AddingAsset",
        /// Reviewing the link
        Preview => "Preview",
        /// Link creation sent to the authority
        CreateLink => "CreateLink",
    }
}

/// Locally persisted draft record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempLink {
    /// Owner prefixed, time suffixed id
    pub id: String,
    /// Creation time in nanoseconds
    pub created_at_nanos: u64,
    /// Wizard step
    pub state: TempLinkState,
    /// Draft
    pub draft: Draft,
}

impl TempLink {
    /// Start a new record for `owner` at the first wizard step
    pub fn new(owner: &Principal) -> Self {
        let created_at_nanos = unix_time_nanos();
        Self {
            id: format!("{owner}_{created_at_nanos}"),
            created_at_nanos,
            state: TempLinkState::ChoosingType,
            draft: Draft::default(),
        }
    }

    /// Apply a partial update
    pub fn apply(&mut self, update: TempLinkUpdate) {
        if let Some(state) = update.state {
            self.state = state;
        }
        if let Some(draft) = update.draft {
            self.draft = draft;
        }
    }
}

/// Partial update of a [`TempLink`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempLinkUpdate {
    /// New wizard step
    pub state: Option<TempLinkState>,
    /// New draft
    pub draft: Option<Draft>,
}
