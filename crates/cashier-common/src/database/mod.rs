//! Cashier Database
//!
//! Drafts are stored per owner: every operation is scoped to the owning
//! principal, and a record is addressed by `(owner, id)`.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::account::Principal;
use crate::draft::{TempLink, TempLinkUpdate};

#[cfg(feature = "test")]
pub mod test;

/// Cashier database error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database Error
    #[error(transparent)]
    Database(Box<dyn std::error::Error + Send + Sync>),
    /// Serde Error
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    /// Draft already exists
    #[error("Draft `{0}` already exists")]
    Duplicate(String),
    /// Draft not found
    #[error("Draft `{0}` not found")]
    NotFound(String),
}

/// Easy to use Dynamic Database type alias
pub type DynDraftDatabase = std::sync::Arc<dyn DraftDatabase<Err = Error> + Send + Sync>;

/// Draft store
///
/// Keyed persistence of in-progress drafts per owner. Records survive reloads
/// for as long as the backend does.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait DraftDatabase: Debug {
    /// Draft Database Error
    type Err: Into<Error> + From<Error>;

    /// Insert a new record for `owner`, failing if the id is taken
    async fn create(&self, owner: &Principal, temp_link: TempLink) -> Result<(), Self::Err>;

    /// All records of `owner`, oldest first
    async fn get(&self, owner: &Principal) -> Result<Vec<TempLink>, Self::Err>;

    /// One record of `owner`
    async fn get_one(&self, owner: &Principal, id: &str) -> Result<Option<TempLink>, Self::Err>;

    /// Apply a partial update, returning the updated record
    async fn update(
        &self,
        owner: &Principal,
        id: &str,
        update: TempLinkUpdate,
    ) -> Result<TempLink, Self::Err>;

    /// Remove a record; removing a missing record is not an error
    async fn delete(&self, id: &str, owner: &Principal) -> Result<(), Self::Err>;
}
