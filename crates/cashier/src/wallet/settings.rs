//! Wallet settings
//!
//! Loaded from a TOML file layered over [`Settings::default`].

use std::path::PathBuf;
use std::str::FromStr;

use cashier_common::Principal;
use config::{Config, File};
use serde::{Deserialize, Serialize};

use super::validation::TokenMetadata;
use crate::Error;

/// Default inactivity window of the link authority
pub const DEFAULT_INACTIVITY_WINDOW_SECS: u64 = 120;

/// Wallet settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Caller principal
    pub owner: String,
    /// Link authority principal
    pub authority: String,
    /// Path of the draft database; in memory when unset
    #[serde(default)]
    pub draft_db_path: Option<PathBuf>,
    /// Seconds after which the authority fails an unconfirmed action
    pub inactivity_window_secs: u64,
    /// Tokens checked when validating drafts
    #[serde(default)]
    pub tokens: Vec<TokenMetadata>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            owner: String::new(),
            authority: String::new(),
            draft_db_path: None,
            inactivity_window_secs: DEFAULT_INACTIVITY_WINDOW_SECS,
            tokens: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings, overriding defaults with `config_file_name` when given
    pub fn new<P>(config_file_name: Option<P>) -> Result<Self, Error>
    where
        P: Into<PathBuf>,
    {
        let default_settings = Self::default();

        let mut builder = Config::builder().add_source(Config::try_from(&default_settings)?);
        if let Some(path) = config_file_name {
            let path: PathBuf = path.into();
            builder = builder.add_source(File::from(path));
        }

        let settings: Settings = builder.build()?.try_deserialize()?;

        Ok(settings)
    }

    /// Caller principal
    pub fn owner(&self) -> Result<Principal, Error> {
        Ok(Principal::from_str(&self.owner)?)
    }

    /// Link authority principal
    pub fn authority(&self) -> Result<Principal, Error> {
        Ok(Principal::from_str(&self.authority)?)
    }
}
