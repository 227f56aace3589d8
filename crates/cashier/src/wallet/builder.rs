use std::sync::Arc;

use cashier_common::{Account, Principal};

use super::connector::{LedgerConnector, LinkConnector};
use super::settings::Settings;
use super::validation::{LedgerBalanceValidator, TokenMetadata, ValidationService};
use super::LinkWallet;
use crate::cashier_database::DynDraftDatabase;
use crate::error::Error;

/// Builder for creating a new [`LinkWallet`]
#[derive(Debug, Default)]
pub struct LinkWalletBuilder {
    owner: Option<Principal>,
    authority: Option<Principal>,
    localstore: Option<DynDraftDatabase>,
    client: Option<Arc<dyn LinkConnector + Send + Sync>>,
    ledger: Option<Arc<dyn LedgerConnector + Send + Sync>>,
    validator: Option<Arc<dyn ValidationService + Send + Sync>>,
    tokens: Vec<TokenMetadata>,
}

impl LinkWalletBuilder {
    /// Create a new LinkWalletBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Take owner, authority and tokens from settings
    pub fn settings(mut self, settings: &Settings) -> Result<Self, Error> {
        self.owner = Some(settings.owner()?);
        self.authority = Some(settings.authority()?);
        self.tokens = settings.tokens.clone();
        Ok(self)
    }

    /// Set the caller
    pub fn owner(mut self, owner: Principal) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Set the link authority
    pub fn authority(mut self, authority: Principal) -> Self {
        self.authority = Some(authority);
        self
    }

    /// Set the local draft storage backend
    pub fn localstore(mut self, localstore: DynDraftDatabase) -> Self {
        self.localstore = Some(localstore);
        self
    }

    /// Set a custom link connector
    pub fn client<C: LinkConnector + 'static + Send + Sync>(mut self, client: C) -> Self {
        self.client = Some(Arc::new(client));
        self
    }

    /// Set a custom link connector from Arc
    pub fn shared_client(mut self, client: Arc<dyn LinkConnector + Send + Sync>) -> Self {
        self.client = Some(client);
        self
    }

    /// Set a custom ledger connector
    pub fn ledger<L: LedgerConnector + 'static + Send + Sync>(mut self, ledger: L) -> Self {
        self.ledger = Some(Arc::new(ledger));
        self
    }

    /// Set a custom ledger connector from Arc
    pub fn shared_ledger(mut self, ledger: Arc<dyn LedgerConnector + Send + Sync>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Set the validation service
    ///
    /// When unset, balances are checked on the ledger for the configured tokens.
    pub fn shared_validator(
        mut self,
        validator: Arc<dyn ValidationService + Send + Sync>,
    ) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Tokens checked by the default validator
    pub fn tokens(mut self, tokens: Vec<TokenMetadata>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Build the wallet
    pub fn build(self) -> Result<LinkWallet, Error> {
        let owner = self
            .owner
            .ok_or(Error::Custom("Owner required".to_string()))?;
        let authority = self
            .authority
            .ok_or(Error::Custom("Authority required".to_string()))?;
        let localstore = self
            .localstore
            .ok_or(Error::Custom("Localstore required".to_string()))?;
        let client = self
            .client
            .ok_or(Error::Custom("Link connector required".to_string()))?;
        let ledger = self
            .ledger
            .ok_or(Error::Custom("Ledger connector required".to_string()))?;

        let validator = match self.validator {
            Some(validator) => validator,
            None => Arc::new(LedgerBalanceValidator::new(
                ledger.clone(),
                Account::new(owner.clone()),
                self.tokens,
            )),
        };

        Ok(LinkWallet::new(
            owner, authority, localstore, client, ledger, validator,
        ))
    }
}
