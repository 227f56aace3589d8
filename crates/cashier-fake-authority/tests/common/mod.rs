#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cashier::cashier_database::DynDraftDatabase;
use cashier::link::{AssetInfo, Chain, CreateLinkInput, Template};
use cashier::wallet::{LinkConnector, LinkCreation, Settings, TokenMetadata};
use cashier::{
    Account, ActionType, DraftAsset, LinkType, LinkWallet, LinkWalletBuilder, Principal,
};
use cashier_redb::RedbDraftDatabase;
use cashier_fake_authority::ledger::FakeLedger;
use cashier_fake_authority::{FakeAuthority, ICP_LEDGER};
use tracing_subscriber::EnvFilter;

pub const AUTHORITY: &str = "be2us-64aaa-aaaaa-qaabq-cai";
pub const CREATOR: &str = "tz2ag-zx73e-aaaaa-aaaaa-cai";
pub const USER: &str = "2vxsx-fae";
pub const STRANGER: &str = "aaaaa-aa";

/// 10 ICP
pub const STARTING_BALANCE: u128 = 1_000_000_000;
/// 1 ICP
pub const TIP_AMOUNT: u128 = 100_000_000;

pub fn setup_tracing() {
    let env_filter = EnvFilter::new("debug");

    // Err when a parallel test already installed the subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .try_init();
}

pub fn principal(text: &str) -> Principal {
    Principal::from_str(text).expect("valid principal")
}

/// Wallet settings shared by every owner in a test
pub fn test_settings() -> Settings {
    Settings {
        authority: AUTHORITY.to_string(),
        tokens: vec![TokenMetadata {
            address: ICP_LEDGER.to_string(),
            symbol: "ICP".to_string(),
            decimals: 8,
        }],
        ..Default::default()
    }
}

/// Draft store named by the settings, in memory when no path is set
pub fn open_localstore(settings: &Settings) -> Result<DynDraftDatabase> {
    Ok(match &settings.draft_db_path {
        Some(path) => Arc::new(RedbDraftDatabase::new(path)?),
        None => Arc::new(cashier_redb::memory::empty()?),
    })
}

pub struct TestEnv {
    pub authority: FakeAuthority,
    pub ledger: FakeLedger,
    pub settings: Settings,
}

impl TestEnv {
    /// Authority plus an ICP ledger where creator and user hold 10 ICP each
    pub async fn new() -> Result<Self> {
        Self::with_settings(test_settings()).await
    }

    pub async fn with_settings(settings: Settings) -> Result<Self> {
        setup_tracing();

        let ledger = FakeLedger::new();
        let authority = FakeAuthority::new(settings.authority()?, ledger.clone())
            .with_inactivity_window(Duration::from_secs(settings.inactivity_window_secs));

        for owner in [CREATOR, USER] {
            ledger
                .mint(ICP_LEDGER, &Account::new(principal(owner)), STARTING_BALANCE)
                .await?;
        }

        Ok(Self {
            authority,
            ledger,
            settings,
        })
    }

    pub fn wallet(&self, owner: &str) -> Result<LinkWallet> {
        let settings = Settings {
            owner: owner.to_string(),
            ..self.settings.clone()
        };
        let owner = settings.owner()?;

        Ok(LinkWalletBuilder::new()
            .settings(&settings)?
            .localstore(open_localstore(&settings)?)
            .client(self.authority.client(owner.clone()))
            .ledger(self.ledger.connector(owner))
            .build()?)
    }

    pub async fn balance(&self, account: &Account) -> u128 {
        self.ledger.balance_of(ICP_LEDGER, account).await
    }

    /// Funded receive payment link of the creator asking `amount` ICP per payment
    pub async fn receive_payment_link(&self, amount: u128, max_use: u64) -> Result<String> {
        let output = self
            .authority
            .client(principal(CREATOR))
            .create_link_v2(CreateLinkInput {
                title: "invoice".to_string(),
                asset_info: vec![AssetInfo {
                    chain: Chain::Ic,
                    address: ICP_LEDGER.to_string(),
                    label: LinkType::ReceivePayment.asset_label(ICP_LEDGER),
                    amount_per_link_use_action: amount,
                }],
                link_type: LinkType::ReceivePayment,
                description: None,
                link_image_url: None,
                template: Template::Central,
                link_use_action_max_count: max_use,
                nft_image: None,
            })
            .await?;

        let funded = self
            .wallet(CREATOR)?
            .process_action(&output.link_id, ActionType::CreateLink)
            .await?;
        anyhow::ensure!(funded.state.is_success(), "link funded");

        Ok(output.link_id)
    }
}

/// Walk the wizard up to a created, unfunded tip link
pub async fn create_tip_link(
    wallet: &LinkWallet,
    amount: u128,
    max_use: u64,
) -> Result<(LinkCreation<'_>, String)> {
    let mut creation = wallet.start_link_creation().await?;
    creation.set_title("coffee").await?;
    creation.set_link_type(LinkType::Tip).await?;
    creation.go_next().await?;

    creation
        .add_asset(DraftAsset::new(ICP_LEDGER, amount))
        .await?;
    creation.set_max_use(max_use).await?;
    creation.go_next().await?;
    creation.go_next().await?;

    let link_id = creation
        .step()
        .link()
        .map(|link| link.id.clone())
        .context("link created")?;

    Ok((creation, link_id))
}

/// Created and funded tip link
pub async fn active_tip_link(wallet: &LinkWallet, amount: u128, max_use: u64) -> Result<String> {
    let (mut creation, link_id) = create_tip_link(wallet, amount, max_use).await?;
    let action = creation.fund().await?;
    anyhow::ensure!(action.state.is_success(), "link funded");

    Ok(link_id)
}
