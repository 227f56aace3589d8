#![cfg(test)]
#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cashier_common::batch::{ApproveArg, Method, Request, TransferArg};
use cashier_common::link::{
    CreateLinkInput, CreateLinkOutput, LinkGetUserStateInput, LinkGetUserStateOutput,
    LinkUpdateUserStateInput,
};
use cashier_common::validation::{TokenInfo, ValidationFailure, WalletSnapshot};
use cashier_common::{
    Account, Action, ActionState, ActionType, Draft, Intent, IntentState, Link, LinkState,
    Principal, Protocol, Transaction, TransactionState,
};
use uuid::Uuid;

use super::connector::{BlockIndex, LedgerConnector, LinkConnector};
use super::validation::ValidationService;
use super::LinkWallet;
use crate::Error;

pub const OWNER: &str = "tz2ag-zx73e-aaaaa-aaaaa-cai";
pub const AUTHORITY: &str = "be2us-64aaa-aaaaa-qaabq-cai";
pub const LEDGER: &str = "ryjl3-tyaaa-aaaaa-aaaba-cai";
pub const LINK_ID: &str = "5f0c3a7e-8d2b-4c1a-9e6f-0a1b2c3d4e5f";

pub fn principal(text: &str) -> Principal {
    Principal::from_str(text).unwrap()
}

/// Create a test CreateLink style action: a fee approval and an asset transfer
pub fn test_action(action_type: ActionType) -> Action {
    let owner = Account::new(principal(OWNER));

    let fee = Transaction {
        id: Uuid::new_v4(),
        state: TransactionState::Created,
        protocol: Protocol::Icrc2Approve,
        asset: LEDGER.to_string(),
        from: owner.clone(),
        to: Account::new(principal(AUTHORITY)),
        amount: 20_000,
        dependency: vec![],
        group: 1,
        created_at: 0,
    };
    let asset = Transaction {
        id: Uuid::new_v4(),
        state: TransactionState::Created,
        protocol: Protocol::Icrc1Transfer,
        asset: LEDGER.to_string(),
        from: owner,
        to: Account::link_vault(&principal(AUTHORITY), LINK_ID).unwrap(),
        amount: 1_000_000,
        dependency: vec![],
        group: 1,
        created_at: 0,
    };

    Action {
        id: "a1".to_string(),
        link_id: LINK_ID.to_string(),
        action_type,
        state: ActionState::Created,
        creator: principal(OWNER),
        intents: vec![
            Intent {
                id: Uuid::new_v4(),
                state: IntentState::Created,
                task: "transfer_wallet_to_treasury".to_string(),
                transactions: vec![fee],
            },
            Intent {
                id: Uuid::new_v4(),
                state: IntentState::Created,
                task: "transfer_wallet_to_link".to_string(),
                transactions: vec![asset],
            },
        ],
        icrc_112_requests: None,
    }
}

pub fn transfer_request(tx: &Transaction) -> Request {
    let arg = TransferArg {
        from_subaccount: None,
        to: tx.to.clone(),
        amount: tx.amount,
        fee: None,
        memo: None,
        created_at_time: None,
    };
    Request::new(Method::Icrc1Transfer, &tx.asset, Some(tx.id.to_string()), &arg).unwrap()
}

pub fn approve_request(tx: &Transaction) -> Request {
    let arg = ApproveArg {
        from_subaccount: None,
        spender: tx.to.clone(),
        amount: tx.amount,
        expected_allowance: None,
        expires_at: None,
        fee: None,
        memo: None,
        created_at_time: None,
    };
    Request::new(Method::Icrc2Approve, &tx.asset, Some(tx.id.to_string()), &arg).unwrap()
}

fn test_link(state: LinkState) -> Link {
    Link {
        id: LINK_ID.to_string(),
        state,
        title: "test".to_string(),
        link_type: cashier_common::LinkType::Tip,
        creator: principal(OWNER),
        asset_info: vec![],
        description: None,
        link_image_url: None,
        template: Default::default(),
        nft_image: None,
        link_use_action_counter: 0,
        link_use_action_max_count: 1,
        create_at: 0,
    }
}

/// Link authority returning canned responses and recording finalize calls
#[derive(Debug, Default)]
pub struct MockLinkConnector {
    create_link_error: Mutex<Option<String>>,
    confirmed: Mutex<Option<Action>>,
    calls: Mutex<Vec<String>>,
}

impl MockLinkConnector {
    pub fn fail_create_link(&self, message: &str) {
        *self.create_link_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn set_confirmed_action(&self, action: Action) {
        *self.confirmed.lock().unwrap() = Some(action);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn confirmed(&self, action_type: ActionType) -> Action {
        self.confirmed
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| test_action(action_type))
    }
}

#[async_trait]
impl LinkConnector for MockLinkConnector {
    async fn create_link_v2(&self, input: CreateLinkInput) -> Result<CreateLinkOutput, Error> {
        if let Some(message) = self.create_link_error.lock().unwrap().clone() {
            return Err(Error::Remote(message));
        }

        let mut link = test_link(LinkState::CreateLink);
        link.title = input.title;
        link.link_type = input.link_type;
        link.asset_info = input.asset_info;
        link.link_use_action_max_count = input.link_use_action_max_count;

        Ok(CreateLinkOutput {
            link,
            link_id: LINK_ID.to_string(),
        })
    }

    async fn get_link(&self, _link_id: &str) -> Result<Link, Error> {
        Ok(test_link(LinkState::Active))
    }

    async fn create_action(
        &self,
        _link_id: &str,
        action_type: ActionType,
    ) -> Result<Action, Error> {
        Ok(test_action(action_type))
    }

    async fn create_action_anonymous(
        &self,
        _link_id: &str,
        action_type: ActionType,
        _wallet_address: &Principal,
    ) -> Result<Action, Error> {
        Ok(test_action(action_type))
    }

    async fn process_action(
        &self,
        _link_id: &str,
        _action_id: &str,
        action_type: ActionType,
    ) -> Result<Action, Error> {
        Ok(self.confirmed(action_type))
    }

    async fn process_action_anonymous(
        &self,
        _link_id: &str,
        _action_id: &str,
        action_type: ActionType,
        _wallet_address: &Principal,
    ) -> Result<Action, Error> {
        Ok(self.confirmed(action_type))
    }

    async fn update_action(
        &self,
        action_id: &str,
        _link_id: &str,
        external: bool,
    ) -> Result<Action, Error> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("update_action {action_id} {external}"));
        let mut action = self.confirmed(ActionType::CreateLink);
        action.state = ActionState::Processing;
        Ok(action)
    }

    async fn trigger_transaction(
        &self,
        action_id: &str,
        _link_id: &str,
        transaction_id: &str,
    ) -> Result<Action, Error> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("trigger_transaction {action_id} {transaction_id}"));
        let mut action = self.confirmed(ActionType::CreateLink);
        action.state = ActionState::Success;
        action.icrc_112_requests = None;
        Ok(action)
    }

    async fn link_get_user_state(
        &self,
        _input: LinkGetUserStateInput,
    ) -> Result<Option<LinkGetUserStateOutput>, Error> {
        Ok(None)
    }

    async fn link_update_user_state(
        &self,
        _input: LinkUpdateUserStateInput,
    ) -> Result<Option<LinkGetUserStateOutput>, Error> {
        Ok(None)
    }
}

/// Ledger recording every call
#[derive(Debug, Default)]
pub struct MockLedger {
    transfers: Mutex<Vec<(String, TransferArg)>>,
    approvals: Mutex<Vec<(String, ApproveArg)>>,
    transfer_error: Mutex<Option<String>>,
}

impl MockLedger {
    pub fn fail_transfers(&self, message: &str) {
        *self.transfer_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn transfers(&self) -> Vec<(String, TransferArg)> {
        self.transfers.lock().unwrap().clone()
    }

    pub fn approvals(&self) -> Vec<(String, ApproveArg)> {
        self.approvals.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerConnector for MockLedger {
    async fn icrc1_transfer(&self, ledger: &str, arg: TransferArg) -> Result<BlockIndex, Error> {
        if let Some(message) = self.transfer_error.lock().unwrap().clone() {
            return Err(Error::Remote(message));
        }
        let mut transfers = self.transfers.lock().unwrap();
        transfers.push((ledger.to_string(), arg));
        Ok(transfers.len() as BlockIndex)
    }

    async fn icrc2_approve(&self, ledger: &str, arg: ApproveArg) -> Result<BlockIndex, Error> {
        let mut approvals = self.approvals.lock().unwrap();
        approvals.push((ledger.to_string(), arg));
        Ok(approvals.len() as BlockIndex)
    }

    async fn icrc1_balance_of(&self, _ledger: &str, _account: &Account) -> Result<u128, Error> {
        Ok(100_000_000)
    }

    async fn icrc1_fee(&self, _ledger: &str) -> Result<u128, Error> {
        Ok(10_000)
    }
}

/// Validator with a configurable outcome and a single ICP token
#[derive(Debug, Default)]
pub struct MockValidator {
    failure: Mutex<Option<ValidationFailure>>,
}

impl MockValidator {
    pub fn fail_with(&self, failure: ValidationFailure) {
        *self.failure.lock().unwrap() = Some(failure);
    }
}

#[async_trait]
impl ValidationService for MockValidator {
    async fn validate(&self, _draft: &Draft) -> Result<(), ValidationFailure> {
        match self.failure.lock().unwrap().clone() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    async fn wallet_snapshot(&self) -> Result<WalletSnapshot, Error> {
        Ok(WalletSnapshot::new(vec![TokenInfo {
            address: LEDGER.to_string(),
            symbol: "ICP".to_string(),
            decimals: 8,
            balance: 100_000_000,
        }]))
    }
}

pub struct TestHarness {
    pub wallet: LinkWallet,
    pub client: Arc<MockLinkConnector>,
    pub ledger: Arc<MockLedger>,
    pub validator: Arc<MockValidator>,
}

/// Create a wallet over an in-memory draft store and mock remotes
pub async fn create_test_wallet() -> TestHarness {
    let localstore = Arc::new(cashier_redb::memory::empty().unwrap());
    let client = Arc::new(MockLinkConnector::default());
    let ledger = Arc::new(MockLedger::default());
    let validator = Arc::new(MockValidator::default());

    let wallet = LinkWallet::new(
        principal(OWNER),
        principal(AUTHORITY),
        localstore,
        client.clone(),
        ledger.clone(),
        validator.clone(),
    );

    TestHarness {
        wallet,
        client,
        ledger,
        validator,
    }
}
