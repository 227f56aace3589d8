//! Cashier Fake Link Authority
//!
//! Used for testing where a wallet needs a link authority and funded ledgers
//! without a network. Links, actions and user progress live in memory behind
//! one lock, so concurrent callers observe the same serialization a single
//! canister would give them.

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cashier::wallet::settings::DEFAULT_INACTIVITY_WINDOW_SECS;
use cashier::wallet::LinkConnector;
use cashier_common::batch::{ApproveArg, Method, Request, TransferArg, TriggerTransactionArg};
use cashier_common::link::{
    CreateLinkInput, CreateLinkOutput, LinkGetUserStateInput, LinkGetUserStateOutput,
    LinkUpdateUserStateInput,
};
use cashier_common::util::unix_time;
use cashier_common::{
    Account, Action, ActionState, ActionType, BatchPlan, Intent, IntentState, Link, LinkState,
    LinkType, LinkUserState, Principal, Protocol, Transaction, TransactionState, UserStateGoto,
    ValidationFailure,
};
use error::Error;
use ledger::Operation;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::instrument;
use uuid::Uuid;

pub mod error;
pub mod ledger;

pub use ledger::{FakeLedger, FakeLedgerConnector};

/// ICP ledger canister id, where link creation fees are charged by default
pub const ICP_LEDGER: &str = "ryjl3-tyaaa-aaaaa-aaaba-cai";

/// Default fee for creating a link, in ICP base units
pub const DEFAULT_CREATE_LINK_FEE: u128 = 10_000;

/// Default time an action may stay unresolved before it fails
pub const DEFAULT_INACTIVITY_WINDOW: Duration =
    Duration::from_secs(DEFAULT_INACTIVITY_WINDOW_SECS);

/// In-flight actions are unique per link, action type and caller
type ActionKey = (String, ActionType, Principal);

#[derive(Debug)]
struct ActionRecord {
    action: Action,
    deadline: Instant,
    nonce: Option<String>,
    external: bool,
}

#[derive(Debug, Default)]
struct AuthorityState {
    links: HashMap<String, Link>,
    actions: HashMap<String, ActionRecord>,
    in_flight: HashMap<ActionKey, String>,
    user_states: HashMap<ActionKey, LinkUserState>,
}

/// In-memory link authority
#[derive(Debug, Clone)]
pub struct FakeAuthority {
    principal: Principal,
    treasury: Account,
    fee_ledger: String,
    create_link_fee: u128,
    inactivity_window: Duration,
    ledger: FakeLedger,
    state: Arc<Mutex<AuthorityState>>,
}

impl FakeAuthority {
    /// Create new [`FakeAuthority`] settling against `ledger`
    pub fn new(principal: Principal, ledger: FakeLedger) -> Self {
        Self {
            treasury: Account::new(principal.clone()),
            principal,
            fee_ledger: ICP_LEDGER.to_string(),
            create_link_fee: DEFAULT_CREATE_LINK_FEE,
            inactivity_window: DEFAULT_INACTIVITY_WINDOW,
            ledger,
            state: Arc::new(Mutex::new(AuthorityState::default())),
        }
    }

    /// Set the inactivity window
    pub fn with_inactivity_window(mut self, window: Duration) -> Self {
        self.inactivity_window = window;
        self
    }

    /// Set the link creation fee
    pub fn with_create_link_fee(mut self, fee: u128) -> Self {
        self.create_link_fee = fee;
        self
    }

    /// Set the ledger link creation fees are charged on
    pub fn with_fee_ledger(mut self, ledger: &str) -> Self {
        self.fee_ledger = ledger.to_string();
        self
    }

    /// Authority principal, owner of every link vault
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Account collecting link creation fees
    pub fn treasury(&self) -> &Account {
        &self.treasury
    }

    /// Ledgers the authority settles against
    pub fn ledger(&self) -> &FakeLedger {
        &self.ledger
    }

    /// Inactivity window
    pub fn inactivity_window(&self) -> Duration {
        self.inactivity_window
    }

    /// [`LinkConnector`] acting on behalf of `caller`
    pub fn client(&self, caller: Principal) -> FakeLinkClient {
        FakeLinkClient {
            authority: self.clone(),
            caller,
        }
    }

    /// Vault account of a link
    pub fn link_vault(&self, link_id: &str) -> Result<Account, Error> {
        Ok(Account::link_vault(&self.principal, link_id)?)
    }

    /// Get a link
    pub async fn link(&self, link_id: &str) -> Result<Link, Error> {
        let state = self.state.lock().await;
        state
            .links
            .get(link_id)
            .cloned()
            .ok_or(Error::LinkNotFound(link_id.to_string()))
    }

    /// Get an action, resolving it first when its inactivity window elapsed
    pub async fn action(&self, action_id: &str) -> Result<Action, Error> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let record = state
            .actions
            .get_mut(action_id)
            .ok_or(Error::ActionNotFound(action_id.to_string()))?;
        let link = state
            .links
            .get_mut(&record.action.link_id)
            .ok_or(Error::LinkNotFound(record.action.link_id.clone()))?;

        self.expire(record, link).await?;

        Ok(record.action.clone())
    }

    /// Create a link in `CreateLink` state together with its CreateLink action
    ///
    /// The caller must hold every asset's amount for every use.
    #[instrument(skip(self, input), fields(link_type = %input.link_type))]
    pub async fn create_link(
        &self,
        caller: &Principal,
        input: CreateLinkInput,
    ) -> Result<CreateLinkOutput, Error> {
        check_link_input(&input)?;
        self.check_creator_balance(caller, &input).await?;

        let link = Link {
            id: Uuid::new_v4().to_string(),
            state: LinkState::CreateLink,
            title: input.title,
            link_type: input.link_type,
            creator: caller.clone(),
            asset_info: input.asset_info,
            description: input.description,
            link_image_url: input.link_image_url,
            template: input.template,
            nft_image: input.nft_image,
            link_use_action_counter: 0,
            link_use_action_max_count: input.link_use_action_max_count,
            create_at: unix_time(),
        };

        let mut state = self.state.lock().await;
        let action = self.new_action(&link, ActionType::CreateLink, caller).await?;
        tracing::info!("Created link {} with action {}", link.id, action.action.id);

        state.in_flight.insert(
            (link.id.clone(), ActionType::CreateLink, caller.clone()),
            action.action.id.clone(),
        );
        state.actions.insert(action.action.id.clone(), action);
        state.links.insert(link.id.clone(), link.clone());

        Ok(CreateLinkOutput {
            link_id: link.id.clone(),
            link,
        })
    }

    /// Create an action, or return the one in flight for the same link, type
    /// and caller
    #[instrument(skip(self))]
    pub async fn create_action(
        &self,
        caller: &Principal,
        link_id: &str,
        action_type: ActionType,
        anonymous: bool,
    ) -> Result<Action, Error> {
        if anonymous && !matches!(action_type, ActionType::Use | ActionType::Claim) {
            return Err(Error::AnonymousNotAllowed(action_type));
        }

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let link = state
            .links
            .get_mut(link_id)
            .ok_or(Error::LinkNotFound(link_id.to_string()))?;
        let key = (link_id.to_string(), action_type, caller.clone());

        if let Some(record) = state
            .in_flight
            .get(&key)
            .and_then(|id| state.actions.get_mut(id))
        {
            self.expire(record, link).await?;
            if record.action.state.is_success() {
                return Err(Error::AlreadySuccess);
            }

            tracing::debug!("Returning in-flight action {}", record.action.id);
            return Ok(record.action.clone());
        }

        check_action_allowed(link, action_type, caller)?;

        let record = self.new_action(link, action_type, caller).await?;
        let action = record.action.clone();
        tracing::info!(
            "Created {} action {} on link {}",
            action_type,
            action.id,
            link_id
        );

        state.in_flight.insert(key.clone(), action.id.clone());
        state.actions.insert(action.id.clone(), record);
        state
            .user_states
            .entry(key)
            .or_insert(LinkUserState::ChooseWallet);

        Ok(action)
    }

    /// Confirm an action
    ///
    /// Transfers the authority makes itself are executed immediately. When the
    /// caller still has ledger work, the returned action carries the batch plan
    /// and a fresh finalize token; earlier tokens stop being accepted.
    #[instrument(skip(self))]
    pub async fn process_action(
        &self,
        caller: &Principal,
        link_id: &str,
        action_id: &str,
        action_type: ActionType,
    ) -> Result<Action, Error> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let record = find_action(&mut state.actions, caller, action_id, link_id)?;
        if record.action.action_type != action_type {
            return Err(Error::ActionTypeMismatch(record.action.action_type));
        }
        let link = state
            .links
            .get_mut(link_id)
            .ok_or(Error::LinkNotFound(link_id.to_string()))?;

        self.expire(record, link).await?;
        if record.action.state.is_success() {
            return Err(Error::AlreadySuccess);
        }
        if action_type != ActionType::CreateLink {
            check_action_allowed(link, action_type, caller)?;
        }

        for tx in unresolved_mut(&mut record.action) {
            tx.state = TransactionState::Processing;
        }
        record.deadline = Instant::now() + self.inactivity_window;
        record.nonce = None;
        record.action.icrc_112_requests = None;

        for tx in unresolved_mut(&mut record.action) {
            if tx.from.owner != self.principal {
                continue;
            }

            tx.state = match self.pay_out(tx).await {
                Ok(()) => TransactionState::Success,
                Err(err) => {
                    tracing::warn!("Transfer {} from link vault failed: {}", tx.id, err);
                    TransactionState::Fail
                }
            };
        }

        conclude(&mut record.action, link);

        if record.action.state == ActionState::Processing {
            let nonce = Uuid::new_v4().to_string();
            let plan = self.plan(&record.action, &nonce).await?;
            tracing::debug!(
                "Action {} confirmed with a {} row plan",
                record.action.id,
                plan.len()
            );
            record.nonce = Some(nonce);
            record.action.icrc_112_requests = Some(plan);
        }

        Ok(record.action.clone())
    }

    /// Record that off-chain steps of an action completed
    #[instrument(skip(self))]
    pub async fn update_action(
        &self,
        caller: &Principal,
        action_id: &str,
        link_id: &str,
        external: bool,
    ) -> Result<Action, Error> {
        let mut state = self.state.lock().await;
        let record = find_action(&mut state.actions, caller, action_id, link_id)?;
        record.external = external;

        Ok(record.action.clone())
    }

    /// Verify the caller's ledger work and move the action to its final state
    ///
    /// Transactions the ledger has no trace of stay processing; once the
    /// inactivity window passes they fail.
    #[instrument(skip(self))]
    pub async fn trigger_transaction(
        &self,
        caller: &Principal,
        action_id: &str,
        link_id: &str,
        nonce: &str,
    ) -> Result<Action, Error> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let record = find_action(&mut state.actions, caller, action_id, link_id)?;
        let link = state
            .links
            .get_mut(link_id)
            .ok_or(Error::LinkNotFound(link_id.to_string()))?;

        self.expire(record, link).await?;
        if record.action.state.is_success() {
            return Ok(record.action.clone());
        }
        if record.nonce.as_deref() != Some(nonce) {
            return Err(Error::InvalidNonce(nonce.to_string()));
        }
        if !record.external {
            tracing::debug!("Action {} triggered before update_action", action_id);
        }

        for tx in unresolved_mut(&mut record.action) {
            if self.settle(tx).await? {
                tx.state = TransactionState::Success;
            }
        }

        conclude(&mut record.action, link);

        if record.action.state.is_success() {
            tracing::info!("Action {} succeeded", action_id);
            record.nonce = None;
            record.action.icrc_112_requests = None;
        }

        Ok(record.action.clone())
    }

    /// Caller progress on a link, `None` when the caller has no action on it
    pub async fn user_state(
        &self,
        caller: &Principal,
        link_id: &str,
        action_type: ActionType,
    ) -> Result<Option<LinkGetUserStateOutput>, Error> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let key = (link_id.to_string(), action_type, caller.clone());

        let Some(record) = state
            .in_flight
            .get(&key)
            .and_then(|id| state.actions.get_mut(id))
        else {
            return Ok(None);
        };
        let link = state
            .links
            .get_mut(link_id)
            .ok_or(Error::LinkNotFound(link_id.to_string()))?;
        self.expire(record, link).await?;

        Ok(Some(LinkGetUserStateOutput {
            action: record.action.clone(),
            link_user_state: state
                .user_states
                .get(&key)
                .copied()
                .unwrap_or(LinkUserState::ChooseWallet),
        }))
    }

    /// Move caller progress on a link
    ///
    /// `Continue` reaches `completed_link` only once the action succeeded.
    pub async fn update_user_state(
        &self,
        caller: &Principal,
        link_id: &str,
        action_type: ActionType,
        goto: UserStateGoto,
    ) -> Result<Option<LinkGetUserStateOutput>, Error> {
        let Some(current) = self.user_state(caller, link_id, action_type).await? else {
            return Err(Error::InvalidUserState(format!(
                "on link {link_id} without a {action_type} action"
            )));
        };

        let next = match (current.link_user_state, goto) {
            (LinkUserState::ChooseWallet, UserStateGoto::Continue) => {
                if !current.action.state.is_success() {
                    return Err(Error::InvalidUserState(format!(
                        "to {} while the action is {}",
                        LinkUserState::CompletedLink,
                        current.action.state
                    )));
                }
                LinkUserState::CompletedLink
            }
            (LinkUserState::CompletedLink, UserStateGoto::Back) => LinkUserState::ChooseWallet,
            (from, goto) => {
                return Err(Error::InvalidUserState(format!("{goto} from {from}")));
            }
        };

        self.state.lock().await.user_states.insert(
            (link_id.to_string(), action_type, caller.clone()),
            next,
        );

        Ok(Some(LinkGetUserStateOutput {
            action: current.action,
            link_user_state: next,
        }))
    }

    async fn check_creator_balance(
        &self,
        caller: &Principal,
        input: &CreateLinkInput,
    ) -> Result<(), Error> {
        if input.link_type == LinkType::ReceivePayment {
            return Ok(());
        }

        let wallet = Account::new(caller.clone());
        let max_count = u128::from(input.link_use_action_max_count);
        for asset in &input.asset_info {
            let required = asset
                .amount_per_link_use_action
                .checked_mul(max_count)
                .ok_or(Error::AmountOverflow)?;
            let available = self.ledger.balance_of(&asset.address, &wallet).await;
            if available < required {
                tracing::warn!("Rejecting link of {}: {} short", caller, required - available);
                return Err(Error::BalanceCheck(ValidationFailure::insufficient_balance(
                    &asset.address,
                    required,
                    available,
                )));
            }
        }

        Ok(())
    }

    async fn new_action(
        &self,
        link: &Link,
        action_type: ActionType,
        caller: &Principal,
    ) -> Result<ActionRecord, Error> {
        let intents = match action_type {
            ActionType::CreateLink => self.create_link_intents(link, caller).await?,
            ActionType::Use | ActionType::Claim if link.link_type == LinkType::ReceivePayment => {
                self.payment_intents(link, caller)?
            }
            ActionType::Use | ActionType::Claim => self.use_intents(link, caller)?,
            ActionType::Withdraw => self.withdraw_intents(link, caller).await?,
        };

        Ok(ActionRecord {
            action: Action {
                id: Uuid::new_v4().to_string(),
                link_id: link.id.clone(),
                action_type,
                state: ActionState::Created,
                creator: caller.clone(),
                intents,
                icrc_112_requests: None,
            },
            deadline: Instant::now() + self.inactivity_window,
            nonce: None,
            external: false,
        })
    }

    /// Fee approval first, then one vault deposit per asset covering every use
    /// and the fee of every payout. Receive payment links start empty.
    async fn create_link_intents(
        &self,
        link: &Link,
        caller: &Principal,
    ) -> Result<Vec<Intent>, Error> {
        let wallet = Account::new(caller.clone());
        let vault = self.link_vault(&link.id)?;
        let max_count = u128::from(link.link_use_action_max_count);

        let fee_amount = self
            .create_link_fee
            .checked_add(self.ledger.fee(&self.fee_ledger).await)
            .ok_or(Error::AmountOverflow)?;
        let mut intents = vec![new_intent(
            "transfer_wallet_to_treasury",
            vec![new_transaction(
                Protocol::Icrc2Approve,
                &self.fee_ledger,
                wallet.clone(),
                Account::new(self.principal.clone()),
                fee_amount,
            )],
        )];

        if link.link_type == LinkType::ReceivePayment {
            return Ok(intents);
        }

        for asset in &link.asset_info {
            let fee = self.ledger.fee(&asset.address).await;
            let amount = asset
                .amount_per_link_use_action
                .checked_add(fee)
                .and_then(|per_use| per_use.checked_mul(max_count))
                .ok_or(Error::AmountOverflow)?;

            intents.push(new_intent(
                "transfer_wallet_to_link",
                vec![new_transaction(
                    Protocol::Icrc1Transfer,
                    &asset.address,
                    wallet.clone(),
                    vault.clone(),
                    amount,
                )],
            ));
        }

        Ok(intents)
    }

    fn use_intents(&self, link: &Link, caller: &Principal) -> Result<Vec<Intent>, Error> {
        let vault = self.link_vault(&link.id)?;

        Ok(link
            .asset_info
            .iter()
            .map(|asset| {
                new_intent(
                    "transfer_link_to_wallet",
                    vec![new_transaction(
                        Protocol::Icrc1Transfer,
                        &asset.address,
                        vault.clone(),
                        Account::new(caller.clone()),
                        asset.amount_per_link_use_action,
                    )],
                )
            })
            .collect())
    }

    fn payment_intents(&self, link: &Link, caller: &Principal) -> Result<Vec<Intent>, Error> {
        let vault = self.link_vault(&link.id)?;

        Ok(link
            .asset_info
            .iter()
            .map(|asset| {
                new_intent(
                    "transfer_wallet_to_link",
                    vec![new_transaction(
                        Protocol::Icrc1Transfer,
                        &asset.address,
                        Account::new(caller.clone()),
                        vault.clone(),
                        asset.amount_per_link_use_action,
                    )],
                )
            })
            .collect())
    }

    /// Whatever the vault holds, less the payout fee
    async fn withdraw_intents(
        &self,
        link: &Link,
        caller: &Principal,
    ) -> Result<Vec<Intent>, Error> {
        let vault = self.link_vault(&link.id)?;
        let mut intents = Vec::new();

        for asset in &link.asset_info {
            let balance = self.ledger.balance_of(&asset.address, &vault).await;
            let fee = self.ledger.fee(&asset.address).await;
            if balance <= fee {
                continue;
            }

            intents.push(new_intent(
                "transfer_link_to_wallet",
                vec![new_transaction(
                    Protocol::Icrc1Transfer,
                    &asset.address,
                    vault.clone(),
                    Account::new(caller.clone()),
                    balance - fee,
                )],
            ));
        }

        Ok(intents)
    }

    async fn pay_out(&self, tx: &Transaction) -> Result<(), Error> {
        self.ledger
            .transfer(
                &tx.asset,
                &self.principal,
                TransferArg {
                    from_subaccount: tx.from.subaccount,
                    to: tx.to.clone(),
                    amount: tx.amount,
                    fee: None,
                    memo: Some(tx.memo().to_vec()),
                    created_at_time: None,
                },
            )
            .await?;

        Ok(())
    }

    /// Whether the ledger shows the caller's side of `tx`
    ///
    /// A matching approval is also spent right away: the creation fee moves
    /// to the treasury and only then counts as settled.
    async fn settle(&self, tx: &Transaction) -> Result<bool, Error> {
        let memo = tx.memo();
        let Some(block) = self.ledger.find_by_memo(&tx.asset, &memo).await else {
            return Ok(false);
        };

        match (tx.protocol, block.operation) {
            (Protocol::Icrc1Transfer, Operation::Transfer { from, to, amount }) => {
                Ok(from == tx.from && to == tx.to && amount == tx.amount)
            }
            (Protocol::Icrc2Approve, Operation::Approve { from, spender, amount }) => {
                if from != tx.from || spender != tx.to || amount < tx.amount {
                    return Ok(false);
                }

                let fee = self.ledger.fee(&tx.asset).await;
                let collect = tx.amount.saturating_sub(fee);
                match self
                    .ledger
                    .transfer_from(
                        &tx.asset,
                        &tx.to,
                        &tx.from,
                        &self.treasury,
                        collect,
                        Some(memo.to_vec()),
                    )
                    .await
                {
                    Ok(_) => Ok(true),
                    Err(err) => {
                        tracing::warn!("Could not collect fee of {}: {}", tx.id, err);
                        Ok(false)
                    }
                }
            }
            // The fee collection reuses the approval memo
            (Protocol::Icrc2Approve, Operation::TransferFrom { from, .. }) => Ok(from == tx.from),
            _ => Ok(false),
        }
    }

    /// Resolve an action whose inactivity window elapsed: whatever the ledger
    /// shows succeeds, the rest fails
    async fn expire(&self, record: &mut ActionRecord, link: &mut Link) -> Result<(), Error> {
        if !matches!(
            record.action.state,
            ActionState::Created | ActionState::Processing
        ) || Instant::now() < record.deadline
        {
            return Ok(());
        }

        tracing::info!(
            "Action {} inactive for {}s, resolving",
            record.action.id,
            self.inactivity_window.as_secs()
        );

        for tx in unresolved_mut(&mut record.action) {
            let settled = tx.from.owner != self.principal && self.settle(tx).await?;
            tx.state = if settled {
                TransactionState::Success
            } else {
                TransactionState::Fail
            };
        }

        record.nonce = None;
        record.action.icrc_112_requests = None;
        conclude(&mut record.action, link);

        Ok(())
    }

    /// One row per transaction group, then the finalize row
    async fn plan(&self, action: &Action, nonce: &str) -> Result<BatchPlan, Error> {
        let mut rows: BTreeMap<u16, Vec<Request>> = BTreeMap::new();

        for tx in action
            .intents
            .iter()
            .flat_map(|intent| intent.transactions.iter())
            .filter(|tx| tx.state != TransactionState::Success && tx.from.owner != self.principal)
        {
            let fee = Some(self.ledger.fee(&tx.asset).await);
            let memo = Some(tx.memo().to_vec());
            let nonce = Some(tx.id.to_string());

            let request = match tx.protocol {
                Protocol::Icrc1Transfer => Request::new(
                    Method::Icrc1Transfer,
                    &tx.asset,
                    nonce,
                    &TransferArg {
                        from_subaccount: tx.from.subaccount,
                        to: tx.to.clone(),
                        amount: tx.amount,
                        fee,
                        memo,
                        created_at_time: None,
                    },
                )?,
                Protocol::Icrc2Approve => Request::new(
                    Method::Icrc2Approve,
                    &tx.asset,
                    nonce,
                    &ApproveArg {
                        from_subaccount: tx.from.subaccount,
                        spender: tx.to.clone(),
                        amount: tx.amount,
                        expected_allowance: None,
                        expires_at: None,
                        fee,
                        memo,
                        created_at_time: None,
                    },
                )?,
            };

            rows.entry(tx.group).or_default().push(request);
        }

        let trigger = Request::new(
            Method::TriggerTransaction,
            self.principal.as_str(),
            Some(nonce.to_string()),
            &TriggerTransactionArg {
                action_id: action.id.clone(),
                link_id: action.link_id.clone(),
                transaction_id: nonce.to_string(),
            },
        )?;

        let mut rows: Vec<Vec<Request>> = rows.into_values().collect();
        rows.push(vec![trigger]);

        Ok(BatchPlan::new(rows))
    }
}

fn check_link_input(input: &CreateLinkInput) -> Result<(), Error> {
    if input.title.trim().is_empty() {
        return Err(Error::InvalidInput("title is empty".to_string()));
    }
    if input.asset_info.is_empty() {
        return Err(Error::InvalidInput("no assets".to_string()));
    }
    if input.asset_info.len() > input.link_type.max_assets() {
        return Err(Error::InvalidInput(format!(
            "{} takes at most {} asset(s)",
            input.link_type,
            input.link_type.max_assets()
        )));
    }
    if input.link_use_action_max_count == 0 {
        return Err(Error::InvalidInput("max use is zero".to_string()));
    }
    if let Some(asset) = input
        .asset_info
        .iter()
        .find(|asset| asset.amount_per_link_use_action == 0)
    {
        return Err(Error::InvalidInput(format!(
            "amount of {} is zero",
            asset.address
        )));
    }

    Ok(())
}

fn check_action_allowed(
    link: &Link,
    action_type: ActionType,
    caller: &Principal,
) -> Result<(), Error> {
    match action_type {
        ActionType::CreateLink => {
            if &link.creator != caller {
                return Err(Error::NotCreator(action_type));
            }
            if link.state != LinkState::CreateLink {
                return Err(Error::LinkNotActive(link.state));
            }
        }
        ActionType::Use | ActionType::Claim => {
            if link.is_exhausted() {
                return Err(Error::LinkExhausted);
            }
            if !link.state.accepts_use() {
                return Err(Error::LinkNotActive(link.state));
            }
        }
        ActionType::Withdraw => {
            if &link.creator != caller {
                return Err(Error::NotCreator(action_type));
            }
            if !matches!(link.state, LinkState::Active | LinkState::Inactive) {
                return Err(Error::LinkNotActive(link.state));
            }
        }
    }

    Ok(())
}

fn find_action<'a>(
    actions: &'a mut HashMap<String, ActionRecord>,
    caller: &Principal,
    action_id: &str,
    link_id: &str,
) -> Result<&'a mut ActionRecord, Error> {
    let record = actions
        .get_mut(action_id)
        .filter(|record| record.action.link_id == link_id)
        .ok_or(Error::ActionNotFound(action_id.to_string()))?;

    if &record.action.creator != caller {
        return Err(Error::NotActionCreator);
    }

    Ok(record)
}

fn new_transaction(
    protocol: Protocol,
    asset: &str,
    from: Account,
    to: Account,
    amount: u128,
) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        state: TransactionState::Created,
        protocol,
        asset: asset.to_string(),
        from,
        to,
        amount,
        dependency: vec![],
        group: 1,
        created_at: unix_time(),
    }
}

fn new_intent(task: &str, transactions: Vec<Transaction>) -> Intent {
    Intent {
        id: Uuid::new_v4(),
        state: IntentState::Created,
        task: task.to_string(),
        transactions,
    }
}

fn unresolved_mut<'a>(action: &'a mut Action) -> impl Iterator<Item = &'a mut Transaction> + 'a {
    action
        .intents
        .iter_mut()
        .flat_map(|intent| intent.transactions.iter_mut())
        .filter(|tx| tx.state != TransactionState::Success)
}

/// Fold transaction states into intent and action states, applying the
/// action's effect on the link when it succeeds
///
/// A use that settles after the last use was taken fails instead of
/// counting, so the counter never passes the link's max.
fn conclude(action: &mut Action, link: &mut Link) {
    for intent in &mut action.intents {
        intent.state = fold(intent.transactions.iter().map(|tx| match tx.state {
            TransactionState::Created => IntentState::Created,
            TransactionState::Processing => IntentState::Processing,
            TransactionState::Success => IntentState::Success,
            TransactionState::Fail => IntentState::Fail,
        }));
    }

    let was_success = action.state.is_success();
    action.state = match fold(action.intents.iter().map(|intent| intent.state)) {
        IntentState::Created => ActionState::Created,
        IntentState::Processing => ActionState::Processing,
        IntentState::Success => ActionState::Success,
        IntentState::Fail => ActionState::Fail,
    };

    if was_success || !action.state.is_success() {
        return;
    }

    match action.action_type {
        ActionType::CreateLink => link.state = LinkState::Active,
        ActionType::Use | ActionType::Claim => {
            if link.is_exhausted() {
                tracing::warn!(
                    "Link {} has no uses left, failing {} action {}",
                    link.id,
                    action.action_type,
                    action.id
                );
                action.state = ActionState::Fail;
                return;
            }
            link.link_use_action_counter += 1;
            if link.is_exhausted() {
                link.state = LinkState::Exhausted;
            }
        }
        ActionType::Withdraw => link.state = LinkState::Cancelled,
    }
    tracing::info!("Link {} is now {}", link.id, link.state);
}

fn fold(states: impl Iterator<Item = IntentState>) -> IntentState {
    let mut result = IntentState::Success;
    for state in states {
        result = match (result, state) {
            (IntentState::Fail, _) | (_, IntentState::Fail) => IntentState::Fail,
            (IntentState::Processing, _) | (_, IntentState::Processing) => {
                IntentState::Processing
            }
            (IntentState::Created, _) | (_, IntentState::Created) => IntentState::Created,
            _ => IntentState::Success,
        };
    }
    result
}

/// [`LinkConnector`] over a [`FakeAuthority`] for one caller
#[derive(Debug, Clone)]
pub struct FakeLinkClient {
    authority: FakeAuthority,
    caller: Principal,
}

impl FakeLinkClient {
    fn identity(&self, anonymous_wallet_address: Option<Principal>) -> Principal {
        anonymous_wallet_address.unwrap_or_else(|| self.caller.clone())
    }
}

#[async_trait]
impl LinkConnector for FakeLinkClient {
    async fn create_link_v2(
        &self,
        input: CreateLinkInput,
    ) -> Result<CreateLinkOutput, cashier::Error> {
        Ok(self.authority.create_link(&self.caller, input).await?)
    }

    async fn get_link(&self, link_id: &str) -> Result<Link, cashier::Error> {
        Ok(self.authority.link(link_id).await?)
    }

    async fn create_action(
        &self,
        link_id: &str,
        action_type: ActionType,
    ) -> Result<Action, cashier::Error> {
        Ok(self
            .authority
            .create_action(&self.caller, link_id, action_type, false)
            .await?)
    }

    async fn create_action_anonymous(
        &self,
        link_id: &str,
        action_type: ActionType,
        wallet_address: &Principal,
    ) -> Result<Action, cashier::Error> {
        Ok(self
            .authority
            .create_action(wallet_address, link_id, action_type, true)
            .await?)
    }

    async fn process_action(
        &self,
        link_id: &str,
        action_id: &str,
        action_type: ActionType,
    ) -> Result<Action, cashier::Error> {
        Ok(self
            .authority
            .process_action(&self.caller, link_id, action_id, action_type)
            .await?)
    }

    async fn process_action_anonymous(
        &self,
        link_id: &str,
        action_id: &str,
        action_type: ActionType,
        wallet_address: &Principal,
    ) -> Result<Action, cashier::Error> {
        Ok(self
            .authority
            .process_action(wallet_address, link_id, action_id, action_type)
            .await?)
    }

    async fn update_action(
        &self,
        action_id: &str,
        link_id: &str,
        external: bool,
    ) -> Result<Action, cashier::Error> {
        Ok(self
            .authority
            .update_action(&self.caller, action_id, link_id, external)
            .await?)
    }

    async fn trigger_transaction(
        &self,
        action_id: &str,
        link_id: &str,
        transaction_id: &str,
    ) -> Result<Action, cashier::Error> {
        Ok(self
            .authority
            .trigger_transaction(&self.caller, action_id, link_id, transaction_id)
            .await?)
    }

    async fn link_get_user_state(
        &self,
        input: LinkGetUserStateInput,
    ) -> Result<Option<LinkGetUserStateOutput>, cashier::Error> {
        let caller = self.identity(input.anonymous_wallet_address);
        Ok(self
            .authority
            .user_state(&caller, &input.link_id, input.action_type)
            .await?)
    }

    async fn link_update_user_state(
        &self,
        input: LinkUpdateUserStateInput,
    ) -> Result<Option<LinkGetUserStateOutput>, cashier::Error> {
        let caller = self.identity(input.anonymous_wallet_address);
        Ok(self
            .authority
            .update_user_state(&caller, &input.link_id, input.action_type, input.goto)
            .await?)
    }
}
