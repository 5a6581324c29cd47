//! High-level flows over a [`ChainGateway`]: deploy, opt in, call, read
//! back. Signing is delegated to a [`TransactionSigner`]; this crate never
//! holds keys.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::address::Address;
use crate::codec;
use crate::config::Config;
use crate::errors::{ClientError, Result};
use crate::ledger::{self, EventRecord, LedgerExport, LedgerFilter};
use crate::params::{self, NetworkParams};
use crate::phase::{self, Operation, Phase};
use crate::rpc::ChainGateway;
use crate::session::Session;
use crate::state::{self, AccountSummary, ApplicationSummary, DecodedState};
use crate::submit::{self, Confirmation, ConfirmationPolicy, SignedBlob};
use crate::txn::{self, AppCreate, TrustGameCall, UnsignedTransaction};

/// External wallet. Receives unsigned transactions in group order and
/// returns one signed blob per transaction, in the same order.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> &str;

    async fn sign(&self, txns: &[UnsignedTransaction]) -> Result<Vec<SignedBlob>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub tx_id: String,
    pub confirmation: Confirmation,
}

pub struct TrustGameClient<G> {
    gateway: G,
    session: Session,
    policy: ConfirmationPolicy,
    page_size: u32,
}

impl<G: ChainGateway> TrustGameClient<G> {
    pub fn new(gateway: G, config: &Config) -> Self {
        Self {
            gateway,
            session: Session::new(config.app_id),
            policy: config.confirmation_policy(),
            page_size: config.history_page_size,
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub async fn network_params(&self) -> Result<NetworkParams> {
        let raw = self.gateway.suggested_params().await?;
        params::normalize(&raw)
    }

    /// Compile program source upstream and return the program bytes.
    pub async fn compile_program(&self, source: &str) -> Result<Vec<u8>> {
        if source.trim().is_empty() {
            return Err(ClientError::InvalidInput("program source is empty".to_string()));
        }
        let compiled = self.gateway.compile(source).await?;
        codec::decode_b64(&compiled.result)
    }

    /// Signer address, checked before any request is made.
    fn sender_of<S: TransactionSigner + ?Sized>(signer: &S) -> Result<String> {
        let address: Address = signer.address().parse()?;
        Ok(address.to_string())
    }

    async fn execute<S: TransactionSigner + ?Sized>(
        &self,
        signer: &S,
        txns: &[UnsignedTransaction],
    ) -> Result<Submitted> {
        let signed = signer.sign(txns).await?;
        if signed.len() != txns.len() {
            return Err(ClientError::InvalidInput(format!(
                "signer returned {} transactions for a group of {}",
                signed.len(),
                txns.len()
            )));
        }
        let tx_id = submit::submit_group(&self.gateway, &signed).await?;
        let confirmation = submit::await_confirmation(&self.gateway, &tx_id, self.policy).await?;
        Ok(Submitted {
            tx_id,
            confirmation,
        })
    }

    /// Compile both programs, create the contract and wait for its id. A
    /// confirmed deployment becomes the session's selected contract.
    pub async fn deploy<S: TransactionSigner + ?Sized>(
        &mut self,
        signer: &S,
        approval_source: &str,
        clear_source: &str,
    ) -> Result<Submitted> {
        let sender = Self::sender_of(signer)?;
        let approval = self.compile_program(approval_source).await?;
        let clear = self.compile_program(clear_source).await?;
        let params = self.network_params().await?;
        let create = txn::build_app_create(
            &params,
            &sender,
            AppCreate::trust_game(approval, clear),
        )?;

        let submitted = self.execute(signer, &[create]).await?;
        match submitted.confirmation.app_id() {
            Some(app_id) => {
                info!("Deployed trust game contract {app_id}");
                self.session.select(app_id);
            }
            None => warn!(
                "Deployment {} has no contract id yet: {:?}",
                submitted.tx_id, submitted.confirmation
            ),
        }
        Ok(submitted)
    }

    /// Phase read from the contract's `phase` global, if present.
    pub async fn current_phase(&self, app_id: u64) -> Result<Option<Phase>> {
        let app = self.gateway.application(app_id).await?;
        Ok(ApplicationSummary::from_response(&app).phase())
    }

    /// Advisory gate: refuses operations the current phase does not allow.
    /// An unreadable phase lets the contract decide.
    async fn ensure_allowed(&self, app_id: u64, op: Operation, target: Option<Phase>) -> Result<()> {
        let Some(current) = self.current_phase(app_id).await? else {
            warn!("Contract {app_id} has no readable phase; skipping {op:?} gate");
            return Ok(());
        };
        if !phase::is_operation_allowed(current, op) {
            return Err(ClientError::InvalidInput(format!(
                "{op:?} is not allowed during the {} phase",
                current.as_str()
            )));
        }
        if let Some(to) = target {
            if !phase::can_advance(current, to) {
                return Err(ClientError::InvalidInput(format!(
                    "cannot move from {} to {}",
                    current.as_str(),
                    to.as_str()
                )));
            }
        }
        Ok(())
    }

    pub async fn opt_in<S: TransactionSigner + ?Sized>(
        &self,
        signer: &S,
        app_id: Option<u64>,
    ) -> Result<Submitted> {
        let sender = Self::sender_of(signer)?;
        let app_id = self.session.resolve_app_id(app_id)?;
        self.ensure_allowed(app_id, Operation::OptIn, None).await?;
        let params = self.network_params().await?;
        let opt_in = txn::build_app_opt_in(&params, &sender, app_id)?;
        self.execute(signer, &[opt_in]).await
    }

    /// Send one contract call. `invest` is sent as a two-transaction group
    /// whose first member pays the invested amount to the contract.
    pub async fn call<S: TransactionSigner + ?Sized>(
        &self,
        signer: &S,
        app_id: Option<u64>,
        call: TrustGameCall,
        accounts: Vec<Address>,
    ) -> Result<Submitted> {
        let sender = Self::sender_of(signer)?;
        let app_id = self.session.resolve_app_id(app_id)?;
        let target = match &call {
            TrustGameCall::SetPhase(to) => Some(*to),
            _ => None,
        };
        self.ensure_allowed(app_id, call.operation(), target).await?;

        let params = self.network_params().await?;
        let sender = sender.as_str();
        let txns = match call {
            TrustGameCall::Invest { amount } => {
                let payment = txn::build_payment(
                    &params,
                    sender,
                    &Address::for_application(app_id),
                    amount,
                )?;
                let app_call = txn::build_app_call(
                    &params,
                    sender,
                    TrustGameCall::Invest { amount }.into_app_call(app_id, accounts),
                )?;
                let mut group = vec![payment, app_call];
                txn::assign_group(&mut group)?;
                group
            }
            other => vec![txn::build_app_call(
                &params,
                sender,
                other.into_app_call(app_id, accounts),
            )?],
        };
        self.execute(signer, &txns).await
    }

    pub async fn delete<S: TransactionSigner + ?Sized>(
        &mut self,
        signer: &S,
        app_id: Option<u64>,
    ) -> Result<Submitted> {
        let sender = Self::sender_of(signer)?;
        let app_id = self.session.resolve_app_id(app_id)?;
        self.ensure_allowed(app_id, Operation::Delete, None).await?;
        let params = self.network_params().await?;
        let delete = txn::build_app_delete(&params, &sender, app_id)?;
        let submitted = self.execute(signer, &[delete]).await?;
        if submitted.confirmation.is_confirmed() && self.session.selected() == Some(app_id) {
            self.session.clear();
        }
        Ok(submitted)
    }

    // ─────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────

    pub async fn application(&self, app_id: Option<u64>) -> Result<ApplicationSummary> {
        let app_id = self.session.resolve_app_id(app_id)?;
        let app = self.gateway.application(app_id).await?;
        Ok(ApplicationSummary::from_response(&app))
    }

    pub async fn local_state(&self, app_id: Option<u64>, address: &str) -> Result<DecodedState> {
        let address: Address = address.parse()?;
        let app_id = self.session.resolve_app_id(app_id)?;
        let account = self.gateway.account(&address.to_string()).await?;
        state::local_state_of(&account, app_id)
    }

    pub async fn account(&self, address: &str) -> Result<AccountSummary> {
        let address: Address = address.parse()?;
        let account = self.gateway.account(&address.to_string()).await?;
        Ok(AccountSummary::from_response(&account))
    }

    pub async fn history(
        &self,
        app_id: Option<u64>,
        min_round: Option<u64>,
        max_round: Option<u64>,
    ) -> Result<Vec<EventRecord>> {
        let filter = LedgerFilter {
            app_id: self.session.resolve_app_id(app_id)?,
            min_round,
            max_round,
            page_size: self.page_size,
        };
        ledger::build_ledger(&self.gateway, &filter).await
    }

    pub async fn export(
        &self,
        app_id: Option<u64>,
        min_round: Option<u64>,
        max_round: Option<u64>,
    ) -> Result<LedgerExport> {
        let app_id = self.session.resolve_app_id(app_id)?;
        let events = self.history(Some(app_id), min_round, max_round).await?;
        Ok(LedgerExport::new(app_id, events))
    }
}
