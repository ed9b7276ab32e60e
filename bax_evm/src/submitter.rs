// Copyright 2024 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::amount::{checked_total, format_units};
use crate::common::{Address, Amount, TxHash, NATIVE_DECIMALS};
use crate::gateway::{self, ContractGateway};
use crate::request::{self, BatchPaymentRequest};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Why a submission attempt ended. Every variant is terminal for the attempt.
#[derive(thiserror::Error, Debug)]
pub enum SubmitError {
    #[error("No wallet is connected")]
    ProviderUnavailable,
    #[error("Invalid amounts: {0}")]
    InvalidAmount(#[source] request::Error),
    #[error("Invalid address: {0}")]
    InvalidAddress(#[source] request::Error),
    #[error("Could not read the decimals of token {token:?}: {source}")]
    TokenDecimalsUnavailable {
        token: Address,
        #[source]
        source: gateway::Error,
    },
    #[error("Allowance approval failed: {0}")]
    ApprovalFailed(#[source] gateway::Error),
    #[error("Batch transfer failed: {0}")]
    SubmissionFailed(#[source] gateway::Error),
    #[error("A batch payment is already being submitted")]
    AlreadySubmitting,
}

impl From<request::Error> for SubmitError {
    fn from(err: request::Error) -> Self {
        match err {
            request::Error::Recipient { .. } | request::Error::TokenAddress(_) => {
                SubmitError::InvalidAddress(err)
            }
            request::Error::Empty
            | request::Error::LengthMismatch { .. }
            | request::Error::Amount { .. }
            | request::Error::TotalOverflow => SubmitError::InvalidAmount(err),
        }
    }
}

/// What went on chain for a successful submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionReceipt {
    /// `Some` in token mode, the mined approval.
    pub approval_tx: Option<TxHash>,
    /// Broadcast, not necessarily mined yet.
    pub batch_tx: TxHash,
    pub total: Amount,
    pub decimals: u8,
    pub recipient_count: usize,
}

/// `Idle -> Submitting -> Success | Failed`, one pass per submit call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SubmissionState {
    #[default]
    Idle,
    Submitting,
    Success(SubmissionReceipt),
    Failed(String),
}

impl SubmissionState {
    pub fn is_submitting(&self) -> bool {
        matches!(self, SubmissionState::Submitting)
    }
}

/// Validates and dispatches batch payments through a [`ContractGateway`].
///
/// Token payments take two transactions: an ERC-20 approval for the total,
/// awaited until mined, then the batch call. If the batch call fails after
/// the approval went through, the allowance stays in place; it is reused by
/// the next attempt or can be revoked by the owner.
///
/// Only one submission runs at a time per [`SubmissionLock`]; a concurrent
/// call is refused with [`SubmitError::AlreadySubmitting`]. Submitters paying
/// from the same account must share one lock, otherwise their approvals
/// overwrite each other's allowance.
pub struct BatchPaymentSubmitter<G> {
    gateway: G,
    batch_contract: Address,
    lock: SubmissionLock,
    state: watch::Sender<SubmissionState>,
}

/// Admits one batch submission at a time across every submitter holding a
/// clone of it, covering the whole approve then batch sequence.
#[derive(Clone, Debug, Default)]
pub struct SubmissionLock(Arc<AtomicBool>);

impl SubmissionLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `None` while another submission holds the lock.
    pub fn try_acquire(&self) -> Option<SubmissionPermit<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(SubmissionPermit(&self.0))
    }
}

/// Releases its [`SubmissionLock`] on drop.
#[derive(Debug)]
pub struct SubmissionPermit<'a>(&'a AtomicBool);

impl Drop for SubmissionPermit<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<G: ContractGateway> BatchPaymentSubmitter<G> {
    /// A submitter with a lock of its own.
    pub fn new(gateway: G, batch_contract: Address) -> Self {
        Self::with_lock(gateway, batch_contract, SubmissionLock::new())
    }

    pub fn with_lock(gateway: G, batch_contract: Address, lock: SubmissionLock) -> Self {
        let (state, _) = watch::channel(SubmissionState::Idle);
        Self {
            gateway,
            batch_contract,
            lock,
            state,
        }
    }

    pub fn batch_contract(&self) -> Address {
        self.batch_contract
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Latest state.
    pub fn state(&self) -> SubmissionState {
        self.state.borrow().clone()
    }

    /// Follow state changes, e.g. to disable a submit button.
    pub fn subscribe(&self) -> watch::Receiver<SubmissionState> {
        self.state.subscribe()
    }

    pub fn submission_lock(&self) -> &SubmissionLock {
        &self.lock
    }

    /// Whether a submission sharing this submitter's lock is in flight.
    pub fn is_submitting(&self) -> bool {
        self.lock.is_held()
    }

    /// Runs one submission attempt. Never retried.
    pub async fn submit(
        &self,
        request: &BatchPaymentRequest,
    ) -> Result<SubmissionReceipt, SubmitError> {
        let Some(_in_flight) = InFlight::acquire(&self.lock, &self.state) else {
            warn!("Refusing batch payment while another one is in flight");
            return Err(SubmitError::AlreadySubmitting);
        };

        let result = self.dispatch(request).await;
        match &result {
            Ok(receipt) => {
                info!(
                    "Batch payment of {} to {} recipients broadcast with tx {:?}",
                    format_units(receipt.total, receipt.decimals),
                    receipt.recipient_count,
                    receipt.batch_tx
                );
                self.state.send_replace(SubmissionState::Success(receipt.clone()));
            }
            Err(err) => {
                error!("Batch payment failed: {err:?}");
                self.state.send_replace(SubmissionState::Failed(err.to_string()));
            }
        }
        result
    }

    async fn dispatch(
        &self,
        request: &BatchPaymentRequest,
    ) -> Result<SubmissionReceipt, SubmitError> {
        let signer = self
            .gateway
            .signer_address()
            .ok_or(SubmitError::ProviderUnavailable)?;

        let batch = request.validate()?;

        let decimals = match batch.token {
            None => NATIVE_DECIMALS,
            Some(token) => self
                .gateway
                .token_decimals(token)
                .await
                .map_err(|source| SubmitError::TokenDecimalsUnavailable { token, source })?,
        };

        let amounts = batch.normalize(decimals)?;
        let total = checked_total(&amounts).ok_or(request::Error::TotalOverflow)?;
        let recipient_count = batch.recipients.len();

        debug!(
            "Submitting batch payment from {signer:?}: {recipient_count} recipients, total {total} at {decimals} decimals"
        );

        match batch.token {
            Some(token) => {
                let approval_tx = self
                    .gateway
                    .approve(token, self.batch_contract, total)
                    .await
                    .map_err(SubmitError::ApprovalFailed)?;
                debug!("Allowance of {total} for {:?} mined in {approval_tx:?}", self.batch_contract);

                let batch_tx = self
                    .gateway
                    .batch_transfer_erc20(self.batch_contract, token, batch.recipients, amounts)
                    .await
                    .map_err(SubmitError::SubmissionFailed)?;

                Ok(SubmissionReceipt {
                    approval_tx: Some(approval_tx),
                    batch_tx,
                    total,
                    decimals,
                    recipient_count,
                })
            }
            None => {
                let batch_tx = self
                    .gateway
                    .batch_transfer_eth(self.batch_contract, batch.recipients, amounts, total)
                    .await
                    .map_err(SubmitError::SubmissionFailed)?;

                Ok(SubmissionReceipt {
                    approval_tx: None,
                    batch_tx,
                    total,
                    decimals,
                    recipient_count,
                })
            }
        }
    }
}

/// Holds the lock for one submission and releases it on every exit path,
/// including the submit future being dropped mid-way.
struct InFlight<'a> {
    _permit: SubmissionPermit<'a>,
    state: &'a watch::Sender<SubmissionState>,
}

impl<'a> InFlight<'a> {
    fn acquire(
        lock: &'a SubmissionLock,
        state: &'a watch::Sender<SubmissionState>,
    ) -> Option<Self> {
        let permit = lock.try_acquire()?;
        state.send_replace(SubmissionState::Submitting);
        Some(Self {
            _permit: permit,
            state,
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.state.send_if_modified(|state| {
            if state.is_submitting() {
                *state = SubmissionState::Failed("submission was abandoned".to_string());
                true
            } else {
                false
            }
        });
    }
}
