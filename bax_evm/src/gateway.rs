// Copyright 2024 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::common::{Address, Amount, TxHash};
use crate::contract::batch_transfer::{self, BatchTransferHandler};
use crate::contract::erc20::{self, Erc20Token};
use alloy::network::Network;
use alloy::providers::{Provider, WalletProvider};
use alloy::transports::{Transport, TransportError};
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::Mutex;

/// EIP-1193 `4001 User Rejected Request`.
pub const USER_REJECTED_REQUEST: i64 = 4001;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Token contract error: {0}")]
    Token(#[source] erc20::Error),
    #[error("Batch transfer contract error: {0}")]
    BatchTransfer(#[source] batch_transfer::Error),
    /// The signer refused, e.g. the user dismissed the signing prompt.
    #[error("Rejected by the signer: {0}")]
    Rejected(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<erc20::Error> for Error {
    fn from(err: erc20::Error) -> Self {
        let rejection = match &err {
            erc20::Error::ContractError(err) => contract_rejection(err),
            erc20::Error::RpcError(err) => user_rejection(err),
            _ => None,
        };
        rejection.map_or(Error::Token(err), Error::Rejected)
    }
}

impl From<batch_transfer::Error> for Error {
    fn from(err: batch_transfer::Error) -> Self {
        let rejection = match &err {
            batch_transfer::Error::ContractError(err) => contract_rejection(err),
            batch_transfer::Error::RpcError(err) => user_rejection(err),
            _ => None,
        };
        rejection.map_or(Error::BatchTransfer(err), Error::Rejected)
    }
}

fn contract_rejection(err: &alloy::contract::Error) -> Option<String> {
    match err {
        alloy::contract::Error::TransportError(err) => user_rejection(err),
        _ => None,
    }
}

/// The signer's message when the node or wallet answered with
/// [`USER_REJECTED_REQUEST`].
fn user_rejection(err: &TransportError) -> Option<String> {
    err.as_error_resp()
        .filter(|payload| payload.code == USER_REJECTED_REQUEST)
        .map(|payload| payload.message.to_string())
}

/// The on-chain surface the batch payment submitter needs.
///
/// `approve` resolves only once the approval is mined; the batch calls
/// resolve as soon as the transaction is broadcast.
#[async_trait]
pub trait ContractGateway: Sync {
    /// The account that would sign, `None` when no wallet is connected.
    fn signer_address(&self) -> Option<Address>;
    async fn token_decimals(&self, token: Address) -> Result<u8>;
    async fn approve(&self, token: Address, spender: Address, amount: Amount) -> Result<TxHash>;
    async fn batch_transfer_eth(
        &self,
        batch_contract: Address,
        recipients: Vec<Address>,
        amounts: Vec<Amount>,
        value: Amount,
    ) -> Result<TxHash>;
    async fn batch_transfer_erc20(
        &self,
        batch_contract: Address,
        token: Address,
        recipients: Vec<Address>,
        amounts: Vec<Amount>,
    ) -> Result<TxHash>;
}

/// [`ContractGateway`] over an alloy provider.
pub struct EvmGateway<T, P, N> {
    provider: P,
    signer: Option<Address>,
    lock: Arc<Mutex<()>>,
    _marker: PhantomData<fn() -> (T, N)>,
}

impl<T, P, N> EvmGateway<T, P, N>
where
    T: Transport + Clone,
    P: Provider<T, N> + Clone,
    N: Network,
{
    /// Pass `None` as signer for a read-only provider.
    pub fn new(provider: P, signer: Option<Address>) -> Self {
        Self {
            provider,
            signer,
            lock: Arc::new(Mutex::new(())),
            _marker: PhantomData,
        }
    }

    /// Uses the default signer of a provider that carries a wallet.
    pub fn from_wallet_provider(provider: P) -> Self
    where
        P: WalletProvider<N>,
    {
        let signer = provider.default_signer_address();
        Self::new(provider, Some(signer))
    }

    /// Serialize sends with other gateways holding the same lock.
    pub fn with_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.lock = lock;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

#[async_trait]
impl<T, P, N> ContractGateway for EvmGateway<T, P, N>
where
    T: Transport + Clone,
    P: Provider<T, N> + Clone + 'static,
    N: Network,
{
    fn signer_address(&self) -> Option<Address> {
        self.signer
    }

    async fn token_decimals(&self, token: Address) -> Result<u8> {
        let token = Erc20Token::new(token, self.provider.clone());
        Ok(token.decimals().await?)
    }

    async fn approve(&self, token: Address, spender: Address, amount: Amount) -> Result<TxHash> {
        let token = Erc20Token::new(token, self.provider.clone());
        let _send_guard = self.lock.lock().await;
        Ok(token.approve(spender, amount).await?)
    }

    async fn batch_transfer_eth(
        &self,
        batch_contract: Address,
        recipients: Vec<Address>,
        amounts: Vec<Amount>,
        value: Amount,
    ) -> Result<TxHash> {
        let handler = BatchTransferHandler::new(batch_contract, self.provider.clone());
        let _send_guard = self.lock.lock().await;
        Ok(handler
            .batch_transfer_eth(recipients, amounts, value)
            .await?)
    }

    async fn batch_transfer_erc20(
        &self,
        batch_contract: Address,
        token: Address,
        recipients: Vec<Address>,
        amounts: Vec<Amount>,
    ) -> Result<TxHash> {
        let handler = BatchTransferHandler::new(batch_contract, self.provider.clone());
        let _send_guard = self.lock.lock().await;
        Ok(handler
            .batch_transfer_erc20(token, recipients, amounts)
            .await?)
    }
}
