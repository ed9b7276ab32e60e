// Copyright 2024 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::common::Address;
use alloy::network::{Network, NetworkWallet};
use alloy::providers::{Provider, WalletProvider};
use alloy::transports::{RpcError, Transport, TransportErrorKind};
use async_trait::async_trait;
use serde_json::Value;
use std::marker::PhantomData;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    RpcError(#[from] RpcError<TransportErrorKind>),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("The wallet has no accounts")]
    NoAccounts,
}

/// Events a wallet pushes to whoever embeds it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletEvent {
    Connect { chain_id: u64 },
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
    Disconnect,
}

/// The EIP-1193 shaped capability third party widgets expect from a wallet.
#[async_trait]
pub trait Eip1193Provider: Send + Sync {
    /// A JSON-RPC call, `params` being the positional params array.
    async fn request(&self, method: &str, params: Value) -> Result<Value, Error>;
    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;
    /// Asks for account access and returns the exposed accounts.
    async fn enable(&self) -> Result<Vec<Address>, Error>;
}

/// Exposes an alloy provider that carries a wallet as an [`Eip1193Provider`].
///
/// Account queries are answered from the local wallet; everything else is
/// forwarded to the node.
pub struct WalletClientAdapter<T, P, N> {
    provider: P,
    events: broadcast::Sender<WalletEvent>,
    _marker: PhantomData<fn() -> (T, N)>,
}

impl<T, P, N> WalletClientAdapter<T, P, N>
where
    T: Transport + Clone,
    P: Provider<T, N> + WalletProvider<N>,
    N: Network,
{
    pub fn new(provider: P) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            provider,
            events,
            _marker: PhantomData,
        }
    }

    pub fn accounts(&self) -> Vec<Address> {
        <P::Wallet as NetworkWallet<N>>::signer_addresses(self.provider.wallet()).collect()
    }

    /// Tells subscribers the embedding page switched chains.
    pub fn notify_chain_changed(&self, chain_id: u64) {
        // no subscribers is fine
        let _ = self.events.send(WalletEvent::ChainChanged(chain_id));
    }

    /// Tells subscribers the wallet went away.
    pub fn disconnect(&self) {
        let _ = self.events.send(WalletEvent::Disconnect);
    }
}

#[async_trait]
impl<T, P, N> Eip1193Provider for WalletClientAdapter<T, P, N>
where
    T: Transport + Clone,
    P: Provider<T, N> + WalletProvider<N> + 'static,
    N: Network,
{
    async fn request(&self, method: &str, params: Value) -> Result<Value, Error> {
        match method {
            "eth_accounts" | "eth_requestAccounts" => Ok(serde_json::to_value(self.accounts())?),
            _ => {
                trace!("Forwarding {method} to the node");
                let response: Value = self
                    .provider
                    .raw_request(method.to_string().into(), params)
                    .await
                    .inspect_err(|err| error!("Error forwarding {method}: {err:?}"))?;
                Ok(response)
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }

    async fn enable(&self) -> Result<Vec<Address>, Error> {
        let accounts = self.accounts();
        if accounts.is_empty() {
            return Err(Error::NoAccounts);
        }
        let chain_id = self.provider.get_chain_id().await?;
        debug!("Wallet enabled on chain {chain_id} with {} accounts", accounts.len());

        let _ = self.events.send(WalletEvent::Connect { chain_id });
        let _ = self.events.send(WalletEvent::AccountsChanged(accounts.clone()));
        Ok(accounts)
    }
}
