// Copyright 2024 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::common::{Address, Amount, EthereumWallet};
use crate::contract::erc20::{self, Erc20Token};
use crate::gateway::EvmGateway;
use crate::submitter::{BatchPaymentSubmitter, SubmissionLock};
use crate::utils::{http_provider, http_provider_with_wallet, HttpWalletProvider};
use crate::Network;
use alloy::hex::ToHexExt;
use alloy::network::{Ethereum, NetworkWallet};
use alloy::providers::Provider;
use alloy::signers::local::{LocalSigner, PrivateKeySigner};
use alloy::transports::http::{Client, Http};
use alloy::transports::{RpcError, TransportErrorKind};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Private key is invalid")]
    PrivateKeyInvalid,
    #[error(transparent)]
    RpcError(#[from] RpcError<TransportErrorKind>),
    #[error("Token contract error: {0}")]
    Token(#[from] erc20::Error),
}

/// The gateway type a [`Wallet`] hands out.
pub type WalletGateway = EvmGateway<Http<Client>, HttpWalletProvider, Ethereum>;

/// A local signing key bound to a network.
#[derive(Clone)]
pub struct Wallet {
    wallet: EthereumWallet,
    network: Network,
    // Shared by every gateway built from this wallet so sends never interleave.
    lock: Arc<Mutex<()>>,
    // Shared by every submitter so approve/batch sequences never interleave.
    submissions: SubmissionLock,
}

impl Wallet {
    pub fn new(network: Network, wallet: EthereumWallet) -> Self {
        Self {
            wallet,
            network,
            lock: Arc::new(Mutex::new(())),
            submissions: SubmissionLock::new(),
        }
    }

    /// Convenience function that creates a new Wallet with a random EthereumWallet.
    pub fn new_with_random_wallet(network: Network) -> Self {
        Self::new(network, random())
    }

    /// Creates a new Wallet based on the given private key. It will fail with
    /// `Error::PrivateKeyInvalid` if the private key cannot be parsed.
    pub fn new_from_private_key(network: Network, private_key: &str) -> Result<Self, Error> {
        let wallet = from_private_key(private_key)?;
        Ok(Self::new(network, wallet))
    }

    pub fn address(&self) -> Address {
        wallet_address(&self.wallet)
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Returns the raw balance of native currency for this wallet.
    pub async fn balance_of_gas_tokens(&self) -> Result<Amount, Error> {
        let provider = http_provider(self.network.rpc_url().clone());
        let balance = provider.get_balance(self.address()).await?;
        Ok(balance)
    }

    /// Returns the raw balance of `token` for this wallet.
    pub async fn balance_of_tokens(&self, token: Address) -> Result<Amount, Error> {
        let provider = http_provider(self.network.rpc_url().clone());
        let balance = Erc20Token::new(token, provider)
            .balance_of(self.address())
            .await?;
        Ok(balance)
    }

    /// A provider that signs with this wallet.
    pub fn to_provider(&self) -> HttpWalletProvider {
        http_provider_with_wallet(self.network.rpc_url().clone(), self.wallet.clone())
    }

    /// A contract gateway signing with this wallet.
    pub fn gateway(&self) -> WalletGateway {
        EvmGateway::from_wallet_provider(self.to_provider()).with_lock(Arc::clone(&self.lock))
    }

    /// A submitter paying through this network's batch transfer contract.
    ///
    /// Every submitter of one wallet shares a [`SubmissionLock`]: while one of
    /// them is submitting, the others refuse with `AlreadySubmitting`.
    pub fn batch_submitter(&self) -> BatchPaymentSubmitter<WalletGateway> {
        BatchPaymentSubmitter::with_lock(
            self.gateway(),
            *self.network.batch_transfer_address(),
            self.submissions.clone(),
        )
    }
}

/// Generate an EthereumWallet with a random private key.
fn random() -> EthereumWallet {
    let signer: PrivateKeySigner = LocalSigner::random();
    EthereumWallet::from(signer)
}

/// Creates a wallet from a private key in HEX format.
fn from_private_key(private_key: &str) -> Result<EthereumWallet, Error> {
    let signer: PrivateKeySigner = private_key.parse().map_err(|err| {
        error!("Error parsing private key: {err}");
        Error::PrivateKeyInvalid
    })?;
    Ok(EthereumWallet::from(signer))
}

/// Returns the address of this wallet.
pub fn wallet_address(wallet: &EthereumWallet) -> Address {
    <EthereumWallet as NetworkWallet<Ethereum>>::default_signer_address(wallet)
}

/// Generates a random hex private key, `0x` prefixed.
pub fn random_private_key() -> String {
    let signer: PrivateKeySigner = LocalSigner::random();
    signer.to_bytes().encode_hex_with_prefix()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ContractGateway;
    use crate::request::{BatchPaymentRequest, PaymentMode};
    use crate::submitter::{SubmissionState, SubmitError};

    // First default anvil account.
    const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn private_key_round_trips_to_a_stable_address() -> Result<(), Error> {
        let wallet = Wallet::new_from_private_key(Network::Sepolia, ANVIL_KEY)?;
        assert_eq!(
            wallet.address().to_string(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );

        let key = random_private_key();
        assert!(key.starts_with("0x"));
        assert!(Wallet::new_from_private_key(Network::Sepolia, &key).is_ok());
        Ok(())
    }

    #[test]
    fn garbage_private_key_is_rejected() {
        assert!(matches!(
            Wallet::new_from_private_key(Network::Sepolia, "not a key"),
            Err(Error::PrivateKeyInvalid)
        ));
    }

    #[test]
    fn gateway_signs_as_the_wallet() {
        let wallet = Wallet::new_with_random_wallet(Network::Sepolia);
        assert_eq!(wallet.gateway().signer_address(), Some(wallet.address()));
        assert_eq!(
            wallet.batch_submitter().batch_contract(),
            *Network::Sepolia.batch_transfer_address()
        );
    }

    #[tokio::test]
    async fn submitters_of_one_wallet_share_the_submission_lock() {
        let wallet = Wallet::new_with_random_wallet(Network::Sepolia);
        let first = wallet.batch_submitter();
        let second = wallet.batch_submitter();
        let request = BatchPaymentRequest::from_form(
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
            "1",
            PaymentMode::Token {
                token_address: "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238".to_string(),
            },
        );

        let permit = first.submission_lock().try_acquire();
        assert!(permit.is_some());
        assert!(second.is_submitting());
        assert!(matches!(
            second.submit(&request).await,
            Err(SubmitError::AlreadySubmitting)
        ));
        assert_eq!(second.state(), SubmissionState::Idle);

        drop(permit);
        assert!(!first.is_submitting());
        assert!(!second.is_submitting());

        // Another wallet is another account, with a lock of its own.
        let other = Wallet::new_with_random_wallet(Network::Sepolia).batch_submitter();
        let _permit = first.submission_lock().try_acquire();
        assert!(!other.is_submitting());
    }
}
