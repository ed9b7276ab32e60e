// Copyright 2024 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::common::{Address, EthereumWallet};
use crate::{CustomNetwork, Network};
use alloy::network::Ethereum;
use alloy::providers::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
};
use alloy::providers::{Identity, ProviderBuilder, ReqwestProvider};
use alloy::transports::http::{reqwest, Client, Http};
use rand::Rng;
use std::env;

/// Selects the network: `sepolia`, `local` or `custom`.
pub const EVM_NETWORK: &str = "EVM_NETWORK";
/// environment variables to connect to a custom EVM network
pub const RPC_URL: &str = "RPC_URL";
const RPC_URL_BUILD_TIME_VAL: Option<&str> = option_env!("RPC_URL");
pub const CHAIN_ID: &str = "CHAIN_ID";
const CHAIN_ID_BUILD_TIME_VAL: Option<&str> = option_env!("CHAIN_ID");
pub const BATCH_TRANSFER_ADDRESS: &str = "BATCH_TRANSFER_ADDRESS";
const BATCH_TRANSFER_ADDRESS_BUILD_TIME_VAL: Option<&str> = option_env!("BATCH_TRANSFER_ADDRESS");

const LOCAL_RPC_URL: &str = "http://localhost:8545";
const LOCAL_CHAIN_ID: u64 = 31337;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed to get EVM network: {0}")]
    FailedToGetEvmNetwork(String),
}

#[allow(clippy::type_complexity)]
pub(crate) type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    ReqwestProvider,
    Http<Client>,
    Ethereum,
>;

#[allow(clippy::type_complexity)]
pub type HttpWalletProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    ReqwestProvider,
    Http<Client>,
    Ethereum,
>;

/// Generate a random Address.
pub fn dummy_address() -> Address {
    Address::new(rand::rngs::OsRng.gen())
}

/// Get the `Network` from environment variables, falling back to values
/// baked in at build time.
pub fn get_evm_network_from_env() -> Result<Network, Error> {
    let from_env_or_build = |name: &str, build_time: Option<&str>| {
        env::var(name)
            .ok()
            .or_else(|| build_time.map(|s| s.to_string()))
    };

    let mut selector = env::var(EVM_NETWORK).ok();
    if cfg!(feature = "local") && selector.is_none() {
        info!("Using local EVM network as 'local' feature flag is enabled");
        selector = Some("local".to_string());
    }

    evm_network_from_vars(
        selector.as_deref(),
        from_env_or_build(RPC_URL, RPC_URL_BUILD_TIME_VAL),
        from_env_or_build(CHAIN_ID, CHAIN_ID_BUILD_TIME_VAL),
        from_env_or_build(BATCH_TRANSFER_ADDRESS, BATCH_TRANSFER_ADDRESS_BUILD_TIME_VAL),
    )
}

fn evm_network_from_vars(
    selector: Option<&str>,
    rpc_url: Option<String>,
    chain_id: Option<String>,
    batch_transfer_address: Option<String>,
) -> Result<Network, Error> {
    let parse_chain_id = |value: &str| {
        value.parse::<u64>().map_err(|_| {
            Error::FailedToGetEvmNetwork(format!("{CHAIN_ID} must be an integer, got {value:?}"))
        })
    };

    match (selector, rpc_url, chain_id, batch_transfer_address) {
        (Some("sepolia"), ..) => {
            info!("Using Sepolia EVM network as {EVM_NETWORK} is set to 'sepolia'");
            Ok(Network::Sepolia)
        }
        (Some("local"), rpc_url, chain_id, Some(batch_address)) => {
            info!("Using local EVM network as {EVM_NETWORK} is set to 'local'");
            let chain_id = match chain_id {
                Some(value) => parse_chain_id(&value)?,
                None => LOCAL_CHAIN_ID,
            };
            let rpc_url = rpc_url.unwrap_or_else(|| LOCAL_RPC_URL.to_string());
            Ok(Network::Custom(CustomNetwork::new(
                &rpc_url,
                chain_id,
                &batch_address,
            )?))
        }
        (None | Some("custom"), Some(rpc_url), Some(chain_id), Some(batch_address)) => {
            info!("Using custom EVM network from environment variables");
            Ok(Network::Custom(CustomNetwork::new(
                &rpc_url,
                parse_chain_id(&chain_id)?,
                &batch_address,
            )?))
        }
        (None, None, None, None) => {
            info!("No EVM network configured, defaulting to Sepolia");
            Ok(Network::Sepolia)
        }
        (Some(other), ..) if !matches!(other, "local" | "custom") => {
            error!("Unknown {EVM_NETWORK} value {other:?}");
            Err(Error::FailedToGetEvmNetwork(format!(
                "unknown {EVM_NETWORK} value {other:?}, expected sepolia, local or custom"
            )))
        }
        _ => {
            error!("Failed to obtain EVM Network through any means");
            Err(Error::FailedToGetEvmNetwork(format!(
                "missing env var, make sure to set all of: {RPC_URL}, {CHAIN_ID}, {BATCH_TRANSFER_ADDRESS}"
            )))
        }
    }
}

pub(crate) fn http_provider(rpc_url: reqwest::Url) -> HttpProvider {
    ProviderBuilder::new()
        .with_recommended_fillers()
        .on_http(rpc_url)
}

pub(crate) fn http_provider_with_wallet(
    rpc_url: reqwest::Url,
    wallet: EthereumWallet,
) -> HttpWalletProvider {
    ProviderBuilder::new()
        .with_recommended_fillers()
        .wallet(wallet)
        .on_http(rpc_url)
}
