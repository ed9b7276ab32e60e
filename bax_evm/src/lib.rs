// Copyright 2024 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

#[macro_use]
extern crate tracing;

use crate::common::Address;
use alloy::primitives::address;
use alloy::transports::http::reqwest;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use std::str::FromStr;
use std::sync::LazyLock;

pub mod amount;
pub mod common;
pub mod contract;
pub mod gateway;
pub mod provider;
pub mod request;
pub mod submitter;
pub mod swap;
pub mod utils;
pub mod wallet;

pub use request::{BatchPaymentRequest, PaymentMode};
pub use submitter::{
    BatchPaymentSubmitter, SubmissionLock, SubmissionReceipt, SubmissionState, SubmitError,
};

static PUBLIC_SEPOLIA_HTTP_RPC_URL: LazyLock<reqwest::Url> = LazyLock::new(|| {
    "https://ethereum-sepolia-rpc.publicnode.com"
        .parse()
        .expect("Invalid RPC URL")
});

pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

// Should be updated when the smart contract is redeployed!
const SEPOLIA_BATCH_TRANSFER_ADDRESS: Address =
    address!("09579e61a95792be2440fe2da011ec47fbfc9861");

#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomNetwork {
    #[serde_as(as = "DisplayFromStr")]
    pub rpc_url_http: reqwest::Url,
    pub chain_id: u64,
    pub batch_transfer_address: Address,
}

impl CustomNetwork {
    pub fn new(
        rpc_url: &str,
        chain_id: u64,
        batch_transfer_addr: &str,
    ) -> Result<Self, utils::Error> {
        let rpc_url_http = reqwest::Url::parse(rpc_url).map_err(|err| {
            utils::Error::FailedToGetEvmNetwork(format!("invalid RPC URL {rpc_url:?}: {err}"))
        })?;
        let batch_transfer_address = Address::from_str(batch_transfer_addr).map_err(|err| {
            utils::Error::FailedToGetEvmNetwork(format!(
                "invalid batch transfer address {batch_transfer_addr:?}: {err}"
            ))
        })?;
        Ok(Self {
            rpc_url_http,
            chain_id,
            batch_transfer_address,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Network {
    #[default]
    Sepolia,
    Custom(CustomNetwork),
}

impl Network {
    pub fn identifier(&self) -> &str {
        match self {
            Network::Sepolia => "sepolia",
            Network::Custom(_) => "custom",
        }
    }

    pub fn rpc_url(&self) -> &reqwest::Url {
        match self {
            Network::Sepolia => &PUBLIC_SEPOLIA_HTTP_RPC_URL,
            Network::Custom(custom) => &custom.rpc_url_http,
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Sepolia => SEPOLIA_CHAIN_ID,
            Network::Custom(custom) => custom.chain_id,
        }
    }

    /// Address of the deployed contract exposing `batchTransferETH` and
    /// `batchTransferERC20`.
    pub fn batch_transfer_address(&self) -> &Address {
        match self {
            Network::Sepolia => &SEPOLIA_BATCH_TRANSFER_ADDRESS,
            Network::Custom(custom) => &custom.batch_transfer_address,
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (chain id {})", self.identifier(), self.chain_id())
    }
}
