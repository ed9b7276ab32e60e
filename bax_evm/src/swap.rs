// Copyright 2024 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::common::Address;
use crate::provider::{self, Eip1193Provider};
use crate::Network;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const APP_CODE: &str = "BaxB-Wallet";

const DEFAULT_TOKEN_LISTS: [&str; 2] = [
    "https://files.cow.fi/tokens/CoinGecko.json",
    "https://files.cow.fi/tokens/CowSwap.json",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeType {
    Swap,
    Limit,
    Advanced,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

/// Parameters handed to the embedded swap widget, serialized the way the
/// widget library reads them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapWidgetParams {
    pub app_code: String,
    pub width: String,
    pub height: String,
    pub chain_id: u64,
    pub token_lists: Vec<String>,
    pub trade_type: TradeType,
    pub standalone_mode: bool,
    pub theme: Theme,
}

impl SwapWidgetParams {
    pub fn for_network(network: &Network) -> Self {
        Self {
            app_code: APP_CODE.to_string(),
            width: "100%".to_string(),
            height: "500px".to_string(),
            chain_id: network.chain_id(),
            token_lists: DEFAULT_TOKEN_LISTS.iter().map(|s| s.to_string()).collect(),
            trade_type: TradeType::Swap,
            standalone_mode: false,
            theme: Theme::Light,
        }
    }
}

impl Default for SwapWidgetParams {
    fn default() -> Self {
        Self::for_network(&Network::default())
    }
}

/// The swap widget's view of the host: its params plus the wallet it trades with.
pub struct SwapWidget<W: ?Sized> {
    params: SwapWidgetParams,
    provider: Arc<W>,
}

/// Result of mounting: what the host page passes on to the widget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MountedSwapWidget {
    pub params: serde_json::Value,
    pub accounts: Vec<Address>,
}

impl<W: Eip1193Provider + ?Sized> SwapWidget<W> {
    pub fn new(params: SwapWidgetParams, provider: Arc<W>) -> Self {
        Self { params, provider }
    }

    pub fn params(&self) -> &SwapWidgetParams {
        &self.params
    }

    pub fn provider(&self) -> Arc<W> {
        Arc::clone(&self.provider)
    }

    /// Enables the wallet and renders the params. Mounting without a
    /// connected wallet fails; the widget is useless without one.
    pub async fn mount(&self) -> Result<MountedSwapWidget, provider::Error> {
        let accounts = self.provider.enable().await?;
        let params = serde_json::to_value(&self.params)?;
        info!(
            "Mounting swap widget on chain {} for {} accounts",
            self.params.chain_id,
            accounts.len()
        );
        Ok(MountedSwapWidget { params, accounts })
    }
}
