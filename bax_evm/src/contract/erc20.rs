// Copyright 2024 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::common::{Address, Amount, Calldata, TxHash};
use crate::contract::erc20::IERC20::IERC20Instance;
use alloy::network::ReceiptResponse;
use alloy::providers::{Network, Provider};
use alloy::sol;
use alloy::transports::{RpcError, Transport, TransportErrorKind};

sol!(
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
    }
);

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    ContractError(#[from] alloy::contract::Error),
    #[error(transparent)]
    RpcError(#[from] RpcError<TransportErrorKind>),
    #[error(transparent)]
    PendingTransactionError(#[from] alloy::providers::PendingTransactionError),
    #[error("Approval tx {0:?} was mined but reverted")]
    ApprovalReverted(TxHash),
}

/// Any ERC-20 token, addressed by its contract address.
pub struct Erc20Token<T: Transport + Clone, P: Provider<T, N>, N: Network> {
    pub contract: IERC20Instance<T, P, N>,
}

impl<T, P, N> Erc20Token<T, P, N>
where
    T: Transport + Clone,
    P: Provider<T, N>,
    N: Network,
{
    pub fn new(token_address: Address, provider: P) -> Self {
        let contract = IERC20::new(token_address, provider);
        Erc20Token { contract }
    }

    /// Number of decimal places the token uses for display amounts.
    pub async fn decimals(&self) -> Result<u8, Error> {
        let token = *self.contract.address();
        let decimals = self
            .contract
            .decimals()
            .call()
            .await
            .inspect_err(|err| error!("Error getting decimals of token {token:?}: {err:?}"))?
            ._0;
        debug!("Token {token:?} uses {decimals} decimals");
        Ok(decimals)
    }

    /// Get the raw token balance of an address.
    pub async fn balance_of(&self, account: Address) -> Result<Amount, Error> {
        debug!("Getting balance of account: {account:?}");
        let balance = self
            .contract
            .balanceOf(account)
            .call()
            .await
            .inspect_err(|err| error!("Error getting balance of account: {err:?}"))?
            ._0;
        debug!("Balance of account: {account} is {balance}");
        Ok(balance)
    }

    /// Raw amount `spender` may still move out of `owner`'s balance.
    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<Amount, Error> {
        let allowance = self
            .contract
            .allowance(owner, spender)
            .call()
            .await
            .inspect_err(|err| {
                error!("Error getting allowance of {spender:?} over {owner:?}: {err:?}")
            })?
            ._0;
        debug!("Allowance of {spender:?} over {owner:?} is {allowance}");
        Ok(allowance)
    }

    /// Approve spender to spend a raw amount of tokens.
    ///
    /// Only returns once the approval has been mined with a success status.
    pub async fn approve(&self, spender: Address, value: Amount) -> Result<TxHash, Error> {
        debug!("Approving spender {spender:?} to spend raw amt of tokens: {value}");
        let call = self.contract.approve(spender, value);
        let pending_tx_builder = call.send().await.inspect_err(|err| {
            error!(
                "Error approving spender {spender:?} to spend raw amt of tokens {value}:  {err:?}"
            )
        })?;

        let pending_tx_hash = *pending_tx_builder.tx_hash();
        debug!("The approval for spender {spender:?} is pending with tx_hash: {pending_tx_hash:?}");

        let receipt = pending_tx_builder.get_receipt().await.inspect_err(|err| {
            error!("Error watching approve tx with hash {pending_tx_hash:?}:  {err:?}")
        })?;
        if !receipt.status() {
            error!("Approve tx with hash {pending_tx_hash:?} reverted");
            return Err(Error::ApprovalReverted(pending_tx_hash));
        }

        debug!("Approve tx with hash {pending_tx_hash:?} is successful");
        Ok(pending_tx_hash)
    }

    /// Approve transaction calldata (input, to), for signing elsewhere.
    pub fn approve_calldata(&self, spender: Address, value: Amount) -> (Calldata, Address) {
        let calldata = self.contract.approve(spender, value).calldata().to_owned();
        (calldata, *self.contract.address())
    }
}
