// Copyright 2024 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::common::{Address, Amount, Calldata, TxHash};
use crate::contract::batch_transfer::IBatchTransfer::IBatchTransferInstance;
use alloy::providers::{Network, Provider};
use alloy::sol;
use alloy::transports::{RpcError, Transport, TransportErrorKind};

sol!(
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IBatchTransfer {
        error SafeERC20FailedOperation(address token);

        function batchTransferERC20(address token, address[] calldata recipients, uint256[] calldata amounts) external;

        function batchTransferETH(address[] calldata recipients, uint256[] calldata amounts) external payable;
    }
);

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    ContractError(#[from] alloy::contract::Error),
    #[error(transparent)]
    RpcError(#[from] RpcError<TransportErrorKind>),
    #[error("Got {recipients} recipients but {amounts} amounts")]
    LengthMismatch { recipients: usize, amounts: usize },
    #[error("A batch transfer needs at least one recipient")]
    EmptyBatch,
}

/// Calls into the deployed batch transfer contract.
///
/// `recipients[i]` is paid `amounts[i]`; both slices are passed positionally.
pub struct BatchTransferHandler<T: Transport + Clone, P: Provider<T, N>, N: Network> {
    pub contract: IBatchTransferInstance<T, P, N>,
}

impl<T, P, N> BatchTransferHandler<T, P, N>
where
    T: Transport + Clone,
    P: Provider<T, N>,
    N: Network,
{
    pub fn new(contract_address: Address, provider: P) -> Self {
        let contract = IBatchTransfer::new(contract_address, provider);
        BatchTransferHandler { contract }
    }

    /// Sends native currency to every recipient. `value` is attached to the
    /// call and must equal the sum of `amounts`.
    ///
    /// Returns as soon as the transaction is accepted by the node.
    pub async fn batch_transfer_eth(
        &self,
        recipients: Vec<Address>,
        amounts: Vec<Amount>,
        value: Amount,
    ) -> Result<TxHash, Error> {
        check_lengths(&recipients, &amounts)?;
        let count = recipients.len();
        debug!("Sending batchTransferETH to {count} recipients with value {value}");

        let pending_tx_builder = self
            .contract
            .batchTransferETH(recipients, amounts)
            .value(value)
            .send()
            .await
            .inspect_err(|err| error!("Error sending batchTransferETH: {err:?}"))?;

        let tx_hash = *pending_tx_builder.tx_hash();
        debug!("batchTransferETH to {count} recipients is pending with tx_hash: {tx_hash:?}");
        Ok(tx_hash)
    }

    /// Moves `token` from the caller to every recipient. The contract must
    /// already be approved for the sum of `amounts`.
    ///
    /// Returns as soon as the transaction is accepted by the node.
    pub async fn batch_transfer_erc20(
        &self,
        token: Address,
        recipients: Vec<Address>,
        amounts: Vec<Amount>,
    ) -> Result<TxHash, Error> {
        check_lengths(&recipients, &amounts)?;
        let count = recipients.len();
        debug!("Sending batchTransferERC20 of token {token:?} to {count} recipients");

        let pending_tx_builder = self
            .contract
            .batchTransferERC20(token, recipients, amounts)
            .send()
            .await
            .inspect_err(|err| error!("Error sending batchTransferERC20 of {token:?}: {err:?}"))?;

        let tx_hash = *pending_tx_builder.tx_hash();
        debug!("batchTransferERC20 to {count} recipients is pending with tx_hash: {tx_hash:?}");
        Ok(tx_hash)
    }

    /// Returns the batchTransferETH calldata (input, to). The caller attaches
    /// the total as the transaction value.
    pub fn batch_transfer_eth_calldata(
        &self,
        recipients: Vec<Address>,
        amounts: Vec<Amount>,
    ) -> Result<(Calldata, Address), Error> {
        check_lengths(&recipients, &amounts)?;
        let calldata = self
            .contract
            .batchTransferETH(recipients, amounts)
            .calldata()
            .to_owned();
        Ok((calldata, *self.contract.address()))
    }

    /// Returns the batchTransferERC20 calldata (input, to).
    pub fn batch_transfer_erc20_calldata(
        &self,
        token: Address,
        recipients: Vec<Address>,
        amounts: Vec<Amount>,
    ) -> Result<(Calldata, Address), Error> {
        check_lengths(&recipients, &amounts)?;
        let calldata = self
            .contract
            .batchTransferERC20(token, recipients, amounts)
            .calldata()
            .to_owned();
        Ok((calldata, *self.contract.address()))
    }
}

fn check_lengths(recipients: &[Address], amounts: &[Amount]) -> Result<(), Error> {
    if recipients.is_empty() {
        return Err(Error::EmptyBatch);
    }
    if recipients.len() != amounts.len() {
        return Err(Error::LengthMismatch {
            recipients: recipients.len(),
            amounts: amounts.len(),
        });
    }
    Ok(())
}
