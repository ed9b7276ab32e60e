// Copyright 2024 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::amount::{self, DecimalAmount};
use crate::common::{Address, Amount};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("At least one recipient and one amount are required")]
    Empty,
    #[error("Got {recipients} recipients but {amounts} amounts")]
    LengthMismatch { recipients: usize, amounts: usize },
    #[error("Amount on line {line} is invalid: {source}")]
    Amount {
        line: usize,
        #[source]
        source: amount::Error,
    },
    #[error("Recipient on line {line} is not an address: {value:?}")]
    Recipient { line: usize, value: String },
    #[error("Token address is not an address: {0:?}")]
    TokenAddress(String),
    #[error("The sum of all amounts does not fit in 256 bits")]
    TotalOverflow,
}

/// What is being distributed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PaymentMode {
    /// The chain's native currency, attached as the call value.
    Native,
    /// An ERC-20 token, pulled by the batch contract after an approval.
    Token { token_address: String },
}

/// A batch payment exactly as entered, frozen at the moment of dispatch.
///
/// Nothing is validated on construction; [`BatchPaymentRequest::validate`]
/// is pure and runs before any network access.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPaymentRequest {
    recipients: Vec<String>,
    amounts: Vec<String>,
    mode: PaymentMode,
}

impl BatchPaymentRequest {
    pub fn new(recipients: Vec<String>, amounts: Vec<String>, mode: PaymentMode) -> Self {
        Self {
            recipients,
            amounts,
            mode,
        }
    }

    /// Builds the request from the two newline separated text areas of the
    /// transfer form.
    pub fn from_form(recipients_text: &str, amounts_text: &str, mode: PaymentMode) -> Self {
        Self::new(split_lines(recipients_text), split_lines(amounts_text), mode)
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn amounts(&self) -> &[String] {
        &self.amounts
    }

    pub fn mode(&self) -> &PaymentMode {
        &self.mode
    }

    /// Checks the shape of the request and parses every line.
    /// Amounts are not scaled yet since that needs the asset's decimals.
    pub fn validate(&self) -> Result<ValidatedBatch, Error> {
        if self.recipients.is_empty() || self.amounts.is_empty() {
            return Err(Error::Empty);
        }
        if self.recipients.len() != self.amounts.len() {
            return Err(Error::LengthMismatch {
                recipients: self.recipients.len(),
                amounts: self.amounts.len(),
            });
        }

        let amounts = self
            .amounts
            .iter()
            .enumerate()
            .map(|(index, value)| {
                DecimalAmount::from_str(value).map_err(|source| Error::Amount {
                    line: index + 1,
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let recipients = self
            .recipients
            .iter()
            .enumerate()
            .map(|(index, value)| {
                Address::from_str(value.trim()).map_err(|_| Error::Recipient {
                    line: index + 1,
                    value: value.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let token = match &self.mode {
            PaymentMode::Native => None,
            PaymentMode::Token { token_address } => Some(
                Address::from_str(token_address.trim())
                    .map_err(|_| Error::TokenAddress(token_address.clone()))?,
            ),
        };

        Ok(ValidatedBatch {
            recipients,
            amounts,
            token,
        })
    }
}

/// A request whose every line parsed. `recipients[i]` is paid `amounts[i]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedBatch {
    pub recipients: Vec<Address>,
    pub amounts: Vec<DecimalAmount>,
    /// `None` for native currency.
    pub token: Option<Address>,
}

impl ValidatedBatch {
    /// Scales every amount to smallest units, keeping the order.
    pub fn normalize(&self, decimals: u8) -> Result<Vec<Amount>, Error> {
        self.amounts
            .iter()
            .enumerate()
            .map(|(index, amount)| {
                amount
                    .to_smallest_unit(decimals)
                    .map_err(|source| Error::Amount {
                        line: index + 1,
                        source,
                    })
            })
            .collect()
    }
}

/// One entry per non blank line, trimmed. Duplicates are kept.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
