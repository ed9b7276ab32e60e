// Copyright 2024 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::common::Amount;
use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Amount is empty")]
    Empty,
    #[error("Failed to parse {0:?}: {1}")]
    Malformed(String, &'static str),
    #[error("Lost precision: {amount} has more than {decimals} decimal places")]
    LossOfPrecision { amount: String, decimals: u8 },
    #[error("The amount {0} would exceed the maximum value")]
    ExcessiveValue(String),
}

/// A non-negative decimal amount as typed by a user, e.g. `"0.25"`.
///
/// Holds the digits only; it is scaled to an integer amount once the
/// decimals of the asset are known.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DecimalAmount {
    units: String,
    // trailing zeros stripped
    fraction: String,
}

impl DecimalAmount {
    /// Scales the amount to the asset's smallest unit: `amount * 10^decimals`.
    ///
    /// Fails instead of rounding when the amount carries more fractional
    /// digits than `decimals`.
    pub fn to_smallest_unit(&self, decimals: u8) -> Result<Amount, Error> {
        if self.fraction.len() > decimals as usize {
            return Err(Error::LossOfPrecision {
                amount: self.to_string(),
                decimals,
            });
        }

        let excessive = || Error::ExcessiveValue(self.to_string());

        let scale = pow10(decimals).ok_or_else(excessive)?;
        let units = if self.units.is_empty() {
            Amount::ZERO
        } else {
            self.units.parse::<Amount>().map_err(|_| excessive())?
        };
        let converted_units = units.checked_mul(scale).ok_or_else(excessive)?;

        let remainder = if self.fraction.is_empty() {
            Amount::ZERO
        } else {
            let parsed = self.fraction.parse::<Amount>().map_err(|_| excessive())?;
            // fraction.len() <= decimals was checked above
            let remainder_scale =
                pow10(decimals - self.fraction.len() as u8).ok_or_else(excessive)?;
            parsed.checked_mul(remainder_scale).ok_or_else(excessive)?
        };

        converted_units.checked_add(remainder).ok_or_else(excessive)
    }
}

impl FromStr for DecimalAmount {
    type Err = Error;

    fn from_str(value_str: &str) -> Result<Self, Self::Err> {
        let value_str = value_str.trim();
        if value_str.is_empty() {
            return Err(Error::Empty);
        }

        let (units, fraction) = value_str.split_once('.').unwrap_or((value_str, ""));

        if units.is_empty() && fraction.is_empty() {
            return Err(Error::Malformed(value_str.to_string(), "no digits"));
        }
        if !units.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::Malformed(
                value_str.to_string(),
                "can't parse token units",
            ));
        }
        if !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::Malformed(
                value_str.to_string(),
                "can't parse token remainder",
            ));
        }

        Ok(Self {
            units: units.to_string(),
            fraction: fraction.trim_end_matches('0').to_string(),
        })
    }
}

impl Display for DecimalAmount {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        let units = self.units.trim_start_matches('0');
        let units = if units.is_empty() { "0" } else { units };
        if self.fraction.is_empty() {
            write!(formatter, "{units}")
        } else {
            write!(formatter, "{units}.{}", self.fraction)
        }
    }
}

/// Renders a smallest-unit amount as a decimal string, e.g. `1500000000000000000`
/// with 18 decimals becomes `1.5`.
pub fn format_units(amount: Amount, decimals: u8) -> String {
    let Some(scale) = pow10(decimals) else {
        return amount.to_string();
    };
    let unit = amount / scale;
    let remainder = amount % scale;
    if remainder.is_zero() {
        return unit.to_string();
    }
    let remainder = format!("{:0>width$}", remainder.to_string(), width = decimals as usize);
    format!("{unit}.{}", remainder.trim_end_matches('0'))
}

/// Exact sum of the amounts, `None` on overflow.
pub fn checked_total<'a, I>(amounts: I) -> Option<Amount>
where
    I: IntoIterator<Item = &'a Amount>,
{
    amounts
        .into_iter()
        .try_fold(Amount::ZERO, |total, amount| total.checked_add(*amount))
}

fn pow10(exponent: u8) -> Option<Amount> {
    Amount::from(10u8).checked_pow(Amount::from(exponent))
}
