// Copyright 2024 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use alloy::primitives::{address, b256};
use assert_matches::assert_matches;
use async_trait::async_trait;
use bax_evm::common::{Address, Amount, TxHash, U256};
use bax_evm::gateway::{self, ContractGateway};
use bax_logging::LogBuilder;
use bax_evm::{
    BatchPaymentRequest, BatchPaymentSubmitter, PaymentMode, SubmissionLock, SubmissionState,
    SubmitError,
};
use eyre::Result;
use mockall::predicate::*;
use mockall::{mock, Sequence};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

const BATCH_CONTRACT: Address = address!("09579e61a95792be2440fe2da011ec47fbfc9861");
const TOKEN: Address = address!("1c7d4b196cb0c7b01d743fbc6116a902379c7238");
const SIGNER: Address = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");
const ALICE: Address = address!("70997970c51812dc3a010c7d01b50e0d17dc79c8");
const BOB: Address = address!("3c44cdddb6a900fa2b585dd299e03d12fa4293bc");

const APPROVAL_TX: TxHash =
    b256!("1111111111111111111111111111111111111111111111111111111111111111");
const BATCH_TX: TxHash =
    b256!("2222222222222222222222222222222222222222222222222222222222222222");

const ALICE_HEX: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";
const BOB_HEX: &str = "0x3c44cdddb6a900fa2b585dd299e03d12fa4293bc";
const TOKEN_HEX: &str = "0x1c7d4b196cb0c7b01d743fbc6116a902379c7238";

mock! {
    pub Gateway {}
    #[async_trait]
    impl ContractGateway for Gateway {
        fn signer_address(&self) -> Option<Address>;
        async fn token_decimals(&self, token: Address) -> gateway::Result<u8>;
        async fn approve(&self, token: Address, spender: Address, amount: Amount) -> gateway::Result<TxHash>;
        async fn batch_transfer_eth(
            &self,
            batch_contract: Address,
            recipients: Vec<Address>,
            amounts: Vec<Amount>,
            value: Amount,
        ) -> gateway::Result<TxHash>;
        async fn batch_transfer_erc20(
            &self,
            batch_contract: Address,
            token: Address,
            recipients: Vec<Address>,
            amounts: Vec<Amount>,
        ) -> gateway::Result<TxHash>;
    }
}

fn ether(units: u64) -> Amount {
    U256::from(units) * U256::from(10u64).pow(U256::from(18))
}

fn connected_gateway() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_signer_address().returning(|| Some(SIGNER));
    gateway
}

fn native_request(recipients: &str, amounts: &str) -> BatchPaymentRequest {
    BatchPaymentRequest::from_form(recipients, amounts, PaymentMode::Native)
}

fn token_request(recipients: &str, amounts: &str) -> BatchPaymentRequest {
    BatchPaymentRequest::from_form(
        recipients,
        amounts,
        PaymentMode::Token {
            token_address: TOKEN_HEX.to_string(),
        },
    )
}

#[tokio::test]
async fn native_batch_sends_the_total_as_value() -> Result<()> {
    let _log_guards = LogBuilder::init_single_threaded_tokio_test("submitter")?;
    let mut gateway = connected_gateway();
    gateway.expect_token_decimals().times(0);
    gateway.expect_approve().times(0);
    gateway
        .expect_batch_transfer_eth()
        .with(
            eq(BATCH_CONTRACT),
            eq(vec![ALICE, BOB]),
            eq(vec![ether(1), ether(2)]),
            eq(ether(3)),
        )
        .times(1)
        .returning(|_, _, _, _| Ok(BATCH_TX));

    let submitter = BatchPaymentSubmitter::new(gateway, BATCH_CONTRACT);
    let receipt = submitter
        .submit(&native_request(
            &format!("{ALICE_HEX}\n{BOB_HEX}"),
            "1\n2",
        ))
        .await?;

    assert_eq!(receipt.batch_tx, BATCH_TX);
    assert_eq!(receipt.approval_tx, None);
    assert_eq!(receipt.total, ether(3));
    assert_eq!(receipt.decimals, 18);
    assert_eq!(receipt.recipient_count, 2);
    assert_eq!(submitter.state(), SubmissionState::Success(receipt));
    Ok(())
}

#[tokio::test]
async fn decimal_amounts_are_summed_exactly() -> Result<()> {
    let mut gateway = connected_gateway();
    gateway
        .expect_batch_transfer_eth()
        .with(
            always(),
            always(),
            eq(vec![
                U256::from(100_000_000_000_000_000u64),
                U256::from(200_000_000_000_000_000u64),
            ]),
            eq(U256::from(300_000_000_000_000_000u64)),
        )
        .times(1)
        .returning(|_, _, _, _| Ok(BATCH_TX));

    let submitter = BatchPaymentSubmitter::new(gateway, BATCH_CONTRACT);
    let receipt = submitter
        .submit(&native_request(
            &format!("{ALICE_HEX}\n{BOB_HEX}"),
            "0.1\n0.2",
        ))
        .await?;

    assert_eq!(receipt.total, U256::from(300_000_000_000_000_000u64));
    Ok(())
}

#[tokio::test]
async fn token_batch_approves_the_total_before_the_batch_call() -> Result<()> {
    let _log_guards = LogBuilder::init_single_threaded_tokio_test("submitter")?;
    let mut gateway = connected_gateway();
    let mut seq = Sequence::new();
    gateway
        .expect_token_decimals()
        .with(eq(TOKEN))
        .times(1)
        .returning(|_| Ok(18))
        .in_sequence(&mut seq);
    gateway
        .expect_approve()
        .with(eq(TOKEN), eq(BATCH_CONTRACT), eq(ether(3)))
        .times(1)
        .returning(|_, _, _| Ok(APPROVAL_TX))
        .in_sequence(&mut seq);
    gateway
        .expect_batch_transfer_erc20()
        .with(
            eq(BATCH_CONTRACT),
            eq(TOKEN),
            eq(vec![ALICE, BOB]),
            eq(vec![ether(1), ether(2)]),
        )
        .times(1)
        .returning(|_, _, _, _| Ok(BATCH_TX))
        .in_sequence(&mut seq);
    gateway.expect_batch_transfer_eth().times(0);

    let submitter = BatchPaymentSubmitter::new(gateway, BATCH_CONTRACT);
    let receipt = submitter
        .submit(&token_request(&format!("{ALICE_HEX}\n{BOB_HEX}"), "1\n2"))
        .await?;

    assert_eq!(receipt.approval_tx, Some(APPROVAL_TX));
    assert_eq!(receipt.batch_tx, BATCH_TX);
    assert_eq!(receipt.total, ether(3));
    Ok(())
}

#[tokio::test]
async fn token_amounts_are_scaled_by_the_token_decimals() -> Result<()> {
    let mut gateway = connected_gateway();
    gateway.expect_token_decimals().returning(|_| Ok(6));
    gateway
        .expect_approve()
        .with(eq(TOKEN), eq(BATCH_CONTRACT), eq(U256::from(2_750_000u64)))
        .times(1)
        .returning(|_, _, _| Ok(APPROVAL_TX));
    gateway
        .expect_batch_transfer_erc20()
        .with(
            always(),
            always(),
            always(),
            eq(vec![U256::from(2_500_000u64), U256::from(250_000u64)]),
        )
        .times(1)
        .returning(|_, _, _, _| Ok(BATCH_TX));

    let submitter = BatchPaymentSubmitter::new(gateway, BATCH_CONTRACT);
    let receipt = submitter
        .submit(&token_request(&format!("{ALICE_HEX}\n{BOB_HEX}"), "2.5\n0.25"))
        .await?;

    assert_eq!(receipt.decimals, 6);
    Ok(())
}

#[tokio::test]
async fn failed_approval_never_issues_the_batch_call() -> Result<()> {
    let mut gateway = connected_gateway();
    gateway.expect_token_decimals().returning(|_| Ok(18));
    gateway
        .expect_approve()
        .times(1)
        .returning(|_, _, _| Err(gateway::Error::Rejected("user denied".to_string())));
    gateway.expect_batch_transfer_erc20().times(0);
    gateway.expect_batch_transfer_eth().times(0);

    let submitter = BatchPaymentSubmitter::new(gateway, BATCH_CONTRACT);
    let result = submitter
        .submit(&token_request(&format!("{ALICE_HEX}\n{BOB_HEX}"), "1\n2"))
        .await;

    assert_matches!(result, Err(SubmitError::ApprovalFailed(_)));
    assert_matches!(submitter.state(), SubmissionState::Failed(_));
    assert!(!submitter.is_submitting());
    Ok(())
}

#[tokio::test]
async fn failed_batch_call_after_approval_is_a_submission_failure() -> Result<()> {
    let mut gateway = connected_gateway();
    gateway.expect_token_decimals().returning(|_| Ok(18));
    gateway
        .expect_approve()
        .times(1)
        .returning(|_, _, _| Ok(APPROVAL_TX));
    gateway
        .expect_batch_transfer_erc20()
        .times(1)
        .returning(|_, _, _, _| Err(gateway::Error::Rejected("out of gas".to_string())));

    let submitter = BatchPaymentSubmitter::new(gateway, BATCH_CONTRACT);
    let result = submitter
        .submit(&token_request(ALICE_HEX, "1"))
        .await;

    assert_matches!(result, Err(SubmitError::SubmissionFailed(_)));
    Ok(())
}

#[tokio::test]
async fn unreadable_token_decimals_stop_before_any_transaction() -> Result<()> {
    let mut gateway = connected_gateway();
    gateway
        .expect_token_decimals()
        .times(1)
        .returning(|_| Err(gateway::Error::Rejected("not a token".to_string())));
    gateway.expect_approve().times(0);
    gateway.expect_batch_transfer_erc20().times(0);

    let submitter = BatchPaymentSubmitter::new(gateway, BATCH_CONTRACT);
    let result = submitter.submit(&token_request(ALICE_HEX, "1")).await;

    assert_matches!(
        result,
        Err(SubmitError::TokenDecimalsUnavailable { token, .. }) if token == TOKEN
    );
    Ok(())
}

#[tokio::test]
async fn missing_signer_is_provider_unavailable() -> Result<()> {
    let mut gateway = MockGateway::new();
    gateway.expect_signer_address().returning(|| None);
    gateway.expect_token_decimals().times(0);
    gateway.expect_approve().times(0);
    gateway.expect_batch_transfer_eth().times(0);
    gateway.expect_batch_transfer_erc20().times(0);

    let submitter = BatchPaymentSubmitter::new(gateway, BATCH_CONTRACT);
    let result = submitter.submit(&native_request(ALICE_HEX, "1")).await;

    assert_matches!(result, Err(SubmitError::ProviderUnavailable));
    Ok(())
}

fn gateway_expecting_no_calls() -> MockGateway {
    let mut gateway = connected_gateway();
    gateway.expect_token_decimals().times(0);
    gateway.expect_approve().times(0);
    gateway.expect_batch_transfer_eth().times(0);
    gateway.expect_batch_transfer_erc20().times(0);
    gateway
}

#[tokio::test]
async fn mismatched_lengths_are_rejected_before_any_call() -> Result<()> {
    let submitter = BatchPaymentSubmitter::new(gateway_expecting_no_calls(), BATCH_CONTRACT);

    let result = submitter
        .submit(&native_request(&format!("{ALICE_HEX}\n{BOB_HEX}"), "1"))
        .await;
    assert_matches!(result, Err(SubmitError::InvalidAmount(_)));

    let result = submitter
        .submit(&token_request(ALICE_HEX, "1\n2"))
        .await;
    assert_matches!(result, Err(SubmitError::InvalidAmount(_)));
    Ok(())
}

#[tokio::test]
async fn malformed_amount_is_rejected_before_any_call() -> Result<()> {
    let submitter = BatchPaymentSubmitter::new(gateway_expecting_no_calls(), BATCH_CONTRACT);

    let result = submitter.submit(&token_request(ALICE_HEX, "abc")).await;
    assert_matches!(result, Err(SubmitError::InvalidAmount(_)));

    let result = submitter.submit(&native_request(ALICE_HEX, "-1")).await;
    assert_matches!(result, Err(SubmitError::InvalidAmount(_)));
    Ok(())
}

#[tokio::test]
async fn invalid_addresses_are_rejected_before_any_call() -> Result<()> {
    let submitter = BatchPaymentSubmitter::new(gateway_expecting_no_calls(), BATCH_CONTRACT);

    let result = submitter.submit(&native_request("0x1234", "1")).await;
    assert_matches!(result, Err(SubmitError::InvalidAddress(_)));

    let request = BatchPaymentRequest::from_form(
        ALICE_HEX,
        "1",
        PaymentMode::Token {
            token_address: "not a token".to_string(),
        },
    );
    let result = submitter.submit(&request).await;
    assert_matches!(result, Err(SubmitError::InvalidAddress(_)));
    Ok(())
}

#[tokio::test]
async fn excess_fraction_digits_are_rejected_before_any_transaction() -> Result<()> {
    let mut gateway = connected_gateway();
    gateway.expect_token_decimals().returning(|_| Ok(6));
    gateway.expect_approve().times(0);
    gateway.expect_batch_transfer_erc20().times(0);

    let submitter = BatchPaymentSubmitter::new(gateway, BATCH_CONTRACT);
    let result = submitter
        .submit(&token_request(ALICE_HEX, "0.0000001"))
        .await;

    assert_matches!(result, Err(SubmitError::InvalidAmount(_)));
    Ok(())
}

#[tokio::test]
async fn state_moves_through_submitting_to_the_outcome() -> Result<()> {
    let mut gateway = connected_gateway();
    gateway
        .expect_batch_transfer_eth()
        .times(1)
        .returning(|_, _, _, _| Ok(BATCH_TX));

    let submitter = BatchPaymentSubmitter::new(gateway, BATCH_CONTRACT);
    let mut states = submitter.subscribe();
    assert_eq!(*states.borrow_and_update(), SubmissionState::Idle);

    let receipt = submitter.submit(&native_request(ALICE_HEX, "1")).await?;

    assert!(states.has_changed()?);
    assert_eq!(
        *states.borrow_and_update(),
        SubmissionState::Success(receipt)
    );
    assert!(!submitter.is_submitting());

    let result = submitter.submit(&native_request(ALICE_HEX, "abc")).await;
    assert_matches!(result, Err(SubmitError::InvalidAmount(_)));
    assert_matches!(*states.borrow_and_update(), SubmissionState::Failed(_));
    Ok(())
}

/// Holds the native batch call open until released, counting broadcasts.
struct PendingGateway {
    release: Notify,
    broadcasts: AtomicUsize,
}

#[async_trait]
impl ContractGateway for PendingGateway {
    fn signer_address(&self) -> Option<Address> {
        Some(SIGNER)
    }

    async fn token_decimals(&self, _token: Address) -> gateway::Result<u8> {
        Ok(18)
    }

    async fn approve(
        &self,
        _token: Address,
        _spender: Address,
        _amount: Amount,
    ) -> gateway::Result<TxHash> {
        Ok(APPROVAL_TX)
    }

    async fn batch_transfer_eth(
        &self,
        _batch_contract: Address,
        _recipients: Vec<Address>,
        _amounts: Vec<Amount>,
        _value: Amount,
    ) -> gateway::Result<TxHash> {
        self.release.notified().await;
        self.broadcasts.fetch_add(1, Ordering::SeqCst);
        Ok(BATCH_TX)
    }

    async fn batch_transfer_erc20(
        &self,
        _batch_contract: Address,
        _token: Address,
        _recipients: Vec<Address>,
        _amounts: Vec<Amount>,
    ) -> gateway::Result<TxHash> {
        Ok(BATCH_TX)
    }
}

#[tokio::test]
async fn second_submit_while_in_flight_is_refused() -> Result<()> {
    let _log_guards = LogBuilder::init_single_threaded_tokio_test("submitter")?;
    let gateway = PendingGateway {
        release: Notify::new(),
        broadcasts: AtomicUsize::new(0),
    };
    let submitter = BatchPaymentSubmitter::new(gateway, BATCH_CONTRACT);
    let request = native_request(ALICE_HEX, "1");

    let first = submitter.submit(&request);
    let second = async {
        tokio::task::yield_now().await;
        assert!(submitter.is_submitting());
        let result = submitter.submit(&request).await;
        submitter.gateway().release.notify_one();
        result
    };
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first?.batch_tx, BATCH_TX);
    assert_matches!(second, Err(SubmitError::AlreadySubmitting));
    assert_eq!(submitter.gateway().broadcasts.load(Ordering::SeqCst), 1);
    assert!(!submitter.is_submitting());

    // The flag is released, so the next submission goes through.
    submitter.gateway().release.notify_one();
    submitter.submit(&request).await?;
    assert_eq!(submitter.gateway().broadcasts.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn dropping_an_in_flight_submission_releases_the_flag() -> Result<()> {
    let gateway = PendingGateway {
        release: Notify::new(),
        broadcasts: AtomicUsize::new(0),
    };
    let submitter = BatchPaymentSubmitter::new(gateway, BATCH_CONTRACT);
    let request = native_request(ALICE_HEX, "1");

    let abandoned = tokio::time::timeout(
        std::time::Duration::from_millis(20),
        submitter.submit(&request),
    )
    .await;
    assert!(abandoned.is_err());

    assert!(!submitter.is_submitting());
    assert_matches!(submitter.state(), SubmissionState::Failed(_));
    assert_eq!(submitter.gateway().broadcasts.load(Ordering::SeqCst), 0);
    Ok(())
}

/// One account's view of a token: `approve` overwrites the allowance and
/// every batch spends from it, reverting when it falls short.
#[derive(Clone, Default)]
struct TokenAccount {
    allowance: Arc<Mutex<Amount>>,
    batch_started: Arc<Notify>,
    release: Arc<Notify>,
    spent: Arc<Mutex<Vec<Amount>>>,
}

impl TokenAccount {
    fn allowance(&self) -> Amount {
        *self.allowance.lock().expect("allowance lock")
    }
}

#[async_trait]
impl ContractGateway for TokenAccount {
    fn signer_address(&self) -> Option<Address> {
        Some(SIGNER)
    }

    async fn token_decimals(&self, _token: Address) -> gateway::Result<u8> {
        Ok(0)
    }

    async fn approve(
        &self,
        _token: Address,
        _spender: Address,
        amount: Amount,
    ) -> gateway::Result<TxHash> {
        *self.allowance.lock().expect("allowance lock") = amount;
        Ok(APPROVAL_TX)
    }

    async fn batch_transfer_eth(
        &self,
        _batch_contract: Address,
        _recipients: Vec<Address>,
        _amounts: Vec<Amount>,
        _value: Amount,
    ) -> gateway::Result<TxHash> {
        Ok(BATCH_TX)
    }

    async fn batch_transfer_erc20(
        &self,
        _batch_contract: Address,
        _token: Address,
        _recipients: Vec<Address>,
        amounts: Vec<Amount>,
    ) -> gateway::Result<TxHash> {
        self.batch_started.notify_one();
        self.release.notified().await;

        let needed = amounts.iter().fold(Amount::ZERO, |total, amount| total + *amount);
        let mut allowance = self.allowance.lock().expect("allowance lock");
        if *allowance < needed {
            return Err(gateway::Error::Rejected(format!(
                "allowance {allowance} below {needed}"
            )));
        }
        *allowance -= needed;
        self.spent.lock().expect("spent lock").push(needed);
        Ok(BATCH_TX)
    }
}

#[tokio::test]
async fn submitters_sharing_an_account_never_overwrite_each_others_allowance() -> Result<()> {
    let account = TokenAccount::default();
    let lock = SubmissionLock::new();
    let large = BatchPaymentSubmitter::with_lock(account.clone(), BATCH_CONTRACT, lock.clone());
    let small = BatchPaymentSubmitter::with_lock(account.clone(), BATCH_CONTRACT, lock);

    let large_request = token_request(ALICE_HEX, "100");
    let small_request = token_request(BOB_HEX, "5");

    // `small` tries to approve while `large` sits between its approval and
    // its batch call.
    let first = large.submit(&large_request);
    let second = async {
        account.batch_started.notified().await;
        assert_eq!(account.allowance(), U256::from(100u64));
        let result = small.submit(&small_request).await;
        account.release.notify_one();
        result
    };
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first?.total, U256::from(100u64));
    assert_matches!(second, Err(SubmitError::AlreadySubmitting));
    assert_eq!(*account.spent.lock().expect("spent lock"), vec![U256::from(100u64)]);
    assert_eq!(account.allowance(), Amount::ZERO);

    // Once released the other submitter gets its turn.
    account.release.notify_one();
    let receipt = small.submit(&small_request).await?;
    assert_eq!(receipt.total, U256::from(5u64));
    assert_eq!(
        *account.spent.lock().expect("spent lock"),
        vec![U256::from(100u64), U256::from(5u64)]
    );
    Ok(())
}

#[tokio::test]
async fn separate_locks_let_one_account_race_its_allowance() -> Result<()> {
    let account = TokenAccount::default();
    let large = BatchPaymentSubmitter::new(account.clone(), BATCH_CONTRACT);
    let small = BatchPaymentSubmitter::new(account.clone(), BATCH_CONTRACT);

    let large_request = token_request(ALICE_HEX, "100");
    let small_request = token_request(BOB_HEX, "5");

    let first = large.submit(&large_request);
    let second = async {
        account.batch_started.notified().await;
        // One wakes `large`, the other lets `small` straight through after it
        // overwrote the allowance `large` is about to spend.
        account.release.notify_one();
        account.release.notify_one();
        small.submit(&small_request).await
    };
    let (first, second) = tokio::join!(first, second);

    assert_matches!(first, Err(SubmitError::SubmissionFailed(_)));
    assert_eq!(second?.total, U256::from(5u64));
    Ok(())
}
