//! Submission of signed transactions and bounded confirmation polling.
//!
//! Submissions are never retried here: resubmitting is not idempotent, so
//! the caller decides. [`await_confirmation`] is the only retry loop in the
//! crate and always stops after `max_attempts` lookups.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::{ClientError, Result};
use crate::rpc::{ChainGateway, PendingTxn};

pub const DEFAULT_CONFIRM_ATTEMPTS: u32 = 15;
pub const DEFAULT_CONFIRM_INTERVAL: Duration = Duration::from_millis(2000);

/// A signed transaction as returned by a wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedBlob(Vec<u8>);

impl SignedBlob {
    pub fn new(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(ClientError::InvalidInput(
                "signed transaction must not be empty".to_string(),
            ));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_CONFIRM_ATTEMPTS,
            interval: DEFAULT_CONFIRM_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Confirmation {
    Confirmed {
        round: Option<u64>,
        app_id: Option<u64>,
    },
    /// Attempts ran out before a terminal field appeared. The transaction
    /// may still confirm; poll again if needed.
    Pending { attempts: u32 },
    /// The node dropped the transaction from its pool.
    Rejected { reason: String },
}

impl Confirmation {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }

    pub fn app_id(&self) -> Option<u64> {
        match self {
            Self::Confirmed { app_id, .. } => *app_id,
            _ => None,
        }
    }

    fn from_pending(pending: &PendingTxn) -> Option<Self> {
        if let Some(reason) = pending.pool_error.as_deref().filter(|e| !e.is_empty()) {
            return Some(Self::Rejected {
                reason: reason.to_string(),
            });
        }
        let round = pending.confirmed_round.filter(|r| *r > 0);
        let app_id = pending.application_index.filter(|id| *id > 0);
        if round.is_some() || app_id.is_some() {
            return Some(Self::Confirmed { round, app_id });
        }
        None
    }
}

/// Concatenate signed transactions, in order, into one group payload.
pub fn combine(blobs: &[SignedBlob]) -> Result<Vec<u8>> {
    if blobs.is_empty() {
        return Err(ClientError::InvalidInput(
            "at least one signed transaction is required".to_string(),
        ));
    }
    let total = blobs.iter().map(SignedBlob::len).sum();
    let mut payload = Vec::with_capacity(total);
    for blob in blobs {
        payload.extend_from_slice(blob.as_bytes());
    }
    Ok(payload)
}

/// Transmit a payload and return the transaction id reported upstream.
pub async fn submit<G: ChainGateway + ?Sized>(gateway: &G, payload: &[u8]) -> Result<String> {
    if payload.is_empty() {
        return Err(ClientError::InvalidInput("empty submission payload".to_string()));
    }
    match gateway.send_raw_transaction(payload).await {
        Ok(tx_id) => {
            info!("Submitted transaction {tx_id}");
            Ok(tx_id)
        }
        Err(e) => {
            if let ClientError::Submission { status, .. } = &e {
                warn!(
                    "Submission rejected with HTTP {status} ({})",
                    if e.is_retryable() { "retryable" } else { "caller must fix" }
                );
            }
            Err(e)
        }
    }
}

pub async fn submit_group<G: ChainGateway + ?Sized>(
    gateway: &G,
    blobs: &[SignedBlob],
) -> Result<String> {
    let payload = combine(blobs)?;
    submit(gateway, &payload).await
}

/// Poll the pending-transaction lookup until a terminal field appears or
/// `policy.max_attempts` lookups have been made.
pub async fn await_confirmation<G: ChainGateway + ?Sized>(
    gateway: &G,
    tx_id: &str,
    policy: ConfirmationPolicy,
) -> Result<Confirmation> {
    for attempt in 1..=policy.max_attempts {
        let pending = gateway.pending_transaction(tx_id).await?;
        if let Some(done) = Confirmation::from_pending(&pending) {
            info!("Transaction {tx_id} settled after {attempt} lookup(s): {done:?}");
            return Ok(done);
        }
        debug!("Transaction {tx_id} still pending ({attempt}/{})", policy.max_attempts);
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }
    warn!(
        "Transaction {tx_id} not confirmed after {} lookups",
        policy.max_attempts
    );
    Ok(Confirmation::Pending {
        attempts: policy.max_attempts,
    })
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockGateway;

    fn blob(bytes: &[u8]) -> SignedBlob {
        SignedBlob::new(bytes.to_vec()).unwrap()
    }

    #[test]
    fn combine_preserves_order_and_length() {
        let blobs = vec![blob(&[1, 2, 3]), blob(&[4]), blob(&[5, 6])];
        let payload = combine(&blobs).unwrap();
        assert_eq!(payload, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(payload.len(), blobs.iter().map(SignedBlob::len).sum::<usize>());
    }

    #[tokio::test]
    async fn empty_group_fails_before_any_network_call() {
        let gateway = MockGateway::default();
        let err = submit_group(&gateway, &[]).await.unwrap_err();
        assert!(err.is_caller_input());
        assert_eq!(gateway.submissions(), 0);
    }

    #[test]
    fn empty_blob_is_rejected() {
        assert!(SignedBlob::new(Vec::new()).is_err());
    }

    #[tokio::test]
    async fn submit_returns_upstream_tx_id() {
        let gateway = MockGateway::default();
        let tx_id = submit_group(&gateway, &[blob(&[9, 9])]).await.unwrap();
        assert_eq!(tx_id, "TX-1");
        assert_eq!(gateway.submitted_payloads(), vec![vec![9, 9]]);
    }

    #[tokio::test]
    async fn submission_errors_surface_verbatim() {
        let gateway = MockGateway::default();
        gateway.reject_submissions(400, r#"{"message":"overspend"}"#);
        let err = submit(&gateway, &[1]).await.unwrap_err();
        match err {
            ClientError::Submission { status, ref body } => {
                assert_eq!(status, 400);
                assert_eq!(body, r#"{"message":"overspend"}"#);
                assert!(!err.is_retryable());
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_polling_is_pending_not_an_error() {
        let gateway = MockGateway::default();
        let started = tokio::time::Instant::now();
        let result = await_confirmation(
            &gateway,
            "TX-1",
            ConfirmationPolicy {
                max_attempts: 15,
                interval: Duration::from_millis(2000),
            },
        )
        .await
        .unwrap();
        assert_eq!(result, Confirmation::Pending { attempts: 15 });
        assert_eq!(gateway.pending_lookups(), 15);
        // 14 sleeps between 15 lookups
        assert_eq!(started.elapsed(), Duration::from_millis(28_000));
    }

    #[tokio::test(start_paused = true)]
    async fn first_terminal_response_wins() {
        let gateway = MockGateway::default();
        gateway.queue_pending(PendingTxn::default());
        gateway.queue_pending(PendingTxn {
            confirmed_round: Some(812),
            application_index: Some(4321),
            pool_error: Some(String::new()),
        });
        let result = await_confirmation(&gateway, "TX-1", ConfirmationPolicy::default())
            .await
            .unwrap();
        assert_eq!(result.app_id(), Some(4321));
        assert!(result.is_confirmed());
        assert_eq!(gateway.pending_lookups(), 2);
    }

    #[tokio::test]
    async fn pool_error_is_a_rejection() {
        let gateway = MockGateway::default();
        gateway.queue_pending(PendingTxn {
            pool_error: Some("logic eval error".into()),
            ..Default::default()
        });
        let result = await_confirmation(&gateway, "TX-1", ConfirmationPolicy::default())
            .await
            .unwrap();
        assert_eq!(
            result,
            Confirmation::Rejected {
                reason: "logic eval error".into()
            }
        );
    }
}
