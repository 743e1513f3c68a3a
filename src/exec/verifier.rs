//! Cross-chain finality verification.
//!
//! Polls the attestation boundary until it has proof either way or the
//! timeout lapses. A timeout is its own result: the orchestrator decides
//! whether to re-poll or treat the leg as indeterminate, and a timeout is
//! never silently reinterpreted as success or failure.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::boundary::{AttestationSource, FinalityStatus, TxRef};

/// Outcome of one bounded verification attempt.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum VerificationResult {
    /// The transaction reached finality on its origin chain
    Confirmed,
    /// The attestation source proved the transaction will not settle
    Rejected(String),
    /// No proof either way within the timeout
    TimedOut,
}

/// Polls an [`AttestationSource`] for finality proofs.
pub struct Verifier {
    /// The attestation boundary
    source: Arc<dyn AttestationSource>,
    /// Delay between polls within one attempt
    poll_interval: Duration,
}

impl Verifier {
    /// Creates a verifier polling `source` every `poll_interval`.
    #[must_use]
    pub fn new(source: Arc<dyn AttestationSource>, poll_interval: Duration) -> Self {
        Self {
            source,
            poll_interval,
        }
    }

    /// Polls for proof of `tx`'s finality for at most `timeout`.
    ///
    /// Transient attestation-source errors are logged and count as still
    /// pending; only an explicit rejection proof produces `Rejected`.
    pub async fn verify(&self, tx: &TxRef, timeout: Duration) -> VerificationResult {
        let poll = async {
            loop {
                match self.source.finality_status(tx).await {
                    Ok(FinalityStatus::Finalized) => {
                        debug!("verifier: {tx} finalized");
                        return VerificationResult::Confirmed;
                    }
                    Ok(FinalityStatus::Rejected(reason)) => {
                        debug!("verifier: {tx} rejected: {reason}");
                        return VerificationResult::Rejected(reason);
                    }
                    Ok(FinalityStatus::Pending) => {}
                    Err(e) => warn!("verifier: attestation poll for {tx} failed: {e}"),
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };

        (tokio::time::timeout(timeout, poll).await).unwrap_or(VerificationResult::TimedOut)
    }
}
