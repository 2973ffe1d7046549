//! Submission and confirmation.
//!
//! One send with preflight enabled, then a bounded status-polling loop.
//! Nothing here retries: a retry with the same blockhash could
//! double-submit, and re-pricing after blockhash expiry is the caller's
//! decision.

use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;

use crate::chain::{ChainRpc, SignatureStatus};
use crate::error::{ChainError, SwapError};
use crate::network::Config;

/// Terminal state of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitStatus {
    Confirmed,
    /// Landed on chain and failed.
    Failed(String),
    /// Blockhash expired before the transaction confirmed.
    Expired,
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub signature: Signature,
    pub status: SubmitStatus,
    pub explorer_url: String,
}

pub fn explorer_url(signature: &Signature) -> String {
    format!("https://solscan.io/tx/{signature}")
}

/// Send the signed transaction and poll until a terminal state.
///
/// `input_label` names the input token in insufficient-funds messages.
pub async fn submit(
    chain: &dyn ChainRpc,
    tx: &VersionedTransaction,
    cfg: &Config,
    input_label: &str,
) -> Result<SubmitOutcome, SwapError> {
    let signature = match chain.send_transaction(tx).await {
        Ok(signature) => signature,
        Err(ChainError::Preflight { message }) => {
            return Err(classify_failure(&message, input_label));
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(%signature, "transaction sent, awaiting confirmation");

    let blockhash = *tx.message.recent_blockhash();
    let deadline = tokio::time::Instant::now() + cfg.confirm_timeout;

    loop {
        match chain.get_signature_status(&signature).await? {
            SignatureStatus::Confirmed | SignatureStatus::Finalized => {
                return Ok(SubmitOutcome {
                    signature,
                    status: SubmitStatus::Confirmed,
                    explorer_url: explorer_url(&signature),
                });
            }
            SignatureStatus::Failed(reason) => {
                if let SwapError::SlippageExceeded = classify_failure(&reason, input_label) {
                    return Err(SwapError::SlippageExceeded);
                }
                return Ok(SubmitOutcome {
                    signature,
                    status: SubmitStatus::Failed(reason),
                    explorer_url: explorer_url(&signature),
                });
            }
            SignatureStatus::Unknown => {
                // Not seen: if its blockhash is gone, it can never land.
                if !chain.is_blockhash_valid(&blockhash).await? {
                    return Ok(SubmitOutcome {
                        signature,
                        status: SubmitStatus::Expired,
                        explorer_url: explorer_url(&signature),
                    });
                }
            }
            SignatureStatus::Processed => {}
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(SwapError::ConfirmationTimeout {
                signature: signature.to_string(),
            });
        }
        tokio::time::sleep(cfg.confirm_poll_interval).await;
    }
}

/// Map an RPC failure reason onto the user-facing taxonomy.
fn classify_failure(message: &str, input_label: &str) -> SwapError {
    let lower = message.to_lowercase();
    if lower.contains("insufficient") {
        return SwapError::InsufficientFunds {
            token: input_label.to_string(),
        };
    }
    // 0x1771 (6001) is the conventional slippage-exceeded custom error.
    if lower.contains("slippage") || lower.contains("0x1771") || lower.contains("6001") {
        return SwapError::SlippageExceeded;
    }
    if lower.contains("accountnotfound")
        || lower.contains("account not found")
        || lower.contains("could not find account")
    {
        return SwapError::AccountNotFound(message.to_string());
    }
    SwapError::SimulationFailed(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::testing::{MockChain, SendScript};
    use solana_sdk::hash::Hash;
    use solana_sdk::message::{v0, VersionedMessage};
    use solana_sdk::signature::{Keypair, Signer};

    fn test_config() -> Config {
        let mut cfg = Config::with_token("t".to_string());
        cfg.confirm_poll_interval = std::time::Duration::from_millis(1);
        cfg.confirm_timeout = std::time::Duration::from_millis(50);
        cfg
    }

    fn signed_transaction() -> VersionedTransaction {
        let payer = Keypair::new();
        let ix = solana_sdk::system_instruction::transfer(
            &payer.pubkey(),
            &solana_sdk::pubkey::Pubkey::new_unique(),
            1,
        );
        let message =
            v0::Message::try_compile(&payer.pubkey(), &[ix], &[], Hash::new_unique()).unwrap();
        VersionedTransaction::try_new(VersionedMessage::V0(message), &[&payer]).unwrap()
    }

    #[tokio::test]
    async fn test_confirmed_outcome() {
        let chain = MockChain::new();
        chain.script_statuses([SignatureStatus::Processed, SignatureStatus::Confirmed]);
        let tx = signed_transaction();

        let outcome = submit(&chain, &tx, &test_config(), "SOL").await.unwrap();
        assert_eq!(outcome.status, SubmitStatus::Confirmed);
        assert_eq!(outcome.signature, tx.signatures[0]);
        assert!(outcome.explorer_url.contains("solscan.io/tx/"));
    }

    #[tokio::test]
    async fn test_preflight_slippage_short_circuits() {
        let chain = MockChain::new();
        chain.script_send(SendScript::PreflightFailure(
            "custom program error: 0x1771".to_string(),
        ));
        let tx = signed_transaction();

        let err = submit(&chain, &tx, &test_config(), "SOL").await.unwrap_err();
        assert!(matches!(err, SwapError::SlippageExceeded));
        assert!(chain.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_preflight_insufficient_funds_names_token() {
        let chain = MockChain::new();
        chain.script_send(SendScript::PreflightFailure(
            "Transfer: insufficient lamports".to_string(),
        ));
        let tx = signed_transaction();

        match submit(&chain, &tx, &test_config(), "USDC").await.unwrap_err() {
            SwapError::InsufficientFunds { token } => assert_eq!(token, "USDC"),
            other => panic!("expected InsufficientFunds, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_preflight_catch_all_is_simulation_failed() {
        let chain = MockChain::new();
        chain.script_send(SendScript::PreflightFailure(
            "Program failed: custom program error: 0x0".to_string(),
        ));
        let tx = signed_transaction();

        assert!(matches!(
            submit(&chain, &tx, &test_config(), "SOL").await.unwrap_err(),
            SwapError::SimulationFailed(_)
        ));
    }

    #[tokio::test]
    async fn test_expired_blockhash_is_terminal() {
        let chain = MockChain::new();
        chain.script_statuses([SignatureStatus::Unknown]);
        chain.invalidate_blockhash();
        let tx = signed_transaction();

        let outcome = submit(&chain, &tx, &test_config(), "SOL").await.unwrap();
        assert_eq!(outcome.status, SubmitStatus::Expired);
    }

    #[tokio::test]
    async fn test_poll_budget_exhaustion_is_timeout() {
        let chain = MockChain::new();
        chain.script_statuses([SignatureStatus::Unknown]);
        let tx = signed_transaction();

        let err = submit(&chain, &tx, &test_config(), "SOL").await.unwrap_err();
        assert!(matches!(err, SwapError::ConfirmationTimeout { .. }));
    }

    #[tokio::test]
    async fn test_on_chain_failure_reported() {
        let chain = MockChain::new();
        chain.script_statuses([SignatureStatus::Failed("custom program error: 0x5".to_string())]);
        let tx = signed_transaction();

        let outcome = submit(&chain, &tx, &test_config(), "SOL").await.unwrap();
        assert!(matches!(outcome.status, SubmitStatus::Failed(_)));
    }

    #[tokio::test]
    async fn test_on_chain_slippage_classified() {
        let chain = MockChain::new();
        chain.script_statuses([SignatureStatus::Failed("SlippageToleranceExceeded".to_string())]);
        let tx = signed_transaction();

        let err = submit(&chain, &tx, &test_config(), "SOL").await.unwrap_err();
        assert!(matches!(err, SwapError::SlippageExceeded));
    }

    #[test]
    fn test_classification_table() {
        assert!(matches!(
            classify_failure("Attempt to debit an account but found no record", "SOL"),
            SwapError::SimulationFailed(_)
        ));
        assert!(matches!(
            classify_failure("AccountNotFound", "SOL"),
            SwapError::AccountNotFound(_)
        ));
        assert!(matches!(
            classify_failure("slippage tolerance exceeded", "SOL"),
            SwapError::SlippageExceeded
        ));
    }
}
