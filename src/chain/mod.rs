//! Chain access: the RPC seam, ALT loading, transaction assembly and
//! submission.
//!
//! All chain access goes through the [`ChainRpc`] trait so the assembler
//! and submitter can run against a scripted mock. The production
//! implementation wraps `solana-client`'s nonblocking RPC with the
//! configured per-call deadline; the client serializes its own use and is
//! shared process-wide.

pub mod alt;
pub mod assemble;
pub mod submit;

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use solana_transaction_status::{TransactionConfirmationStatus, UiTransactionEncoding};

use crate::error::ChainError;
use crate::network::Config;

/// Confirmation state of a submitted signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    /// Not seen by the cluster yet.
    Unknown,
    /// Landed but below the configured commitment.
    Processed,
    Confirmed,
    Finalized,
    /// Landed and failed on chain.
    Failed(String),
}

/// The chain RPC surface the core consumes.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Raw account data, or `None` if the account does not exist.
    async fn get_account_data(&self, pubkey: &Pubkey) -> Result<Option<Vec<u8>>, ChainError>;

    async fn get_latest_blockhash(&self) -> Result<Hash, ChainError>;

    /// Send with preflight simulation enabled. Preflight rejections come
    /// back as [`ChainError::Preflight`].
    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, ChainError>;

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<SignatureStatus, ChainError>;

    async fn is_blockhash_valid(&self, blockhash: &Hash) -> Result<bool, ChainError>;
}

/// Production implementation over `solana-client`.
pub struct RpcChain {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl RpcChain {
    pub fn new(cfg: &Config) -> Self {
        let commitment = CommitmentConfig::confirmed();
        Self {
            client: RpcClient::new_with_timeout_and_commitment(
                cfg.rpc_url.clone(),
                cfg.rpc_timeout,
                commitment,
            ),
            commitment,
        }
    }
}

#[async_trait]
impl ChainRpc for RpcChain {
    async fn get_account_data(&self, pubkey: &Pubkey) -> Result<Option<Vec<u8>>, ChainError> {
        let response = self
            .client
            .get_account_with_commitment(pubkey, self.commitment)
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        Ok(response.value.map(|account| account.data))
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, ChainError> {
        self.client
            .get_latest_blockhash()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }

    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, ChainError> {
        self.client
            .send_transaction_with_config(
                tx,
                RpcSendTransactionConfig {
                    skip_preflight: false,
                    preflight_commitment: Some(CommitmentLevel::Confirmed),
                    encoding: Some(UiTransactionEncoding::Base64),
                    max_retries: Some(0),
                    min_context_slot: None,
                },
            )
            .await
            .map_err(classify_send_error)
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<SignatureStatus, ChainError> {
        let response = self
            .client
            .get_signature_statuses(&[*signature])
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        let Some(Some(status)) = response.value.into_iter().next() else {
            return Ok(SignatureStatus::Unknown);
        };
        if let Some(err) = status.err {
            return Ok(SignatureStatus::Failed(err.to_string()));
        }
        Ok(match status.confirmation_status {
            Some(TransactionConfirmationStatus::Finalized) => SignatureStatus::Finalized,
            Some(TransactionConfirmationStatus::Confirmed) => SignatureStatus::Confirmed,
            _ => SignatureStatus::Processed,
        })
    }

    async fn is_blockhash_valid(&self, blockhash: &Hash) -> Result<bool, ChainError> {
        self.client
            .is_blockhash_valid(blockhash, self.commitment)
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }
}

fn classify_send_error(error: solana_client::client_error::ClientError) -> ChainError {
    use solana_client::client_error::ClientErrorKind;
    use solana_client::rpc_request::{RpcError, RpcResponseErrorData};

    if let ClientErrorKind::RpcError(RpcError::RpcResponseError {
        data: RpcResponseErrorData::SendTransactionPreflightFailure(sim),
        message,
        ..
    }) = error.kind()
    {
        let mut reason = match &sim.err {
            Some(tx_err) => tx_err.to_string(),
            None => message.clone(),
        };
        if let Some(logs) = &sim.logs {
            if !logs.is_empty() {
                reason = format!("{reason}; {}", logs.join(" | "));
            }
        }
        return ChainError::Preflight { message: reason };
    }
    ChainError::Rpc(error.to_string())
}

// ─── Scripted mock for tests ─────────────────────────────────────────────────

/// A scripted chain used by unit and scenario tests.
pub mod testing {
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// What the mock does on `send_transaction`.
    #[derive(Debug, Clone)]
    pub enum SendScript {
        Accept,
        PreflightFailure(String),
        RpcFailure(String),
    }

    #[derive(Default)]
    pub struct MockChain {
        accounts: Mutex<HashMap<Pubkey, Vec<u8>>>,
        blockhash: Mutex<Hash>,
        send_script: Mutex<Option<SendScript>>,
        statuses: Mutex<VecDeque<SignatureStatus>>,
        blockhash_valid: AtomicBool,
        account_fetch_fails: AtomicBool,
        sent: Mutex<Vec<VersionedTransaction>>,
    }

    impl MockChain {
        pub fn new() -> Self {
            let mock = Self::default();
            mock.blockhash_valid.store(true, Ordering::SeqCst);
            *mock.blockhash.lock().unwrap() = Hash::new_unique();
            mock
        }

        pub fn put_account(&self, pubkey: Pubkey, data: Vec<u8>) {
            self.accounts.lock().unwrap().insert(pubkey, data);
        }

        /// Make every `get_account_data` call fail at the RPC layer.
        pub fn fail_account_fetches(&self) {
            self.account_fetch_fails.store(true, Ordering::SeqCst);
        }

        pub fn script_send(&self, script: SendScript) {
            *self.send_script.lock().unwrap() = Some(script);
        }

        /// Queue statuses returned by successive polls; the last one
        /// repeats.
        pub fn script_statuses(&self, statuses: impl IntoIterator<Item = SignatureStatus>) {
            *self.statuses.lock().unwrap() = statuses.into_iter().collect();
        }

        pub fn invalidate_blockhash(&self) {
            self.blockhash_valid.store(false, Ordering::SeqCst);
        }

        pub fn sent_transactions(&self) -> Vec<VersionedTransaction> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChainRpc for MockChain {
        async fn get_account_data(&self, pubkey: &Pubkey) -> Result<Option<Vec<u8>>, ChainError> {
            if self.account_fetch_fails.load(Ordering::SeqCst) {
                return Err(ChainError::Rpc("mock account fetch failure".to_string()));
            }
            Ok(self.accounts.lock().unwrap().get(pubkey).cloned())
        }

        async fn get_latest_blockhash(&self) -> Result<Hash, ChainError> {
            Ok(*self.blockhash.lock().unwrap())
        }

        async fn send_transaction(
            &self,
            tx: &VersionedTransaction,
        ) -> Result<Signature, ChainError> {
            let script = self
                .send_script
                .lock()
                .unwrap()
                .clone()
                .unwrap_or(SendScript::Accept);
            match script {
                SendScript::Accept => {
                    self.sent.lock().unwrap().push(tx.clone());
                    Ok(tx.signatures[0])
                }
                SendScript::PreflightFailure(message) => Err(ChainError::Preflight { message }),
                SendScript::RpcFailure(message) => Err(ChainError::Rpc(message)),
            }
        }

        async fn get_signature_status(
            &self,
            _signature: &Signature,
        ) -> Result<SignatureStatus, ChainError> {
            let mut queue = self.statuses.lock().unwrap();
            if queue.len() > 1 {
                Ok(queue.pop_front().unwrap_or(SignatureStatus::Unknown))
            } else {
                Ok(queue.front().cloned().unwrap_or(SignatureStatus::Unknown))
            }
        }

        async fn is_blockhash_valid(&self, _blockhash: &Hash) -> Result<bool, ChainError> {
            Ok(self.blockhash_valid.load(Ordering::SeqCst))
        }
    }
}
