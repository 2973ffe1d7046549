//! Transaction assembly: delegation enforcement, signing, size discipline.
//!
//! Given the winning quote and an in-session delegation, produce a signed
//! versioned transaction that fits the 1232-byte wire ceiling. Prebuilt
//! payloads are re-signed as-is; instruction payloads are compiled into a
//! v0 message against the quote's address lookup tables, which is where
//! the account-key compression happens.
//!
//! Every refusal path returns before the signer is touched.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use solana_sdk::message::{v0, VersionedMessage};
use solana_sdk::packet::PACKET_DATA_SIZE;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::VersionedTransaction;
use zeroize::Zeroize;

use crate::chain::{alt, ChainRpc};
use crate::error::{DelegationRefusal, SwapError};
use crate::quotes::{Quote, QuoteExecution};
use crate::shared::scaling::{to_base_units, ScalingError};
use crate::tokens::TokenInfo;

/// Program label the delegation must allow for swaps.
pub const SWAP_PROGRAM_LABEL: &str = "Titan";

/// The delegate keypair, scoped to one swap. The secret-bytes copy used to
/// construct it is wiped immediately; the signer itself drops with the
/// delegation at the end of the swap.
pub struct DelegateSigner {
    keypair: Keypair,
}

impl std::fmt::Debug for DelegateSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegateSigner").finish_non_exhaustive()
    }
}

impl DelegateSigner {
    /// Build from the decrypted 64-byte secret key. The caller's buffer is
    /// zeroized before returning, on success and failure alike.
    pub fn from_secret_bytes(secret: &mut [u8; 64]) -> Result<Self, SwapError> {
        let keypair = Keypair::from_bytes(secret.as_ref())
            .map_err(|_| SwapError::DelegationInvalid(DelegationRefusal::MalformedKey));
        secret.zeroize();
        Ok(Self { keypair: keypair? })
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

/// A time-bounded, capped authorization to sign on the user's behalf.
/// Created outside the core; consumed read-only.
pub struct Delegation {
    pub delegate: DelegateSigner,
    pub allowed_programs: HashSet<String>,
    /// Cap in human SOL when the input is wrapped-native SOL.
    pub max_sol_per_tx: Decimal,
    /// Cap in human input-token units otherwise.
    pub max_token_per_tx: Decimal,
    pub expires_at: DateTime<Utc>,
}

/// Assemble and sign a transaction for the winning quote.
pub async fn assemble(
    chain: &dyn ChainRpc,
    delegation: &Delegation,
    input: &TokenInfo,
    quote: &Quote,
) -> Result<VersionedTransaction, SwapError> {
    precheck(delegation, input, quote.in_amount, Utc::now())?;

    let tx = match &quote.execution {
        QuoteExecution::Prebuilt { transaction } => {
            sign_prebuilt(delegation, transaction)?
        }
        QuoteExecution::Instructions {
            instructions,
            lookup_tables,
        } => {
            let tables = alt::load_lookup_tables(chain, lookup_tables).await?;
            let blockhash = chain.get_latest_blockhash().await?;
            let message = v0::Message::try_compile(
                &delegation.delegate.pubkey(),
                instructions,
                &tables,
                blockhash,
            )
            .map_err(|e| SwapError::SimulationFailed(format!("message compilation: {e}")))?;
            VersionedTransaction::try_new(VersionedMessage::V0(message), &[
                &delegation.delegate.keypair,
            ])
            .map_err(|_| SwapError::DelegationInvalid(DelegationRefusal::SignerMismatch))?
        }
    };

    check_size(&tx)?;
    Ok(tx)
}

/// Delegation enforcement. Runs before any signer invocation.
fn precheck(
    delegation: &Delegation,
    input: &TokenInfo,
    input_amount: u64,
    now: DateTime<Utc>,
) -> Result<(), SwapError> {
    if now >= delegation.expires_at {
        return Err(SwapError::DelegationInvalid(DelegationRefusal::Expired));
    }
    if !delegation.allowed_programs.contains(SWAP_PROGRAM_LABEL) {
        return Err(SwapError::DelegationInvalid(
            DelegationRefusal::ProgramNotAllowed,
        ));
    }

    let (cap_human, cap_decimals, unit) = if input.is_wrapped_sol() {
        (delegation.max_sol_per_tx, 9u8, "SOL".to_string())
    } else {
        (delegation.max_token_per_tx, input.decimals, input.label())
    };
    let cap_units = cap_in_base_units(cap_human, cap_decimals);
    if input_amount > cap_units {
        return Err(SwapError::DelegationInvalid(DelegationRefusal::OverCap {
            cap: format!("{cap_human} {unit}"),
            requested: format!(
                "{} {unit}",
                crate::shared::scaling::from_base_units(input_amount, cap_decimals)
            ),
        }));
    }
    Ok(())
}

fn cap_in_base_units(cap: Decimal, decimals: u8) -> u64 {
    if cap <= Decimal::ZERO {
        return 0;
    }
    match to_base_units(cap, decimals) {
        Ok(units) => units,
        Err(ScalingError::ZeroAmount(_)) => 0,
        // A cap too large to scale is effectively unlimited.
        Err(_) => u64::MAX,
    }
}

/// Path A: take the server-built transaction and substitute the delegate's
/// signature. No attempt is made to shrink an oversized payload.
fn sign_prebuilt(
    delegation: &Delegation,
    transaction_bytes: &[u8],
) -> Result<VersionedTransaction, SwapError> {
    let mut tx: VersionedTransaction = bincode::deserialize(transaction_bytes)
        .map_err(|e| crate::error::WireError::decode("prebuilt transaction", e))?;

    let num_required = tx.message.header().num_required_signatures as usize;
    let signer_keys = &tx.message.static_account_keys()[..num_required.min(
        tx.message.static_account_keys().len(),
    )];
    let position = signer_keys
        .iter()
        .position(|key| *key == delegation.delegate.pubkey())
        .ok_or(SwapError::DelegationInvalid(
            DelegationRefusal::SignerMismatch,
        ))?;

    let message_bytes = tx.message.serialize();
    let signature = delegation.delegate.keypair.sign_message(&message_bytes);

    tx.signatures
        .resize(num_required, solana_sdk::signature::Signature::default());
    tx.signatures[position] = signature;
    Ok(tx)
}

/// Enforce the wire ceiling, with account-count diagnostics on failure.
fn check_size(tx: &VersionedTransaction) -> Result<(), SwapError> {
    let size = bincode::serialized_size(tx)
        .map_err(|e| SwapError::SimulationFailed(format!("serialize: {e}")))?
        as usize;
    if size <= PACKET_DATA_SIZE {
        return Ok(());
    }

    let (static_keys, lookup_keys) = match &tx.message {
        VersionedMessage::V0(message) => (
            message.account_keys.len(),
            message
                .address_table_lookups
                .iter()
                .map(|l| l.writable_indexes.len() + l.readonly_indexes.len())
                .sum(),
        ),
        VersionedMessage::Legacy(message) => (message.account_keys.len(), 0),
    };
    Err(SwapError::TooLarge {
        size,
        static_keys,
        lookup_keys,
    })
}
