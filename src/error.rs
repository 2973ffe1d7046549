//! Unified error types.
//!
//! Each layer has its own error sum (`WireError` for the codec + session,
//! `ChainError` for RPC transport); `SwapError` is what crosses the crate
//! boundary and what the enclosing CLI renders to the user. Secrets and raw
//! wire bytes never appear in messages; decode errors carry a field path
//! instead.

use thiserror::Error;

/// Top-level swap error. One variant per user-visible failure kind.
#[derive(Error, Debug)]
pub enum SwapError {
    #[error("missing configuration: set {0}")]
    ConfigMissing(&'static str),

    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    #[error("no quotes received before the deadline")]
    NoQuotes,

    #[error("delegation refused: {0}")]
    DelegationInvalid(DelegationRefusal),

    #[error(
        "transaction too large: {size} bytes (limit 1232), \
         {static_keys} static keys, {lookup_keys} lookup keys"
    )]
    TooLarge {
        size: usize,
        static_keys: usize,
        lookup_keys: usize,
    },

    #[error("insufficient funds: {token}")]
    InsufficientFunds { token: String },

    #[error("slippage tolerance exceeded; retry with a higher slippage_bps")]
    SlippageExceeded,

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("transaction simulation failed: {0}")]
    SimulationFailed(String),

    #[error("confirmation timed out; signature {signature} status unknown")]
    ConfirmationTimeout { signature: String },

    #[error("chain rpc error: {0}")]
    Chain(#[from] ChainError),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

/// Why the assembler refused to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegationRefusal {
    Expired,
    ProgramNotAllowed,
    OverCap { cap: String, requested: String },
    SignerMismatch,
    MalformedKey,
}

impl std::fmt::Display for DelegationRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DelegationRefusal::Expired => write!(f, "delegation expired"),
            DelegationRefusal::ProgramNotAllowed => {
                write!(f, "Titan is not in the delegation's allowed programs")
            }
            DelegationRefusal::OverCap { cap, requested } => {
                write!(f, "amount {requested} exceeds the per-transaction cap {cap}")
            }
            DelegationRefusal::SignerMismatch => {
                write!(f, "delegate key is not a signer of the assembled message")
            }
            DelegationRefusal::MalformedKey => write!(f, "delegate secret key is malformed"),
        }
    }
}

/// Codec + session errors. Fatal for the session that produced them.
#[derive(Error, Debug, Clone)]
pub enum WireError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection closed: code={code:?} reason={reason}")]
    Closed { code: Option<u16>, reason: String },

    #[error("decode error at {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("encode error: {0}")]
    Encode(String),

    #[error("server error {code}: {message}")]
    Server { code: String, message: String },

    #[error("session task gone")]
    SessionGone,
}

/// Chain RPC transport errors, before user-facing classification.
#[derive(Error, Debug, Clone)]
pub enum ChainError {
    /// Preflight simulation rejected the transaction. The message is the
    /// RPC-provided reason, used by the submitter for classification.
    #[error("preflight failure: {message}")]
    Preflight { message: String },

    #[error("rpc error: {0}")]
    Rpc(String),
}

impl WireError {
    pub(crate) fn decode(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        WireError::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delegation_refusal_display() {
        assert_eq!(DelegationRefusal::Expired.to_string(), "delegation expired");
        let over = DelegationRefusal::OverCap {
            cap: "1 SOL".to_string(),
            requested: "2.5 SOL".to_string(),
        };
        assert!(over.to_string().contains("2.5 SOL"));
        assert!(over.to_string().contains("1 SOL"));
    }

    #[test]
    fn test_too_large_carries_diagnostics() {
        let err = SwapError::TooLarge {
            size: 2336,
            static_keys: 40,
            lookup_keys: 0,
        };
        let msg = err.to_string();
        assert!(msg.contains("2336"));
        assert!(msg.contains("40 static"));
    }

    #[test]
    fn test_decode_error_carries_path_not_bytes() {
        let err = WireError::decode("quotes[0].payload", "unknown variant");
        assert_eq!(
            err.to_string(),
            "decode error at quotes[0].payload: unknown variant"
        );
    }
}
