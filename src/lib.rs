//! # titan-swap
//!
//! Streaming swap execution core for the Titan router on Solana: consume
//! live quote batches from multiple providers over an authenticated
//! MessagePack WebSocket, confirm the best one at the terminal, then
//! assemble, sign, and submit a size-legal versioned transaction.
//!
//! ## Architecture
//!
//! The crate is organized in layers:
//!
//! 1. **Shared** — amount scaling and display formatting (pure)
//! 2. **Wire** — MessagePack frame codec + protocol message types
//! 3. **Session** — authenticated WebSocket with request/response and
//!    stream multiplexing by correlation id
//! 4. **Domain** — token registry, quote stream manager and ranking
//! 5. **Terminal** — in-place quote table and confirmation
//! 6. **Chain** — RPC seam, ALT loading, transaction assembly, submission
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use titan_swap::prelude::*;
//!
//! let cfg = Config::from_env()?;
//! let outcome = swap(&cfg, delegation, "SOL", "USDC", dec!(0.05), 50).await?;
//! ```

// ── Layer 1: Shared ──────────────────────────────────────────────────────────

/// Pure helpers: decimal scaling, display formatting.
pub mod shared;

/// Unified error types.
pub mod error;

/// Endpoint constants + environment configuration.
pub mod network;

// ── Layer 2: Wire ────────────────────────────────────────────────────────────

/// MessagePack frame codec and protocol message types.
pub mod wire;

// ── Layer 3: Session ─────────────────────────────────────────────────────────

/// Authenticated WebSocket session with correlation-id multiplexing.
pub mod session;

// ── Layer 4: Domain ──────────────────────────────────────────────────────────

/// Symbol/mint resolution and on-chain decimals.
pub mod tokens;

/// Quote stream manager and ranking.
pub mod quotes;

// ── Layer 5: Terminal ────────────────────────────────────────────────────────

/// Live quote table and confirmation.
pub mod terminal;

// ── Layer 6: Chain ───────────────────────────────────────────────────────────

/// Chain RPC seam, ALT loading, assembly, submission.
pub mod chain;

// ── Entry point ──────────────────────────────────────────────────────────────

/// The typed swap entry point.
pub mod swap;

pub mod prelude {
    pub use crate::chain::assemble::{Delegation, DelegateSigner};
    pub use crate::chain::submit::{SubmitOutcome, SubmitStatus};
    pub use crate::chain::{ChainRpc, RpcChain, SignatureStatus};
    pub use crate::error::{ChainError, DelegationRefusal, SwapError, WireError};
    pub use crate::network::Config;
    pub use crate::quotes::{best_quote, Quote, QuoteBatch, QuoteRequest, QuoteStream};
    pub use crate::session::WireSession;
    pub use crate::swap::{swap, SwapOutcome};
    pub use crate::terminal::{KeyPress, QuoteDisplayConfig};
    pub use crate::tokens::{TokenInfo, TokenRegistry, WRAPPED_SOL_MINT};
}
