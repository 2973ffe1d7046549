//! Wire protocol layer: MessagePack frame codec + message types.
//!
//! Everything here is pure synchronous logic. The session layer owns the
//! socket; this module only turns messages into bytes and back.

pub mod codec;
pub mod types;

pub use codec::{decode, encode, encode_with, ContentEncoding};
pub use types::{
    ClientMessage, QuotePayload, ResponsePayload, ServerInfo, ServerMessage, StreamPayload,
    SwapQuotes, WireAccountMeta, WireInstruction, WireQuote,
};
