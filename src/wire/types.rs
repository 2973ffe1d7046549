//! Protocol message types.
//!
//! Externally-tagged serde enums match the server's convention bit-exact:
//! a variant with no data encodes as a bare string (`"GetInfo"`), a variant
//! with data encodes as a single-entry map (`{Tag: value}`). Pubkeys are
//! 32-byte binary values on the wire, never base58; instruction data is an
//! opaque binary blob.

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

// ─── Client → server ─────────────────────────────────────────────────────────

/// Messages sent by the client. Tag values are case-sensitive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ClientMessage {
    /// Server probe; no correlation id (the session reserves id 0 for it).
    GetInfo,
    NewSwapQuoteStream {
        correlation_id: u64,
        input_mint: ByteBuf,
        output_mint: ByteBuf,
        amount: u64,
        user_pubkey: ByteBuf,
        slippage_bps: u16,
        max_quotes: u8,
        interval_ms: u16,
    },
    StopStream {
        correlation_id: u64,
    },
}

// ─── Server → client ─────────────────────────────────────────────────────────

/// Messages received from the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ServerMessage {
    Response {
        correlation_id: u64,
        payload: ResponsePayload,
    },
    Error {
        #[serde(default)]
        correlation_id: Option<u64>,
        code: String,
        message: String,
    },
    StreamData {
        correlation_id: u64,
        payload: StreamPayload,
    },
    StreamEnd {
        correlation_id: u64,
        reason: String,
    },
}

/// Payload of a `Response` frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ResponsePayload {
    GetInfo(ServerInfo),
    SwapQuoteStream(StreamOpened),
    StopStream(StreamStopped),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StreamOpened {}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StreamStopped {}

/// Payload of a `StreamData` frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StreamPayload {
    SwapQuotes(SwapQuotes),
}

// ─── Quotes ──────────────────────────────────────────────────────────────────

/// One server update: the full current candidate set, not a delta.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwapQuotes {
    pub quotes: Vec<WireQuote>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireQuote {
    pub provider_id: String,
    /// Ordered venue names along the route.
    pub route: Vec<String>,
    pub in_amount: u64,
    pub out_amount: u64,
    pub price_impact_bps: u16,
    pub platform_fee_bps: u16,
    #[serde(default)]
    pub compute_units: Option<u32>,
    pub payload: QuotePayload,
}

/// How the quote is to be executed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum QuotePayload {
    /// A fully serialized versioned transaction built by the server.
    Prebuilt { transaction: ByteBuf },
    /// Raw instructions plus the lookup tables needed to compress them.
    Instructions {
        instructions: Vec<WireInstruction>,
        lookup_tables: Vec<ByteBuf>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireInstruction {
    pub program_id: ByteBuf,
    pub accounts: Vec<WireAccountMeta>,
    pub data: ByteBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireAccountMeta {
    pub pubkey: ByteBuf,
    pub is_signer: bool,
    pub is_writable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_variant_encodes_as_bare_string() {
        let bytes = rmp_serde::to_vec_named(&ClientMessage::GetInfo).unwrap();
        // msgpack fixstr of length 7 followed by "GetInfo".
        assert_eq!(bytes[0], 0xa7);
        assert_eq!(&bytes[1..], b"GetInfo");
    }

    #[test]
    fn test_data_variant_encodes_as_single_entry_map() {
        let bytes = rmp_serde::to_vec_named(&ClientMessage::StopStream { correlation_id: 7 })
            .unwrap();
        // fixmap with one entry keyed by the variant name.
        assert_eq!(bytes[0], 0x81);
        assert_eq!(bytes[1], 0xaa); // fixstr len 10
        assert_eq!(&bytes[2..12], b"StopStream");
    }

    #[test]
    fn test_client_message_round_trip() {
        let msg = ClientMessage::NewSwapQuoteStream {
            correlation_id: 1,
            input_mint: ByteBuf::from(vec![1u8; 32]),
            output_mint: ByteBuf::from(vec![2u8; 32]),
            amount: 50_000_000,
            user_pubkey: ByteBuf::from(vec![3u8; 32]),
            slippage_bps: 50,
            max_quotes: 5,
            interval_ms: 500,
        };
        let bytes = rmp_serde::to_vec_named(&msg).unwrap();
        let back: ClientMessage = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_error_without_correlation_id() {
        let msg = ServerMessage::Error {
            correlation_id: None,
            code: "unauthorized".to_string(),
            message: "bad token".to_string(),
        };
        let bytes = rmp_serde::to_vec_named(&msg).unwrap();
        let back: ServerMessage = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_stream_data_nested_payload_tag() {
        let msg = ServerMessage::StreamData {
            correlation_id: 3,
            payload: StreamPayload::SwapQuotes(SwapQuotes { quotes: vec![] }),
        };
        let bytes = rmp_serde::to_vec_named(&msg).unwrap();
        let back: ServerMessage = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_quote_payload_variants_round_trip() {
        let prebuilt = QuotePayload::Prebuilt {
            transaction: ByteBuf::from(vec![0xde, 0xad]),
        };
        let instructions = QuotePayload::Instructions {
            instructions: vec![WireInstruction {
                program_id: ByteBuf::from(vec![9u8; 32]),
                accounts: vec![WireAccountMeta {
                    pubkey: ByteBuf::from(vec![8u8; 32]),
                    is_signer: true,
                    is_writable: false,
                }],
                data: ByteBuf::from(vec![1, 2, 3]),
            }],
            lookup_tables: vec![ByteBuf::from(vec![7u8; 32])],
        };
        for payload in [prebuilt, instructions] {
            let bytes = rmp_serde::to_vec_named(&payload).unwrap();
            let back: QuotePayload = rmp_serde::from_slice(&bytes).unwrap();
            assert_eq!(back, payload);
        }
    }
}
