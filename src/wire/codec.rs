//! Frame codec: MessagePack with an outer content-encoding envelope.
//!
//! The outer frame is a two-field map `{encoding, payload}`. The payload is
//! the MessagePack encoding of the inner message, compressed according to
//! the tag. Encoding always chooses `identity`; decoding accepts any of the
//! four tags because the server picks per-frame.
//!
//! A decode failure is fatal for the session that received the frame.

use std::io::Read;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

use crate::error::WireError;

/// Content encoding of a frame payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    Identity,
    Gzip,
    Brotli,
    Zstd,
}

#[derive(Serialize, Deserialize)]
struct Frame {
    encoding: ContentEncoding,
    payload: ByteBuf,
}

/// Encode a message into a frame. Always `identity`.
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, WireError> {
    encode_with(msg, ContentEncoding::Identity)
}

/// Encode a message into a frame with an explicit content encoding.
pub fn encode_with<T: Serialize>(msg: &T, encoding: ContentEncoding) -> Result<Vec<u8>, WireError> {
    let inner = rmp_serde::to_vec_named(msg).map_err(|e| WireError::Encode(e.to_string()))?;
    let payload = compress(&inner, encoding)?;
    let frame = Frame {
        encoding,
        payload: ByteBuf::from(payload),
    };
    rmp_serde::to_vec_named(&frame).map_err(|e| WireError::Encode(e.to_string()))
}

/// Decode a frame into a message. `what` names the expected message for
/// error paths; raw bytes are never included.
pub fn decode<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T, WireError> {
    let frame: Frame =
        rmp_serde::from_slice(bytes).map_err(|e| WireError::decode("frame", e))?;
    let inner = decompress(&frame.payload, frame.encoding)?;
    rmp_serde::from_slice(&inner).map_err(|e| WireError::decode(what, e))
}

fn compress(data: &[u8], encoding: ContentEncoding) -> Result<Vec<u8>, WireError> {
    match encoding {
        ContentEncoding::Identity => Ok(data.to_vec()),
        ContentEncoding::Gzip => {
            let mut out = Vec::new();
            flate2::read::GzEncoder::new(data, flate2::Compression::default())
                .read_to_end(&mut out)
                .map_err(|e| WireError::Encode(format!("gzip: {e}")))?;
            Ok(out)
        }
        ContentEncoding::Brotli => {
            let mut out = Vec::new();
            brotli::CompressorReader::new(data, 4096, 5, 22)
                .read_to_end(&mut out)
                .map_err(|e| WireError::Encode(format!("brotli: {e}")))?;
            Ok(out)
        }
        ContentEncoding::Zstd => {
            zstd::stream::encode_all(data, 0).map_err(|e| WireError::Encode(format!("zstd: {e}")))
        }
    }
}

fn decompress(data: &[u8], encoding: ContentEncoding) -> Result<Vec<u8>, WireError> {
    match encoding {
        ContentEncoding::Identity => Ok(data.to_vec()),
        ContentEncoding::Gzip => {
            let mut out = Vec::new();
            flate2::read::GzDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| WireError::decode("payload(gzip)", e))?;
            Ok(out)
        }
        ContentEncoding::Brotli => {
            let mut out = Vec::new();
            brotli::Decompressor::new(data, 4096)
                .read_to_end(&mut out)
                .map_err(|e| WireError::decode("payload(brotli)", e))?;
            Ok(out)
        }
        ContentEncoding::Zstd => zstd::stream::decode_all(data)
            .map_err(|e| WireError::decode("payload(zstd)", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::types::{ClientMessage, ServerInfo, ServerMessage, ResponsePayload};

    fn sample_server_message() -> ServerMessage {
        ServerMessage::Response {
            correlation_id: 0,
            payload: ResponsePayload::GetInfo(ServerInfo {
                name: "titan".to_string(),
                version: "1.0".to_string(),
            }),
        }
    }

    #[test]
    fn test_identity_round_trip() {
        let msg = ClientMessage::StopStream { correlation_id: 9 };
        let bytes = encode(&msg).unwrap();
        let back: ClientMessage = decode(&bytes, "client message").unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_all_encodings_accepted_on_receive() {
        let msg = sample_server_message();
        for encoding in [
            ContentEncoding::Identity,
            ContentEncoding::Gzip,
            ContentEncoding::Brotli,
            ContentEncoding::Zstd,
        ] {
            let bytes = encode_with(&msg, encoding).unwrap();
            let back: ServerMessage = decode(&bytes, "server message").unwrap();
            assert_eq!(back, msg, "{encoding:?}");
        }
    }

    #[test]
    fn test_encode_defaults_to_identity() {
        let bytes = encode(&ClientMessage::GetInfo).unwrap();
        let frame: Frame = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(frame.encoding, ContentEncoding::Identity);
    }

    #[test]
    fn test_malformed_frame_is_decode_error() {
        let err = decode::<ServerMessage>(&[0xc1, 0xff, 0x00], "server message").unwrap_err();
        match err {
            WireError::Decode { path, .. } => assert_eq!(path, "frame"),
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    #[test]
    fn test_wrong_inner_type_names_message_path() {
        // A valid frame whose payload is not a ServerMessage.
        let bytes = encode(&ClientMessage::GetInfo).unwrap();
        let err = decode::<ServerMessage>(&bytes, "server message").unwrap_err();
        match err {
            WireError::Decode { path, .. } => assert_eq!(path, "server message"),
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    #[test]
    fn test_corrupt_compressed_payload_is_decode_error() {
        let frame = Frame {
            encoding: ContentEncoding::Gzip,
            payload: ByteBuf::from(vec![0x00, 0x01, 0x02]),
        };
        let bytes = rmp_serde::to_vec_named(&frame).unwrap();
        let err = decode::<ServerMessage>(&bytes, "server message").unwrap_err();
        assert!(matches!(err, WireError::Decode { .. }));
    }
}
