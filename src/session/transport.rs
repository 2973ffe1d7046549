//! Frame transports.
//!
//! The session task talks to the wire through [`FrameTransport`] so the
//! protocol machinery can be exercised against an in-memory duplex in
//! tests. The production implementation wraps `tokio-tungstenite`.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{Error as TungsteniteError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use std::time::Duration;

use crate::error::{SwapError, WireError};
use crate::network::{Config, WS_SUBPROTOCOL};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// A bidirectional channel of opaque binary frames.
#[async_trait]
pub trait FrameTransport: Send {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), WireError>;

    /// Next inbound frame. `None` once the peer has closed.
    async fn recv(&mut self) -> Option<Result<Vec<u8>, WireError>>;

    async fn close(&mut self) -> Result<(), WireError>;
}

// ─── WebSocket transport ─────────────────────────────────────────────────────

/// Open the authenticated WebSocket described by `cfg`.
pub async fn connect(cfg: &Config) -> Result<WsTransport, SwapError> {
    let mut request = cfg
        .ws_url
        .as_str()
        .into_client_request()
        .map_err(|e| WireError::ConnectionFailed(format!("invalid url: {e}")))?;

    let headers = request.headers_mut();
    headers.insert(
        "Authorization",
        format!("Bearer {}", cfg.auth_token)
            .parse()
            .map_err(|_| WireError::ConnectionFailed("malformed auth header".to_string()))?,
    );
    headers.insert(
        "Sec-WebSocket-Protocol",
        WS_SUBPROTOCOL
            .parse()
            .map_err(|_| WireError::ConnectionFailed("malformed subprotocol".to_string()))?,
    );

    let connect = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(request))
        .await
        .map_err(|_| WireError::ConnectionFailed("connect timeout".to_string()))?;

    match connect {
        Ok((stream, _response)) => {
            tracing::debug!(url = %cfg.ws_url, "wire session connected");
            Ok(WsTransport { inner: stream })
        }
        Err(TungsteniteError::Http(response)) => {
            let status = response.status();
            if status.as_u16() == 401 || status.as_u16() == 403 {
                Err(SwapError::AuthRejected(format!("HTTP {status}")))
            } else {
                Err(WireError::ConnectionFailed(format!("HTTP {status}")).into())
            }
        }
        Err(e) => Err(WireError::ConnectionFailed(e.to_string()).into()),
    }
}

/// Production transport over `tokio-tungstenite`.
pub struct WsTransport {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FrameTransport for WsTransport {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), WireError> {
        self.inner
            .send(Message::Binary(frame))
            .await
            .map_err(|e| WireError::ConnectionFailed(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<Vec<u8>, WireError>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Binary(bytes)) => return Some(Ok(bytes)),
                Ok(Message::Ping(data)) => {
                    if let Err(e) = self.inner.send(Message::Pong(data)).await {
                        return Some(Err(WireError::ConnectionFailed(e.to_string())));
                    }
                }
                Ok(Message::Pong(_)) => {}
                Ok(Message::Text(_)) => {
                    tracing::warn!("ignoring unexpected text frame");
                }
                Ok(Message::Close(frame)) => {
                    let (code, reason) = frame
                        .map(|f| (Some(u16::from(f.code)), f.reason.to_string()))
                        .unwrap_or((None, String::new()));
                    return Some(Err(WireError::Closed { code, reason }));
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => return Some(Err(WireError::ConnectionFailed(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) -> Result<(), WireError> {
        self.inner
            .close(None)
            .await
            .map_err(|e| WireError::ConnectionFailed(e.to_string()))
    }
}

// ─── In-memory transport for tests ───────────────────────────────────────────

/// In-memory duplex transport plus its server-side peer. Lets the session
/// machinery run without a socket.
pub mod testing {
    use serde::Serialize;
    use tokio::sync::mpsc;

    use super::{async_trait, FrameTransport, WireError};
    use crate::wire::codec::{self, ContentEncoding};

    /// Client-side half handed to `WireSession::from_transport`.
    pub struct DuplexTransport {
        out_tx: mpsc::UnboundedSender<Vec<u8>>,
        in_rx: mpsc::UnboundedReceiver<Result<Vec<u8>, WireError>>,
    }

    /// Server-side half driven by the test.
    pub struct TestPeer {
        in_tx: Option<mpsc::UnboundedSender<Result<Vec<u8>, WireError>>>,
        out_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    }

    /// Build a connected pair.
    pub fn duplex_transport() -> (DuplexTransport, TestPeer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        (
            DuplexTransport { out_tx, in_rx },
            TestPeer {
                in_tx: Some(in_tx),
                out_rx,
            },
        )
    }

    #[async_trait]
    impl FrameTransport for DuplexTransport {
        async fn send(&mut self, frame: Vec<u8>) -> Result<(), WireError> {
            self.out_tx.send(frame).map_err(|_| WireError::Closed {
                code: None,
                reason: "peer gone".to_string(),
            })
        }

        async fn recv(&mut self) -> Option<Result<Vec<u8>, WireError>> {
            self.in_rx.recv().await
        }

        async fn close(&mut self) -> Result<(), WireError> {
            Ok(())
        }
    }

    impl TestPeer {
        /// Next frame the client sent.
        pub async fn recv_frame(&mut self) -> Option<Vec<u8>> {
            self.out_rx.recv().await
        }

        /// Encode and deliver a server message (identity encoding).
        pub async fn send_message<T: Serialize>(&mut self, msg: &T) {
            self.send_message_with(msg, ContentEncoding::Identity).await;
        }

        /// Encode and deliver a server message with a chosen encoding.
        pub async fn send_message_with<T: Serialize>(&mut self, msg: &T, encoding: ContentEncoding) {
            let frame = codec::encode_with(msg, encoding).expect("encode server message");
            self.send_raw(frame).await;
        }

        /// Deliver raw bytes as one inbound frame.
        pub async fn send_raw(&mut self, frame: Vec<u8>) {
            if let Some(tx) = &self.in_tx {
                let _ = tx.send(Ok(frame));
            }
        }

        /// Close the connection from the server side.
        pub async fn close(&mut self) {
            self.in_tx = None;
        }
    }
}
