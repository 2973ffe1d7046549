//! Authenticated wire session: request/response + stream multiplexing.
//!
//! One socket task owns the transport. Client calls go through a command
//! channel; inbound frames are dispatched to pending request futures and
//! active stream channels by correlation id. The session is used by a
//! single logical owner for the duration of one swap and is never reused
//! after a failure.
//!
//! Cancellation contract: [`StreamHandle::stop`] sends an explicit
//! `StopStream` control frame and returns only after the session task has
//! dropped the stream's slot, so no further deliveries for that id reach
//! the caller afterwards.

pub mod transport;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};

use crate::error::{SwapError, WireError};
use crate::network::Config;
use crate::wire::codec;
use crate::wire::types::{ClientMessage, ResponsePayload, ServerInfo, ServerMessage, StreamPayload, SwapQuotes};

use transport::FrameTransport;

const COMMAND_CHANNEL_CAPACITY: usize = 32;
const STREAM_CHANNEL_CAPACITY: usize = 64;

/// Correlation id reserved for `GetInfo`, which carries no id field.
const PROBE_ID: u64 = 0;

/// Events delivered to a stream consumer.
#[derive(Debug)]
pub enum StreamEvent {
    /// The server acknowledged the stream-open request.
    Opened,
    /// One quote batch.
    Data(SwapQuotes),
    /// Orderly server-side termination.
    End { reason: String },
    /// The stream (or the whole session) failed.
    Failed(WireError),
}

enum Command {
    Request {
        id: u64,
        msg: ClientMessage,
        reply: oneshot::Sender<Result<ResponsePayload, WireError>>,
    },
    OpenStream {
        id: u64,
        msg: ClientMessage,
        events: mpsc::Sender<StreamEvent>,
    },
    StopStream {
        id: u64,
        done: oneshot::Sender<()>,
    },
}

enum Slot {
    Request(oneshot::Sender<Result<ResponsePayload, WireError>>),
    Stream(mpsc::Sender<StreamEvent>),
}

/// Handle to the session's socket task.
pub struct WireSession {
    cmd_tx: mpsc::Sender<Command>,
    next_id: AtomicU64,
}

impl WireSession {
    /// Connect to the configured endpoint with bearer authentication.
    pub async fn connect(cfg: &Config) -> Result<Self, SwapError> {
        let ws = transport::connect(cfg).await?;
        Ok(Self::from_transport(Box::new(ws)))
    }

    /// Build a session over an already-established transport.
    pub fn from_transport(transport: Box<dyn FrameTransport>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        tokio::spawn(session_task(transport, cmd_rx));
        Self {
            cmd_tx,
            next_id: AtomicU64::new(1),
        }
    }

    /// Probe the server.
    pub async fn get_info(&self) -> Result<ServerInfo, WireError> {
        match self.request(PROBE_ID, ClientMessage::GetInfo).await? {
            ResponsePayload::GetInfo(info) => Ok(info),
            other => Err(WireError::decode(
                "response payload",
                format!("expected GetInfo, got {other:?}"),
            )),
        }
    }

    /// Send one frame and await the matching response.
    async fn request(&self, id: u64, msg: ClientMessage) -> Result<ResponsePayload, WireError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Request {
                id,
                msg,
                reply: reply_tx,
            })
            .await
            .map_err(|_| WireError::SessionGone)?;
        reply_rx.await.map_err(|_| WireError::SessionGone)?
    }

    /// Open a stream. `make` receives the assigned correlation id and
    /// builds the subscription message.
    pub async fn open_stream(
        &self,
        make: impl FnOnce(u64) -> ClientMessage,
    ) -> Result<StreamHandle, WireError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (event_tx, event_rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        self.cmd_tx
            .send(Command::OpenStream {
                id,
                msg: make(id),
                events: event_tx,
            })
            .await
            .map_err(|_| WireError::SessionGone)?;
        Ok(StreamHandle {
            id,
            events: event_rx,
            cmd_tx: self.cmd_tx.clone(),
            stopped: false,
        })
    }
}

/// Consumer side of an open stream.
pub struct StreamHandle {
    id: u64,
    events: mpsc::Receiver<StreamEvent>,
    cmd_tx: mpsc::Sender<Command>,
    stopped: bool,
}

impl StreamHandle {
    pub fn correlation_id(&self) -> u64 {
        self.id
    }

    /// Next event, or `None` once the stream is finished or stopped.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        if self.stopped {
            return None;
        }
        self.events.recv().await
    }

    /// Cancel the stream: sends `StopStream` and waits until the session
    /// task has dropped the slot. Idempotent.
    pub async fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        let (done_tx, done_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::StopStream {
                id: self.id,
                done: done_tx,
            })
            .await
            .is_ok()
        {
            let _ = done_rx.await;
        }
        // Drop anything that was already buffered before the slot went away.
        self.events.close();
        while self.events.try_recv().is_ok() {}
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        if !self.stopped {
            let (done_tx, _) = oneshot::channel();
            let _ = self.cmd_tx.try_send(Command::StopStream {
                id: self.id,
                done: done_tx,
            });
        }
    }
}

// ─── Socket task ─────────────────────────────────────────────────────────────

/// What the socket task woke up for. Resolved before any transport or
/// slot state is touched, so the select arms never hold borrows into the
/// handler code.
enum Step {
    Command(Option<Command>),
    Inbound(Option<Result<Vec<u8>, WireError>>),
}

async fn session_task(mut transport: Box<dyn FrameTransport>, mut cmd_rx: mpsc::Receiver<Command>) {
    let mut slots: HashMap<u64, Slot> = HashMap::new();

    loop {
        let step = tokio::select! {
            cmd = cmd_rx.recv() => Step::Command(cmd),
            frame = transport.recv() => Step::Inbound(frame),
        };

        match step {
            Step::Command(Some(Command::Request { id, msg, reply })) => {
                match codec::encode(&msg) {
                    Ok(frame) => {
                        if let Err(e) = transport.send(frame).await {
                            let _ = reply.send(Err(e.clone()));
                            fail_all(&mut slots, e).await;
                            return;
                        }
                        slots.insert(id, Slot::Request(reply));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            Step::Command(Some(Command::OpenStream { id, msg, events })) => {
                match codec::encode(&msg) {
                    Ok(frame) => {
                        if let Err(e) = transport.send(frame).await {
                            let _ = events.send(StreamEvent::Failed(e.clone())).await;
                            fail_all(&mut slots, e).await;
                            return;
                        }
                        slots.insert(id, Slot::Stream(events));
                    }
                    Err(e) => {
                        let _ = events.send(StreamEvent::Failed(e)).await;
                    }
                }
            }
            Step::Command(Some(Command::StopStream { id, done })) => {
                slots.remove(&id);
                match codec::encode(&ClientMessage::StopStream { correlation_id: id }) {
                    Ok(frame) => {
                        if let Err(e) = transport.send(frame).await {
                            tracing::debug!("stop-stream send failed: {e}");
                        }
                    }
                    Err(e) => tracing::debug!("stop-stream encode failed: {e}"),
                }
                let _ = done.send(());
            }
            Step::Command(None) => {
                // Session owner gone; orderly shutdown.
                let _ = transport.close().await;
                return;
            }
            Step::Inbound(Some(Ok(bytes))) => {
                match codec::decode::<ServerMessage>(&bytes, "server message") {
                    Ok(msg) => {
                        if dispatch(&mut slots, msg).await {
                            let _ = transport.close().await;
                            return;
                        }
                    }
                    Err(e) => {
                        // Decode failure is fatal; tear the session down.
                        tracing::warn!("fatal decode failure: {e}");
                        fail_all(&mut slots, e).await;
                        let _ = transport.close().await;
                        return;
                    }
                }
            }
            Step::Inbound(Some(Err(e))) => {
                fail_all(&mut slots, e).await;
                return;
            }
            Step::Inbound(None) => {
                fail_all(
                    &mut slots,
                    WireError::Closed {
                        code: None,
                        reason: "socket closed".to_string(),
                    },
                )
                .await;
                return;
            }
        }
    }
}

/// Route one server message. Returns `true` when the session must be torn
/// down (uncorrelated server error).
async fn dispatch(slots: &mut HashMap<u64, Slot>, msg: ServerMessage) -> bool {
    match msg {
        ServerMessage::Response {
            correlation_id,
            payload,
        } => match slots.get(&correlation_id) {
            Some(Slot::Request(_)) => {
                if let Some(Slot::Request(reply)) = slots.remove(&correlation_id) {
                    let _ = reply.send(Ok(payload));
                }
            }
            Some(Slot::Stream(events)) => {
                // Stream-open acknowledgement; the slot stays live.
                let _ = events.send(StreamEvent::Opened).await;
            }
            None => tracing::debug!("response for unknown id {correlation_id}"),
        },
        ServerMessage::Error {
            correlation_id,
            code,
            message,
        } => {
            let err = WireError::Server { code, message };
            match correlation_id.and_then(|id| slots.remove(&id)) {
                Some(Slot::Request(reply)) => {
                    let _ = reply.send(Err(err));
                }
                Some(Slot::Stream(events)) => {
                    let _ = events.send(StreamEvent::Failed(err)).await;
                }
                None => {
                    tracing::warn!("session-level server error: {err}");
                    fail_all(slots, err).await;
                    return true;
                }
            }
        }
        ServerMessage::StreamData {
            correlation_id,
            payload,
        } => {
            if let Some(Slot::Stream(events)) = slots.get(&correlation_id) {
                let StreamPayload::SwapQuotes(quotes) = payload;
                let _ = events.send(StreamEvent::Data(quotes)).await;
            } else {
                tracing::debug!("data for inactive stream {correlation_id}");
            }
        }
        ServerMessage::StreamEnd {
            correlation_id,
            reason,
        } => {
            if let Some(Slot::Stream(events)) = slots.remove(&correlation_id) {
                let _ = events.send(StreamEvent::End { reason }).await;
            }
        }
    }
    false
}

async fn fail_all(slots: &mut HashMap<u64, Slot>, err: WireError) {
    for (_, slot) in slots.drain() {
        match slot {
            Slot::Request(reply) => {
                let _ = reply.send(Err(err.clone()));
            }
            Slot::Stream(events) => {
                let _ = events.send(StreamEvent::Failed(err.clone())).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::transport::testing::{duplex_transport, TestPeer};
    use super::*;
    use crate::wire::types::{StreamOpened, WireQuote};

    async fn respond_get_info(peer: &mut TestPeer) {
        let frame = peer.recv_frame().await.expect("client frame");
        let msg: ClientMessage = codec::decode(&frame, "client message").unwrap();
        assert_eq!(msg, ClientMessage::GetInfo);
        peer.send_message(&ServerMessage::Response {
            correlation_id: PROBE_ID,
            payload: ResponsePayload::GetInfo(ServerInfo {
                name: "titan".to_string(),
                version: "1".to_string(),
            }),
        })
        .await;
    }

    #[tokio::test]
    async fn test_get_info_round_trip() {
        let (transport, mut peer) = duplex_transport();
        let session = WireSession::from_transport(Box::new(transport));

        let (info, _) = tokio::join!(session.get_info(), respond_get_info(&mut peer));
        assert_eq!(info.unwrap().name, "titan");
    }

    #[tokio::test]
    async fn test_stream_receives_batches_in_order() {
        let (transport, mut peer) = duplex_transport();
        let session = WireSession::from_transport(Box::new(transport));

        let mut handle = session
            .open_stream(|id| ClientMessage::StopStream { correlation_id: id })
            .await
            .unwrap();
        let id = handle.correlation_id();

        // Consume the subscription frame, then ack and send two batches.
        peer.recv_frame().await.unwrap();
        peer.send_message(&ServerMessage::Response {
            correlation_id: id,
            payload: ResponsePayload::SwapQuoteStream(StreamOpened {}),
        })
        .await;
        for n in [1u64, 2] {
            peer.send_message(&ServerMessage::StreamData {
                correlation_id: id,
                payload: StreamPayload::SwapQuotes(SwapQuotes {
                    quotes: vec![sample_quote("p", n)],
                }),
            })
            .await;
        }

        assert!(matches!(handle.next_event().await, Some(StreamEvent::Opened)));
        match handle.next_event().await {
            Some(StreamEvent::Data(q)) => assert_eq!(q.quotes[0].out_amount, 1),
            other => panic!("expected data, got {other:?}"),
        }
        match handle.next_event().await {
            Some(StreamEvent::Data(q)) => assert_eq!(q.quotes[0].out_amount, 2),
            other => panic!("expected data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stop_sends_stop_stream_and_quiesces() {
        let (transport, mut peer) = duplex_transport();
        let session = WireSession::from_transport(Box::new(transport));

        let mut handle = session
            .open_stream(|id| ClientMessage::StopStream { correlation_id: id })
            .await
            .unwrap();
        let id = handle.correlation_id();
        peer.recv_frame().await.unwrap();

        handle.stop().await;

        let frame = peer.recv_frame().await.expect("stop frame");
        let msg: ClientMessage = codec::decode(&frame, "client message").unwrap();
        assert_eq!(msg, ClientMessage::StopStream { correlation_id: id });

        // Data sent after cancellation never reaches the consumer.
        peer.send_message(&ServerMessage::StreamData {
            correlation_id: id,
            payload: StreamPayload::SwapQuotes(SwapQuotes { quotes: vec![] }),
        })
        .await;
        assert!(handle.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_socket_close_fails_active_stream() {
        let (transport, mut peer) = duplex_transport();
        let session = WireSession::from_transport(Box::new(transport));

        let mut handle = session
            .open_stream(|id| ClientMessage::StopStream { correlation_id: id })
            .await
            .unwrap();
        peer.recv_frame().await.unwrap();
        peer.close().await;

        match handle.next_event().await {
            Some(StreamEvent::Failed(WireError::Closed { .. })) => {}
            other => panic!("expected Failed(Closed), got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_frame_tears_session_down() {
        let (transport, mut peer) = duplex_transport();
        let session = WireSession::from_transport(Box::new(transport));

        let mut handle = session
            .open_stream(|id| ClientMessage::StopStream { correlation_id: id })
            .await
            .unwrap();
        peer.recv_frame().await.unwrap();
        peer.send_raw(vec![0xc1]).await;

        match handle.next_event().await {
            Some(StreamEvent::Failed(WireError::Decode { .. })) => {}
            other => panic!("expected Failed(Decode), got {other:?}"),
        }
    }

    fn sample_quote(provider: &str, out: u64) -> WireQuote {
        use crate::wire::types::QuotePayload;
        use serde_bytes::ByteBuf;
        WireQuote {
            provider_id: provider.to_string(),
            route: vec!["Orca".to_string()],
            in_amount: 1,
            out_amount: out,
            price_impact_bps: 0,
            platform_fee_bps: 0,
            compute_units: None,
            payload: QuotePayload::Prebuilt {
                transaction: ByteBuf::from(vec![0u8]),
            },
        }
    }
}
