//! Quote stream manager: request, aggregation, ranking.
//!
//! Each server update is the full current candidate set; the manager
//! replaces its state wholesale per batch and exposes the current winner
//! by a deterministic tie-break. Cancellation is forwarded to the session,
//! which puts a `StopStream` on the wire before the cancel call returns.

pub mod convert;

use std::time::Duration;

use serde_bytes::ByteBuf;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use tokio::time::Instant;

use crate::error::SwapError;
use crate::session::{StreamEvent, StreamHandle, WireSession};
use crate::wire::types::ClientMessage;

/// Parameters for one quote stream. Lifetime bounded by the stream it
/// opens.
#[derive(Debug, Clone)]
pub struct QuoteRequest {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    /// Integer base units of the input token.
    pub input_amount: u64,
    pub user_pubkey: Pubkey,
    pub slippage_bps: u16,
    pub max_quotes_per_update: u8,
    pub update_interval_ms: u16,
}

impl QuoteRequest {
    pub fn new(
        input_mint: Pubkey,
        output_mint: Pubkey,
        input_amount: u64,
        user_pubkey: Pubkey,
    ) -> Self {
        Self {
            input_mint,
            output_mint,
            input_amount,
            user_pubkey,
            slippage_bps: 50,
            max_quotes_per_update: 8,
            update_interval_ms: 500,
        }
    }

    pub fn with_slippage_bps(mut self, slippage_bps: u16) -> Self {
        self.slippage_bps = slippage_bps.min(10_000);
        self
    }

    fn to_wire(&self, correlation_id: u64) -> ClientMessage {
        ClientMessage::NewSwapQuoteStream {
            correlation_id,
            input_mint: ByteBuf::from(self.input_mint.to_bytes().to_vec()),
            output_mint: ByteBuf::from(self.output_mint.to_bytes().to_vec()),
            amount: self.input_amount,
            user_pubkey: ByteBuf::from(self.user_pubkey.to_bytes().to_vec()),
            slippage_bps: self.slippage_bps.min(10_000),
            max_quotes: self.max_quotes_per_update.clamp(1, 16),
            interval_ms: self.update_interval_ms.clamp(100, 5000),
        }
    }
}

/// One candidate, converted and validated from the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub provider_id: String,
    pub route: Vec<String>,
    pub in_amount: u64,
    pub out_amount: u64,
    pub price_impact_bps: u16,
    pub platform_fee_bps: u16,
    pub compute_units: Option<u32>,
    pub execution: QuoteExecution,
}

/// How the winning quote is executed.
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteExecution {
    /// A serialized versioned transaction already built by the server.
    Prebuilt { transaction: Vec<u8> },
    /// Instructions plus the lookup tables needed to fit the wire budget.
    Instructions {
        instructions: Vec<Instruction>,
        lookup_tables: Vec<Pubkey>,
    },
}

/// One server update, order preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteBatch {
    pub quotes: Vec<Quote>,
}

impl QuoteBatch {
    /// Quotes that can actually win. A zero `out_amount` never ranks.
    pub fn usable(&self) -> impl Iterator<Item = &Quote> {
        self.quotes.iter().filter(|q| q.out_amount > 0)
    }

    /// A batch with no usable quote leaves the prior winner untouched.
    pub fn is_effectively_empty(&self) -> bool {
        self.usable().next().is_none()
    }
}

/// The tie-break: maximal `out_amount`, then minimal `price_impact_bps`,
/// then lexicographically smallest `provider_id`. Pure function of those
/// three fields.
pub fn best_quote<'a>(quotes: impl IntoIterator<Item = &'a Quote>) -> Option<&'a Quote> {
    use std::cmp::Reverse;
    quotes
        .into_iter()
        .filter(|q| q.out_amount > 0)
        .max_by(|a, b| {
            (a.out_amount, Reverse(a.price_impact_bps))
                .cmp(&(b.out_amount, Reverse(b.price_impact_bps)))
                .then_with(|| b.provider_id.cmp(&a.provider_id))
        })
}

/// An open quote stream plus its aggregate view.
pub struct QuoteStream {
    handle: StreamHandle,
    latest: QuoteBatch,
    winning: Option<Quote>,
    first_batch_deadline: Instant,
    saw_first_batch: bool,
    finished: bool,
}

impl QuoteStream {
    /// Send `NewSwapQuoteStream` and return the live stream.
    pub async fn open(
        session: &WireSession,
        request: &QuoteRequest,
        first_batch_timeout: Duration,
    ) -> Result<Self, SwapError> {
        let handle = session.open_stream(|id| request.to_wire(id)).await?;
        Ok(Self {
            handle,
            latest: QuoteBatch::default(),
            winning: None,
            first_batch_deadline: Instant::now() + first_batch_timeout,
            saw_first_batch: false,
            finished: false,
        })
    }

    /// The next batch, `Ok(None)` once the server ended the stream.
    ///
    /// Until the first usable batch arrives, waiting is bounded by the
    /// first-batch deadline; exceeding it fails the stream with
    /// [`SwapError::NoQuotes`].
    pub async fn next_batch(&mut self) -> Result<Option<QuoteBatch>, SwapError> {
        if self.finished {
            return Ok(None);
        }
        loop {
            let event = if self.saw_first_batch {
                self.handle.next_event().await
            } else {
                match tokio::time::timeout_at(self.first_batch_deadline, self.handle.next_event())
                    .await
                {
                    Ok(event) => event,
                    Err(_) => {
                        self.finished = true;
                        self.handle.stop().await;
                        return Err(SwapError::NoQuotes);
                    }
                }
            };

            match event {
                Some(StreamEvent::Opened) => continue,
                Some(StreamEvent::Data(wire_batch)) => {
                    let batch = convert::batch_from_wire(wire_batch)?;
                    if !batch.is_effectively_empty() {
                        self.saw_first_batch = true;
                        self.winning = best_quote(&batch.quotes).cloned();
                    }
                    self.latest = batch.clone();
                    return Ok(Some(batch));
                }
                Some(StreamEvent::End { reason }) => {
                    tracing::debug!(%reason, "quote stream ended by server");
                    self.finished = true;
                    return Ok(None);
                }
                Some(StreamEvent::Failed(err)) => {
                    self.finished = true;
                    return Err(err.into());
                }
                None => {
                    self.finished = true;
                    return Ok(None);
                }
            }
        }
    }

    /// The most recent batch, order preserved.
    pub fn latest(&self) -> &QuoteBatch {
        &self.latest
    }

    /// The current winner, derived from the latest usable batch.
    pub fn winning(&self) -> Option<&Quote> {
        self.winning.as_ref()
    }

    /// Cancel the stream. `StopStream` is on the wire before this returns
    /// and no further batches are observable afterwards.
    pub async fn cancel(&mut self) {
        self.finished = true;
        self.handle.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(provider: &str, out: u64, impact: u16) -> Quote {
        Quote {
            provider_id: provider.to_string(),
            route: vec!["Orca".to_string()],
            in_amount: 1_000_000,
            out_amount: out,
            price_impact_bps: impact,
            platform_fee_bps: 0,
            compute_units: None,
            execution: QuoteExecution::Prebuilt {
                transaction: vec![0],
            },
        }
    }

    #[test]
    fn test_best_by_out_amount() {
        let quotes = vec![quote("A", 9_721_400, 10), quote("B", 9_680_000, 1)];
        assert_eq!(best_quote(&quotes).unwrap().provider_id, "A");
    }

    #[test]
    fn test_tie_breaks_on_price_impact() {
        let quotes = vec![quote("A", 100, 30), quote("B", 100, 10)];
        assert_eq!(best_quote(&quotes).unwrap().provider_id, "B");
    }

    #[test]
    fn test_tie_breaks_on_provider_id() {
        let quotes = vec![quote("Zeta", 100, 10), quote("Apex", 100, 10)];
        assert_eq!(best_quote(&quotes).unwrap().provider_id, "Apex");
    }

    #[test]
    fn test_tie_break_is_order_independent() {
        let mut quotes = vec![quote("B", 100, 10), quote("A", 100, 10), quote("C", 100, 5)];
        let first = best_quote(&quotes).unwrap().provider_id.clone();
        quotes.reverse();
        assert_eq!(best_quote(&quotes).unwrap().provider_id, first);
        assert_eq!(first, "C");
    }

    #[test]
    fn test_zero_out_amount_never_wins() {
        let quotes = vec![quote("A", 0, 0)];
        assert!(best_quote(&quotes).is_none());
    }

    #[test]
    fn test_all_zero_batch_is_effectively_empty() {
        let batch = QuoteBatch {
            quotes: vec![quote("A", 0, 0), quote("B", 0, 0)],
        };
        assert!(batch.is_effectively_empty());
    }

    #[test]
    fn test_request_clamps_wire_ranges() {
        let request = QuoteRequest {
            slippage_bps: 60_000,
            max_quotes_per_update: 0,
            update_interval_ms: 10,
            ..QuoteRequest::new(
                Pubkey::new_unique(),
                Pubkey::new_unique(),
                1,
                Pubkey::new_unique(),
            )
        };
        match request.to_wire(1) {
            ClientMessage::NewSwapQuoteStream {
                slippage_bps,
                max_quotes,
                interval_ms,
                ..
            } => {
                assert_eq!(slippage_bps, 10_000);
                assert_eq!(max_quotes, 1);
                assert_eq!(interval_ms, 100);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }
}
