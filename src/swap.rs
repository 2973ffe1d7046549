//! The typed swap entry point.
//!
//! Replaces the enclosing agent's string-dispatched tool call with a
//! plain async function: resolve tokens, stream quotes, confirm, assemble,
//! submit. The delegation (and with it the delegate signer) is consumed by
//! the call and dropped on every exit path.

use std::io::IsTerminal;
use std::sync::Arc;

use futures_util::Stream;
use rust_decimal::Decimal;

use crate::chain::assemble::{assemble, Delegation};
use crate::chain::submit::{submit, SubmitStatus};
use crate::chain::{ChainRpc, RpcChain};
use crate::error::SwapError;
use crate::network::Config;
use crate::quotes::{QuoteRequest, QuoteStream};
use crate::session::WireSession;
use crate::shared::scaling::to_base_units;
use crate::terminal::{self, KeyPress, QuoteDisplayConfig};
use crate::tokens::TokenRegistry;

/// How a swap attempt ended, when it didn't error.
#[derive(Debug, Clone)]
pub enum SwapOutcome {
    Executed {
        signature: String,
        status: SubmitStatus,
        provider: String,
        in_amount: Decimal,
        out_amount: Decimal,
        explorer_url: String,
    },
    Cancelled,
}

/// Run one swap end to end against live endpoints.
pub async fn swap(
    cfg: &Config,
    delegation: Delegation,
    input: &str,
    output: &str,
    amount: Decimal,
    slippage_bps: u16,
) -> Result<SwapOutcome, SwapError> {
    let chain: Arc<dyn ChainRpc> = Arc::new(RpcChain::new(cfg));
    let session = WireSession::connect(cfg).await?;

    if std::io::stdin().is_terminal() {
        match terminal::interactive_keys() {
            Ok((guard, keys)) => {
                let result = swap_with(
                    cfg, &session, chain, delegation, keys, input, output, amount, slippage_bps,
                )
                .await;
                drop(guard);
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "raw mode unavailable, using line input");
                let keys = terminal::piped_keys();
                swap_with(
                    cfg, &session, chain, delegation, keys, input, output, amount, slippage_bps,
                )
                .await
            }
        }
    } else {
        let keys = terminal::piped_keys();
        swap_with(cfg, &session, chain, delegation, keys, input, output, amount, slippage_bps).await
    }
}

/// The swap pipeline with every collaborator injected. The production
/// wrapper and the scenario tests share this path.
#[allow(clippy::too_many_arguments)]
pub async fn swap_with<K>(
    cfg: &Config,
    session: &WireSession,
    chain: Arc<dyn ChainRpc>,
    delegation: Delegation,
    keys: K,
    input: &str,
    output: &str,
    amount: Decimal,
    slippage_bps: u16,
) -> Result<SwapOutcome, SwapError>
where
    K: Stream<Item = KeyPress> + Unpin,
{
    let registry = TokenRegistry::new(chain.clone());
    let input_token = registry.resolve(input).await?;
    let output_token = registry.resolve(output).await?;

    let input_amount = to_base_units(amount, input_token.decimals)
        .map_err(|e| SwapError::InvalidAmount(e.to_string()))?;
    tracing::debug!(
        input = %input_token.label(),
        output = %output_token.label(),
        %amount,
        input_amount,
        "resolved swap intent"
    );

    let request = QuoteRequest::new(
        input_token.mint,
        output_token.mint,
        input_amount,
        delegation.delegate.pubkey(),
    )
    .with_slippage_bps(slippage_bps);

    let mut stream = QuoteStream::open(session, &request, cfg.first_batch_timeout).await?;
    let display_cfg = QuoteDisplayConfig {
        symbol_in: input_token.label(),
        symbol_out: output_token.label(),
        decimals_in: input_token.decimals,
        decimals_out: output_token.decimals,
    };

    let Some(winner) = terminal::confirm_quotes(&mut stream, &display_cfg, keys).await? else {
        return Ok(SwapOutcome::Cancelled);
    };

    let tx = assemble(chain.as_ref(), &delegation, &input_token, &winner).await?;
    let outcome = submit(chain.as_ref(), &tx, cfg, &input_token.label()).await?;

    Ok(SwapOutcome::Executed {
        signature: outcome.signature.to_string(),
        status: outcome.status,
        provider: winner.provider_id.clone(),
        in_amount: crate::shared::scaling::from_base_units(winner.in_amount, input_token.decimals),
        out_amount: crate::shared::scaling::from_base_units(
            winner.out_amount,
            output_token.decimals,
        ),
        explorer_url: outcome.explorer_url,
    })
}
