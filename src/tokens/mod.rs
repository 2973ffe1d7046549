//! Token resolution: symbol ↔ mint, plus on-chain decimals.
//!
//! This is the single source of truth for per-token decimal counts. A
//! hard-coded decimal count applied across tokens mis-scales amounts by
//! whole orders of magnitude; decimals are fetched per mint, with the one
//! exception of wrapped-native SOL, whose 9 is fixed by the chain.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::Mutex;

use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;

use crate::chain::ChainRpc;
use crate::error::SwapError;

/// The wrapped-native SOL mint. Always 9 decimals.
pub const WRAPPED_SOL_MINT: Pubkey = pubkey!("So11111111111111111111111111111111111111112");

/// Byte offset of `decimals` in the SPL mint account layout.
const MINT_DECIMALS_OFFSET: usize = 44;

/// Fallback when the mint account cannot be read or parsed.
const FALLBACK_DECIMALS: u8 = 6;

/// Symbols accepted in place of a mint address.
const KNOWN_TOKENS: &[(&str, Pubkey)] = &[
    ("SOL", WRAPPED_SOL_MINT),
    ("WSOL", WRAPPED_SOL_MINT),
    ("USDC", pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v")),
    ("USDT", pubkey!("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB")),
    ("BONK", pubkey!("DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263")),
    ("JUP", pubkey!("JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN")),
];

/// A resolved token. Decimals are immutable on chain, so entries are
/// cached for the whole process and never invalidated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub mint: Pubkey,
    pub decimals: u8,
    pub symbol: Option<String>,
}

impl TokenInfo {
    /// Short user-facing label: the symbol, or a truncated address.
    pub fn label(&self) -> String {
        match &self.symbol {
            Some(symbol) => symbol.clone(),
            None => {
                let address = self.mint.to_string();
                address[..8.min(address.len())].to_string()
            }
        }
    }

    pub fn is_wrapped_sol(&self) -> bool {
        self.mint == WRAPPED_SOL_MINT
    }
}

/// Per-process token resolver backed by the chain RPC.
pub struct TokenRegistry {
    chain: Arc<dyn ChainRpc>,
    cache: Mutex<HashMap<Pubkey, TokenInfo>>,
}

impl TokenRegistry {
    pub fn new(chain: Arc<dyn ChainRpc>) -> Self {
        Self {
            chain,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a symbol or base58 mint address to a [`TokenInfo`].
    pub async fn resolve(&self, symbol_or_address: &str) -> Result<TokenInfo, SwapError> {
        let trimmed = symbol_or_address.trim();
        let upper = trimmed.to_uppercase();

        let (mint, symbol) = if let Some((symbol, mint)) =
            KNOWN_TOKENS.iter().find(|(s, _)| *s == upper)
        {
            (*mint, Some(symbol.to_string()))
        } else if let Ok(mint) = Pubkey::from_str(trimmed) {
            (mint, None)
        } else {
            return Err(SwapError::AccountNotFound(format!(
                "unknown token '{trimmed}'"
            )));
        };

        if let Some(cached) = self.cache().get(&mint) {
            return Ok(cached.clone());
        }

        let decimals = self.fetch_decimals(&mint).await;
        let info = TokenInfo {
            mint,
            decimals,
            symbol,
        };
        self.cache().insert(mint, info.clone());
        Ok(info)
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, HashMap<Pubkey, TokenInfo>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn fetch_decimals(&self, mint: &Pubkey) -> u8 {
        if *mint == WRAPPED_SOL_MINT {
            return 9;
        }
        match self.chain.get_account_data(mint).await {
            Ok(Some(data)) if data.len() > MINT_DECIMALS_OFFSET => {
                let decimals = data[MINT_DECIMALS_OFFSET];
                if decimals <= 18 {
                    decimals
                } else {
                    tracing::warn!(%mint, decimals, "implausible mint decimals, assuming {FALLBACK_DECIMALS}");
                    FALLBACK_DECIMALS
                }
            }
            Ok(_) => {
                tracing::warn!(%mint, "mint account missing or short, assuming {FALLBACK_DECIMALS} decimals");
                FALLBACK_DECIMALS
            }
            Err(e) => {
                tracing::warn!(%mint, error = %e, "decimals lookup failed, assuming {FALLBACK_DECIMALS}");
                FALLBACK_DECIMALS
            }
        }
    }
}

/// Build an SPL mint account buffer with the given decimals, for tests.
#[doc(hidden)]
pub fn mint_account_data(decimals: u8) -> Vec<u8> {
    let mut data = vec![0u8; 82];
    data[MINT_DECIMALS_OFFSET] = decimals;
    data
}
