//! Address lookup table loading and parsing.
//!
//! An ALT account's data is a fixed 61-byte header followed by packed
//! 32-byte addresses. A buffer shorter than the header is a valid but
//! unpopulated table; a trailing partial chunk is truncated.

use solana_sdk::address_lookup_table::AddressLookupTableAccount;
use solana_sdk::pubkey::Pubkey;

use crate::chain::ChainRpc;
use crate::error::SwapError;

/// Bytes before the packed address array in an ALT account.
pub const LOOKUP_TABLE_HEADER_LEN: usize = 61;

/// Parse raw ALT account data into its ordered address list.
pub fn parse_lookup_table(table_key: Pubkey, data: &[u8]) -> AddressLookupTableAccount {
    let addresses = data
        .get(LOOKUP_TABLE_HEADER_LEN..)
        .map(|body| {
            body.chunks_exact(32)
                .filter_map(|chunk| Pubkey::try_from(chunk).ok())
                .collect()
        })
        .unwrap_or_default();

    AddressLookupTableAccount {
        key: table_key,
        addresses,
    }
}

/// Fetch and parse every table a quote references, in order.
pub async fn load_lookup_tables(
    chain: &dyn ChainRpc,
    table_keys: &[Pubkey],
) -> Result<Vec<AddressLookupTableAccount>, SwapError> {
    let mut tables = Vec::with_capacity(table_keys.len());
    for key in table_keys {
        let data = chain
            .get_account_data(key)
            .await?
            .ok_or_else(|| SwapError::AccountNotFound(format!("lookup table {key}")))?;
        let table = parse_lookup_table(*key, &data);
        tracing::debug!(table = %key, addresses = table.addresses.len(), "loaded lookup table");
        tables.push(table);
    }
    Ok(tables)
}
