//! Conversions from wire quote types to domain types.
//!
//! Pubkey lengths are validated here; a bad length is a fatal decode
//! error carrying the field path, never the raw bytes.

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use crate::error::WireError;
use crate::quotes::{Quote, QuoteBatch, QuoteExecution};
use crate::wire::types::{QuotePayload, SwapQuotes, WireInstruction, WireQuote};

fn pubkey_at(bytes: &[u8], path: &str) -> Result<Pubkey, WireError> {
    Pubkey::try_from(bytes).map_err(|_| {
        WireError::decode(path, format!("expected 32-byte pubkey, got {} bytes", bytes.len()))
    })
}

fn instruction_from_wire(ix: WireInstruction, path: &str) -> Result<Instruction, WireError> {
    let program_id = pubkey_at(&ix.program_id, &format!("{path}.program_id"))?;
    let accounts = ix
        .accounts
        .into_iter()
        .enumerate()
        .map(|(i, meta)| {
            let pubkey = pubkey_at(&meta.pubkey, &format!("{path}.accounts[{i}].pubkey"))?;
            Ok(AccountMeta {
                pubkey,
                is_signer: meta.is_signer,
                is_writable: meta.is_writable,
            })
        })
        .collect::<Result<Vec<_>, WireError>>()?;

    Ok(Instruction {
        program_id,
        accounts,
        data: ix.data.into_vec(),
    })
}

pub fn quote_from_wire(quote: WireQuote, index: usize) -> Result<Quote, WireError> {
    let path = format!("quotes[{index}]");
    let execution = match quote.payload {
        QuotePayload::Prebuilt { transaction } => QuoteExecution::Prebuilt {
            transaction: transaction.into_vec(),
        },
        QuotePayload::Instructions {
            instructions,
            lookup_tables,
        } => {
            let instructions = instructions
                .into_iter()
                .enumerate()
                .map(|(i, ix)| instruction_from_wire(ix, &format!("{path}.instructions[{i}]")))
                .collect::<Result<Vec<_>, WireError>>()?;
            let lookup_tables = lookup_tables
                .iter()
                .enumerate()
                .map(|(i, key)| pubkey_at(key, &format!("{path}.lookup_tables[{i}]")))
                .collect::<Result<Vec<_>, WireError>>()?;
            QuoteExecution::Instructions {
                instructions,
                lookup_tables,
            }
        }
    };

    Ok(Quote {
        provider_id: quote.provider_id,
        route: quote.route,
        in_amount: quote.in_amount,
        out_amount: quote.out_amount,
        price_impact_bps: quote.price_impact_bps,
        platform_fee_bps: quote.platform_fee_bps,
        compute_units: quote.compute_units,
        execution,
    })
}

pub fn batch_from_wire(batch: SwapQuotes) -> Result<QuoteBatch, WireError> {
    let quotes = batch
        .quotes
        .into_iter()
        .enumerate()
        .map(|(i, q)| quote_from_wire(q, i))
        .collect::<Result<Vec<_>, WireError>>()?;
    Ok(QuoteBatch { quotes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::types::WireAccountMeta;
    use serde_bytes::ByteBuf;

    fn wire_quote(payload: QuotePayload) -> WireQuote {
        WireQuote {
            provider_id: "A".to_string(),
            route: vec!["Orca".to_string(), "Raydium".to_string()],
            in_amount: 50_000_000,
            out_amount: 9_721_400,
            price_impact_bps: 12,
            platform_fee_bps: 5,
            compute_units: Some(200_000),
            payload,
        }
    }

    #[test]
    fn test_instruction_accounts_preserved_verbatim() {
        let program = Pubkey::new_unique();
        let signer = Pubkey::new_unique();
        let readonly = Pubkey::new_unique();
        let quote = wire_quote(QuotePayload::Instructions {
            instructions: vec![WireInstruction {
                program_id: ByteBuf::from(program.to_bytes().to_vec()),
                accounts: vec![
                    WireAccountMeta {
                        pubkey: ByteBuf::from(signer.to_bytes().to_vec()),
                        is_signer: true,
                        is_writable: true,
                    },
                    WireAccountMeta {
                        pubkey: ByteBuf::from(readonly.to_bytes().to_vec()),
                        is_signer: false,
                        is_writable: false,
                    },
                ],
                data: ByteBuf::from(vec![9, 8, 7]),
            }],
            lookup_tables: vec![],
        });

        let converted = quote_from_wire(quote, 0).unwrap();
        match converted.execution {
            QuoteExecution::Instructions { instructions, .. } => {
                let ix = &instructions[0];
                assert_eq!(ix.program_id, program);
                assert_eq!(ix.accounts[0].pubkey, signer);
                assert!(ix.accounts[0].is_signer);
                assert!(ix.accounts[0].is_writable);
                assert_eq!(ix.accounts[1].pubkey, readonly);
                assert!(!ix.accounts[1].is_signer);
                assert!(!ix.accounts[1].is_writable);
                assert_eq!(ix.data, vec![9, 8, 7]);
            }
            other => panic!("expected instructions, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_pubkey_length_names_field_path() {
        let quote = wire_quote(QuotePayload::Instructions {
            instructions: vec![],
            lookup_tables: vec![ByteBuf::from(vec![1u8; 31])],
        });
        let err = quote_from_wire(quote, 3).unwrap_err();
        match err {
            WireError::Decode { path, reason } => {
                assert_eq!(path, "quotes[3].lookup_tables[0]");
                assert!(reason.contains("31"));
            }
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    #[test]
    fn test_prebuilt_payload_carried_through() {
        let quote = wire_quote(QuotePayload::Prebuilt {
            transaction: ByteBuf::from(vec![1, 2, 3]),
        });
        let converted = quote_from_wire(quote, 0).unwrap();
        assert_eq!(
            converted.execution,
            QuoteExecution::Prebuilt {
                transaction: vec![1, 2, 3]
            }
        );
        assert_eq!(converted.out_amount, 9_721_400);
        assert_eq!(converted.route.len(), 2);
    }
}
