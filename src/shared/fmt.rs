//! Number formatting for the live quote table.
//!
//! Magnitude-dependent decimal places with thousands separators, so large
//! and dust-sized amounts both stay readable in a fixed-width column.

use rust_decimal::Decimal;

/// Trims trailing zeros, adds thousands separators.
pub fn display_formatted_string(formatted: String) -> String {
    let trimmed = if formatted.contains('.') {
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        formatted
    };

    let parts = trimmed.split('.').collect::<Vec<_>>();

    let integer_part = parts[0]
        .chars()
        .rev()
        .collect::<String>()
        .as_bytes()
        .chunks(3)
        .map(|c| std::str::from_utf8(c).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(",")
        .chars()
        .rev()
        .collect::<String>();

    let integer_part = integer_part
        .strip_prefix("-,")
        .or_else(|| integer_part.strip_prefix(","))
        .unwrap_or(&integer_part)
        .to_string();

    if parts.len() > 1 {
        format!("{}.{}", integer_part, parts[1])
    } else {
        integer_part
    }
}

fn places_for(value: &Decimal) -> u32 {
    let abs = value.abs();
    if abs >= Decimal::from(1000) {
        2
    } else if abs >= Decimal::ONE {
        4
    } else {
        8
    }
}

/// Format a token amount for a table cell.
pub fn display_amount(value: &Decimal) -> String {
    let rounded = value.round_dp(places_for(value));
    display_formatted_string(rounded.to_string())
}

/// Format an out/in rate for a table cell. Display only; never fed back
/// into any amount computation.
pub fn display_rate(rate: f64) -> String {
    let formatted = if rate >= 1000.0 {
        format!("{rate:.2}")
    } else if rate >= 1.0 {
        format!("{rate:.4}")
    } else {
        format!("{rate:.8}")
    };
    display_formatted_string(formatted)
}
