//! Human-facing display-field formatting for signing requests. Pure
//! string/byte transforms, no I/O, so they're exercised directly by unit
//! tests rather than through a live dispatch.

use alloy::primitives::U256;

/// An ordered key -> display string map, order matters to callers rendering
/// an approval prompt.
pub type DisplayFields = Vec<(String, String)>;

fn is_printable_byte(b: u8) -> bool {
    matches!(b, 0x20..=0x7E | 0x09 | 0x0A | 0x0D)
}

fn decode_hex_bytes(hex_payload: &str) -> Option<Vec<u8>> {
    let stripped = hex_payload.strip_prefix("0x").unwrap_or(hex_payload);
    hex::decode(stripped).ok()
}

/// Decodes a `0x`-prefixed hex payload to UTF-8 text only when every byte is
/// printable ASCII or tab/CR/LF; otherwise returns the original hex string.
pub fn decode_utf8_if_printable(hex_payload: &str) -> String {
    let Some(bytes) = decode_hex_bytes(hex_payload) else {
        return hex_payload.to_string();
    };
    if !bytes.iter().all(|&b| is_printable_byte(b)) {
        return hex_payload.to_string();
    }
    String::from_utf8(bytes).unwrap_or_else(|_| hex_payload.to_string())
}

pub fn personal_sign_display(hex_payload: &str) -> DisplayFields {
    vec![("message".to_string(), decode_utf8_if_printable(hex_payload))]
}

pub fn typed_data_display(
    domain_name: Option<&str>,
    primary_type: Option<&str>,
    message: &serde_json::Value,
) -> DisplayFields {
    vec![
        ("domain".to_string(), domain_name.unwrap_or("Unknown").to_string()),
        (
            "primaryType".to_string(),
            primary_type.unwrap_or("Unknown").to_string(),
        ),
        (
            "data".to_string(),
            serde_json::to_string_pretty(message).unwrap_or_default(),
        ),
    ]
}

fn format_wei_value(value_hex: Option<&str>) -> String {
    let Some(hex_str) = value_hex else {
        return "0 ETH".to_string();
    };
    let trimmed = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    if trimmed.is_empty() {
        return "0 ETH".to_string();
    }
    match U256::from_str_radix(trimmed, 16) {
        Ok(wei) if wei.is_zero() => "0 ETH".to_string(),
        Ok(wei) => format!("{} ETH", trim_trailing_zeros(&alloy::primitives::utils::format_ether(wei))),
        Err(_) => hex_str.to_string(),
    }
}

/// `format_ether` always prints 18 fractional digits; trim the noise so
/// "1 ETH" doesn't render as "1.000000000000000000 ETH".
fn trim_trailing_zeros(amount: &str) -> String {
    if !amount.contains('.') {
        return amount.to_string();
    }
    let trimmed = amount.trim_end_matches('0');
    trimmed.strip_suffix('.').unwrap_or(trimmed).to_string()
}

fn format_calldata(data_hex: Option<&str>) -> String {
    match data_hex {
        None => "(none)".to_string(),
        Some(h) if h.is_empty() || h == "0x" => "(none)".to_string(),
        Some(h) => {
            let prefix: String = h.chars().take(20).collect();
            let byte_len = h.len().saturating_sub(2) / 2;
            format!("{prefix}…({byte_len} bytes)")
        }
    }
}

pub fn send_transaction_display(
    to: Option<&str>,
    value_hex: Option<&str>,
    data_hex: Option<&str>,
    gas_hex: Option<&str>,
) -> DisplayFields {
    vec![
        (
            "to".to_string(),
            to.map(str::to_string)
                .unwrap_or_else(|| "(contract creation)".to_string()),
        ),
        ("value".to_string(), format_wei_value(value_hex)),
        ("data".to_string(), format_calldata(data_hex)),
        (
            "gas".to_string(),
            gas_hex.map(str::to_string).unwrap_or_else(|| "auto".to_string()),
        ),
    ]
}
