//! Parsing of raw numeric response fields.
//!
//! A height of zero is rejected everywhere.

/// Parses an EVM quantity: `0x`-prefixed hex or plain decimal.
///
/// # Errors
///
/// Returns a description of the problem when the value is empty, not a number,
/// overflows `u64`, or is zero.
pub fn parse_block_number(raw: &str) -> Result<u64, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("empty block number".to_string());
    }

    let parsed = if let Some(hex) =
        trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16)
    } else {
        trimmed.parse::<u64>()
    };

    match parsed {
        Ok(0) => Err("block number is zero".to_string()),
        Ok(height) => Ok(height),
        Err(e) => Err(format!("invalid block number {trimmed:?}: {e}")),
    }
}

/// Parses a decimal block height as reported by CometBFT and Cosmos SDK REST.
///
/// # Errors
///
/// Returns a description of the problem when the value is not a positive
/// decimal integer.
pub fn parse_decimal_height(raw: &str) -> Result<u64, String> {
    let trimmed = raw.trim();
    match trimmed.parse::<u64>() {
        Ok(0) => Err("block height is zero".to_string()),
        Ok(height) => Ok(height),
        Err(e) => Err(format!("invalid block height {trimmed:?}: {e}")),
    }
}
