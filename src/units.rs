use crate::error::{ConsoleError, Result};

pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;
const ETHER_DECIMALS: usize = 18;
const DISPLAY_DECIMALS: u32 = 6;

/// Converts a decimal ether amount (`1`, `0.5`, `.25`, `+2.`) into wei.
///
/// Negative amounts and amounts with more than 18 fractional digits are
/// rejected. Zero is accepted; callers decide whether it is meaningful.
pub fn parse_ether(text: &str) -> Result<u128> {
    let invalid = || ConsoleError::AmountError(format!("'{}' is not a valid ether amount", text));

    let (negative, unsigned) = match text.as_bytes().first() {
        Some(b'+') => (false, &text[1..]),
        Some(b'-') => (true, &text[1..]),
        _ => (false, text),
    };
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));

    let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !digits_only(whole) || !digits_only(fraction) {
        return Err(invalid());
    }
    // "5." is fine, "." and "" are not
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if unsigned.starts_with('.') && fraction.is_empty() {
        return Err(invalid());
    }
    if fraction.len() > ETHER_DECIMALS {
        return Err(ConsoleError::AmountError(format!(
            "'{}' has more than {} decimal places",
            text, ETHER_DECIMALS
        )));
    }

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let padded = format!("{:0<width$}", fraction, width = ETHER_DECIMALS);
    let fraction: u128 = padded.parse().map_err(|_| invalid())?;

    let wei = whole
        .checked_mul(WEI_PER_ETHER)
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(invalid)?;

    if negative && wei != 0 {
        return Err(ConsoleError::AmountError(format!("'{}' is negative", text)));
    }
    Ok(wei)
}

/// Renders wei as ether rounded to six decimal places.
pub fn format_ether(wei: u128) -> String {
    let unit = 10u128.pow(ETHER_DECIMALS as u32 - DISPLAY_DECIMALS);
    let scaled = wei.saturating_add(unit / 2) / unit;
    let scale = 10u128.pow(DISPLAY_DECIMALS);
    format!(
        "{}.{:0width$}",
        scaled / scale,
        scaled % scale,
        width = DISPLAY_DECIMALS as usize
    )
}

/// `0x` followed by exactly 40 hex digits.
pub fn is_address(text: &str) -> bool {
    text.strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}
