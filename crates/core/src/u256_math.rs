//! U256 helpers for token amounts.
//!
//! Amounts are always carried as raw `U256` in the token's smallest unit.
//! Conversions to `f64` and decimal strings are for display only.

use alloy::primitives::U256;

/// 10^exp as U256.
#[inline(always)]
pub fn pow10(exp: u8) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

/// One whole token in smallest units.
#[inline]
pub fn one_token(decimals: u8) -> U256 {
    pow10(decimals)
}

/// Parse a human amount like `"1"`, `"0.25"` or `"1_000"` into smallest units.
///
/// Returns `None` for malformed input or more fractional digits than `decimals`.
pub fn parse_token_amount(value: &str, decimals: u8) -> Option<U256> {
    let cleaned: String = value.trim().chars().filter(|c| *c != '_').collect();
    let (whole, frac) = match cleaned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (cleaned.as_str(), ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    if frac.len() > decimals as usize {
        return None;
    }

    let whole = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10).ok()?
    };
    let frac_units = if frac.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(frac, 10).ok()? * pow10(decimals - frac.len() as u8)
    };

    whole.checked_mul(one_token(decimals))?.checked_add(frac_units)
}

/// Smallest units to whole tokens as f64 (for display/logging only).
pub fn units_to_f64(amount: U256, decimals: u8) -> f64 {
    let divisor = one_token(decimals);
    let whole = amount / divisor;
    let frac = amount % divisor;

    let whole_f64 = u128::try_from(whole).map(|w| w as f64).unwrap_or(f64::MAX);
    let frac_f64 = u128::try_from(frac).map(|f| f as f64).unwrap_or(0.0)
        / 10f64.powi(decimals as i32);
    whole_f64 + frac_f64
}

/// Exact decimal rendering of a raw amount, trailing zeros trimmed.
pub fn format_units(amount: U256, decimals: u8) -> String {
    let divisor = one_token(decimals);
    let whole = amount / divisor;
    let frac = amount % divisor;
    if frac.is_zero() || decimals == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Worst-case native cost of `gas_limit` units at `price_per_gas` wei.
#[inline]
pub fn gas_cost(gas_limit: u64, price_per_gas: u128) -> U256 {
    U256::from(gas_limit) * U256::from(price_per_gas)
}
