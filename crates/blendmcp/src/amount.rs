use alloy::primitives::U256;
use eyre::Context as _;

fn pow10(decimals: u32) -> eyre::Result<U256> {
    U256::from(10_u64)
        .checked_pow(U256::from(decimals))
        .ok_or_else(|| eyre::eyre!("decimals too large"))
}

/// Parse a human decimal string into the pool's base-unit integer.
///
/// The conversion is exact: inputs with more fractional digits than the token
/// supports are rejected rather than truncated.
pub fn parse_amount_ui_to_base(s: &str, decimals: u32) -> eyre::Result<U256> {
    let s = s.trim();
    if s.is_empty() {
        eyre::bail!("empty amount");
    }
    if s.starts_with('-') {
        eyre::bail!("amount must be non-negative");
    }

    let (whole, frac) = match s.split_once('.') {
        Some((a, b)) => (a, b),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        eyre::bail!("empty amount");
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) {
        eyre::bail!("amount is not a decimal number");
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        eyre::bail!("amount is not a decimal number");
    }
    if frac.len() > decimals as usize {
        eyre::bail!("too many decimal places for token (decimals={decimals})");
    }

    let whole_v = if whole.is_empty() {
        U256::ZERO
    } else {
        whole.parse::<U256>().context("parse whole part")?
    };

    let mut frac_s = frac.to_owned();
    while frac_s.len() < decimals as usize {
        frac_s.push('0');
    }
    let frac_v = if frac_s.is_empty() {
        U256::ZERO
    } else {
        frac_s.parse::<U256>().context("parse fractional part")?
    };

    let scale = pow10(decimals)?;
    whole_v
        .checked_mul(scale)
        .and_then(|x| x.checked_add(frac_v))
        .ok_or_else(|| eyre::eyre!("amount overflow"))
}

/// Format a base-unit integer back into a human decimal string without floats.
///
/// Trailing fractional zeros are trimmed, so this is the normalizing inverse
/// of `parse_amount_ui_to_base`.
pub fn format_amount_base_to_ui(base: U256, decimals: u32) -> eyre::Result<String> {
    if decimals == 0 {
        return Ok(base.to_string());
    }
    let scale = pow10(decimals)?;
    let whole = base / scale;
    let frac = base % scale;
    if frac.is_zero() {
        return Ok(whole.to_string());
    }
    let mut frac_s = frac.to_string();
    while frac_s.len() < decimals as usize {
        frac_s.insert(0, '0');
    }
    while frac_s.ends_with('0') {
        frac_s.pop();
    }
    Ok(format!("{whole}.{frac_s}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ui_amount_basic() {
        let v1 = parse_amount_ui_to_base("1", 6);
        assert!(v1.is_ok(), "parse failed: {v1:?}");
        assert_eq!(v1.ok(), Some(U256::from(1_000_000_u64)));

        let v = parse_amount_ui_to_base("100.5", 6);
        assert!(v.is_ok(), "parse failed: {v:?}");
        assert_eq!(v.ok(), Some(U256::from(100_500_000_u64)));

        let v = parse_amount_ui_to_base("0.001", 8);
        assert!(v.is_ok(), "parse failed: {v:?}");
        assert_eq!(v.ok(), Some(U256::from(100_000_u64)));

        let v = parse_amount_ui_to_base("1", 18);
        assert!(v.is_ok(), "parse failed: {v:?}");
        assert_eq!(v.ok(), Some(U256::from(1_000_000_000_000_000_000_u128)));

        let v0 = parse_amount_ui_to_base("0", 18);
        assert!(v0.is_ok(), "parse failed: {v0:?}");
        assert_eq!(v0.ok(), Some(U256::ZERO));
    }

    #[test]
    fn parse_ui_rejects_too_many_decimals() {
        let r = parse_amount_ui_to_base("1.0000001", 6);
        assert!(r.is_err(), "expected error, got ok");
        if let Err(err) = r {
            assert!(err.to_string().contains("too many decimal places"));
        }
    }

    #[test]
    fn parse_ui_rejects_garbage() {
        for bad in ["", " ", "-1", "-0.5", "1e6", "one", "1.2.3", "0x10", "."] {
            assert!(
                parse_amount_ui_to_base(bad, 6).is_err(),
                "should reject {bad:?}"
            );
        }
    }

    #[test]
    fn parse_is_exact_no_truncation() {
        let v = parse_amount_ui_to_base("0.000001", 6);
        assert_eq!(v.ok(), Some(U256::from(1_u64)));
        // One digit past the token's precision must fail, not round.
        assert!(parse_amount_ui_to_base("0.0000001", 6).is_err());
    }

    #[test]
    fn format_base_to_ui() -> eyre::Result<()> {
        assert_eq!(
            format_amount_base_to_ui(U256::from(1_500_000_u64), 6)?,
            "1.5"
        );
        assert_eq!(format_amount_base_to_ui(U256::from(1_u64), 6)?, "0.000001");
        assert_eq!(format_amount_base_to_ui(U256::from(10_000_000_u64), 6)?, "10");
        assert_eq!(format_amount_base_to_ui(U256::ZERO, 18)?, "0");
        Ok(())
    }

    #[test]
    fn round_trip_normalizes() -> eyre::Result<()> {
        for (s, d, normalized) in [
            ("100.5", 6_u32, "100.5"),
            ("100.50", 6, "100.5"),
            ("007", 6, "7"),
            ("0.1000", 18, "0.1"),
            ("42", 0, "42"),
        ] {
            let base = parse_amount_ui_to_base(s, d)?;
            assert_eq!(format_amount_base_to_ui(base, d)?, normalized, "input {s}");
        }
        Ok(())
    }
}
