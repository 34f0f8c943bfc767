use num_bigint::BigUint;
use num_traits::Num;

use crate::error::WalletError;

/// A parsed EIP-1559 dynamic fee, ready to be written into a draft
/// transaction's `max_fee_per_gas` / `max_priority_fee_per_gas` columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicFee {
    pub max_fee_per_gas: BigUint,
    pub max_priority_fee_per_gas: BigUint,
}

/// Parses the `FastFee` wire format `"{base}|{tip}|*{mult}"`.
///
/// `multipliedTip = tip * mult`; `maxPriorityFee = multipliedTip*2 + base`.
/// The persisted draft's `max_fee_per_gas` is `maxPriorityFee` and its
/// `max_priority_fee_per_gas` is `multipliedTip` — the naming inversion is
/// carried over verbatim from the source wire contract, not a typo.
pub fn parse_fast_fee(input: &str) -> Result<DynamicFee, WalletError> {
    let parts: Vec<&str> = input.split('|').collect();
    if parts.len() != 3 {
        return Err(WalletError::Config(format!(
            "malformed FastFee {input:?}: expected 3 '|'-separated fields"
        )));
    }
    let base = parse_uint(parts[0])?;
    let tip = parse_uint(parts[1])?;
    let mult_str = parts[2]
        .strip_prefix('*')
        .ok_or_else(|| WalletError::Config(format!("malformed FastFee multiplier {:?}", parts[2])))?;
    let mult = parse_uint(mult_str)?;

    let multiplied_tip = &tip * &mult;
    let max_priority_fee = &multiplied_tip * 2u32 + &base;

    Ok(DynamicFee {
        max_fee_per_gas: max_priority_fee,
        max_priority_fee_per_gas: multiplied_tip,
    })
}

fn parse_uint(s: &str) -> Result<BigUint, WalletError> {
    BigUint::from_str_radix(s, 10)
        .map_err(|e| WalletError::Config(format!("malformed FastFee integer {s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_seed_scenario_6() {
        let fee = parse_fast_fee("30000000000|2000000000|*3").unwrap();
        assert_eq!(fee.max_priority_fee_per_gas, BigUint::from(6_000_000_000u64));
        assert_eq!(fee.max_fee_per_gas, BigUint::from(42_000_000_000u64));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_fast_fee("not-a-fee").is_err());
        assert!(parse_fast_fee("1|2").is_err());
        assert!(parse_fast_fee("1|2|3").is_err());
    }
}
