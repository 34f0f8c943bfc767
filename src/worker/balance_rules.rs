use num_bigint::BigUint;

use crate::types::{Address, AddressType, BalanceDelta, DeltaKind, TxType};

/// Pure per-tx-type mapping from a classified chain transaction to the
/// balance events it produces. The fallback worker reconstructs the same
/// deltas from a flow row and negates each one to reverse a confirmed
/// movement — one `negate()` covers every direction because the handlers
/// live here, not scattered across Finder's match arms.
pub fn balance_deltas(
    tx_type: TxType,
    from: &Address,
    to: Option<&Address>,
    token_address: &Address,
    amount: &BigUint,
) -> Vec<BalanceDelta> {
    let amount = amount.clone();
    match tx_type {
        TxType::Deposit => vec![BalanceDelta {
            address: to.expect("deposit always has a to-address").clone(),
            token_address: token_address.clone(),
            address_type: AddressType::User,
            kind: DeltaKind::Credit,
            amount: amount.into(),
        }],
        TxType::Withdraw => vec![BalanceDelta {
            address: from.clone(),
            token_address: token_address.clone(),
            address_type: AddressType::Hot,
            kind: DeltaKind::Debit,
            amount: amount.into(),
        }],
        TxType::Collection => vec![
            BalanceDelta {
                address: from.clone(),
                token_address: token_address.clone(),
                address_type: AddressType::User,
                kind: DeltaKind::Debit,
                amount: amount.clone().into(),
            },
            BalanceDelta {
                address: to.expect("collection always has a to-address").clone(),
                token_address: token_address.clone(),
                address_type: AddressType::Hot,
                kind: DeltaKind::Credit,
                amount: amount.into(),
            },
        ],
        TxType::HotToCold => vec![
            BalanceDelta {
                address: from.clone(),
                token_address: token_address.clone(),
                address_type: AddressType::Hot,
                kind: DeltaKind::Debit,
                amount: amount.clone().into(),
            },
            BalanceDelta {
                address: to.expect("hot-to-cold always has a to-address").clone(),
                token_address: token_address.clone(),
                address_type: AddressType::Cold,
                kind: DeltaKind::Credit,
                amount: amount.into(),
            },
        ],
        TxType::ColdToHot => vec![
            BalanceDelta {
                address: from.clone(),
                token_address: token_address.clone(),
                address_type: AddressType::Cold,
                kind: DeltaKind::Debit,
                amount: amount.clone().into(),
            },
            BalanceDelta {
                address: to.expect("cold-to-hot always has a to-address").clone(),
                token_address: token_address.clone(),
                address_type: AddressType::Hot,
                kind: DeltaKind::Credit,
                amount: amount.into(),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::from_hex(s)
    }

    #[test]
    fn collection_conserves_amount() {
        let deltas = balance_deltas(
            TxType::Collection,
            &addr("0x1"),
            Some(&addr("0x2")),
            &addr("0xtoken"),
            &BigUint::from(100u32),
        );
        let signed_sum: i64 = deltas
            .iter()
            .map(|d| match d.kind {
                DeltaKind::Credit | DeltaKind::LockDown => d.amount.0.to_string().parse::<i64>().unwrap(),
                DeltaKind::Debit | DeltaKind::LockUp => -d.amount.0.to_string().parse::<i64>().unwrap(),
            })
            .sum();
        assert_eq!(signed_sum, 0);
    }

    #[test]
    fn hot_to_cold_conserves_amount() {
        let deltas = balance_deltas(
            TxType::HotToCold,
            &addr("0x1"),
            Some(&addr("0x2")),
            &addr("0xtoken"),
            &BigUint::from(250u32),
        );
        let signed_sum: i64 = deltas
            .iter()
            .map(|d| match d.kind {
                DeltaKind::Credit | DeltaKind::LockDown => d.amount.0.to_string().parse::<i64>().unwrap(),
                DeltaKind::Debit | DeltaKind::LockUp => -d.amount.0.to_string().parse::<i64>().unwrap(),
            })
            .sum();
        assert_eq!(signed_sum, 0);
    }

    #[test]
    fn deposit_is_credit_only() {
        let deltas = balance_deltas(TxType::Deposit, &addr("0x1"), Some(&addr("0x2")), &addr("0xtoken"), &BigUint::from(10u32));
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].kind, DeltaKind::Credit);
    }
}
