use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical lowercase-hex form of a 20-byte EVM address. Stored and
/// compared lowercase everywhere to avoid mismatched-case addresses
/// being treated as distinct rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    pub fn from_hex(s: &str) -> Self {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        Address(format!("0x{}", trimmed.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical lowercase-hex form of a 32-byte chain hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash(String);

impl Hash {
    pub fn from_hex(s: &str) -> Self {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        Hash(format!("0x{}", trimmed.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    User,
    Hot,
    Cold,
}

impl AddressType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressType::User => "user",
            AddressType::Hot => "hot",
            AddressType::Cold => "cold",
        }
    }
}

impl std::str::FromStr for AddressType {
    type Err = crate::error::WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(AddressType::User),
            "hot" => Ok(AddressType::Hot),
            "cold" => Ok(AddressType::Cold),
            other => Err(crate::error::WalletError::Config(format!(
                "unknown address type {other}"
            ))),
        }
    }
}

/// Resolved transaction classification, derived from the address types of
/// the transaction's `from`/`to` endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    Deposit,
    Withdraw,
    Collection,
    HotToCold,
    ColdToHot,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Deposit => "deposit",
            TxType::Withdraw => "withdraw",
            TxType::Collection => "collection",
            TxType::HotToCold => "hot_to_cold",
            TxType::ColdToHot => "cold_to_hot",
        }
    }

    /// Classifies a transaction given the tenant-resolved address types of
    /// its `from`/`to` endpoints. Returns `None` when the combination is
    /// not attributable to this tenant ("ignored").
    pub fn classify(from_type: Option<AddressType>, to_type: Option<AddressType>) -> Option<Self> {
        use AddressType::*;
        match (from_type, to_type) {
            (None, Some(User)) => Some(TxType::Deposit),
            (Some(Hot), None) => Some(TxType::Withdraw),
            (Some(User), Some(Hot)) => Some(TxType::Collection),
            (Some(Hot), Some(Cold)) => Some(TxType::HotToCold),
            (Some(Cold), Some(Hot)) => Some(TxType::ColdToHot),
            _ => None,
        }
    }
}

/// Shared status state machine for Deposit/Withdraw/Internal rows: a
/// tagged variant instead of a free string column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    CreateUnsigned,
    Signed,
    Broadcasted,
    WalletDone,
    Notified,
    Success,
    Fallback,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::CreateUnsigned => "create_unsigned",
            TxStatus::Signed => "signed",
            TxStatus::Broadcasted => "broadcasted",
            TxStatus::WalletDone => "wallet_done",
            TxStatus::Notified => "notified",
            TxStatus::Success => "success",
            TxStatus::Fallback => "fallback",
        }
    }
}

impl std::str::FromStr for TxStatus {
    type Err = crate::error::WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "create_unsigned" => TxStatus::CreateUnsigned,
            "signed" => TxStatus::Signed,
            "broadcasted" => TxStatus::Broadcasted,
            "wallet_done" => TxStatus::WalletDone,
            "notified" => TxStatus::Notified,
            "success" => TxStatus::Success,
            "fallback" => TxStatus::Fallback,
            other => {
                return Err(crate::error::WalletError::Config(format!(
                    "unknown tx status {other}"
                )))
            }
        })
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A chain block header as returned by the RPC client and stored in the
/// `blocks` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub hash: Hash,
    pub parent_hash: Hash,
    pub number: i64,
    pub timestamp: i64,
}

/// A transaction as returned by the chain RPC's per-block transaction
/// listing, before any tenant classification is applied.
#[derive(Debug, Clone)]
pub struct ChainTransaction {
    pub hash: Hash,
    pub from: Address,
    pub to: Option<Address>,
    pub value: BigUint,
    pub fee: BigUint,
    pub token_address: Option<Address>,
    pub token_id: Option<String>,
    pub token_meta: Option<String>,
}

/// A typed balance delta event. `kind` determines which column(s) the
/// event touches and in which direction; `negate()` produces the
/// fallback-reversal inverse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDelta {
    pub address: Address,
    pub token_address: Address,
    pub address_type: AddressType,
    pub kind: DeltaKind,
    pub amount: BigUintWire,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaKind {
    Credit,
    Debit,
    LockUp,
    LockDown,
}

impl DeltaKind {
    pub fn negate(self) -> Self {
        match self {
            DeltaKind::Credit => DeltaKind::Debit,
            DeltaKind::Debit => DeltaKind::Credit,
            DeltaKind::LockUp => DeltaKind::LockDown,
            DeltaKind::LockDown => DeltaKind::LockUp,
        }
    }
}

impl BalanceDelta {
    pub fn negate(&self) -> Self {
        BalanceDelta {
            address: self.address.clone(),
            token_address: self.token_address.clone(),
            address_type: self.address_type,
            kind: self.kind.negate(),
            amount: self.amount.clone(),
        }
    }
}

/// Wrapper so `BigUint` can ride inside `serde`-derived structs as a
/// decimal string (its wire/storage form everywhere in this crate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigUintWire(pub BigUint);

impl Serialize for BigUintWire {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for BigUintWire {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<BigUint>()
            .map(BigUintWire)
            .map_err(serde::de::Error::custom)
    }
}

impl From<BigUint> for BigUintWire {
    fn from(v: BigUint) -> Self {
        BigUintWire(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_canonicalizes_lowercase() {
        let a = Address::from_hex("0xDEADBEEF00000000000000000000000000000001");
        assert_eq!(a.as_str(), "0xdeadbeef00000000000000000000000000000001");
    }

    #[test]
    fn classify_deposit() {
        assert_eq!(
            TxType::classify(None, Some(AddressType::User)),
            Some(TxType::Deposit)
        );
    }

    #[test]
    fn classify_withdraw() {
        assert_eq!(
            TxType::classify(Some(AddressType::Hot), None),
            Some(TxType::Withdraw)
        );
    }

    #[test]
    fn classify_collection() {
        assert_eq!(
            TxType::classify(Some(AddressType::User), Some(AddressType::Hot)),
            Some(TxType::Collection)
        );
    }

    #[test]
    fn classify_ignored_when_both_unknown() {
        assert_eq!(TxType::classify(None, None), None);
    }

    #[test]
    fn classify_ignored_user_to_user() {
        assert_eq!(
            TxType::classify(Some(AddressType::User), Some(AddressType::User)),
            None
        );
    }

    #[test]
    fn delta_negate_round_trips() {
        let d = BalanceDelta {
            address: Address::from_hex("0x01"),
            token_address: Address::from_hex("0x02"),
            address_type: AddressType::Hot,
            kind: DeltaKind::Credit,
            amount: BigUint::from(100u32).into(),
        };
        let negated = d.negate();
        assert_eq!(negated.kind, DeltaKind::Debit);
        assert_eq!(negated.negate().kind, DeltaKind::Credit);
    }
}
