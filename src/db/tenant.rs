use crate::error::WalletError;

/// A validated tenant ("business") identifier. Every data-access call
/// takes a `TenantId` handle rather than a raw string — the identifier
/// is checked against `[A-Za-z0-9_-]{1,64}` exactly once, at
/// construction, instead of at every table-name format call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantId(String);

impl TenantId {
    pub fn parse(raw: &str) -> Result<Self, WalletError> {
        let valid_len = !raw.is_empty() && raw.len() <= 64;
        let valid_chars = raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if valid_len && valid_chars {
            Ok(TenantId(raw.to_string()))
        } else {
            Err(WalletError::InvalidTenantId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the per-tenant table name for `base` (e.g. `addresses` ->
    /// `addresses_T`). Safe to interpolate into SQL because the tenant id
    /// was validated at construction and `base` is always one of this
    /// crate's own fixed literals, never user input.
    pub fn table(&self, base: &str) -> String {
        format!("{base}_{}", self.0)
    }
}

pub const TENANT_TABLE_BASES: &[&str] = &[
    "addresses",
    "balances",
    "deposits",
    "withdraws",
    "internals",
    "transactions",
    "tokens",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_safe_identifiers() {
        assert!(TenantId::parse("acme-exchange_1").is_ok());
        assert!(TenantId::parse(&"a".repeat(64)).is_ok());
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        assert!(TenantId::parse("acme; DROP TABLE business;--").is_err());
        assert!(TenantId::parse("").is_err());
        assert!(TenantId::parse(&"a".repeat(65)).is_err());
        assert!(TenantId::parse("has space").is_err());
    }

    #[test]
    fn table_name_is_suffixed() {
        let t = TenantId::parse("acme").unwrap();
        assert_eq!(t.table("addresses"), "addresses_acme");
    }
}
