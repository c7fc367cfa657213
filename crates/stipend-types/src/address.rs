//! 20-byte chain addresses.
//!
//! Ronin tooling prints addresses as `ronin:<40 hex>`, while the RPC node
//! and contracts expect `0x<40 hex>`. Both forms parse to the same
//! [`Address`]; `Display` always produces the lowercase `0x` form.

use std::fmt;
use std::str::FromStr;

use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::{decode_fixed, TypesError};

/// Prefix used by Ronin wallets when displaying addresses.
pub const RONIN_PREFIX: &str = "ronin:";

/// A 20-byte account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, SerializeDisplay, DeserializeFromStr)]
pub struct Address([u8; 20]);

impl Address {
    /// Wrap raw address bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Raw address bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// The all-zero address. Never a valid transfer recipient.
    pub const fn zero() -> Self {
        Self([0u8; 20])
    }

    /// Whether this is the all-zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Render in the `ronin:` form used by wallets and explorers.
    pub fn to_ronin_string(&self) -> String {
        format!("{RONIN_PREFIX}{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let body = trimmed.strip_prefix(RONIN_PREFIX).unwrap_or(trimmed);
        decode_fixed::<20>(body).map(Self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "0x0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn test_parse_0x_and_ronin_forms() {
        let a: Address = HEX.parse().expect("0x form");
        let b: Address = "ronin:0123456789abcdef0123456789abcdef01234567"
            .parse()
            .expect("ronin form");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), HEX);
        assert_eq!(
            a.to_ronin_string(),
            "ronin:0123456789abcdef0123456789abcdef01234567"
        );
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let upper: Address = "0x0123456789ABCDEF0123456789ABCDEF01234567"
            .parse()
            .expect("upper");
        assert_eq!(upper.to_string(), HEX);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("not an address".parse::<Address>().is_err());
        assert!("0xzz23456789abcdef0123456789abcdef01234567"
            .parse::<Address>()
            .is_err());
    }

    #[test]
    fn test_serde_uses_display_form() {
        let addr: Address = HEX.parse().expect("parse");
        let json = serde_json::to_string(&addr).expect("serialize");
        assert_eq!(json, format!("\"{HEX}\""));
        let back: Address = serde_json::from_str("\"ronin:0123456789abcdef0123456789abcdef01234567\"")
            .expect("deserialize");
        assert_eq!(back, addr);
    }

    #[test]
    fn test_zero() {
        assert!(Address::zero().is_zero());
        assert!(!Address::from_bytes([1u8; 20]).is_zero());
    }
}
