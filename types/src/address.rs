//! Account addresses.
//!
//! An address is an opaque lowercase-hex string derived from a public key
//! hash (`0x` + 40 hex chars for real keys). The chain itself only compares
//! addresses byte-lexicographically, so test fixtures may use short literals
//! like `"0xa"`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An account address.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_byte_lexicographic() {
        let a = Address::new("0xa");
        let b = Address::new("0xb");
        assert!(a < b);
    }

    #[test]
    fn serializes_as_bare_string() {
        let a = Address::new("0xabc");
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"0xabc\"");
    }
}
