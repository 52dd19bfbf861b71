use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! newtype_string {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Return the inner string as a str slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(MarketId, "Identifies a lending market within a protocol (e.g. a Morpho Blue market id).");
newtype_string!(Address, "A chain address, lowercase-hex, not checksummed by this crate.");
newtype_string!(UserId, "The id of the user who owns a signal.");
newtype_string!(ProtocolTag, "A protocol tag scoping a signal to a single integration (e.g. \"morpho-blue\").");

/// A chain identifier (EVM numeric chain id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// A signal's unique identifier (UUID-v4, assigned on creation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalId(pub Uuid);

impl SignalId {
    /// Generate a fresh random signal id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SignalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_from_str() {
        let m = MarketId::from("m1");
        assert_eq!(m.as_str(), "m1");
        assert_eq!(&*m, "m1");
    }

    #[test]
    fn newtype_serde_roundtrip() {
        let a = Address::new("0xabc");
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "\"0xabc\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn chain_id_display() {
        assert_eq!(ChainId(1).to_string(), "1");
    }

    #[test]
    fn signal_id_roundtrip() {
        let id = SignalId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: SignalId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
