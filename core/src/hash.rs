//! Fixed-width [`Hash`] and [`Address`] primitives.
//!
//! Both serialize to the canonical `0x`-prefixed hex string form required by
//! §6's canonical serialization rule, regardless of the in-memory byte
//! layout, so that hashing a struct containing either type is stable across
//! languages and produces the same wire bytes `bincode` never would.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A 32-byte content hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash(pub [u8; 32]);

/// A 20-byte account address, derived from a public key (§6).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

macro_rules! fixed_bytes {
    ($ty:ident, $len:expr) => {
        impl $ty {
            pub const ZERO: $ty = $ty([0u8; $len]);

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; $len]
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn from_slice(b: &[u8]) -> Self {
                let mut out = [0u8; $len];
                let n = b.len().min($len);
                out[..n].copy_from_slice(&b[..n]);
                $ty(out)
            }

            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($ty), self.to_hex())
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl FromStr for $ty {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(s)?;
                Ok($ty::from_slice(&bytes))
            }
        }

        impl From<[u8; $len]> for $ty {
            fn from(b: [u8; $len]) -> Self {
                $ty(b)
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                struct HexVisitor;
                impl<'de> Visitor<'de> for HexVisitor {
                    type Value = $ty;

                    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                        write!(f, "a 0x-prefixed hex string of {} bytes", $len)
                    }

                    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                        $ty::from_str(v).map_err(E::custom)
                    }
                }
                deserializer.deserialize_str(HexVisitor)
            }
        }
    };
}

fixed_bytes!(Hash, 32);
fixed_bytes!(Address, 20);

/// Derives an [`Address`] from a public key (§6): hash the key, keep the
/// last 20 bytes, hash again, keep the first 20 bytes. Two rounds so a
/// truncated intermediate hash never directly exposes key material.
pub fn address_from_pubkey(pubkey: &ed25519_dalek::PublicKey) -> Address {
    let first = crate::canonical::sha256(pubkey.as_bytes());
    let second = crate::canonical::sha256(&first.0[12..]);
    Address::from_slice(&second.0[..20])
}
