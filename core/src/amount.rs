//! Arbitrary-precision unsigned amount used for balances, transaction
//! value, cost and gas accounting (§3, §4.5 "numeric arithmetic on balances
//! is arbitrary-precision unsigned").
//!
//! Backed by [`primitive_types::U256`] — the pack's common choice for
//! chain-scale unsigned integers — but serialized as a decimal string per
//! §6's canonical serialization rule rather than `U256`'s native hex serde.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

use primitive_types::U256;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Amount(pub U256);

impl Amount {
    pub const ZERO: Amount = Amount(U256::zero());

    pub fn from_u64(v: u64) -> Self {
        Amount(U256::from(v))
    }

    /// Checked addition; `None` on overflow.
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// Checked subtraction; `None` if `rhs > self`.
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The largest representable amount, used as a saturating ceiling.
    pub fn max_value() -> Amount {
        Amount(U256::max_value())
    }

}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = primitive_types::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_dec_str(s).map(Amount)
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Amount::from_u64(v)
    }
}

impl Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;
    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Amount) {
        self.0 -= rhs.0;
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |a, b| a + b)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DecVisitor;
        impl<'de> Visitor<'de> for DecVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a decimal integer string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Amount::from_str(v).map_err(|e| E::custom(e.to_string()))
            }
        }
        deserializer.deserialize_str(DecVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_decimal_string() {
        let a = Amount::from_u64(123_456_789);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "\"123456789\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(a, back);
    }

    #[test]
    fn checked_sub_detects_underflow() {
        let a = Amount::from_u64(5);
        let b = Amount::from_u64(10);
        assert!(a.checked_sub(b).is_none());
        assert_eq!(b.checked_sub(a), Some(Amount::from_u64(5)));
    }
}
