//! Core types used throughout the system
//!
//! These are the fundamental identifiers and validated values shared by the
//! persistence layer, the transfer core and the gateway.

use std::fmt;
use std::num::IntErrorKind;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::transfer::TransferError;

/// Account key. Unique, immutable after creation.
pub type Owner = String;

/// Balance of an account. Whole units only, may be negative.
pub type Balance = i64;

/// Transfer ID - ULID assigned by the backend when the ledger entry is inserted.
///
/// ULIDs are sortable by creation time and need no coordination between
/// processes, so any backend can mint them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(ulid::Ulid);

impl TransferId {
    /// Generate a new unique TransferId
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransferId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

impl Serialize for TransferId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

/// Transfer amount.
///
/// # Constraints:
/// - **Positive**: `amount > 0`, zero and negative values never construct
/// - **Integral**: parsed text with a fractional part is rejected, not truncated
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub fn new(value: i64) -> Result<Self, TransferError> {
        if value <= 0 {
            return Err(TransferError::InvalidAmount(format!(
                "amount must be greater than zero, got {}",
                value
            )));
        }
        Ok(Self(value))
    }

    #[inline]
    pub fn get(self) -> i64 {
        self.0
    }

    /// Debit delta for the sending account
    #[inline]
    pub fn debit(self) -> i64 {
        -self.0
    }
}

impl TryFrom<i64> for Amount {
    type Error = TransferError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl FromStr for Amount {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.parse::<i64>() {
            Ok(v) => Amount::new(v),
            Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
                Err(TransferError::InvalidAmount(format!("amount out of range: {}", s)))
            }
            Err(_) if s.parse::<f64>().is_ok_and(f64::is_finite) => Err(
                TransferError::InvalidAmount(format!("amount must be an integer, got {}", s)),
            ),
            Err(_) => Err(TransferError::InvalidAmount(format!(
                "amount is not a number: {:?}",
                s
            ))),
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_rejects_non_positive() {
        assert!(matches!(
            Amount::new(0),
            Err(TransferError::InvalidAmount(_))
        ));
        assert!(matches!(
            Amount::new(-5),
            Err(TransferError::InvalidAmount(_))
        ));
        assert_eq!(Amount::new(1).unwrap().get(), 1);
        assert_eq!(Amount::new(100).unwrap().debit(), -100);
    }

    #[test]
    fn test_amount_parse() {
        assert_eq!("250".parse::<Amount>().unwrap().get(), 250);
        assert_eq!(" 7 ".parse::<Amount>().unwrap().get(), 7);

        let err = "12.5".parse::<Amount>().unwrap_err();
        assert!(err.to_string().contains("integer"));

        assert!(matches!(
            "abc".parse::<Amount>(),
            Err(TransferError::InvalidAmount(_))
        ));
        assert!(matches!(
            "0".parse::<Amount>(),
            Err(TransferError::InvalidAmount(_))
        ));
        assert!(matches!(
            "-5".parse::<Amount>(),
            Err(TransferError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_amount_parse_out_of_range() {
        for text in ["99999999999999999999", "-99999999999999999999"] {
            match text.parse::<Amount>() {
                Err(TransferError::InvalidAmount(msg)) => {
                    assert!(msg.contains("out of range"), "{}", msg)
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        for text in ["1e3", "NaN", "0x10", ""] {
            assert!(matches!(
                text.parse::<Amount>(),
                Err(TransferError::InvalidAmount(_))
            ));
        }
    }

    #[test]
    fn test_transfer_id_roundtrip_and_serialize() {
        let id = TransferId::new();
        let parsed: TransferId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }

    #[test]
    fn test_transfer_ids_are_unique() {
        let a = TransferId::new();
        let b = TransferId::new();
        assert_ne!(a, b);
    }
}
