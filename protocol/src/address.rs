//! # Addresses
//!
//! An address is a workchain id plus a 32-byte account hash. The text form
//! is `"<workchain>:<64 hex chars>"`, e.g. `0:4e6f...`.
//!
//! The all-zero address on workchain 0 is the **hole**: nobody holds its
//! keys, so it doubles as the neutral placeholder for "no address here".
//! Idle upgrade slots carry it, and the vault refuses to ever make it an
//! active admin or keeper.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of the account hash part of an address.
pub const ADDRESS_HASH_LENGTH: usize = 32;

/// Errors from parsing an address out of its text form.
#[derive(Debug, Error, PartialEq)]
pub enum AddressError {
    /// No `:` separator between workchain and hash.
    #[error("malformed address: missing ':' separator")]
    MissingSeparator,

    /// The workchain part is not a signed 8-bit integer.
    #[error("malformed address: bad workchain '{0}'")]
    BadWorkchain(String),

    /// The hash part is not valid hex.
    #[error("malformed address: {0}")]
    BadHex(#[from] hex::FromHexError),

    /// The hash part decoded to the wrong number of bytes.
    #[error("malformed address: expected {expected} hash bytes, got {got}")]
    BadLength {
        /// Required hash length.
        expected: usize,
        /// Length actually decoded.
        got: usize,
    },
}

/// An account address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address {
    /// Workchain the account lives on.
    pub workchain: i8,
    /// Account hash.
    pub hash: [u8; ADDRESS_HASH_LENGTH],
}

impl Address {
    /// The hole address. Used as the neutral placeholder in idle slots.
    pub const HOLE: Address = Address {
        workchain: 0,
        hash: [0u8; ADDRESS_HASH_LENGTH],
    };

    /// Builds an address from its parts.
    pub const fn new(workchain: i8, hash: [u8; ADDRESS_HASH_LENGTH]) -> Self {
        Self { workchain, hash }
    }

    /// Derives a deterministic workchain-0 address from a seed string.
    ///
    /// Handy for tests and the sandbox, where wallets are named ("admin",
    /// "keeper", ...) rather than backed by real keys.
    pub fn from_seed(seed: &str) -> Self {
        Self::new(0, *blake3::hash(seed.as_bytes()).as_bytes())
    }

    /// Returns `true` for the hole address.
    pub fn is_hole(&self) -> bool {
        *self == Self::HOLE
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::HOLE
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.workchain, hex::encode(self.hash))
    }
}

// Debug prints the text form; a 32-element byte array is unreadable in logs.
impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (wc, hash_hex) = s.split_once(':').ok_or(AddressError::MissingSeparator)?;
        let workchain: i8 = wc
            .parse()
            .map_err(|_| AddressError::BadWorkchain(wc.to_string()))?;
        let bytes = hex::decode(hash_hex)?;
        let hash: [u8; ADDRESS_HASH_LENGTH] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| AddressError::BadLength {
                    expected: ADDRESS_HASH_LENGTH,
                    got: bytes.len(),
                })?;
        Ok(Self::new(workchain, hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hole_is_default_and_all_zero() {
        assert_eq!(Address::default(), Address::HOLE);
        assert!(Address::HOLE.is_hole());
        assert_eq!(
            Address::HOLE.to_string(),
            "0:0000000000000000000000000000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn seeded_addresses_are_stable_and_distinct() {
        assert_eq!(Address::from_seed("admin"), Address::from_seed("admin"));
        assert_ne!(Address::from_seed("admin"), Address::from_seed("keeper"));
        assert!(!Address::from_seed("admin").is_hole());
    }

    #[test]
    fn text_form_parses_back() {
        let addr = Address::new(-1, [0xab; 32]);
        let parsed: Address = addr.to_string().parse().unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn malformed_text_is_rejected() {
        assert_eq!(
            "deadbeef".parse::<Address>(),
            Err(AddressError::MissingSeparator)
        );
        assert!(matches!(
            "x:00".parse::<Address>(),
            Err(AddressError::BadWorkchain(_))
        ));
        assert!(matches!(
            "0:zz".parse::<Address>(),
            Err(AddressError::BadHex(_))
        ));
        assert_eq!(
            "0:abcd".parse::<Address>(),
            Err(AddressError::BadLength {
                expected: 32,
                got: 2
            })
        );
    }

    #[test]
    fn hex_errors_convert_and_compare() {
        let err: AddressError = hex::FromHexError::OddLength.into();
        assert_eq!(err, AddressError::BadHex(hex::FromHexError::OddLength));
        assert_eq!(
            "0:abc".parse::<Address>(),
            Err(AddressError::BadHex(hex::FromHexError::OddLength))
        );
    }
}
