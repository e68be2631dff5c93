//! Order-independent content checksum
//!
//! Every row contributes the first 64 bits of the SHA-256 digest of its text
//! form. Contributions are summed without overflow, so the total does not
//! depend on row order and partial sums over any partition of the rows add up
//! to the full-table value.
//!
//! Snapshot files from older releases stored a signed 64-bit sum computed by
//! the server. Those values still load, and compare unequal to fresh sums.

use num_bigint::BigInt;
use num_traits::Zero;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Sum of per-row 64-bit digest prefixes
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ContentChecksum(BigInt);

impl ContentChecksum {
    pub fn new() -> Self {
        Self(BigInt::zero())
    }

    /// 64-bit prefix of the SHA-256 digest of one row's text, big-endian
    pub fn row_digest(row_text: &str) -> u64 {
        let digest = Sha256::digest(row_text.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(prefix)
    }

    pub fn add_row(&mut self, row_text: &str) {
        self.0 += Self::row_digest(row_text);
    }

    /// Fold a partial checksum computed over other rows into this one
    #[cfg(test)]
    pub fn merge(&mut self, other: &ContentChecksum) {
        self.0 += &other.0;
    }

    #[cfg(test)]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl<'a> FromIterator<&'a str> for ContentChecksum {
    fn from_iter<I: IntoIterator<Item = &'a str>>(rows: I) -> Self {
        let mut checksum = Self::new();
        for row in rows {
            checksum.add_row(row);
        }
        checksum
    }
}

impl From<u64> for ContentChecksum {
    fn from(value: u64) -> Self {
        Self(BigInt::from(value))
    }
}

impl fmt::Display for ContentChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentChecksum {
    type Err = num_bigint::ParseBigIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BigInt::from_str(s.trim()).map(Self)
    }
}

// Stored as a decimal string: the sum routinely exceeds 64 bits and JSON
// consumers would otherwise lose precision.
impl Serialize for ContentChecksum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ContentChecksum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ChecksumVisitor;

        impl<'de> Visitor<'de> for ChecksumVisitor {
            type Value = ContentChecksum;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integer or its decimal string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse()
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(ContentChecksum::from(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(ContentChecksum(BigInt::from(v)))
            }
        }

        deserializer.deserialize_any(ChecksumVisitor)
    }
}
