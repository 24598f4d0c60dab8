//! Proof-of-work difficulty target
//!
//! A target is a 256-bit unsigned integer stored as 32 big-endian bytes.
//! Hashes are compared against it as integers of the same width, never as
//! text. The block header carries a lossy 4-byte compact form ("bits").

use crate::crypto::Hash;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Target parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("Invalid hex target")]
    InvalidHex,
    #[error("Target must be at most 32 bytes, got {0}")]
    TooWide(usize),
}

/// 256-bit difficulty threshold, big-endian
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DifficultyTarget([u8; 32]);

impl DifficultyTarget {
    /// Easiest target: every hash except all-ones passes
    pub const MAX: Self = Self([0xFF; 32]);

    /// Impossible target: no hash is strictly below zero
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse a big-endian hex string of up to 64 digits
    ///
    /// Shorter inputs are left-padded with zeros so that the numeric value is
    /// preserved.
    pub fn from_hex(hex_str: &str) -> Result<Self, TargetError> {
        let digits = hex_str.trim().trim_start_matches("0x");
        let padded = if digits.len() % 2 == 1 {
            format!("0{}", digits)
        } else {
            digits.to_string()
        };
        let bytes = hex::decode(&padded).map_err(|_| TargetError::InvalidHex)?;
        if bytes.len() > 32 {
            return Err(TargetError::TooWide(bytes.len()));
        }

        let mut target = [0u8; 32];
        target[32 - bytes.len()..].copy_from_slice(&bytes);
        Ok(Self(target))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// True iff `hash`, read as a big-endian integer, is strictly below the target
    #[inline]
    pub fn is_met_by(&self, hash: &Hash) -> bool {
        // Lexicographic order on equal-length big-endian arrays is numeric order
        hash < &self.0
    }

    /// Compact "bits" form: 1-byte exponent, 3-byte mantissa
    pub fn to_compact(&self) -> u32 {
        let first_nonzero = match self.0.iter().position(|&b| b != 0) {
            Some(i) => i,
            None => return 0,
        };

        let exponent = (32 - first_nonzero) as u32;

        let mut mantissa: u32 = 0;
        for offset in 0..3 {
            let byte = self.0.get(first_nonzero + offset).copied().unwrap_or(0);
            mantissa = (mantissa << 8) | byte as u32;
        }

        // Keep the sign bit of the mantissa clear
        let (exponent, mantissa) = if mantissa & 0x0080_0000 != 0 {
            (exponent + 1, mantissa >> 8)
        } else {
            (exponent, mantissa)
        };

        (exponent << 24) | (mantissa & 0x007F_FFFF)
    }

    /// The target a header carrying `to_compact()` actually commits to
    ///
    /// Compact form keeps only three significant bytes, so the result is
    /// this target rounded down to that precision.
    pub fn normalized(&self) -> Self {
        Self::from_compact(self.to_compact())
    }

    /// Expand a compact "bits" value
    ///
    /// Negative encodings expand to zero; digits beyond 256 bits are dropped.
    pub fn from_compact(bits: u32) -> Self {
        let exponent = (bits >> 24) as usize;
        let mut mantissa = bits & 0x007F_FFFF;
        let mut target = [0u8; 32];

        if bits & 0x0080_0000 != 0 || mantissa == 0 {
            return Self(target);
        }

        if exponent <= 3 {
            mantissa >>= 8 * (3 - exponent);
            target[29..].copy_from_slice(&mantissa.to_be_bytes()[1..]);
        } else {
            let mantissa_bytes = mantissa.to_be_bytes();
            for (i, byte) in mantissa_bytes[1..].iter().enumerate() {
                // Position of this byte counted from the most significant end
                if let Some(pos) = (32 + i).checked_sub(exponent) {
                    if pos < 32 {
                        target[pos] = *byte;
                    }
                }
            }
        }

        Self(target)
    }
}

impl Default for DifficultyTarget {
    fn default() -> Self {
        // 0000ffff00...00
        let mut target = [0u8; 32];
        target[2] = 0xFF;
        target[3] = 0xFF;
        Self(target)
    }
}

impl fmt::Display for DifficultyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for DifficultyTarget {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for DifficultyTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for DifficultyTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
