//! Borough-Block-Lot parcel identifiers.
//!
//! A BBL is NYC's canonical parcel key: one borough digit, a five-digit
//! tax block, and a four-digit tax lot, always rendered as ten digits
//! (`1000120001` = Manhattan, block 12, lot 1).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Borough;

/// Highest valid tax block number (five digits).
const MAX_BLOCK: u32 = 99_999;
/// Highest valid tax lot number (four digits).
const MAX_LOT: u16 = 9_999;

/// A validated Borough-Block-Lot parcel identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bbl {
    borough: Borough,
    block: u32,
    lot: u16,
}

impl Bbl {
    /// Builds a BBL from its components.
    ///
    /// # Errors
    ///
    /// Returns [`BblParseError`] if the block or lot is zero or exceeds
    /// its fixed-width range.
    pub fn new(borough: Borough, block: u32, lot: u16) -> Result<Self, BblParseError> {
        if block == 0 || block > MAX_BLOCK {
            return Err(BblParseError::BlockOutOfRange { block });
        }
        if lot == 0 || lot > MAX_LOT {
            return Err(BblParseError::LotOutOfRange { lot: u32::from(lot) });
        }
        Ok(Self {
            borough,
            block,
            lot,
        })
    }

    /// Parses the ten-digit fixed-width form.
    ///
    /// # Errors
    ///
    /// Returns [`BblParseError`] if the input is not exactly ten ASCII
    /// digits or any component is out of range.
    pub fn parse(input: &str) -> Result<Self, BblParseError> {
        let trimmed = input.trim();
        if trimmed.len() != 10 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(BblParseError::NotTenDigits {
                input: trimmed.to_string(),
            });
        }

        let borough_digit = trimmed.as_bytes()[0] - b'0';
        let borough = Borough::from_code(borough_digit).ok_or(BblParseError::InvalidBorough {
            digit: borough_digit,
        })?;

        // Slices are all-digit by the check above.
        let block: u32 = trimmed[1..6].parse().map_err(|_| BblParseError::BlockOutOfRange {
            block: 0,
        })?;
        let lot: u16 = trimmed[6..10]
            .parse()
            .map_err(|_| BblParseError::LotOutOfRange { lot: 0 })?;

        Self::new(borough, block, lot)
    }

    /// The borough component.
    #[must_use]
    pub const fn borough(self) -> Borough {
        self.borough
    }

    /// The tax block component.
    #[must_use]
    pub const fn block(self) -> u32 {
        self.block
    }

    /// The tax lot component.
    #[must_use]
    pub const fn lot(self) -> u16 {
        self.lot
    }
}

impl fmt::Display for Bbl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:05}{:04}", self.borough.code(), self.block, self.lot)
    }
}

impl FromStr for Bbl {
    type Err = BblParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Bbl {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Bbl {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Why a BBL string or component set was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BblParseError {
    /// Input was not exactly ten ASCII digits.
    #[error("BBL {input:?} is not a ten-digit number")]
    NotTenDigits {
        /// The rejected input.
        input: String,
    },

    /// Borough digit outside 1-5.
    #[error("invalid borough digit {digit}")]
    InvalidBorough {
        /// The rejected digit.
        digit: u8,
    },

    /// Block zero or wider than five digits.
    #[error("tax block {block} out of range")]
    BlockOutOfRange {
        /// The rejected block number.
        block: u32,
    },

    /// Lot zero or wider than four digits.
    #[error("tax lot {lot} out of range")]
    LotOutOfRange {
        /// The rejected lot number.
        lot: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_bbl() {
        let bbl = Bbl::parse("1000120001").unwrap();
        assert_eq!(bbl.borough(), Borough::Manhattan);
        assert_eq!(bbl.block(), 12);
        assert_eq!(bbl.lot(), 1);
    }

    #[test]
    fn display_restores_fixed_width() {
        let bbl = Bbl::parse("3012340567").unwrap();
        assert_eq!(bbl.to_string(), "3012340567");
        assert_eq!(bbl.borough(), Borough::Brooklyn);
    }

    #[test]
    fn round_trips_through_parse() {
        let bbl = Bbl::new(Borough::Queens, 7, 42).unwrap();
        assert_eq!(Bbl::parse(&bbl.to_string()).unwrap(), bbl);
    }

    #[test]
    fn rejects_short_input() {
        assert!(matches!(
            Bbl::parse("100012001"),
            Err(BblParseError::NotTenDigits { .. })
        ));
    }

    #[test]
    fn rejects_non_numeric_input() {
        assert!(matches!(
            Bbl::parse("10001x0001"),
            Err(BblParseError::NotTenDigits { .. })
        ));
    }

    #[test]
    fn rejects_zero_borough() {
        assert!(matches!(
            Bbl::parse("0000120001"),
            Err(BblParseError::InvalidBorough { digit: 0 })
        ));
    }

    #[test]
    fn rejects_borough_above_staten_island() {
        assert!(matches!(
            Bbl::parse("6000120001"),
            Err(BblParseError::InvalidBorough { digit: 6 })
        ));
    }

    #[test]
    fn rejects_zero_block_and_lot() {
        assert!(matches!(
            Bbl::parse("1000000001"),
            Err(BblParseError::BlockOutOfRange { .. })
        ));
        assert!(matches!(
            Bbl::parse("1000120000"),
            Err(BblParseError::LotOutOfRange { .. })
        ));
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert!(Bbl::parse(" 1000120001\n").is_ok());
    }
}
