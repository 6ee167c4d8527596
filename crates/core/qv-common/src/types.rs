//! Identity and numeric types shared across the voting system.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Number of decimals of every fixed-point token amount
pub const SCALE_DECIMALS: u32 = 18;

/// Width, in bits, of the largest representable amount
const AMOUNT_BITS: u64 = 256;

/// A 20-byte account or contract address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; Address::LEN]);

impl Address {
    /// Length of an address in bytes
    pub const LEN: usize = 20;

    /// The all-zero address
    pub const ZERO: Address = Address([0u8; Address::LEN]);

    /// Create an address from raw bytes
    pub const fn new(bytes: [u8; Address::LEN]) -> Self {
        Self(bytes)
    }

    /// Create an address from a slice, which must be exactly 20 bytes long
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; Address::LEN] = bytes.try_into().map_err(|_| {
            Error::validation(format!(
                "Address must be {} bytes, got {}",
                Address::LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Get the raw address bytes
    pub fn as_bytes(&self) -> &[u8; Address::LEN] {
        &self.0
    }

    /// Lowercase hex without the `0x` prefix
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits)
            .map_err(|e| Error::validation(format!("Invalid address '{}': {}", s, e)))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// An unsigned fixed-point token quantity, bounded to 256 bits.
///
/// Arithmetic is checked: every operation that would leave the 256-bit range
/// returns `None` instead of wrapping.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(BigUint);

impl Amount {
    /// Create a zero amount
    pub fn zero() -> Self {
        Self(BigUint::default())
    }

    /// The fixed-point scale, `10^18`
    pub fn scale() -> Self {
        Self(BigUint::from(10u8).pow(SCALE_DECIMALS))
    }

    /// `whole` tokens expressed in base units (`whole * 10^18`)
    pub fn tokens(whole: u64) -> Self {
        Self(BigUint::from(whole) * BigUint::from(10u8).pow(SCALE_DECIMALS))
    }

    /// The largest representable amount, `2^256 - 1`
    pub fn max_value() -> Self {
        Self((BigUint::from(1u8) << AMOUNT_BITS as usize) - BigUint::from(1u8))
    }

    /// Wrap a big integer, failing if it does not fit in 256 bits
    pub fn from_biguint(value: BigUint) -> Option<Self> {
        if value.bits() <= AMOUNT_BITS {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Get the underlying big integer
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    /// Check if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.0.bits() == 0
    }

    /// Checked addition
    pub fn checked_add(&self, other: &Amount) -> Option<Amount> {
        Self::from_biguint(&self.0 + &other.0)
    }

    /// Checked subtraction
    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        if self.0 >= other.0 {
            Some(Self(&self.0 - &other.0))
        } else {
            None
        }
    }

    /// Checked multiplication
    pub fn checked_mul(&self, other: &Amount) -> Option<Amount> {
        Self::from_biguint(&self.0 * &other.0)
    }

    /// Division rounding toward zero; `None` for a zero divisor
    pub fn checked_div(&self, divisor: &Amount) -> Option<Amount> {
        if divisor.is_zero() {
            None
        } else {
            Some(Self(&self.0 / &divisor.0))
        }
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(BigUint::from(value))
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let value = BigUint::parse_bytes(s.trim().as_bytes(), 10)
            .ok_or_else(|| Error::validation(format!("Invalid amount '{}'", s)))?;
        Self::from_biguint(value)
            .ok_or_else(|| Error::validation(format!("Amount '{}' exceeds 256 bits", s)))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A 48-bit motion (proposal) identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct MotionId(u64);

impl MotionId {
    /// Largest identifier that fits in 48 bits
    pub const MAX: u64 = (1 << 48) - 1;

    /// Create a motion identifier
    pub fn new(value: u64) -> Result<Self> {
        if value > Self::MAX {
            return Err(Error::validation(format!(
                "Motion id {} does not fit in 48 bits",
                value
            )));
        }
        Ok(Self(value))
    }

    /// Get the numeric value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for MotionId {
    type Error = Error;

    fn try_from(value: u64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<MotionId> for u64 {
    fn from(id: MotionId) -> Self {
        id.0
    }
}

impl fmt::Display for MotionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The side of a binary motion a ballot is cast for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// In favour of the motion
    Yes,
    /// Against the motion
    No,
}

impl Side {
    /// The `IS_YES` flag a ballot box for this side is derived with
    pub fn flag(&self) -> u64 {
        match self {
            Side::Yes => 1,
            Side::No => 0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "yes"),
            Side::No => write!(f, "no"),
        }
    }
}

/// The 32-byte mutable data field carried by a ballot card.
///
/// Read as a big-endian 256-bit bitmap: bit `m` is set once the card has been
/// consumed by the booth of motion `m`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CardData([u8; CardData::LEN]);

impl CardData {
    /// Length of the data field in bytes
    pub const LEN: usize = 32;

    /// Number of motions the bitmap can track
    pub const CAPACITY: u64 = (CardData::LEN * 8) as u64;

    /// The data of a freshly minted card
    pub const UNUSED: CardData = CardData([0u8; CardData::LEN]);

    /// Create card data from raw bytes
    pub const fn new(bytes: [u8; CardData::LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; CardData::LEN] {
        &self.0
    }

    fn bit_position(motion: MotionId) -> Option<(usize, u8)> {
        let bit = motion.value();
        if bit >= Self::CAPACITY {
            return None;
        }
        let byte = CardData::LEN - 1 - (bit / 8) as usize;
        Some((byte, 1u8 << (bit % 8)))
    }

    /// Whether the marker for `motion` is set
    pub fn is_marked(&self, motion: MotionId) -> bool {
        match Self::bit_position(motion) {
            Some((byte, mask)) => self.0[byte] & mask != 0,
            None => false,
        }
    }

    /// This data with the marker for `motion` set; `None` past the bitmap
    pub fn marked(&self, motion: MotionId) -> Option<CardData> {
        let (byte, mask) = Self::bit_position(motion)?;
        let mut bytes = self.0;
        bytes[byte] |= mask;
        Some(CardData(bytes))
    }
}

impl FromStr for CardData {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits)
            .map_err(|e| Error::validation(format!("Invalid card data '{}': {}", s, e)))?;
        let bytes: [u8; CardData::LEN] = bytes.as_slice().try_into().map_err(|_| {
            Error::validation(format!("Card data must be {} bytes", CardData::LEN))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for CardData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for CardData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CardData(0x{})", hex::encode(self.0))
    }
}

impl Serialize for CardData {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CardData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
