//! Parameter sets substituted into template slots

use std::collections::BTreeMap;

use qv_common::{Address, MotionId};
use serde::{Deserialize, Serialize};

use crate::template::SlotKind;

/// A concrete slot value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamValue {
    /// A 20-byte address
    Address(Address),
    /// A 48-bit unsigned integer
    Uint48(u64),
}

impl ParamValue {
    /// The slot kind this value fills
    pub fn kind(&self) -> SlotKind {
        match self {
            ParamValue::Address(_) => SlotKind::Address,
            ParamValue::Uint48(_) => SlotKind::Uint48,
        }
    }

    /// Encode the value at its slot width; `None` if a `Uint48` overflows 48 bits
    pub fn encode(&self) -> Option<Vec<u8>> {
        match self {
            ParamValue::Address(addr) => Some(addr.as_bytes().to_vec()),
            ParamValue::Uint48(value) if *value <= MotionId::MAX => {
                Some(value.to_be_bytes()[2..].to_vec())
            }
            ParamValue::Uint48(_) => None,
        }
    }
}

impl From<Address> for ParamValue {
    fn from(addr: Address) -> Self {
        ParamValue::Address(addr)
    }
}

impl From<MotionId> for ParamValue {
    fn from(id: MotionId) -> Self {
        ParamValue::Uint48(id.value())
    }
}

/// Named slot values, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSet {
    values: BTreeMap<String, ParamValue>,
}

impl ParamSet {
    /// Create an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an address value
    pub fn with_address(mut self, name: &str, addr: Address) -> Self {
        self.insert(name, ParamValue::Address(addr));
        self
    }

    /// Add a 48-bit integer value
    pub fn with_uint48(mut self, name: &str, value: u64) -> Self {
        self.insert(name, ParamValue::Uint48(value));
        self
    }

    /// Set a value, replacing any previous one
    pub fn insert(&mut self, name: &str, value: ParamValue) {
        self.values.insert(name.to_string(), value);
    }

    /// Look up a value
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Iterate over values in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uint48_encoding() {
        assert_eq!(
            ParamValue::Uint48(0x0102).encode(),
            Some(vec![0, 0, 0, 0, 0x01, 0x02])
        );
        assert_eq!(ParamValue::Uint48(MotionId::MAX + 1).encode(), None);
    }

    #[test]
    fn test_insert_replaces() {
        let mut params = ParamSet::new().with_uint48("MOTION_ID", 1);
        params.insert("MOTION_ID", ParamValue::Uint48(2));
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("MOTION_ID"), Some(&ParamValue::Uint48(2)));
    }
}
