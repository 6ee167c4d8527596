//! Contract templates with placeholder slots

use std::fmt;

use qv_common::Address;
use serde::{Deserialize, Serialize};

/// Names of the slots declared by the built-in templates
pub mod slots {
    /// Voice-credit token bound to a booth
    pub const VOICE_CREDITS: &str = "VOICE_CREDITS";
    /// Vote token bound to a booth
    pub const VOTES: &str = "VOTES";
    /// Ballot-card registry bound to a booth
    pub const BALLOT_CARDS: &str = "BALLOT_CARDS";
    /// Address of the motion's yes box
    pub const YES_BOX: &str = "YES_BOX";
    /// Address of the motion's no box
    pub const NO_BOX: &str = "NO_BOX";
    /// Motion a booth votes on
    pub const PROPOSAL_ID: &str = "PROPOSAL_ID";
    /// 1 for a yes box, 0 for a no box
    pub const IS_YES: &str = "IS_YES";
    /// Motion a ballot box collects for
    pub const MOTION_ID: &str = "MOTION_ID";
}

const BALLOT_BOX_HEADER: &[u8] = b"QVBOX\x01";
const VOTING_BOOTH_HEADER: &[u8] = b"QVBOOTH\x01";
const TRAILER: &[u8] = b"\x00\xfe";

/// Identifier of a template
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateId(String);

impl TemplateId {
    /// Create a template identifier
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The built-in ballot box template
    pub fn ballot_box() -> Self {
        Self::new("BallotBox")
    }

    /// The built-in voting booth template
    pub fn voting_booth() -> Self {
        Self::new("VotingBooth")
    }

    /// Get the identifier as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The width and encoding of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotKind {
    /// A 20-byte address
    Address,
    /// A 48-bit unsigned integer, big-endian
    Uint48,
}

impl SlotKind {
    /// Width of the slot in bytes
    pub fn width(&self) -> usize {
        match self {
            SlotKind::Address => Address::LEN,
            SlotKind::Uint48 => 6,
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKind::Address => write!(f, "address"),
            SlotKind::Uint48 => write!(f, "uint48"),
        }
    }
}

/// A placeholder declared at a fixed offset of a template's code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Parameter name
    pub name: String,
    /// Value kind
    pub kind: SlotKind,
    /// Byte offset of the placeholder in the code
    pub offset: usize,
    /// The placeholder bytes expected at `offset`
    pub placeholder: Vec<u8>,
}

/// A fixed code byte sequence plus the slots it declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Template identifier
    pub id: TemplateId,
    /// The unparameterised code
    pub code: Vec<u8>,
    /// Declared slots, in code order
    pub slots: Vec<Slot>,
}

impl Template {
    /// Create a template from its parts
    pub fn new(id: TemplateId, code: Vec<u8>, slots: Vec<Slot>) -> Self {
        Self { id, code, slots }
    }

    /// Look up a declared slot by name
    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// The ballot box template: `IS_YES` and `MOTION_ID`
    pub fn ballot_box() -> Self {
        TemplateBuilder::new(TemplateId::ballot_box())
            .code(BALLOT_BOX_HEADER)
            .slot(slots::IS_YES, SlotKind::Uint48, uint48_placeholder(0x789))
            .slot(slots::MOTION_ID, SlotKind::Uint48, uint48_placeholder(0x891))
            .code(TRAILER)
            .build()
    }

    /// The voting booth template: three token bindings, both boxes and the proposal id
    pub fn voting_booth() -> Self {
        TemplateBuilder::new(TemplateId::voting_booth())
            .code(VOTING_BOOTH_HEADER)
            .slot(slots::VOICE_CREDITS, SlotKind::Address, address_placeholder(0x123).as_bytes().to_vec())
            .slot(slots::VOTES, SlotKind::Address, address_placeholder(0x234).as_bytes().to_vec())
            .slot(slots::BALLOT_CARDS, SlotKind::Address, address_placeholder(0x345).as_bytes().to_vec())
            .slot(slots::YES_BOX, SlotKind::Address, address_placeholder(0x456).as_bytes().to_vec())
            .slot(slots::NO_BOX, SlotKind::Address, address_placeholder(0x567).as_bytes().to_vec())
            .slot(slots::PROPOSAL_ID, SlotKind::Uint48, uint48_placeholder(0x678))
            .code(TRAILER)
            .build()
    }
}

/// The placeholder pattern `TAG 11..11 TAG` for a three-hex-digit tag,
/// e.g. `0x1231111111111111111111111111111111111123`.
pub fn address_placeholder(tag: u16) -> Address {
    let mut bytes = [0x11u8; Address::LEN];
    bytes[0] = (tag >> 4) as u8;
    bytes[1] = ((tag & 0x0f) as u8) << 4 | 0x01;
    bytes[Address::LEN - 2] = 0x10 | (tag >> 8) as u8;
    bytes[Address::LEN - 1] = (tag & 0xff) as u8;
    Address::new(bytes)
}

fn uint48_placeholder(tag: u16) -> Vec<u8> {
    let mut bytes = vec![0x11u8; SlotKind::Uint48.width()];
    bytes[0] = (tag >> 4) as u8;
    bytes[1] = ((tag & 0x0f) as u8) << 4 | 0x01;
    bytes[4] = 0x10 | (tag >> 8) as u8;
    bytes[5] = (tag & 0xff) as u8;
    bytes
}

/// Assembles template code, recording each slot's offset as it is appended
pub struct TemplateBuilder {
    id: TemplateId,
    code: Vec<u8>,
    slots: Vec<Slot>,
}

impl TemplateBuilder {
    /// Start a template
    pub fn new(id: TemplateId) -> Self {
        Self {
            id,
            code: Vec::new(),
            slots: Vec::new(),
        }
    }

    /// Append fixed code bytes
    pub fn code(mut self, bytes: &[u8]) -> Self {
        self.code.extend_from_slice(bytes);
        self
    }

    /// Append a slot: a one-byte width tag followed by the placeholder
    pub fn slot(mut self, name: &str, kind: SlotKind, placeholder: Vec<u8>) -> Self {
        self.code.push(kind.width() as u8);
        let offset = self.code.len();
        self.code.extend_from_slice(&placeholder);
        self.slots.push(Slot {
            name: name.to_string(),
            kind,
            offset,
            placeholder,
        });
        self
    }

    /// Finish the template
    pub fn build(self) -> Template {
        Template::new(self.id, self.code, self.slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_placeholders() {
        assert_eq!(
            address_placeholder(0x123).to_hex(),
            "1231111111111111111111111111111111111123"
        );
        assert_eq!(
            address_placeholder(0x567).to_hex(),
            "5671111111111111111111111111111111111567"
        );
        assert_eq!(uint48_placeholder(0x678), vec![0x67, 0x81, 0x11, 0x11, 0x16, 0x78]);
    }

    #[test]
    fn test_builder_records_offsets() {
        let template = Template::voting_booth();
        assert_eq!(template.slots.len(), 6);

        for slot in &template.slots {
            let end = slot.offset + slot.kind.width();
            assert_eq!(&template.code[slot.offset..end], slot.placeholder.as_slice());
            assert_eq!(template.code[slot.offset - 1] as usize, slot.kind.width());
        }

        let proposal = template.slot(slots::PROPOSAL_ID).unwrap();
        assert_eq!(proposal.kind, SlotKind::Uint48);
        assert!(template.slot(slots::IS_YES).is_none());
    }

    #[test]
    fn test_builtin_templates_differ() {
        assert_ne!(Template::ballot_box().code, Template::voting_booth().code);
    }
}
