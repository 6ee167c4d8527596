//! Per-motion derivation: one yes box, one no box and the booth binding them

use qv_common::{Address, MotionId, Side};
use serde::{Deserialize, Serialize};

use crate::deriver::{AddressDeriver, Deployment};
use crate::params::ParamSet;
use crate::template::{address_placeholder, slots, TemplateId};
use crate::DeriveResult;

/// The token and ballot-card contracts every booth is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBindings {
    /// Voice-credit token
    pub voice_credits: Address,
    /// Vote token
    pub votes: Address,
    /// Ballot-card registry
    pub ballot_cards: Address,
}

impl TokenBindings {
    /// The booth template's own placeholder addresses
    pub fn placeholders() -> Self {
        Self {
            voice_credits: address_placeholder(0x123),
            votes: address_placeholder(0x234),
            ballot_cards: address_placeholder(0x345),
        }
    }
}

/// Parameters of the ballot box collecting `side` of `motion`
pub fn ballot_box_params(side: Side, motion: MotionId) -> ParamSet {
    ParamSet::new()
        .with_uint48(slots::IS_YES, side.flag())
        .with_uint48(slots::MOTION_ID, motion.value())
}

/// Parameters of the booth for `motion`
pub fn voting_booth_params(
    motion: MotionId,
    yes_box: Address,
    no_box: Address,
    tokens: &TokenBindings,
) -> ParamSet {
    ParamSet::new()
        .with_address(slots::VOICE_CREDITS, tokens.voice_credits)
        .with_address(slots::VOTES, tokens.votes)
        .with_address(slots::BALLOT_CARDS, tokens.ballot_cards)
        .with_address(slots::YES_BOX, yes_box)
        .with_address(slots::NO_BOX, no_box)
        .with_uint48(slots::PROPOSAL_ID, motion.value())
}

/// The three addresses published for a motion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionAddresses {
    pub motion_id: MotionId,
    pub booth: Address,
    pub yes_box: Address,
    pub no_box: Address,
}

/// Full deployments for a motion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionDeployments {
    pub motion_id: MotionId,
    pub booth: Deployment,
    pub yes_box: Deployment,
    pub no_box: Deployment,
}

impl MotionDeployments {
    /// Just the addresses
    pub fn addresses(&self) -> MotionAddresses {
        MotionAddresses {
            motion_id: self.motion_id,
            booth: self.booth.address,
            yes_box: self.yes_box.address,
            no_box: self.no_box.address,
        }
    }
}

/// Derive both boxes of `motion`, then the booth embedding their addresses
pub fn derive_motion(
    deriver: &AddressDeriver,
    motion: MotionId,
    tokens: &TokenBindings,
) -> DeriveResult<MotionDeployments> {
    let yes_box =
        deriver.derive_deployment(&TemplateId::ballot_box(), &ballot_box_params(Side::Yes, motion))?;
    let no_box =
        deriver.derive_deployment(&TemplateId::ballot_box(), &ballot_box_params(Side::No, motion))?;
    let booth = deriver.derive_deployment(
        &TemplateId::voting_booth(),
        &voting_booth_params(motion, yes_box.address, no_box.address, tokens),
    )?;

    Ok(MotionDeployments {
        motion_id: motion,
        booth,
        yes_box,
        no_box,
    })
}
