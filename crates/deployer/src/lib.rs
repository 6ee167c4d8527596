//! Deterministic deployment addresses for booths and ballot boxes
//!
//! Addresses are derived from a template and a parameter set before anything
//! is deployed, so a whole batch of motions can be published up front.

use thiserror::Error;

pub mod deriver;
pub mod motion;
pub mod params;
pub mod template;

pub use deriver::{AddressDeriver, Deployment};
pub use motion::{derive_motion, MotionAddresses, MotionDeployments, TokenBindings};
pub use params::{ParamSet, ParamValue};
pub use template::{slots, Slot, SlotKind, Template, TemplateBuilder, TemplateId};

/// Errors raised while deriving a deployment
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeriveError {
    /// No template is registered under this identifier
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    /// A declared slot has no value in the parameter set
    #[error("Missing parameter {parameter} for template {template}")]
    MissingParameter { template: String, parameter: String },

    /// The parameter set names a slot the template does not declare
    #[error("Unexpected parameter {parameter} for template {template}")]
    UnexpectedParameter { template: String, parameter: String },

    /// A value has the wrong kind or is out of range for its slot
    #[error("Invalid parameter {parameter}: {reason}")]
    InvalidParameter { parameter: String, reason: String },

    /// The placeholder bytes were not found at the declared offset
    #[error("Template mismatch in {template}: placeholder for {parameter} not found at offset {offset}")]
    TemplateMismatch {
        template: String,
        parameter: String,
        offset: usize,
    },
}

/// Result type for derivation
pub type DeriveResult<T> = Result<T, DeriveError>;

impl From<DeriveError> for qv_common::Error {
    fn from(err: DeriveError) -> Self {
        match err {
            DeriveError::UnknownTemplate(_) => qv_common::Error::not_found(err.to_string()),
            _ => qv_common::Error::validation(err.to_string()),
        }
    }
}
