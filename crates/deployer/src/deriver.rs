//! Content-addressed derivation of deployment addresses

use std::collections::HashMap;

use qv_common::Address;
use qv_crypto::{Hash, Hasher, Sha256Hasher};
use tracing::debug;

use crate::params::ParamSet;
use crate::template::{Template, TemplateId};
use crate::{DeriveError, DeriveResult};

const DEPLOY_PREFIX: u8 = 0xff;
const DEPLOY_DOMAIN: &[u8] = b"qv-deploy";

/// The address and initialisation payload a deployment will have
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    /// Template the payload was built from
    pub template: TemplateId,
    /// Address the contract will live at
    pub address: Address,
    /// Template code with every slot substituted
    pub init_payload: Vec<u8>,
}

/// Registry of templates and the pure derivation over them
#[derive(Debug, Clone)]
pub struct AddressDeriver {
    templates: HashMap<TemplateId, Template>,
}

impl Default for AddressDeriver {
    fn default() -> Self {
        let mut deriver = Self::empty();
        deriver.register(Template::ballot_box());
        deriver.register(Template::voting_booth());
        deriver
    }
}

impl AddressDeriver {
    /// A deriver with the built-in ballot box and voting booth templates
    pub fn new() -> Self {
        Self::default()
    }

    /// A deriver with no templates
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Register a template, replacing any with the same id
    pub fn register(&mut self, template: Template) {
        self.templates.insert(template.id.clone(), template);
    }

    /// Look up a template
    pub fn template(&self, id: &TemplateId) -> Option<&Template> {
        self.templates.get(id)
    }

    /// Compute the address and payload of `template_id` instantiated with `params`.
    ///
    /// Nothing is deployed: identical inputs always yield the identical
    /// deployment, independent of ledger state.
    pub fn derive_deployment(
        &self,
        template_id: &TemplateId,
        params: &ParamSet,
    ) -> DeriveResult<Deployment> {
        let template = self
            .template(template_id)
            .ok_or_else(|| DeriveError::UnknownTemplate(template_id.to_string()))?;

        for slot in &template.slots {
            if params.get(&slot.name).is_none() {
                return Err(DeriveError::MissingParameter {
                    template: template_id.to_string(),
                    parameter: slot.name.clone(),
                });
            }
        }

        if let Some((name, _)) = params.iter().find(|(name, _)| template.slot(name).is_none()) {
            return Err(DeriveError::UnexpectedParameter {
                template: template_id.to_string(),
                parameter: name.to_string(),
            });
        }

        let mut payload = template.code.clone();
        for slot in &template.slots {
            let value = params.get(&slot.name).ok_or_else(|| DeriveError::MissingParameter {
                template: template_id.to_string(),
                parameter: slot.name.clone(),
            })?;

            if value.kind() != slot.kind {
                return Err(DeriveError::InvalidParameter {
                    parameter: slot.name.clone(),
                    reason: format!("expected {}, got {}", slot.kind, value.kind()),
                });
            }
            let encoded = value.encode().ok_or_else(|| DeriveError::InvalidParameter {
                parameter: slot.name.clone(),
                reason: "value does not fit in 48 bits".to_string(),
            })?;

            let range = slot
                .offset
                .checked_add(slot.kind.width())
                .map(|end| slot.offset..end)
                .filter(|range| template.code.get(range.clone()) == Some(slot.placeholder.as_slice()))
                .ok_or_else(|| DeriveError::TemplateMismatch {
                    template: template_id.to_string(),
                    parameter: slot.name.clone(),
                    offset: slot.offset,
                })?;

            payload[range].copy_from_slice(&encoded);
        }

        let address = content_address(&payload);
        debug!("Derived {} deployment at {}", template_id, address);

        Ok(Deployment {
            template: template_id.clone(),
            address,
            init_payload: payload,
        })
    }
}

/// The address a payload deploys to: the trailing 20 bytes of its domain-separated hash
pub fn content_address(payload: &[u8]) -> Address {
    let mut hasher = Sha256Hasher::new();
    hasher.update(&[DEPLOY_PREFIX]);
    hasher.update(DEPLOY_DOMAIN);
    hasher.update(payload);
    let hash: Hash = hasher.finalize();

    let mut bytes = [0u8; Address::LEN];
    bytes.copy_from_slice(hash.tail(Address::LEN));
    Address::new(bytes)
}
