//! Proposal batch generation
//!
//! Derives the booth and ballot box addresses of motions `0..count`, merges
//! them with the descriptive metadata of a previous batch and writes the
//! address lists and the proposal document.

use std::fs;
use std::io;
use std::path::Path;

use qv_common::{Address, MotionId};
use qv_config::{BatchConfig, ConfigError, OutputFiles};
use qv_deployer::{derive_motion, AddressDeriver, DeriveError, MotionAddresses, TokenBindings};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Error types for batch generation
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Derivation error: {0}")]
    Derive(#[from] DeriveError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid batch: {0}")]
    Invalid(String),

    #[error("Failed to read prior proposals {path}: {reason}")]
    PriorData { path: String, reason: String },

    #[error("Failed to write {path}: {source}")]
    Write { path: String, source: io::Error },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for batch generation
pub type BatchResult<T> = Result<T, BatchError>;

impl From<BatchError> for qv_common::Error {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::Config(e) => e.into(),
            BatchError::Derive(e) => e.into(),
            BatchError::Write { .. } => qv_common::Error::internal(err.to_string()),
            BatchError::Serialization(_) => qv_common::Error::serialization(err.to_string()),
            _ => qv_common::Error::validation(err.to_string()),
        }
    }
}

/// One proposal as published to the front end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalEntry {
    pub title: String,
    pub topics: Vec<String>,
    pub proposal_id: String,
    pub description: String,
    pub booth_address: Address,
    pub yes_box_address: Address,
    pub no_box_address: Address,
}

impl ProposalEntry {
    /// An entry with blank metadata
    pub fn blank(motion: &MotionAddresses) -> Self {
        Self {
            title: String::new(),
            topics: Vec::new(),
            proposal_id: String::new(),
            description: String::new(),
            booth_address: motion.booth,
            yes_box_address: motion.yes_box,
            no_box_address: motion.no_box,
        }
    }
}

/// The published proposal document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalDocument {
    pub proposals: Vec<ProposalEntry>,
    pub vote_start_time: String,
    pub vote_end_time: String,
}

/// Descriptive metadata recorded for a proposal by an earlier batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriorEntry {
    pub title: String,
    pub topics: Vec<String>,
    pub proposal_id: String,
    pub description: String,
}

/// A previous proposal document; addresses and unknown fields are ignored
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PriorDocument {
    pub proposals: Vec<PriorEntry>,
}

impl PriorDocument {
    /// Read a prior document; a missing file means there is none
    pub fn load(path: &Path) -> BatchResult<Option<Self>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No prior proposals at {}", path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(BatchError::PriorData {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let prior = serde_json::from_str(&contents).map_err(|e| BatchError::PriorData {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(prior))
    }
}

/// The derived addresses of a batch of motions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalBatch {
    motions: Vec<MotionAddresses>,
}

impl ProposalBatch {
    /// Derive motions `0..count`
    pub fn generate(
        deriver: &AddressDeriver,
        count: usize,
        tokens: &TokenBindings,
    ) -> BatchResult<Self> {
        let motions = (0..count as u64)
            .map(|id| -> BatchResult<MotionAddresses> {
                let motion =
                    MotionId::new(id).map_err(|e| BatchError::Invalid(e.to_string()))?;
                Ok(derive_motion(deriver, motion, tokens)?.addresses())
            })
            .collect::<BatchResult<Vec<_>>>()?;

        debug!("Derived {} motions", motions.len());
        Ok(Self { motions })
    }

    /// Addresses in motion order
    pub fn motions(&self) -> &[MotionAddresses] {
        &self.motions
    }

    /// Build the proposal document, carrying over metadata from `prior` by
    /// position wherever the prior entry has a proposal id
    pub fn document(&self, prior: Option<&PriorDocument>) -> ProposalDocument {
        let proposals = self
            .motions
            .iter()
            .enumerate()
            .map(|(index, motion)| {
                let mut entry = ProposalEntry::blank(motion);
                let carried = prior
                    .and_then(|p| p.proposals.get(index))
                    .filter(|p| !p.proposal_id.is_empty());
                if let Some(old) = carried {
                    entry.title = old.title.clone();
                    entry.topics = old.topics.clone();
                    entry.proposal_id = old.proposal_id.clone();
                    entry.description = old.description.clone();
                }
                entry
            })
            .collect();

        ProposalDocument {
            proposals,
            vote_start_time: String::new(),
            vote_end_time: String::new(),
        }
    }

    /// Write the three address lists and the document under `out_dir`,
    /// replacing whatever those files held before
    pub fn write_outputs(
        &self,
        out_dir: &Path,
        files: &OutputFiles,
        document: &ProposalDocument,
    ) -> BatchResult<()> {
        fs::create_dir_all(out_dir).map_err(|source| BatchError::Write {
            path: out_dir.display().to_string(),
            source,
        })?;

        let lists: [(&str, fn(&MotionAddresses) -> Address); 3] = [
            (files.booth.as_str(), |m| m.booth),
            (files.yes.as_str(), |m| m.yes_box),
            (files.no.as_str(), |m| m.no_box),
        ];
        for (name, pick) in lists {
            let contents: String = self
                .motions
                .iter()
                .map(|m| format!("{}\n", pick(m)))
                .collect();
            write_file(&out_dir.join(name), contents.as_bytes())?;
        }

        let json = serde_json::to_string_pretty(document)?;
        write_file(&out_dir.join(&files.json), json.as_bytes())?;

        info!(
            "Wrote {} proposals to {}",
            self.motions.len(),
            out_dir.display()
        );
        Ok(())
    }
}

fn write_file(path: &Path, contents: &[u8]) -> BatchResult<()> {
    fs::write(path, contents).map_err(|source| BatchError::Write {
        path: path.display().to_string(),
        source,
    })
}

/// Run a whole batch as configured, returning the written document.
///
/// Prior metadata is read from `old_data` when given, otherwise from the
/// configured old-data file in the output directory.
pub fn run_batch(
    deriver: &AddressDeriver,
    config: &BatchConfig,
    old_data: Option<&Path>,
) -> BatchResult<ProposalDocument> {
    config.validate()?;

    let default_old = config.output_path(&config.files.old_data);
    let prior = PriorDocument::load(old_data.unwrap_or(default_old.as_path()))?;

    let batch = ProposalBatch::generate(deriver, config.how_many, &config.tokens)?;
    let document = batch.document(prior.as_ref());
    batch.write_outputs(&config.out_dir, &config.files, &document)?;
    Ok(document)
}
