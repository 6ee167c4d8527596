//! Proposal batch generation for quadratic voting
//!
//! Library half of the `qv-proposals` tool.

pub mod batch;

pub use batch::{
    run_batch, BatchError, BatchResult, PriorDocument, PriorEntry, ProposalBatch,
    ProposalDocument, ProposalEntry,
};
