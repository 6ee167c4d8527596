//! Quadratic voting
//!
//! Voters spend voice credits to buy vote weight on binary motions, paying
//! the square of the weight they buy. Each voter holds a single-use ballot
//! card per motion, and the booth and ballot box addresses of a whole batch
//! of motions are derived before anything is deployed.

/// Module version information
pub mod version {
    /// The current version of the library
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// Re-export core components for easy access
pub mod core {
    pub use qv_common as common;
    pub use qv_crypto as crypto;
}

/// Address derivation for batches of motions
pub use qv_deployer as deployer;

/// Booths, ballot boxes and the ledger they run on
pub use qv_ledger as ledger;

/// Batch configuration
pub use qv_config as config;

/// Proposal batch generation
pub use qv_cli as proposals;
