//! Common utilities and types for quadratic voting

pub mod error;
pub mod logging;
pub mod types;

pub use error::{Error, Result};
pub use types::{Address, Amount, CardData, MotionId, Side, SCALE_DECIMALS};
