//! ec2-replacement-sim library
//!
//! Finds cheaper instance types that could replace a more expensive one.
//! Prices come from a `PriceSource`, the flexibility pattern picks which
//! types count as interchangeable, and the selector keeps the ones priced
//! below `replacement price * multiplier`.

pub mod config;
pub mod error;
pub mod exit_codes;
pub mod flexibility;
pub mod pricing;
pub mod report;
pub mod retry;
pub mod selector;
pub mod simulation;

// Re-export commonly used types
pub use config::Options;
pub use error::{Result, SimError};
pub use flexibility::FlexibilityMatcher;
pub use pricing::{CapacityType, PriceLookup, PriceSnapshot, PriceSource, StaticPriceSource};
pub use report::{Candidate, Diagnostic, OutputFormat, ReplacementReport};
pub use selector::{select_candidates, SelectionRequest};
pub use simulation::Simulation;
