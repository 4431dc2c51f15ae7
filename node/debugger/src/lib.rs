//! Upkeep eligibility debugger.
//!
//! Walks a single upkeep through the same steps an automation node takes
//! and explains where, if anywhere, it stops.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod verdict;

pub use config::{Args, Config, DebugRequest};
pub use error::DebugError;
pub use pipeline::EligibilityPipeline;
pub use report::{ConsoleReporter, Reporter};
pub use verdict::{Finding, Ineligibility, Report, Verdict};
