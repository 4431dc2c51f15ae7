use tracing::{error, info, warn};

use crate::verdict::{Finding, Report, Verdict};

/// Renders a finished evaluation
pub trait Reporter {
    fn report(&self, report: &Report);
}

/// Writes the evidence trail and verdict through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report(&self, report: &Report) {
        for finding in &report.findings {
            match finding {
                Finding::Message(text) => info!("{}", text),
                Finding::Warning(text) => warn!("{}", text),
                Finding::Link { label, url } => info!("{}: {}", label, url),
            }
        }

        match &report.verdict {
            Verdict::Eligible => info!(upkeep_id = %report.upkeep_id, "Upkeep is eligible"),
            Verdict::Ineligible(reason) => {
                warn!(upkeep_id = %report.upkeep_id, "Upkeep is not eligible: {}", reason)
            }
            Verdict::Unknown { error, retryable } => error!(
                upkeep_id = %report.upkeep_id,
                retryable,
                "Could not determine eligibility: {}",
                error
            ),
        }
    }
}
