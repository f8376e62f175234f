//! Error handling for report computations
//!
//! The report engines are deliberately best-effort: malformed or incomplete
//! transactions degrade the accuracy of a report instead of failing it. The
//! only hard errors are API-level ones, such as asking for a snapshot of a
//! year that cannot be represented as a calendar date.

use thiserror::Error;

/// Core error types for report operations
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("year {0} cannot be represented as a calendar cutoff")]
    InvalidYear(i32),
}

/// Result type alias for report operations
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_formatting_is_readable() {
        let err = ReportError::InvalidYear(1_000_000);
        assert_eq!(
            err.to_string(),
            "year 1000000 cannot be represented as a calendar cutoff"
        );
    }

    #[test]
    fn test_anyhow_context_chains_errors() {
        use anyhow::Context;
        let result: Result<()> = Err(anyhow::anyhow!(ReportError::InvalidYear(262144)))
            .context("failed to build portfolio snapshot");
        match result {
            Err(e) => {
                assert!(e.to_string().contains("failed to build portfolio snapshot"));
                let debug_msg = format!("{:?}", e);
                assert!(debug_msg.contains("262144"));
            }
            Ok(_) => panic!("expected error"),
        }
    }
}
