//! Typed failure categories of the provisioning workflow
//!
//! Operations return `anyhow::Result`; the variants below travel inside
//! `anyhow::Error` and are recovered with `downcast_ref` where a caller has to
//! branch on the category.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    /// An expected element did not appear within its timeout.
    #[error("element not found within {timeout:?}: {selector}")]
    ElementNotFound { selector: String, timeout: Duration },

    /// The credential prompt reappeared after the credential was submitted.
    #[error("session rejected: credential prompt reappeared after submission")]
    SessionRejected,

    #[error("device unreachable after {rounds} probe rounds")]
    DeviceUnreachable { rounds: u32 },

    /// The image has to be chosen manually.
    #[error("no firmware plan for model {model}: {reason}")]
    UnknownModelOrPlan { model: String, reason: String },

    #[error("step '{step}' failed after {attempts} attempts")]
    CriticalStepFailure { step: String, attempts: u32 },

    /// A session-dependent operation ran without an authenticated session
    /// and a single re-login did not restore one.
    #[error("authenticated session required for {operation}")]
    SessionRequired { operation: &'static str },

    #[error("main menu not ready after {rounds} dialog sweep rounds")]
    DialogSweepExhausted { rounds: u32 },

    #[error("no credential available for login")]
    MissingCredential,
}

/// Returns the typed category of an error, if it carries one.
pub fn category(e: &anyhow::Error) -> Option<&ConsoleError> {
    e.downcast_ref::<ConsoleError>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn category_survives_context() {
        let result: anyhow::Result<()> = Err(ConsoleError::SessionRejected.into());
        let e = result.context("failed to login").unwrap_err();

        assert!(matches!(category(&e), Some(ConsoleError::SessionRejected)));
        assert!(format!("{e:#}").starts_with("failed to login"));
    }

    #[test]
    fn plain_errors_have_no_category() {
        let e = anyhow::anyhow!("failed to parse");
        assert!(category(&e).is_none());
    }
}
