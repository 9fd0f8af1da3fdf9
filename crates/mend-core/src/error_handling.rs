use thiserror::Error;

/// Failures on the generation side of the loop.
///
/// Runner-side failures are not errors; they are [`crate::FailureKind`]s
/// carried inside each attempt's report.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("completion service '{provider}' unavailable: {reason}")]
    ServiceUnavailable { provider: String, reason: String },
}

impl GenerationError {
    pub fn unavailable(provider: &str, err: &anyhow::Error) -> Self {
        GenerationError::ServiceUnavailable {
            provider: provider.to_string(),
            reason: format!("{:#}", err),
        }
    }
}
