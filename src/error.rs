use thiserror::Error;

/// Error kind for the deterministic core (fingerprinting, scoring, grading).
///
/// Boundary (I/O-touching) code keeps using `Box<dyn std::error::Error + Send + Sync>`
/// the way the rest of this codebase always has; this enum exists so a tick loop can
/// match on *kind* instead of grepping a string, per the transient/not-available/
/// malformed/invariant taxonomy.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("not available")]
    NotAvailable,

    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl PipelineError {
    /// True for errors that should not be alerted on or persisted, but also should not
    /// be treated as a hard failure of the surrounding work unit.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, PipelineError::InvariantViolation(_))
    }

    pub fn is_not_available(&self) -> bool {
        matches!(self, PipelineError::NotAvailable)
    }
}

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
