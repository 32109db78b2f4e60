use thiserror::Error;

/// Errors produced by the pure logic in this crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A submission parameter failed validation. Raised at the producer
    /// boundary before anything touches the store.
    #[error("validation error: {0}")]
    Validation(String),
}
