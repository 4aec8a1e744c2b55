mod salute;

pub use salute::SaluteError;

/// Classifies failures that are safe to retry automatically.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}
