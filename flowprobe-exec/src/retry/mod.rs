mod circuit;
mod classify;
mod config;
mod error;
mod executor;

pub use circuit::{CircuitBreaker, CircuitSnapshot, CircuitState};
pub use classify::{is_retryable, is_retryable_status, Retryable, TRANSIENT_ERROR_CODES};
pub use config::{backoff_delay, CircuitBreakerConfig, RetryConfig};
pub use error::ResilienceError;
pub use executor::{RetryContext, RetryExecutor};
