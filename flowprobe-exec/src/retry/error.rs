use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ResilienceError<E> {
    #[error("circuit breaker is open; retry in {}ms", retry_in.as_millis())]
    CircuitOpen { retry_in: Duration },

    #[error("retry exhausted after {attempts} attempt(s): {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    /// The operation failed with an error that is not worth retrying.
    #[error("{source}")]
    Aborted {
        attempts: u32,
        #[source]
        source: E,
    },
}

impl<E> ResilienceError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            ResilienceError::CircuitOpen { .. } => 0,
            ResilienceError::RetryExhausted { attempts, .. }
            | ResilienceError::Aborted { attempts, .. } => *attempts,
        }
    }

    /// Error of the last attempt, if any attempt ran.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            ResilienceError::CircuitOpen { .. } => None,
            ResilienceError::RetryExhausted { source, .. }
            | ResilienceError::Aborted { source, .. } => Some(source),
        }
    }

    pub fn into_last_error(self) -> Option<E> {
        match self {
            ResilienceError::CircuitOpen { .. } => None,
            ResilienceError::RetryExhausted { source, .. }
            | ResilienceError::Aborted { source, .. } => Some(source),
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }
}
