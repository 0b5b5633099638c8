/// Error codes of transient network failures.
pub const TRANSIENT_ERROR_CODES: &[&str] = &[
    "ECONNRESET",
    "ECONNREFUSED",
    "ETIMEDOUT",
    "ENOTFOUND",
    "EAI_AGAIN",
    "EPIPE",
    "ECONNABORTED",
    "ENETUNREACH",
    "EHOSTUNREACH",
];

/// What the retry layer needs to know about an operation's error.
pub trait Retryable {
    /// Symbolic transport error code such as `ECONNRESET`.
    fn error_code(&self) -> Option<&str> {
        None
    }

    /// HTTP status carried by the error, if it came from a response.
    fn http_status(&self) -> Option<u16> {
        None
    }
}

pub fn is_retryable_status(status: u16) -> bool {
    status >= 500 || status == 429
}

/// Transient transport codes, 5xx and 429 are retryable; everything else is terminal.
pub fn is_retryable<E: Retryable + ?Sized>(err: &E) -> bool {
    if let Some(code) = err.error_code() {
        if TRANSIENT_ERROR_CODES.contains(&code) {
            return true;
        }
    }
    err.http_status().is_some_and(is_retryable_status)
}
