mod error;
mod handler;
mod redact;
mod store;

pub use error::AuthError;
pub use handler::{extract_token, AuthHandler, EnvSource, ProcessEnv};
pub use redact::{mask_token, redact_headers, scrub_json, SensitiveHeadersConfig, REDACTED};
pub use store::{TokenInfo, TokenState, TokenStore};
