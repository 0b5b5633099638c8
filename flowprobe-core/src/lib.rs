#![forbid(unsafe_code)]

//! Flow definition model for flowprobe API test flows.
//!
//! Execution lives in `flowprobe-exec`; this crate only describes flows and the
//! small path/reference languages they embed.

pub mod error;
pub mod expressions;
pub mod parser;
pub mod types;

pub use crate::error::{FieldPathError, ParseError};
pub use crate::expressions::{env_reference, FieldPath, PathSegment};
pub use crate::parser::{load_flow_file, parse_flow_str, FlowFormat, ParsedFlow};
pub use crate::types::FlowDefinition;
