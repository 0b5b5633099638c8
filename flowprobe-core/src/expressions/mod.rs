mod env_ref;
mod field_path;

pub use env_ref::env_reference;
pub use field_path::{FieldPath, PathSegment};
