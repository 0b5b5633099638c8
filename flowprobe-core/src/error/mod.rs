use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to parse as JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to parse as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to read flow file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldPathError {
    #[error("field path must not be empty")]
    Empty,
    #[error("field path `{path}` has an empty segment at offset {offset}")]
    EmptySegment { path: String, offset: usize },
    #[error("field path `{path}` has an unterminated `[` at offset {offset}")]
    UnterminatedIndex { path: String, offset: usize },
    #[error("field path `{path}` needs `.` before the key at offset {offset}")]
    MissingSeparator { path: String, offset: usize },
    #[error("field path `{path}` has a non-numeric index `{index}`")]
    InvalidIndex { path: String, index: String },
}
