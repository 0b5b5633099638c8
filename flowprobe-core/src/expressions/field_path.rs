use std::fmt;

use serde_json::Value as JsonValue;

use crate::error::FieldPathError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Dot-notation path with numeric array indices: `data.tokens[0].value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn parse(input: &str) -> Result<Self, FieldPathError> {
        let path = input.trim();
        if path.is_empty() {
            return Err(FieldPathError::Empty);
        }

        let bytes = path.as_bytes();
        let mut segments = Vec::new();
        let mut i = 0;
        // A key is required at the start and after every '.'; only '.' or '[' may follow ']'.
        let mut expect_key = !path.starts_with('[');

        while i < bytes.len() {
            match bytes[i] {
                b'.' => {
                    if expect_key {
                        return Err(FieldPathError::EmptySegment {
                            path: path.to_string(),
                            offset: i,
                        });
                    }
                    expect_key = true;
                    i += 1;
                }
                b'[' => {
                    if expect_key && i != 0 {
                        return Err(FieldPathError::EmptySegment {
                            path: path.to_string(),
                            offset: i,
                        });
                    }
                    let close = path[i..].find(']').map(|off| i + off).ok_or_else(|| {
                        FieldPathError::UnterminatedIndex {
                            path: path.to_string(),
                            offset: i,
                        }
                    })?;
                    let raw = path[i + 1..close].trim();
                    let index = raw.parse::<usize>().map_err(|_| FieldPathError::InvalidIndex {
                        path: path.to_string(),
                        index: raw.to_string(),
                    })?;
                    segments.push(PathSegment::Index(index));
                    expect_key = false;
                    i = close + 1;
                }
                _ => {
                    if !expect_key {
                        return Err(FieldPathError::MissingSeparator {
                            path: path.to_string(),
                            offset: i,
                        });
                    }
                    let end = path[i..]
                        .find(['.', '['])
                        .map(|off| i + off)
                        .unwrap_or(path.len());
                    let key = path[i..end].trim();
                    if key.is_empty() {
                        return Err(FieldPathError::EmptySegment {
                            path: path.to_string(),
                            offset: i,
                        });
                    }
                    segments.push(PathSegment::Key(key.to_string()));
                    expect_key = false;
                    i = end;
                }
            }
        }

        if expect_key {
            return Err(FieldPathError::EmptySegment {
                path: path.to_string(),
                offset: path.len(),
            });
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Walks `value`; `None` means some segment was absent. An explicit JSON
    /// `null` at the end of the path resolves to `Some(Null)`.
    pub fn resolve<'v>(&self, value: &'v JsonValue) -> Option<&'v JsonValue> {
        let mut current = value;
        for seg in &self.segments {
            current = match (seg, current) {
                (PathSegment::Key(k), JsonValue::Object(map)) => map.get(k)?,
                (PathSegment::Index(i), JsonValue::Array(items)) => items.get(*i)?,
                // Numeric keys on objects (`{"0": ...}`) are addressed with brackets too.
                (PathSegment::Index(i), JsonValue::Object(map)) => map.get(&i.to_string())?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, seg) in self.segments.iter().enumerate() {
            match seg {
                PathSegment::Key(k) if n == 0 => write!(f, "{k}")?,
                PathSegment::Key(k) => write!(f, ".{k}")?,
                PathSegment::Index(i) => write!(f, "[{i}]")?,
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for FieldPath {
    type Err = FieldPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
