use std::path::Path;

use crate::error::ParseError;
use crate::types::FlowDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowFormat {
    Json,
    Yaml,
    Auto,
}

#[derive(Debug, Clone)]
pub struct ParsedFlow {
    pub flow: FlowDefinition,
    pub format: FlowFormat,
}

pub fn parse_flow_str(input: &str, format: FlowFormat) -> Result<ParsedFlow, ParseError> {
    match format {
        FlowFormat::Json => Ok(ParsedFlow {
            flow: serde_json::from_str::<FlowDefinition>(input)?,
            format,
        }),
        FlowFormat::Yaml => Ok(ParsedFlow {
            flow: serde_yaml::from_str::<FlowDefinition>(input)?,
            format,
        }),
        FlowFormat::Auto => parse_flow_auto(input),
    }
}

/// Reads a flow file; `.json` and `.yaml`/`.yml` extensions pick the format, anything else is sniffed.
pub fn load_flow_file(path: impl AsRef<Path>) -> Result<ParsedFlow, ParseError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let format = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => FlowFormat::Json,
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            FlowFormat::Yaml
        }
        _ => FlowFormat::Auto,
    };
    parse_flow_str(&content, format)
}

fn parse_flow_auto(input: &str) -> Result<ParsedFlow, ParseError> {
    // JSON documents start with `{` after trimming; everything else goes to YAML first.
    let trimmed = input.trim_start();
    if trimmed.starts_with('{') {
        return match serde_json::from_str::<FlowDefinition>(input) {
            Ok(flow) => Ok(ParsedFlow {
                flow,
                format: FlowFormat::Json,
            }),
            Err(e) => match serde_yaml::from_str::<FlowDefinition>(input) {
                Ok(flow) => Ok(ParsedFlow {
                    flow,
                    format: FlowFormat::Yaml,
                }),
                Err(_) => Err(ParseError::Json(e)),
            },
        };
    }

    match serde_yaml::from_str::<FlowDefinition>(input) {
        Ok(flow) => Ok(ParsedFlow {
            flow,
            format: FlowFormat::Yaml,
        }),
        Err(e) => {
            if let Ok(flow) = serde_json::from_str::<FlowDefinition>(input) {
                return Ok(ParsedFlow {
                    flow,
                    format: FlowFormat::Json,
                });
            }
            Err(ParseError::Yaml(e))
        }
    }
}
