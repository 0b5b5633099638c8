use std::collections::BTreeMap;

pub const DEFAULT_NAMESPACE: &str = "default";

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Per-step authentication requirement.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StepAuth {
    /// The step is a login call; its response carries a token to store.
    Login {
        #[serde(rename = "tokenPath")]
        token_path: String,

        #[serde(default = "default_namespace")]
        namespace: String,

        /// Time-to-live in seconds from extraction.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[serde(rename = "expiresIn")]
        expires_in: Option<u64>,
    },
    /// The step needs a token that is already in the store.
    Static {
        #[serde(default = "default_namespace")]
        namespace: String,
    },
}

impl StepAuth {
    pub fn namespace(&self) -> &str {
        match self {
            StepAuth::Login { namespace, .. } | StepAuth::Static { namespace } => namespace,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StepAuth::Login { .. } => "login",
            StepAuth::Static { .. } => "static",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GlobalAuth {
    #[serde(default, rename = "static", skip_serializing_if = "BTreeMap::is_empty")]
    pub static_tokens: BTreeMap<String, StaticTokenDecl>,
}

/// A statically configured token: either the bare value or an object with an optional TTL.
///
/// The value may be `${ENV_VAR}`, resolved once when the flow starts.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum StaticTokenDecl {
    Value(String),
    Detailed {
        token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[serde(rename = "expiresIn")]
        expires_in: Option<u64>,
    },
}

impl StaticTokenDecl {
    pub fn raw_value(&self) -> &str {
        match self {
            StaticTokenDecl::Value(v) => v,
            StaticTokenDecl::Detailed { token, .. } => token,
        }
    }

    pub fn expires_in(&self) -> Option<u64> {
        match self {
            StaticTokenDecl::Value(_) => None,
            StaticTokenDecl::Detailed { expires_in, .. } => *expires_in,
        }
    }
}
