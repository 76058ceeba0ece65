// Manifest types module
// Defines the deployment manifest document and its records

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Deployment manifest
///
/// Key names follow the hosting platform's JSON schema. Unknown top-level
/// keys are kept in `extra` so that writing the manifest back out is lossless.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Shell command that installs toolchains and packages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_command: Option<String>,
    /// Shell command that compiles auxiliary sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,
    /// Build descriptors (ordered, duplicates allowed)
    #[serde(default)]
    pub builds: Vec<BuildDescriptor>,
    /// Route records (ordered, first match wins)
    #[serde(default)]
    pub routes: Vec<RouteRule>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A source entrypoint and the builder that packages it
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct BuildDescriptor {
    /// Source path of the entrypoint (e.g. `app.py`)
    pub src: String,
    /// Builder identifier (e.g. `@vercel/python`)
    #[serde(rename = "use")]
    pub builder: String,
    /// Builder-specific options, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
}

/// Route record - maps a path pattern to a destination
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RouteRule {
    /// Regular expression matched against the request path
    pub src: String,
    /// Destination, may reference captures as `$1` or `${name}`
    pub dest: String,
    /// Restrict the route to these HTTP methods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<Vec<String>>,
    /// Extra response headers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    /// Response status override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl RouteRule {
    /// Route without method, header or status qualifiers
    pub fn new(src: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dest: dest.into(),
            methods: None,
            headers: None,
            status: None,
        }
    }
}

impl BuildDescriptor {
    pub fn new(src: impl Into<String>, builder: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            builder: builder.into(),
            config: None,
        }
    }
}
