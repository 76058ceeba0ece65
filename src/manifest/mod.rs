//! Manifest module
//!
//! Loads, validates and re-serialises the deployment manifest:
//! - `installCommand` / `buildCommand` shell strings
//! - ordered `builds` (entrypoint + builder)
//! - ordered `routes` (pattern + destination)

mod plan;
mod types;
mod validate;

use std::path::{Path, PathBuf};

pub use plan::{BuildPlan, CommandStep, Runtime, StepKind};
pub use types::{BuildDescriptor, Manifest, RouteRule};

/// Errors raised while reading or checking a manifest
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("failed to serialize manifest: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("manifest is invalid:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}

impl Manifest {
    /// Parse a manifest from its JSON text
    pub fn from_json_str(text: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(text).map_err(ManifestError::Parse)
    }

    /// Read and parse a manifest file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Serialize with the platform's key names, two-space indented
    pub fn to_json_pretty(&self) -> Result<String, ManifestError> {
        serde_json::to_string_pretty(self).map_err(ManifestError::Serialize)
    }

    /// Check the structural rules, reporting every problem at once
    pub fn validate(&self) -> Result<(), ManifestError> {
        let issues = validate::collect_issues(self);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ManifestError::Invalid(issues))
        }
    }

    /// Declared build sources, in manifest order
    pub fn entrypoints(&self) -> impl Iterator<Item = &str> {
        self.builds.iter().map(|b| b.src.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPLOY_JSON: &str = r#"{
  "installCommand": "apt-get update && apt-get install -y gcc default-jdk && pip install -r requirements.txt",
  "buildCommand": "gcc analysis.c -o analysis && javac ReportGenerator.java",
  "builds": [
    {
      "src": "app.py",
      "use": "@vercel/python"
    }
  ],
  "routes": [
    {
      "src": "/(.*)",
      "dest": "app.py"
    }
  ]
}"#;

    #[test]
    fn test_parse_deploy_manifest() {
        let manifest = Manifest::from_json_str(DEPLOY_JSON).unwrap();
        assert_eq!(manifest.builds.len(), 1);
        assert_eq!(manifest.builds[0].src, "app.py");
        assert_eq!(manifest.builds[0].builder, "@vercel/python");
        assert_eq!(manifest.routes, vec![RouteRule::new("/(.*)", "app.py")]);
        assert!(manifest
            .build_command
            .as_deref()
            .unwrap()
            .starts_with("gcc analysis.c"));
        assert!(manifest.extra.is_empty());
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_round_trip_is_identical() {
        let manifest = Manifest::from_json_str(DEPLOY_JSON).unwrap();
        let text = manifest.to_json_pretty().unwrap();
        let reparsed = Manifest::from_json_str(&text).unwrap();
        assert_eq!(manifest, reparsed);
        // Serialization is stable once normalized
        assert_eq!(text, reparsed.to_json_pretty().unwrap());
    }

    #[test]
    fn test_unknown_keys_survive_round_trip() {
        let text = r#"{"version": 2, "builds": [{"src": "app.py", "use": "@vercel/python", "config": {"maxLambdaSize": "15mb"}}], "routes": [{"src": "/api/(.*)", "dest": "app.py", "methods": ["GET"]}]}"#;
        let manifest = Manifest::from_json_str(text).unwrap();
        assert_eq!(manifest.extra.get("version"), Some(&serde_json::json!(2)));
        assert!(manifest.builds[0].config.is_some());

        let reparsed = Manifest::from_json_str(&manifest.to_json_pretty().unwrap()).unwrap();
        assert_eq!(manifest, reparsed);
        assert!(!manifest.to_json_pretty().unwrap().contains("installCommand"));
    }

    #[test]
    fn test_malformed_documents_fail_to_parse() {
        assert!(matches!(
            Manifest::from_json_str(""),
            Err(ManifestError::Parse(_))
        ));
        assert!(matches!(
            Manifest::from_json_str("[]"),
            Err(ManifestError::Parse(_))
        ));
        assert!(matches!(
            Manifest::from_json_str(r#"{"builds": []} trailing"#),
            Err(ManifestError::Parse(_))
        ));
        // Route without a destination
        assert!(matches!(
            Manifest::from_json_str(r#"{"routes": [{"src": "/(.*)"}]}"#),
            Err(ManifestError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Manifest::load(dir.path().join("vercel.json")).unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
        assert!(err.to_string().contains("vercel.json"));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vercel.json");
        std::fs::write(&path, DEPLOY_JSON).unwrap();
        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.entrypoints().collect::<Vec<_>>(), vec!["app.py"]);
    }
}
