//! Deployment module
//!
//! A deployment is a validated manifest together with its compiled route table.

use std::path::Path;

use super::matcher::{RouteError, RouteTable};
use crate::manifest::{Manifest, ManifestError, Runtime};

#[derive(Debug, thiserror::Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Route(#[from] RouteError),
}

/// Where a resolved route sends the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A declared build entrypoint
    Entrypoint { src: String, runtime: Runtime },
    /// A file relative to the project root
    Static { path: String },
}

#[derive(Debug)]
pub struct Deployment {
    pub manifest: Manifest,
    pub routes: RouteTable,
    entrypoints: Vec<(String, Runtime)>,
}

impl Deployment {
    /// Validate a manifest and compile its routes
    pub fn new(manifest: Manifest) -> Result<Self, DeploymentError> {
        manifest.validate()?;
        let routes = RouteTable::compile(&manifest.routes)?;
        let entrypoints = manifest
            .builds
            .iter()
            .map(|b| (normalize(&b.src).to_string(), Runtime::from_builder(&b.builder)))
            .collect();

        Ok(Self {
            manifest,
            routes,
            entrypoints,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DeploymentError> {
        Self::new(Manifest::load(path)?)
    }

    /// Classify a resolved destination
    ///
    /// Query strings are not part of the destination's identity.
    pub fn destination(&self, dest: &str) -> Destination {
        let path = normalize(dest.split('?').next().unwrap_or(dest));

        // First declaration wins when a source is built twice
        self.entrypoints
            .iter()
            .find(|(src, _)| src == path)
            .map_or_else(
                || Destination::Static {
                    path: path.to_string(),
                },
                |(src, runtime)| Destination::Entrypoint {
                    src: src.clone(),
                    runtime: runtime.clone(),
                },
            )
    }

    pub fn entrypoints(&self) -> &[(String, Runtime)] {
        &self.entrypoints
    }
}

/// Strip a leading `./` or `/` from a build source or destination
pub fn normalize(path: &str) -> &str {
    path.trim_start_matches("./").trim_start_matches('/')
}
