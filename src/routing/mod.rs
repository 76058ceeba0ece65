//! Routing module
//!
//! Provides manifest-driven routing:
//! - Regex route matching in declaration order (first match wins)
//! - Capture expansion into destinations
//! - Destination classification (build entrypoint vs. static file)

mod deployment;
mod matcher;

pub use deployment::{normalize, Deployment, DeploymentError, Destination};
pub use matcher::{anchor_pattern, Resolved, RouteError, RouteTable};
