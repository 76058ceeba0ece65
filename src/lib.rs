//! Deployment host
//!
//! Loads a declarative deployment manifest, validates it and serves the
//! project it describes: requests are matched against the manifest's route
//! table and dispatched to the built-in application or to static files.

pub mod app;
pub mod config;
pub mod handler;
pub mod http;
pub mod logger;
pub mod manifest;
pub mod routing;
pub mod server;
