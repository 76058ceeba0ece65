//! Request handler module
//!
//! Responsible for manifest route dispatch: requests reach either the
//! built-in application behind a build entrypoint or a static file.

pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::handle_request;
