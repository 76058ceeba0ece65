//! HTTP protocol layer module
//!
//! Provides HTTP protocol-related base functionality, decoupled from routing
//! and the built-in application.

pub mod mime;
pub mod response;

// Re-export commonly used types
pub use response::{
    build_404_response, build_405_response, build_413_response, build_body_response,
    build_html_response, build_json_error, build_json_response, build_options_response,
    build_redirect_response, build_text_response, HttpResponse,
};
