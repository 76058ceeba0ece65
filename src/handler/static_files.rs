//! Static file serving module
//!
//! Serves route destinations that are not build entrypoints from the
//! project root.

use crate::handler::router::RequestContext;
use crate::http::{self, mime, HttpResponse};
use crate::logger;
use hyper::body::Bytes;
use hyper::StatusCode;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Serve a file relative to `root`
pub async fn serve_file(ctx: &RequestContext<'_>, root: &str, relative: &str) -> HttpResponse {
    match load_file(root, relative).await {
        Some((content, content_type)) => {
            http::build_body_response(StatusCode::OK, content_type, Bytes::from(content), ctx.is_head)
        }
        None => http::build_404_response(),
    }
}

/// Load a file under `root`, refusing paths that escape it
pub async fn load_file(root: &str, relative: &str) -> Option<(Vec<u8>, &'static str)> {
    let file_path = resolve_within(root, relative)?;
    let content = match fs::read(&file_path).await {
        Ok(content) => content,
        Err(e) => {
            logger::log_warning(&format!("Failed to read {}: {e}", file_path.display()));
            return None;
        }
    };
    Some((content, mime::content_type_for(&file_path)))
}

/// Canonical path of `relative` inside `root`, if it exists and stays inside
fn resolve_within(root: &str, relative: &str) -> Option<PathBuf> {
    let root_canonical = match Path::new(root).canonicalize() {
        Ok(p) => p,
        Err(e) => {
            logger::log_warning(&format!(
                "Project root not found or inaccessible '{root}': {e}"
            ));
            return None;
        }
    };

    // File not found is common (404), no need to log
    let file_canonical = root_canonical
        .join(relative.trim_start_matches('/'))
        .canonicalize()
        .ok()?;

    if !file_canonical.starts_with(&root_canonical) {
        logger::log_warning(&format!("Rejected path outside project root: {relative}"));
        return None;
    }
    file_canonical.is_file().then_some(file_canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_file_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("static")).unwrap();
        std::fs::write(dir.path().join("static/site.css"), "body{}").unwrap();

        let root = dir.path().to_str().unwrap();
        let (content, content_type) = load_file(root, "static/site.css").await.unwrap();
        assert_eq!(content, b"body{}");
        assert_eq!(content_type, "text/css");
    }

    #[tokio::test]
    async fn test_traversal_and_missing_files() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("project");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(outer.path().join("secret.txt"), "secret").unwrap();

        let root = root.to_str().unwrap();
        assert!(load_file(root, "../secret.txt").await.is_none());
        assert!(load_file(root, "missing.html").await.is_none());
        // Directories are not files
        assert!(load_file(root, "").await.is_none());
    }
}
