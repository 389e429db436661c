//! Static overlay asset serving (§4.3). The overlay page's HTML/JS assets
//! themselves are out of scope (§1); this module only owns the serving
//! mechanics the teacher's `asset_handler`/`read_asset` pair established:
//! path-traversal-safe resolution under a public root, and quiet 204s for
//! the icon paths browsers request unprompted.

use std::path::{Path as FsPath, PathBuf};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::server::AppState;

/// Browsers request these unprompted; answering quietly avoids log noise
/// from a missing-overlay-page 404 on every tab open.
pub async fn icon_204() -> StatusCode {
    StatusCode::NO_CONTENT
}

fn mime_for_path(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or("") {
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript; charset=utf-8",
        "mjs" => "application/javascript; charset=utf-8",
        "html" => "text/html; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "ico" => "image/x-icon",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// Resolve `path` under `root`, rejecting anything that escapes it.
pub fn resolve_safe_path(root: &FsPath, path: &str) -> Option<PathBuf> {
    let candidate = root.join(path);
    let resolved = candidate.canonicalize().ok()?;
    let root_resolved = root.canonicalize().ok()?;
    if resolved.starts_with(&root_resolved) {
        Some(resolved)
    } else {
        None
    }
}

pub async fn asset_handler(State(state): State<AppState>, Path(path): Path<String>) -> axum::response::Response {
    let Some(root) = state.static_root.as_ref() else {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    };

    match resolve_safe_path(root, &path) {
        Some(resolved) => match std::fs::read(&resolved) {
            Ok(bytes) => (
                StatusCode::OK,
                [("content-type", mime_for_path(&path)), ("cache-control", "no-cache")],
                bytes,
            )
                .into_response(),
            Err(_) => (StatusCode::NOT_FOUND, "not found").into_response(),
        },
        None => (StatusCode::FORBIDDEN, "invalid path").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_attempt_is_rejected() {
        let root = std::env::temp_dir().join("ttsrelay-static-test-root");
        std::fs::create_dir_all(&root).unwrap();
        assert!(resolve_safe_path(&root, "../../etc/passwd").is_none());
    }

    #[test]
    fn file_within_root_resolves() {
        let root = std::env::temp_dir().join("ttsrelay-static-test-root-2");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("a.txt"), b"hi").unwrap();
        assert!(resolve_safe_path(&root, "a.txt").is_some());
    }

    #[tokio::test]
    async fn icon_204_returns_no_content() {
        assert_eq!(icon_204().await, StatusCode::NO_CONTENT);
    }
}
