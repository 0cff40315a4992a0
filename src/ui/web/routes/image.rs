use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::ui::web::state::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct ImageQuery {
    pub(crate) path: Option<String>,
}

/// `/api/image?path=<标题>/<章节>/<文件>`，路径相对下载根目录并做百分号编码。
pub(crate) fn image_locator(rel_path: &str) -> String {
    fn is_unreserved(b: u8) -> bool {
        b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
    }

    let mut encoded = String::with_capacity(rel_path.len() * 3);
    for &b in rel_path.as_bytes() {
        if is_unreserved(b) {
            encoded.push(char::from(b));
        } else {
            encoded.push('%');
            encoded.push_str(&format!("{b:02X}"));
        }
    }
    format!("/api/image?path={encoded}")
}

pub(crate) async fn api_image(
    State(state): State<AppState>,
    Query(q): Query<ImageQuery>,
) -> Response {
    let Some(path) = q.path.filter(|p| !p.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, "File path not specified").into_response();
    };

    let target = match resolve_target(state.library_root.as_ref(), &path) {
        Ok(t) => t,
        Err(status) if status == StatusCode::FORBIDDEN => {
            return (status, "Forbidden").into_response();
        }
        Err(status) => return (status, "File not found").into_response(),
    };

    let is_file = std::fs::metadata(&target)
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return (StatusCode::NOT_FOUND, "File not found").into_response();
    }

    let ext = target
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    };

    let file = match tokio::fs::File::open(&target).await {
        Ok(f) => f,
        Err(_) => return (StatusCode::NOT_FOUND, "File not found").into_response(),
    };
    let body = Body::from_stream(ReaderStream::new(file));

    let mut resp = Response::new(body);
    *resp.status_mut() = StatusCode::OK;
    resp.headers_mut()
        .insert(header::CONTENT_TYPE, header::HeaderValue::from_static(mime));
    resp
}

/// 规范化后必须仍位于下载根目录内。
fn resolve_target(base: &Path, path: &str) -> Result<PathBuf, StatusCode> {
    let rel = path.trim_start_matches(['/', '\\']);
    if rel.is_empty() {
        return Err(StatusCode::NOT_FOUND);
    }

    let base_canon = std::fs::canonicalize(base).map_err(|_| StatusCode::NOT_FOUND)?;
    let target = base.join(rel);
    let target_canon = std::fs::canonicalize(&target).map_err(|_| StatusCode::NOT_FOUND)?;
    if !target_canon.starts_with(&base_canon) {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(target_canon)
}
