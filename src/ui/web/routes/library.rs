//! 已下载内容的目录浏览：标题 → 章节 → 图片地址。

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use axum::Json;
use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::base_system::chapter_key::{compare_chapter_keys, natural_cmp};
use crate::ui::web::state::AppState;

use super::image::image_locator;

const IMAGE_EXTS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

pub(crate) async fn api_titles(State(state): State<AppState>) -> Json<Vec<String>> {
    let root = state.library_root.as_ref().clone();
    let titles = tokio::task::spawn_blocking(move || list_dirs(&root, natural_cmp).unwrap_or_default())
        .await
        .unwrap_or_default();
    Json(titles)
}

pub(crate) async fn api_chapters(
    State(state): State<AppState>,
    AxumPath(title): AxumPath<String>,
) -> Response {
    let Some(dir) = child_dir(&state.library_root, &[title.as_str()]) else {
        return (StatusCode::NOT_FOUND, "Judul not found").into_response();
    };
    let listed = tokio::task::spawn_blocking(move || list_dirs(&dir, compare_chapter_keys))
        .await
        .ok()
        .and_then(Result::ok);
    match listed {
        Some(chapters) => Json(chapters).into_response(),
        None => (StatusCode::NOT_FOUND, "Judul not found").into_response(),
    }
}

pub(crate) async fn api_images(
    State(state): State<AppState>,
    AxumPath((title, chapter)): AxumPath<(String, String)>,
) -> Response {
    let Some(dir) = child_dir(&state.library_root, &[title.as_str(), chapter.as_str()]) else {
        return (StatusCode::NOT_FOUND, "Chapter not found").into_response();
    };
    let listed = tokio::task::spawn_blocking(move || list_images(&dir))
        .await
        .ok()
        .and_then(Result::ok);
    match listed {
        Some(files) => {
            let locators: Vec<String> = files
                .iter()
                .map(|file| image_locator(&format!("{title}/{chapter}/{file}")))
                .collect();
            Json(locators).into_response()
        }
        None => (StatusCode::NOT_FOUND, "Chapter not found").into_response(),
    }
}

/// 路径参数只能是单层名称，拒绝 `..` 与分隔符。
fn child_dir(root: &Path, segments: &[&str]) -> Option<PathBuf> {
    let mut dir = root.to_path_buf();
    for seg in segments {
        if seg.is_empty() || *seg == "." || *seg == ".." || seg.contains(['/', '\\']) {
            return None;
        }
        dir.push(seg);
    }
    Some(dir)
}

/// 标题目录按自然顺序；章节目录与下载流程使用同一套章节排序。
fn list_dirs(dir: &Path, cmp: fn(&str, &str) -> Ordering) -> std::io::Result<Vec<String>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir()
            && let Some(name) = entry.file_name().to_str()
        {
            out.push(name.to_string());
        }
    }
    out.sort_by(|a, b| cmp(a, b));
    Ok(out)
}

fn list_images(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let ext = Path::new(&name)
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        if IMAGE_EXTS.contains(&ext.as_str()) {
            out.push(name);
        }
    }
    out.sort_by(|a, b| natural_cmp(a, b));
    Ok(out)
}
