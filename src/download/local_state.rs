//! 本地目录状态：哪些章节已经落盘、某一章是否已完整。
//!
//! 没有额外的清单文件，完成状态只由章节目录里的成品图片数量推导，
//! 进程随时被中断后重新运行也能从目录内容恢复。

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::base_system::chapter_key::ChapterKey;
use crate::base_system::context::{Config, safe_fs_name};

pub(crate) const RAW_PREFIX: &str = "raw_";
const FINISHED_EXT: &str = "png";

/// 某个标题在本地的目录：`<输出根目录>/<标题>/<章节 key>/<图片>`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleWorkspace {
    root: PathBuf,
}

impl TitleWorkspace {
    pub fn new(output_root: &Path, title: &str) -> Self {
        Self {
            root: output_root.join(safe_fs_name(title, "_", 120)),
        }
    }

    pub fn for_config(config: &Config, title: &str) -> Self {
        Self::new(&config.default_save_dir(), title)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chapter_dir(&self, key: &ChapterKey) -> PathBuf {
        self.root.join(safe_fs_name(key.as_str(), "_", 120))
    }

    pub fn materialized_keys(&self) -> Vec<ChapterKey> {
        list_materialized_chapter_keys(&self.root)
    }
}

/// 下载中的原图（中间文件）。
pub fn raw_file_name(index: usize) -> String {
    format!("{RAW_PREFIX}image_{index}.jpg")
}

/// 放大后的成品。
pub fn scaled_file_name(index: usize) -> String {
    format!("scaled_image_{index}.{FINISHED_EXT}")
}

/// 未经放大、直接保留的成品。
pub fn kept_file_name(index: usize) -> String {
    format!("scaled_image_{index}_skip_.{FINISHED_EXT}")
}

pub fn is_finished_file(name: &str) -> bool {
    if name.starts_with(RAW_PREFIX) {
        return false;
    }
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(FINISHED_EXT))
}

/// 目录中的成品图片数量；目录不存在时为 0。
pub fn count_finished_files(chapter_dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(chapter_dir) else {
        return 0;
    };
    entries
        .flatten()
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|entry| entry.file_name().to_str().is_some_and(is_finished_file))
        .count()
}

/// 目录存在且成品数量恰好等于本次观察到的图片数量。
pub fn is_chapter_complete(chapter_dir: &Path, expected_asset_count: usize) -> bool {
    if !chapter_dir.is_dir() {
        return false;
    }
    let found = count_finished_files(chapter_dir);
    debug!(
        target: "engine",
        dir = %chapter_dir.display(),
        found,
        expected = expected_asset_count,
        "completeness check"
    );
    found == expected_asset_count
}

/// 至少含一个成品文件的章节目录，按章节数值升序。根目录不存在时返回空。
pub fn list_materialized_chapter_keys(title_dir: &Path) -> Vec<ChapterKey> {
    let Ok(entries) = fs::read_dir(title_dir) else {
        return Vec::new();
    };

    let mut keys: Vec<ChapterKey> = entries
        .flatten()
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|entry| count_finished_files(&entry.path()) > 0)
        .filter_map(|entry| entry.file_name().to_str().map(ChapterKey::new))
        .collect();
    keys.sort();
    keys
}

/// 删除上次中断遗留的原图，返回删除数量。
pub fn remove_intermediates(chapter_dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(chapter_dir) else {
        return 0;
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        let is_raw = entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with(RAW_PREFIX));
        if is_raw && fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }
    removed
}
