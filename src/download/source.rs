//! 外部协作方接口：章节/图片来源、图片下载、放大工具。
//!
//! 核心流程只依赖这里的 trait，具体站点解析在 `network_parser` 中实现，
//! 测试里可以直接换成预置数据。

use std::path::Path;

use super::models::{Asset, ChapterRef, PipelineError};

/// 章节与图片来源。任何失败都以空列表表示"没有可做的事"。
pub trait AssetSource {
    /// 用于目录命名与历史记录的标题。
    fn resolve_title(&self, title_ref: &str) -> String;

    /// 章节列表，顺序由来源决定（调用方负责排序）。
    fn list_chapters(&self, title_ref: &str) -> Vec<ChapterRef>;

    /// 某一章的图片，按阅读顺序。
    fn list_assets(&self, chapter: &ChapterRef) -> Vec<Asset>;
}

/// 把一张图片下载到指定路径，返回写入的字节数。
pub trait AssetFetcher {
    fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64, PipelineError>;
}

/// 外部放大工具。成功意味着进程正常退出；输出文件是否可用由调用方检查。
pub trait Normalizer {
    fn normalize(&self, input: &Path, output: &Path) -> Result<(), PipelineError>;
}
