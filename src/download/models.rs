//! 下载相关的数据模型定义。
//!
//! 包含章节/图片引用、错误分类、单章处理报告与进度快照。

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::base_system::chapter_key::{ChapterKey, parse_chapter_key};

/// 一个章节：来源页面地址 + 解析出的章节 key。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterRef {
    pub url: String,
    #[serde(serialize_with = "serialize_key")]
    pub key: ChapterKey,
}

impl ChapterRef {
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let key = parse_chapter_key(&url);
        Self { url, key }
    }
}

fn serialize_key<S: serde::Serializer>(key: &ChapterKey, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(key.as_str())
}

/// 单张图片的来源地址，只在处理本章期间存在。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub src: String,
    pub alt: String,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("download {url} failed: {reason}")]
    AssetTransfer { url: String, reason: String },
    #[error("normalize {shown} failed: {reason}", shown = .input.display())]
    Normalization { input: PathBuf, reason: String },
    #[error("history ledger unreadable: {0}")]
    LedgerCorruption(String),
    #[error("{0}")]
    InvalidSelection(String),
    #[error("io error at {shown}: {source}", shown = .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// 单章处理结果。完成与否仍以目录里的成品文件数为准。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterOutcome {
    NoContent,
    AlreadyDone,
    Processed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetOutcome {
    /// 放大完成。
    Normalized,
    /// 重试后仍小于最小可接受体积，保留该结果。
    NormalizedUndersized,
    /// 原图足够大（或关闭了放大），直接改名保留。
    KeptOriginal,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DownloadResult {
    pub downloaded: u32,
    pub normalized: u32,
    pub kept_original: u32,
    pub failed: u32,
}

#[derive(Debug)]
pub struct AssetFailure {
    /// 从 1 开始的图片序号。
    pub index: usize,
    pub error: PipelineError,
}

#[derive(Debug)]
pub struct ChapterReport {
    pub key: ChapterKey,
    pub outcome: ChapterOutcome,
    pub asset_total: usize,
    pub result: DownloadResult,
    pub failures: Vec<AssetFailure>,
}

impl ChapterReport {
    pub(crate) fn skipped(key: ChapterKey, outcome: ChapterOutcome, asset_total: usize) -> Self {
        Self {
            key,
            outcome,
            asset_total,
            result: DownloadResult::default(),
            failures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartPosition {
    /// 从最后一个已下载章节之后继续。
    Resume,
    /// 从指定章节开始（接受 `35.1` / `35-1` / `chapter-35-1`）。
    Chapter(String),
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub chapters: Vec<ChapterReport>,
}

impl RunSummary {
    pub fn totals(&self) -> DownloadResult {
        self.chapters
            .iter()
            .fold(DownloadResult::default(), |mut acc, report| {
                acc.downloaded += report.result.downloaded;
                acc.normalized += report.result.normalized;
                acc.kept_original += report.result.kept_original;
                acc.failed += report.result.failed;
                acc
            })
    }

    pub fn count(&self, outcome: ChapterOutcome) -> usize {
        self.chapters.iter().filter(|c| c.outcome == outcome).count()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProgressSnapshot {
    pub chapter_done: usize,
    pub chapter_total: usize,
    pub current_chapter: Option<String>,
    pub asset_done: usize,
    pub asset_total: usize,
}
