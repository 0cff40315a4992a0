//! 下载主流程编排：解析输入 → 准备计划 → 选择起点与数量 → 逐章执行。
//!
//! 这里不做任何终端交互，交互层（`ui::noui`）只负责收集输入并展示结果。

use tracing::{error, info};

use crate::base_system::chapter_key::ChapterKey;
use crate::base_system::context::Config;
use crate::base_system::history::HistoryLedger;

use super::engine::ChapterEngine;
use super::local_state::TitleWorkspace;
use super::models::{ChapterOutcome, ChapterRef, PipelineError, RunSummary, StartPosition};
use super::plan::{
    find_chapter_index, next_unprocessed_index, order_chapters, remaining_count, select_window,
};
use super::progress::{ProgressCallback, ProgressReporter};
use super::source::AssetSource;

/// 把用户输入解析成标题地址：纯数字取最近访问记录（从 1 开始），否则必须是 http(s) 地址。
pub fn resolve_title_input(input: &str, ledger: &HistoryLedger) -> Result<String, PipelineError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PipelineError::InvalidSelection("输入为空".to_string()));
    }

    if input.chars().all(|c| c.is_ascii_digit()) {
        let index: usize = input
            .parse()
            .map_err(|_| PipelineError::InvalidSelection(format!("无效的序号: {input}")))?;
        return ledger
            .entry_at(index)
            .map(|entry| entry.url.clone())
            .ok_or_else(|| PipelineError::InvalidSelection(format!("没有第 {index} 条访问记录")));
    }

    if input.starts_with("http://") || input.starts_with("https://") {
        Ok(input.to_string())
    } else {
        Err(PipelineError::InvalidSelection(format!(
            "无法识别的输入: {input}"
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterInventory {
    pub total: usize,
    pub downloaded: Vec<ChapterKey>,
    pub last: Option<ChapterKey>,
    pub next_index: Option<usize>,
}

/// 一次运行所需的全部上下文：排序后的章节目录与本地已存在的章节。
#[derive(Debug, Clone)]
pub struct TitlePlan {
    pub title_ref: String,
    pub title: String,
    pub workspace: TitleWorkspace,
    pub chapters: Vec<ChapterRef>,
    pub materialized: Vec<ChapterKey>,
}

pub fn prepare_title_plan(
    config: &Config,
    source: &dyn AssetSource,
    title_ref: &str,
) -> Result<TitlePlan, PipelineError> {
    let title = source.resolve_title(title_ref);
    let chapters = order_chapters(source.list_chapters(title_ref));
    if chapters.is_empty() {
        return Err(PipelineError::SourceUnavailable(format!(
            "未获取到章节目录: {title_ref}"
        )));
    }

    let workspace = TitleWorkspace::for_config(config, &title);
    let materialized = workspace.materialized_keys();
    info!(
        target: "download",
        title = %title,
        total = chapters.len(),
        downloaded = materialized.len(),
        "章节目录准备完成"
    );

    Ok(TitlePlan {
        title_ref: title_ref.to_string(),
        title,
        workspace,
        chapters,
        materialized,
    })
}

impl TitlePlan {
    /// 已落盘的最大数字章节；`unknown` 目录排在最后，不能作为续传起点。
    pub fn last_materialized(&self) -> Option<&ChapterKey> {
        self.materialized.iter().rev().find(|k| !k.is_unknown())
    }

    pub fn inventory(&self) -> ChapterInventory {
        let last = self.last_materialized().cloned();
        ChapterInventory {
            total: self.chapters.len(),
            downloaded: self.materialized.clone(),
            next_index: next_unprocessed_index(&self.chapters, last.as_ref()),
            last,
        }
    }

    /// 返回起始章节在有序目录中的下标。
    pub fn resolve_start(&self, start: &StartPosition) -> Result<usize, PipelineError> {
        match start {
            StartPosition::Resume => next_unprocessed_index(&self.chapters, self.last_materialized())
                .ok_or_else(|| PipelineError::InvalidSelection("所有章节均已下载".to_string())),
            StartPosition::Chapter(raw) => find_chapter_index(&self.chapters, raw)
                .ok_or_else(|| PipelineError::InvalidSelection(format!("未找到章节: {raw}"))),
        }
    }

    pub fn remaining_from(&self, start_index: usize) -> usize {
        remaining_count(self.chapters.len(), start_index)
    }
}

/// `None` 表示下载剩余全部章节；显式给出 0 视为无效输入。
pub fn resolve_count(remaining: usize, requested: Option<usize>) -> Result<usize, PipelineError> {
    match requested {
        None => Ok(remaining),
        Some(0) => Err(PipelineError::InvalidSelection(
            "下载数量必须大于 0".to_string(),
        )),
        Some(n) => Ok(n.min(remaining)),
    }
}

/// 按顺序处理窗口内的章节，返回每章的报告。
pub fn download_with_plan(
    plan: &TitlePlan,
    engine: &ChapterEngine<'_>,
    start_index: usize,
    count: usize,
    progress_cb: Option<ProgressCallback>,
) -> RunSummary {
    let window = select_window(&plan.chapters, start_index, count);
    let mut progress = ProgressReporter::new(window.len(), progress_cb);
    let mut summary = RunSummary::default();

    info!(
        target: "download",
        title = %plan.title,
        start = start_index,
        count = window.len(),
        "开始下载 {} 章",
        window.len()
    );

    for chapter in window {
        let report = engine.process_chapter(&plan.workspace, chapter, &mut progress);
        for failure in &report.failures {
            error!(
                target: "download",
                chapter = %report.key,
                index = failure.index,
                "{}",
                failure.error
            );
        }
        progress.finish_chapter();
        summary.chapters.push(report);
    }
    progress.finish_cli_bars();

    let totals = summary.totals();
    info!(
        target: "download",
        title = %plan.title,
        processed = summary.count(ChapterOutcome::Processed),
        already_done = summary.count(ChapterOutcome::AlreadyDone),
        no_content = summary.count(ChapterOutcome::NoContent),
        normalized = totals.normalized,
        kept = totals.kept_original,
        failed = totals.failed,
        "下载结束"
    );
    summary
}
