//! 单章下载 + 放大流程。
//!
//! 每章的图片严格按顺序逐张处理：下载 → 判断体积 → （必要时）调用放大工具 → 清理原图。
//! 单张图片的任何错误只记录下来，不会中断本章；缺失的成品让下次完整性检查失败，
//! 从而在下一次运行时整章重做。

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::base_system::context::Config;

use super::local_state::{
    TitleWorkspace, is_chapter_complete, kept_file_name, raw_file_name, remove_intermediates,
    scaled_file_name,
};
use super::models::{
    AssetFailure, AssetOutcome, ChapterOutcome, ChapterRef, ChapterReport, DownloadResult,
    PipelineError,
};
use super::progress::ProgressReporter;
use super::source::{AssetFetcher, AssetSource, Normalizer};

pub struct ChapterEngine<'a> {
    source: &'a dyn AssetSource,
    fetcher: &'a dyn AssetFetcher,
    normalizer: Option<&'a dyn Normalizer>,
    large_enough_bytes: u64,
    min_normalized_bytes: u64,
}

impl<'a> ChapterEngine<'a> {
    /// `normalizer` 为 `None` 或配置关闭放大时，所有图片都按原图保留。
    pub fn new(
        config: &Config,
        source: &'a dyn AssetSource,
        fetcher: &'a dyn AssetFetcher,
        normalizer: Option<&'a dyn Normalizer>,
    ) -> Self {
        Self {
            source,
            fetcher,
            normalizer: normalizer.filter(|_| config.enable_normalization),
            large_enough_bytes: config.large_enough_bytes(),
            min_normalized_bytes: config.min_normalized_bytes(),
        }
    }

    pub fn process_chapter(
        &self,
        workspace: &TitleWorkspace,
        chapter: &ChapterRef,
        progress: &mut ProgressReporter,
    ) -> ChapterReport {
        let key = chapter.key.clone();
        info!(target: "engine", chapter = %key, url = %chapter.url, "处理章节 {}", key);

        let assets = self.source.list_assets(chapter);
        if assets.is_empty() {
            warn!(target: "engine", chapter = %key, url = %chapter.url, "未找到图片，跳过");
            return ChapterReport::skipped(key, ChapterOutcome::NoContent, 0);
        }
        let total = assets.len();
        info!(target: "engine", chapter = %key, total, "找到 {} 张图片", total);

        let dir = workspace.chapter_dir(&key);
        if is_chapter_complete(&dir, total) {
            info!(target: "engine", chapter = %key, "章节 {} 已下载完成", key);
            return ChapterReport::skipped(key, ChapterOutcome::AlreadyDone, total);
        }

        if let Err(err) = fs::create_dir_all(&dir) {
            let error = PipelineError::io(&dir, err);
            warn!(target: "engine", chapter = %key, error = %error, "创建章节目录失败");
            let mut report = ChapterReport::skipped(key, ChapterOutcome::Processed, total);
            report.result.failed = total as u32;
            report.failures.push(AssetFailure { index: 0, error });
            return report;
        }

        let stale = remove_intermediates(&dir);
        if stale > 0 {
            debug!(target: "engine", chapter = %key, stale, "removed leftover raw files");
        }

        progress.start_chapter(&key, total);
        let mut result = DownloadResult::default();
        let mut failures = Vec::new();

        for (i, asset) in assets.iter().enumerate() {
            let index = i + 1;
            match self.process_asset(&dir, index, total, &asset.src, progress) {
                Ok(outcome) => {
                    result.downloaded += 1;
                    match outcome {
                        AssetOutcome::Normalized | AssetOutcome::NormalizedUndersized => {
                            result.normalized += 1
                        }
                        AssetOutcome::KeptOriginal => result.kept_original += 1,
                    }
                }
                Err(error) => {
                    warn!(target: "engine", chapter = %key, index, error = %error, "处理第 {} 张图片失败", index);
                    if !matches!(error, PipelineError::AssetTransfer { .. }) {
                        result.downloaded += 1;
                    }
                    result.failed += 1;
                    failures.push(AssetFailure { index, error });
                }
            }
            progress.inc_asset();
        }

        info!(
            target: "engine",
            chapter = %key,
            normalized = result.normalized,
            kept = result.kept_original,
            failed = result.failed,
            "章节 {} 处理结束：放大 {} 张，原图 {} 张，失败 {} 张",
            key,
            result.normalized,
            result.kept_original,
            result.failed
        );

        ChapterReport {
            key,
            outcome: ChapterOutcome::Processed,
            asset_total: total,
            result,
            failures,
        }
    }

    fn process_asset(
        &self,
        dir: &Path,
        index: usize,
        total: usize,
        src: &str,
        progress: &ProgressReporter,
    ) -> Result<AssetOutcome, PipelineError> {
        let raw_path = dir.join(raw_file_name(index));

        progress.asset_message(format!("Downloading image {index} of {total}..."));
        self.fetcher.fetch_to(src, &raw_path)?;
        let raw_size = file_size(&raw_path)?;

        let normalizer = match self.normalizer {
            Some(n) if raw_size <= self.large_enough_bytes => n,
            _ => {
                progress.asset_message(format!(
                    "Image {index} is large enough, skipping scaling..."
                ));
                let kept_path = dir.join(kept_file_name(index));
                fs::rename(&raw_path, &kept_path).map_err(|e| PipelineError::io(&kept_path, e))?;
                return Ok(AssetOutcome::KeptOriginal);
            }
        };

        let scaled_path = dir.join(scaled_file_name(index));
        progress.asset_message(format!("Scaling image {index} of {total}..."));
        run_normalizer(normalizer, &raw_path, &scaled_path)?;

        let mut outcome = AssetOutcome::Normalized;
        if output_size(&scaled_path) < self.min_normalized_bytes {
            // 放大工具偶尔会输出残缺文件，只重试一次
            progress.asset_message(format!("Retrying scaling for image {index}..."));
            debug!(target: "engine", index, "scaled output undersized, retrying once");
            run_normalizer(normalizer, &raw_path, &scaled_path)?;
            if output_size(&scaled_path) < self.min_normalized_bytes {
                outcome = AssetOutcome::NormalizedUndersized;
            }
        }

        if !scaled_path.is_file() {
            return Err(PipelineError::Normalization {
                input: raw_path,
                reason: "no output produced".to_string(),
            });
        }
        if outcome == AssetOutcome::NormalizedUndersized {
            warn!(target: "engine", index, path = %scaled_path.display(), "放大结果仍偏小，保留该结果");
        }

        fs::remove_file(&raw_path).map_err(|e| PipelineError::io(&raw_path, e))?;
        Ok(outcome)
    }
}

/// 放大失败时删掉可能残留的输出，否则它会被当成成品计数。
fn run_normalizer(
    normalizer: &dyn Normalizer,
    input: &Path,
    output: &Path,
) -> Result<(), PipelineError> {
    normalizer.normalize(input, output).inspect_err(|_| {
        if output.exists()
            && let Err(err) = fs::remove_file(output)
        {
            warn!(target: "engine", path = %output.display(), error = %err, "remove partial scaled output failed");
        }
    })
}

fn file_size(path: &Path) -> Result<u64, PipelineError> {
    fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| PipelineError::io(path, e))
}

fn output_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
