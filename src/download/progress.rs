//! 进度上报与 CLI 进度条管理。

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::base_system::chapter_key::ChapterKey;

use super::models::ProgressSnapshot;

pub type ProgressCallback = Box<dyn FnMut(&ProgressSnapshot) + Send>;

struct CliBars {
    _mp: MultiProgress,
    chapter_bar: ProgressBar,
    asset_bar: ProgressBar,
}

pub struct ProgressReporter {
    snapshot: ProgressSnapshot,
    cb: Option<ProgressCallback>, // optional UI callback
    cli: Option<CliBars>,
}

impl ProgressReporter {
    /// 没有回调时在 stderr 上画两条进度条（章节 / 当前章图片）。
    pub fn new(chapter_total: usize, cb: Option<ProgressCallback>) -> Self {
        let cli = if cb.is_none() && chapter_total > 0 {
            Some(make_cli_bars(chapter_total))
        } else {
            None
        };
        let mut reporter = Self {
            snapshot: ProgressSnapshot {
                chapter_total,
                ..ProgressSnapshot::default()
            },
            cb,
            cli,
        };
        reporter.emit();
        reporter
    }

    /// 不输出任何东西，测试与后台任务使用。
    pub fn silent() -> Self {
        Self {
            snapshot: ProgressSnapshot::default(),
            cb: None,
            cli: None,
        }
    }

    fn emit(&mut self) {
        if let Some(cb) = self.cb.as_mut() {
            cb(&self.snapshot);
        }
    }

    pub(crate) fn start_chapter(&mut self, key: &ChapterKey, asset_total: usize) {
        self.snapshot.current_chapter = Some(key.to_string());
        self.snapshot.asset_done = 0;
        self.snapshot.asset_total = asset_total;
        if let Some(cli) = self.cli.as_ref() {
            cli.chapter_bar.set_message(format!("Chapter {key}"));
            cli.asset_bar.reset();
            cli.asset_bar.set_length(asset_total as u64);
            cli.asset_bar.set_position(0);
        }
        self.emit();
    }

    pub(crate) fn asset_message(&self, msg: impl Into<String>) {
        if let Some(cli) = self.cli.as_ref() {
            cli.asset_bar.set_message(msg.into());
        }
    }

    pub(crate) fn inc_asset(&mut self) {
        if self.snapshot.asset_total == 0 {
            return;
        }
        self.snapshot.asset_done = (self.snapshot.asset_done + 1).min(self.snapshot.asset_total);
        if let Some(cli) = self.cli.as_ref() {
            cli.asset_bar.inc(1);
        }
        self.emit();
    }

    pub(crate) fn finish_chapter(&mut self) {
        self.snapshot.chapter_done =
            (self.snapshot.chapter_done + 1).min(self.snapshot.chapter_total.max(1));
        if let Some(cli) = self.cli.as_ref() {
            cli.chapter_bar.inc(1);
        }
        self.emit();
    }

    pub fn finish_cli_bars(&mut self) {
        let Some(cli) = self.cli.take() else {
            return;
        };
        cli.asset_bar.finish_and_clear();
        cli.chapter_bar.finish_and_clear();
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.finish_cli_bars();
    }
}

fn make_cli_bars(chapter_total: usize) -> CliBars {
    let mp = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());
    let chapter_style =
        ProgressStyle::with_template("{prefix} [{elapsed_precise}] {wide_bar} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");
    let asset_style =
        ProgressStyle::with_template("{prefix} {spinner} {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

    let chapter_bar = mp.add(ProgressBar::new(chapter_total as u64));
    chapter_bar.set_style(chapter_style);
    chapter_bar.set_prefix("Chapters");

    let asset_bar = mp.add(ProgressBar::new(0));
    asset_bar.set_style(asset_style);
    asset_bar.set_prefix("Images  ");
    asset_bar.enable_steady_tick(std::time::Duration::from_millis(120));

    CliBars {
        _mp: mp,
        chapter_bar,
        asset_bar,
    }
}
