//! 日志：控制台 + `logs/latest.log`。
//!
//! `latest.log` 只属于当前进程，退出时压缩进 `logs/archive/`；
//! 启动时若发现上次异常退出留下的 `latest.log`，先把它归档。
//! 归档最多保留 [`KEEP_ARCHIVES`] 份。

use std::fs::{self, File};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::{panic, thread, time::Duration};

use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::FileOptions;

const LOG_FILE: &str = "latest.log";
const ARCHIVE_DIR: &str = "archive";
pub const KEEP_ARCHIVES: usize = 20;
// 等待非阻塞写线程把缓冲落盘
const FLUSH_WAIT: Duration = Duration::from_millis(300);

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("日志系统已初始化")]
    AlreadyInitialized,
    #[error("注册日志订阅者失败: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
    #[error("日志文件读写失败: {0}")]
    Io(#[from] io::Error),
    #[error("日志归档失败: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("时间格式化失败: {0}")]
    Time(#[from] time::error::Format),
}

#[derive(Clone, Copy, Debug)]
pub struct LogOptions {
    /// 控制台输出 DEBUG 级别，并显示 `web_access` 访问日志。
    pub debug: bool,
    /// 为 false 时控制台不输出日志（交互模式）。
    pub console: bool,
    pub archive_on_exit: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            debug: false,
            console: true,
            archive_on_exit: true,
        }
    }
}

pub struct LogSystem {
    runtime: Arc<LogRuntime>,
}

impl LogSystem {
    pub fn init(options: LogOptions, base_dir: Option<&Path>) -> Result<Self, LogError> {
        let logs_dir = base_dir
            .map(|b| b.join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"));
        fs::create_dir_all(&logs_dir)?;

        let leftover = archive_latest(&logs_dir)?;

        let (file_writer, guard) = NonBlockingBuilder::default()
            .lossy(false)
            .finish(rolling::never(&logs_dir, LOG_FILE));

        // 进度条画在 stderr 上，日志走 stdout
        let console_layer = options.console.then(|| {
            fmt::layer()
                .with_target(false)
                .with_ansi(io::stdout().is_terminal())
                .with_writer(io::stdout)
                .with_filter(console_targets(options.debug))
        });

        let file_layer = fmt::layer()
            .with_timer(UtcTime::new(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
            )))
            .with_target(true)
            .with_thread_names(true)
            .with_ansi(false)
            .with_writer(file_writer)
            .with_filter(LevelFilter::DEBUG);

        tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| {
                if e.to_string().contains("already") {
                    LogError::AlreadyInitialized
                } else {
                    LogError::SubscriberInit(e)
                }
            })?;

        if let Some(path) = leftover {
            info!(target: "startup", archive = %path.display(), "上次运行的日志已归档");
        }

        let runtime = Arc::new(LogRuntime {
            logs_dir,
            guard: Mutex::new(Some(guard)),
            finished: AtomicBool::new(false),
            archive_on_exit: options.archive_on_exit,
        });
        runtime.install_signal_handler();
        runtime.install_panic_hook();

        Ok(Self { runtime })
    }

    /// 刷新并归档日志；可重复调用，只有第一次生效。
    pub fn safe_exit(&self) {
        self.runtime.finish();
    }
}

impl Drop for LogSystem {
    fn drop(&mut self) {
        self.runtime.finish();
    }
}

/// 控制台默认不显示逐条访问日志。
fn console_targets(debug: bool) -> Targets {
    let (level, access) = if debug {
        (LevelFilter::DEBUG, LevelFilter::INFO)
    } else {
        (LevelFilter::INFO, LevelFilter::OFF)
    };
    Targets::new()
        .with_default(level)
        .with_target("web_access", access)
}

struct LogRuntime {
    logs_dir: PathBuf,
    guard: Mutex<Option<WorkerGuard>>,
    finished: AtomicBool,
    archive_on_exit: bool,
}

impl LogRuntime {
    // Ctrl+C 直接结束进程，这里只把日志落盘。
    fn install_signal_handler(self: &Arc<Self>) {
        let runtime = Arc::clone(self);
        let _ = ctrlc::set_handler(move || {
            eprintln!();
            warn!(target: "startup", "收到中断信号，未完成的章节下次运行时会重新处理");
            runtime.finish();
            std::process::exit(130);
        });
    }

    fn install_panic_hook(self: &Arc<Self>) {
        let runtime = Arc::clone(self);
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            match info.location() {
                Some(loc) => error!(
                    target: "startup",
                    file = loc.file(),
                    line = loc.line(),
                    "程序崩溃: {info}"
                ),
                None => error!(target: "startup", "程序崩溃: {info}"),
            }
            runtime.finish();
            previous(info);
        }));
    }

    fn finish(&self) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut guard) = self.guard.lock() {
            guard.take();
        }
        if !self.archive_on_exit {
            return;
        }
        thread::sleep(FLUSH_WAIT);
        if let Err(err) = archive_latest(&self.logs_dir) {
            eprintln!("日志归档失败: {err}");
        }
    }
}

/// 把 `latest.log` 压缩成 `archive/log_<时间>.zip` 并删除原文件。
///
/// 文件不存在或为空时返回 `None`。
pub fn archive_latest(logs_dir: &Path) -> Result<Option<PathBuf>, LogError> {
    let latest = logs_dir.join(LOG_FILE);
    let size = match fs::metadata(&latest) {
        Ok(meta) => meta.len(),
        Err(_) => return Ok(None),
    };
    if size == 0 {
        let _ = fs::remove_file(&latest);
        return Ok(None);
    }

    let archive_dir = logs_dir.join(ARCHIVE_DIR);
    fs::create_dir_all(&archive_dir)?;
    let stamp = OffsetDateTime::now_utc().format(format_description!(
        "[year][month][day]_[hour][minute][second]"
    ))?;
    let mut archive_path = archive_dir.join(format!("log_{stamp}.zip"));
    let mut seq = 1;
    while archive_path.exists() {
        archive_path = archive_dir.join(format!("log_{stamp}_{seq}.zip"));
        seq += 1;
    }

    let mut zip = ZipWriter::new(File::create(&archive_path)?);
    zip.start_file(
        format!("{stamp}.log"),
        FileOptions::default().compression_method(CompressionMethod::Deflated),
    )?;
    io::copy(&mut File::open(&latest)?, &mut zip)?;
    zip.finish()?;

    fs::remove_file(&latest)?;
    prune_archives(&archive_dir, KEEP_ARCHIVES);
    Ok(Some(archive_path))
}

/// 删除最旧的归档，只留 `keep` 份，返回删除数量。
pub fn prune_archives(archive_dir: &Path, keep: usize) -> usize {
    let Ok(entries) = fs::read_dir(archive_dir) else {
        return 0;
    };
    let mut archives: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "zip"))
        .collect();
    if archives.len() <= keep {
        return 0;
    }
    // 文件名以时间戳开头，字典序即时间顺序
    archives.sort();
    let excess = archives.len() - keep;
    archives
        .iter()
        .take(excess)
        .filter(|p| fs::remove_file(p).is_ok())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn latest_log_is_zipped_into_archive_dir() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(LOG_FILE), "chapter 1 done\n").unwrap();

        let archived = archive_latest(tmp.path()).unwrap().unwrap();
        assert!(archived.starts_with(tmp.path().join(ARCHIVE_DIR)));
        assert!(archived.is_file());
        assert!(!tmp.path().join(LOG_FILE).exists());

        // 同一秒再次归档不会覆盖
        fs::write(tmp.path().join(LOG_FILE), "chapter 2 done\n").unwrap();
        let second = archive_latest(tmp.path()).unwrap().unwrap();
        assert_ne!(archived, second);
    }

    #[test]
    fn empty_or_missing_log_is_not_archived() {
        let tmp = TempDir::new().unwrap();
        assert!(archive_latest(tmp.path()).unwrap().is_none());

        fs::write(tmp.path().join(LOG_FILE), "").unwrap();
        assert!(archive_latest(tmp.path()).unwrap().is_none());
        assert!(!tmp.path().join(LOG_FILE).exists());
        assert!(!tmp.path().join(ARCHIVE_DIR).exists());
    }

    #[test]
    fn pruning_keeps_newest_archives() {
        let tmp = TempDir::new().unwrap();
        for day in 1..=5 {
            fs::write(tmp.path().join(format!("log_2026010{day}_000000.zip")), "z").unwrap();
        }
        fs::write(tmp.path().join("notes.txt"), "keep").unwrap();

        assert_eq!(prune_archives(tmp.path(), 3), 2);
        let mut left: Vec<String> = fs::read_dir(tmp.path())
            .unwrap()
            .flatten()
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect();
        left.sort();
        assert_eq!(
            left,
            [
                "log_20260103_000000.zip",
                "log_20260104_000000.zip",
                "log_20260105_000000.zip",
                "notes.txt"
            ]
        );
    }
}
