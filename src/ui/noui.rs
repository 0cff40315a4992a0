//! 命令行交互：选择漫画 → 查看本地进度 → 选择起点与数量 → 下载。
//!
//! 具体流程都在 `download::downloader` 中，这里只负责提问与打印。

use std::io::{self, BufRead, Write};

use anyhow::Result;
use tracing::{info, warn};

use crate::base_system::context::Config;
use crate::base_system::history::HistoryLedger;
use crate::download::downloader::{
    ChapterInventory, TitlePlan, download_with_plan, prepare_title_plan,
    resolve_count, resolve_title_input,
};
use crate::download::engine::ChapterEngine;
use crate::download::fetch::HttpFetcher;
use crate::download::models::{ChapterOutcome, PipelineError, RunSummary, StartPosition};
use crate::download::normalizer::ExternalNormalizer;
use crate::download::source::{AssetSource, Normalizer};
use crate::network_parser::source_for_url;

const RECENT_SHOWN: usize = 10;

/// 非交互模式的一次下载请求（来自命令行参数）。
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub input: String,
    pub start: StartPosition,
    pub count: Option<usize>,
}

pub fn run(config: &Config) -> Result<()> {
    let stdin = io::stdin();
    run_with_input(config, &mut stdin.lock())
}

/// 交互循环本体，输入结束（EOF）等同于退出。
pub fn run_with_input(config: &Config, input: &mut dyn BufRead) -> Result<()> {
    println!(
        "欢迎使用 komik-downloader。\n\
输入：最近访问序号 / 漫画地址\n\
命令：q 退出\n"
    );
    println!("保存目录：{}\n", config.default_save_dir().display());

    // 整个进程只持有一份记录，写盘失败时以内存为准
    let mut ledger = HistoryLedger::load(config.history_path(), config.max_history);
    loop {
        print_history(&ledger);

        let line = read_line(input, "请输入序号或漫画地址（q 退出）：")?;
        if line.is_empty() {
            break;
        }
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case("q") {
            println!("已退出。");
            break;
        }

        match interactive_session(config, &mut ledger, input, text) {
            Ok(Some(summary)) => print_summary(&summary),
            Ok(None) => {}
            Err(SessionError::Pipeline(err)) => println!("{}\n", err),
            Err(SessionError::Other(err)) => println!("下载失败: {}\n", err),
        }
    }

    Ok(())
}

/// 返回进程退出码：0 成功，2 输入无效或所选范围为空，1 来源不可用。
pub fn run_batch(config: &Config, request: BatchRequest) -> Result<i32> {
    let mut ledger = HistoryLedger::load(config.history_path(), config.max_history);
    let outcome = (|| -> std::result::Result<RunSummary, SessionError> {
        let url = resolve_title_input(&request.input, &ledger)?;
        let source = source_for_url(config, &url).map_err(SessionError::Other)?;
        let plan = prepare_title_plan(config, source.as_ref(), &url)?;
        ledger.record_access(&url, &plan.title);
        print_inventory(&plan, &plan.inventory());

        let start = plan.resolve_start(&request.start)?;
        let count = resolve_count(plan.remaining_from(start), request.count)?;
        run_download(config, source.as_ref(), &plan, start, count)
    })();

    match outcome {
        Ok(summary) => {
            print_summary(&summary);
            Ok(0)
        }
        Err(SessionError::Pipeline(err @ PipelineError::InvalidSelection(_))) => {
            println!("{}", err);
            Ok(2)
        }
        Err(SessionError::Pipeline(err)) => {
            println!("{}", err);
            Ok(1)
        }
        Err(SessionError::Other(err)) => Err(err),
    }
}

enum SessionError {
    Pipeline(PipelineError),
    Other(anyhow::Error),
}

impl From<PipelineError> for SessionError {
    fn from(value: PipelineError) -> Self {
        Self::Pipeline(value)
    }
}

fn interactive_session(
    config: &Config,
    ledger: &mut HistoryLedger,
    input: &mut dyn BufRead,
    text: &str,
) -> std::result::Result<Option<RunSummary>, SessionError> {
    let url = resolve_title_input(text, ledger)?;
    let source = source_for_url(config, &url).map_err(SessionError::Other)?;

    println!("正在获取章节目录...");
    let plan = prepare_title_plan(config, source.as_ref(), &url)?;
    ledger.record_access(&url, &plan.title);

    let inventory = plan.inventory();
    print_inventory(&plan, &inventory);

    let Some(start) = prompt_start(input, &plan, &inventory)? else {
        return Ok(None);
    };

    let remaining = plan.remaining_from(start);
    let raw = read_line(input, &format!("下载多少章？（默认剩余全部 {} 章）：", remaining))
        .map_err(SessionError::Other)?;
    let requested = match raw.trim() {
        "" => None,
        s => Some(s.parse::<usize>().map_err(|_| {
            PipelineError::InvalidSelection(format!("无效的数量: {}", s))
        })?),
    };
    let count = resolve_count(remaining, requested)?;

    run_download(config, source.as_ref(), &plan, start, count).map(Some)
}

fn prompt_start(
    input: &mut dyn BufRead,
    plan: &TitlePlan,
    inventory: &ChapterInventory,
) -> std::result::Result<Option<usize>, SessionError> {
    println!("1. 从指定章节开始");
    if inventory.next_index.is_some() {
        println!("2. 从上次的位置继续");
    }
    println!("q. 返回\n");

    let choice = read_line(input, "请选择：").map_err(SessionError::Other)?;
    match choice.trim() {
        "1" => {
            let chapter = read_line(input, "起始章节（如 35 或 35.1）：").map_err(SessionError::Other)?;
            Ok(Some(
                plan.resolve_start(&StartPosition::Chapter(chapter.trim().to_string()))?,
            ))
        }
        "2" => Ok(Some(plan.resolve_start(&StartPosition::Resume)?)),
        c if c.eq_ignore_ascii_case("q") => Ok(None),
        other => Err(PipelineError::InvalidSelection(format!("无效的选项: {}", other)).into()),
    }
}

fn run_download(
    config: &Config,
    source: &dyn AssetSource,
    plan: &TitlePlan,
    start: usize,
    count: usize,
) -> std::result::Result<RunSummary, SessionError> {
    let fetcher = HttpFetcher::new(config.request_timeout(), &config.user_agent)
        .map_err(SessionError::Other)?;
    let normalizer = ExternalNormalizer::from_config(config);
    if config.enable_normalization {
        info!(target: "download", "放大工具: {}", normalizer.program().display());
    } else {
        warn!(target: "download", "已关闭图片放大，所有图片按原图保存");
    }
    let engine = ChapterEngine::new(
        config,
        source,
        &fetcher,
        Some(&normalizer as &dyn Normalizer),
    );

    println!(
        "开始下载《{}》：第 {} 章起共 {} 章，保存到 {}",
        plan.title,
        plan.chapters
            .get(start)
            .map(|c| c.key.to_string())
            .unwrap_or_default(),
        count,
        plan.workspace.root().display()
    );
    Ok(download_with_plan(plan, &engine, start, count, None))
}

fn print_history(ledger: &HistoryLedger) {
    if ledger.is_empty() {
        return;
    }
    println!("===== 最近访问 =====");
    for (idx, entry) in ledger.entries().iter().enumerate() {
        println!("{}. {} ({})", idx + 1, entry.title, entry.url);
    }
    println!();
}

fn print_inventory(plan: &TitlePlan, inventory: &ChapterInventory) {
    println!("\n《{}》共 {} 章", plan.title, inventory.total);
    if inventory.downloaded.is_empty() {
        println!("尚未下载任何章节");
    } else {
        let shown: Vec<String> = inventory
            .downloaded
            .iter()
            .rev()
            .take(RECENT_SHOWN)
            .rev()
            .map(|k| k.to_string())
            .collect();
        println!(
            "已下载 {} 章，最近：{}",
            inventory.downloaded.len(),
            shown.join(", ")
        );
    }
    if let Some(last) = &inventory.last {
        println!("最后下载的章节：{}", last);
    }
    match inventory.next_index.and_then(|i| plan.chapters.get(i)) {
        Some(next) => println!("下一个可下载章节：{}\n", next.key),
        None => println!("所有章节均已下载\n"),
    }
}

fn print_summary(summary: &RunSummary) {
    let totals = summary.totals();
    println!(
        "\n下载完成：处理 {} 章，已完成跳过 {} 章，无内容 {} 章",
        summary.count(ChapterOutcome::Processed),
        summary.count(ChapterOutcome::AlreadyDone),
        summary.count(ChapterOutcome::NoContent)
    );
    println!(
        "图片：放大 {} 张，原图 {} 张，失败 {} 张\n",
        totals.normalized, totals.kept_original, totals.failed
    );
    if totals.failed > 0 {
        println!("有图片失败的章节会在下次运行时重新下载。\n");
    }
}

fn read_line(input: &mut dyn BufRead, prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line)
}
