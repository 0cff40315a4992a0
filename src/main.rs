use anyhow::{Result, anyhow};
use clap::Parser;

use komik_downloader::base_system::config::load_or_create;
use komik_downloader::base_system::context::Config;
use komik_downloader::base_system::logging::{LogOptions, LogSystem};
use komik_downloader::download::models::StartPosition;
use komik_downloader::ui;
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "komik-downloader")]
#[command(about = "Resumable comic chapter downloader")]
struct Cli {
    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 启用服务器模式（只读 Web 浏览已下载内容）
    #[arg(long, default_value_t = false)]
    server: bool,

    /// 显示版本信息后退出
    #[arg(long, default_value_t = false)]
    version: bool,

    /// 数据目录路径（用于存放 config.yml、history.json 和 logs 等文件）
    #[arg(long)]
    data_dir: Option<String>,

    /// 漫画地址或最近访问序号；提供后不再交互提问
    #[arg(long)]
    url: Option<String>,

    /// 从指定章节开始（如 35 / 35.1）
    #[arg(long, conflicts_with = "resume")]
    chapter: Option<String>,

    /// 从上次下载的位置继续（默认行为）
    #[arg(long, default_value_t = false)]
    resume: bool,

    /// 下载章节数量（默认剩余全部）
    #[arg(long)]
    count: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("komik-downloader v{}", VERSION);
        return Ok(());
    }

    let data_dir = cli.data_dir.as_ref().map(std::path::Path::new);
    // 交互模式下日志只写文件，避免打断提示与进度条
    let console = cli.debug || cli.server || cli.url.is_some();
    let log = init_logging(cli.debug, console, data_dir)?;

    let config = load_or_create::<Config>(None, data_dir)
        .map_err(|e| anyhow!(e.to_string()))?
        .with_data_dir(data_dir);
    info!(target: "startup", "当前版本: v{}", VERSION);

    if cli.server {
        return ui::web::run(&config);
    }

    if let Some(input) = cli.url {
        let start = match cli.chapter {
            Some(chapter) => StartPosition::Chapter(chapter),
            None => StartPosition::Resume,
        };
        let request = ui::noui::BatchRequest {
            input,
            start,
            count: cli.count,
        };
        let code = ui::noui::run_batch(&config, request)?;
        if code != 0 {
            // process::exit 不会执行 Drop，先手动归档日志
            log.safe_exit();
            std::process::exit(code);
        }
        return Ok(());
    }

    ui::noui::run(&config)
}

fn init_logging(
    debug: bool,
    console: bool,
    base_dir: Option<&std::path::Path>,
) -> Result<LogSystem> {
    let opts = LogOptions {
        debug,
        console,
        archive_on_exit: true,
    };
    LogSystem::init(opts, base_dir).map_err(|e| anyhow!(e))
}
