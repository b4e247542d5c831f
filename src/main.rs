use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use storage_finder::application::VolumeConfig;
use storage_finder::{
    render_event, Config, ErrorLogger, EventKind, Finder, FinderEvent, LocalStorageProvider,
    Logger, LoggerTrait, SearchOutcome, SearchSummary, StorageKind,
};

/// 在存储卷中按文件名搜索文件
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// 要搜索的文件名片段
    #[clap(required = true)]
    needle: String,

    /// 配置文件路径，默认使用程序同级目录下的 finder.toml
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// 存储类型: sdcard, music, pictures, videos
    #[clap(short = 't', long = "type")]
    storage_type: Option<String>,

    /// 最小搜索长度
    #[clap(long)]
    min_length: Option<usize>,

    /// 同时搜索隐藏文件
    #[clap(long)]
    hidden: bool,

    /// 区分大小写
    #[clap(long)]
    case_sensitive: bool,

    /// 启用调试日志，日志文件保存在当前目录
    #[clap(long)]
    debug: bool,

    /// 额外的存储卷，格式为 NAME=DIR，可重复
    #[clap(long = "root", value_name = "NAME=DIR")]
    roots: Vec<String>,
}

/// 解析 NAME=DIR 形式的存储卷参数
fn parse_root(spec: &str, kind: &StorageKind) -> Result<VolumeConfig> {
    let (name, dir) = spec
        .split_once('=')
        .with_context(|| format!("无效的存储卷参数: {}", spec))?;

    Ok(VolumeConfig {
        name: name.trim().to_string(),
        kind: kind.clone(),
        root: PathBuf::from(dir.trim()),
    })
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None if !args.roots.is_empty() => Config {
            volumes: Vec::new(),
            ..Config::default()
        },
        None => Config::load_or_create(&Config::default_config_path()?)?,
    };

    if let Some(kind) = &args.storage_type {
        config.finder.storage_type = kind.parse().unwrap_or_default();
    }
    if let Some(min_length) = args.min_length {
        config.finder.min_search_length = min_length;
    }
    config.finder.hidden |= args.hidden;
    config.finder.case_sensitive |= args.case_sensitive;
    config.finder.debug_mode |= args.debug;

    for root in &args.roots {
        let volume = parse_root(root, &config.finder.storage_type)?;
        config.volumes.push(volume);
    }

    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let provider = LocalStorageProvider::from_config(&config.volumes);
    let logger = Arc::new(Logger::new(config.finder.debug_mode)?);
    let finder = Finder::with_logger(config.finder.clone(), &provider, logger.clone());
    let error_logger = Arc::new(ErrorLogger::new(config.finder.debug_mode)?);

    println!("搜索: {}", args.needle);
    println!("存储类型: {}", config.finder.storage_type);
    println!("存储卷数量: {}", finder.storage_count());
    println!("包含隐藏文件: {}", config.finder.hidden);
    println!("区分大小写: {}", config.finder.case_sensitive);
    println!();

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    progress.enable_steady_tick(Duration::from_millis(100));
    progress.set_message("正在搜索...");

    for kind in [
        EventKind::SearchCancelled,
        EventKind::Empty,
        EventKind::StorageSearchBegin,
        EventKind::FileFound,
        EventKind::SearchComplete,
        EventKind::Error,
    ] {
        let progress = progress.clone();
        finder.on(kind, move |event| {
            if let Some(line) = render_event(event) {
                progress.println(line);
            }
        });
    }

    let found_progress = progress.clone();
    finder.on(EventKind::SearchComplete, move |event| {
        if let FinderEvent::SearchComplete { match_count, .. } = event {
            found_progress.set_message(format!("已找到 {} 个文件", match_count));
        }
    });

    let errors = Arc::clone(&error_logger);
    finder.on(EventKind::Error, move |event| {
        if let FinderEvent::Error {
            message,
            detail,
            storage,
        } = event
        {
            let _ = errors.log_error(Some(storage.as_str()), message, detail);
        }
    });

    let mut summary = SearchSummary::new();
    let outcome = finder.search(&args.needle).wait();
    progress.finish_and_clear();

    summary.apply(&outcome);
    if matches!(outcome, SearchOutcome::Finished(_)) {
        summary.print()?;
    }

    error_logger.print_error_summary();
    error_logger.finalize()?;

    logger.finalize(
        summary.total_matches,
        summary.completed_volumes,
        summary.failed_volumes,
        summary.start_time.elapsed(),
    )?;
    if logger.is_enabled() {
        println!("调试日志已保存到: {}", logger.log_path().display());
    }

    Ok(())
}
