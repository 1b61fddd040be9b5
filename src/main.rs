//! # smart-drop 命令行入口
//!
//! 本文件只负责参数解析、日志初始化与宿主胶水（读写笔记文件）。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use bytes::Bytes;
use clap::{Parser, Subcommand};

use smart_drop::error::AppError;
use smart_drop::ingest::{DataTransfer, DroppedFile, Editor, IngestPipeline, IngestReport, TextBuffer};
use smart_drop::settings::{PluginSettings, VaultSettings, HOST_APP_CONFIG};
use smart_drop::storage::{FsVault, MemoryVault, Vault};

/// 插件设置默认位置（相对库根目录）。
const DEFAULT_SETTINGS_FILE: &str = ".obsidian/plugins/smart-drop/data.json";

#[derive(Debug, Parser)]
#[command(name = "smart-drop", version, about = "把笔记中的远程/内联图片转换为库内去重资产")]
struct Cli {
    /// 笔记库根目录
    #[arg(long, default_value = ".")]
    vault: PathBuf,

    /// 插件设置文件（默认为库内插件数据文件）
    #[arg(long)]
    settings: Option<PathBuf>,

    /// 只输出结果，不写入任何文件
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 转换笔记中已有的图片引用
    Convert {
        /// 笔记路径（相对库根目录）
        note: String,
    },
    /// 模拟一次粘贴：载荷插入笔记末尾并转换其中的图片
    Paste {
        /// 笔记路径（相对库根目录）
        note: String,
        /// HTML 载荷文件，`-` 表示标准输入
        #[arg(long, group = "payload")]
        html: Option<PathBuf>,
        /// 纯文本载荷文件，`-` 表示标准输入
        #[arg(long, group = "payload")]
        text: Option<PathBuf>,
        /// uri-list 载荷文件，`-` 表示标准输入
        #[arg(long, group = "payload")]
        uri_list: Option<PathBuf>,
        /// 拖放的本地文件（可重复）
        #[arg(long = "file")]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(report) => {
            println!(
                "converted={} skipped={} failed={}",
                report.converted(),
                report.skipped(),
                report.failed()
            );
            if report.failed() > 0 {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            log::error!("❌ {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<IngestReport, AppError> {
    let settings = load_settings(&cli.vault, cli.settings.as_deref())?;
    let vault: Arc<dyn Vault> = if cli.dry_run {
        Arc::new(MemoryVault::new())
    } else {
        Arc::new(FsVault::new(&cli.vault))
    };
    let pipeline = IngestPipeline::with_http(settings, vault)?;

    let (note, report, editor) = match cli.command {
        Command::Convert { note } => {
            let editor = TextBuffer::new(read_note(&cli.vault, &note)?);
            let report = pipeline.convert_document(&editor, &note).await;
            (note, report, editor)
        }
        Command::Paste {
            note,
            html,
            text,
            uri_list,
            files,
        } => {
            let transfer = DataTransfer {
                html: html.as_deref().map(read_payload).transpose()?,
                plain_text: text.as_deref().map(read_payload).transpose()?,
                uri_list: uri_list.as_deref().map(read_payload).transpose()?,
                files: files.iter().map(|path| read_dropped(path)).collect::<Result<_, _>>()?,
            };
            let editor = TextBuffer::new(read_note(&cli.vault, &note)?);
            let report = pipeline.on_data_transfer(&transfer, &editor, &note).await;
            (note, report, editor)
        }
    };

    let document = editor.get_value();
    if cli.dry_run {
        print!("{}", document);
    } else {
        let path = FsVault::new(&cli.vault).resolve(&note)?;
        std::fs::write(&path, document)?;
        log::info!("📝 已写回笔记 {}", path.display());
    }
    Ok(report)
}

/// 宿主配置存在时，库相关字段以宿主为准。
fn load_settings(vault_root: &Path, settings_path: Option<&Path>) -> Result<PluginSettings, AppError> {
    let path = settings_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| vault_root.join(DEFAULT_SETTINGS_FILE));
    let mut settings = PluginSettings::load_or_default(&path);

    if vault_root.join(HOST_APP_CONFIG).exists() {
        settings.vault = VaultSettings::from_vault_root(vault_root)?;
    }
    Ok(settings)
}

/// 笔记不存在时视为空文档。
fn read_note(vault_root: &Path, note: &str) -> Result<String, AppError> {
    let path = FsVault::new(vault_root).resolve(note)?;
    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(content),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(err.into()),
    }
}

fn read_payload(path: &Path) -> Result<String, AppError> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }
    Ok(std::fs::read_to_string(path)?)
}

fn read_dropped(path: &Path) -> Result<DroppedFile, AppError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    Ok(DroppedFile {
        name,
        bytes: Bytes::from(std::fs::read(path)?),
    })
}
