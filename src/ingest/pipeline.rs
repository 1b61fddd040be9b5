//! # 导入流水线
//!
//! ## 设计思路
//!
//! 一次粘贴/拖放对应一次协作式流程：
//!
//! ```text
//! DataTransfer
//!    ↓ HTML → Markdown（或纯文本 / uri-list / 文件）
//! Editor::replace_selection
//!    ↓ 找出插入文本中的远程图片引用（按来源去重）
//! 每个引用并发执行：
//!    resolve → normalize（调度器 inspect / 可选 WebP）→ store → rewrite
//! IngestReport
//! ```
//!
//! ## 实现思路
//!
//! - 每个引用独立处理，失败只记日志并计数，不中断其他引用。
//! - 改写采用“找到才替换”，引用完成顺序任意都安全。
//! - 读取文档与写回之间没有 await，单个改写不会与其他改写交错。

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::join_all;

use super::editor::Editor;
use super::html::html_to_markdown;
use crate::asset::format::{self, ImageInspection};
use crate::asset::{AssetError, AssetStore, NormalizedAsset, RawAsset, StoredAssetPath};
use crate::dispatcher::TaskDispatcher;
use crate::error::AppError;
use crate::rewrite::{
    render_link, width_annotation, DocumentRewriter, ReferenceShape, RewriteOutcome, RewriteRequest,
    TextualRewriter,
};
use crate::settings::PluginSettings;
use crate::source::{classify, Fetcher, HttpFetcher, SourceResolver};
use crate::storage::Vault;
use crate::util;

/// 作为图片处理的 uri-list 扩展名。
const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "bmp", "svg", "avif", "tif", "tiff", "ico", "apng",
];

/// 拖放进来的文件。
#[derive(Debug, Clone)]
pub struct DroppedFile {
    pub name: String,
    pub bytes: Bytes,
}

/// 粘贴/拖放载荷。
#[derive(Debug, Clone, Default)]
pub struct DataTransfer {
    pub uri_list: Option<String>,
    pub html: Option<String>,
    pub plain_text: Option<String>,
    pub files: Vec<DroppedFile>,
}

impl DataTransfer {
    pub fn from_html(html: impl Into<String>) -> Self {
        Self {
            html: Some(html.into()),
            ..Self::default()
        }
    }

    pub fn from_plain_text(text: impl Into<String>) -> Self {
        Self {
            plain_text: Some(text.into()),
            ..Self::default()
        }
    }

    /// 按 HTML → 纯文本 → uri-list 的优先级生成插入文本。
    pub fn to_markdown(&self) -> Option<String> {
        if let Some(html) = non_empty(&self.html) {
            return Some(html_to_markdown(html));
        }
        if let Some(plain) = non_empty(&self.plain_text) {
            return Some(plain.to_string());
        }
        non_empty(&self.uri_list).map(uri_list_to_markdown)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// `text/uri-list`：`#` 开头为注释；图片地址转为图片引用，其余转为自动链接。
fn uri_list_to_markdown(uri_list: &str) -> String {
    uri_list
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|uri| {
            let is_image = uri.starts_with("data:image/")
                || util::extension_hint(uri)
                    .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()));
            if is_image {
                format!("![]({})", uri)
            } else {
                format!("<{}>", uri)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 单个引用的处理结果。
#[derive(Debug)]
pub enum ReferenceOutcome {
    Converted {
        source_identifier: String,
        stored: StoredAssetPath,
        rewritten: bool,
    },
    Skipped {
        source_identifier: String,
        reason: String,
    },
    Failed {
        source_identifier: String,
        error: AssetError,
    },
}

/// 一次导入的汇总。
#[derive(Debug, Default)]
pub struct IngestReport {
    pub outcomes: Vec<ReferenceOutcome>,
    /// 插入到编辑器中的文本。
    pub inserted_text: Option<String>,
}

impl IngestReport {
    pub fn converted(&self) -> usize {
        self.count(|o| matches!(o, ReferenceOutcome::Converted { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ReferenceOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ReferenceOutcome::Failed { .. }))
    }

    pub fn stored_paths(&self) -> Vec<&StoredAssetPath> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                ReferenceOutcome::Converted { stored, .. } => Some(stored),
                _ => None,
            })
            .collect()
    }

    fn count(&self, predicate: impl Fn(&ReferenceOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(o)).count()
    }
}

/// 导入流水线。
pub struct IngestPipeline {
    settings: PluginSettings,
    dispatcher: Arc<TaskDispatcher>,
    resolver: SourceResolver,
    store: AssetStore,
    rewriter: Arc<dyn DocumentRewriter>,
}

impl IngestPipeline {
    pub fn new(
        settings: PluginSettings,
        dispatcher: Arc<TaskDispatcher>,
        vault: Arc<dyn Vault>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, AppError> {
        settings.validate()?;

        let resolver = SourceResolver::new(settings.source_config()?, fetcher);
        let store = AssetStore::new(vault, dispatcher.clone())
            .with_max_probe_attempts(settings.max_probe_attempts);

        Ok(Self {
            settings,
            dispatcher,
            resolver,
            store,
            rewriter: Arc::new(TextualRewriter::new()),
        })
    }

    /// 启动调度器并使用 `HttpFetcher` 访问网络。
    pub fn with_http(settings: PluginSettings, vault: Arc<dyn Vault>) -> Result<Self, AppError> {
        let dispatcher = Arc::new(TaskDispatcher::new(settings.dispatcher_config()?)?);
        let fetcher = Arc::new(HttpFetcher::new(settings.source_config()?)?);
        Self::new(settings, dispatcher, vault, fetcher)
    }

    /// 替换文档改写实现。
    pub fn with_rewriter(mut self, rewriter: Arc<dyn DocumentRewriter>) -> Self {
        self.rewriter = rewriter;
        self
    }

    pub fn settings(&self) -> &PluginSettings {
        &self.settings
    }

    /// 粘贴/拖放入口。
    pub async fn on_data_transfer(
        &self,
        transfer: &DataTransfer,
        editor: &dyn Editor,
        note_path: &str,
    ) -> IngestReport {
        if !transfer.files.is_empty() {
            return self.insert_files(&transfer.files, editor, note_path).await;
        }

        let Some(markdown) = transfer.to_markdown() else {
            log::debug!("📋 载荷中没有可插入的内容");
            return IngestReport::default();
        };

        editor.replace_selection(&markdown);
        let sources = self.convertible_sources(&markdown);
        log::info!("📋 已插入粘贴内容，发现 {} 个待转换图片", sources.len());

        let mut report = self.convert_sources(sources, editor, note_path).await;
        report.inserted_text = Some(markdown);
        report
    }

    /// 转换选区中的图片引用（改写作用于整篇文档）。
    pub async fn convert_selection(&self, editor: &dyn Editor, note_path: &str) -> IngestReport {
        let selection = editor.get_selection();
        let sources = self.convertible_sources(&selection);
        self.convert_sources(sources, editor, note_path).await
    }

    /// 转换整篇文档中的图片引用。
    pub async fn convert_document(&self, editor: &dyn Editor, note_path: &str) -> IngestReport {
        let document = editor.get_value();
        let sources = self.convertible_sources(&document);
        self.convert_sources(sources, editor, note_path).await
    }

    /// 行内形态、按来源去重；本地引用与未知协议直接计为跳过。
    fn convertible_sources(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rewriter
            .find_references(text)
            .into_iter()
            .filter(|found| found.shape == ReferenceShape::Inline)
            .map(|found| found.reference.original_identifier)
            .filter(|source| seen.insert(source.clone()))
            .collect()
    }

    async fn convert_sources(
        &self,
        sources: Vec<String>,
        editor: &dyn Editor,
        note_path: &str,
    ) -> IngestReport {
        let folder = self.settings.vault.asset_folder_for(note_path);
        let tasks = sources
            .iter()
            .map(|source| self.convert_one(source, &folder, editor, note_path));
        let outcomes = join_all(tasks).await;

        let report = IngestReport {
            outcomes,
            inserted_text: None,
        };
        if !report.outcomes.is_empty() {
            log::info!(
                "🖼️ 图片转换完成 - 成功 {}，跳过 {}，失败 {}",
                report.converted(),
                report.skipped(),
                report.failed()
            );
        }
        report
    }

    async fn convert_one(
        &self,
        source: &str,
        folder: &str,
        editor: &dyn Editor,
        note_path: &str,
    ) -> ReferenceOutcome {
        let kind = classify(source);
        if !kind.is_convertible() {
            return ReferenceOutcome::Skipped {
                source_identifier: source.to_string(),
                reason: format!("来源类别 {}", kind.label()),
            };
        }

        match self.store_source(source, folder).await {
            Ok((stored, width)) => {
                let link_target = self.settings.vault.link_for(&stored.path(), note_path);
                let document = editor.get_value();
                let outcome = self.rewriter.rewrite(
                    &document,
                    &RewriteRequest {
                        source_identifier: source,
                        target: &link_target,
                        width,
                        dialect: self.settings.vault.dialect(),
                    },
                );

                let rewritten = match outcome {
                    RewriteOutcome::Rewritten { document, .. } => {
                        editor.set_value(&document);
                        true
                    }
                    RewriteOutcome::Unchanged => {
                        log::debug!("✏️ 文档中已无该引用，跳过改写");
                        false
                    }
                };

                ReferenceOutcome::Converted {
                    source_identifier: source.to_string(),
                    stored,
                    rewritten,
                }
            }
            Err(AssetError::UnsupportedSource(reason)) => ReferenceOutcome::Skipped {
                source_identifier: source.to_string(),
                reason,
            },
            Err(error) => {
                log::warn!(
                    "⚠️ 图片转换失败 [{}] {}: {}",
                    error.code(),
                    redact_source(source),
                    error
                );
                ReferenceOutcome::Failed {
                    source_identifier: source.to_string(),
                    error,
                }
            }
        }
    }

    /// resolve → normalize → store，返回存储位置与宽度标注。
    async fn store_source(
        &self,
        source: &str,
        folder: &str,
    ) -> Result<(StoredAssetPath, Option<u32>), AssetError> {
        let raw = self.resolver.resolve(source).await?;
        let normalized = self.normalize(raw).await;
        let stored = self
            .store
            .write_deduplicated(&normalized.bytes, Some(&normalized.format), folder)
            .await?;
        let width = width_annotation(normalized.width, self.settings.max_display_width);
        Ok((stored, width))
    }

    /// 确定格式与尺寸，按配置转码 WebP；检查或转码失败时保留原字节。
    pub async fn normalize(&self, raw: RawAsset) -> NormalizedAsset {
        let RawAsset {
            bytes,
            format_hint,
            source_identifier,
        } = raw;

        let inspection = match self.dispatcher.inspect_image(bytes.clone()).await {
            Ok(inspection) => inspection,
            Err(err) => {
                log::warn!("⚠️ 图片检查失败，按格式提示处理 - {}: {}", redact_source(&source_identifier), err);
                ImageInspection::default()
            }
        };

        let format = inspection
            .format
            .clone()
            .or(format_hint)
            .map(|f| format::canonical_format(&f))
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| format::DEFAULT_FORMAT.to_string());

        let mut normalized = NormalizedAsset {
            bytes,
            format,
            width: inspection.width,
            height: inspection.height,
        };

        if self.settings.convert_to_webp && format::is_webp_candidate(&normalized.format) {
            match self.dispatcher.transcode_webp(normalized.bytes.clone()).await {
                Ok(webp) => {
                    log::debug!(
                        "🔄 已转码为 WebP - {} → {} bytes",
                        normalized.bytes.len(),
                        webp.len()
                    );
                    normalized.bytes = webp;
                    normalized.format = "webp".to_string();
                }
                Err(err) => log::warn!("⚠️ WebP 转码失败，保留原格式: {}", err),
            }
        }

        normalized
    }

    async fn insert_files(
        &self,
        files: &[DroppedFile],
        editor: &dyn Editor,
        note_path: &str,
    ) -> IngestReport {
        let folder = self.settings.vault.asset_folder_for(note_path);
        let dialect = self.settings.vault.dialect();

        let tasks = files.iter().map(|file| {
            let folder = folder.as_str();
            async move {
                let raw = RawAsset {
                    bytes: file.bytes.clone(),
                    format_hint: util::extension_hint(&file.name),
                    source_identifier: file.name.clone(),
                };
                let normalized = self.normalize(raw).await;
                let stored = self
                    .store
                    .write_deduplicated(&normalized.bytes, Some(&normalized.format), folder)
                    .await;
                (
                    file,
                    stored.map(|s| (s, width_annotation(normalized.width, self.settings.max_display_width))),
                )
            }
        });

        let mut links = Vec::new();
        let mut outcomes = Vec::new();
        for (file, result) in join_all(tasks).await {
            match result {
                Ok((stored, width)) => {
                    let target = self.settings.vault.link_for(&stored.path(), note_path);
                    links.push(render_link(&target, "", width, dialect));
                    outcomes.push(ReferenceOutcome::Converted {
                        source_identifier: file.name.clone(),
                        stored,
                        rewritten: true,
                    });
                }
                Err(error) => {
                    log::warn!("⚠️ 拖放文件保存失败 [{}] {}: {}", error.code(), file.name, error);
                    outcomes.push(ReferenceOutcome::Failed {
                        source_identifier: file.name.clone(),
                        error,
                    });
                }
            }
        }

        let inserted = links.join("\n");
        if !inserted.is_empty() {
            editor.replace_selection(&inserted);
        }
        log::info!("📎 已保存 {} 个拖放文件", links.len());

        IngestReport {
            outcomes,
            inserted_text: (!inserted.is_empty()).then_some(inserted),
        }
    }
}

/// 日志中只保留来源的概要（data URI 不输出 payload）。
fn redact_source(source: &str) -> String {
    if source.starts_with("data:") {
        let head = source.split(',').next().unwrap_or("data:");
        return format!("{},…", head);
    }
    source.split(['?', '#']).next().unwrap_or(source).to_string()
}
