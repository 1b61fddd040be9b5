//! # 导入模块（ingest）
//!
//! 把编辑器事件接到资产链路上：
//!
//! - `editor`：`Editor` 接口与内存实现 `TextBuffer`
//! - `html`：粘贴 HTML 的轻量 Markdown 转换
//! - `pipeline`：`IngestPipeline`，粘贴/拖放、选区转换、整篇转换

mod editor;
mod html;
mod pipeline;

pub use editor::{Editor, TextBuffer};
pub use html::{decode_entities, html_to_markdown};
pub use pipeline::{DataTransfer, DroppedFile, IngestPipeline, IngestReport, ReferenceOutcome};
