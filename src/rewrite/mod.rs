//! # 文档改写模块（rewrite）
//!
//! 在文档文本中定位指向某个来源标识的图片引用，替换为指向已存储资产的链接。
//!
//! - `link`：方言、链接渲染、宽度标注
//! - `textual`：`DocumentRewriter` 接口与正则实现

mod link;
mod textual;

pub use link::{render_link, split_caption, width_annotation, LinkDialect, LinkReference};
pub use textual::{
    DocumentRewriter, ImageReference, ReferenceShape, RewriteOutcome, RewriteRequest, TextualRewriter,
};
