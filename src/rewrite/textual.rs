//! # 文本改写实现
//!
//! ## 设计思路
//!
//! 以正则在原始文本上匹配两种引用形态，不做结构化解析：
//! - 行内形态 `![text](url)`：改写对象
//! - wiki 形态 `![[target|caption]]`：仅用于识别已是本地资产的引用
//!
//! 嵌套或畸形标记按“尽力匹配”处理。调用方只依赖 `DocumentRewriter`，
//! 以后换成结构化解析器无需改动调用侧。

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::link::{render_link, split_caption, LinkDialect, LinkReference};

static INLINE_IMAGE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[(?P<text>[^\]]*)\]\((?P<url>[^)]+)\)").expect("inline image regex must compile")
});

static WIKI_IMAGE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[\[(?P<target>[^\]|]+)(?:\|(?P<caption>[^\]]*))?\]\]")
        .expect("wiki image regex must compile")
});

/// 引用形态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceShape {
    Inline,
    Wiki,
}

/// 扫描得到的引用及其在文档中的字节区间。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub shape: ReferenceShape,
    pub reference: LinkReference,
    pub span: Range<usize>,
}

/// 一次改写请求：把指向 `source_identifier` 的引用改为指向 `target`。
#[derive(Debug, Clone)]
pub struct RewriteRequest<'a> {
    pub source_identifier: &'a str,
    pub target: &'a str,
    /// 新的宽度标注，为空时保留原有标注。
    pub width: Option<u32>,
    pub dialect: LinkDialect,
}

/// 改写结果，未命中时不返回文档副本。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    Unchanged,
    Rewritten { document: String, replacements: usize },
}

impl RewriteOutcome {
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Rewritten { .. })
    }

    pub fn into_document(self) -> Option<String> {
        match self {
            Self::Rewritten { document, .. } => Some(document),
            Self::Unchanged => None,
        }
    }
}

/// 文档改写接口。
pub trait DocumentRewriter: Send + Sync {
    /// 按出现顺序列出文档中的图片引用。
    fn find_references(&self, document: &str) -> Vec<ImageReference>;

    fn rewrite(&self, document: &str, request: &RewriteRequest<'_>) -> RewriteOutcome;
}

/// 基于正则的文本改写器。
#[derive(Debug, Clone, Copy, Default)]
pub struct TextualRewriter;

impl TextualRewriter {
    pub fn new() -> Self {
        Self
    }
}

/// 行内链接目标可能被 `<>` 包裹。
fn inline_target(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('<')
        .and_then(|inner| inner.strip_suffix('>'))
        .unwrap_or(trimmed)
}

fn inline_reference(captures: &Captures<'_>) -> LinkReference {
    let (display_title, width) = split_caption(&captures["text"]);
    LinkReference {
        original_identifier: inline_target(&captures["url"]).to_string(),
        display_title,
        width,
    }
}

/// wiki 形态中单独的数字说明即宽度（`![[p.png|300]]`）。
fn wiki_caption(caption: &str) -> (String, Option<u32>) {
    let trimmed = caption.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(width) = trimmed.parse::<u32>() {
            return (String::new(), Some(width));
        }
    }
    split_caption(caption)
}

impl DocumentRewriter for TextualRewriter {
    fn find_references(&self, document: &str) -> Vec<ImageReference> {
        let mut found: Vec<ImageReference> = INLINE_IMAGE_REGEX
            .captures_iter(document)
            .filter_map(|captures| {
                let whole = captures.get(0)?;
                Some(ImageReference {
                    shape: ReferenceShape::Inline,
                    reference: inline_reference(&captures),
                    span: whole.range(),
                })
            })
            .collect();

        found.extend(WIKI_IMAGE_REGEX.captures_iter(document).filter_map(|captures| {
            let whole = captures.get(0)?;
            let (display_title, width) = captures
                .name("caption")
                .map(|caption| wiki_caption(caption.as_str()))
                .unwrap_or_default();
            Some(ImageReference {
                shape: ReferenceShape::Wiki,
                reference: LinkReference {
                    original_identifier: captures["target"].trim().to_string(),
                    display_title,
                    width,
                },
                span: whole.range(),
            })
        }));

        found.sort_by_key(|image| image.span.start);
        found
    }

    fn rewrite(&self, document: &str, request: &RewriteRequest<'_>) -> RewriteOutcome {
        let mut replacements = 0usize;
        let rewritten = INLINE_IMAGE_REGEX.replace_all(document, |captures: &Captures<'_>| {
            let reference = inline_reference(captures);
            if reference.original_identifier != request.source_identifier {
                return captures[0].to_string();
            }

            replacements += 1;
            render_link(
                request.target,
                &reference.display_title,
                request.width.or(reference.width),
                request.dialect,
            )
        });

        if replacements == 0 {
            return RewriteOutcome::Unchanged;
        }

        log::debug!(
            "✏️ 已改写 {} 处引用 → {}（{}）",
            replacements,
            request.target,
            request.dialect
        );
        RewriteOutcome::Rewritten {
            document: rewritten.into_owned(),
            replacements,
        }
    }
}
