//! 链接渲染：两种方言 + 宽度标注。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util;

/// 链接方言。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkDialect {
    /// `![title|width](escaped/target)`
    #[default]
    Markdown,
    /// `![[target|title|width]]`
    Wiki,
}

impl LinkDialect {
    pub fn from_markdown_flag(use_markdown_links: bool) -> Self {
        if use_markdown_links {
            Self::Markdown
        } else {
            Self::Wiki
        }
    }
}

impl fmt::Display for LinkDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Markdown => f.write_str("markdown"),
            Self::Wiki => f.write_str("wiki"),
        }
    }
}

/// 文档中的一处图片引用。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReference {
    /// 引用当前指向的目标（URL、data URI 或库内路径）。
    pub original_identifier: String,
    pub display_title: String,
    pub width: Option<u32>,
}

/// 拆分 `title|width` 形式的说明文字。
///
/// # 示例
/// ```rust
/// use smart_drop::rewrite::split_caption;
///
/// assert_eq!(split_caption("cat|300"), ("cat".to_string(), Some(300)));
/// assert_eq!(split_caption("a|b"), ("a|b".to_string(), None));
/// ```
pub fn split_caption(caption: &str) -> (String, Option<u32>) {
    if let Some((title, width)) = caption.rsplit_once('|') {
        let width = width.trim();
        if !width.is_empty() && width.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(value) = width.parse::<u32>() {
                return (title.to_string(), Some(value));
            }
        }
    }
    (caption.to_string(), None)
}

/// 像素宽度超过显示阈值时返回标注值（即阈值本身）。
pub fn width_annotation(pixel_width: Option<u32>, threshold: Option<u32>) -> Option<u32> {
    match (pixel_width, threshold) {
        (Some(width), Some(limit)) if limit > 0 && width > limit => Some(limit),
        _ => None,
    }
}

/// 按方言渲染图片链接，空字段省略。
///
/// # 示例
/// ```rust
/// use smart_drop::rewrite::{render_link, LinkDialect};
///
/// assert_eq!(
///     render_link("assets/a b.png", "alt", Some(300), LinkDialect::Markdown),
///     "![alt|300](assets/a%20b.png)"
/// );
/// assert_eq!(
///     render_link("assets/a b.png", "", None, LinkDialect::Wiki),
///     "![[assets/a b.png]]"
/// );
/// ```
pub fn render_link(target: &str, title: &str, width: Option<u32>, dialect: LinkDialect) -> String {
    let width_text = width.map(|w| w.to_string());
    let caption: Vec<&str> = [Some(title), width_text.as_deref()]
        .into_iter()
        .flatten()
        .filter(|field| !field.is_empty())
        .collect();

    match dialect {
        LinkDialect::Markdown => {
            // 无标题时保留前导 `|`，否则宽度会被读成标题
            let caption = match (title.is_empty(), width) {
                (true, Some(width)) => format!("|{}", width),
                _ => caption.join("|"),
            };
            format!("![{}]({})", caption, util::encode_link_target(target))
        }
        LinkDialect::Wiki => {
            let mut fields = vec![target];
            fields.extend(caption);
            format!("![[{}]]", fields.join("|"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_without_width_stays_whole() {
        assert_eq!(split_caption("plain"), ("plain".to_string(), None));
        assert_eq!(split_caption(""), (String::new(), None));
        assert_eq!(split_caption("x|"), ("x|".to_string(), None));
        assert_eq!(split_caption("|120"), (String::new(), Some(120)));
    }

    #[test]
    fn width_annotation_only_above_threshold() {
        assert_eq!(width_annotation(Some(1200), Some(600)), Some(600));
        assert_eq!(width_annotation(Some(600), Some(600)), None);
        assert_eq!(width_annotation(None, Some(600)), None);
        assert_eq!(width_annotation(Some(1200), None), None);
        assert_eq!(width_annotation(Some(1200), Some(0)), None);
    }

    #[test]
    fn render_both_dialects() {
        assert_eq!(
            render_link("stored/path", "alt", Some(300), LinkDialect::Wiki),
            "![[stored/path|alt|300]]"
        );
        assert_eq!(
            render_link("stored/path", "alt", Some(300), LinkDialect::Markdown),
            "![alt|300](stored/path)"
        );
        assert_eq!(
            render_link("p.png", "", Some(300), LinkDialect::Wiki),
            "![[p.png|300]]"
        );
        assert_eq!(render_link("p.png", "", None, LinkDialect::Markdown), "![](p.png)");
        assert_eq!(
            render_link("p.png", "", Some(300), LinkDialect::Markdown),
            "![|300](p.png)"
        );
    }

    #[test]
    fn rendered_width_reads_back_in_both_dialects() {
        use crate::rewrite::{DocumentRewriter, TextualRewriter};

        for dialect in [LinkDialect::Markdown, LinkDialect::Wiki] {
            for title in ["", "cat"] {
                let link = render_link("p.png", title, Some(300), dialect);
                let found = TextualRewriter.find_references(&link);
                assert_eq!(found.len(), 1, "{}", link);
                assert_eq!(found[0].reference.original_identifier, "p.png");
                assert_eq!(found[0].reference.display_title, title, "{}", link);
                assert_eq!(found[0].reference.width, Some(300), "{}", link);
            }
        }
    }

    #[test]
    fn dialect_from_flag_and_serde_names() {
        assert_eq!(LinkDialect::from_markdown_flag(true), LinkDialect::Markdown);
        assert_eq!(LinkDialect::from_markdown_flag(false), LinkDialect::Wiki);
        assert_eq!(
            serde_json::to_string(&LinkDialect::Wiki).expect("serialize failed"),
            "\"wiki\""
        );
    }
}
