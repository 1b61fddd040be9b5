//! # HTML → Markdown
//!
//! 粘贴内容只关心图片与段落结构，因此只做轻量转换：
//! - `<img>` 转为 `![alt](src)`
//! - 块级结束标签与 `<br>` 转为换行，`<li>` 转为列表项
//! - `<script>` / `<style>` 连同内容丢弃，其余标签剥离
//! - 常见实体与数字实体解码

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const IMAGE_MARK: char = '\u{1}';

static DROP_BLOCK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style|head)\b[^>]*>.*?</(script|style|head)\s*>|<!--.*?-->")
        .expect("drop block regex must compile")
});

static IMG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<img\b(?P<attrs>[^>]*)>").expect("img regex must compile"));

static ATTR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)(?P<name>[a-z][a-z0-9\-:]*)\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<bare>[^\s"'>]+))"#)
        .expect("attr regex must compile")
});

static BREAK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("break regex must compile"));

static BLOCK_END_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</(p|div|h[1-6]|blockquote|pre|table|tr|ul|ol|figure|section|article)\s*>")
        .expect("block end regex must compile")
});

static LIST_ITEM_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<li\b[^>]*>").expect("list item regex must compile"));

static TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)</?[A-Za-z!][^>]*>").expect("tag regex must compile"));

static ENTITY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(?P<body>#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z]{2,8});")
        .expect("entity regex must compile")
});

static BLANK_LINES_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("blank lines regex must compile"));

/// 解码 HTML 实体，未知实体原样保留。
pub fn decode_entities(text: &str) -> String {
    ENTITY_REGEX
        .replace_all(text, |captures: &Captures<'_>| {
            let body = &captures["body"];
            let decoded = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match body {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| captures[0].to_string())
        })
        .into_owned()
}

fn attribute(attrs: &str, wanted: &str) -> Option<String> {
    ATTR_REGEX.captures_iter(attrs).find_map(|captures| {
        if !captures["name"].eq_ignore_ascii_case(wanted) {
            return None;
        }
        let value = captures
            .name("dq")
            .or_else(|| captures.name("sq"))
            .or_else(|| captures.name("bare"))?;
        Some(decode_entities(value.as_str()))
    })
}

/// 图片说明中的 `]` 与换行会破坏行内语法。
fn sanitize_alt(alt: &str) -> String {
    alt.chars()
        .map(|c| match c {
            '[' | ']' => ' ',
            '\n' | '\r' => ' ',
            other => other,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// 链接目标中的空格与括号需转义，否则行内语法会被截断。
fn sanitize_src(src: &str) -> String {
    src.trim()
        .replace(' ', "%20")
        .replace('(', "%28")
        .replace(')', "%29")
}

/// 将粘贴的 HTML 片段转换为 Markdown 文本。
///
/// # 示例
/// ```rust
/// use smart_drop::ingest::html_to_markdown;
///
/// let md = html_to_markdown(r#"<p>Hi <img alt="cat" src="https://x/c.png"></p>"#);
/// assert_eq!(md, "Hi ![cat](https://x/c.png)");
/// ```
pub fn html_to_markdown(html: &str) -> String {
    // U+0001 是图片片段的占位符，输入中的同名字符先移除
    let html = html.replace(IMAGE_MARK, "");
    let text = DROP_BLOCK_REGEX.replace_all(&html, "");
    let text = IMG_REGEX.replace_all(&text, |captures: &Captures<'_>| {
        let attrs = &captures["attrs"];
        match attribute(attrs, "src").filter(|src| !src.trim().is_empty()) {
            Some(src) => {
                let alt = attribute(attrs, "alt").unwrap_or_default();
                // 占位，避免后续剥离标签时误伤
                format!("{mark}![{}]({}){mark}", sanitize_alt(&alt), sanitize_src(&src), mark = IMAGE_MARK)
            }
            None => String::new(),
        }
    });
    let text = BREAK_REGEX.replace_all(&text, "\n");
    let text = BLOCK_END_REGEX.replace_all(&text, "\n\n");
    let text = LIST_ITEM_REGEX.replace_all(&text, "\n- ");
    let text = TAG_REGEX.replace_all(&text, "");

    // 图片片段在占位符之间，不做实体解码（src 已解码过）
    let mut markdown = String::with_capacity(text.len());
    for (index, piece) in text.split(IMAGE_MARK).enumerate() {
        if index % 2 == 1 {
            markdown.push_str(piece);
        } else {
            markdown.push_str(&decode_entities(piece));
        }
    }

    let markdown = markdown.replace("\r\n", "\n");
    let markdown = BLANK_LINES_REGEX.replace_all(&markdown, "\n\n");
    markdown.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_become_inline_references() {
        let md = html_to_markdown(r#"<div><img src='https://h/a.png?x=1&amp;y=2' alt="A [b]"/></div>"#);
        assert_eq!(md, "![A  b](https://h/a.png?x=1&y=2)");
    }

    #[test]
    fn image_without_src_is_dropped() {
        assert_eq!(html_to_markdown("<img alt=x>text"), "text");
    }

    #[test]
    fn blocks_and_breaks_become_newlines() {
        let md = html_to_markdown("<p>one</p><p>two<br>three</p>");
        assert_eq!(md, "one\n\ntwo\nthree");
    }

    #[test]
    fn list_items_and_entities() {
        let md = html_to_markdown("<ul><li>a &amp; b</li><li>&lt;c&gt;&#33;&#x21;</li></ul>");
        assert_eq!(md, "- a & b\n- <c>!!");
    }

    #[test]
    fn scripts_styles_and_comments_are_removed() {
        let md = html_to_markdown("<style>p{}</style><!-- x --><script>alert(1)</script><b>ok</b>");
        assert_eq!(md, "ok");
    }

    #[test]
    fn stray_control_marks_do_not_shift_decoding() {
        let md = html_to_markdown("a\u{1}&amp;<img src=\"https://h/x.png?a=1&amp;b=2\">&lt;b\u{1}");
        assert_eq!(md, "a&![](https://h/x.png?a=1&b=2)<b");
    }

    #[test]
    fn unknown_entities_are_kept() {
        assert_eq!(decode_entities("&bogus; &amp;"), "&bogus; &");
    }

    #[test]
    fn src_with_spaces_is_escaped() {
        let md = html_to_markdown(r#"<img src="file:///tmp/my pic (1).png">"#);
        assert_eq!(md, "![](file:///tmp/my%20pic%20%281%29.png)");
    }
}
