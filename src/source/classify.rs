//! 引用分类：一次判定，下游穷尽匹配。

use once_cell::sync::Lazy;
use regex::Regex;

/// 协议至少两个字符，`C:\...` 这类盘符路径因此不会被当作协议。
static SCHEME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<scheme>[A-Za-z][A-Za-z0-9+.\-]+):").expect("scheme regex must compile")
});

/// 图片引用的来源类别。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// `http` / `https` 远程地址。
    Http(String),
    /// `data:` 内联数据。
    Data(String),
    /// `file:` 本地文件 URI。
    File(String),
    /// 没有协议的引用（已是库内资源或相对路径）。
    Local(String),
    /// 其他协议，值为小写协议名。
    Unsupported(String),
}

impl SourceKind {
    /// 是否需要转换为本地资产。
    pub fn is_convertible(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Data(_) | Self::File(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Data(_) => "data",
            Self::File(_) => "file",
            Self::Local(_) => "local",
            Self::Unsupported(_) => "unsupported",
        }
    }
}

/// 按协议对引用分类。
///
/// # 示例
/// ```rust
/// use smart_drop::source::{classify, SourceKind};
///
/// assert!(matches!(classify("https://host/a.png"), SourceKind::Http(_)));
/// assert!(matches!(classify("assets/a.png"), SourceKind::Local(_)));
/// assert_eq!(classify("ftp://host/a.png"), SourceKind::Unsupported("ftp".to_string()));
/// ```
pub fn classify(reference: &str) -> SourceKind {
    let trimmed = reference.trim();
    let Some(captures) = SCHEME_REGEX.captures(trimmed) else {
        return SourceKind::Local(trimmed.to_string());
    };

    let scheme = captures["scheme"].to_ascii_lowercase();
    match scheme.as_str() {
        "http" | "https" => SourceKind::Http(trimmed.to_string()),
        "data" => SourceKind::Data(trimmed.to_string()),
        "file" => SourceKind::File(trimmed.to_string()),
        _ => SourceKind::Unsupported(scheme),
    }
}
