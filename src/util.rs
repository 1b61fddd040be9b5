//! 哈希与格式工具模块
//!
//! # 设计思路
//!
//! 这里只放纯函数：内容哈希、扩展名拆分、路径规范化、链接目标转义。
//! 不做任何 I/O，便于在执行上下文（worker）与调用方两侧复用。
//!
//! # 实现思路
//!
//! - 内容哈希使用 MD5 十六进制摘要，仅作为去重命名键，不承担安全边界。
//! - 扩展名长度超过 5 个字符时视为“没有扩展名”，避免把 `photo.jpeg_backup`
//!   这类后缀误判为扩展名。
//! - 库内路径统一使用 `/` 分隔。

/// 扩展名最大长度，超过即视为无扩展名。
pub const MAX_EXTENSION_LEN: usize = 5;

/// 计算字节序列的内容哈希（32 位小写十六进制）。
///
/// # 示例
/// ```rust
/// use smart_drop::util::content_hash;
///
/// assert_eq!(content_hash(b""), "d41d8cd98f00b204e9800998ecf8427e");
/// ```
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// 文件名拆分结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitFileName<'a> {
    pub basename: &'a str,
    pub extension: Option<&'a str>,
}

/// 按最后一个 `.` 拆分文件名。
///
/// - 没有 `.`：整个字符串作为 basename，扩展名为空
/// - 扩展名超过 [`MAX_EXTENSION_LEN`]：同上
///
/// # 示例
/// ```rust
/// use smart_drop::util::split_file_extension;
///
/// let split = split_file_extension("photo.jpeg_backup");
/// assert_eq!(split.basename, "photo.jpeg_backup");
/// assert_eq!(split.extension, None);
/// ```
pub fn split_file_extension(filename: &str) -> SplitFileName<'_> {
    match filename.rfind('.') {
        Some(idx) => {
            let extension = &filename[idx + 1..];
            if extension.chars().count() > MAX_EXTENSION_LEN {
                SplitFileName {
                    basename: filename,
                    extension: None,
                }
            } else {
                SplitFileName {
                    basename: &filename[..idx],
                    extension: Some(extension),
                }
            }
        }
        None => SplitFileName {
            basename: filename,
            extension: None,
        },
    }
}

/// 从 URL 或路径的最后一段推断扩展名（小写，空扩展名视为无）。
///
/// 查询串与片段会先被剥离；`scheme://host` 部分不参与推断。
pub fn extension_hint(reference: &str) -> Option<String> {
    let without_fragment = reference.split('#').next().unwrap_or(reference);
    let without_query = without_fragment
        .split('?')
        .next()
        .unwrap_or(without_fragment);
    let path = match without_query.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |idx| &rest[idx..]),
        None => without_query,
    };
    let last_segment = path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(path);

    split_file_extension(last_segment)
        .extension
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
}

/// 将 `\` 统一替换为 `/`。
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// 拼接库内路径：文件夹为空或为根（`/`）时直接返回文件名。
pub fn join_vault_path(folder: &str, name: &str) -> String {
    let folder = normalize_path(folder);
    let trimmed = folder.trim_end_matches('/');
    if trimmed.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", trimmed, name)
    }
}

/// 返回库内路径的父目录（根目录下的文件返回空字符串）。
pub fn parent_folder(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// 转义 Markdown 链接目标：逐段百分号编码，保留 `/` 分隔符。
///
/// # 示例
/// ```rust
/// use smart_drop::util::encode_link_target;
///
/// assert_eq!(encode_link_target("assets/my image.png"), "assets/my%20image.png");
/// ```
pub fn encode_link_target(target: &str) -> String {
    normalize_path(target)
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
