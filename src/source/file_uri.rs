//! `file:` URI 转本地路径。
//!
//! - `file:///C:/a%20b.png` → `C:\a b.png`（Windows）
//! - `file://server/share/a.png` → `\\server\share\a.png`（UNC）
//! - `file:///tmp/a.png` → `/tmp/a.png`

use std::path::PathBuf;

use crate::asset::AssetError;

/// 按当前平台将 file URI 转为路径。
pub fn file_uri_to_path(uri: &str) -> Result<PathBuf, AssetError> {
    file_uri_to_path_string(uri, cfg!(windows)).map(PathBuf::from)
}

/// 平台无关的转换核心，`windows` 决定分隔符与盘符处理。
pub fn file_uri_to_path_string(uri: &str, windows: bool) -> Result<String, AssetError> {
    let trimmed = uri.trim();
    let rest = trimmed
        .get(..5)
        .filter(|prefix| prefix.eq_ignore_ascii_case("file:"))
        .map(|_| &trimmed[5..])
        .ok_or_else(|| AssetError::InvalidFormat(format!("不是 file URI：{}", uri)))?;

    let (authority, raw_path) = match rest.strip_prefix("//") {
        Some(after) => match after.find('/') {
            Some(idx) => (&after[..idx], &after[idx..]),
            None => (after, ""),
        },
        None => ("", rest),
    };

    let raw_path = raw_path.split(['?', '#']).next().unwrap_or(raw_path);
    let decoded = urlencoding::decode(raw_path)
        .map_err(|e| AssetError::InvalidFormat(format!("file URI 解码失败：{}", e)))?
        .into_owned();

    let host = if authority.eq_ignore_ascii_case("localhost") {
        ""
    } else {
        authority
    };

    if !host.is_empty() {
        let host = urlencoding::decode(host)
            .map_err(|e| AssetError::InvalidFormat(format!("file URI 主机解码失败：{}", e)))?;
        return Ok(if windows {
            format!("\\\\{}{}", host, decoded.replace('/', "\\"))
        } else {
            format!("//{}{}", host, decoded)
        });
    }

    if decoded.is_empty() {
        return Err(AssetError::InvalidFormat(format!("file URI 缺少路径：{}", uri)));
    }

    if windows {
        let without_slash = if has_drive_prefix(&decoded) {
            &decoded[1..]
        } else {
            decoded.as_str()
        };
        Ok(without_slash.replace('/', "\\"))
    } else {
        Ok(decoded)
    }
}

/// 形如 `/C:` 或 `/C|` 的盘符前缀。
fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3
        && bytes[0] == b'/'
        && bytes[1].is_ascii_alphabetic()
        && (bytes[2] == b':' || bytes[2] == b'|')
}
