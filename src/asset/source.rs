//! # 资产数据模型
//!
//! 将流水线各阶段的中间结果解耦：
//! - `RawAsset`：来源解析产出的原始字节与格式提示
//! - `NormalizedAsset`：格式已确定（可选转码）并带像素尺寸
//! - `StoredAssetPath`：去重存储后的库内位置

use bytes::Bytes;

use crate::util;

/// 来源解析阶段输出。
#[derive(Debug, Clone)]
pub struct RawAsset {
    /// 原始字节。
    pub bytes: Bytes,
    /// 来源给出的格式提示（URL 扩展名、data URI 类型等）。
    pub format_hint: Option<String>,
    /// 文档中原始引用字符串。
    pub source_identifier: String,
}

/// 归一化阶段输出，`format` 始终为具体编码。
#[derive(Debug, Clone)]
pub struct NormalizedAsset {
    pub bytes: Bytes,
    pub format: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// 去重存储后的位置：`folder/name`，`name = hash[_ordinal].format`。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoredAssetPath {
    pub folder: String,
    pub name: String,
}

impl StoredAssetPath {
    /// 库内完整路径（`/` 分隔）。
    pub fn path(&self) -> String {
        util::join_vault_path(&self.folder, &self.name)
    }
}

impl std::fmt::Display for StoredAssetPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_path_joins_folder_and_name() {
        let stored = StoredAssetPath {
            folder: "notes/assets".to_string(),
            name: "abc.png".to_string(),
        };
        assert_eq!(stored.path(), "notes/assets/abc.png");

        let at_root = StoredAssetPath {
            folder: "/".to_string(),
            name: "abc.png".to_string(),
        };
        assert_eq!(at_root.to_string(), "abc.png");
    }
}
