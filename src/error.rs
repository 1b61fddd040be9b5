//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 子系统各自定义错误枚举（`DispatchError`、`AssetError`），
//! 在库的外层入口（设置读写、CLI、流水线构造）汇总为 `AppError`。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为子系统错误与 `std::io::Error` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串，便于宿主以 JSON 回传。

use serde::Serialize;

use crate::asset::AssetError;
use crate::dispatcher::DispatchError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 来源解析 / 格式归一 / 去重存储错误
    #[error("{0}")]
    Asset(#[from] AssetError),

    /// 任务调度错误
    #[error("{0}")]
    Dispatch(#[from] DispatchError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 设置读取、解析或校验失败
    #[error("设置错误: {0}")]
    Settings(String),

    /// 编辑器操作失败
    #[error("编辑器操作失败: {0}")]
    Editor(String),
}

/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_message_string() {
        let err = AppError::Settings("bad".to_string());
        assert_eq!(
            serde_json::to_string(&err).expect("serialize failed"),
            "\"设置错误: bad\""
        );
    }

    #[test]
    fn subsystem_errors_convert() {
        let err: AppError = AssetError::UnsupportedSource("ftp".to_string()).into();
        assert!(matches!(err, AppError::Asset(_)));

        let err: AppError = DispatchError::ContextClosed { id: 7 }.into();
        assert!(matches!(err, AppError::Dispatch(_)));
    }
}
