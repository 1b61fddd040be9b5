//! # 资产链路错误模型
//!
//! ## 设计思路
//!
//! 来源解析、格式归一、去重存储共用一个错误枚举，调用侧可按分支匹配。
//! 这些错误在导入流水线中按引用隔离：记录日志后跳过该引用，不中断整批处理。

use crate::dispatcher::DispatchError;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("网络错误：{0}")]
    Network(String),

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("超时错误：{0}")]
    Timeout(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("不支持的来源：{0}")]
    UnsupportedSource(String),

    #[error("无法存储资源：{attempts} 次尝试后仍存在命名冲突（{hash}）")]
    StoreExhausted { hash: String, attempts: u32 },

    #[error("{0}")]
    Dispatch(#[from] DispatchError),
}

impl AssetError {
    /// 稳定错误码，便于日志检索与统计。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network(_) => "E_NETWORK",
            Self::Decode(_) => "E_DECODE",
            Self::InvalidFormat(_) => "E_FORMAT",
            Self::FileSystem(_) => "E_FILESYSTEM",
            Self::Timeout(_) => "E_TIMEOUT",
            Self::ResourceLimit(_) => "E_LIMIT",
            Self::UnsupportedSource(_) => "E_UNSUPPORTED",
            Self::StoreExhausted { .. } => "E_STORE_EXHAUSTED",
            Self::Dispatch(_) => "E_DISPATCH",
        }
    }
}

impl From<std::io::Error> for AssetError {
    fn from(error: std::io::Error) -> Self {
        Self::FileSystem(error.to_string())
    }
}
