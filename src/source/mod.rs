//! # 来源解析模块（source）
//!
//! ## 设计思路
//!
//! 将“图片引用字符串”转换为原始字节 + 格式提示：
//! 1. `classify` 一次性判定来源类别（封闭枚举）
//! 2. 按类别分派到网络下载 / data URI 解码 / 本地文件读取
//! 3. 本地引用与未知协议不报致命错误，由调用方跳过
//!
//! ## 子模块
//!
//! - `classify`：`SourceKind`
//! - `config`：`SourceConfig`
//! - `data_uri`：data URI 解析与体积预估
//! - `file_uri`：file URI → 路径（盘符 / UNC）
//! - `fetch`：`Fetcher` trait 与 `HttpFetcher`
//! - `resolver`：`SourceResolver`

mod classify;
mod config;
mod data_uri;
mod fetch;
mod file_uri;
mod resolver;

pub use classify::{classify, SourceKind};
pub use config::{SourceConfig, DEFAULT_USER_AGENT};
pub use data_uri::{parse_data_uri, DataUri};
pub use fetch::{Fetcher, HttpFetcher};
pub use file_uri::{file_uri_to_path, file_uri_to_path_string};
pub use resolver::SourceResolver;
