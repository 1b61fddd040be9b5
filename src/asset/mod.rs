//! # 资产模块（asset）
//!
//! ## 设计思路
//!
//! 承载导入链路中与“字节”相关的一切：数据模型、格式判定、去重存储。
//!
//! - `error`：`AssetError`
//! - `source`：`RawAsset` / `NormalizedAsset` / `StoredAssetPath`
//! - `format`：签名嗅探、尺寸读取、WebP 转码
//! - `store`：`AssetStore`，内容哈希命名 + 序号探测

mod error;
pub mod format;
mod source;
mod store;

pub use error::AssetError;
pub use format::ImageInspection;
pub use source::{NormalizedAsset, RawAsset, StoredAssetPath};
pub use store::{AssetStore, ContentHasher, InlineHasher, DEFAULT_MAX_PROBE_ATTEMPTS};
