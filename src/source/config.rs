//! # 来源解析配置
//!
//! ## 设计思路
//!
//! 下载与读取相关的“可调策略”集中在 `SourceConfig`，
//! `Default` 即生产可用配置，测试可按需收紧。

use crate::asset::AssetError;

/// 下载使用的浏览器 UA，部分图床会拒绝非浏览器请求。
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_10_3) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/89.0.4389.82 Safari/537.36";

/// 来源解析配置。
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// 下载/读取/解码时允许的最大体积（字节）。
    pub max_file_size: u64,
    /// 网络下载超时时间（秒）。
    pub download_timeout: u64,
    /// 建立连接超时时间（秒）。
    pub connect_timeout: u64,
    /// 下载首包超时时间（毫秒）。
    pub stream_first_byte_timeout_ms: u64,
    /// 下载分块读取超时时间（毫秒）。
    pub stream_chunk_timeout_ms: u64,
    /// 最大重定向次数。
    pub max_redirects: usize,
    /// HTTP 状态码可重试时的最大尝试次数。
    pub retry_attempts: u8,
    pub user_agent: String,
    /// 下载缓存条目上限，0 表示关闭缓存。
    pub download_cache_entries: usize,
    /// 下载缓存有效期（秒）。
    pub download_cache_ttl_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            download_timeout: 30,
            connect_timeout: 8,
            stream_first_byte_timeout_ms: 10_000,
            stream_chunk_timeout_ms: 15_000,
            max_redirects: 5,
            retry_attempts: 3,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            download_cache_entries: 24,
            download_cache_ttl_secs: 25,
        }
    }
}

impl SourceConfig {
    /// 以 MB 为单位设置体积上限（1..=500）。
    pub fn with_max_file_size_mb(mut self, mb: u64) -> Result<Self, AssetError> {
        if !(1..=500).contains(&mb) {
            return Err(AssetError::InvalidFormat(format!(
                "体积上限需在 1-500 MB 之间：{}",
                mb
            )));
        }
        self.max_file_size = mb * 1024 * 1024;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), AssetError> {
        if self.max_file_size == 0 {
            return Err(AssetError::InvalidFormat("体积上限不能为 0".to_string()));
        }
        if self.download_timeout == 0 || self.connect_timeout == 0 {
            return Err(AssetError::InvalidFormat("网络超时不能为 0".to_string()));
        }
        if self.retry_attempts == 0 {
            return Err(AssetError::InvalidFormat("重试次数至少为 1".to_string()));
        }
        if self.user_agent.trim().is_empty() {
            return Err(AssetError::InvalidFormat("User-Agent 不能为空".to_string()));
        }
        Ok(())
    }
}
