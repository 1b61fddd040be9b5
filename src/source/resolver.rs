//! 来源解析：引用字符串 → `RawAsset`。

use std::sync::Arc;

use bytes::Bytes;

use super::{classify, data_uri, file_uri, Fetcher, HttpFetcher, SourceConfig, SourceKind};
use crate::asset::{AssetError, RawAsset};
use crate::util;

/// 来源解析器。
#[derive(Clone)]
pub struct SourceResolver {
    config: SourceConfig,
    fetcher: Arc<dyn Fetcher>,
}

impl SourceResolver {
    pub fn new(config: SourceConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { config, fetcher }
    }

    /// 使用 `HttpFetcher` 作为网络面。
    pub fn with_http(config: SourceConfig) -> Result<Self, AssetError> {
        let fetcher = HttpFetcher::new(config.clone())?;
        Ok(Self::new(config, Arc::new(fetcher)))
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// 解析引用并产出原始字节与格式提示。
    ///
    /// 已是本地引用或协议不受支持时返回 `UnsupportedSource`，调用方跳过即可。
    pub async fn resolve(&self, reference: &str) -> Result<RawAsset, AssetError> {
        let kind = classify(reference);
        log::debug!("🧭 解析引用 - 类别: {}", kind.label());

        let (bytes, format_hint) = match kind {
            SourceKind::Http(url) => {
                let bytes = self.fetcher.fetch(&url).await?;
                (bytes, url_extension_hint(&url))
            }
            SourceKind::Data(uri) => {
                let parsed = data_uri::parse_data_uri(&uri, self.config.max_file_size)?;
                (Bytes::from(parsed.bytes), Some(parsed.format))
            }
            SourceKind::File(uri) => {
                let path = file_uri::file_uri_to_path(&uri)?;
                let bytes = self.read_file(&path).await?;
                (bytes, util::extension_hint(&path.to_string_lossy()))
            }
            SourceKind::Local(path) => {
                return Err(AssetError::UnsupportedSource(format!("已是本地引用：{}", path)));
            }
            SourceKind::Unsupported(scheme) => {
                return Err(AssetError::UnsupportedSource(format!("协议 {}", scheme)));
            }
        };

        if bytes.is_empty() {
            return Err(AssetError::InvalidFormat("来源内容为空".to_string()));
        }

        Ok(RawAsset {
            bytes,
            format_hint,
            source_identifier: reference.to_string(),
        })
    }

    async fn read_file(&self, path: &std::path::Path) -> Result<Bytes, AssetError> {
        log::info!("📁 开始读取本地图片 - 路径: {}", path.display());

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| AssetError::FileSystem(format!("无法读取文件信息：{}", e)))?;

        if !metadata.is_file() {
            return Err(AssetError::FileSystem(format!("不是文件：{}", path.display())));
        }
        if metadata.len() > self.config.max_file_size {
            return Err(AssetError::ResourceLimit(format!(
                "文件过大：{:.2} MB（限制：{:.2} MB）",
                metadata.len() as f64 / 1024.0 / 1024.0,
                self.config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| AssetError::FileSystem(format!("无法读取图片文件：{}", e)))?;
        Ok(Bytes::from(data))
    }
}

/// 只看 URL 路径的最后一段，主机名不会被当成扩展名。
fn url_extension_hint(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last_segment = parsed.path_segments()?.last()?;
    util::split_file_extension(last_segment)
        .extension
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
}
