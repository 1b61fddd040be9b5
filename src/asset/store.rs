//! # 去重存储（Asset Store）
//!
//! ## 设计思路
//!
//! 以内容哈希作为文件名，相同内容只落盘一次；
//! 不同内容哈希撞名时按序号探测 `hash_1`、`hash_2`……，上限可配置（默认 100）。
//!
//! ## 实现思路
//!
//! ```text
//! resolve_format(bytes, hint)  → 扩展名
//! ContentHasher::digest(bytes) → hash
//! for ordinal in 0..max_probe_attempts:
//!     name 不存在        → 建目录 + 写入 → 返回
//!     name 存在且内容相同 → 直接返回（不重写）
//!     否则               → 下一个序号
//! 探测耗尽 → StoreExhausted
//! ```
//!
//! 目录读后写不加锁（单进程假设）。

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::format;
use super::{AssetError, StoredAssetPath};
use crate::dispatcher::TaskDispatcher;
use crate::storage::Vault;
use crate::util;

/// 默认探测上限。
pub const DEFAULT_MAX_PROBE_ATTEMPTS: u32 = 100;

/// 内容哈希计算面。
#[async_trait]
pub trait ContentHasher: Send + Sync {
    async fn digest(&self, bytes: &Bytes) -> Result<String, AssetError>;
}

/// 经由调度器在执行上下文中计算哈希。
#[async_trait]
impl ContentHasher for TaskDispatcher {
    async fn digest(&self, bytes: &Bytes) -> Result<String, AssetError> {
        Ok(self.content_hash(bytes.clone()).await?)
    }
}

/// 在调用方线程直接计算哈希。
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineHasher;

#[async_trait]
impl ContentHasher for InlineHasher {
    async fn digest(&self, bytes: &Bytes) -> Result<String, AssetError> {
        Ok(util::content_hash(bytes))
    }
}

/// 去重存储。
#[derive(Clone)]
pub struct AssetStore {
    vault: Arc<dyn Vault>,
    hasher: Arc<dyn ContentHasher>,
    max_probe_attempts: u32,
}

impl AssetStore {
    pub fn new(vault: Arc<dyn Vault>, hasher: Arc<dyn ContentHasher>) -> Self {
        Self {
            vault,
            hasher,
            max_probe_attempts: DEFAULT_MAX_PROBE_ATTEMPTS,
        }
    }

    /// 设置探测上限（至少 1 次）。
    pub fn with_max_probe_attempts(mut self, attempts: u32) -> Self {
        self.max_probe_attempts = attempts.max(1);
        self
    }

    pub fn max_probe_attempts(&self) -> u32 {
        self.max_probe_attempts
    }

    pub fn vault(&self) -> &Arc<dyn Vault> {
        &self.vault
    }

    /// 写入资产，内容相同则复用已有文件。
    ///
    /// 同一字节序列、同一目录下重复调用总是返回同一路径，且只写入一次。
    pub async fn write_deduplicated(
        &self,
        bytes: &Bytes,
        format_hint: Option<&str>,
        folder: &str,
    ) -> Result<StoredAssetPath, AssetError> {
        let extension = format::resolve_format(bytes, format_hint);
        let hash = self.hasher.digest(bytes).await?;

        for ordinal in 0..self.max_probe_attempts {
            let name = if ordinal == 0 {
                format!("{}.{}", hash, extension)
            } else {
                format!("{}_{}.{}", hash, ordinal, extension)
            };
            let candidate = StoredAssetPath {
                folder: folder.to_string(),
                name,
            };
            let path = candidate.path();

            if !self.vault.exists(&path).await? {
                self.vault.create_folder(folder).await?;
                self.vault.write_binary(&path, bytes).await?;
                log::info!("💾 资产已保存：{}（{} bytes）", path, bytes.len());
                return Ok(candidate);
            }

            // 哈希相同再逐字节确认，哈希碰撞时也不会误认为同一内容
            let existing = self.vault.read_binary(&path).await?;
            if self.hasher.digest(&existing).await? == hash && existing == *bytes {
                log::debug!("♻️ 复用已存在的资产：{}", path);
                return Ok(candidate);
            }

            log::debug!("🔀 命名冲突，继续探测：{}", path);
        }

        log::warn!(
            "⚠️ 探测 {} 次后仍无法存储资产（{}）",
            self.max_probe_attempts,
            hash
        );
        Err(AssetError::StoreExhausted {
            hash,
            attempts: self.max_probe_attempts,
        })
    }
}
