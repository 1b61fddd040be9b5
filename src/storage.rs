//! 库存储模块
//!
//! # 设计思路
//!
//! 资产最终只是“某个文件夹下的一个具名二进制文件”，存储面因此收敛为
//! `Vault` trait 的四个操作：存在性检查、读、写、建目录。
//! 去重存储只依赖这个 trait，方便替换为宿主提供的存储或测试替身。
//!
//! # 实现思路
//!
//! - `FsVault`：以某个根目录为库，使用 `tokio::fs` 读写。
//! - 库内路径统一 `/` 分隔，拒绝 `..` 与绝对路径，防止写出库外。
//! - `create_folder` 幂等：目录已存在不算错误。
//! - `MemoryVault`：进程内实现，供 CLI 演练模式与测试使用。
//! - 所有可能失败的操作均返回 `Result`，不使用 `expect()` / `unwrap()`。

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;

use crate::asset::AssetError;
use crate::util;

/// 存储面：按库内路径读写二进制文件。
#[async_trait]
pub trait Vault: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool, AssetError>;

    async fn read_binary(&self, path: &str) -> Result<Bytes, AssetError>;

    /// 写入（覆盖）文件，父目录需已存在。
    async fn write_binary(&self, path: &str, bytes: &Bytes) -> Result<(), AssetError>;

    /// 创建目录（含父目录），已存在时视为成功。
    async fn create_folder(&self, path: &str) -> Result<(), AssetError>;
}

/// 基于本地文件系统的库。
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 将库内路径解析为磁盘路径。
    pub fn resolve(&self, vault_path: &str) -> Result<PathBuf, AssetError> {
        let normalized = util::normalize_path(vault_path);
        let relative = Path::new(normalized.trim_start_matches('/'));

        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(AssetError::FileSystem(format!(
                        "库内路径不允许越界：{}",
                        vault_path
                    )));
                }
            }
        }
        Ok(resolved)
    }
}

#[async_trait]
impl Vault for FsVault {
    async fn exists(&self, path: &str) -> Result<bool, AssetError> {
        let resolved = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&resolved).await?)
    }

    async fn read_binary(&self, path: &str) -> Result<Bytes, AssetError> {
        let resolved = self.resolve(path)?;
        let data = tokio::fs::read(&resolved).await.map_err(|e| {
            AssetError::FileSystem(format!("读取 '{}' 失败：{}", resolved.display(), e))
        })?;
        Ok(Bytes::from(data))
    }

    async fn write_binary(&self, path: &str, bytes: &Bytes) -> Result<(), AssetError> {
        let resolved = self.resolve(path)?;
        tokio::fs::write(&resolved, bytes).await.map_err(|e| {
            AssetError::FileSystem(format!("写入 '{}' 失败：{}", resolved.display(), e))
        })?;
        log::debug!("💾 已写入 {}（{} bytes）", resolved.display(), bytes.len());
        Ok(())
    }

    async fn create_folder(&self, path: &str) -> Result<(), AssetError> {
        let resolved = self.resolve(path)?;
        match tokio::fs::create_dir_all(&resolved).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(AssetError::FileSystem(format!(
                "创建目录 '{}' 失败：{}",
                resolved.display(),
                e
            ))),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    files: HashMap<String, Bytes>,
    folders: HashSet<String>,
}

/// 进程内库，记录写入次数。
#[derive(Debug, Default)]
pub struct MemoryVault {
    state: Mutex<MemoryState>,
    writes: AtomicUsize,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置文件（不计入写入次数）。
    pub fn insert(&self, path: &str, bytes: impl Into<Bytes>) -> Result<(), AssetError> {
        self.lock()?.files.insert(key(path), bytes.into());
        Ok(())
    }

    /// 成功执行 `write_binary` 的次数。
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// 当前所有文件路径（排序后）。
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .lock()
            .map(|state| state.files.keys().cloned().collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }

    pub fn has_folder(&self, path: &str) -> bool {
        self.lock()
            .map(|state| state.folders.contains(&key(path)))
            .unwrap_or(false)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, AssetError> {
        self.state
            .lock()
            .map_err(|_| AssetError::FileSystem("内存库锁已中毒".to_string()))
    }
}

fn key(path: &str) -> String {
    util::normalize_path(path).trim_matches('/').to_string()
}

#[async_trait]
impl Vault for MemoryVault {
    async fn exists(&self, path: &str) -> Result<bool, AssetError> {
        let state = self.lock()?;
        let key = key(path);
        Ok(state.files.contains_key(&key) || state.folders.contains(&key))
    }

    async fn read_binary(&self, path: &str) -> Result<Bytes, AssetError> {
        self.lock()?
            .files
            .get(&key(path))
            .cloned()
            .ok_or_else(|| AssetError::FileSystem(format!("文件不存在：{}", path)))
    }

    async fn write_binary(&self, path: &str, bytes: &Bytes) -> Result<(), AssetError> {
        self.lock()?.files.insert(key(path), bytes.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_folder(&self, path: &str) -> Result<(), AssetError> {
        self.lock()?.folders.insert(key(path));
        Ok(())
    }
}
