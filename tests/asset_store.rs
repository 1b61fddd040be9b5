//! 去重存储在真实文件系统上的行为：幂等、碰撞安全、探测上限。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use smart_drop::asset::{AssetError, AssetStore, ContentHasher, InlineHasher};
use smart_drop::dispatcher::{DispatcherConfig, TaskDispatcher};
use smart_drop::storage::{FsVault, Vault};

/// 统计写入次数的库包装。
struct CountingVault {
    inner: FsVault,
    writes: AtomicUsize,
}

#[async_trait]
impl Vault for CountingVault {
    async fn exists(&self, path: &str) -> Result<bool, AssetError> {
        self.inner.exists(path).await
    }

    async fn read_binary(&self, path: &str) -> Result<Bytes, AssetError> {
        self.inner.read_binary(path).await
    }

    async fn write_binary(&self, path: &str, bytes: &Bytes) -> Result<(), AssetError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write_binary(path, bytes).await
    }

    async fn create_folder(&self, path: &str) -> Result<(), AssetError> {
        self.inner.create_folder(path).await
    }
}

/// 所有内容都映射为同一哈希。
struct CollidingHasher;

#[async_trait]
impl ContentHasher for CollidingHasher {
    async fn digest(&self, _bytes: &Bytes) -> Result<String, AssetError> {
        Ok("0123456789abcdef0123456789abcdef".to_string())
    }
}

fn counting_vault(root: &std::path::Path) -> Arc<CountingVault> {
    Arc::new(CountingVault {
        inner: FsVault::new(root),
        writes: AtomicUsize::new(0),
    })
}

#[tokio::test]
async fn identical_bytes_converge_to_one_file() {
    let dir = tempfile::tempdir().expect("create temp dir failed");
    let vault = counting_vault(dir.path());
    let dispatcher = Arc::new(TaskDispatcher::new(DispatcherConfig::default()).expect("dispatcher init failed"));
    let store = AssetStore::new(vault.clone(), dispatcher);
    let data = Bytes::from_static(b"GIF89a-identical");

    let first = store
        .write_deduplicated(&data, None, "attachments/img")
        .await
        .expect("first write failed");
    let second = store
        .write_deduplicated(&data, None, "attachments/img")
        .await
        .expect("second write failed");

    assert_eq!(first, second);
    assert_eq!(first.name, format!("{}.gif", smart_drop::util::content_hash(&data)));
    assert_eq!(vault.writes.load(Ordering::SeqCst), 1);
    assert!(dir.path().join("attachments/img").join(&first.name).is_file());
}

#[tokio::test]
async fn forced_collisions_never_overwrite() {
    let dir = tempfile::tempdir().expect("create temp dir failed");
    let vault = counting_vault(dir.path());
    let store = AssetStore::new(vault.clone(), Arc::new(CollidingHasher));

    let first_bytes = Bytes::from_static(b"first content");
    let second_bytes = Bytes::from_static(b"second content");

    let first = store
        .write_deduplicated(&first_bytes, Some("png"), "a")
        .await
        .expect("first write failed");
    let second = store
        .write_deduplicated(&second_bytes, Some("png"), "a")
        .await
        .expect("second write failed");

    assert_ne!(first, second);
    assert_eq!(second.name, "0123456789abcdef0123456789abcdef_1.png");
    assert_eq!(
        vault.read_binary(&first.path()).await.expect("read first failed"),
        first_bytes
    );
    assert_eq!(
        vault.read_binary(&second.path()).await.expect("read second failed"),
        second_bytes
    );

    // 再次写入第二份内容命中序号 1，不产生新文件
    let again = store
        .write_deduplicated(&second_bytes, Some("png"), "a")
        .await
        .expect("third write failed");
    assert_eq!(again, second);
    assert_eq!(vault.writes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn probe_bound_is_configurable() {
    let dir = tempfile::tempdir().expect("create temp dir failed");
    let vault = counting_vault(dir.path());
    let store = AssetStore::new(vault.clone(), Arc::new(CollidingHasher)).with_max_probe_attempts(3);

    for i in 0..3u8 {
        store
            .write_deduplicated(&Bytes::from(vec![i; 4]), Some("png"), "/")
            .await
            .expect("write within bound failed");
    }

    let result = store
        .write_deduplicated(&Bytes::from_static(b"overflow"), Some("png"), "/")
        .await;
    assert!(matches!(result, Err(AssetError::StoreExhausted { attempts: 3, .. })));
    assert_eq!(vault.writes.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn inline_and_dispatched_hashes_agree() {
    let dispatcher = TaskDispatcher::new(DispatcherConfig::default()).expect("dispatcher init failed");
    let data = Bytes::from_static(b"same digest either way");

    let inline = InlineHasher.digest(&data).await.expect("inline digest failed");
    let dispatched = dispatcher.digest(&data).await.expect("dispatched digest failed");

    assert_eq!(inline, dispatched);
}
