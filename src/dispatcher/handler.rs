//! # 调度器核心
//!
//! ## 设计思路
//!
//! `TaskDispatcher` 是显式构造、由调用方持有的实例（不存在进程级单例）：
//! 1. 为每次提交分配严格递增的关联 id（从保留哨兵之后开始，生命周期内不复用）
//! 2. 在待决表中登记 `id → oneshot::Sender`
//! 3. 轮询选择执行上下文投递任务
//! 4. 路由线程按 id 而非到达顺序分发回复
//!
//! ## 实现思路
//!
//! - 待决表由调度器独占，使用 `Arc<Mutex<HashMap>>` 与路由线程共享。
//! - 超时到期或投递失败时立即移除待决项，防止泄漏。
//! - 所有执行上下文销毁后路由线程退出并清空待决表，
//!   等待中的调用方收到 `ContextClosed` 而不是永久挂起。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::oneshot;

use super::context::{ExecutionContext, ReplySender, WorkerThread};
use super::task::{TaskEnvelope, TaskOutput, TaskRegistry, TaskReply, TaskRequest};
use super::{DispatchError, DispatcherConfig};
use crate::asset::format::ImageInspection;

/// 保留的哨兵 id，真实任务 id 均大于它。
pub const RESERVED_TASK_ID: u64 = 1;

type Waiter = oneshot::Sender<Result<TaskOutput, String>>;

/// 待决表：`closed` 置位后不再接受新登记。
#[derive(Default)]
struct PendingState {
    waiters: HashMap<u64, Waiter>,
    closed: bool,
}

type PendingMap = Arc<Mutex<PendingState>>;

/// 任务调度器。
pub struct TaskDispatcher {
    config: DispatcherConfig,
    contexts: Vec<Box<dyn ExecutionContext>>,
    next_context: AtomicUsize,
    next_id: AtomicU64,
    pending: PendingMap,
}

impl TaskDispatcher {
    /// 按配置启动 worker 线程池。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use smart_drop::dispatcher::{DispatcherConfig, TaskDispatcher};
    ///
    /// # async fn demo() -> Result<(), smart_drop::dispatcher::DispatchError> {
    /// let dispatcher = TaskDispatcher::new(DispatcherConfig::default())?;
    /// let digest = dispatcher.content_hash(bytes::Bytes::from_static(b"hello")).await?;
    /// assert_eq!(digest.len(), 32);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: DispatcherConfig) -> Result<Self, DispatchError> {
        let registry = TaskRegistry::new(&config.task_kinds);
        Self::with_contexts(config, |index, replies| {
            let worker = WorkerThread::spawn(
                format!("smart-drop-worker-{}", index),
                registry.clone(),
                replies,
            )?;
            Ok(Box::new(worker) as Box<dyn ExecutionContext>)
        })
    }

    /// 使用自定义执行上下文构建调度器。
    ///
    /// `factory` 会被调用 `pool_size` 次，每次拿到一个回复通道发送端。
    pub fn with_contexts<F>(config: DispatcherConfig, mut factory: F) -> Result<Self, DispatchError>
    where
        F: FnMut(usize, ReplySender) -> Result<Box<dyn ExecutionContext>, DispatchError>,
    {
        config.validate()?;

        let (reply_tx, reply_rx) = mpsc::channel::<TaskReply>();
        let mut contexts = Vec::with_capacity(config.pool_size);
        for index in 0..config.pool_size {
            contexts.push(factory(index, reply_tx.clone())?);
        }
        // 路由线程的生命周期只由执行上下文持有的发送端决定
        drop(reply_tx);

        let pending: PendingMap = Arc::new(Mutex::new(PendingState::default()));
        let router_pending = Arc::clone(&pending);
        thread::Builder::new()
            .name("smart-drop-dispatch-router".to_string())
            .spawn(move || route_replies(reply_rx, router_pending))
            .map_err(|e| DispatchError::ContextUnavailable(format!("无法启动路由线程：{}", e)))?;

        log::info!(
            "⚙️ 任务调度器已就绪 - contexts={} timeout={:?} kinds={:?}",
            contexts.len(),
            config.task_timeout,
            config.task_kinds
        );

        Ok(Self {
            config,
            contexts,
            next_context: AtomicUsize::new(0),
            next_id: AtomicU64::new(RESERVED_TASK_ID + 1),
            pending,
        })
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// 当前仍在等待回复的任务数。
    pub fn pending_count(&self) -> usize {
        self.lock_pending()
            .map(|pending| pending.waiters.len())
            .unwrap_or(0)
    }

    /// 提交任务并等待结果。
    ///
    /// 结果只会被交付一次；超时、上下文关闭或任务失败均以错误返回。
    pub async fn submit(&self, request: TaskRequest) -> Result<TaskOutput, DispatchError> {
        let kind = request.kind();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.lock_pending()?;
            if pending.closed {
                return Err(DispatchError::ContextClosed { id });
            }
            pending.waiters.insert(id, tx);
        }

        let context = self.pick_context();
        if let Err(err) = context.post(TaskEnvelope { id, request }) {
            self.forget(id);
            return Err(err);
        }
        log::debug!("📤 任务 #{} ({}) 已投递到 {}", id, kind.tag(), context.name());

        let started = Instant::now();
        let received = match self.config.task_timeout {
            Some(deadline) => match tokio::time::timeout(deadline, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.forget(id);
                    log::warn!(
                        "⏱️ 任务 #{} ({}) 超时 - {}ms",
                        id,
                        kind.tag(),
                        deadline.as_millis()
                    );
                    return Err(DispatchError::Timeout {
                        id,
                        kind: kind.tag(),
                        after_ms: deadline.as_millis(),
                    });
                }
            },
            None => rx.await,
        };

        match received {
            Ok(Ok(output)) => {
                log::debug!(
                    "📥 任务 #{} ({}) 完成 - {}ms",
                    id,
                    kind.tag(),
                    started.elapsed().as_millis()
                );
                Ok(output)
            }
            Ok(Err(message)) => Err(DispatchError::TaskFailed { id, message }),
            Err(_) => Err(DispatchError::ContextClosed { id }),
        }
    }

    /// 在执行上下文中计算内容哈希。
    pub async fn content_hash(&self, bytes: Bytes) -> Result<String, DispatchError> {
        self.submit(TaskRequest::ContentHash(bytes)).await?.into_digest()
    }

    /// 在执行上下文中嗅探格式与尺寸。
    pub async fn inspect_image(&self, bytes: Bytes) -> Result<ImageInspection, DispatchError> {
        self.submit(TaskRequest::InspectImage(bytes))
            .await?
            .into_inspection()
    }

    /// 在执行上下文中转码为 WebP。
    pub async fn transcode_webp(&self, bytes: Bytes) -> Result<Bytes, DispatchError> {
        self.submit(TaskRequest::TranscodeWebp(bytes))
            .await?
            .into_encoded()
    }

    fn pick_context(&self) -> &dyn ExecutionContext {
        let index = self.next_context.fetch_add(1, Ordering::Relaxed) % self.contexts.len();
        self.contexts[index].as_ref()
    }

    fn forget(&self, id: u64) {
        if let Ok(mut pending) = self.lock_pending() {
            pending.waiters.remove(&id);
        }
    }

    fn lock_pending(&self) -> Result<MutexGuard<'_, PendingState>, DispatchError> {
        self.pending.lock().map_err(|_| DispatchError::LockPoisoned)
    }
}

/// 路由线程：按 id 将回复交付给对应的等待方。
fn route_replies(replies: mpsc::Receiver<TaskReply>, pending: PendingMap) {
    for TaskReply { id, outcome } in replies.iter() {
        let waiter = match pending.lock() {
            Ok(mut guard) => guard.waiters.remove(&id),
            Err(poisoned) => poisoned.into_inner().waiters.remove(&id),
        };

        match waiter {
            Some(tx) => {
                // 等待方可能已放弃（future 被丢弃）
                let _ = tx.send(outcome);
            }
            None => log::warn!("⚠️ 收到未知或已过期任务的回复：#{}", id),
        }
    }

    let mut guard = match pending.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard.closed = true;
    let abandoned = guard.waiters.drain().count();
    drop(guard);

    if abandoned > 0 {
        log::warn!("🧹 执行上下文全部关闭，放弃 {} 个待决任务", abandoned);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::TaskKind;
    use std::time::Duration;

    /// 只收件不回复的上下文，用于模拟无响应。
    struct SilentContext {
        _replies: ReplySender,
    }

    impl ExecutionContext for SilentContext {
        fn name(&self) -> &str {
            "silent"
        }

        fn post(&self, _envelope: TaskEnvelope) -> Result<(), DispatchError> {
            Ok(())
        }
    }

    struct ClosedContext;

    impl ExecutionContext for ClosedContext {
        fn name(&self) -> &str {
            "closed"
        }

        fn post(&self, _envelope: TaskEnvelope) -> Result<(), DispatchError> {
            Err(DispatchError::ContextUnavailable("closed".to_string()))
        }
    }

    #[tokio::test]
    async fn worker_pool_hashes_content() {
        let dispatcher = TaskDispatcher::new(DispatcherConfig::default()).expect("dispatcher init failed");

        let digest = dispatcher
            .content_hash(Bytes::from_static(b"hello"))
            .await
            .expect("hash should succeed");

        assert_eq!(digest, "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn timeout_rejects_and_clears_pending_entry() {
        let config = DispatcherConfig::default()
            .with_pool_size(1)
            .with_timeout_ms(50);
        let dispatcher = TaskDispatcher::with_contexts(config, |_, replies| {
            Ok(Box::new(SilentContext { _replies: replies }) as Box<dyn ExecutionContext>)
        })
        .expect("dispatcher init failed");

        let result = dispatcher
            .submit(TaskRequest::ContentHash(Bytes::from_static(b"x")))
            .await;

        assert!(matches!(result, Err(DispatchError::Timeout { after_ms: 50, .. })));
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn post_failure_clears_pending_entry() {
        let config = DispatcherConfig::default().with_pool_size(1);
        let dispatcher = TaskDispatcher::with_contexts(config, |_, _| {
            Ok(Box::new(ClosedContext) as Box<dyn ExecutionContext>)
        })
        .expect("dispatcher init failed");

        let result = dispatcher
            .submit(TaskRequest::ContentHash(Bytes::from_static(b"x")))
            .await;

        assert!(matches!(result, Err(DispatchError::ContextUnavailable(_))));
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn context_teardown_rejects_waiters() {
        // 上下文不持有回复发送端：路由线程立即退出，待决项被放弃
        let config = DispatcherConfig::default().with_pool_size(1).with_timeout_ms(0);
        let dispatcher = TaskDispatcher::with_contexts(config, |_, _replies| {
            Ok(Box::new(SilentContextWithoutReplies) as Box<dyn ExecutionContext>)
        })
        .expect("dispatcher init failed");

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            dispatcher.submit(TaskRequest::ContentHash(Bytes::from_static(b"x"))),
        )
        .await
        .expect("waiter must not hang");

        assert!(matches!(result, Err(DispatchError::ContextClosed { .. })));
    }

    struct SilentContextWithoutReplies;

    impl ExecutionContext for SilentContextWithoutReplies {
        fn name(&self) -> &str {
            "orphan"
        }

        fn post(&self, _envelope: TaskEnvelope) -> Result<(), DispatchError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn unsupported_kind_fails_explicitly() {
        let mut config = DispatcherConfig::default();
        config.task_kinds = vec![TaskKind::ContentHash];
        let dispatcher = TaskDispatcher::new(config).expect("dispatcher init failed");

        let result = dispatcher.inspect_image(Bytes::from_static(b"abc")).await;

        assert!(matches!(result, Err(DispatchError::TaskFailed { .. })));
    }

    #[tokio::test]
    async fn ids_are_strictly_increasing_above_sentinel() {
        let config = DispatcherConfig::default().with_pool_size(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_ctx = Arc::clone(&seen);

        struct RecordingContext {
            seen: Arc<Mutex<Vec<u64>>>,
            replies: ReplySender,
        }

        impl ExecutionContext for RecordingContext {
            fn name(&self) -> &str {
                "recording"
            }

            fn post(&self, envelope: TaskEnvelope) -> Result<(), DispatchError> {
                self.seen
                    .lock()
                    .map_err(|_| DispatchError::LockPoisoned)?
                    .push(envelope.id);
                self.replies
                    .send(TaskReply {
                        id: envelope.id,
                        outcome: Ok(TaskOutput::Digest(envelope.id.to_string())),
                    })
                    .map_err(|_| DispatchError::ContextUnavailable("router gone".to_string()))
            }
        }

        let dispatcher = TaskDispatcher::with_contexts(config, move |_, replies| {
            Ok(Box::new(RecordingContext {
                seen: Arc::clone(&seen_in_ctx),
                replies,
            }) as Box<dyn ExecutionContext>)
        })
        .expect("dispatcher init failed");

        for _ in 0..5 {
            dispatcher
                .content_hash(Bytes::from_static(b"x"))
                .await
                .expect("task should succeed");
        }

        let ids = seen.lock().expect("lock").clone();
        assert_eq!(ids.first().copied(), Some(RESERVED_TASK_ID + 1));
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
