//! # 执行上下文
//!
//! ## 设计思路
//!
//! 执行上下文是只能通过消息到达的独立计算单元：请求信封以所有权转移的方式
//! 进入上下文，结果通过回复通道送回调度器，两侧不共享可变状态。
//!
//! ## 实现思路
//!
//! - `ExecutionContext` trait 只暴露 `post`，调度器不关心上下文如何执行。
//! - `WorkerThread` 为默认实现：每个上下文独占一个系统线程与一个收件箱。
//! - 任务 panic 会被捕获并作为失败回复，避免调用方永久挂起。
//! - 收件箱发送端被丢弃后线程自然退出，随之释放回复通道。

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;

use super::task::{TaskEnvelope, TaskRegistry, TaskReply};
use super::DispatchError;

/// 执行上下文向调度器回传结果的通道。
pub type ReplySender = mpsc::Sender<TaskReply>;

/// 隔离的执行上下文。
pub trait ExecutionContext: Send + Sync {
    /// 上下文名称（用于日志）。
    fn name(&self) -> &str;

    /// 投递一个任务，不等待结果。
    fn post(&self, envelope: TaskEnvelope) -> Result<(), DispatchError>;
}

/// 基于系统线程的执行上下文。
pub struct WorkerThread {
    name: String,
    inbox: mpsc::Sender<TaskEnvelope>,
}

impl WorkerThread {
    /// 启动 worker 线程，并以给定的任务种类集合初始化其注册表。
    pub fn spawn(
        name: impl Into<String>,
        registry: TaskRegistry,
        replies: ReplySender,
    ) -> Result<Self, DispatchError> {
        let name = name.into();
        let (inbox, inbox_rx) = mpsc::channel::<TaskEnvelope>();

        thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_worker(registry, inbox_rx, replies))
            .map_err(|e| {
                DispatchError::ContextUnavailable(format!("无法启动 worker 线程：{}", e))
            })?;

        log::debug!("🧵 执行上下文已启动：{}", name);
        Ok(Self { name, inbox })
    }
}

impl ExecutionContext for WorkerThread {
    fn name(&self) -> &str {
        &self.name
    }

    fn post(&self, envelope: TaskEnvelope) -> Result<(), DispatchError> {
        self.inbox.send(envelope).map_err(|_| {
            DispatchError::ContextUnavailable(format!("{} 的收件箱已关闭", self.name))
        })
    }
}

fn run_worker(
    registry: TaskRegistry,
    inbox: mpsc::Receiver<TaskEnvelope>,
    replies: ReplySender,
) {
    for TaskEnvelope { id, request } in inbox.iter() {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| registry.execute(request)))
            .unwrap_or_else(|_| Err("任务执行过程中发生 panic".to_string()));

        if replies.send(TaskReply { id, outcome }).is_err() {
            // 调度器已销毁，无人接收
            break;
        }
    }
}
