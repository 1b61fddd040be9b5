//! # 任务调度模块（dispatcher）
//!
//! ## 设计思路
//!
//! 将哈希、格式嗅探、转码等 CPU 计算从调用方流程中卸载到隔离的执行上下文，
//! 并保证并发提交时每个调用方都拿到属于自己的结果。
//!
//! - `config`：池大小、超时、预置任务种类
//! - `error`：`DispatchError`
//! - `task`：任务种类注册表与请求/响应信封
//! - `context`：执行上下文抽象与 worker 线程实现
//! - `handler`：`TaskDispatcher`，负责 id 分配、待决表与回复路由
//!
//! ## 调用链
//!
//! ```text
//! submit(TaskRequest)
//!    ↓ 分配 id，登记待决项
//! ExecutionContext::post(TaskEnvelope)
//!    ↓ worker 线程执行 TaskRegistry::execute
//! ReplySender → 路由线程
//!    ↓ 按 id 取出待决项
//! oneshot 交付结果（或超时 / 上下文关闭）
//! ```

mod config;
mod context;
mod error;
mod handler;
mod task;

pub use config::{DispatcherConfig, DEFAULT_TASK_TIMEOUT_MS};
pub use context::{ExecutionContext, ReplySender, WorkerThread};
pub use error::DispatchError;
pub use handler::{TaskDispatcher, RESERVED_TASK_ID};
pub use task::{TaskEnvelope, TaskKind, TaskOutput, TaskRegistry, TaskReply, TaskRequest};
