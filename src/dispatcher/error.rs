//! # 调度错误模型
//!
//! 任务调度链路的所有失败来源集中在 `DispatchError`，
//! 由上层（资产存储 / 导入流水线）按分支处理或上转为 `AppError`。

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("任务超时：#{id}（{kind}）在 {after_ms}ms 内无响应")]
    Timeout {
        id: u64,
        kind: String,
        after_ms: u128,
    },

    #[error("执行上下文已关闭：任务 #{id} 被放弃")]
    ContextClosed { id: u64 },

    #[error("执行上下文不可用：{0}")]
    ContextUnavailable(String),

    #[error("任务执行失败：#{id} {message}")]
    TaskFailed { id: u64, message: String },

    #[error("任务返回类型不符：期望 {expected}")]
    UnexpectedOutput { expected: &'static str },

    #[error("调度配置无效：{0}")]
    InvalidConfig(String),

    #[error("调度状态锁已中毒")]
    LockPoisoned,
}
