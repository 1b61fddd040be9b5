//! # 调度配置
//!
//! 池大小、单任务超时与执行上下文预置的任务种类集中在 `DispatcherConfig`。
//! 超时为 `None` 时等待不设上限（保留原有“无限等待”语义，仅在显式配置时生效）。

use std::time::Duration;

use super::{DispatchError, TaskKind};

/// 默认单任务超时（毫秒）。
pub const DEFAULT_TASK_TIMEOUT_MS: u64 = 5_000;

const MAX_POOL_SIZE: usize = 64;

/// 任务调度器配置。
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// 执行上下文（worker 线程）数量，至少为 1。
    pub pool_size: usize,
    /// 单个任务的等待上限；`None` 表示无限等待。
    pub task_timeout: Option<Duration>,
    /// 执行上下文启动时预置的任务种类。
    pub task_kinds: Vec<TaskKind>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            pool_size: 2,
            task_timeout: Some(Duration::from_millis(DEFAULT_TASK_TIMEOUT_MS)),
            task_kinds: TaskKind::ALL.to_vec(),
        }
    }
}

impl DispatcherConfig {
    /// 按毫秒设置超时，`0` 视为关闭超时。
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.task_timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// 校验配置取值范围。
    pub fn validate(&self) -> Result<(), DispatchError> {
        if !(1..=MAX_POOL_SIZE).contains(&self.pool_size) {
            return Err(DispatchError::InvalidConfig(format!(
                "pool_size 必须在 1~{} 之间，当前：{}",
                MAX_POOL_SIZE, self.pool_size
            )));
        }
        if self.task_kinds.is_empty() {
            return Err(DispatchError::InvalidConfig(
                "task_kinds 不能为空".to_string(),
            ));
        }
        if matches!(self.task_timeout, Some(timeout) if timeout.is_zero()) {
            return Err(DispatchError::InvalidConfig(
                "task_timeout 不能为 0，关闭超时请使用 None".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = DispatcherConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.task_timeout,
            Some(Duration::from_millis(DEFAULT_TASK_TIMEOUT_MS))
        );
    }

    #[test]
    fn rejects_empty_pool_and_zero_timeout() {
        let config = DispatcherConfig::default().with_pool_size(0);
        assert!(matches!(config.validate(), Err(DispatchError::InvalidConfig(_))));

        let mut config = DispatcherConfig::default();
        config.task_timeout = Some(Duration::ZERO);
        assert!(matches!(config.validate(), Err(DispatchError::InvalidConfig(_))));
    }

    #[test]
    fn zero_timeout_ms_disables_deadline() {
        let config = DispatcherConfig::default().with_timeout_ms(0);
        assert_eq!(config.task_timeout, None);
        assert!(config.validate().is_ok());
    }
}
