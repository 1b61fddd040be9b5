//! # 任务注册表
//!
//! ## 设计思路
//!
//! 跨执行上下文边界只传递“任务种类标签 + 数据载荷”，不传递可执行代码。
//! 每个任务种类带稳定名称与版本号（如 `content-hash@1`），
//! 执行上下文在启动时预置自己支持的种类集合。
//!
//! ## 实现思路
//!
//! - `TaskRequest` / `TaskOutput` 为封闭枚举，新增任务种类时编译器会提示所有匹配点。
//! - `TaskRegistry::execute` 是执行上下文内部唯一的分发入口。
//! - 执行失败以字符串形式回传，由调度器包装为 `DispatchError::TaskFailed`。

use std::collections::HashSet;

use bytes::Bytes;

use super::DispatchError;
use crate::asset::format::{self, ImageInspection};
use crate::util;

/// 已注册的任务种类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// 计算内容哈希。
    ContentHash,
    /// 嗅探格式并读取像素尺寸。
    InspectImage,
    /// 转码为 WebP。
    TranscodeWebp,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [
        TaskKind::ContentHash,
        TaskKind::InspectImage,
        TaskKind::TranscodeWebp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::ContentHash => "content-hash",
            Self::InspectImage => "inspect-image",
            Self::TranscodeWebp => "transcode-webp",
        }
    }

    pub fn version(self) -> u32 {
        match self {
            Self::ContentHash | Self::InspectImage | Self::TranscodeWebp => 1,
        }
    }

    /// 稳定标签，形如 `content-hash@1`。
    pub fn tag(self) -> String {
        format!("{}@{}", self.name(), self.version())
    }
}

/// 发往执行上下文的任务载荷。
#[derive(Debug, Clone)]
pub enum TaskRequest {
    ContentHash(Bytes),
    InspectImage(Bytes),
    TranscodeWebp(Bytes),
}

impl TaskRequest {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::ContentHash(_) => TaskKind::ContentHash,
            Self::InspectImage(_) => TaskKind::InspectImage,
            Self::TranscodeWebp(_) => TaskKind::TranscodeWebp,
        }
    }
}

/// 执行上下文返回的结果。
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    Digest(String),
    Inspection(ImageInspection),
    Encoded(Bytes),
}

impl TaskOutput {
    pub fn into_digest(self) -> Result<String, DispatchError> {
        match self {
            Self::Digest(digest) => Ok(digest),
            _ => Err(DispatchError::UnexpectedOutput { expected: "digest" }),
        }
    }

    pub fn into_inspection(self) -> Result<ImageInspection, DispatchError> {
        match self {
            Self::Inspection(inspection) => Ok(inspection),
            _ => Err(DispatchError::UnexpectedOutput {
                expected: "inspection",
            }),
        }
    }

    pub fn into_encoded(self) -> Result<Bytes, DispatchError> {
        match self {
            Self::Encoded(bytes) => Ok(bytes),
            _ => Err(DispatchError::UnexpectedOutput { expected: "encoded" }),
        }
    }
}

/// 请求信封：`(id, 任务)`。
#[derive(Debug)]
pub struct TaskEnvelope {
    pub id: u64,
    pub request: TaskRequest,
}

/// 响应信封：`(id, 结果)`，每个 id 至多一条。
#[derive(Debug)]
pub struct TaskReply {
    pub id: u64,
    pub outcome: Result<TaskOutput, String>,
}

/// 执行上下文内的任务注册表。
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    kinds: HashSet<TaskKind>,
}

impl TaskRegistry {
    pub fn new(kinds: &[TaskKind]) -> Self {
        Self {
            kinds: kinds.iter().copied().collect(),
        }
    }

    pub fn supports(&self, kind: TaskKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// 在当前上下文中执行任务。
    pub fn execute(&self, request: TaskRequest) -> Result<TaskOutput, String> {
        let kind = request.kind();
        if !self.supports(kind) {
            return Err(format!("执行上下文未预置任务种类：{}", kind.tag()));
        }

        match request {
            TaskRequest::ContentHash(bytes) => Ok(TaskOutput::Digest(util::content_hash(&bytes))),
            TaskRequest::InspectImage(bytes) => {
                Ok(TaskOutput::Inspection(format::inspect_image(&bytes)))
            }
            TaskRequest::TranscodeWebp(bytes) => format::transcode_to_webp(&bytes)
                .map(|encoded| TaskOutput::Encoded(Bytes::from(encoded)))
                .map_err(|e| e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_versioned() {
        assert_eq!(TaskKind::ContentHash.tag(), "content-hash@1");
        assert_eq!(TaskKind::TranscodeWebp.tag(), "transcode-webp@1");
    }

    #[test]
    fn registry_executes_hash_task() {
        let registry = TaskRegistry::new(&TaskKind::ALL);
        let output = registry
            .execute(TaskRequest::ContentHash(Bytes::from_static(b"hello")))
            .expect("hash task should succeed");

        assert_eq!(
            output,
            TaskOutput::Digest("5d41402abc4b2a76b9719d911017c592".to_string())
        );
    }

    #[test]
    fn registry_rejects_kind_not_preloaded() {
        let registry = TaskRegistry::new(&[TaskKind::ContentHash]);
        let result = registry.execute(TaskRequest::InspectImage(Bytes::from_static(b"x")));

        assert!(matches!(result, Err(message) if message.contains("inspect-image@1")));
    }

    #[test]
    fn output_accessors_reject_mismatched_kind() {
        let output = TaskOutput::Digest("abc".to_string());
        assert!(matches!(
            output.into_encoded(),
            Err(DispatchError::UnexpectedOutput { expected: "encoded" })
        ));
    }
}
