//! # smart-drop — 库入口
//!
//! 将粘贴/拖放到笔记中的图片（远程 URL、data URI、本地文件 URI、拖放文件）
//! 转换为库内按内容去重的本地资产，并改写文档中的引用。
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │        宿主（编辑器事件 / CLI）                            │
//! │    DataTransfer ── Editor ── PluginSettings              │
//! └───────┼──────────────────────────────────────────────────┘
//!         ↓
//! ┌───────┼──────────────────────────────────────────────────┐
//! │  ingest ──── IngestPipeline                               │
//! │    │                                                     │
//! │    ├─ source ──── classify → http / data / file           │
//! │    ├─ dispatcher ─ worker 线程：hash / inspect / webp     │
//! │    ├─ asset ───── 格式判定 + 去重存储（序号探测）          │
//! │    ├─ storage ─── Vault（FsVault / MemoryVault）          │
//! │    └─ rewrite ─── 行内 / wiki 两种方言 + 宽度标注          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` |
//! | [`settings`] | 附件目录策略、链接格式、流水线选项，JSON 读写 |
//! | [`storage`] | `Vault` 存储面与文件系统实现 |
//! | [`util`] | 内容哈希、扩展名拆分、路径与链接目标处理 |
//! | [`dispatcher`] | 执行上下文池、关联 id、任务注册表、超时 |
//! | [`asset`] | 资产数据模型、格式嗅探/转码、去重存储 |
//! | [`source`] | 来源分类、data/file URI、HTTP 下载 |
//! | [`rewrite`] | 文档引用扫描与改写 |
//! | [`ingest`] | 编辑器面、HTML 转换、导入流水线 |

pub mod asset;
pub mod dispatcher;
pub mod error;
pub mod ingest;
pub mod rewrite;
pub mod settings;
pub mod source;
pub mod storage;
pub mod util;
