//! 设置模块
//!
//! # 设计思路
//!
//! 配置面分两层：
//! - `VaultSettings`：宿主（笔记库）自身的附件目录、链接格式、链接方言，
//!   字段名与宿主 `app.json` 保持一致，可直接读取。
//! - `PluginSettings`：导入流水线自身的选项（WebP、显示宽度、调度、探测上限等）。
//!
//! # 实现思路
//!
//! - 所有字段带 `serde(default)`，旧文件缺字段时自动补默认值。
//! - 读取失败的兜底策略由调用方选择：`load` 返回错误，`load_or_default` 记录告警后回退默认。
//! - 校验失败统一返回 `AppError::Settings`。

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::asset::DEFAULT_MAX_PROBE_ATTEMPTS;
use crate::dispatcher::{DispatcherConfig, DEFAULT_TASK_TIMEOUT_MS};
use crate::error::AppError;
use crate::rewrite::LinkDialect;
use crate::source::SourceConfig;
use crate::util;

/// 宿主配置文件相对库根目录的位置。
pub const HOST_APP_CONFIG: &str = ".obsidian/app.json";

/// 附件目录策略。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentFolder {
    /// `/`：库根目录
    VaultRoot,
    /// `./`：与笔记同目录
    NoteFolder,
    /// `./sub`：笔记目录下的子目录
    NoteSubfolder(String),
    /// 其他：库内固定目录
    Fixed(String),
}

impl AttachmentFolder {
    pub fn parse(config: &str) -> Self {
        let config = config.trim();
        match config {
            "" | "/" => Self::VaultRoot,
            "./" | "." => Self::NoteFolder,
            _ => match config.strip_prefix("./") {
                Some(sub) => Self::NoteSubfolder(util::normalize_path(sub).trim_matches('/').to_string()),
                None => Self::Fixed(util::normalize_path(config).trim_matches('/').to_string()),
            },
        }
    }

    /// 计算某篇笔记的附件目录（库根目录返回 `/`）。
    ///
    /// # 示例
    /// ```rust
    /// use smart_drop::settings::AttachmentFolder;
    ///
    /// let policy = AttachmentFolder::parse("./assets");
    /// assert_eq!(policy.resolve("notes/today.md"), "notes/assets");
    /// ```
    pub fn resolve(&self, note_path: &str) -> String {
        let note_path = util::normalize_path(note_path);
        let note_folder = util::parent_folder(note_path.trim_start_matches('/'));

        let folder = match self {
            Self::VaultRoot => String::new(),
            Self::NoteFolder => note_folder.to_string(),
            Self::NoteSubfolder(sub) => util::join_vault_path(note_folder, sub),
            Self::Fixed(folder) => folder.clone(),
        };

        if folder.is_empty() {
            "/".to_string()
        } else {
            folder
        }
    }
}

/// 新链接的路径格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewLinkFormat {
    /// 去掉笔记所在目录前缀
    Relative,
    /// 库内完整路径
    Absolute,
    /// 仅文件名
    #[default]
    Shortest,
}

/// 宿主笔记库设置。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VaultSettings {
    pub attachment_folder_path: String,
    pub new_link_format: NewLinkFormat,
    pub use_markdown_links: bool,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            attachment_folder_path: "/".to_string(),
            new_link_format: NewLinkFormat::Shortest,
            use_markdown_links: false,
        }
    }
}

impl VaultSettings {
    /// 读取库根目录下的宿主配置，缺失时返回默认值。
    pub fn from_vault_root(root: &Path) -> Result<Self, AppError> {
        let path = root.join(HOST_APP_CONFIG);
        if !path.exists() {
            log::debug!("⚙️ 未找到宿主配置 {}，使用默认库设置", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map_err(|e| AppError::Settings(format!("解析宿主配置失败: {}", e)))
    }

    pub fn attachment_folder(&self) -> AttachmentFolder {
        AttachmentFolder::parse(&self.attachment_folder_path)
    }

    pub fn dialect(&self) -> LinkDialect {
        LinkDialect::from_markdown_flag(self.use_markdown_links)
    }

    /// 某篇笔记的附件目录。
    pub fn asset_folder_for(&self, note_path: &str) -> String {
        self.attachment_folder().resolve(note_path)
    }

    /// 按链接格式，生成从笔记指向库内文件的链接文本。
    pub fn link_for(&self, stored_path: &str, note_path: &str) -> String {
        let stored_path = util::normalize_path(stored_path);
        match self.new_link_format {
            NewLinkFormat::Absolute => stored_path,
            NewLinkFormat::Relative => {
                let note_path = util::normalize_path(note_path);
                let note_folder = util::parent_folder(note_path.trim_start_matches('/'));
                if note_folder.is_empty() {
                    return stored_path;
                }
                let prefix = format!("{}/", note_folder);
                match stored_path.strip_prefix(&prefix) {
                    Some(rest) => rest.to_string(),
                    None => stored_path,
                }
            }
            NewLinkFormat::Shortest => match stored_path.rsplit('/').next() {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => stored_path,
            },
        }
    }
}

/// 导入流水线设置。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginSettings {
    #[serde(flatten)]
    pub vault: VaultSettings,
    /// 是否将位图转码为 WebP。
    pub convert_to_webp: bool,
    /// 显示宽度阈值，超过时附加宽度标注。
    pub max_display_width: Option<u32>,
    /// 执行上下文数量。
    pub pool_size: usize,
    /// 单任务超时（毫秒），0 表示不设上限。
    pub task_timeout_ms: u64,
    /// 去重存储的命名探测上限。
    pub max_probe_attempts: u32,
    /// 单个来源的体积上限（MB）。
    pub max_file_size_mb: u64,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            vault: VaultSettings::default(),
            convert_to_webp: false,
            max_display_width: None,
            pool_size: 2,
            task_timeout_ms: DEFAULT_TASK_TIMEOUT_MS,
            max_probe_attempts: DEFAULT_MAX_PROBE_ATTEMPTS,
            max_file_size_mb: 50,
        }
    }
}

impl PluginSettings {
    /// 读取设置文件；文件不存在时返回默认值。
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&content)
            .map_err(|e| AppError::Settings(format!("解析设置文件失败: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// 读取失败时记录告警并回退默认值。
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(err) => {
                log::warn!("⚠️ 设置读取失败，使用默认设置: {}", err);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        self.validate()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Settings(format!("序列化设置失败: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.dispatcher_config()?;
        self.source_config()?;
        if self.max_probe_attempts == 0 {
            return Err(AppError::Settings("maxProbeAttempts 至少为 1".to_string()));
        }
        if self.max_display_width == Some(0) {
            return Err(AppError::Settings(
                "maxDisplayWidth 不能为 0，关闭宽度标注请留空".to_string(),
            ));
        }
        Ok(())
    }

    pub fn dispatcher_config(&self) -> Result<DispatcherConfig, AppError> {
        let config = DispatcherConfig::default()
            .with_pool_size(self.pool_size)
            .with_timeout_ms(self.task_timeout_ms);
        config
            .validate()
            .map_err(|e| AppError::Settings(e.to_string()))?;
        Ok(config)
    }

    pub fn source_config(&self) -> Result<SourceConfig, AppError> {
        SourceConfig::default()
            .with_max_file_size_mb(self.max_file_size_mb)
            .map_err(|e| AppError::Settings(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn attachment_folder_policies() {
        assert_eq!(AttachmentFolder::parse("/").resolve("a/b/note.md"), "/");
        assert_eq!(AttachmentFolder::parse("./").resolve("a/b/note.md"), "a/b");
        assert_eq!(AttachmentFolder::parse("./").resolve("note.md"), "/");
        assert_eq!(AttachmentFolder::parse("./img").resolve("a/note.md"), "a/img");
        assert_eq!(AttachmentFolder::parse("./img").resolve("note.md"), "img");
        assert_eq!(AttachmentFolder::parse("Attachments/").resolve("a/note.md"), "Attachments");
    }

    #[test]
    fn link_formats() {
        let mut settings = VaultSettings::default();

        settings.new_link_format = NewLinkFormat::Absolute;
        assert_eq!(settings.link_for("a/img/x.png", "a/note.md"), "a/img/x.png");

        settings.new_link_format = NewLinkFormat::Relative;
        assert_eq!(settings.link_for("a/img/x.png", "a/note.md"), "img/x.png");
        assert_eq!(settings.link_for("b/x.png", "a/note.md"), "b/x.png");
        assert_eq!(settings.link_for("x.png", "note.md"), "x.png");

        settings.new_link_format = NewLinkFormat::Shortest;
        assert_eq!(settings.link_for("a/img/x.png", "a/note.md"), "x.png");
    }

    #[test]
    fn host_config_keys_are_camel_case() {
        let parsed: VaultSettings = serde_json::from_str(
            r#"{"attachmentFolderPath":"./assets","newLinkFormat":"relative","useMarkdownLinks":true,"other":1}"#,
        )
        .expect("parse failed");

        assert_eq!(parsed.attachment_folder(), AttachmentFolder::NoteSubfolder("assets".to_string()));
        assert_eq!(parsed.new_link_format, NewLinkFormat::Relative);
        assert_eq!(parsed.dialect(), LinkDialect::Markdown);
    }

    #[test]
    fn plugin_settings_round_trip_through_file() {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let path = dir.path().join("conf").join("settings.json");

        let settings = PluginSettings {
            convert_to_webp: true,
            max_display_width: Some(640),
            ..PluginSettings::default()
        };
        settings.save(&path).expect("save failed");

        let loaded = PluginSettings::load(&path).expect("load failed");
        assert_eq!(loaded, settings);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let parsed: PluginSettings =
            serde_json::from_str(r#"{"convertToWebp":true}"#).expect("parse failed");
        assert!(parsed.convert_to_webp);
        assert_eq!(parsed.max_probe_attempts, DEFAULT_MAX_PROBE_ATTEMPTS);
        assert_eq!(parsed.vault, VaultSettings::default());
    }

    #[test]
    fn invalid_file_falls_back_with_load_or_default() {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").expect("write failed");

        assert!(matches!(PluginSettings::load(&path), Err(AppError::Settings(_))));
        assert_eq!(PluginSettings::load_or_default(&path), PluginSettings::default());
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let settings = PluginSettings {
            task_timeout_ms: 0,
            ..PluginSettings::default()
        };
        assert_eq!(settings.dispatcher_config().expect("config").task_timeout, None);

        let settings = PluginSettings::default();
        assert_eq!(
            settings.dispatcher_config().expect("config").task_timeout,
            Some(Duration::from_millis(DEFAULT_TASK_TIMEOUT_MS))
        );
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let settings = PluginSettings {
            pool_size: 0,
            ..PluginSettings::default()
        };
        assert!(matches!(settings.validate(), Err(AppError::Settings(_))));

        let settings = PluginSettings {
            max_probe_attempts: 0,
            ..PluginSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
