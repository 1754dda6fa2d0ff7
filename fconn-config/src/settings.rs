use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// 分组界面里「不设置连接件」选项的显示文本。
/// 与连接件显示名一样会原样写入设置文件。
pub const NO_CONNECTOR_MARKER: &str = "-не устанавливать соединители-";

/// 一次成功放置后记住的用户选择：上次使用的分组属性，
/// 以及分组键到连接件显示名的映射。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSettings {
    #[serde(default)]
    pub last_grouping_attribute: String,
    #[serde(default)]
    pub connector_assignments: BTreeMap<String, String>,
}

/// 插件设置的持久化存储：每个插件一个 JSON 文件。
/// 会话开始读一次，成功放置结束后写一次。
/// 持久化失败永远不会中断放置流程，所以这里的所有
/// I/O 错误都被降级为默认值或无操作。
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 按插件名定位设置文件：`<root>/<plugin_name>/settings.json`。
    pub fn for_plugin(root: impl AsRef<Path>, plugin_name: &str) -> Self {
        Self::new(root.as_ref().join(plugin_name).join("settings.json"))
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取设置。文件缺失、为空或解析失败时一律返回默认文档。
    pub fn load(&self) -> PluginSettings {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return PluginSettings::default();
        };
        if content.trim().is_empty() {
            return PluginSettings::default();
        }
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// 尽力写入设置，自动创建父目录；任何失败都被吞掉。
    pub fn save(&self, settings: &PluginSettings) {
        let Ok(json) = serde_json::to_string_pretty(settings) else {
            return;
        };
        if let Some(parent) = self.path.parent() {
            if fs::create_dir_all(parent).is_err() {
                return;
            }
        }
        let _ = fs::write(&self.path, json);
    }

    /// 删除设置文件。文件不存在不算错误。
    pub fn clear(&self) {
        let _ = fs::remove_file(&self.path);
    }
}
