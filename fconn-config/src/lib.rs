use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub mod settings;

/// 应用配置的根结构。
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            run: RunConfig::default(),
            schema: SchemaConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `FCONN_CONFIG`，
    /// 否则寻找 `./config/default.toml`。文件缺失时返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("FCONN_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 两种工作流：批量分组放置与手动逐对配对。
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Batch,
    Manual,
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::Batch
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub default_mode: RunMode,
    /// 插件设置文件的根目录。
    #[serde(default = "RunConfig::default_userdata_root")]
    pub userdata_root: PathBuf,
}

impl RunConfig {
    fn default_userdata_root() -> PathBuf {
        PathBuf::from("userdata")
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            default_mode: RunMode::default(),
            userdata_root: Self::default_userdata_root(),
        }
    }
}

/// 属性传递与族名过滤的部署约定。默认值复刻原插件部署环境的
/// 族与共享参数命名；测试与其他部署可整体替换。
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    #[serde(default = "SchemaConfig::default_frame_family")]
    pub frame_family: String,
    #[serde(default = "SchemaConfig::default_connector_family_pattern")]
    pub connector_family_pattern: String,
    #[serde(default = "SchemaConfig::default_nested_family_marker")]
    pub nested_family_marker: String,
    #[serde(default = "SchemaConfig::default_nested_source_attribute")]
    pub nested_source_attribute: String,
    #[serde(default = "SchemaConfig::default_nested_target_family")]
    pub nested_target_family: String,
    #[serde(default = "SchemaConfig::default_transfer_list")]
    pub transfer_list: Vec<String>,
}

impl SchemaConfig {
    fn default_frame_family() -> String {
        "KRGP_Каркас колонны".to_string()
    }

    fn default_connector_family_pattern() -> String {
        "KRGP_СБ".to_string()
    }

    fn default_nested_family_marker() -> String {
        "ВБ_".to_string()
    }

    fn default_nested_source_attribute() -> String {
        "Средние_Диаметр арматуры".to_string()
    }

    fn default_nested_target_family() -> String {
        "KRGP_СБ_Крайние стержни с большим диаметром".to_string()
    }

    fn default_transfer_list() -> Vec<String> {
        [
            "Количество_Длина",
            "Количество_Ширина",
            "Колонна_Длина",
            "Колонна_Ширина",
            "Колонна_Высота",
            "ВБ_СмещениеСнизу",
            "ВБ_РазбежкаСнизу",
            "ВБ_СмещениеСверху",
            "ВБ_РазбежкаСверху",
            "Расстояние от грани колонны до центра стержня",
            "ВБ_Диаметр арматуры",
            "ADSK_Марка изделия",
            "ADSK_Категория основы",
            "ADSK_Метка основы",
            "ADSK_Количество основы",
        ]
        .into_iter()
        .map(str::to_string)
        .collect()
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            frame_family: Self::default_frame_family(),
            connector_family_pattern: Self::default_connector_family_pattern(),
            nested_family_marker: Self::default_nested_family_marker(),
            nested_source_attribute: Self::default_nested_source_attribute(),
            nested_target_family: Self::default_nested_target_family(),
            transfer_list: Self::default_transfer_list(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
