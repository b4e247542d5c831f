use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::StorageKind;

/// 默认最小搜索长度
pub const DEFAULT_MIN_SEARCH_LENGTH: usize = 3;

/// 搜索器选项，构造后不可修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinderOptions {
    /// 要搜索的存储类型
    #[serde(rename = "type")]
    pub storage_type: StorageKind,
    /// 搜索字符串的最小长度，只接受正整数
    #[serde(deserialize_with = "lenient_min_length")]
    pub min_search_length: usize,
    /// 是否搜索隐藏文件
    pub hidden: bool,
    /// 是否区分大小写
    pub case_sensitive: bool,
    /// 是否记录调试日志
    pub debug_mode: bool,
}

impl Default for FinderOptions {
    fn default() -> Self {
        Self {
            storage_type: StorageKind::Sdcard,
            min_search_length: DEFAULT_MIN_SEARCH_LENGTH,
            hidden: false,
            case_sensitive: false,
            debug_mode: false,
        }
    }
}

impl FinderOptions {
    /// 返回修正后的选项：最小长度为 0 时回退到默认值
    pub fn normalized(mut self) -> Self {
        if self.min_search_length == 0 {
            self.min_search_length = DEFAULT_MIN_SEARCH_LENGTH;
        }
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLength {
    Number(i64),
    Other(IgnoredAny),
}

/// 非正整数或非数字的值一律回退到默认值
fn lenient_min_length<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawLength::deserialize(deserializer)? {
        RawLength::Number(n) if n > 0 => usize::try_from(n).unwrap_or(DEFAULT_MIN_SEARCH_LENGTH),
        RawLength::Number(_) | RawLength::Other(_) => DEFAULT_MIN_SEARCH_LENGTH,
    })
}

/// 本地存储卷配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeConfig {
    /// 存储卷名称
    pub name: String,
    /// 存储类型
    pub kind: StorageKind,
    /// 根目录
    pub root: PathBuf,
}

/// 应用程序配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// 搜索器选项
    #[serde(default)]
    pub finder: FinderOptions,
    /// 本地存储卷
    #[serde(default)]
    pub volumes: Vec<VolumeConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            finder: FinderOptions::default(),
            volumes: vec![VolumeConfig {
                name: "sdcard".to_string(),
                kind: StorageKind::Sdcard,
                root: PathBuf::from("."),
            }],
        }
    }
}

impl Config {
    /// 从配置文件加载配置，如果文件不存在则创建默认配置文件
    pub fn load_or_create(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            Self::load_from_file(config_path)
        } else {
            let config = Self::default();
            config.save_to_file(config_path)?;
            println!("已创建默认配置文件: {}", config_path.display());
            Ok(config)
        }
    }

    /// 从文件加载配置
    pub fn load_from_file(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("无法读取配置文件: {}", config_path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", config_path.display()))?;

        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("无法创建配置目录: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("无法序列化配置")?;

        fs::write(config_path, content)
            .with_context(|| format!("无法写入配置文件: {}", config_path.display()))?;

        Ok(())
    }

    /// 获取配置文件的默认路径（程序所在目录下的 finder.toml）
    pub fn default_config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("无法获取程序路径")?;

        let exe_dir = exe_path.parent().context("无法获取程序目录")?;

        Ok(exe_dir.join("finder.toml"))
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();

        for volume in &self.volumes {
            if volume.name.trim().is_empty() {
                anyhow::bail!("存储卷名称不能为空");
            }

            if !names.insert(volume.name.as_str()) {
                anyhow::bail!("存储卷名称重复: {}", volume.name);
            }

            if volume.root.as_os_str().is_empty() {
                anyhow::bail!("存储卷 {} 的根目录不能为空", volume.name);
            }
        }

        Ok(())
    }
}
