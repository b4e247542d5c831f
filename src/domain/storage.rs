use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 存储类型
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StorageKind {
    /// 主存储（SD 卡）
    #[default]
    Sdcard,
    Music,
    Pictures,
    Videos,
    /// 不支持的类型，解析出的存储卷集合总是为空
    Unsupported(String),
}

impl StorageKind {
    pub fn as_str(&self) -> &str {
        match self {
            StorageKind::Sdcard => "sdcard",
            StorageKind::Music => "music",
            StorageKind::Pictures => "pictures",
            StorageKind::Videos => "videos",
            StorageKind::Unsupported(name) => name,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, StorageKind::Unsupported(_))
    }
}

impl FromStr for StorageKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "sdcard" => StorageKind::Sdcard,
            "music" => StorageKind::Music,
            "pictures" => StorageKind::Pictures,
            "videos" => StorageKind::Videos,
            other => StorageKind::Unsupported(other.to_string()),
        })
    }
}

impl From<String> for StorageKind {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<StorageKind> for String {
    fn from(kind: StorageKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 存储卷枚举出的文件记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// 完整路径
    pub name: String,
    /// 文件大小（字节），提供方不知道时为 `None`
    pub size: Option<u64>,
}

impl FileRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// 存储卷访问错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// 存储卷无法打开
    #[error("存储卷不可用: {0}")]
    Unavailable(String),

    /// 底层 I/O 错误
    #[error("I/O 错误: {0}")]
    Io(String),

    /// 遍历过程中游标出错
    #[error("遍历错误: {0}")]
    Walk(String),

    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

/// 单个存储卷上的枚举游标
///
/// 每次 `advance` 取出下一条记录；`Ok(None)` 表示已经遍历完毕，
/// 返回 `Err` 表示该存储卷出错，调用方不应再继续推进。
pub trait Cursor: Send {
    fn advance(&mut self) -> Result<Option<FileRecord>, StorageError>;
}

/// 可枚举文件的命名存储卷
pub trait StorageVolume: Send + Sync {
    fn name(&self) -> &str;

    /// 打开一个新的游标，`include_hidden` 为提供方可选的隐藏文件提示
    fn enumerate(&self, include_hidden: bool) -> Result<Box<dyn Cursor>, StorageError>;
}

/// 按存储类型解析存储卷
pub trait StorageProvider: Send + Sync {
    /// 不支持的类型或没有可用存储卷时返回空集合
    fn resolve(&self, kind: &StorageKind) -> Vec<Arc<dyn StorageVolume>>;
}
