use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Local;

use crate::domain::StorageError;

/// 错误类型分类
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// 存储卷无法打开
    StorageUnavailable,
    /// 遍历过程中出错
    Enumeration,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::StorageUnavailable => "存储卷不可用",
            ErrorType::Enumeration => "遍历失败",
        }
    }
}

impl From<&StorageError> for ErrorType {
    fn from(err: &StorageError) -> Self {
        match err {
            StorageError::Unavailable(_) => ErrorType::StorageUnavailable,
            StorageError::Io(_) | StorageError::Walk(_) | StorageError::Other(_) => {
                ErrorType::Enumeration
            }
        }
    }
}

/// 存储卷错误记录器
///
/// 错误计数总是开启；只有启用文件时才写入错误日志。
pub struct ErrorLogger {
    error_file: Arc<Mutex<Option<File>>>,
    error_path: Option<PathBuf>,
    error_counts: Arc<Mutex<HashMap<ErrorType, usize>>>,
}

impl ErrorLogger {
    /// 创建新的错误记录器，`write_file` 为真时在当前目录生成错误日志
    pub fn new(write_file: bool) -> Result<Self> {
        if !write_file {
            return Ok(Self {
                error_file: Arc::new(Mutex::new(None)),
                error_path: None,
                error_counts: Arc::new(Mutex::new(HashMap::new())),
            });
        }

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        Self::with_path(PathBuf::from(format!("finder_error_{}.log", timestamp)))
    }

    /// 写入指定路径的错误记录器
    pub fn with_path(error_path: PathBuf) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&error_path)
            .with_context(|| format!("无法创建错误日志: {}", error_path.display()))?;

        file.write_all(&[0xEF, 0xBB, 0xBF])?;
        writeln!(file, "# StorageFinder 错误日志")?;
        writeln!(file, "# 开始时间: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(file, "# ============================================")?;
        writeln!(file)?;

        Ok(Self {
            error_file: Arc::new(Mutex::new(Some(file))),
            error_path: Some(error_path),
            error_counts: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// 记录存储卷错误
    pub fn log_error(&self, storage: Option<&str>, message: &str, detail: &StorageError) -> Result<()> {
        let error_type = ErrorType::from(detail);

        if let Ok(mut counts) = self.error_counts.lock() {
            *counts.entry(error_type.clone()).or_insert(0) += 1;
        }

        if let Ok(mut file_guard) = self.error_file.lock() {
            if let Some(ref mut file) = *file_guard {
                let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                writeln!(file, "[{}] {} - {}", timestamp, error_type.as_str(), message)?;

                if let Some(name) = storage {
                    writeln!(file, "  存储卷: {}", name)?;
                }

                writeln!(file, "  详细信息: {}", detail)?;
                writeln!(file)?;
                file.flush()?;
            }
        }

        Ok(())
    }

    /// 获取错误统计信息
    pub fn get_error_summary(&self) -> HashMap<ErrorType, usize> {
        self.error_counts
            .lock()
            .map(|counts| counts.clone())
            .unwrap_or_default()
    }

    /// 获取总错误数
    pub fn get_total_errors(&self) -> usize {
        self.error_counts
            .lock()
            .map(|counts| counts.values().sum())
            .unwrap_or(0)
    }

    pub fn has_errors(&self) -> bool {
        self.get_total_errors() > 0
    }

    /// 完成错误日志记录
    pub fn finalize(&self) -> Result<()> {
        if let Ok(mut file_guard) = self.error_file.lock() {
            if let Some(ref mut file) = *file_guard {
                writeln!(file, "# ============================================")?;
                writeln!(file, "# 结束时间: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;

                let summary = self.get_error_summary();
                if summary.is_empty() {
                    writeln!(file, "# 无错误记录")?;
                } else {
                    writeln!(file, "# 错误统计:")?;
                    for (error_type, count) in &summary {
                        writeln!(file, "#   {}: {} 次", error_type.as_str(), count)?;
                    }
                    writeln!(file, "#   总计: {} 个错误", self.get_total_errors())?;
                }

                file.flush()?;
            }
        }

        Ok(())
    }

    /// 打印错误摘要到控制台
    pub fn print_error_summary(&self) {
        if !self.has_errors() {
            return;
        }

        println!("\n⚠️  搜索过程中发现错误:");
        println!("----------------------------");

        for (error_type, count) in &self.get_error_summary() {
            println!("  {}: {} 次", error_type.as_str(), count);
        }

        println!("  总计: {} 个错误", self.get_total_errors());
        if let Some(path) = &self.error_path {
            println!("  详细错误信息请查看: {}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_counts_without_file() {
        let logger = ErrorLogger::new(false).unwrap();
        assert!(!logger.has_errors());

        logger
            .log_error(Some("sdcard"), "访问失败", &StorageError::Walk("boom".to_string()))
            .unwrap();
        logger
            .log_error(None, "打不开", &StorageError::Unavailable("/mnt".to_string()))
            .unwrap();

        assert_eq!(logger.get_total_errors(), 2);
        let summary = logger.get_error_summary();
        assert_eq!(summary.get(&ErrorType::Enumeration), Some(&1));
        assert_eq!(summary.get(&ErrorType::StorageUnavailable), Some(&1));
    }

    #[test]
    fn test_error_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("errors.log");
        let logger = ErrorLogger::with_path(path.clone()).unwrap();

        logger
            .log_error(Some("music"), "访问存储设备 'music' 时出错", &StorageError::Io("denied".to_string()))
            .unwrap();
        logger.finalize().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("存储卷: music"));
        assert!(content.contains("I/O 错误: denied"));
        assert!(content.contains("总计: 1 个错误"));
    }

    #[test]
    fn test_error_types() {
        assert_eq!(ErrorType::Enumeration.as_str(), "遍历失败");
        assert_eq!(
            ErrorType::from(&StorageError::Unavailable("x".to_string())),
            ErrorType::StorageUnavailable
        );
    }
}
