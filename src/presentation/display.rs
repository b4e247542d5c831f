use std::io::{self, Write};
use std::time::Instant;

use anyhow::Result;
use humansize::{format_size, BINARY};

use crate::application::SearchOutcome;
use crate::domain::FinderEvent;

/// 格式化文件大小
pub fn format_file_size(size: u64) -> String {
    format_size(size, BINARY)
}

/// 格式化持续时间
pub fn format_duration(duration: std::time::Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}.{:03}s", secs, duration.subsec_millis())
    }
}

/// 把事件渲染为一行终端输出，不需要显示的事件返回 `None`
pub fn render_event(event: &FinderEvent) -> Option<String> {
    match event {
        FinderEvent::SearchCancelled { message } => Some(format!("\x1b[1;33m{}\x1b[0m", message)),
        FinderEvent::Empty { needle } => {
            Some(format!("\x1b[1;33m没有可用的存储卷，无法搜索: {}\x1b[0m", needle))
        }
        FinderEvent::StorageSearchBegin { storage, needle } => {
            Some(format!("\x1b[2;37m在 {} 中搜索: {}\x1b[0m", storage, needle))
        }
        FinderEvent::FileFound { info, storage, file } => {
            let size = file
                .size
                .map(|size| format!(" ({})", format_file_size(size)))
                .unwrap_or_default();
            let dir = if info.path.is_empty() {
                String::new()
            } else {
                format!("{}/", info.path)
            };
            Some(format!(
                "\x1b[1;34m[{}]\x1b[0m {}\x1b[1;32m{}\x1b[0m{}",
                storage, dir, info.name, size
            ))
        }
        FinderEvent::SearchComplete {
            storage,
            match_count,
            ..
        } => Some(format!(
            "\x1b[2;37m{} 搜索完成，累计匹配 {} 个\x1b[0m",
            storage, match_count
        )),
        FinderEvent::Error {
            message, detail, ..
        } => {
            Some(format!("\x1b[1;31m{}: {}\x1b[0m", message, detail))
        }
        FinderEvent::SearchBegin { .. } | FinderEvent::SearchFinished { .. } => None,
    }
}

/// 搜索摘要
pub struct SearchSummary {
    pub start_time: Instant,
    pub total_matches: u64,
    pub completed_volumes: usize,
    pub failed_volumes: usize,
    pub cancelled: bool,
}

impl SearchSummary {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            total_matches: 0,
            completed_volumes: 0,
            failed_volumes: 0,
            cancelled: false,
        }
    }

    /// 根据会话结果更新统计
    pub fn apply(&mut self, outcome: &SearchOutcome) {
        match outcome {
            SearchOutcome::Finished(summary) => {
                self.total_matches = summary.total_matches;
                self.completed_volumes = summary.completed_volumes;
                self.failed_volumes = summary.failed_volumes;
            }
            SearchOutcome::Cancelled => self.cancelled = true,
            SearchOutcome::TooShort | SearchOutcome::NoStorages => {}
        }
    }

    pub fn print(&self) -> Result<()> {
        let duration = self.start_time.elapsed();
        let mut stdout = io::stdout().lock();

        writeln!(stdout, "\n搜索摘要:")?;
        writeln!(stdout, "----------------------------")?;
        writeln!(stdout, "总用时: {}", format_duration(duration))?;
        writeln!(stdout, "完成存储卷: {}", self.completed_volumes)?;
        writeln!(stdout, "失败存储卷: {}", self.failed_volumes)?;
        writeln!(stdout, "匹配文件: {}", self.total_matches)?;
        if self.cancelled {
            writeln!(stdout, "搜索已取消")?;
        }

        Ok(())
    }
}

impl Default for SearchSummary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::application::SessionSummary;
    use crate::domain::{FileInfo, FileRecord, StorageError};

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.500s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(1024), "1 KiB");
    }

    #[test]
    fn test_render_file_found() {
        let event = FinderEvent::FileFound {
            file: FileRecord::new("/sdcard/DCIM/1.jpg").with_size(2048),
            info: FileInfo {
                name: "1.jpg".to_string(),
                path: "/sdcard/DCIM".to_string(),
            },
            storage: "sdcard".to_string(),
        };
        let line = render_event(&event).unwrap();
        assert!(line.contains("[sdcard]"));
        assert!(line.contains("/sdcard/DCIM/"));
        assert!(line.contains("1.jpg"));
        assert!(line.contains("2 KiB"));
    }

    #[test]
    fn test_render_error_and_hidden_events() {
        let error = FinderEvent::Error {
            message: "访问存储设备 'sdcard' 时出错".to_string(),
            detail: StorageError::Walk("boom".to_string()),
            storage: "sdcard".to_string(),
        };
        assert!(render_event(&error).unwrap().contains("遍历错误: boom"));

        let begin = FinderEvent::SearchBegin {
            needle: "abc".to_string(),
        };
        assert!(render_event(&begin).is_none());
    }

    #[test]
    fn test_summary_apply() {
        let mut summary = SearchSummary::new();
        summary.apply(&SearchOutcome::Finished(SessionSummary {
            needle: "abc".to_string(),
            total_matches: 4,
            completed_volumes: 2,
            failed_volumes: 1,
        }));
        assert_eq!(summary.total_matches, 4);
        assert_eq!(summary.completed_volumes, 2);
        assert_eq!(summary.failed_volumes, 1);
        assert!(!summary.cancelled);

        summary.apply(&SearchOutcome::Cancelled);
        assert!(summary.cancelled);
    }
}
