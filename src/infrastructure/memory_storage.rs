// 内存中的存储卷，记录顺序固定，可以模拟打开失败、中途出错和慢速遍历。

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::domain::{Cursor, FileRecord, StorageError, StorageKind, StorageProvider, StorageVolume};

#[derive(Debug, Clone)]
pub struct MemoryVolume {
    name: String,
    kind: StorageKind,
    records: Vec<FileRecord>,
    open_error: Option<StorageError>,
    fail_after: Option<(usize, StorageError)>,
    step_delay: Option<Duration>,
}

impl MemoryVolume {
    pub fn new<I, S>(name: impl Into<String>, kind: StorageKind, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind,
            records: files.into_iter().map(FileRecord::new).collect(),
            open_error: None,
            fail_after: None,
            step_delay: None,
        }
    }

    /// 打开游标时直接失败
    pub fn failing_on_open(mut self, err: StorageError) -> Self {
        self.open_error = Some(err);
        self
    }

    /// 产出 `count` 条记录后出错
    pub fn failing_after(mut self, count: usize, err: StorageError) -> Self {
        self.fail_after = Some((count, err));
        self
    }

    /// 每条记录前等待一段时间
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = Some(delay);
        self
    }

    pub fn kind(&self) -> &StorageKind {
        &self.kind
    }
}

impl StorageVolume for MemoryVolume {
    fn name(&self) -> &str {
        &self.name
    }

    fn enumerate(&self, _include_hidden: bool) -> Result<Box<dyn Cursor>, StorageError> {
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }

        Ok(Box::new(MemoryCursor {
            pending: self.records.iter().cloned().collect(),
            yielded: 0,
            fail_after: self.fail_after.clone(),
            step_delay: self.step_delay,
        }))
    }
}

struct MemoryCursor {
    pending: VecDeque<FileRecord>,
    yielded: usize,
    fail_after: Option<(usize, StorageError)>,
    step_delay: Option<Duration>,
}

impl Cursor for MemoryCursor {
    fn advance(&mut self) -> Result<Option<FileRecord>, StorageError> {
        if let Some(delay) = self.step_delay {
            thread::sleep(delay);
        }

        if let Some((limit, err)) = &self.fail_after {
            if self.yielded >= *limit {
                return Err(err.clone());
            }
        }

        let next = self.pending.pop_front();
        if next.is_some() {
            self.yielded += 1;
        }
        Ok(next)
    }
}

/// 由内存存储卷组成的提供方
#[derive(Debug, Clone, Default)]
pub struct MemoryStorageProvider {
    volumes: Vec<Arc<MemoryVolume>>,
}

impl MemoryStorageProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_volume(mut self, volume: MemoryVolume) -> Self {
        self.volumes.push(Arc::new(volume));
        self
    }
}

impl StorageProvider for MemoryStorageProvider {
    fn resolve(&self, kind: &StorageKind) -> Vec<Arc<dyn StorageVolume>> {
        if !kind.is_supported() {
            return Vec::new();
        }

        self.volumes
            .iter()
            .filter(|volume| volume.kind() == kind)
            .map(|volume| Arc::clone(volume) as Arc<dyn StorageVolume>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(cursor: &mut dyn Cursor) -> (Vec<String>, Option<StorageError>) {
        let mut names = Vec::new();
        loop {
            match cursor.advance() {
                Ok(Some(record)) => names.push(record.name),
                Ok(None) => return (names, None),
                Err(err) => return (names, Some(err)),
            }
        }
    }

    #[test]
    fn test_cursor_yields_in_order() {
        let volume = MemoryVolume::new("sdcard", StorageKind::Sdcard, ["a.jpg", "b.jpg"]);
        let mut cursor = volume.enumerate(false).unwrap();
        let (names, err) = drain(cursor.as_mut());
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);
        assert!(err.is_none());
    }

    #[test]
    fn test_cursor_fails_midway() {
        let volume = MemoryVolume::new("sdcard", StorageKind::Sdcard, ["a", "b", "c"])
            .failing_after(1, StorageError::Walk("broken".to_string()));
        let mut cursor = volume.enumerate(false).unwrap();
        let (names, err) = drain(cursor.as_mut());
        assert_eq!(names, vec!["a"]);
        assert_eq!(err, Some(StorageError::Walk("broken".to_string())));
    }

    #[test]
    fn test_open_failure() {
        let volume = MemoryVolume::new("sdcard", StorageKind::Sdcard, ["a"])
            .failing_on_open(StorageError::Unavailable("sdcard".to_string()));
        assert!(volume.enumerate(false).is_err());
    }

    #[test]
    fn test_provider_filters_by_kind() {
        let provider = MemoryStorageProvider::new()
            .with_volume(MemoryVolume::new("sdcard", StorageKind::Sdcard, ["a"]))
            .with_volume(MemoryVolume::new("sdcard1", StorageKind::Sdcard, ["b"]))
            .with_volume(MemoryVolume::new("music", StorageKind::Music, ["c"]));

        assert_eq!(provider.resolve(&StorageKind::Sdcard).len(), 2);
        assert_eq!(provider.resolve(&StorageKind::Music).len(), 1);
        assert!(provider.resolve(&StorageKind::Videos).is_empty());
        assert!(provider
            .resolve(&StorageKind::Unsupported("apps".to_string()))
            .is_empty());
    }
}
