use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::{Walk, WalkBuilder};

use crate::application::VolumeConfig;
use crate::domain::{Cursor, FileRecord, StorageError, StorageKind, StorageProvider, StorageVolume};

/// 以本地目录为根的存储卷
#[derive(Debug, Clone)]
pub struct LocalVolume {
    name: String,
    kind: StorageKind,
    root: PathBuf,
}

impl LocalVolume {
    pub fn new(name: impl Into<String>, kind: StorageKind, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind(&self) -> &StorageKind {
        &self.kind
    }
}

impl StorageVolume for LocalVolume {
    fn name(&self) -> &str {
        &self.name
    }

    fn enumerate(&self, include_hidden: bool) -> Result<Box<dyn Cursor>, StorageError> {
        if !self.root.is_dir() {
            return Err(StorageError::Unavailable(self.root.display().to_string()));
        }

        // 不应用任何 ignore 规则，只按隐藏文件策略过滤
        let walk = WalkBuilder::new(&self.root)
            .hidden(!include_hidden)
            .ignore(false)
            .parents(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .follow_links(false)
            .build();

        Ok(Box::new(LocalCursor { walk }))
    }
}

struct LocalCursor {
    walk: Walk,
}

impl Cursor for LocalCursor {
    fn advance(&mut self) -> Result<Option<FileRecord>, StorageError> {
        for result in self.walk.by_ref() {
            // 单个条目无法访问时跳过，不中断整个存储卷
            let Ok(entry) = result else {
                continue;
            };

            // 不跟随目录链接，但指向文件的符号链接按目标文件处理
            let metadata = if entry.path_is_symlink() {
                fs::metadata(entry.path()).ok()
            } else {
                entry.metadata().ok()
            };
            let Some(metadata) = metadata.filter(|m| m.is_file()) else {
                continue;
            };

            let record = FileRecord::new(entry.path().to_string_lossy()).with_size(metadata.len());
            return Ok(Some(record));
        }

        Ok(None)
    }
}

/// 本地目录存储提供方
#[derive(Debug, Clone, Default)]
pub struct LocalStorageProvider {
    volumes: Vec<Arc<LocalVolume>>,
}

impl LocalStorageProvider {
    pub fn new(volumes: Vec<LocalVolume>) -> Self {
        Self {
            volumes: volumes.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn from_config(volumes: &[VolumeConfig]) -> Self {
        Self::new(
            volumes
                .iter()
                .map(|v| LocalVolume::new(v.name.clone(), v.kind.clone(), v.root.clone()))
                .collect(),
        )
    }
}

impl StorageProvider for LocalStorageProvider {
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
    use tempfile::TempDir;

    fn volume_dir() -> TempDir {
        tempfile::Builder::new().prefix("volume").tempdir().unwrap()
    }

    fn collect_names(volume: &LocalVolume, include_hidden: bool) -> Vec<String> {
        let mut cursor = volume.enumerate(include_hidden).unwrap();
        let mut names = Vec::new();
        while let Some(record) = cursor.advance().unwrap() {
            let name = Path::new(&record.name)
                .file_name()
                .unwrap()
                .to_string_lossy()
                .to_string();
            names.push(name);
        }
        names.sort();
        names
    }

    #[test]
    fn test_local_volume_lists_files() {
        let dir = volume_dir();
        fs::create_dir(dir.path().join("DCIM")).unwrap();
        fs::write(dir.path().join("DCIM/1.jpg"), "jpg").unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let volume = LocalVolume::new("sdcard", StorageKind::Sdcard, dir.path());
        assert_eq!(collect_names(&volume, false), vec!["1.jpg", "notes.txt"]);
    }

    #[test]
    fn test_hidden_entries_skipped() {
        let dir = volume_dir();
        fs::create_dir(dir.path().join(".cache")).unwrap();
        fs::write(dir.path().join(".cache/thumb.jpg"), "x").unwrap();
        fs::write(dir.path().join(".hidden.jpg"), "x").unwrap();
        fs::write(dir.path().join("shown.jpg"), "x").unwrap();

        let volume = LocalVolume::new("sdcard", StorageKind::Sdcard, dir.path());
        assert_eq!(collect_names(&volume, false), vec!["shown.jpg"]);
        assert_eq!(
            collect_names(&volume, true),
            vec![".hidden.jpg", "shown.jpg", "thumb.jpg"]
        );
    }

    #[test]
    fn test_record_size() {
        let dir = volume_dir();
        fs::write(dir.path().join("a.bin"), [0u8; 16]).unwrap();

        let volume = LocalVolume::new("sdcard", StorageKind::Sdcard, dir.path());
        let mut cursor = volume.enumerate(false).unwrap();
        let record = cursor.advance().unwrap().unwrap();
        assert_eq!(record.size, Some(16));
        assert!(cursor.advance().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_is_listed() {
        let dir = volume_dir();
        let target = volume_dir();
        fs::write(target.path().join("song.mp3"), [0u8; 8]).unwrap();
        fs::create_dir(target.path().join("album")).unwrap();
        std::os::unix::fs::symlink(target.path().join("song.mp3"), dir.path().join("link.mp3"))
            .unwrap();
        std::os::unix::fs::symlink(target.path().join("album"), dir.path().join("album")).unwrap();

        let volume = LocalVolume::new("music", StorageKind::Music, dir.path());
        assert_eq!(collect_names(&volume, false), vec!["link.mp3"]);

        let mut cursor = volume.enumerate(false).unwrap();
        assert_eq!(cursor.advance().unwrap().unwrap().size, Some(8));
    }

    #[test]
    fn test_missing_root_is_unavailable() {
        let dir = volume_dir();
        let volume = LocalVolume::new("sdcard", StorageKind::Sdcard, dir.path().join("missing"));
        assert!(matches!(
            volume.enumerate(false),
            Err(StorageError::Unavailable(_))
        ));
    }

    #[test]
    fn test_provider_from_config() {
        let volumes = vec![
            VolumeConfig {
                name: "sdcard".to_string(),
                kind: StorageKind::Sdcard,
                root: PathBuf::from("/sdcard"),
            },
            VolumeConfig {
                name: "music".to_string(),
                kind: StorageKind::Music,
                root: PathBuf::from("/music"),
            },
        ];
        let provider = LocalStorageProvider::from_config(&volumes);

        let resolved = provider.resolve(&StorageKind::Music);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name(), "music");
        assert!(provider.resolve(&StorageKind::Pictures).is_empty());
    }
}
