// 分层架构模块
pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

// 重新导出主要类型
pub use domain::{EventKind, FileInfo, FileRecord, FinderEvent, StorageError, StorageKind};
pub use application::{Config, Finder, FinderOptions, SearchHandle, SearchOutcome};
pub use infrastructure::{ErrorLogger, LocalStorageProvider, Logger, LoggerTrait, MemoryStorageProvider};
pub use presentation::{render_event, SearchSummary};
