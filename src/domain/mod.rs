pub mod events;
pub mod matcher;
pub mod storage;

pub use events::{EventEmitter, EventKind, FinderEvent, Listener, ListenerId, UnknownEvent};
pub use matcher::{check_hidden, matches, normalize, split_path, FileInfo, NameMatcher};
pub use storage::{Cursor, FileRecord, StorageError, StorageKind, StorageProvider, StorageVolume};
