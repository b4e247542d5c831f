// 搜索事件与发布/订阅表

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use super::matcher::FileInfo;
use super::storage::{FileRecord, StorageError};

/// 事件名称
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SearchCancelled,
    Empty,
    SearchBegin,
    StorageSearchBegin,
    FileFound,
    SearchComplete,
    Error,
    SearchFinished,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::SearchCancelled,
        EventKind::Empty,
        EventKind::SearchBegin,
        EventKind::StorageSearchBegin,
        EventKind::FileFound,
        EventKind::SearchComplete,
        EventKind::Error,
        EventKind::SearchFinished,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SearchCancelled => "searchCancelled",
            EventKind::Empty => "empty",
            EventKind::SearchBegin => "searchBegin",
            EventKind::StorageSearchBegin => "storageSearchBegin",
            EventKind::FileFound => "fileFound",
            EventKind::SearchComplete => "searchComplete",
            EventKind::Error => "error",
            EventKind::SearchFinished => "searchFinished",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("未知事件: {0}")]
pub struct UnknownEvent(pub String);

impl FromStr for EventKind {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

/// 搜索过程中发出的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinderEvent {
    /// 搜索字符串过短，未触发任何遍历
    SearchCancelled { message: String },
    /// 没有可用的存储卷
    Empty { needle: String },
    SearchBegin { needle: String },
    StorageSearchBegin { storage: String, needle: String },
    FileFound {
        file: FileRecord,
        info: FileInfo,
        storage: String,
    },
    /// 单个存储卷遍历完成，`match_count` 为本次会话截至此时的累计匹配数
    SearchComplete {
        storage: String,
        needle: String,
        match_count: u64,
    },
    Error {
        message: String,
        detail: StorageError,
        storage: String,
    },
    /// 所有存储卷都已完成或出错
    SearchFinished {
        needle: String,
        total_matches: u64,
        completed: usize,
        failed: usize,
    },
}

impl FinderEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            FinderEvent::SearchCancelled { .. } => EventKind::SearchCancelled,
            FinderEvent::Empty { .. } => EventKind::Empty,
            FinderEvent::SearchBegin { .. } => EventKind::SearchBegin,
            FinderEvent::StorageSearchBegin { .. } => EventKind::StorageSearchBegin,
            FinderEvent::FileFound { .. } => EventKind::FileFound,
            FinderEvent::SearchComplete { .. } => EventKind::SearchComplete,
            FinderEvent::Error { .. } => EventKind::Error,
            FinderEvent::SearchFinished { .. } => EventKind::SearchFinished,
        }
    }
}

impl fmt::Display for FinderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind();
        match self {
            FinderEvent::SearchCancelled { message } => write!(f, "{} {}", kind, message),
            FinderEvent::Empty { needle } | FinderEvent::SearchBegin { needle } => {
                write!(f, "{} {}", kind, needle)
            }
            FinderEvent::StorageSearchBegin { storage, needle } => {
                write!(f, "{} {} {}", kind, storage, needle)
            }
            FinderEvent::FileFound { file, storage, .. } => {
                write!(f, "{} {} {}", kind, file.name, storage)
            }
            FinderEvent::SearchComplete {
                storage,
                needle,
                match_count,
            } => write!(f, "{} {} {} {}", kind, storage, needle, match_count),
            FinderEvent::Error {
                message, detail, ..
            } => write!(f, "{} {} ({})", kind, message, detail),
            FinderEvent::SearchFinished {
                needle,
                total_matches,
                completed,
                failed,
            } => write!(
                f,
                "{} {} 匹配: {} 完成: {} 失败: {}",
                kind, needle, total_matches, completed, failed
            ),
        }
    }
}

/// 订阅句柄，用于取消订阅
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Arc<dyn Fn(&FinderEvent) + Send + Sync>;

/// 按事件名称分发的发布/订阅表
///
/// 同一事件可以有多个监听器，按注册顺序调用。分发时先复制监听器列表再释放锁，
/// 因此监听器内部可以再次订阅或取消订阅。
pub struct EventEmitter {
    listeners: Mutex<HashMap<EventKind, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// 订阅事件
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&FinderEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners
                .entry(kind)
                .or_default()
                .push((id, Arc::new(listener)));
        }
        id
    }

    /// 取消订阅，返回是否找到该监听器
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        let Ok(mut listeners) = self.listeners.lock() else {
            return false;
        };
        let Some(entries) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        before != entries.len()
    }

    /// 移除某个事件的全部监听器
    pub fn remove_all(&self, kind: EventKind) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.remove(&kind);
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .lock()
            .map(|listeners| listeners.get(&kind).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// 分发事件，返回被调用的监听器数量
    pub fn emit(&self, event: &FinderEvent) -> usize {
        let snapshot: Vec<Listener> = match self.listeners.lock() {
            Ok(listeners) => listeners
                .get(&event.kind())
                .map(|entries| entries.iter().map(|(_, l)| Arc::clone(l)).collect())
                .unwrap_or_default(),
            Err(_) => return 0,
        };

        for listener in &snapshot {
            listener(event);
        }
        snapshot.len()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: Vec<(EventKind, usize)> = EventKind::ALL
            .into_iter()
            .map(|kind| (kind, self.listener_count(kind)))
            .filter(|(_, count)| *count > 0)
            .collect();
        f.debug_struct("EventEmitter").field("listeners", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn begin(needle: &str) -> FinderEvent {
        FinderEvent::SearchBegin {
            needle: needle.to_string(),
        }
    }

    #[test]
    fn test_event_names() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert_eq!(EventKind::FileFound.as_str(), "fileFound");
        assert!("nope".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_listeners_called_in_order() {
        let emitter = EventEmitter::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let calls = Arc::clone(&calls);
            emitter.on(EventKind::SearchBegin, move |_| calls.lock().unwrap().push(tag));
        }

        assert_eq!(emitter.emit(&begin("abc")), 3);
        assert_eq!(*calls.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_only_matching_kind_is_called() {
        let emitter = EventEmitter::new();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&hits);
        emitter.on(EventKind::Empty, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(emitter.emit(&begin("abc")), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_off_and_remove_all() {
        let emitter = EventEmitter::new();
        let first = emitter.on(EventKind::SearchBegin, |_| {});
        let _second = emitter.on(EventKind::SearchBegin, |_| {});

        assert!(emitter.off(EventKind::SearchBegin, first));
        assert!(!emitter.off(EventKind::SearchBegin, first));
        assert_eq!(emitter.listener_count(EventKind::SearchBegin), 1);

        emitter.remove_all(EventKind::SearchBegin);
        assert_eq!(emitter.listener_count(EventKind::SearchBegin), 0);
        assert_eq!(emitter.emit(&begin("abc")), 0);
    }

    #[test]
    fn test_listener_can_subscribe_during_emit() {
        let emitter = Arc::new(EventEmitter::new());
        let inner = Arc::clone(&emitter);
        emitter.on(EventKind::SearchBegin, move |_| {
            inner.on(EventKind::Empty, |_| {});
        });

        emitter.emit(&begin("abc"));
        assert_eq!(emitter.listener_count(EventKind::Empty), 1);
    }
}
