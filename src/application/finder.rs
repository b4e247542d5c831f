// 搜索协调器
//
// 每次 `search` 创建一个独立的会话：每个存储卷由一个工作线程推进游标，
// 结果通过通道发送给该会话唯一的分发线程，由它按收到的顺序依次调用监听器。
// 新的 `search` 会使旧会话失效，旧会话尚未分发的事件会被丢弃。

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use anyhow::Result;
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};

use crate::application::config::FinderOptions;
use crate::domain::{
    split_path, EventEmitter, EventKind, FileInfo, FileRecord, FinderEvent, ListenerId,
    NameMatcher, StorageError, StorageProvider, StorageVolume,
};
use crate::infrastructure::{Logger, LoggerTrait};

/// 最近一次会话的状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// 规范化后的搜索关键字
    pub search_key: String,
    /// 会话内累计的匹配数（跨存储卷累计）
    pub match_count: u64,
    /// 已完成遍历的存储卷数
    pub completed_volumes: usize,
}

/// 一次完整会话的汇总
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub needle: String,
    pub total_matches: u64,
    pub completed_volumes: usize,
    pub failed_volumes: usize,
}

/// 搜索结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// 搜索字符串过短或只有空白
    TooShort,
    /// 没有可用的存储卷
    NoStorages,
    /// 所有存储卷都已完成或出错
    Finished(SessionSummary),
    /// 会话被取消或被新的搜索取代
    Cancelled,
}

/// 单次搜索会话的上下文，由该会话的工作线程和分发线程共享
struct Session {
    id: u64,
    needle: String,
    matcher: NameMatcher,
    active: Arc<AtomicU64>,
    cancelled: AtomicBool,
    wake: Sender<()>,
}

impl Session {
    fn is_live(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst) && self.active.load(Ordering::SeqCst) == self.id
    }

    /// 标记取消并唤醒分发线程，不等待仍卡在游标里的工作线程
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let _ = self.wake.try_send(());
    }
}

thread_local! {
    static HELD_GATES: RefCell<Vec<usize>> = RefCell::new(Vec::new());
}

/// 分发闸门：切换会话与分发事件互斥
///
/// 在持有闸门的线程上（即监听器内部）再次进入时直接执行，
/// 因此监听器可以调用 `search` 而不会死锁。
#[derive(Default)]
struct DeliveryGate {
    lock: Mutex<()>,
}

impl DeliveryGate {
    fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let key = self as *const Self as usize;
        if HELD_GATES.with(|held| held.borrow().contains(&key)) {
            return f();
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        HELD_GATES.with(|held| held.borrow_mut().push(key));
        let _release = GateRelease(key);
        f()
    }
}

struct GateRelease(usize);

impl Drop for GateRelease {
    fn drop(&mut self) {
        HELD_GATES.with(|held| held.borrow_mut().retain(|key| *key != self.0));
    }
}

/// 工作线程发往分发线程的消息
enum VolumeMessage {
    Begin {
        storage: String,
    },
    Found {
        storage: String,
        file: FileRecord,
        info: FileInfo,
    },
    Complete {
        storage: String,
    },
    Failed {
        storage: String,
        detail: StorageError,
    },
    Abandoned,
}

/// 搜索句柄，可以取消会话或等待所有存储卷结束
pub struct SearchHandle {
    session: Option<Arc<Session>>,
    dispatcher: Option<JoinHandle<SearchOutcome>>,
    settled: Option<SearchOutcome>,
}

impl SearchHandle {
    fn settled(outcome: SearchOutcome) -> Self {
        Self {
            session: None,
            dispatcher: None,
            settled: Some(outcome),
        }
    }

    /// 会话编号，校验失败时为 `None`
    pub fn session_id(&self) -> Option<u64> {
        self.session.as_ref().map(|session| session.id)
    }

    /// 取消会话：分发线程立即结束，未分发的事件被丢弃
    pub fn cancel(&self) {
        if let Some(session) = &self.session {
            session.cancel();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.dispatcher
            .as_ref()
            .map_or(true, |handle| handle.is_finished())
    }

    /// 等待会话结束
    pub fn wait(self) -> SearchOutcome {
        if let Some(outcome) = self.settled {
            return outcome;
        }

        match self.dispatcher {
            Some(handle) => handle.join().unwrap_or(SearchOutcome::Cancelled),
            None => SearchOutcome::Cancelled,
        }
    }
}

/// 存储卷文件搜索器
pub struct Finder {
    options: FinderOptions,
    storages: Vec<Arc<dyn StorageVolume>>,
    events: Arc<EventEmitter>,
    logger: Arc<dyn LoggerTrait>,
    state: Arc<Mutex<SessionState>>,
    active_session: Arc<AtomicU64>,
    current: Mutex<Option<Arc<Session>>>,
    gate: Arc<DeliveryGate>,
}

impl Finder {
    /// 创建搜索器，调试模式下会创建调试日志文件
    pub fn new(options: FinderOptions, provider: &dyn StorageProvider) -> Result<Self> {
        let logger = Arc::new(Logger::new(options.debug_mode)?);
        Ok(Self::with_logger(options, provider, logger))
    }

    /// 使用指定的日志记录器创建搜索器
    ///
    /// 存储卷在此时解析；解析结果为空不是错误，会在搜索时以 `empty` 事件报告。
    pub fn with_logger(
        options: FinderOptions,
        provider: &dyn StorageProvider,
        logger: Arc<dyn LoggerTrait>,
    ) -> Self {
        let options = options.normalized();
        let storages = provider.resolve(&options.storage_type);

        let finder = Self {
            options,
            storages,
            events: Arc::new(EventEmitter::new()),
            logger,
            state: Arc::new(Mutex::new(SessionState::default())),
            active_session: Arc::new(AtomicU64::new(0)),
            current: Mutex::new(None),
            gate: Arc::new(DeliveryGate::default()),
        };
        finder.log(&format!(
            "搜索器已创建 - 类型: {}, 存储卷: {}, 最小长度: {}",
            finder.options.storage_type,
            finder.storages.len(),
            finder.options.min_search_length
        ));
        finder
    }

    pub fn options(&self) -> &FinderOptions {
        &self.options
    }

    /// 已解析的存储卷数量
    pub fn storage_count(&self) -> usize {
        self.storages.len()
    }

    pub fn state(&self) -> SessionState {
        self.state
            .lock()
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    pub fn search_key(&self) -> String {
        self.state().search_key
    }

    pub fn match_count(&self) -> u64 {
        self.state().match_count
    }

    pub fn completed_volumes(&self) -> usize {
        self.state().completed_volumes
    }

    /// 订阅事件
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&FinderEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, listener)
    }

    /// 取消订阅
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.events.off(kind, id)
    }

    pub fn remove_all(&self, kind: EventKind) {
        self.events.remove_all(kind)
    }

    /// 重置会话状态
    pub fn reset(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = SessionState::default();
        }
    }

    /// 开始搜索
    ///
    /// 立即返回；所有结果和错误都以事件形式报告。
    /// 会话只在两次事件分发之间切换，旧会话不会在新会话开始后再发出事件。
    pub fn search(&self, needle: &str) -> SearchHandle {
        self.gate.run(|| self.start_session(needle))
    }

    fn start_session(&self, needle: &str) -> SearchHandle {
        // 先让旧会话失效，再重置状态
        let session_id = self.active_session.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = self.current.lock().ok().and_then(|mut current| current.take()) {
            previous.cancel();
        }
        self.reset();

        let matcher = NameMatcher::new(needle, self.options.case_sensitive, self.options.hidden);
        if let Ok(mut state) = self.state.lock() {
            state.search_key = matcher.search_key().to_string();
        }

        let min_length = self.options.min_search_length;
        if needle.chars().count() < min_length {
            self.log(&format!("搜索已取消，搜索字符串少于 {} 个字符", min_length));
            self.emit(FinderEvent::SearchCancelled {
                message: format!("搜索字符串至少需要 {} 个字符", min_length),
            });
            return SearchHandle::settled(SearchOutcome::TooShort);
        }

        // 空关键字会命中所有文件
        if matcher.search_key().is_empty() {
            self.log("搜索已取消，搜索字符串只有空白");
            self.emit(FinderEvent::SearchCancelled {
                message: "搜索字符串不能只包含空白".to_string(),
            });
            return SearchHandle::settled(SearchOutcome::TooShort);
        }

        if self.storages.is_empty() {
            self.emit(FinderEvent::Empty {
                needle: needle.to_string(),
            });
            return SearchHandle::settled(SearchOutcome::NoStorages);
        }

        self.emit(FinderEvent::SearchBegin {
            needle: needle.to_string(),
        });

        let (wake_tx, wake_rx) = bounded::<()>(1);
        let session = Arc::new(Session {
            id: session_id,
            needle: needle.to_string(),
            matcher,
            active: Arc::clone(&self.active_session),
            cancelled: AtomicBool::new(false),
            wake: wake_tx,
        });
        if let Ok(mut current) = self.current.lock() {
            *current = Some(Arc::clone(&session));
        }

        let (tx, rx) = unbounded::<VolumeMessage>();
        for storage in &self.storages {
            spawn_volume_worker(Arc::clone(&session), Arc::clone(storage), tx.clone());
        }
        drop(tx);

        let dispatch = Dispatcher {
            session: Arc::clone(&session),
            events: Arc::clone(&self.events),
            logger: Arc::clone(&self.logger),
            state: Arc::clone(&self.state),
            gate: Arc::clone(&self.gate),
            volumes: self.storages.len(),
        };

        let spawned = thread::Builder::new()
            .name(format!("finder-dispatch-{}", session_id))
            .spawn(move || dispatch.run(rx, wake_rx));

        match spawned {
            Ok(handle) => SearchHandle {
                session: Some(session),
                dispatcher: Some(handle),
                settled: None,
            },
            Err(err) => {
                self.log(&format!("无法启动分发线程: {}", err));
                session.cancel();
                SearchHandle::settled(SearchOutcome::Cancelled)
            }
        }
    }

    fn emit(&self, event: FinderEvent) {
        if self.logger.is_enabled() {
            let _ = self.logger.log_event(&event);
        }
        self.events.emit(&event);
    }

    fn log(&self, message: &str) {
        if self.logger.is_enabled() {
            let _ = self.logger.log_message(message);
        }
    }
}

/// 为单个存储卷启动工作线程
fn spawn_volume_worker(
    session: Arc<Session>,
    storage: Arc<dyn StorageVolume>,
    tx: Sender<VolumeMessage>,
) {
    let name = storage.name().to_string();
    let fallback_tx = tx.clone();

    let spawned = thread::Builder::new()
        .name(format!("finder-volume-{}", name))
        .spawn(move || drive_volume(&session, storage.as_ref(), &tx));

    if let Err(err) = spawned {
        let _ = fallback_tx.send(VolumeMessage::Begin {
            storage: name.clone(),
        });
        let _ = fallback_tx.send(VolumeMessage::Failed {
            storage: name,
            detail: StorageError::Other(format!("无法启动遍历线程: {}", err)),
        });
    }
}

/// 推进存储卷游标直到结束、出错或会话失效
fn drive_volume(session: &Session, storage: &dyn StorageVolume, tx: &Sender<VolumeMessage>) {
    let name = storage.name().to_string();

    if tx
        .send(VolumeMessage::Begin {
            storage: name.clone(),
        })
        .is_err()
    {
        return;
    }

    let mut cursor = match storage.enumerate(session.matcher.include_hidden()) {
        Ok(cursor) => cursor,
        Err(detail) => {
            let _ = tx.send(VolumeMessage::Failed {
                storage: name,
                detail,
            });
            return;
        }
    };

    loop {
        if !session.is_live() {
            let _ = tx.send(VolumeMessage::Abandoned);
            return;
        }

        match cursor.advance() {
            Ok(Some(file)) => {
                let info = split_path(&file.name);
                if !session.matcher.is_match(&info.name) {
                    continue;
                }

                let message = VolumeMessage::Found {
                    storage: name.clone(),
                    file,
                    info,
                };
                if tx.send(message).is_err() {
                    return;
                }
            }
            Ok(None) => {
                let _ = tx.send(VolumeMessage::Complete { storage: name });
                return;
            }
            Err(detail) => {
                let _ = tx.send(VolumeMessage::Failed {
                    storage: name,
                    detail,
                });
                return;
            }
        }
    }
}

/// 分发线程每一步等到的结果
enum Step {
    Message(VolumeMessage),
    Drained,
    Woken,
}

#[derive(Default)]
struct Tally {
    matches: u64,
    completed: usize,
    failed: usize,
}

/// 会话的分发线程：唯一调用监听器并统计计数的地方
struct Dispatcher {
    session: Arc<Session>,
    events: Arc<EventEmitter>,
    logger: Arc<dyn LoggerTrait>,
    state: Arc<Mutex<SessionState>>,
    gate: Arc<DeliveryGate>,
    volumes: usize,
}

impl Dispatcher {
    fn run(self, rx: Receiver<VolumeMessage>, wake: Receiver<()>) -> SearchOutcome {
        let needle = self.session.needle.clone();
        let mut tally = Tally::default();
        let mut live = true;

        // 所有工作线程退出后通道关闭；取消或被取代时立即返回，
        // 丢弃接收端后仍在运行的工作线程会在下一次发送时退出
        while live {
            let step = select! {
                recv(rx) -> message => message.map_or(Step::Drained, Step::Message),
                recv(wake) -> _ => Step::Woken,
            };

            live = match step {
                Step::Message(message) => self.handle(message, &needle, &mut tally),
                Step::Drained => break,
                Step::Woken => false,
            };
        }

        let finished = live
            && tally.completed + tally.failed == self.volumes
            && self.gate.run(|| {
                if !self.session.is_live() {
                    return false;
                }
                self.deliver(FinderEvent::SearchFinished {
                    needle: needle.clone(),
                    total_matches: tally.matches,
                    completed: tally.completed,
                    failed: tally.failed,
                });
                true
            });

        if !finished {
            self.log(&format!("会话 {} 已取消", self.session.id));
            return SearchOutcome::Cancelled;
        }

        SearchOutcome::Finished(SessionSummary {
            needle,
            total_matches: tally.matches,
            completed_volumes: tally.completed,
            failed_volumes: tally.failed,
        })
    }

    /// 在闸门内检查会话并分发一条消息，会话已失效时返回 `false`
    fn handle(&self, message: VolumeMessage, needle: &str, tally: &mut Tally) -> bool {
        self.gate.run(|| {
            if !self.session.is_live() {
                return false;
            }

            match message {
                VolumeMessage::Begin { storage } => {
                    self.deliver(FinderEvent::StorageSearchBegin {
                        storage,
                        needle: needle.to_string(),
                    });
                }
                VolumeMessage::Found {
                    storage,
                    file,
                    info,
                } => {
                    tally.matches += 1;
                    let matches = tally.matches;
                    self.update_state(|state| state.match_count = matches);
                    self.deliver(FinderEvent::FileFound {
                        file,
                        info,
                        storage,
                    });
                }
                VolumeMessage::Complete { storage } => {
                    tally.completed += 1;
                    let completed = tally.completed;
                    self.update_state(|state| state.completed_volumes = completed);
                    self.deliver(FinderEvent::SearchComplete {
                        storage,
                        needle: needle.to_string(),
                        match_count: tally.matches,
                    });
                }
                VolumeMessage::Failed { storage, detail } => {
                    tally.failed += 1;
                    self.deliver(FinderEvent::Error {
                        message: format!("访问存储设备 '{}' 时出错", storage),
                        detail,
                        storage,
                    });
                }
                VolumeMessage::Abandoned => return false,
            }
            true
        })
    }

    fn deliver(&self, event: FinderEvent) {
        if self.logger.is_enabled() {
            let _ = self.logger.log_event(&event);
        }
        self.events.emit(&event);
    }

    fn update_state<F: FnOnce(&mut SessionState)>(&self, update: F) {
        if let Ok(mut state) = self.state.lock() {
            update(&mut state);
        }
    }

    fn log(&self, message: &str) {
        if self.logger.is_enabled() {
            let _ = self.logger.log_message(message);
        }
    }
}
