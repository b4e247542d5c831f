pub mod error_logging;
pub mod local_storage;
pub mod logging;
pub mod memory_storage;

pub use error_logging::{ErrorLogger, ErrorType};
pub use local_storage::{LocalStorageProvider, LocalVolume};
pub use logging::{Logger, LoggerTrait};
pub use memory_storage::{MemoryStorageProvider, MemoryVolume};
