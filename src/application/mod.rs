pub mod config;
pub mod finder;

pub use config::{Config, FinderOptions, VolumeConfig, DEFAULT_MIN_SEARCH_LENGTH};
pub use finder::{Finder, SearchHandle, SearchOutcome, SessionState, SessionSummary};
