pub mod display;

pub use display::{format_duration, format_file_size, render_event, SearchSummary};
