pub mod chapter_key;
pub mod config;
pub mod context;
pub mod history;
pub mod logging;
