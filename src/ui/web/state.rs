use std::path::PathBuf;
use std::sync::Arc;

use crate::base_system::context::Config;

/// 只读服务共享状态：下载根目录与最近访问记录文件。
#[derive(Clone, Debug)]
pub struct AppState {
    pub(crate) library_root: Arc<PathBuf>,
    pub(crate) history_path: Arc<PathBuf>,
    pub(crate) max_history: usize,
}

impl AppState {
    pub fn new(library_root: PathBuf, history_path: PathBuf, max_history: usize) -> Self {
        Self {
            library_root: Arc::new(library_root),
            history_path: Arc::new(history_path),
            max_history,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.default_save_dir(),
            config.history_path(),
            config.max_history,
        )
    }
}
