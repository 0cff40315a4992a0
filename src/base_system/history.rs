//! 最近访问的漫画记录（MRU），每次变更后整文件写回。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

use crate::download::models::PipelineError;

pub const DEFAULT_MAX_HISTORY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub url: String,
    pub title: String,
    /// RFC 3339 时间戳。
    pub last_accessed: String,
}

#[derive(Debug)]
pub struct HistoryLedger {
    path: PathBuf,
    max_entries: usize,
    entries: Vec<HistoryEntry>,
}

impl HistoryLedger {
    /// 读取记录文件；文件缺失或内容损坏时都从空记录开始，不会返回错误。
    pub fn load(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        let path = path.into();
        let max_entries = max_entries.max(1);
        let mut entries = read_entries(&path).unwrap_or_else(|err| {
            warn!(target: "history", path = %path.display(), error = %err, "history reset to empty");
            Vec::new()
        });
        entries.truncate(max_entries);
        debug!(target: "history", path = %path.display(), count = entries.len(), "history loaded");
        Self {
            path,
            max_entries,
            entries,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按编号（从 1 开始）取记录。
    pub fn entry_at(&self, one_based: usize) -> Option<&HistoryEntry> {
        one_based
            .checked_sub(1)
            .and_then(|idx| self.entries.get(idx))
    }

    /// 把该 url 移到最前面并立即写回文件。
    pub fn record_access(&mut self, url: &str, title: &str) {
        self.entries.retain(|e| e.url != url);
        self.entries.insert(
            0,
            HistoryEntry {
                url: url.to_string(),
                title: title.to_string(),
                last_accessed: now_rfc3339(),
            },
        );
        self.entries.truncate(self.max_entries);
        self.save();
    }

    /// 写入失败只记日志，内存中的记录在本次运行内仍然有效。
    pub fn save(&self) -> bool {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(err) = fs::create_dir_all(parent)
        {
            warn!(target: "history", path = %parent.display(), error = %err, "create history dir failed");
            return false;
        }

        let body = match serde_json::to_string_pretty(&self.entries) {
            Ok(body) => body,
            Err(err) => {
                warn!(target: "history", error = %err, "serialize history failed");
                return false;
            }
        };

        match fs::write(&self.path, body) {
            Ok(()) => true,
            Err(err) => {
                warn!(target: "history", path = %self.path.display(), error = %err, "write history failed");
                false
            }
        }
    }
}

fn read_entries(path: &Path) -> Result<Vec<HistoryEntry>, PipelineError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(PipelineError::LedgerCorruption(err.to_string())),
    };
    serde_json::from_str::<Vec<HistoryEntry>>(&raw)
        .map_err(|err| PipelineError::LedgerCorruption(err.to_string()))
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}
