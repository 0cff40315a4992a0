//! 续传规划：章节排序、下一章定位与下载范围选择。

use crate::base_system::chapter_key::{ChapterKey, normalize_chapter_input};

use super::models::ChapterRef;

/// 整理为按章节 key 升序。
///
/// 来源站点通常是"最新在前"，先整体反转再做稳定排序，相同 key 保持来源顺序。
pub fn order_chapters(mut chapters: Vec<ChapterRef>) -> Vec<ChapterRef> {
    if let (Some(first), Some(last)) = (chapters.first(), chapters.last())
        && first.key > last.key
    {
        chapters.reverse();
    }
    chapters.sort_by(|a, b| a.key.cmp(&b.key));
    chapters
}

/// 第一个 key 严格大于 `last_materialized` 的章节下标；全部已下载时为 `None`。
pub fn next_unprocessed_index(
    ordered: &[ChapterRef],
    last_materialized: Option<&ChapterKey>,
) -> Option<usize> {
    match last_materialized {
        None => (!ordered.is_empty()).then_some(0),
        Some(last) => ordered.iter().position(|ch| ch.key > *last),
    }
}

pub fn remaining_count(total: usize, start_index: usize) -> usize {
    total.saturating_sub(start_index)
}

/// 按用户输入的章节号线性查找（`35.1` 与 `35-1` 等价）。
pub fn find_chapter_index(ordered: &[ChapterRef], target: &str) -> Option<usize> {
    let wanted = normalize_chapter_input(target);
    if wanted.is_empty() {
        return None;
    }
    ordered.iter().position(|ch| ch.key.as_str() == wanted)
}

/// `[start, start + count)`，越过目录末尾时截断。
pub fn select_window(ordered: &[ChapterRef], start: usize, count: usize) -> &[ChapterRef] {
    if start >= ordered.len() {
        return &[];
    }
    let end = start.saturating_add(count).min(ordered.len());
    &ordered[start..end]
}
