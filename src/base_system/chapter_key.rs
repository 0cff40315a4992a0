//! 章节标识解析与排序。
//!
//! 章节链接（如 `.../one-piece-chapter-35-1-bahasa-indonesia/`）统一解析为 `ChapterKey`，
//! 同一个 key 同时用于排序、比较与本地目录命名。

use std::cmp::Ordering;
use std::fmt;

const CHAPTER_MARKER: &str = "chapter-";
const LOCALE_SUFFIXES: [&str; 1] = ["-bahasa-indonesia"];
const UNKNOWN_KEY: &str = "unknown";

/// 可按十进制数值比较的章节 key（例如 `"35"`、`"35-1"`）。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChapterKey(String);

impl ChapterKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_KEY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_KEY
    }

    /// 第一个 `-` 视为小数点后的数值，无法解析时为 `None`。
    pub fn magnitude(&self) -> Option<f64> {
        key_magnitude(&self.0)
    }
}

impl fmt::Display for ChapterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialOrd for ChapterKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChapterKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_chapter_keys(&self.0, &other.0)
    }
}

/// 从章节链接中提取章节 key，永不失败。
///
/// 取 `chapter-` 之后、语言后缀与下一个 `/` 之前的片段；
/// 若片段被 `-` 分成两段以上（部分站点会附带版本号之类的后缀），只保留第一段。
pub fn parse_chapter_key(raw: &str) -> ChapterKey {
    let Some(after_marker) = raw.split(CHAPTER_MARKER).nth(1) else {
        return ChapterKey::unknown();
    };

    let mut segment = after_marker;
    for suffix in LOCALE_SUFFIXES {
        if let Some((head, _)) = segment.split_once(suffix) {
            segment = head;
        }
    }
    let segment = segment.split('/').next().unwrap_or_default();

    let parts: Vec<&str> = segment.split('-').collect();
    let key = if parts.len() > 2 { parts[0] } else { segment };

    if key.is_empty() || !key.chars().any(|c| c.is_ascii_digit()) {
        return ChapterKey::unknown();
    }
    ChapterKey::new(key)
}

/// 按数值大小比较两个章节 key，`"35" < "35-1" < "36"`。
///
/// 无数值的 key 排在所有数值 key 之后；数值相同时按字符串比较，保证全序。
pub fn compare_chapter_keys(a: &str, b: &str) -> Ordering {
    match (key_magnitude(a), key_magnitude(b)) {
        (Some(x), Some(y)) => x
            .partial_cmp(&y)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// 用户输入的章节（`35.1`、`chapter-35.1`、`35-1`）转成目录使用的 key 形式。
pub fn normalize_chapter_input(input: &str) -> String {
    let trimmed = input.trim();
    let without_marker = trimmed.strip_prefix(CHAPTER_MARKER).unwrap_or(trimmed);
    without_marker.trim().replacen('.', "-", 1)
}

/// 数字感知的自然排序（`2` < `10`），用于标题目录与图片文件名列表。
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = chunks(a);
    let mut right = chunks(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (is_digits(x), is_digits(y)) {
                    (true, true) => cmp_digit_runs(x, y),
                    _ => x.to_lowercase().cmp(&y.to_lowercase()),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn key_magnitude(key: &str) -> Option<f64> {
    leading_decimal(&key.replacen('-', ".", 1))
}

// 与宽松的 parseFloat 一致：只读取开头的十进制前缀。
fn leading_decimal(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let mut end = 0;
    let mut seen_dot = false;
    let mut seen_digit = false;
    for (idx, ch) in s.char_indices() {
        match ch {
            '0'..='9' => {
                seen_digit = true;
                end = idx + 1;
            }
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
    }
    if !seen_digit {
        return None;
    }
    s[..end].parse::<f64>().ok()
}

fn chunks(s: &str) -> impl Iterator<Item = &str> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let digit = first.is_ascii_digit();
        let end = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(end);
        rest = tail;
        Some(head)
    })
}

fn is_digits(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_digit())
}

fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    let a_trim = a.trim_start_matches('0');
    let b_trim = b.trim_start_matches('0');
    a_trim
        .len()
        .cmp(&b_trim.len())
        .then_with(|| a_trim.cmp(b_trim))
        .then_with(|| a.len().cmp(&b.len()))
}
