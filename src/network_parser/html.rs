//! 基于正则的轻量 HTML 提取工具。
//!
//! 只覆盖来源站点需要的几种选择器：按标签 + class 取元素内容、取 `<img>` / `<a>` 标签属性。

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

fn re_img_tag() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r#"(?is)<img\b[^>]*?>"#).unwrap())
}

fn re_anchor_tag() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r#"(?is)<a\b[^>]*?>"#).unwrap())
}

fn re_attr() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r#"(?is)([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
            .unwrap()
    })
}

pub(crate) fn unescape_basic_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }
    Cow::Owned(
        s.replace("&quot;", "\"")
            .replace("&#34;", "\"")
            .replace("&#39;", "'")
            .replace("&#x27;", "'")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&"),
    )
}

/// 读取标签上的属性值（属性名不区分大小写），并解码常见实体。
pub(crate) fn attr(tag: &str, name: &str) -> Option<String> {
    re_attr().captures_iter(tag).find_map(|cap| {
        let key = cap.get(1)?.as_str();
        if !key.eq_ignore_ascii_case(name) {
            return None;
        }
        let value = cap.get(2).or(cap.get(3)).or(cap.get(4))?.as_str();
        Some(unescape_basic_entities(value).into_owned())
    })
}

fn has_class(tag: &str, class: &str) -> bool {
    attr(tag, "class")
        .map(|v| v.split_whitespace().any(|c| c == class))
        .unwrap_or(false)
}

pub(crate) fn img_tags(html: &str) -> Vec<&str> {
    re_img_tag().find_iter(html).map(|m| m.as_str()).collect()
}

pub(crate) fn anchor_tags(html: &str) -> Vec<&str> {
    re_anchor_tag().find_iter(html).map(|m| m.as_str()).collect()
}

/// 取所有 `<tag ...>` 元素（可选 class 过滤）的内部 HTML，按出现顺序。
///
/// 同名标签嵌套时按层级匹配闭合标签；缺少闭合标签的元素取到文档末尾。
pub(crate) fn element_inner<'a>(html: &'a str, tag: &str, class: Option<&str>) -> Vec<&'a str> {
    let lower = html.to_ascii_lowercase();
    let open_pat = format!("<{}", tag.to_ascii_lowercase());
    let close_pat = format!("</{}", tag.to_ascii_lowercase());

    let mut out = Vec::new();
    let mut cursor = 0;
    while let Some(rel) = lower[cursor..].find(&open_pat) {
        let start = cursor + rel;
        let after_name = start + open_pat.len();
        cursor = after_name;
        if !is_tag_boundary(&lower, after_name) {
            continue;
        }
        let Some(gt) = lower[start..].find('>') else {
            break;
        };
        let open_end = start + gt + 1;
        let open_tag = &html[start..open_end];
        if let Some(class) = class
            && !has_class(open_tag, class)
        {
            continue;
        }

        let inner_end = find_matching_close(&lower, open_end, &open_pat, &close_pat);
        out.push(&html[open_end..inner_end]);
    }
    out
}

/// 第一个匹配元素的内部 HTML。
pub(crate) fn first_element_inner<'a>(
    html: &'a str,
    tag: &str,
    class: Option<&str>,
) -> Option<&'a str> {
    element_inner(html, tag, class).into_iter().next()
}

/// 任意标签上带某个 class 的第一个元素（等价于 `.class` 选择器）。
pub(crate) fn first_by_class<'a>(html: &'a str, class: &str) -> Option<&'a str> {
    const CANDIDATES: [&str; 5] = ["div", "section", "main", "article", "td"];
    CANDIDATES
        .iter()
        .filter_map(|tag| {
            let inner = first_element_inner(html, tag, Some(class))?;
            let offset = inner.as_ptr() as usize - html.as_ptr() as usize;
            Some((offset, inner))
        })
        .min_by_key(|(offset, _)| *offset)
        .map(|(_, inner)| inner)
}

fn is_tag_boundary(lower: &str, idx: usize) -> bool {
    match lower.as_bytes().get(idx) {
        None => false,
        Some(b) => b.is_ascii_whitespace() || *b == b'>' || *b == b'/',
    }
}

fn find_tag(lower: &str, from: usize, pat: &str) -> Option<usize> {
    let mut i = from;
    while let Some(rel) = lower[i..].find(pat) {
        let pos = i + rel;
        if is_tag_boundary(lower, pos + pat.len()) {
            return Some(pos);
        }
        i = pos + pat.len();
    }
    None
}

fn find_matching_close(lower: &str, from: usize, open_pat: &str, close_pat: &str) -> usize {
    let mut depth = 1usize;
    let mut i = from;
    loop {
        let next_open = find_tag(lower, i, open_pat);
        let Some(next_close) = find_tag(lower, i, close_pat) else {
            return lower.len();
        };
        match next_open {
            Some(open) if open < next_close => {
                depth += 1;
                i = open + open_pat.len();
            }
            _ => {
                depth -= 1;
                if depth == 0 {
                    return next_close;
                }
                i = next_close + close_pat.len();
            }
        }
    }
}
