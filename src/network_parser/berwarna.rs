//! One Piece 彩色版站点。
//!
//! 站点没有可用的目录页，章节列表按 `1..=latest` 生成；图片只取正文区域内的 jpg/png，
//! 排除站点 logo、横幅与广告图。

use std::sync::OnceLock;

use regex::Regex;

use crate::download::models::{Asset, ChapterRef};
use crate::download::source::AssetSource;

use super::html::{attr, first_by_class, first_element_inner, img_tags};
use super::network::WebClient;

pub const BERWARNA_TITLE: &str = "one-piece-berwarna-indo";

fn re_image_ext() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?i)\.(jpg|jpeg|png)$").unwrap())
}

fn re_excluded() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?i)logo|banner|iklan|ads|wp-content/themes").unwrap())
}

pub struct BerwarnaSource {
    web: WebClient,
    base_url: String,
    latest_chapter: u32,
}

impl BerwarnaSource {
    pub fn new(web: WebClient, base_url: &str, latest_chapter: u32) -> Self {
        Self {
            web,
            base_url: base_url.trim_end_matches('/').to_string(),
            latest_chapter,
        }
    }

    pub fn chapter_url(&self, number: u32) -> String {
        format!("{}/one-piece-berwarna-chapter-{}/", self.base_url, number)
    }
}

impl AssetSource for BerwarnaSource {
    fn resolve_title(&self, _title_ref: &str) -> String {
        BERWARNA_TITLE.to_string()
    }

    fn list_chapters(&self, _title_ref: &str) -> Vec<ChapterRef> {
        (1..=self.latest_chapter)
            .map(|n| ChapterRef::from_url(self.chapter_url(n)))
            .collect()
    }

    fn list_assets(&self, chapter: &ChapterRef) -> Vec<Asset> {
        let Some(html) = self.web.get_text(&chapter.url) else {
            return Vec::new();
        };
        parse_berwarna_images(&html)
    }
}

pub(crate) fn parse_berwarna_images(html: &str) -> Vec<Asset> {
    let Some(content) = first_by_class(html, "main-reading-area")
        .or_else(|| first_by_class(html, "reading-content"))
        .or_else(|| first_element_inner(html, "article", None))
    else {
        return Vec::new();
    };

    img_tags(content)
        .into_iter()
        .filter_map(|tag| {
            let src = attr(tag, "src")?;
            if !re_image_ext().is_match(&src) || re_excluded().is_match(&src) {
                return None;
            }
            Some(Asset {
                src,
                alt: attr(tag, "alt").unwrap_or_default(),
            })
        })
        .collect()
}
