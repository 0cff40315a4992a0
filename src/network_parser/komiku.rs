//! komiku 站点：章节目录来自 `td.judulseries a`，图片来自 `img[itemprop="image"]`。

use tracing::{debug, warn};

use crate::download::models::{Asset, ChapterRef};
use crate::download::source::AssetSource;

use super::html::{anchor_tags, attr, element_inner, img_tags};
use super::network::WebClient;

const UNKNOWN_TITLE: &str = "unknown_comic";

pub struct KomikuSource {
    web: WebClient,
    base_url: String,
}

impl KomikuSource {
    pub fn new(web: WebClient, base_url: &str) -> Self {
        Self {
            web,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn absolute(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else if href.starts_with('/') {
            format!("{}{}", self.base_url, href)
        } else {
            format!("{}/{}", self.base_url, href)
        }
    }
}

impl AssetSource for KomikuSource {
    fn resolve_title(&self, title_ref: &str) -> String {
        title_slug(title_ref)
    }

    fn list_chapters(&self, title_ref: &str) -> Vec<ChapterRef> {
        let Some(html) = self.web.get_text(title_ref) else {
            warn!("获取章节目录失败: {}", title_ref);
            return Vec::new();
        };

        let chapters: Vec<ChapterRef> = element_inner(&html, "td", Some("judulseries"))
            .into_iter()
            .flat_map(anchor_tags)
            .filter_map(|tag| attr(tag, "href"))
            .filter(|href| !href.trim().is_empty())
            .map(|href| ChapterRef::from_url(self.absolute(href.trim())))
            .rev()
            .collect();
        debug!("komiku 章节目录: {} 章", chapters.len());
        chapters
    }

    fn list_assets(&self, chapter: &ChapterRef) -> Vec<Asset> {
        let Some(html) = self.web.get_text(&chapter.url) else {
            return Vec::new();
        };
        parse_komiku_images(&html)
    }
}

/// URL 中 `manga/` 之后的第一段。
pub fn title_slug(url: &str) -> String {
    url.split("manga/")
        .nth(1)
        .and_then(|rest| rest.split('/').next())
        .filter(|slug| !slug.is_empty())
        .unwrap_or(UNKNOWN_TITLE)
        .to_string()
}

pub(crate) fn parse_komiku_images(html: &str) -> Vec<Asset> {
    img_tags(html)
        .into_iter()
        .filter(|tag| attr(tag, "itemprop").is_some_and(|v| v == "image"))
        .filter_map(|tag| {
            let src = attr(tag, "src")?;
            if src.is_empty() {
                return None;
            }
            Some(Asset {
                src,
                alt: attr(tag, "alt").unwrap_or_default(),
            })
        })
        .collect()
}
