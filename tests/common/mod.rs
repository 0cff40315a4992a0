#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;

use komik_downloader::base_system::context::Config;
use komik_downloader::download::models::{Asset, ChapterRef, PipelineError};
use komik_downloader::download::source::{AssetFetcher, AssetSource, Normalizer};

pub const SMALL: usize = 200;
pub const LARGE: usize = 4096;

/// 阈值调小后的配置：原图 > 1KB 视为足够大，放大结果 < 2KB 触发重试。
pub fn test_config(save_root: &Path) -> Config {
    let mut config = Config::default();
    config.save_path = save_root.to_string_lossy().to_string();
    config.min_image_size_kb = 1;
    config.max_image_size_kb = 2;
    config
}

pub fn chapter_url(key: &str) -> String {
    format!("https://komiku.id/demo-chapter-{key}-bahasa-indonesia/")
}

pub fn asset_url(chapter: &str, index: usize) -> String {
    format!("https://img.example/{chapter}/{index}.jpg")
}

#[derive(Default)]
pub struct FakeSource {
    pub title: String,
    pub chapters: Vec<ChapterRef>,
    pub assets: HashMap<String, Vec<Asset>>,
    pub asset_lookups: Cell<usize>,
}

impl FakeSource {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }

    /// 按传入顺序登记章节，每章 `count` 张图。
    pub fn with_chapter(mut self, key: &str, count: usize) -> Self {
        let chapter = ChapterRef::from_url(chapter_url(key));
        let assets = (1..=count)
            .map(|i| Asset {
                src: asset_url(key, i),
                alt: format!("page {i}"),
            })
            .collect();
        self.assets.insert(chapter.url.clone(), assets);
        self.chapters.push(chapter);
        self
    }

    pub fn chapter(&self, key: &str) -> ChapterRef {
        self.chapters
            .iter()
            .find(|c| c.key.as_str() == key)
            .cloned()
            .unwrap()
    }
}

impl AssetSource for FakeSource {
    fn resolve_title(&self, _title_ref: &str) -> String {
        self.title.clone()
    }

    fn list_chapters(&self, _title_ref: &str) -> Vec<ChapterRef> {
        self.chapters.clone()
    }

    fn list_assets(&self, chapter: &ChapterRef) -> Vec<Asset> {
        self.asset_lookups.set(self.asset_lookups.get() + 1);
        self.assets.get(&chapter.url).cloned().unwrap_or_default()
    }
}

/// 按 url 写出固定大小的文件；`failing` 中的地址返回下载错误。
pub struct FakeFetcher {
    pub default_size: usize,
    pub sizes: HashMap<String, usize>,
    pub failing: RefCell<HashSet<String>>,
    pub calls: Cell<usize>,
}

impl FakeFetcher {
    pub fn new(default_size: usize) -> Self {
        Self {
            default_size,
            sizes: HashMap::new(),
            failing: RefCell::new(HashSet::new()),
            calls: Cell::new(0),
        }
    }

    pub fn fail(&self, url: &str) {
        self.failing.borrow_mut().insert(url.to_string());
    }

    pub fn heal(&self) {
        self.failing.borrow_mut().clear();
    }
}

impl AssetFetcher for FakeFetcher {
    fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64, PipelineError> {
        self.calls.set(self.calls.get() + 1);
        if self.failing.borrow().contains(url) {
            return Err(PipelineError::AssetTransfer {
                url: url.to_string(),
                reason: "connection reset".to_string(),
            });
        }
        let size = self.sizes.get(url).copied().unwrap_or(self.default_size);
        fs::write(dest, vec![7u8; size]).unwrap();
        Ok(size as u64)
    }
}

/// 依次使用 `outputs` 中的大小写出结果，用完后使用 `default_size`。
pub struct FakeNormalizer {
    pub default_size: usize,
    pub outputs: RefCell<VecDeque<usize>>,
    pub fail: Cell<bool>,
    /// 从第 n 次调用起失败（从 1 开始计）。
    pub fail_from_call: Cell<Option<usize>>,
    /// 失败前先写出的残缺字节数。
    pub partial_bytes: Cell<usize>,
    pub calls: Cell<usize>,
}

impl FakeNormalizer {
    pub fn new(default_size: usize) -> Self {
        Self {
            default_size,
            outputs: RefCell::new(VecDeque::new()),
            fail: Cell::new(false),
            fail_from_call: Cell::new(None),
            partial_bytes: Cell::new(0),
            calls: Cell::new(0),
        }
    }

    pub fn with_outputs(self, sizes: &[usize]) -> Self {
        self.outputs.borrow_mut().extend(sizes.iter().copied());
        self
    }
}

impl Normalizer for FakeNormalizer {
    fn normalize(&self, input: &Path, output: &Path) -> Result<(), PipelineError> {
        let call = self.calls.get() + 1;
        self.calls.set(call);
        assert!(input.exists(), "normalizer input must exist");
        let failing = self.fail.get() || self.fail_from_call.get().is_some_and(|n| call >= n);
        if failing {
            let partial = self.partial_bytes.get();
            if partial > 0 {
                fs::write(output, vec![3u8; partial]).unwrap();
            }
            return Err(PipelineError::Normalization {
                input: input.to_path_buf(),
                reason: "exit status: 255".to_string(),
            });
        }
        let size = self
            .outputs
            .borrow_mut()
            .pop_front()
            .unwrap_or(self.default_size);
        fs::write(output, vec![1u8; size]).unwrap();
        Ok(())
    }
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|rd| {
            rd.flatten()
                .filter_map(|e| e.file_name().to_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
