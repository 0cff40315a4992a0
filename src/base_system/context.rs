//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成 `config.yml` 的字段元信息。启动时构造一次，
//! 之后以引用形式传给编排层与章节引擎。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::{ConfigSpec, FieldMeta};
use super::history::DEFAULT_MAX_HISTORY;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 放大工具配置
    #[serde(default = "default_normalizer_path")]
    pub normalizer_path: String,
    #[serde(default = "default_true")]
    pub enable_normalization: bool,
    #[serde(default = "default_noise_reduction")]
    pub noise_reduction: u8,
    #[serde(default = "default_scale_factor")]
    pub scale_factor: u8,
    #[serde(default = "default_min_image_size_kb")]
    pub min_image_size_kb: u64,
    #[serde(default = "default_max_image_size_kb")]
    pub max_image_size_kb: u64,

    // 路径配置
    #[serde(default)]
    pub save_path: String,
    #[serde(default = "default_history_file")]
    pub history_file: String,
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    // 网络配置
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    // 来源站点配置
    #[serde(default = "default_komiku_base_url")]
    pub komiku_base_url: String,
    #[serde(default = "default_berwarna_base_url")]
    pub berwarna_base_url: String,
    #[serde(default = "default_berwarna_latest_chapter")]
    pub berwarna_latest_chapter: u32,

    #[serde(skip)]
    data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            normalizer_path: default_normalizer_path(),
            enable_normalization: default_true(),
            noise_reduction: default_noise_reduction(),
            scale_factor: default_scale_factor(),
            min_image_size_kb: default_min_image_size_kb(),
            max_image_size_kb: default_max_image_size_kb(),
            save_path: String::new(),
            history_file: default_history_file(),
            max_history: default_max_history(),
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
            komiku_base_url: default_komiku_base_url(),
            berwarna_base_url: default_berwarna_base_url(),
            berwarna_latest_chapter: default_berwarna_latest_chapter(),
            data_dir: None,
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 15] = [
            FieldMeta {
                name: "normalizer_path",
                description: "图片放大工具（waifu2x-ncnn-vulkan 兼容命令行）路径",
            },
            FieldMeta {
                name: "enable_normalization",
                description: "是否调用放大工具处理体积较小的图片",
            },
            FieldMeta {
                name: "noise_reduction",
                description: "降噪等级（-n 参数）",
            },
            FieldMeta {
                name: "scale_factor",
                description: "放大倍数（-s 参数）",
            },
            FieldMeta {
                name: "min_image_size_kb",
                description: "原图超过该体积（KB）视为足够清晰，跳过放大",
            },
            FieldMeta {
                name: "max_image_size_kb",
                description: "放大结果小于该体积（KB）时重试一次放大",
            },
            FieldMeta {
                name: "save_path",
                description: "保存路径（留空则使用 数据目录/komik）",
            },
            FieldMeta {
                name: "history_file",
                description: "最近访问记录文件（相对路径基于数据目录）",
            },
            FieldMeta {
                name: "max_history",
                description: "最近访问记录最多保留条数",
            },
            FieldMeta {
                name: "request_timeout",
                description: "请求超时时间（秒）",
            },
            FieldMeta {
                name: "max_retries",
                description: "页面请求最大重试次数",
            },
            FieldMeta {
                name: "user_agent",
                description: "请求使用的 User-Agent",
            },
            FieldMeta {
                name: "komiku_base_url",
                description: "komiku 站点根地址（补全相对章节链接）",
            },
            FieldMeta {
                name: "berwarna_base_url",
                description: "One Piece 彩色版站点根地址",
            },
            FieldMeta {
                name: "berwarna_latest_chapter",
                description: "One Piece 彩色版最新章节号（目录按 1..N 生成）",
            },
        ];
        &FIELDS
    }

    fn validate(&self) -> Result<(), String> {
        if self.noise_reduction > 3 {
            return Err(format!(
                "noise_reduction 取值范围为 0-3，当前为 {}",
                self.noise_reduction
            ));
        }
        if self.scale_factor == 0 {
            return Err("scale_factor 必须大于 0".to_string());
        }
        if self.max_history == 0 {
            return Err("max_history 必须大于 0".to_string());
        }
        Ok(())
    }
}

impl Config {
    /// 记录数据目录，`history_file` 与默认保存目录都相对于它解析。
    pub fn with_data_dir(mut self, dir: Option<&Path>) -> Self {
        self.data_dir = dir.map(Path::to_path_buf);
        self
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn default_save_dir(&self) -> PathBuf {
        if self.save_path.trim().is_empty() {
            self.data_dir().join("komik")
        } else {
            PathBuf::from(&self.save_path)
        }
    }

    pub fn history_path(&self) -> PathBuf {
        let raw = Path::new(&self.history_file);
        if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            self.data_dir().join(raw)
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.max(1))
    }

    /// 超过该字节数的原图不再放大。
    pub fn large_enough_bytes(&self) -> u64 {
        self.min_image_size_kb.saturating_mul(1024)
    }

    /// 放大结果低于该字节数时重试一次。
    pub fn min_normalized_bytes(&self) -> u64 {
        self.max_image_size_kb.saturating_mul(1024)
    }
}

/// 把任意标题转成可用作目录名的字符串。
pub fn safe_fs_name(name: &str, replacement: &str, max_len: usize) -> String {
    let fallback = replacement.chars().next().unwrap_or('_');
    let mut cleaned: String = name
        .trim()
        .chars()
        .map(|ch| match ch {
            ':' | '"' | '<' | '>' | '/' | '\\' | '|' | '?' | '*' => fallback,
            c if (c as u32) < 32 => fallback,
            _ => ch,
        })
        .collect();

    while cleaned.ends_with(' ') || cleaned.ends_with('.') {
        cleaned.pop();
    }

    if cleaned.is_empty() {
        cleaned.push_str("unnamed");
    }

    const RESERVED: [&str; 22] = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    let upper = cleaned.to_uppercase();
    if RESERVED.contains(&upper.as_str()) {
        cleaned = format!("_{}", cleaned);
    }

    if cleaned.len() > max_len {
        // 避免在多字节 UTF-8 字符中间截断导致 panic
        let mut end = max_len;
        while !cleaned.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        cleaned.truncate(end);
        while cleaned.ends_with(' ') || cleaned.ends_with('.') {
            cleaned.pop();
        }
        if cleaned.is_empty() {
            cleaned.push_str("unnamed");
        }
    }

    cleaned
}

fn default_true() -> bool {
    true
}

fn default_normalizer_path() -> String {
    "waifu2x-ncnn-vulkan".to_string()
}

fn default_noise_reduction() -> u8 {
    2
}

fn default_scale_factor() -> u8 {
    2
}

fn default_min_image_size_kb() -> u64 {
    900
}

fn default_max_image_size_kb() -> u64 {
    1024
}

fn default_history_file() -> String {
    "history.json".to_string()
}

fn default_max_history() -> usize {
    DEFAULT_MAX_HISTORY
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36".to_string()
}

fn default_komiku_base_url() -> String {
    "https://komiku.id".to_string()
}

fn default_berwarna_base_url() -> String {
    "https://onepieceberwarna.com".to_string()
}

fn default_berwarna_latest_chapter() -> u32 {
    1200
}
