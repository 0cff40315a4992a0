//! 页面请求客户端：统一超时、User-Agent 与失败重试。
//!
//! 来源站点的所有 HTML 页面都经由这里获取；失败只记日志并返回 `None`，
//! 由调用方把它当作"没有内容"处理。

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CONNECTION, HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, error, warn};

use crate::base_system::context::Config;

#[derive(Debug, Clone)]
pub struct WebClientConfig {
    pub request_timeout: Duration,
    pub max_retries: usize,
    pub user_agent: String,
}

impl WebClientConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            max_retries: config.max_retries.max(1) as usize,
            user_agent: config.user_agent.clone(),
        }
    }
}

impl Default for WebClientConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct WebClient {
    client: Client,
    config: WebClientConfig,
}

impl WebClient {
    pub fn new(config: WebClientConfig) -> anyhow::Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        default_headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        let client = Client::builder()
            .default_headers(default_headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.config.user_agent)
                .unwrap_or(HeaderValue::from_static("Mozilla/5.0")),
        );
        headers
    }

    /// 获取页面文本。404 不重试；其余失败按指数退避重试 `max_retries` 次。
    pub fn get_text(&self, url: &str) -> Option<String> {
        let retries = self.config.max_retries.max(1);
        let mut backoff = 0.6f64;
        let mut last_error: Option<String> = None;

        for attempt in 1..=retries {
            if attempt == 1 {
                debug!("请求页面: {}", url);
            } else {
                debug!("重试第 {} 次请求页面: {}", attempt, url);
            }

            let resp = match self.client.get(url).headers(self.get_headers()).send() {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(e.to_string());
                    error!("请求页面失败: {}", e);
                    sleep_backoff(attempt, retries, &mut backoff, 0.3);
                    continue;
                }
            };

            if resp.status().as_u16() == 404 {
                warn!("页面不存在: {}", url);
                return None;
            }

            let resp = match resp.error_for_status() {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(e.to_string());
                    error!("请求页面失败: {}", e);
                    sleep_backoff(attempt, retries, &mut backoff, 0.3);
                    continue;
                }
            };

            match resp.text() {
                Ok(text) => return Some(text),
                Err(e) => {
                    last_error = Some(e.to_string());
                    error!("读取页面内容失败: {}", e);
                    sleep_backoff(attempt, retries, &mut backoff, 0.3);
                }
            }
        }

        warn!("重试仍失败: {} ({:?})", url, last_error);
        None
    }
}

fn sleep_backoff(attempt: usize, retries: usize, backoff: &mut f64, jitter_max: f64) {
    if attempt >= retries {
        return;
    }
    let jitter = jitter_seconds(jitter_max);
    let sleep_s = (*backoff + jitter).min(3.0);
    std::thread::sleep(Duration::from_millis((sleep_s * 1000.0) as u64));
    *backoff = (*backoff * 2.0).min(3.0);
}

fn jitter_seconds(max: f64) -> f64 {
    if max <= 0.0 {
        return 0.0;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    let bucket = (nanos % 10_000) as f64 / 10_000.0; // [0,1)
    bucket * max
}
