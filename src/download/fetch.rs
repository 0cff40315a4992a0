//! HTTP 图片下载。

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CONNECTION, HeaderMap, HeaderValue, USER_AGENT};
use tempfile::NamedTempFile;
use tracing::debug;

use super::models::PipelineError;
use super::source::AssetFetcher;

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> anyhow::Result<Self> {
        // reqwest 未启用解压特性，请求原始编码，拿到的字节可直接落盘
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("image/*,*/*;q=0.8"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        if let Ok(ua) = HeaderValue::from_str(user_agent) {
            headers.insert(USER_AGENT, ua);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl AssetFetcher for HttpFetcher {
    /// 先写入同目录下的临时文件，完整后再改名，半截下载不会留在目标路径上。
    fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64, PipelineError> {
        let transfer = |reason: String| PipelineError::AssetTransfer {
            url: url.to_string(),
            reason,
        };

        if url.trim().is_empty() {
            return Err(transfer("empty url".to_string()));
        }

        let mut resp = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| transfer(e.to_string()))?;

        let dir = dest.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| PipelineError::io(dir, e))?;
        let written = resp
            .copy_to(tmp.as_file_mut())
            .map_err(|e| transfer(e.to_string()))?;
        if written == 0 {
            return Err(transfer("empty response body".to_string()));
        }
        tmp.as_file_mut()
            .flush()
            .map_err(|e| PipelineError::io(tmp.path(), e))?;
        tmp.persist(dest)
            .map_err(|e| PipelineError::io(dest, e.error))?;

        debug!(target: "engine", url, bytes = written, "asset downloaded");
        Ok(written)
    }
}
