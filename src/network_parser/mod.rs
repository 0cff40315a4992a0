pub mod berwarna;
pub(crate) mod html;
pub mod komiku;
pub mod network;

use crate::base_system::context::Config;
use crate::download::source::AssetSource;

use self::berwarna::BerwarnaSource;
use self::komiku::KomikuSource;
use self::network::{WebClient, WebClientConfig};

/// 按标题地址选择来源实现：彩色版站点走 `BerwarnaSource`，其余按 komiku 处理。
pub fn source_for_url(config: &Config, url: &str) -> anyhow::Result<Box<dyn AssetSource>> {
    let web = WebClient::new(WebClientConfig::from_config(config))?;
    if is_berwarna_url(config, url) {
        Ok(Box::new(BerwarnaSource::new(
            web,
            &config.berwarna_base_url,
            config.berwarna_latest_chapter,
        )))
    } else {
        Ok(Box::new(KomikuSource::new(web, &config.komiku_base_url)))
    }
}

pub fn is_berwarna_url(config: &Config, url: &str) -> bool {
    let base = config.berwarna_base_url.trim_end_matches('/');
    url.contains("onepieceberwarna") || (!base.is_empty() && url.starts_with(base))
}
