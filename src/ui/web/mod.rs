//! 只读 Web 服务：浏览已下载的漫画。

mod router;
mod routes;
mod state;
mod templates;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use tracing::{info, warn};

use crate::base_system::context::Config;

pub use router::build_router;
pub use state::AppState;

const DEFAULT_BIND: &str = "127.0.0.1:3000";

pub fn run(config: &Config) -> Result<()> {
    let bind_raw = std::env::var("KOMIK_WEB_ADDR").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let bind_addrs: Vec<SocketAddr> = parse_bind_addrs(&bind_raw)?;

    let state = AppState::from_config(config);
    info!(target: "web", root = %state.library_root.display(), "library root");

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(run_async(bind_addrs, state))
}

pub fn parse_bind_addr(raw: &str) -> Result<SocketAddr> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(anyhow!("empty bind addr"));
    }

    if let Ok(a) = s.parse::<SocketAddr>() {
        return Ok(a);
    }

    // 兼容未加方括号的 IPv6，如 "::1:3000"
    if !s.starts_with('[')
        && let Some((host, port)) = s.rsplit_once(':')
        && !host.is_empty()
        && port.chars().all(|c| c.is_ascii_digit())
        && host.contains(':')
    {
        let wrapped = format!("[{host}]:{port}");
        if let Ok(a) = wrapped.parse::<SocketAddr>() {
            return Ok(a);
        }
    }

    Err(anyhow!(
        "invalid KOMIK_WEB_ADDR: '{s}'. Use '127.0.0.1:3000' or '[::1]:3000' (IPv6 needs brackets). For multiple binds, separate by comma: '0.0.0.0:3000,[::]:3000'."
    ))
}

pub fn parse_bind_addrs(raw: &str) -> Result<Vec<SocketAddr>> {
    let parts: Vec<&str> = raw
        .split([',', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if parts.is_empty() {
        return Err(anyhow!("empty KOMIK_WEB_ADDR"));
    }

    let mut out = Vec::with_capacity(parts.len());
    for p in parts {
        let a = parse_bind_addr(p)?;
        if !out.contains(&a) {
            out.push(a);
        }
    }
    Ok(out)
}

async fn run_async(bind_addrs: Vec<SocketAddr>, state: AppState) -> Result<()> {
    let notify = Arc::new(tokio::sync::Notify::new());
    {
        let notify = notify.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            notify.notify_waiters();
        });
    }

    let mut servers = Vec::new();
    for bind in bind_addrs {
        let listener = match tokio::net::TcpListener::bind(bind).await {
            Ok(l) => l,
            Err(e) => {
                // 双栈系统上 [::] 可能已覆盖 0.0.0.0
                if !servers.is_empty() && e.kind() == std::io::ErrorKind::AddrInUse {
                    warn!(target: "web", bind = %bind, error = %e, "bind failed (AddrInUse), skipping");
                    continue;
                }
                return Err(anyhow!(e).context(format!("bind failed: {bind}")));
            }
        };

        info!(target: "web", "Web viewer listening on http://{bind}/ (set KOMIK_WEB_ADDR to override)");
        println!("Web viewer listening on http://{bind}/");

        let app = build_router(state.clone());
        let notify = notify.clone();
        servers.push(tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                notify.notified().await;
            })
            .await
        }));
    }

    if servers.is_empty() {
        return Err(anyhow!("no listeners started (check KOMIK_WEB_ADDR)"));
    }

    println!("Press Ctrl+C to stop.");

    for h in servers {
        h.await
            .map_err(|e| anyhow!("server task join failed: {e}"))?
            .map_err(|e| anyhow!(e))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    println!("Stopping server...");
}
