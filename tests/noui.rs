use std::fs;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use komik_downloader::base_system::context::Config;
use komik_downloader::ui::noui::run_with_input;
use tempfile::TempDir;

const MANGA_PAGE: &str = r#"<html><body><table>
<tr><td class="judulseries"><a href="/demo-chapter-2-bahasa-indonesia/">Chapter 2</a></td></tr>
<tr><td class="judulseries"><a href="/demo-chapter-1-bahasa-indonesia/">Chapter 1</a></td></tr>
</table></body></html>"#;

struct CatalogServer {
    base_url: String,
    hits: Arc<AtomicUsize>,
    shutdown: mpsc::Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Drop for CatalogServer {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn start_catalog_server() -> CatalogServer {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
    let base_url = format!("http://{}", server.server_addr());
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

    let handle = thread::spawn(move || {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }
            let request = match server.recv_timeout(Duration::from_millis(50)) {
                Ok(Some(req)) => req,
                Ok(None) => continue,
                Err(_) => break,
            };
            let response = if request.url() == "/manga/demo/" {
                counter.fetch_add(1, Ordering::SeqCst);
                tiny_http::Response::from_string(MANGA_PAGE)
            } else {
                tiny_http::Response::from_string("not found").with_status_code(404)
            };
            let _ = request.respond(response);
        }
    });

    CatalogServer {
        base_url,
        hits,
        shutdown: shutdown_tx,
        handle: Some(handle),
    }
}

#[test]
fn history_survives_failed_save_within_one_session() {
    let tmp = TempDir::new().unwrap();
    let server = start_catalog_server();

    // 父路径是普通文件，记录永远写不进去
    let blocker = tmp.path().join("blocker");
    fs::write(&blocker, "x").unwrap();
    let mut config = Config::default().with_data_dir(Some(tmp.path()));
    config.save_path = tmp.path().join("out").to_string_lossy().to_string();
    config.history_file = blocker.join("history.json").to_string_lossy().to_string();
    config.max_retries = 1;

    // 第一轮按地址打开后返回，第二轮用序号 1 再次打开，然后退出
    let script = format!("{}/manga/demo/\nq\n1\nq\nq\n", server.base_url);
    run_with_input(&config, &mut Cursor::new(script)).unwrap();

    assert_eq!(server.hits.load(Ordering::SeqCst), 2);
    assert!(!blocker.join("history.json").exists());
}

#[test]
fn end_of_input_ends_the_loop() {
    let tmp = TempDir::new().unwrap();
    let config = Config::default().with_data_dir(Some(tmp.path()));
    run_with_input(&config, &mut Cursor::new("\n\n")).unwrap();
}
