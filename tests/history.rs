use std::fs;

use komik_downloader::base_system::history::HistoryLedger;
use tempfile::TempDir;

#[test]
fn missing_file_loads_empty() {
    let tmp = TempDir::new().unwrap();
    let ledger = HistoryLedger::load(tmp.path().join("history.json"), 10);
    assert!(ledger.is_empty());
    assert!(ledger.entry_at(1).is_none());
}

#[test]
fn corrupt_file_is_treated_as_empty_and_recovers() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("history.json");
    fs::write(&path, "{ not json").unwrap();

    let mut ledger = HistoryLedger::load(&path, 10);
    assert!(ledger.is_empty());

    ledger.record_access("https://komiku.id/manga/a/", "a");
    let reloaded = HistoryLedger::load(&path, 10);
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded.entries()[0].title, "a");
}

#[test]
fn record_access_moves_url_to_front_without_duplicates() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("history.json");
    let mut ledger = HistoryLedger::load(&path, 10);

    ledger.record_access("https://komiku.id/manga/a/", "a");
    ledger.record_access("https://komiku.id/manga/b/", "b");
    ledger.record_access("https://komiku.id/manga/a/", "a");

    let urls: Vec<&str> = ledger.entries().iter().map(|e| e.url.as_str()).collect();
    assert_eq!(
        urls,
        ["https://komiku.id/manga/a/", "https://komiku.id/manga/b/"]
    );
    assert_eq!(ledger.entry_at(2).unwrap().title, "b");
    assert!(ledger.entry_at(0).is_none());
    assert!(ledger.entry_at(3).is_none());
}

#[test]
fn ledger_is_capped_at_max_entries() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("history.json");
    let mut ledger = HistoryLedger::load(&path, 3);

    for i in 0..5 {
        ledger.record_access(&format!("https://komiku.id/manga/t{i}/"), &format!("t{i}"));
    }
    assert_eq!(ledger.len(), 3);
    assert_eq!(ledger.entries()[0].title, "t4");
    assert_eq!(ledger.entries()[2].title, "t2");

    // 读取时同样按上限截断
    let smaller = HistoryLedger::load(&path, 2);
    assert_eq!(smaller.len(), 2);
}

#[test]
fn persisted_format_uses_camel_case_fields() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("nested").join("history.json");
    let mut ledger = HistoryLedger::load(&path, 10);
    ledger.record_access("https://komiku.id/manga/a/", "a");

    let raw = fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let first = &value[0];
    assert_eq!(first["url"], "https://komiku.id/manga/a/");
    assert_eq!(first["title"], "a");
    let stamp = first["lastAccessed"].as_str().unwrap();
    assert!(stamp.contains('T'), "not RFC 3339: {stamp}");
}

#[test]
fn save_failure_is_not_fatal() {
    let tmp = TempDir::new().unwrap();
    // 父路径是普通文件，目录无法创建
    let blocker = tmp.path().join("blocker");
    fs::write(&blocker, "x").unwrap();
    let mut ledger = HistoryLedger::load(blocker.join("history.json"), 10);

    ledger.record_access("https://komiku.id/manga/a/", "a");
    assert_eq!(ledger.len(), 1);
    assert!(!ledger.save());
}
