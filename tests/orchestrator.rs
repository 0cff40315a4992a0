mod common;

use std::fs;
use std::sync::{Arc, Mutex};

use common::{FakeFetcher, FakeNormalizer, FakeSource, LARGE, SMALL, test_config};
use komik_downloader::base_system::history::HistoryLedger;
use komik_downloader::download::downloader::{
    download_with_plan, prepare_title_plan, resolve_count, resolve_title_input,
};
use komik_downloader::download::engine::ChapterEngine;
use komik_downloader::download::models::{
    ChapterOutcome, PipelineError, ProgressSnapshot, StartPosition,
};
use komik_downloader::download::source::Normalizer;
use tempfile::TempDir;

const TITLE_URL: &str = "https://komiku.id/manga/demo/";

#[test]
fn title_input_resolves_history_numbers_and_urls() {
    let tmp = TempDir::new().unwrap();
    let mut ledger = HistoryLedger::load(tmp.path().join("history.json"), 10);
    ledger.record_access("https://komiku.id/manga/a/", "a");
    ledger.record_access("https://komiku.id/manga/b/", "b");

    assert_eq!(
        resolve_title_input("2", &ledger).unwrap(),
        "https://komiku.id/manga/a/"
    );
    assert_eq!(
        resolve_title_input(" https://komiku.id/manga/c/ ", &ledger).unwrap(),
        "https://komiku.id/manga/c/"
    );
    for bad in ["0", "3", "one piece", ""] {
        assert!(
            matches!(
                resolve_title_input(bad, &ledger),
                Err(PipelineError::InvalidSelection(_))
            ),
            "input: {bad:?}"
        );
    }
}

#[test]
fn empty_catalog_is_source_unavailable() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let source = FakeSource::new("demo");
    assert!(matches!(
        prepare_title_plan(&config, &source, TITLE_URL),
        Err(PipelineError::SourceUnavailable(_))
    ));
}

#[test]
fn count_defaults_to_remaining_and_rejects_zero() {
    assert_eq!(resolve_count(5, None).unwrap(), 5);
    assert_eq!(resolve_count(5, Some(2)).unwrap(), 2);
    assert_eq!(resolve_count(5, Some(10)).unwrap(), 5);
    assert!(matches!(
        resolve_count(5, Some(0)),
        Err(PipelineError::InvalidSelection(_))
    ));
}

#[test]
fn resume_continues_after_last_downloaded_chapter() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    // 来源为"最新在前"
    let source = FakeSource::new("demo")
        .with_chapter("3", 2)
        .with_chapter("2", 2)
        .with_chapter("1", 2);
    let fetcher = FakeFetcher::new(SMALL);
    let normalizer = FakeNormalizer::new(LARGE);
    let engine = ChapterEngine::new(&config, &source, &fetcher, Some(&normalizer as &dyn Normalizer));

    // 第 1 章已在本地完成
    let plan = prepare_title_plan(&config, &source, TITLE_URL).unwrap();
    let ch1 = plan.workspace.chapter_dir(&source.chapter("1").key);
    fs::create_dir_all(&ch1).unwrap();
    fs::write(ch1.join("scaled_image_1.png"), b"x").unwrap();
    fs::write(ch1.join("scaled_image_2.png"), b"x").unwrap();

    let plan = prepare_title_plan(&config, &source, TITLE_URL).unwrap();
    let inventory = plan.inventory();
    assert_eq!(inventory.total, 3);
    assert_eq!(inventory.last.as_ref().map(|k| k.as_str()), Some("1"));
    assert_eq!(inventory.next_index, Some(1));

    let start = plan.resolve_start(&StartPosition::Resume).unwrap();
    let count = resolve_count(plan.remaining_from(start), None).unwrap();
    assert_eq!((start, count), (1, 2));

    let snapshots: Arc<Mutex<Vec<ProgressSnapshot>>> = Arc::default();
    let sink = snapshots.clone();
    let summary = download_with_plan(
        &plan,
        &engine,
        start,
        count,
        Some(Box::new(move |s: &ProgressSnapshot| {
            sink.lock().unwrap().push(s.clone())
        })),
    );

    let processed: Vec<&str> = summary.chapters.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(processed, ["2", "3"]);
    assert_eq!(summary.count(ChapterOutcome::Processed), 2);
    assert_eq!(summary.totals().normalized, 4);
    assert_eq!(fetcher.calls.get(), 4);

    let last = snapshots.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last.chapter_total, 2);
    assert_eq!(last.chapter_done, 2);

    let plan = prepare_title_plan(&config, &source, TITLE_URL).unwrap();
    let inventory = plan.inventory();
    assert_eq!(inventory.downloaded.len(), 3);
    assert_eq!(inventory.next_index, None);
    assert!(matches!(
        plan.resolve_start(&StartPosition::Resume),
        Err(PipelineError::InvalidSelection(_))
    ));
}

#[test]
fn explicit_start_with_count_processes_only_the_window() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let source = FakeSource::new("demo")
        .with_chapter("1", 1)
        .with_chapter("2", 1)
        .with_chapter("2-5", 1)
        .with_chapter("3", 1);
    let fetcher = FakeFetcher::new(SMALL);
    let normalizer = FakeNormalizer::new(LARGE);
    let engine = ChapterEngine::new(&config, &source, &fetcher, Some(&normalizer as &dyn Normalizer));

    let plan = prepare_title_plan(&config, &source, TITLE_URL).unwrap();
    let start = plan
        .resolve_start(&StartPosition::Chapter("2.5".to_string()))
        .unwrap();
    assert_eq!(start, 2);
    let summary = download_with_plan(&plan, &engine, start, 1, None);

    assert_eq!(summary.chapters.len(), 1);
    assert_eq!(summary.chapters[0].key.as_str(), "2-5");
    assert_eq!(
        plan.workspace.materialized_keys().len(),
        1,
        "only the selected chapter is written"
    );

    assert!(matches!(
        plan.resolve_start(&StartPosition::Chapter("42".to_string())),
        Err(PipelineError::InvalidSelection(_))
    ));
}

#[test]
fn rerunning_a_finished_window_does_no_work() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let source = FakeSource::new("demo").with_chapter("1", 2).with_chapter("2", 2);
    let fetcher = FakeFetcher::new(SMALL);
    let normalizer = FakeNormalizer::new(LARGE);
    let engine = ChapterEngine::new(&config, &source, &fetcher, Some(&normalizer as &dyn Normalizer));

    let plan = prepare_title_plan(&config, &source, TITLE_URL).unwrap();
    download_with_plan(&plan, &engine, 0, 2, None);
    let fetched = fetcher.calls.get();

    let again = download_with_plan(&plan, &engine, 0, 2, None);
    assert_eq!(again.count(ChapterOutcome::AlreadyDone), 2);
    assert_eq!(fetcher.calls.get(), fetched);
    assert_eq!(normalizer.calls.get(), 4);
}

#[test]
fn unknown_chapter_dir_does_not_block_resume() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let source = FakeSource::new("demo")
        .with_chapter("1", 1)
        .with_chapter("2", 1)
        .with_chapter("3", 1);

    let plan = prepare_title_plan(&config, &source, TITLE_URL).unwrap();
    let ch1 = plan.workspace.chapter_dir(&source.chapter("1").key);
    fs::create_dir_all(&ch1).unwrap();
    fs::write(ch1.join("scaled_image_1.png"), b"x").unwrap();
    let unknown = plan.workspace.root().join("unknown");
    fs::create_dir_all(&unknown).unwrap();
    fs::write(unknown.join("scaled_image_1.png"), b"x").unwrap();

    let plan = prepare_title_plan(&config, &source, TITLE_URL).unwrap();
    let keys: Vec<&str> = plan.materialized.iter().map(|k| k.as_str()).collect();
    assert_eq!(keys, ["1", "unknown"]);

    let inventory = plan.inventory();
    assert_eq!(inventory.last.as_ref().map(|k| k.as_str()), Some("1"));
    assert_eq!(inventory.next_index, Some(1));
    assert_eq!(plan.resolve_start(&StartPosition::Resume).unwrap(), 1);
}
