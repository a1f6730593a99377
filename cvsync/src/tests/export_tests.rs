use std::sync::Arc;
use std::time::Duration;

use super::fake_browser::{console_page, Action, FakeBrowser, Hook};
use crate::config::{ConsoleLabels, Pacing};
use crate::drivers::Key;
use crate::export::ExportPoller;
use crate::{ExportStatus, Page, RetryPolicy, SyncError};

fn default_poll() -> RetryPolicy {
    RetryPolicy::fixed(Duration::from_secs(8), Duration::from_secs(3), 30)
}

#[tokio::test(start_paused = true)]
async fn search_clicks_last_visible_button_then_exports() {
    let dir = tempfile::tempdir().unwrap();
    let browser = Arc::new(FakeBrowser::new());
    let console = console_page(
        &browser,
        Some((dir.path().join("action_log.csv"), b"a,b\n".to_vec())),
    );
    let page = Page::new(browser.clone());
    let (labels, pacing, poll) = (ConsoleLabels::default(), Pacing::default(), default_poll());

    let start = tokio::time::Instant::now();
    let job = ExportPoller::new(&page, &labels, &pacing, &poll, dir.path(), "csv")
        .run()
        .await
        .unwrap();

    assert_eq!(job.status(), ExportStatus::Found);
    assert_eq!(job.file_path(), Some(dir.path().join("action_log.csv").as_path()));
    // search render pause plus the initial download delay
    assert_eq!(start.elapsed(), Duration::from_secs(15 + 8));

    assert_eq!(browser.count(&Action::ClickForced(console.search_button)), 1);
    assert_eq!(browser.count(&Action::ClickForced(console.header_search)), 0);
    assert_eq!(browser.count(&Action::ClickForced(console.filter_panel)), 0);
    assert_eq!(browser.count(&Action::ClickForced(console.export_button)), 1);
    assert_eq!(browser.count(&Action::PageKey(Key::Enter)), 0);
}

#[tokio::test(start_paused = true)]
async fn enter_submits_when_no_search_button_is_visible() {
    let dir = tempfile::tempdir().unwrap();
    let browser = Arc::new(FakeBrowser::new());
    let hidden = browser.add("input", "", &[("value", "検索")], None);
    browser.hide(hidden);
    let export = browser.add("button", "CSV生成", &[], None);
    browser.on_click(export, Hook::WriteFile(dir.path().join("ready.csv"), b"x\n".to_vec()));
    let page = Page::new(browser.clone());
    let (labels, pacing, poll) = (ConsoleLabels::default(), Pacing::none(), default_poll());

    ExportPoller::new(&page, &labels, &pacing, &poll, dir.path(), "csv")
        .run()
        .await
        .unwrap();

    assert_eq!(browser.count(&Action::PageKey(Key::Enter)), 1);
    assert_eq!(browser.count(&Action::ClickForced(hidden)), 0);
}

#[tokio::test(start_paused = true)]
async fn leftover_export_is_not_mistaken_for_a_new_one() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("0_yesterday.csv"), b"stale\n").unwrap();
    let browser = Arc::new(FakeBrowser::new());
    console_page(
        &browser,
        Some((dir.path().join("action_log.csv"), b"fresh\n".to_vec())),
    );
    let page = Page::new(browser.clone());
    let (labels, pacing, poll) = (ConsoleLabels::default(), Pacing::none(), default_poll());

    let job = ExportPoller::new(&page, &labels, &pacing, &poll, dir.path(), "csv")
        .run()
        .await
        .unwrap();

    assert_eq!(job.file_path(), Some(dir.path().join("action_log.csv").as_path()));
    assert!(!dir.path().join("0_yesterday.csv").exists());
}

#[tokio::test(start_paused = true)]
async fn missing_export_control_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let browser = Arc::new(FakeBrowser::new());
    browser.add("input", "", &[("value", "検索")], None);
    let page = Page::new(browser.clone()).with_locate_timeout(Duration::from_secs(1));
    let (labels, pacing, poll) = (ConsoleLabels::default(), Pacing::none(), default_poll());

    let err = ExportPoller::new(&page, &labels, &pacing, &poll, dir.path(), "csv")
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::ElementNotFound(_)), "{err:?}");
}

#[tokio::test(start_paused = true)]
async fn download_timeout_reports_the_whole_budget() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("partial.csv.crdownload"), b"").unwrap();
    let browser = Arc::new(FakeBrowser::new());
    let page = Page::new(browser);
    let (labels, pacing, poll) = (ConsoleLabels::default(), Pacing::none(), default_poll());

    let start = tokio::time::Instant::now();
    let err = ExportPoller::new(&page, &labels, &pacing, &poll, dir.path(), "csv")
        .await_download()
        .await
        .unwrap_err();

    assert_eq!(start.elapsed(), Duration::from_secs(8 + 3 * 29));
    match err {
        SyncError::DownloadTimeout {
            attempts, waited, ..
        } => {
            assert_eq!(attempts, 30);
            assert_eq!(waited, Duration::from_secs(95));
        }
        other => panic!("expected DownloadTimeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn download_arriving_mid_poll_is_picked_up() {
    let dir = tempfile::tempdir().unwrap();
    let browser = Arc::new(FakeBrowser::new());
    let page = Page::new(browser);
    let (labels, pacing) = (ConsoleLabels::default(), Pacing::none());
    let poll = RetryPolicy::fixed(Duration::ZERO, Duration::from_secs(3), 30);

    let target = dir.path().join("late.csv");
    let writer_target = target.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        std::fs::write(writer_target, b"x\n").unwrap();
    });

    let found = ExportPoller::new(&page, &labels, &pacing, &poll, dir.path(), "csv")
        .await_download()
        .await
        .unwrap();
    assert_eq!(found, target);
}
