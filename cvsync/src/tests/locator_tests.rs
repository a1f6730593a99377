use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::fake_browser::FakeBrowser;
use super::init_tracing;
use crate::{Page, Selector};

#[tokio::test(start_paused = true)]
async fn first_match_is_in_document_order() {
    init_tracing();
    let browser = Arc::new(FakeBrowser::new());
    browser.add("span", "登録日時 (from)", &[], None);
    let second = browser.add("label", "登録日時", &[], None);
    let page = Page::new(browser.clone());

    let all = page.locate_all(Selector::text("登録日時")).await;
    assert_eq!(all.len(), 2);
    let label = page.locate(Selector::text("登録日時").on("label")).await.unwrap();
    assert_eq!(label.id().0, second.to_string());
}

#[tokio::test(start_paused = true)]
async fn absence_is_none_after_the_timeout() {
    let browser = Arc::new(FakeBrowser::new());
    let page = Page::new(browser).with_locate_timeout(Duration::from_secs(2));

    let start = Instant::now();
    assert!(page.locate(Selector::text("パートナー")).await.is_none());
    let waited = start.elapsed();
    assert!(waited >= Duration::from_secs(2), "{waited:?}");
    assert!(waited < Duration::from_secs(3), "{waited:?}");
}

#[tokio::test(start_paused = true)]
async fn waits_for_late_rendering() {
    let browser = Arc::new(FakeBrowser::new());
    let page = Page::new(browser.clone()).with_locate_timeout(Duration::from_secs(20));

    let late = browser.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        late.add("button", "CSV生成", &[], None);
    });

    let start = Instant::now();
    let button = page.locate(Selector::text("CSV生成")).await;
    assert!(button.is_some());
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert!(start.elapsed() < Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn invalid_selector_gives_up_immediately() {
    let browser = Arc::new(FakeBrowser::new());
    browser.add("input", "", &[("value", "検索")], None);
    let page = Page::new(browser);

    let start = Instant::now();
    assert!(page
        .locate(Selector::attr("bad name", "検索"))
        .await
        .is_none());
    assert!(page
        .locate(Selector::Invalid("unsupported".into()))
        .await
        .is_none());
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn parent_of_hidden_checkbox() {
    let browser = Arc::new(FakeBrowser::new());
    let wrapper = browser.add("label", "", &[("aria-checked", "false")], None);
    browser.add("input", "", &[("value", "clickReferrer")], Some(wrapper));
    let page = Page::new(browser);

    let found = page
        .locate(Selector::attr("value", "clickReferrer").on("input").parent())
        .await
        .unwrap();
    assert_eq!(found.id().0, wrapper.to_string());
    assert_eq!(
        found.attribute("aria-checked").await.unwrap().as_deref(),
        Some("false")
    );
}
