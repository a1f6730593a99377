use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use super::fake_browser::{console_page, Action, FakeBrowser};
use super::init_tracing;
use crate::config::{ConsoleLabels, Pacing};
use crate::drivers::Key;
use crate::filter::PartnerFilter;
use crate::{FilterComposer, FilterSpec, Page, RetryPolicy, StepOutcome};

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn focus_wait() -> RetryPolicy {
    RetryPolicy::fixed(Duration::ZERO, Duration::from_millis(100), 30)
}

#[tokio::test(start_paused = true)]
async fn composes_every_filter_on_the_console() {
    init_tracing();
    let browser = Arc::new(FakeBrowser::new());
    let console = console_page(&browser, None);
    browser.set_attr(console.registered_input, "value", "2026年10月18日 - 2026年10月18日");
    let page = Page::new(browser.clone());
    let (pacing, wait) = (Pacing::none(), focus_wait());

    let spec = FilterSpec::for_day(&ConsoleLabels::default(), day());
    let report = FilterComposer::new(&page, &pacing, &wait).apply(&spec).await;

    let steps: Vec<&str> = report.steps.iter().map(|s| s.step.as_str()).collect();
    assert_eq!(
        steps,
        [
            "panel:絞り込み検索",
            "date:登録日時",
            "date:承認日時",
            "partner:パートナー",
            "panel:詳細項目",
            "toggle:clickReferrer",
        ]
    );
    assert!(report.steps.iter().all(|s| s.outcome == StepOutcome::Applied), "{report:?}");

    let expected = "2026年10月19日 - 2026年10月19日";
    assert_eq!(browser.value(console.registered_input), expected);
    assert_eq!(browser.value(console.approved_input), expected);
    assert_eq!(browser.value(console.partner_search), "株式会社フルアウト");
    assert_eq!(browser.value(console.partner_picker), "");
    assert_eq!(
        browser.attr(console.referrer_switch, "aria-checked").as_deref(),
        Some("true")
    );

    let actions = browser.actions();
    assert_eq!(actions[0], Action::Click(console.filter_panel));
    let date_steps: Vec<&Action> = actions
        .iter()
        .filter(|a| match a {
            Action::ClickForced(n)
            | Action::SetValue(n, _)
            | Action::Type(n, _)
            | Action::Key(n, _) => *n == console.registered_input,
            _ => false,
        })
        .collect();
    assert_eq!(
        date_steps,
        [
            &Action::ClickForced(console.registered_input),
            &Action::SetValue(console.registered_input, String::new()),
            &Action::Type(console.registered_input, expected.to_string()),
            &Action::Key(console.registered_input, Key::Enter),
        ]
    );
    assert_eq!(browser.count(&Action::Click(console.partner_picker)), 1);
    assert_eq!(browser.count(&Action::Key(console.partner_search, Key::Enter)), 1);
    assert_eq!(browser.count(&Action::ClickForced(console.detail_panel)), 1);
}

#[tokio::test(start_paused = true)]
async fn toggle_is_only_ever_switched_on() {
    let browser = Arc::new(FakeBrowser::new());
    let console = console_page(&browser, None);
    let page = Page::new(browser.clone());
    let (pacing, wait) = (Pacing::none(), focus_wait());
    let composer = FilterComposer::new(&page, &pacing, &wait);

    assert_eq!(
        composer.apply_toggle("clickReferrer").await.unwrap(),
        StepOutcome::Applied
    );
    assert_eq!(
        composer.apply_toggle("clickReferrer").await.unwrap(),
        StepOutcome::Unchanged
    );
    assert_eq!(
        browser.count(&Action::ClickForced(console.referrer_switch)),
        1
    );
    assert_eq!(
        browser.attr(console.referrer_switch, "aria-checked").as_deref(),
        Some("true")
    );
}

#[tokio::test(start_paused = true)]
async fn switch_already_on_is_left_alone() {
    let browser = Arc::new(FakeBrowser::new());
    let console = console_page(&browser, None);
    browser.set_attr(console.referrer_switch, "aria-checked", "true");
    let page = Page::new(browser.clone());
    let (pacing, wait) = (Pacing::none(), focus_wait());

    let outcome = FilterComposer::new(&page, &pacing, &wait)
        .apply_toggle("clickReferrer")
        .await
        .unwrap();
    assert_eq!(outcome, StepOutcome::Unchanged);
    assert_eq!(
        browser.count(&Action::ClickForced(console.referrer_switch)),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn partner_falls_back_to_picker_when_nothing_takes_focus() {
    let browser = Arc::new(FakeBrowser::new());
    browser.add("label", "パートナー", &[], None);
    let picker = browser.add("input", "", &[("placeholder", "選択してください")], None);
    let page = Page::new(browser.clone());
    let (pacing, wait) = (Pacing::none(), focus_wait());

    let partner = PartnerFilter {
        label: "パートナー".into(),
        placeholder: "選択".into(),
        name: "株式会社フルアウト".into(),
    };
    let start = tokio::time::Instant::now();
    let outcome = FilterComposer::new(&page, &pacing, &wait)
        .apply_partner(&partner)
        .await
        .unwrap();

    assert_eq!(outcome, StepOutcome::Applied);
    assert_eq!(start.elapsed(), wait.budget());
    assert_eq!(browser.value(picker), "株式会社フルアウト");
    assert_eq!(browser.count(&Action::Key(picker, Key::Enter)), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_controls_degrade_without_stopping() {
    let browser = Arc::new(FakeBrowser::new());
    browser.add("label", "登録日時", &[], None);
    let registered = browser.add("input", "", &[], None);
    let page = Page::new(browser.clone()).with_locate_timeout(Duration::from_secs(1));
    let (pacing, wait) = (Pacing::none(), focus_wait());

    let spec = FilterSpec::for_day(&ConsoleLabels::default(), day());
    let report = FilterComposer::new(&page, &pacing, &wait).apply(&spec).await;

    assert_eq!(report.outcome("date:登録日時"), Some(&StepOutcome::Applied));
    for step in [
        "panel:絞り込み検索",
        "date:承認日時",
        "partner:パートナー",
        "panel:詳細項目",
        "toggle:clickReferrer",
    ] {
        assert!(
            matches!(report.outcome(step), Some(StepOutcome::Degraded(_))),
            "{step}: {:?}",
            report.outcome(step)
        );
    }
    assert_eq!(report.degraded().count(), 5);
    assert_eq!(
        browser.value(registered),
        "2026年10月19日 - 2026年10月19日"
    );
}
