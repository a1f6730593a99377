//! Applying the search conditions on the console's filter panel.

use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use crate::config::{ConsoleLabels, Pacing};
use crate::drivers::Key;
use crate::element::Element;
use crate::errors::SyncError;
use crate::retry::{poll_until, RetryPolicy};
use crate::selector::Selector;
use crate::utils::settle;
use crate::Page;

/// The console's date token, e.g. `2026年10月19日`.
pub const DATE_FORMAT: &str = "%Y年%m月%d日";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// The text typed into a range picker: `"{start} - {end}"`.
    pub fn to_input_text(&self) -> String {
        format!(
            "{} - {}",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerFilter {
    pub label: String,
    pub placeholder: String,
    pub name: String,
}

/// Everything to set on the filter panel for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    /// Text of the control that reveals the filter panel
    pub panel_label: Option<String>,
    /// Field label to range, applied in order
    pub date_fields: Vec<(String, DateRange)>,
    pub partner: Option<PartnerFilter>,
    /// Text of the control that reveals the detail toggles
    pub detail_panel_label: Option<String>,
    /// `value` tokens of the switches to turn on
    pub toggles: Vec<String>,
}

impl FilterSpec {
    /// Same-day query over every configured date field.
    pub fn for_day(labels: &ConsoleLabels, day: NaiveDate) -> Self {
        let range = DateRange::single_day(day);
        Self {
            panel_label: labels.filter_panel.clone(),
            date_fields: labels
                .date_fields
                .iter()
                .map(|label| (label.clone(), range))
                .collect(),
            partner: labels.partner_name.as_ref().map(|name| PartnerFilter {
                label: labels.partner_label.clone(),
                placeholder: labels.partner_placeholder.clone(),
                name: name.clone(),
            }),
            detail_panel_label: labels.detail_panel.clone(),
            toggles: labels.toggles.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Applied,
    /// The page was already in the requested state
    Unchanged,
    /// The step could not be applied; the run continues with a weaker filter
    Degraded(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: String,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterReport {
    pub steps: Vec<StepReport>,
}

impl FilterReport {
    fn record(&mut self, step: String, result: Result<StepOutcome, SyncError>) {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(step = %step, "Filter step skipped: {}", e);
                StepOutcome::Degraded(e.to_string())
            }
        };
        self.steps.push(StepReport { step, outcome });
    }

    pub fn degraded(&self) -> impl Iterator<Item = &StepReport> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Degraded(_)))
    }

    pub fn outcome(&self, step: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.step == step).map(|s| &s.outcome)
    }
}

/// Realizes a [`FilterSpec`] on the live page. Never fails: every step is isolated and a
/// step that cannot be applied is reported as [`StepOutcome::Degraded`].
pub struct FilterComposer<'a> {
    page: &'a Page,
    pacing: &'a Pacing,
    focus_wait: &'a RetryPolicy,
}

impl<'a> FilterComposer<'a> {
    pub fn new(page: &'a Page, pacing: &'a Pacing, focus_wait: &'a RetryPolicy) -> Self {
        Self {
            page,
            pacing,
            focus_wait,
        }
    }

    #[instrument(skip_all)]
    pub async fn apply(&self, spec: &FilterSpec) -> FilterReport {
        let mut report = FilterReport::default();

        if let Some(label) = &spec.panel_label {
            report.record(format!("panel:{label}"), self.open_panel(label).await);
        }
        for (label, range) in &spec.date_fields {
            report.record(
                format!("date:{label}"),
                self.apply_date_range(label, range).await,
            );
        }
        if let Some(partner) = &spec.partner {
            report.record(
                format!("partner:{}", partner.label),
                self.apply_partner(partner).await,
            );
        }
        if !spec.toggles.is_empty() {
            if let Some(label) = &spec.detail_panel_label {
                report.record(format!("panel:{label}"), self.expand_details(label).await);
            }
            for token in &spec.toggles {
                report.record(format!("toggle:{token}"), self.apply_toggle(token).await);
            }
        }

        let degraded = report.degraded().count();
        info!(
            steps = report.steps.len(),
            degraded, "Filter composition finished"
        );
        report
    }

    async fn require(&self, selector: Selector, what: &str) -> Result<Element, SyncError> {
        self.page
            .locate(selector)
            .await
            .ok_or_else(|| SyncError::ElementNotFound(what.to_string()))
    }

    async fn open_panel(&self, label: &str) -> Result<StepOutcome, SyncError> {
        info!("Opening filter panel '{}'", label);
        let toggle = self.require(Selector::text(label), label).await?;
        toggle.click().await?;
        settle("filter panel", self.pacing.after_filter_panel).await;
        Ok(StepOutcome::Applied)
    }

    /// Clear the range input by assignment, then type the range and confirm it.
    pub async fn apply_date_range(
        &self,
        label: &str,
        range: &DateRange,
    ) -> Result<StepOutcome, SyncError> {
        let text = range.to_input_text();
        info!("Entering '{}' into '{}'", text, label);
        let input = self
            .require(
                Selector::text(label).following_input(None),
                &format!("input after '{label}'"),
            )
            .await?;

        input.click_forced().await?;
        input.set_value("").await?;
        settle("date clear", self.pacing.after_date_clear).await;
        input.type_text(&text).await?;
        input.press_key(Key::Enter).await?;
        settle("date entry", self.pacing.after_date_entry).await;
        Ok(StepOutcome::Applied)
    }

    /// Open the partner picker and type into whatever input it focuses.
    pub async fn apply_partner(&self, partner: &PartnerFilter) -> Result<StepOutcome, SyncError> {
        info!("Selecting partner '{}'", partner.name);
        let anchor = Selector::text(&partner.label)
            .on("div")
            .or(Selector::text(&partner.label).on("label"));
        let picker = self
            .require(
                anchor.following_input(Some(&partner.placeholder)),
                &format!("picker after '{}'", partner.label),
            )
            .await?;

        picker.click().await?;
        let target = match self.wait_for_focused_input().await {
            Some(focused) => focused,
            None => {
                warn!("Partner picker never focused an input; typing into the picker itself");
                picker
            }
        };

        target.type_text(&partner.name).await?;
        settle("partner suggestions", self.pacing.partner_suggestions).await;
        target.press_key(Key::Enter).await?;
        settle("partner selection", self.pacing.after_partner).await;
        Ok(StepOutcome::Applied)
    }

    /// The picker mounts its text box after the click; wait until the page reports an
    /// editable element as focused.
    async fn wait_for_focused_input(&self) -> Option<Element> {
        poll_until(self.focus_wait, |_| async move {
            let focused = self.page.focused_element().await.ok().flatten()?;
            match focused.is_editable().await {
                Ok(true) => Some(focused),
                _ => None,
            }
        })
        .await
    }

    async fn expand_details(&self, label: &str) -> Result<StepOutcome, SyncError> {
        info!("Expanding '{}'", label);
        let opener = self.require(Selector::text(label), label).await?;
        opener.click_forced().await?;
        settle("detail panel", self.pacing.after_detail_panel).await;
        Ok(StepOutcome::Applied)
    }

    /// Switch on the control wrapping `input[value=token]`. The switch state lives in the
    /// wrapper's `aria-checked`; clicking a switch that is already on would turn it off.
    pub async fn apply_toggle(&self, token: &str) -> Result<StepOutcome, SyncError> {
        let wrapper = self
            .require(
                Selector::attr("value", token).on("input").parent(),
                &format!("switch for '{token}'"),
            )
            .await?;

        let checked = wrapper.attribute("aria-checked").await?;
        if checked.as_deref() != Some("false") {
            info!(state = ?checked, "Switch '{}' already on, leaving it", token);
            return Ok(StepOutcome::Unchanged);
        }

        wrapper.click_forced().await?;
        info!("Switched on '{}'", token);
        settle("toggle", self.pacing.after_toggle).await;
        Ok(StepOutcome::Applied)
    }
}
