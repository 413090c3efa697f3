// Mapping from local reader state to the state pushed to the remote store

use super::models::{CompletionSummary, Progress, ReadStatus, SummaryStatus, TargetState};
use crate::storage::DocumentView;

/// Flow id of the main page sequence.
pub const PRIMARY_FLOW: u32 = 0;

/// Position of the current page within the primary flow, or `None` when the
/// reader sits in a footnote/cover flow or the flow is empty.
pub fn primary_flow_position(view: &dyn DocumentView) -> Option<(u32, Progress)> {
    let page = view.current_page();
    if view.page_flow(page) != PRIMARY_FLOW {
        return None;
    }
    let total = view.pages_in_flow(PRIMARY_FLOW);
    let position = view.position_in_flow(page).min(total);
    Progress::new(position, total).map(|p| (page, p))
}

/// Status for an open document at `progress`.
pub fn status_for(summary: &CompletionSummary, progress: Progress) -> ReadStatus {
    if summary.status == Some(SummaryStatus::Complete) || progress.is_complete() {
        ReadStatus::Finished
    } else {
        ReadStatus::Reading
    }
}

/// Target state for a record known only through its local summary, as used
/// by a reconciliation pass.
pub fn target_from_summary(summary: &CompletionSummary, last_read: Option<i64>) -> TargetState {
    let percent = summary.percent_complete.filter(|p| p.is_finite());
    if summary.status == Some(SummaryStatus::Complete) {
        return TargetState {
            progress: Progress::COMPLETE,
            status: ReadStatus::Finished,
            last_access: last_read,
        };
    }
    if summary.status == Some(SummaryStatus::Reading) || percent.is_some_and(|p| p > 0.0) {
        let progress = Progress::from_fraction(percent.unwrap_or(0.0));
        return TargetState {
            progress,
            status: status_for(summary, progress),
            last_access: last_read,
        };
    }
    TargetState {
        progress: Progress::UNOPENED,
        status: ReadStatus::New,
        last_access: None,
    }
}
