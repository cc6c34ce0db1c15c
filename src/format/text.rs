//! Text formatting functions for bugtrack.
//!
//! Provides plain text (non-ANSI) formatting for terminal output:
//! - State icons (○ ◐ ✓ ?)
//! - Bug and test cycle lines
//! - Crawl summaries

use bugtrack_core::model::{Bug, BugState, TestCycle};

use crate::providers::CrawlReport;

/// State icon characters.
pub mod icons {
    /// Active - still being worked (hollow circle).
    pub const ACTIVE: &str = "○";
    /// Resolved - fixed, awaiting verification (half-filled).
    pub const RESOLVED: &str = "◐";
    /// Closed (checkmark).
    pub const CLOSED: &str = "✓";
    pub const UNKNOWN: &str = "?";
}

#[must_use]
pub const fn format_state_icon(state: BugState) -> &'static str {
    match state {
        BugState::Active => icons::ACTIVE,
        BugState::Resolved => icons::RESOLVED,
        BugState::Closed => icons::CLOSED,
        BugState::Unknown => icons::UNKNOWN,
    }
}

/// Format a single-line bug summary.
///
/// Format: `{icon} #{id} [{provider}:{bug_id}] [{status}] {title}`, where the
/// provider key and status brackets are dropped when empty.
#[must_use]
pub fn format_bug_line(bug: &Bug) -> String {
    let mut line = format!("{} #{}", format_state_icon(bug.state), bug.id);
    match bug.bug_id.as_deref() {
        Some(key) => line.push_str(&format!(" [{}:{key}]", bug.provider)),
        None => line.push_str(&format!(" [{}]", bug.provider)),
    }
    if !bug.status.is_empty() {
        line.push_str(&format!(" [{}]", bug.status));
    }
    line.push(' ');
    line.push_str(&bug.title);
    line
}

#[must_use]
pub fn format_cycle_line(cycle: &TestCycle) -> String {
    match cycle.name.as_deref() {
        Some(name) => format!(
            "{}/{}/{} {name}",
            cycle.provider, cycle.project, cycle.cycle_id
        ),
        None => format!("{}/{}/{}", cycle.provider, cycle.project, cycle.cycle_id),
    }
}

#[must_use]
pub fn format_crawl_report(report: &CrawlReport) -> String {
    let provider = report
        .provider
        .map_or_else(|| "?".to_string(), |p| p.to_string());
    format!(
        "Crawled {provider}: {} fetched, {} created, {} updated, {} unchanged, {} indexed",
        report.fetched, report.created, report.updated, report.unchanged, report.indexed
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bugtrack_core::model::Provider;

    fn make_bug() -> Bug {
        let mut bug = Bug {
            id: 12,
            provider: Provider::IssueTracker,
            bug_id: Some("884".to_string()),
            title: "Search box loses focus".to_string(),
            status: "Assigned".to_string(),
            ..Default::default()
        };
        bug.refresh_state();
        bug
    }

    #[test]
    fn test_state_icons() {
        assert_eq!(format_state_icon(BugState::Active), "○");
        assert_eq!(format_state_icon(BugState::Resolved), "◐");
        assert_eq!(format_state_icon(BugState::Closed), "✓");
        assert_eq!(format_state_icon(BugState::Unknown), "?");
    }

    #[test]
    fn test_format_bug_line() {
        assert_eq!(
            format_bug_line(&make_bug()),
            "○ #12 [issuetracker:884] [Assigned] Search box loses focus"
        );
    }

    #[test]
    fn test_format_bug_line_local() {
        let mut bug = make_bug();
        bug.provider = Provider::Datastore;
        bug.bug_id = None;
        bug.status = String::new();
        bug.refresh_state();
        assert_eq!(format_bug_line(&bug), "? #12 [datastore] Search box loses focus");
    }

    #[test]
    fn test_format_cycle_line() {
        let mut cycle = TestCycle {
            id: 1,
            provider: Provider::IssueTracker,
            project: "maps".to_string(),
            cycle_id: "r7".to_string(),
            name: Some("Release 7".to_string()),
            created_at: chrono::Utc::now(),
        };
        assert_eq!(format_cycle_line(&cycle), "issuetracker/maps/r7 Release 7");
        cycle.name = None;
        assert_eq!(format_cycle_line(&cycle), "issuetracker/maps/r7");
    }

    #[test]
    fn test_format_crawl_report() {
        let report = CrawlReport {
            provider: Some(Provider::IssueTracker),
            fetched: 3,
            created: 1,
            updated: 1,
            unchanged: 1,
            indexed: 2,
        };
        assert_eq!(
            format_crawl_report(&report),
            "Crawled issuetracker: 3 fetched, 1 created, 1 updated, 1 unchanged, 2 indexed"
        );
    }
}
