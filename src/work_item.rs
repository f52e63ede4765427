use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::types::{IssueRecord, StatusCategory};

pub const UNASSIGNED: &str = "Unassigned";

/// Formats tried in order for naive timestamps. The Jira export format comes
/// first since that's what nearly every row uses.
const DATETIME_FORMATS: &[&str] = &[
    "%d/%b/%y %H:%M",
    "%d/%b/%y %I:%M %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// One issue from the export. Built once per row and never mutated; every
/// sprint-relative question takes the sprint window as a parameter.
#[derive(Debug, Clone, Serialize)]
pub struct WorkItem {
    issue_key: String,
    summary: String,
    issue_type: String,
    status: String,
    status_category: StatusCategory,
    platform: String,
    assignee: String,
    labels: BTreeSet<String>,
    story_points: f64,
    created_at: Option<NaiveDateTime>,
    updated_at: Option<NaiveDateTime>,
    closed_at: Option<NaiveDateTime>,
    sprint: String,
}

impl WorkItem {
    /// Build an item from a canonical row. Never fails: absent text becomes
    /// "", bad points become 0.0 and bad dates become `None`.
    pub fn from_record(record: &IssueRecord) -> Self {
        let text = |field: &Option<String>| field.as_deref().unwrap_or("").trim().to_string();
        let date = |field: &Option<String>| field.as_deref().and_then(parse_timestamp);

        Self {
            issue_key: text(&record.issue_key),
            summary: text(&record.summary),
            issue_type: text(&record.issue_type),
            status: text(&record.status),
            status_category: StatusCategory::parse(
                record.status_category.as_deref().unwrap_or(""),
            ),
            platform: text(&record.platform),
            assignee: text(&record.assignee),
            labels: record
                .labels
                .as_deref()
                .map(parse_labels)
                .unwrap_or_default(),
            story_points: record
                .story_points
                .as_deref()
                .map(parse_story_points)
                .unwrap_or(0.0),
            created_at: date(&record.created),
            updated_at: date(&record.updated),
            // Closure is the moment the status category last changed.
            closed_at: date(&record.status_category_changed),
            sprint: text(&record.sprint),
        }
    }

    /// Closed inside `[sprint_start 00:00:00, sprint_end 23:59:59]`.
    pub fn is_closed(&self, sprint_start: NaiveDate, sprint_end: NaiveDate) -> bool {
        if self.status_category != StatusCategory::Done {
            return false;
        }
        let Some(closed_at) = self.closed_at else {
            return false;
        };

        let window_start = sprint_start.and_time(NaiveTime::MIN);
        window_start <= closed_at && closed_at <= end_of_day(sprint_end)
    }

    /// Created on or before the sprint's first day (calendar date only).
    pub fn is_originally_planned(&self, sprint_start: NaiveDate) -> bool {
        self.created_at
            .is_some_and(|created| created.date() <= sprint_start)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn issue_key(&self) -> &str {
        &self.issue_key
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn issue_type(&self) -> &str {
        &self.issue_type
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn status_category(&self) -> &StatusCategory {
        &self.status_category
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Raw assignee, possibly empty.
    pub fn assignee(&self) -> &str {
        &self.assignee
    }

    /// Assignee as shown in contributor views.
    pub fn contributor_name(&self) -> &str {
        if self.assignee.is_empty() {
            UNASSIGNED
        } else {
            &self.assignee
        }
    }

    pub fn labels(&self) -> &BTreeSet<String> {
        &self.labels
    }

    pub fn story_points(&self) -> f64 {
        self.story_points
    }

    pub fn created_at(&self) -> Option<NaiveDateTime> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<NaiveDateTime> {
        self.updated_at
    }

    pub fn closed_at(&self) -> Option<NaiveDateTime> {
        self.closed_at
    }

    pub fn sprint(&self) -> &str {
        &self.sprint
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: String = self.summary.chars().take(50).collect();
        let ellipsis = if self.summary.chars().count() > 50 {
            "..."
        } else {
            ""
        };
        write!(f, "WorkItem({}: {short}{ellipsis})", self.issue_key)
    }
}

/// Last second of `date`.
pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
        .checked_add_signed(Duration::days(1) - Duration::seconds(1))
        .unwrap_or(NaiveDateTime::MAX)
}

/// Story points as a non-negative finite number; anything else is 0.0.
pub fn parse_story_points(value: &str) -> f64 {
    match value.trim().parse::<f64>() {
        Ok(points) if points.is_finite() && points > 0.0 => points,
        _ => 0.0,
    }
}

/// Parse a timestamp in the Jira export format or one of the ISO-like
/// formats. Offsets are dropped, keeping the wall-clock time as written.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_local());
    }

    // Jira REST style, e.g. 2025-07-15T10:30:00.000+0000
    if let Ok(parsed) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(parsed.naive_local());
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// Split a delimited label field. Jira labels never contain whitespace, so
/// commas, semicolons and whitespace all separate labels.
pub fn parse_labels(value: &str) -> BTreeSet<String> {
    value
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .collect()
}
