use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

/// One raw input row, addressed by canonical column name. Every field is
/// optional text; `WorkItem::from_record` decides what absent means.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IssueRecord {
    pub issue_key: Option<String>,
    pub summary: Option<String>,
    pub issue_type: Option<String>,
    pub status: Option<String>,
    pub status_category: Option<String>,
    pub platform: Option<String>,
    pub assignee: Option<String>,
    pub labels: Option<String>,
    pub story_points: Option<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
    pub status_category_changed: Option<String>,
    pub sprint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusCategory {
    Done,
    InProgress,
    ToDo,
    #[default]
    Other,
}

impl StatusCategory {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "Done" => StatusCategory::Done,
            "In Progress" => StatusCategory::InProgress,
            "To Do" => StatusCategory::ToDo,
            _ => StatusCategory::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCategory::Done => "Done",
            StatusCategory::InProgress => "In Progress",
            StatusCategory::ToDo => "To Do",
            StatusCategory::Other => "Other",
        }
    }
}

/// A row of the platform or label breakdown. `group` holds the platform or
/// the label, depending on which table the row belongs to. It is left out of
/// the serialized row; `MetricsTable` writes it under the table's key column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupMetrics {
    #[serde(skip)]
    pub group: String,
    #[serde(rename = "Completed_Story_Points")]
    pub completed_story_points: f64,
    #[serde(rename = "Completed_Items")]
    pub completed_items: u32,
    #[serde(rename = "Avg_Story_Points")]
    pub avg_story_points: f64,
    /// Full-time contributors only
    #[serde(rename = "Contributors")]
    pub contributors: u32,
    #[serde(rename = "Avg_Capacity_Per_Contributor")]
    pub avg_capacity_per_contributor: f64,
    #[serde(rename = "Total_Planned_Story_Points")]
    pub total_planned_story_points: f64,
    #[serde(rename = "First_Day_Planned_Story_Points")]
    pub first_day_planned_story_points: f64,
    #[serde(rename = "First_Day_Completed_Story_Points")]
    pub first_day_completed_story_points: f64,
    #[serde(rename = "Naive_Scope_Drop")]
    pub naive_scope_drop: f64,
    #[serde(rename = "Actual_Scope_Drop")]
    pub actual_scope_drop: f64,
}

/// A grouped table plus the name of its key column ("Platform" or "Label").
/// Serializes as a list of rows, each keyed by that column name.
#[derive(Debug, Clone)]
pub struct MetricsTable<'a> {
    pub key_column: &'static str,
    pub rows: &'a [GroupMetrics],
}

#[derive(Serialize)]
struct KeyedRow<'a> {
    #[serde(flatten)]
    key: BTreeMap<&'static str, &'a str>,
    #[serde(flatten)]
    metrics: &'a GroupMetrics,
}

impl Serialize for MetricsTable<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.rows.iter().map(|row| KeyedRow {
            key: BTreeMap::from([(self.key_column, row.group.as_str())]),
            metrics: row,
        }))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContributorRow {
    #[serde(rename = "Contributor")]
    pub contributor: String,
    #[serde(rename = "Completed_Story_Points")]
    pub completed_story_points: f64,
    #[serde(rename = "Completed_Items")]
    pub completed_items: u32,
    #[serde(rename = "Total_Items")]
    pub total_items: u32,
    #[serde(rename = "Avg_Story_Points")]
    pub avg_story_points: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeCapacityRow {
    #[serde(rename = "Platform")]
    pub platform: String,
    #[serde(rename = "Issue_Type")]
    pub issue_type: String,
    #[serde(rename = "Story_Points")]
    pub story_points: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClosedItemRow {
    #[serde(rename = "Issue_Key")]
    pub issue_key: String,
    #[serde(rename = "Platform")]
    pub platform: String,
    #[serde(rename = "Story_Points")]
    pub story_points: f64,
    #[serde(rename = "Issue_Type")]
    pub issue_type: String,
    #[serde(rename = "Assignee")]
    pub assignee: String,
    #[serde(rename = "Summary")]
    pub summary: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Status_Category")]
    pub status_category: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LabelInsights {
    pub labels: Vec<String>,
    pub multi_label_items: u32,
}

/// Sprint-relative facts about a single item.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemInsight {
    pub issue_key: String,
    pub closed_in_sprint: bool,
    pub originally_planned: bool,
    /// Positive when created before the sprint started, negative when after.
    pub days_created_before_start: Option<i64>,
    /// 1-based day of the sprint on which the item closed.
    pub closed_on_sprint_day: Option<i64>,
    /// Carries the AI-eligible label, whether or not it closed.
    pub ai_eligible: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SprintSummary {
    pub sprint_period: String,
    pub total_tasks: u32,
    pub active_platforms: u32,
    pub platforms: Vec<String>,
    pub total_completed: f64,
    pub total_planned: f64,
    pub originally_planned: f64,
    pub originally_completed: f64,
    pub ai_capacity: f64,
    pub ai_capacity_percentage: f64,
    pub completion_rate: f64,
    pub naive_scope_drop: f64,
    pub actual_scope_drop: f64,
    pub completed_items: u32,
    pub total_contributors: u32,
    pub full_time_contributors: u32,
    pub avg_capacity_per_contributor: f64,
    pub avg_story_points_per_item: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SummaryValue {
    Text(String),
    Count(u32),
    Points(f64),
    Percent(f64),
    List(Vec<String>),
}

impl SprintSummary {
    /// Flat key/value view of the summary, in display order.
    pub fn entries(&self) -> Vec<(&'static str, SummaryValue)> {
        vec![
            ("sprint_period", SummaryValue::Text(self.sprint_period.clone())),
            ("total_tasks", SummaryValue::Count(self.total_tasks)),
            ("active_platforms", SummaryValue::Count(self.active_platforms)),
            ("platforms", SummaryValue::List(self.platforms.clone())),
            ("total_completed", SummaryValue::Points(self.total_completed)),
            ("total_planned", SummaryValue::Points(self.total_planned)),
            (
                "originally_planned",
                SummaryValue::Points(self.originally_planned),
            ),
            (
                "originally_completed",
                SummaryValue::Points(self.originally_completed),
            ),
            ("ai_capacity", SummaryValue::Points(self.ai_capacity)),
            (
                "ai_capacity_percentage",
                SummaryValue::Percent(self.ai_capacity_percentage),
            ),
            ("completion_rate", SummaryValue::Percent(self.completion_rate)),
            ("naive_scope_drop", SummaryValue::Percent(self.naive_scope_drop)),
            (
                "actual_scope_drop",
                SummaryValue::Percent(self.actual_scope_drop),
            ),
            ("completed_items", SummaryValue::Count(self.completed_items)),
            (
                "total_contributors",
                SummaryValue::Count(self.total_contributors),
            ),
            (
                "full_time_contributors",
                SummaryValue::Count(self.full_time_contributors),
            ),
            (
                "avg_capacity_per_contributor",
                SummaryValue::Points(self.avg_capacity_per_contributor),
            ),
            (
                "avg_story_points_per_item",
                SummaryValue::Points(self.avg_story_points_per_item),
            ),
        ]
    }
}

/// A row the loader could not turn into a work item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    pub line: u64,
    pub reason: String,
}
