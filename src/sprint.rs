use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

use chrono::NaiveDate;

use crate::debug_log;
use crate::types::{
    ClosedItemRow, ContributorRow, GroupMetrics, ItemInsight, LabelInsights, SprintSummary,
    TypeCapacityRow,
};
use crate::utils::{format_sprint_period, ratio, round1};
use crate::work_item::WorkItem;

/// Closed points an assignee needs before counting as a full-time contributor.
pub const DEFAULT_FULL_TIME_THRESHOLD: f64 = 5.0;

/// Label marking work done with AI assistance.
pub const DEFAULT_AI_LABEL: &str = "vibe-codable";

/// Bucket for unlabeled items in the label breakdown.
pub const NO_LABEL: &str = "No Label";

#[derive(Debug, Clone, PartialEq)]
pub struct MetricThresholds {
    pub full_time_threshold: f64,
    pub ai_label: String,
}

impl Default for MetricThresholds {
    fn default() -> Self {
        Self {
            full_time_threshold: DEFAULT_FULL_TIME_THRESHOLD,
            ai_label: DEFAULT_AI_LABEL.to_string(),
        }
    }
}

/// Positions into the aggregator's item list. Membership is by index, so
/// two field-identical items stay distinct.
#[derive(Debug, Default)]
struct ItemSet {
    indices: Vec<usize>,
    members: Vec<bool>,
}

impl ItemSet {
    fn from_predicate(items: &[WorkItem], predicate: impl Fn(&WorkItem) -> bool) -> Self {
        let members: Vec<bool> = items.iter().map(predicate).collect();
        let indices = members
            .iter()
            .enumerate()
            .filter_map(|(i, &member)| member.then_some(i))
            .collect();
        Self { indices, members }
    }

    fn contains(&self, index: usize) -> bool {
        self.members.get(index).copied().unwrap_or(false)
    }

    fn len(&self) -> usize {
        self.indices.len()
    }
}

/// Running totals for one platform or label.
#[derive(Debug, Default)]
struct GroupTally {
    total_planned_points: f64,
    completed_points: f64,
    originally_planned_points: f64,
    originally_completed_points: f64,
    completed_items: u32,
    closed_points_by_assignee: BTreeMap<String, f64>,
}

impl GroupTally {
    fn add(&mut self, item: &WorkItem, closed: bool, originally_planned: bool) {
        let points = item.story_points();
        self.total_planned_points += points;

        if closed {
            self.completed_points += points;
            self.completed_items += 1;
            if !item.assignee().is_empty() {
                *self
                    .closed_points_by_assignee
                    .entry(item.assignee().to_string())
                    .or_insert(0.0) += points;
            }
        }

        if originally_planned {
            self.originally_planned_points += points;
            if closed {
                self.originally_completed_points += points;
            }
        }
    }

    fn full_time_contributors(&self, threshold: f64) -> u32 {
        count_full_time(&self.closed_points_by_assignee, threshold)
    }

    fn into_row(self, group: String, threshold: f64) -> GroupMetrics {
        let contributors = self.full_time_contributors(threshold);

        GroupMetrics {
            group,
            completed_story_points: round1(self.completed_points),
            completed_items: self.completed_items,
            avg_story_points: round1(ratio(
                self.completed_points,
                self.completed_items as f64,
            )),
            contributors,
            avg_capacity_per_contributor: round1(ratio(
                self.completed_points,
                contributors as f64,
            )),
            total_planned_story_points: round1(self.total_planned_points),
            first_day_planned_story_points: round1(self.originally_planned_points),
            first_day_completed_story_points: round1(self.originally_completed_points),
            naive_scope_drop: round1(scope_drop(
                self.total_planned_points,
                self.completed_points,
            )),
            actual_scope_drop: round1(scope_drop(
                self.originally_planned_points,
                self.originally_completed_points,
            )),
        }
    }
}

#[derive(Debug, Default)]
struct ContributorTally {
    completed_points: f64,
    completed_items: u32,
    total_items: u32,
}

fn count_full_time(points_by_assignee: &BTreeMap<String, f64>, threshold: f64) -> u32 {
    points_by_assignee
        .values()
        .filter(|&&points| points >= threshold)
        .count() as u32
}

/// Percentage of `planned` that was not completed.
fn scope_drop(planned: f64, completed: f64) -> f64 {
    ratio(planned - completed, planned) * 100.0
}

/// One analytic session over a fixed set of items and a sprint window.
/// Derived sets are computed on first use and kept for the lifetime of the
/// aggregator; build a new one to ask about a different window.
pub struct SprintAggregator {
    items: Vec<WorkItem>,
    sprint_start: NaiveDate,
    sprint_end: NaiveDate,
    thresholds: MetricThresholds,
    closed: OnceLock<ItemSet>,
    originally_planned: OnceLock<ItemSet>,
    platform_metrics: OnceLock<Vec<GroupMetrics>>,
}

impl SprintAggregator {
    pub fn new(items: Vec<WorkItem>, sprint_start: NaiveDate, sprint_end: NaiveDate) -> Self {
        Self::with_thresholds(items, sprint_start, sprint_end, MetricThresholds::default())
    }

    pub fn with_thresholds(
        items: Vec<WorkItem>,
        sprint_start: NaiveDate,
        sprint_end: NaiveDate,
        thresholds: MetricThresholds,
    ) -> Self {
        Self {
            items,
            sprint_start,
            sprint_end,
            thresholds,
            closed: OnceLock::new(),
            originally_planned: OnceLock::new(),
            platform_metrics: OnceLock::new(),
        }
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn sprint_start(&self) -> NaiveDate {
        self.sprint_start
    }

    pub fn sprint_end(&self) -> NaiveDate {
        self.sprint_end
    }

    pub fn thresholds(&self) -> &MetricThresholds {
        &self.thresholds
    }

    fn closed_set(&self) -> &ItemSet {
        self.closed.get_or_init(|| {
            let set = ItemSet::from_predicate(&self.items, |item| {
                item.is_closed(self.sprint_start, self.sprint_end)
            });
            debug_log::log(
                "CACHE",
                "closed_items",
                &format!("{} of {} items", set.len(), self.items.len()),
            );
            set
        })
    }

    fn originally_planned_set(&self) -> &ItemSet {
        self.originally_planned.get_or_init(|| {
            let set = ItemSet::from_predicate(&self.items, |item| {
                item.is_originally_planned(self.sprint_start)
            });
            debug_log::log(
                "CACHE",
                "originally_planned_items",
                &format!("{} of {} items", set.len(), self.items.len()),
            );
            set
        })
    }

    /// Items closed inside the sprint window, in input order.
    pub fn closed_items(&self) -> Vec<&WorkItem> {
        self.closed_set()
            .indices
            .iter()
            .map(|&i| &self.items[i])
            .collect()
    }

    /// Items that existed on the sprint's first day, in input order.
    pub fn originally_planned_items(&self) -> Vec<&WorkItem> {
        self.originally_planned_set()
            .indices
            .iter()
            .map(|&i| &self.items[i])
            .collect()
    }

    fn sum_points(&self, set: &ItemSet) -> f64 {
        set.indices
            .iter()
            .map(|&i| self.items[i].story_points())
            .sum()
    }

    fn raw_completed_points(&self) -> f64 {
        self.sum_points(self.closed_set())
    }

    fn raw_planned_points(&self) -> f64 {
        self.items.iter().map(WorkItem::story_points).sum()
    }

    fn raw_originally_planned_points(&self) -> f64 {
        self.sum_points(self.originally_planned_set())
    }

    fn raw_originally_completed_points(&self) -> f64 {
        let planned = self.originally_planned_set();
        self.closed_set()
            .indices
            .iter()
            .filter(|&&i| planned.contains(i))
            .map(|&i| self.items[i].story_points())
            .sum()
    }

    fn raw_ai_capacity(&self) -> f64 {
        self.closed_set()
            .indices
            .iter()
            .map(|&i| &self.items[i])
            .filter(|item| item.has_label(&self.thresholds.ai_label))
            .map(WorkItem::story_points)
            .sum()
    }

    pub fn total_completed_points(&self) -> f64 {
        round1(self.raw_completed_points())
    }

    /// Everything tagged to the sprint, whenever it was created.
    pub fn total_planned_points(&self) -> f64 {
        round1(self.raw_planned_points())
    }

    pub fn originally_planned_points(&self) -> f64 {
        round1(self.raw_originally_planned_points())
    }

    /// Points of items both originally planned and closed in the window.
    pub fn originally_completed_points(&self) -> f64 {
        round1(self.raw_originally_completed_points())
    }

    pub fn completed_item_count(&self) -> u32 {
        self.closed_set().len() as u32
    }

    pub fn total_item_count(&self) -> u32 {
        self.items.len() as u32
    }

    /// Distinct non-empty assignees across all items.
    pub fn total_contributors(&self) -> u32 {
        self.items
            .iter()
            .map(WorkItem::assignee)
            .filter(|assignee| !assignee.is_empty())
            .collect::<BTreeSet<_>>()
            .len() as u32
    }

    pub fn average_story_points_per_item(&self) -> f64 {
        round1(ratio(
            self.raw_completed_points(),
            self.completed_item_count() as f64,
        ))
    }

    pub fn full_time_contributor_count(&self) -> u32 {
        let closed = self.closed_set();
        let mut tally = GroupTally::default();
        for (i, item) in self.items.iter().enumerate() {
            tally.add(item, closed.contains(i), false);
        }
        tally.full_time_contributors(self.thresholds.full_time_threshold)
    }

    pub fn average_capacity_per_contributor(&self) -> f64 {
        round1(ratio(
            self.raw_completed_points(),
            self.full_time_contributor_count() as f64,
        ))
    }

    /// Drop measured against everything ever tagged to the sprint.
    pub fn naive_scope_drop(&self) -> f64 {
        round1(scope_drop(
            self.raw_planned_points(),
            self.raw_completed_points(),
        ))
    }

    /// Drop measured only against work that existed at sprint start.
    pub fn actual_scope_drop(&self) -> f64 {
        round1(scope_drop(
            self.raw_originally_planned_points(),
            self.raw_originally_completed_points(),
        ))
    }

    pub fn ai_capacity(&self) -> f64 {
        round1(self.raw_ai_capacity())
    }

    pub fn ai_capacity_percentage(&self) -> f64 {
        round1(ratio(self.raw_ai_capacity(), self.raw_completed_points()) * 100.0)
    }

    /// Completed share of all planned points, capped at 100.
    pub fn completion_rate(&self) -> f64 {
        round1((ratio(self.raw_completed_points(), self.raw_planned_points()) * 100.0).min(100.0))
    }

    /// Sorted distinct platform tags, ignoring empty ones.
    pub fn active_platforms(&self) -> Vec<String> {
        self.items
            .iter()
            .map(WorkItem::platform)
            .filter(|platform| !platform.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn platform_metrics(&self) -> &[GroupMetrics] {
        self.platform_metrics.get_or_init(|| {
            let closed = self.closed_set();
            let planned = self.originally_planned_set();
            let mut groups: BTreeMap<&str, GroupTally> = BTreeMap::new();

            for (i, item) in self.items.iter().enumerate() {
                if item.platform().is_empty() {
                    continue;
                }
                groups.entry(item.platform()).or_default().add(
                    item,
                    closed.contains(i),
                    planned.contains(i),
                );
            }

            debug_log::log(
                "CACHE",
                "platform_metrics",
                &format!("{} platforms", groups.len()),
            );

            groups
                .into_iter()
                .map(|(platform, tally)| {
                    tally.into_row(platform.to_string(), self.thresholds.full_time_threshold)
                })
                .collect()
        })
    }

    /// Platform-style metrics per label, for one platform. An item counts
    /// toward every label it carries.
    pub fn label_metrics(&self, platform: &str) -> Vec<GroupMetrics> {
        let closed = self.closed_set();
        let planned = self.originally_planned_set();
        let mut groups: BTreeMap<&str, GroupTally> = BTreeMap::new();

        for (i, item) in self.items.iter().enumerate() {
            if item.platform() != platform {
                continue;
            }

            let is_closed = closed.contains(i);
            let is_planned = planned.contains(i);

            if item.labels().is_empty() {
                groups
                    .entry(NO_LABEL)
                    .or_default()
                    .add(item, is_closed, is_planned);
            }
            for label in item.labels() {
                groups
                    .entry(label.as_str())
                    .or_default()
                    .add(item, is_closed, is_planned);
            }
        }

        let threshold = self.thresholds.full_time_threshold;
        groups
            .into_iter()
            .filter(|(_, tally)| {
                tally.completed_points > 0.0
                    || tally.completed_items > 0
                    || tally.full_time_contributors(threshold) > 0
            })
            .map(|(label, tally)| tally.into_row(label.to_string(), threshold))
            .collect()
    }

    /// Per-assignee load for one platform, optionally narrowed to a label.
    /// Sorted by completed points, highest first.
    pub fn contributor_breakdown(&self, platform: &str, label: Option<&str>) -> Vec<ContributorRow> {
        let closed = self.closed_set();
        let mut contributors: BTreeMap<&str, ContributorTally> = BTreeMap::new();

        for (i, item) in self.items.iter().enumerate() {
            if item.platform() != platform {
                continue;
            }
            if let Some(label) = label
                && !item.has_label(label)
            {
                continue;
            }

            let tally = contributors.entry(item.contributor_name()).or_default();
            tally.total_items += 1;
            if closed.contains(i) {
                tally.completed_points += item.story_points();
                tally.completed_items += 1;
            }
        }

        let mut rows: Vec<ContributorRow> = contributors
            .into_iter()
            .map(|(contributor, tally)| ContributorRow {
                contributor: contributor.to_string(),
                completed_story_points: round1(tally.completed_points),
                completed_items: tally.completed_items,
                total_items: tally.total_items,
                avg_story_points: round1(ratio(
                    tally.completed_points,
                    tally.completed_items as f64,
                )),
            })
            .collect();

        // Stable sort keeps name order among equal totals.
        rows.sort_by(|a, b| b.completed_story_points.total_cmp(&a.completed_story_points));
        rows
    }

    /// Closed points per (platform, issue type).
    pub fn capacity_by_type(&self) -> Vec<TypeCapacityRow> {
        let mut capacity: BTreeMap<(&str, &str), f64> = BTreeMap::new();
        for item in self.closed_items() {
            *capacity
                .entry((item.platform(), item.issue_type()))
                .or_insert(0.0) += item.story_points();
        }

        capacity
            .into_iter()
            .map(|((platform, issue_type), points)| TypeCapacityRow {
                platform: platform.to_string(),
                issue_type: issue_type.to_string(),
                story_points: round1(points),
            })
            .collect()
    }

    pub fn closed_item_rows(&self) -> Vec<ClosedItemRow> {
        self.closed_items()
            .into_iter()
            .map(|item| ClosedItemRow {
                issue_key: item.issue_key().to_string(),
                platform: item.platform().to_string(),
                story_points: item.story_points(),
                issue_type: item.issue_type().to_string(),
                assignee: item.assignee().to_string(),
                summary: item.summary().to_string(),
                status: item.status().to_string(),
                status_category: item.status_category().as_str().to_string(),
            })
            .collect()
    }

    pub fn label_insights(&self) -> LabelInsights {
        let labels: BTreeSet<&str> = self
            .items
            .iter()
            .flat_map(|item| item.labels().iter().map(String::as_str))
            .collect();

        LabelInsights {
            labels: labels.into_iter().map(str::to_string).collect(),
            multi_label_items: self
                .items
                .iter()
                .filter(|item| item.labels().len() > 1)
                .count() as u32,
        }
    }

    /// Look an item up by key, ignoring case.
    pub fn find_item(&self, issue_key: &str) -> Option<&WorkItem> {
        let issue_key = issue_key.trim();
        self.items
            .iter()
            .find(|item| item.issue_key().eq_ignore_ascii_case(issue_key))
    }

    /// Keys containing `fragment`, ignoring case.
    pub fn similar_keys(&self, fragment: &str, limit: usize) -> Vec<&str> {
        let fragment = fragment.trim().to_uppercase();
        self.items
            .iter()
            .map(WorkItem::issue_key)
            .filter(|key| !key.is_empty() && key.to_uppercase().contains(&fragment))
            .take(limit)
            .collect()
    }

    pub fn item_insight(&self, item: &WorkItem) -> ItemInsight {
        let closed_in_sprint = item.is_closed(self.sprint_start, self.sprint_end);

        ItemInsight {
            issue_key: item.issue_key().to_string(),
            closed_in_sprint,
            originally_planned: item.is_originally_planned(self.sprint_start),
            days_created_before_start: item
                .created_at()
                .map(|created| (self.sprint_start - created.date()).num_days()),
            closed_on_sprint_day: item
                .closed_at()
                .filter(|_| closed_in_sprint)
                .map(|closed| (closed.date() - self.sprint_start).num_days() + 1),
            ai_eligible: item.has_label(&self.thresholds.ai_label),
        }
    }

    pub fn summary(&self) -> SprintSummary {
        let platforms = self.active_platforms();

        SprintSummary {
            sprint_period: format_sprint_period(self.sprint_start, self.sprint_end),
            total_tasks: self.total_item_count(),
            active_platforms: platforms.len() as u32,
            platforms,
            total_completed: self.total_completed_points(),
            total_planned: self.total_planned_points(),
            originally_planned: self.originally_planned_points(),
            originally_completed: self.originally_completed_points(),
            ai_capacity: self.ai_capacity(),
            ai_capacity_percentage: self.ai_capacity_percentage(),
            completion_rate: self.completion_rate(),
            naive_scope_drop: self.naive_scope_drop(),
            actual_scope_drop: self.actual_scope_drop(),
            completed_items: self.completed_item_count(),
            total_contributors: self.total_contributors(),
            full_time_contributors: self.full_time_contributor_count(),
            avg_capacity_per_contributor: self.average_capacity_per_contributor(),
            avg_story_points_per_item: self.average_story_points_per_item(),
        }
    }
}

impl fmt::Display for SprintAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sprint({} to {}, {} items, {} platforms)",
            self.sprint_start,
            self.sprint_end,
            self.items.len(),
            self.active_platforms().len()
        )
    }
}
