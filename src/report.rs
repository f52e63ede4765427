use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::*;
use serde::Serialize;

use crate::loader::LoadReport;
use crate::types::{
    ClosedItemRow, ContributorRow, GroupMetrics, ItemInsight, LabelInsights, SprintSummary,
    SummaryValue, TypeCapacityRow,
};
use crate::utils::{
    NumberFormatOptions, format_date_for_display, format_number, format_percent, format_points,
};
use crate::work_item::WorkItem;

const GROUP_TABLE_WIDTH: usize = 126;

/// Serialize any report value as JSON.
pub fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        simd_json::to_string_pretty(value)
    } else {
        simd_json::to_string(value)
    };
    json.context("Failed to serialize report to JSON")
}

/// An item together with its sprint-relative facts, for `issue` output.
#[derive(Debug, Serialize)]
pub struct ItemDetail<'a> {
    pub item: &'a WorkItem,
    pub insight: ItemInsight,
}

fn summary_label(key: &str) -> &'static str {
    match key {
        "sprint_period" => "Sprint period:",
        "total_tasks" => "Tasks:",
        "active_platforms" => "Active platforms:",
        "platforms" => "Platforms:",
        "total_completed" => "Completed:",
        "total_planned" => "Planned:",
        "originally_planned" => "Originally planned:",
        "originally_completed" => "Originally completed:",
        "ai_capacity" => "AI capacity:",
        "ai_capacity_percentage" => "AI capacity share:",
        "completion_rate" => "Completion rate:",
        "naive_scope_drop" => "Naive scope drop:",
        "actual_scope_drop" => "Actual scope drop:",
        "completed_items" => "Completed items:",
        "total_contributors" => "Contributors:",
        "full_time_contributors" => "Full-time contributors:",
        "avg_capacity_per_contributor" => "Avg capacity / contrib:",
        "avg_story_points_per_item" => "Avg SP / item:",
        _ => "",
    }
}

fn summary_value(value: &SummaryValue, options: &NumberFormatOptions) -> ColoredString {
    match value {
        SummaryValue::Text(text) => text.bold(),
        SummaryValue::Count(count) => format_number(*count, options).bold(),
        SummaryValue::Points(points) => {
            format!("{} SP", format_points(*points, options)).bright_blue().bold()
        }
        SummaryValue::Percent(percent) => format_percent(*percent).bright_yellow().bold(),
        SummaryValue::List(items) if items.is_empty() => "-".dimmed(),
        SummaryValue::List(items) => items.join(", ").normal(),
    }
}

pub fn render_summary(
    out: &mut impl Write,
    summary: &SprintSummary,
    options: &NumberFormatOptions,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "SPRINT DELIVERY SUMMARY".cyan().bold())?;
    writeln!(out, "{}", "=======================".cyan().bold())?;
    writeln!(out)?;

    for (key, value) in summary.entries() {
        writeln!(
            out,
            "{:<25} {}",
            summary_label(key),
            summary_value(&value, options)
        )?;
    }
    Ok(())
}

/// Platform or label breakdown. `key_column` names the first column.
pub fn render_group_table(
    out: &mut impl Write,
    title: &str,
    key_column: &str,
    rows: &[GroupMetrics],
    options: &NumberFormatOptions,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", title.cyan().bold())?;
    writeln!(out)?;

    if rows.is_empty() {
        writeln!(out, "{}", "No data for this selection.".dimmed())?;
        return Ok(());
    }

    writeln!(
        out,
        "{:<20} {:>10} {:>6} {:>7} {:>8} {:>8} {:>9} {:>11} {:>11} {:>10} {:>11}",
        key_column,
        "Done SP",
        "Items",
        "Avg SP",
        "FT Ctrb",
        "Avg Cap",
        "Planned",
        "Day1 Plan",
        "Day1 Done",
        "Naive %",
        "Actual %"
    )?;
    writeln!(out, "{}", "─".repeat(GROUP_TABLE_WIDTH).dimmed())?;

    for row in rows {
        writeln!(
            out,
            "{:<20} {:>10} {:>6} {:>7} {:>8} {:>8} {:>9} {:>11} {:>11} {:>10} {:>11}",
            row.group.bold(),
            format_points(row.completed_story_points, options).bright_blue(),
            format_number(row.completed_items, options),
            format_points(row.avg_story_points, options).dimmed(),
            format_number(row.contributors, options),
            format_points(row.avg_capacity_per_contributor, options),
            format_points(row.total_planned_story_points, options),
            format_points(row.first_day_planned_story_points, options).dimmed(),
            format_points(row.first_day_completed_story_points, options).dimmed(),
            format_percent(row.naive_scope_drop),
            format_percent(row.actual_scope_drop).yellow()
        )?;
    }

    writeln!(out, "{}", "─".repeat(GROUP_TABLE_WIDTH).dimmed())?;
    let completed: f64 = rows.iter().map(|r| r.completed_story_points).sum();
    let items: u32 = rows.iter().map(|r| r.completed_items).sum();
    writeln!(
        out,
        "{:<20} {:>10} {:>6}",
        format!("Total ({})", rows.len()),
        format_points(completed, options).bright_blue().bold(),
        format_number(items, options).bold()
    )?;
    Ok(())
}

pub fn render_label_insights(out: &mut impl Write, insights: &LabelInsights) -> Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "{:<25} {}",
        "Distinct labels:",
        insights.labels.len().to_string().bold()
    )?;
    writeln!(
        out,
        "{:<25} {}",
        "Multi-label items:",
        insights.multi_label_items.to_string().bold()
    )?;
    if !insights.labels.is_empty() {
        writeln!(out, "{}", insights.labels.join(", ").dimmed())?;
    }
    Ok(())
}

pub fn render_contributors(
    out: &mut impl Write,
    platform: &str,
    label: Option<&str>,
    rows: &[ContributorRow],
    options: &NumberFormatOptions,
) -> Result<()> {
    let title = match label {
        Some(label) => format!("CONTRIBUTORS: {platform} / {label}"),
        None => format!("CONTRIBUTORS: {platform}"),
    };
    writeln!(out)?;
    writeln!(out, "{}", title.cyan().bold())?;
    writeln!(out)?;

    if rows.is_empty() {
        writeln!(out, "{}", "No contributors for this selection.".dimmed())?;
        return Ok(());
    }

    writeln!(
        out,
        "{:<28} {:>10} {:>10} {:>8} {:>8}",
        "Contributor", "Done SP", "Done Items", "Items", "Avg SP"
    )?;
    writeln!(out, "{}", "─".repeat(68).dimmed())?;
    for row in rows {
        writeln!(
            out,
            "{:<28} {:>10} {:>10} {:>8} {:>8}",
            row.contributor,
            format_points(row.completed_story_points, options)
                .bright_blue()
                .bold(),
            format_number(row.completed_items, options),
            format_number(row.total_items, options).dimmed(),
            format_points(row.avg_story_points, options)
        )?;
    }
    Ok(())
}

pub fn render_capacity_by_type(
    out: &mut impl Write,
    rows: &[TypeCapacityRow],
    options: &NumberFormatOptions,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "COMPLETED CAPACITY BY ISSUE TYPE".cyan().bold())?;
    writeln!(out)?;

    if rows.is_empty() {
        writeln!(out, "{}", "Nothing closed in this sprint.".dimmed())?;
        return Ok(());
    }

    writeln!(out, "{:<20} {:<20} {:>10}", "Platform", "Issue Type", "SP")?;
    writeln!(out, "{}", "─".repeat(52).dimmed())?;
    for row in rows {
        writeln!(
            out,
            "{:<20} {:<20} {:>10}",
            row.platform,
            row.issue_type,
            format_points(row.story_points, options).bright_blue()
        )?;
    }
    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

pub fn render_closed_items(
    out: &mut impl Write,
    rows: &[ClosedItemRow],
    options: &NumberFormatOptions,
) -> Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "{} ({})",
        "CLOSED IN SPRINT".cyan().bold(),
        rows.len()
    )?;
    writeln!(out)?;

    if rows.is_empty() {
        return Ok(());
    }

    writeln!(
        out,
        "{:<12} {:<12} {:>6} {:<12} {:<20} {}",
        "Key", "Platform", "SP", "Type", "Assignee", "Summary"
    )?;
    writeln!(out, "{}", "─".repeat(110).dimmed())?;
    for row in rows {
        writeln!(
            out,
            "{:<12} {:<12} {:>6} {:<12} {:<20} {}",
            row.issue_key.bold(),
            row.platform,
            format_points(row.story_points, options).bright_blue(),
            truncate(&row.issue_type, 12),
            truncate(&row.assignee, 20),
            truncate(&row.summary, 40).dimmed()
        )?;
    }
    Ok(())
}

fn yes_no(value: bool) -> ColoredString {
    if value { "yes".green() } else { "no".dimmed() }
}

pub fn render_item(
    out: &mut impl Write,
    detail: &ItemDetail<'_>,
    options: &NumberFormatOptions,
) -> Result<()> {
    let item = detail.item;
    let insight = &detail.insight;
    let date = |at: Option<chrono::NaiveDateTime>| match at {
        Some(at) => format_date_for_display(at.date()),
        None => "-".to_string(),
    };

    writeln!(out)?;
    writeln!(out, "{} {}", item.issue_key().cyan().bold(), item.summary())?;
    writeln!(out, "{}", "─".repeat(60).dimmed())?;
    writeln!(out, "{:<22} {}", "Type:", item.issue_type())?;
    writeln!(
        out,
        "{:<22} {} ({})",
        "Status:",
        item.status(),
        item.status_category().as_str().dimmed()
    )?;
    writeln!(out, "{:<22} {}", "Platform:", item.platform())?;
    writeln!(out, "{:<22} {}", "Assignee:", item.contributor_name())?;
    writeln!(
        out,
        "{:<22} {}",
        "Story points:",
        format_points(item.story_points(), options).bright_blue().bold()
    )?;
    let labels: Vec<&str> = item.labels().iter().map(String::as_str).collect();
    writeln!(out, "{:<22} {}", "Labels:", labels.join(", "))?;
    writeln!(out, "{:<22} {}", "Created:", date(item.created_at()))?;
    writeln!(out, "{:<22} {}", "Closed:", date(item.closed_at()))?;
    writeln!(out)?;
    writeln!(out, "{:<22} {}", "Closed in sprint:", yes_no(insight.closed_in_sprint))?;
    writeln!(
        out,
        "{:<22} {}",
        "Originally planned:",
        yes_no(insight.originally_planned)
    )?;
    writeln!(out, "{:<22} {}", "AI eligible:", yes_no(insight.ai_eligible))?;
    if let Some(days) = insight.days_created_before_start {
        let text = if days >= 0 {
            format!("{days} day(s) before sprint start")
        } else {
            format!("{} day(s) after sprint start", -days)
        };
        writeln!(out, "{:<22} {}", "Created:", text.dimmed())?;
    }
    if let Some(day) = insight.closed_on_sprint_day {
        writeln!(out, "{:<22} day {day}", "Closed on:")?;
    }
    Ok(())
}

pub fn render_datasets(
    out: &mut impl Write,
    dir: &Path,
    datasets: &[PathBuf],
    selected: Option<&Path>,
) -> Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "{} {}",
        "DATASETS in".cyan().bold(),
        dir.display().to_string().cyan().bold()
    )?;
    writeln!(out)?;

    if datasets.is_empty() {
        writeln!(out, "{}", "No CSV files found.".dimmed())?;
        return Ok(());
    }

    for path in datasets {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        if selected == Some(path.as_path()) {
            writeln!(out, "* {}", name.green().bold())?;
        } else {
            writeln!(out, "  {name}")?;
        }
    }
    Ok(())
}

/// Loader diagnostics. Prints nothing for a clean load.
pub fn render_load_report(out: &mut impl Write, path: &Path, report: &LoadReport) -> Result<()> {
    if report.skipped_count == 0 && report.dropped_without_platform == 0 {
        return Ok(());
    }

    writeln!(
        out,
        "{}",
        format!(
            "{}: {} of {} rows loaded ({} malformed, {} without platform)",
            path.display(),
            report.items.len(),
            report.total_rows,
            report.skipped_count,
            report.dropped_without_platform
        )
        .dimmed()
    )?;
    for sample in &report.skipped_samples {
        writeln!(
            out,
            "{}",
            format!("  line {}: {}", sample.line, sample.reason).dimmed()
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IssueRecord;

    fn rendered(render: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        colored::control::set_override(false);
        let mut out = Vec::new();
        render(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_summary_lists_every_entry() {
        let summary = SprintSummary {
            sprint_period: "01 Jul 2025 → 14 Jul 2025".to_string(),
            total_completed: 62.5,
            completion_rate: 62.5,
            platforms: vec!["Backend".to_string()],
            ..Default::default()
        };
        let text = rendered(|out| render_summary(out, &summary, &NumberFormatOptions::default()));

        assert!(text.contains("01 Jul 2025 → 14 Jul 2025"));
        assert!(text.contains("62.5 SP"));
        assert!(text.contains("62.5%"));
        assert!(text.contains("Backend"));
        assert_eq!(
            text.lines().filter(|l| l.contains(": ")).count(),
            summary.entries().len()
        );
    }

    #[test]
    fn test_group_table_rows_and_total() {
        let rows = vec![
            GroupMetrics {
                group: "Backend".to_string(),
                completed_story_points: 8.0,
                completed_items: 2,
                ..Default::default()
            },
            GroupMetrics {
                group: "Frontend".to_string(),
                completed_story_points: 3.0,
                completed_items: 1,
                ..Default::default()
            },
        ];
        let text = rendered(|out| {
            render_group_table(out, "BY PLATFORM", "Platform", &rows, &NumberFormatOptions::default())
        });

        assert!(text.contains("Backend"));
        assert!(text.contains("Frontend"));
        assert!(text.contains("Total (2)"));
        assert!(text.contains("11.0"));
    }

    #[test]
    fn test_empty_tables() {
        let text = rendered(|out| {
            render_group_table(out, "BY LABEL", "Label", &[], &NumberFormatOptions::default())
        });
        assert!(text.contains("No data"));

        let text = rendered(|out| {
            render_contributors(out, "Backend", None, &[], &NumberFormatOptions::default())
        });
        assert!(text.contains("No contributors"));
    }

    #[test]
    fn test_item_detail() {
        let item = WorkItem::from_record(&IssueRecord {
            issue_key: Some("BE-7".to_string()),
            summary: Some("Cache warmup".to_string()),
            story_points: Some("3".to_string()),
            labels: Some("vibe-codable".to_string()),
            ..Default::default()
        });
        let detail = ItemDetail {
            item: &item,
            insight: ItemInsight {
                issue_key: "BE-7".to_string(),
                ai_eligible: true,
                days_created_before_start: Some(-2),
                ..Default::default()
            },
        };
        let text = rendered(|out| render_item(out, &detail, &NumberFormatOptions::default()));

        assert!(text.contains("BE-7 Cache warmup"));
        assert!(text.contains("Unassigned"));
        assert!(text.contains("2 day(s) after sprint start"));
        assert!(text.contains("vibe-codable"));
    }

    #[test]
    fn test_datasets_marks_selection() {
        let dir = Path::new("datasets");
        let datasets = vec![dir.join("a.csv"), dir.join("b.csv")];
        let text = rendered(|out| render_datasets(out, dir, &datasets, Some(datasets[1].as_path())));

        assert!(text.contains("  a.csv"));
        assert!(text.contains("* b.csv"));
    }

    #[test]
    fn test_clean_load_report_prints_nothing() {
        let report = LoadReport::default();
        let text = rendered(|out| render_load_report(out, Path::new("x.csv"), &report));
        assert!(text.is_empty());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long summary", 6), "a lon…");
    }

    #[test]
    fn test_to_json_uses_column_names() {
        let row = TypeCapacityRow {
            platform: "Backend".to_string(),
            issue_type: "Story".to_string(),
            story_points: 5.0,
        };
        let json = to_json(&row, false).unwrap();
        assert!(json.contains("\"Issue_Type\":\"Story\""));
        assert!(json.contains("\"Story_Points\":5"));
    }

    #[test]
    fn test_metrics_table_json_keyed_by_column() {
        let rows = vec![GroupMetrics {
            group: "Backend".to_string(),
            completed_items: 2,
            ..Default::default()
        }];
        let platforms = crate::types::MetricsTable {
            key_column: "Platform",
            rows: &rows,
        };
        let json = to_json(&platforms, false).unwrap();
        assert!(json.starts_with("[{\"Platform\":\"Backend\","));
        assert!(json.contains("\"Completed_Items\":2"));
        assert!(!json.contains("Group"));

        let labels = crate::types::MetricsTable {
            key_column: "Label",
            rows: &rows,
        };
        let json = to_json(&labels, false).unwrap();
        assert!(json.contains("\"Label\":\"Backend\""));
        assert!(!json.contains("Platform"));
    }
}
