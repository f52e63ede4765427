use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use phf::phf_map;
use rayon::prelude::*;

use crate::debug_log;
use crate::types::{IssueRecord, SkippedRow, StatusCategory};
use crate::utils::warn_once;
use crate::work_item::WorkItem;

/// Dataset picked when no file is given and it exists.
pub const DEFAULT_DATASET: &str = "q3_sprint_2_2025.csv";

const MAX_SKIPPED_SAMPLES: usize = 3;

/// Platform spellings seen across Jira projects, mapped to the names the
/// reports use. Unlisted values pass through unchanged.
static PLATFORM_ALIASES: phf::Map<&'static str, &'static str> = phf_map! {
    "Backend" => "Backend",
    "backend" => "Backend",
    "BE" => "Backend",
    "DataAnalytics" => "DA",
    "Data Analytics" => "DA",
    "DA" => "DA",
    "DataScience" => "DS",
    "Data Science" => "DS",
    "DS" => "DS",
    "Frontend" => "Frontend",
    "FE" => "Frontend",
    "Mobile" => "Mobile",
    "QA" => "QA",
};

pub fn canonical_platform(name: &str) -> String {
    let name = name.trim();
    PLATFORM_ALIASES
        .get(name)
        .map(|canonical| canonical.to_string())
        .unwrap_or_else(|| name.to_string())
}

#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Drop rows whose platform is empty.
    pub require_platform: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            require_platform: true,
        }
    }
}

/// Outcome of loading one export.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub items: Vec<WorkItem>,
    /// Data rows read, including skipped and dropped ones.
    pub total_rows: usize,
    pub skipped_count: usize,
    pub skipped_samples: Vec<SkippedRow>,
    pub dropped_without_platform: usize,
    pub platform_column: Option<String>,
    pub story_points_column: Option<String>,
}

/// Header positions for the canonical fields.
#[derive(Debug, Default)]
struct ColumnMap {
    issue_key: Option<usize>,
    summary: Option<usize>,
    issue_type: Option<usize>,
    status: Option<usize>,
    status_category: Option<usize>,
    platform: Option<usize>,
    assignee: Option<usize>,
    labels: Vec<usize>,
    story_points: Option<usize>,
    created: Option<usize>,
    updated: Option<usize>,
    status_category_changed: Option<usize>,
    sprint: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &[String], rows: &[csv::StringRecord]) -> Self {
        let find = |aliases: &[&str]| {
            headers
                .iter()
                .position(|header| aliases.contains(&header.as_str()))
        };

        Self {
            issue_key: find(&["Issue key", "Issue Key", "Issue_Key", "Key"]),
            summary: find(&["Summary"]),
            issue_type: find(&["Issue Type", "Issue_Type"]),
            status: find(&["Status"]),
            status_category: find(&["Status Category", "Status_Category"]),
            platform: platform_column(headers, rows),
            assignee: find(&["Assignee"]),
            labels: headers
                .iter()
                .enumerate()
                .filter(|(_, header)| header.as_str() == "Labels")
                .map(|(index, _)| index)
                .collect(),
            story_points: story_points_column(headers),
            created: find(&["Created"]),
            updated: find(&["Updated"]),
            status_category_changed: find(&[
                "Status Category Changed",
                "Status_Category_Changed",
            ]),
            sprint: find(&["Sprint"]),
        }
    }

    fn to_record(&self, row: &csv::StringRecord) -> IssueRecord {
        let field = |index: Option<usize>| {
            index
                .and_then(|i| row.get(i))
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let labels: Vec<&str> = self
            .labels
            .iter()
            .filter_map(|&i| row.get(i))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .collect();

        IssueRecord {
            issue_key: field(self.issue_key),
            summary: field(self.summary),
            issue_type: field(self.issue_type),
            status: field(self.status),
            status_category: field(self.status_category),
            platform: field(self.platform).map(|p| canonical_platform(&p)),
            assignee: field(self.assignee),
            labels: (!labels.is_empty()).then(|| labels.join(",")),
            story_points: field(self.story_points),
            created: field(self.created),
            updated: field(self.updated),
            status_category_changed: field(self.status_category_changed),
            sprint: field(self.sprint),
        }
    }
}

/// The first "Story Points" header that isn't a rollup, else one of the
/// known fallbacks.
fn story_points_column(headers: &[String]) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.contains("Story Points") && !h.contains("Total") && !h.contains("Weekly"))
        .or_else(|| {
            headers
                .iter()
                .position(|h| h == "Custom field (Story Points)" || h == "Story_Points")
        })
}

fn platform_column(headers: &[String], rows: &[csv::StringRecord]) -> Option<usize> {
    if let Some(index) = headers.iter().position(|h| h == "Platform") {
        return Some(index);
    }
    if let Some(index) = headers.iter().position(|h| h == "Custom field (Platform)") {
        return Some(index);
    }

    // Otherwise the first platform-ish column that actually carries data.
    headers
        .iter()
        .enumerate()
        .filter(|(_, header)| header.contains("Platform"))
        .map(|(index, _)| index)
        .find(|&index| {
            rows.iter()
                .any(|row| row.get(index).is_some_and(|v| !v.trim().is_empty()))
        })
}

/// Load a Jira CSV export from disk.
pub fn load_csv(path: &Path, options: &LoaderOptions) -> Result<LoadReport> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open dataset {}", path.display()))?;
    let report = load_reader(file, options)
        .with_context(|| format!("Failed to load dataset {}", path.display()))?;

    debug_log::log(
        "LOADER",
        "load_csv",
        &format!(
            "{}: {} items from {} rows",
            path.display(),
            report.items.len(),
            report.total_rows
        ),
    );
    if report.skipped_count > 0 {
        warn_once(format!(
            "WARNING: Skipped {} malformed row(s) in {}",
            report.skipped_count,
            path.display()
        ));
    }

    Ok(report)
}

pub fn load_reader(reader: impl Read, options: &LoaderOptions) -> Result<LoadReport> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .context("Failed to read header row")?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    if headers.iter().all(String::is_empty) {
        anyhow::bail!("Dataset has no header row");
    }

    let mut report = LoadReport::default();
    let mut rows = Vec::new();
    for result in csv_reader.records() {
        report.total_rows += 1;
        match result {
            Ok(row) => rows.push(row),
            Err(e) if e.is_io_error() => {
                return Err(e).context("Failed to read dataset");
            }
            Err(e) => {
                report.skipped_count += 1;
                if report.skipped_samples.len() < MAX_SKIPPED_SAMPLES {
                    report.skipped_samples.push(SkippedRow {
                        line: e.position().map(|p| p.line()).unwrap_or(0),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    let columns = ColumnMap::from_headers(&headers, &rows);
    report.platform_column = columns.platform.map(|i| headers[i].clone());
    report.story_points_column = columns.story_points.map(|i| headers[i].clone());
    debug_log::log(
        "LOADER",
        "columns",
        &format!(
            "platform={:?} story_points={:?} labels={}",
            report.platform_column,
            report.story_points_column,
            columns.labels.len()
        ),
    );

    let converted: Vec<Option<WorkItem>> = rows
        .par_iter()
        .map(|row| {
            let record = columns.to_record(row);
            if options.require_platform && record.platform.is_none() {
                None
            } else {
                Some(WorkItem::from_record(&record))
            }
        })
        .collect();

    let kept_before = converted.len();
    report.items = converted.into_iter().flatten().collect();
    report.dropped_without_platform = kept_before - report.items.len();

    Ok(report)
}

/// All `*.csv` files directly under `dir`, sorted by path. A missing
/// directory yields no datasets.
pub fn discover_datasets(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = dir.join("*.csv");
    let pattern = pattern
        .to_str()
        .with_context(|| format!("Non UTF-8 datasets path: {}", dir.display()))?;

    let mut paths: Vec<PathBuf> = glob::glob(pattern)
        .context("Invalid datasets glob pattern")?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    paths.sort();
    Ok(paths)
}

pub fn default_dataset(dir: &Path) -> Result<Option<PathBuf>> {
    let datasets = discover_datasets(dir)?;
    let preferred = datasets
        .iter()
        .find(|path| path.file_name().is_some_and(|name| name == DEFAULT_DATASET))
        .cloned();
    Ok(preferred.or_else(|| datasets.into_iter().next()))
}

/// Parse `qQ_sprint_N_YYYY` out of a file name. Sprints are two weeks long
/// and counted from the first day of the quarter.
pub fn sprint_window_from_name(file_name: &str) -> Option<(NaiveDate, NaiveDate)> {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .to_ascii_lowercase();
    let parts: Vec<&str> = stem.split('_').collect();

    parts.windows(4).find_map(|window| {
        let [quarter, "sprint", number, year] = window else {
            return None;
        };
        let quarter: u32 = quarter.strip_prefix('q')?.parse().ok()?;
        let number: u32 = number.parse().ok()?;
        let year: i32 = year.parse().ok()?;
        if !(1..=4).contains(&quarter) {
            return None;
        }

        let quarter_start = NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1)?;
        let offset = Duration::try_weeks(2 * i64::from(number.checked_sub(1)?))?;
        let start = quarter_start.checked_add_signed(offset)?;
        let end = start.checked_add_signed(Duration::days(13))?;
        Some((start, end))
    })
}

/// Best-guess sprint window when none is given.
pub fn infer_sprint_window(
    file_name: &str,
    items: &[WorkItem],
    today: NaiveDate,
) -> (NaiveDate, NaiveDate) {
    if let Some(window) = sprint_window_from_name(file_name) {
        return window;
    }

    let closures: Vec<NaiveDate> = items
        .iter()
        .filter(|item| *item.status_category() == StatusCategory::Done)
        .filter_map(|item| item.closed_at().map(|at| at.date()))
        .collect();
    if let (Some(first), Some(last)) = (closures.iter().min(), closures.iter().max()) {
        return (*first - Duration::days(2), *last + Duration::days(1));
    }

    let created: Vec<NaiveDate> = items
        .iter()
        .filter_map(|item| item.created_at().map(|at| at.date()))
        .collect();
    if let (Some(first), Some(last)) = (created.iter().min(), created.iter().max()) {
        return (*first, *last);
    }

    (today - Duration::days(14), today)
}

/// Row filter applied before aggregation. `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub platform: Option<String>,
    pub status: Option<String>,
    pub issue_type: Option<String>,
}

impl ItemFilter {
    pub fn is_empty(&self) -> bool {
        self.platform.is_none() && self.status.is_none() && self.issue_type.is_none()
    }

    pub fn matches(&self, item: &WorkItem) -> bool {
        let check = |wanted: &Option<String>, actual: &str| {
            wanted.as_deref().is_none_or(|wanted| wanted == actual)
        };
        check(&self.platform, item.platform())
            && check(&self.status, item.status())
            && check(&self.issue_type, item.issue_type())
    }

    pub fn apply(&self, items: Vec<WorkItem>) -> Vec<WorkItem> {
        if self.is_empty() {
            return items;
        }
        items.into_iter().filter(|item| self.matches(item)).collect()
    }
}

#[cfg(test)]
mod tests;
