use std::fs;

use chrono::NaiveDate;
use tempfile::TempDir;

use super::*;

const JIRA_EXPORT: &str = "\
Issue key,Summary,Issue Type,Status,Status Category,Custom field (Platform),Assignee,Labels,Labels,Custom field (Total Story Points),Custom field (Story Points),Created,Status Category Changed
BE-1,Build API,Story,Done,Done,BE,alice,vibe-codable,team_core,13,5,01/Jul/25 09:00,03/Jul/25 17:30
FE-2,Login page,Task,In Progress,In Progress,FE,,,,8,3,02/Jul/25 10:00,
X-3,No platform,Bug,To Do,To Do,,bob,,,,1,02/Jul/25 10:00,
";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn item(record: IssueRecord) -> WorkItem {
    WorkItem::from_record(&record)
}

#[test]
fn test_load_jira_export() {
    let report = load_reader(JIRA_EXPORT.as_bytes(), &LoaderOptions::default()).unwrap();

    assert_eq!(report.total_rows, 3);
    assert_eq!(report.items.len(), 2);
    assert_eq!(report.dropped_without_platform, 1);
    assert_eq!(report.skipped_count, 0);
    assert_eq!(
        report.platform_column.as_deref(),
        Some("Custom field (Platform)")
    );
    assert_eq!(
        report.story_points_column.as_deref(),
        Some("Custom field (Story Points)")
    );

    let backend = &report.items[0];
    assert_eq!(backend.issue_key(), "BE-1");
    assert_eq!(backend.platform(), "Backend");
    assert_eq!(backend.story_points(), 5.0);
    assert!(backend.has_label("vibe-codable"));
    assert!(backend.has_label("team_core"));
    assert_eq!(
        backend.closed_at().map(|at| at.date()),
        Some(date(2025, 7, 3))
    );

    let frontend = &report.items[1];
    assert_eq!(frontend.platform(), "Frontend");
    assert!(frontend.labels().is_empty());
    assert_eq!(frontend.contributor_name(), "Unassigned");
    assert!(frontend.closed_at().is_none());
}

#[test]
fn test_keep_rows_without_platform_when_not_required() {
    let options = LoaderOptions {
        require_platform: false,
    };
    let report = load_reader(JIRA_EXPORT.as_bytes(), &options).unwrap();

    assert_eq!(report.items.len(), 3);
    assert_eq!(report.dropped_without_platform, 0);
    assert_eq!(report.items[2].platform(), "");
}

#[test]
fn test_plain_headers_and_fallback_story_points() {
    let csv = "\
Issue_Key,Platform,Story_Points,Issue_Type,Status Category
DA-1, Data Analytics ,2.5,Story,Done
DS-2,DataScience,not a number,Task,To Do
";
    let report = load_reader(csv.as_bytes(), &LoaderOptions::default()).unwrap();

    assert_eq!(report.platform_column.as_deref(), Some("Platform"));
    assert_eq!(report.story_points_column.as_deref(), Some("Story_Points"));
    assert_eq!(report.items[0].platform(), "DA");
    assert_eq!(report.items[0].story_points(), 2.5);
    assert_eq!(report.items[0].issue_type(), "Story");
    assert_eq!(report.items[1].platform(), "DS");
    assert_eq!(report.items[1].story_points(), 0.0);
}

#[test]
fn test_platform_column_picked_by_content() {
    let csv = "\
Issue key,Old Platform,Team Platform,Story Points
K-1,,Mobile,1
K-2,,QA,2
";
    let report = load_reader(csv.as_bytes(), &LoaderOptions::default()).unwrap();

    assert_eq!(report.platform_column.as_deref(), Some("Team Platform"));
    assert_eq!(report.items.len(), 2);
}

#[test]
fn test_headers_are_trimmed() {
    let csv = "\u{feff} Issue key , Platform ,Story Points\nK-1,Backend,3\n";
    let report = load_reader(csv.as_bytes(), &LoaderOptions::default()).unwrap();

    assert_eq!(report.items[0].issue_key(), "K-1");
    assert_eq!(report.items[0].story_points(), 3.0);
}

#[test]
fn test_malformed_rows_are_skipped_and_counted() {
    let csv = "\
Issue key,Platform,Story Points
K-1,Backend,3
K-2,Backend
K-3,Backend,1
";
    let report = load_reader(csv.as_bytes(), &LoaderOptions::default()).unwrap();

    assert_eq!(report.total_rows, 3);
    assert_eq!(report.items.len(), 2);
    assert_eq!(report.skipped_count, 1);
    assert_eq!(report.skipped_samples.len(), 1);
    assert_eq!(report.skipped_samples[0].line, 3);
}

#[test]
fn test_skipped_samples_are_capped() {
    let mut csv = String::from("Issue key,Platform\n");
    for i in 0..5 {
        csv.push_str(&format!("K-{i}\n"));
    }
    let report = load_reader(csv.as_bytes(), &LoaderOptions::default()).unwrap();

    assert_eq!(report.skipped_count, 5);
    assert_eq!(report.skipped_samples.len(), MAX_SKIPPED_SAMPLES);
    assert!(report.items.is_empty());
}

#[test]
fn test_empty_input_is_an_error() {
    assert!(load_reader("".as_bytes(), &LoaderOptions::default()).is_err());
}

#[test]
fn test_load_csv_missing_file() {
    let temp = TempDir::new().unwrap();
    let err = load_csv(&temp.path().join("missing.csv"), &LoaderOptions::default()).unwrap_err();
    assert!(format!("{err:#}").contains("missing.csv"));
}

#[test]
fn test_load_csv_from_disk() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sprint.csv");
    fs::write(&path, JIRA_EXPORT).unwrap();

    let report = load_csv(&path, &LoaderOptions::default()).unwrap();
    assert_eq!(report.items.len(), 2);
}

#[test]
fn test_canonical_platform() {
    assert_eq!(canonical_platform("backend"), "Backend");
    assert_eq!(canonical_platform("BE"), "Backend");
    assert_eq!(canonical_platform("FE"), "Frontend");
    assert_eq!(canonical_platform("Data Science"), "DS");
    assert_eq!(canonical_platform("Platform Team"), "Platform Team");
}

#[test]
fn test_discover_datasets_sorted() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("b.csv"), "").unwrap();
    fs::write(temp.path().join("a.csv"), "").unwrap();
    fs::write(temp.path().join("notes.txt"), "").unwrap();

    let datasets = discover_datasets(temp.path()).unwrap();
    let names: Vec<_> = datasets
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["a.csv", "b.csv"]);
}

#[test]
fn test_discover_datasets_missing_dir() {
    let temp = TempDir::new().unwrap();
    let datasets = discover_datasets(&temp.path().join("nope")).unwrap();
    assert!(datasets.is_empty());
}

#[test]
fn test_default_dataset_preference() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a_first.csv"), "").unwrap();
    assert_eq!(
        default_dataset(temp.path()).unwrap(),
        Some(temp.path().join("a_first.csv"))
    );

    fs::write(temp.path().join(DEFAULT_DATASET), "").unwrap();
    assert_eq!(
        default_dataset(temp.path()).unwrap(),
        Some(temp.path().join(DEFAULT_DATASET))
    );
}

#[test]
fn test_window_from_file_name() {
    assert_eq!(
        sprint_window_from_name("q3_sprint_2_2025.csv"),
        Some((date(2025, 7, 15), date(2025, 7, 28)))
    );
    assert_eq!(
        sprint_window_from_name("export_Q1_sprint_1_2026.csv"),
        Some((date(2026, 1, 1), date(2026, 1, 14)))
    );
    assert_eq!(sprint_window_from_name("q5_sprint_1_2025.csv"), None);
    assert_eq!(sprint_window_from_name("sprint.csv"), None);
    assert_eq!(sprint_window_from_name("q1_sprint_0_2025.csv"), None);
}

#[test]
fn test_window_from_file_name_out_of_range_sprint() {
    assert_eq!(
        sprint_window_from_name("q1_sprint_99999999999999_2025.csv"),
        None
    );
    assert_eq!(sprint_window_from_name("q4_sprint_4294967295_2025.csv"), None);

    // Falls back to the created dates instead of aborting.
    let items = vec![item(IssueRecord {
        created: Some("2025-06-02".into()),
        ..Default::default()
    })];
    assert_eq!(
        infer_sprint_window("q1_sprint_99999999999999_2025.csv", &items, date(2026, 1, 1)),
        (date(2025, 6, 2), date(2025, 6, 2))
    );
}

#[test]
fn test_infer_window_from_name_wins() {
    let today = date(2026, 1, 1);
    assert_eq!(
        infer_sprint_window("q3_sprint_2_2025.csv", &[], today),
        (date(2025, 7, 15), date(2025, 7, 28))
    );
}

#[test]
fn test_infer_window_from_closures() {
    let items = vec![
        item(IssueRecord {
            status_category: Some("Done".into()),
            status_category_changed: Some("03/Jul/25 17:30".into()),
            ..Default::default()
        }),
        item(IssueRecord {
            status_category: Some("Done".into()),
            status_category_changed: Some("10/Jul/25 09:00".into()),
            ..Default::default()
        }),
        // Not done, ignored even though it has a change date.
        item(IssueRecord {
            status_category: Some("In Progress".into()),
            status_category_changed: Some("20/Jul/25 09:00".into()),
            ..Default::default()
        }),
    ];

    assert_eq!(
        infer_sprint_window("export.csv", &items, date(2026, 1, 1)),
        (date(2025, 7, 1), date(2025, 7, 11))
    );
}

#[test]
fn test_infer_window_from_created_then_today() {
    let items = vec![
        item(IssueRecord {
            created: Some("2025-06-20 10:00:00".into()),
            ..Default::default()
        }),
        item(IssueRecord {
            created: Some("2025-06-02".into()),
            ..Default::default()
        }),
    ];
    let today = date(2026, 1, 15);

    assert_eq!(
        infer_sprint_window("export.csv", &items, today),
        (date(2025, 6, 2), date(2025, 6, 20))
    );
    assert_eq!(
        infer_sprint_window("export.csv", &[], today),
        (date(2026, 1, 1), today)
    );
}

#[test]
fn test_item_filter() {
    let report = load_reader(
        JIRA_EXPORT.as_bytes(),
        &LoaderOptions {
            require_platform: false,
        },
    )
    .unwrap();

    assert_eq!(ItemFilter::default().apply(report.items.clone()).len(), 3);

    let backend = ItemFilter {
        platform: Some("Backend".into()),
        ..Default::default()
    };
    let kept = backend.apply(report.items.clone());
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].issue_key(), "BE-1");

    let none = ItemFilter {
        platform: Some("Backend".into()),
        issue_type: Some("Bug".into()),
        ..Default::default()
    };
    assert!(none.apply(report.items).is_empty());
}
