use super::*;

#[test]
fn test_format_number_comma() {
    let options = NumberFormatOptions {
        use_comma: true,
        locale: "en".to_string(),
        decimal_places: 1,
    };

    assert_eq!(format_number(1000u32, &options), "1,000");
    assert_eq!(format_number(1000000u64, &options), "1,000,000");
    assert_eq!(format_number(123u32, &options), "123");
}

#[test]
fn test_format_number_plain() {
    let options = NumberFormatOptions::default();

    assert_eq!(format_number(1000u32, &options), "1000");
}

#[test]
fn test_format_points() {
    let plain = NumberFormatOptions::default();
    assert_eq!(format_points(3.0, &plain), "3.0");
    assert_eq!(format_points(62.5, &plain), "62.5");
    assert_eq!(format_points(1234.5, &plain), "1234.5");

    let comma = NumberFormatOptions {
        use_comma: true,
        locale: "en".to_string(),
        decimal_places: 2,
    };
    assert_eq!(format_points(1234.5, &comma), "1,234.50");
    assert_eq!(format_points(12.25, &comma), "12.25");

    let german = NumberFormatOptions {
        use_comma: true,
        locale: "de".to_string(),
        decimal_places: 1,
    };
    assert_eq!(format_points(1234.5, &german), "1.234,5");
}

#[test]
fn test_format_percent() {
    assert_eq!(format_percent(62.5), "62.5%");
    assert_eq!(format_percent(0.0), "0.0%");
}

#[test]
fn test_round1() {
    assert_eq!(round1(62.5), 62.5);
    assert_eq!(round1(66.66666), 66.7);
    assert_eq!(round1(0.04), 0.0);
    assert_eq!(round1(0.1 + 0.2), 0.3);
}

#[test]
fn test_round1_ties_to_even() {
    assert_eq!(round1(0.25), 0.2);
    assert_eq!(round1(62.25), 62.2);
    assert_eq!(round1(0.35), 0.3);
    assert_eq!(round1(0.75), 0.8);
    assert_eq!(round1(-0.25), -0.2);
}

#[test]
fn test_ratio_zero_denominator() {
    assert_eq!(ratio(5.0, 0.0), 0.0);
    assert_eq!(ratio(0.0, 0.0), 0.0);
    assert_eq!(ratio(3.0, 8.0), 0.375);
}

#[test]
fn test_format_sprint_period() {
    let start = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 7, 14).unwrap();
    assert_eq!(format_sprint_period(start, end), "01 Jul 2025 → 14 Jul 2025");
}

#[test]
fn test_parse_cli_date() {
    assert_eq!(
        parse_cli_date("2025-07-15"),
        Ok(NaiveDate::from_ymd_opt(2025, 7, 15).unwrap())
    );
    assert!(parse_cli_date("15/07/2025").is_err());
}

#[test]
fn test_warn_once_does_not_panic_on_repeat() {
    warn_once("duplicate warning");
    warn_once("duplicate warning");
}
