use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};

static WARNED_MESSAGES: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

pub fn warn_once(message: impl Into<String>) {
    let message = message.into();
    let cache = WARNED_MESSAGES.get_or_init(|| Mutex::new(HashSet::new()));

    if let Ok(mut warned) = cache.lock()
        && warned.insert(message.clone())
    {
        eprintln!("{message}");
    }
}

#[derive(Clone)]
pub struct NumberFormatOptions {
    pub use_comma: bool,
    pub locale: String,
    pub decimal_places: usize,
}

impl Default for NumberFormatOptions {
    fn default() -> Self {
        Self {
            use_comma: false,
            locale: "en".to_string(),
            decimal_places: 1,
        }
    }
}

fn locale_for(name: &str) -> Locale {
    match name {
        "de" => Locale::de,
        "fr" => Locale::fr,
        "es" => Locale::es,
        "it" => Locale::it,
        "ja" => Locale::ja,
        "ko" => Locale::ko,
        "zh" => Locale::zh,
        _ => Locale::en,
    }
}

/// Format a count for display. Accepts both u32 and u64.
pub fn format_number(n: impl Into<u64>, options: &NumberFormatOptions) -> String {
    let n: u64 = n.into();
    if options.use_comma {
        n.to_formatted_string(&locale_for(&options.locale))
    } else {
        n.to_string()
    }
}

/// Format story points (or any fractional figure) with the configured
/// precision. The integer part gets grouping separators when enabled.
pub fn format_points(value: f64, options: &NumberFormatOptions) -> String {
    let formatted = format!("{:.prec$}", value, prec = options.decimal_places);
    if !options.use_comma || value.abs() < 1000.0 {
        return formatted;
    }

    let (sign, digits) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted.as_str()),
    };
    let (whole, fraction) = match digits.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (digits, None),
    };

    let locale = locale_for(&options.locale);
    let grouped = whole
        .parse::<u64>()
        .map(|n| n.to_formatted_string(&locale))
        .unwrap_or_else(|_| whole.to_string());

    match fraction {
        Some(fraction) => format!("{sign}{grouped}{}{fraction}", locale.decimal()),
        None => format!("{sign}{grouped}"),
    }
}

pub fn format_percent(value: f64) -> String {
    format!("{value:.1}%")
}

/// Round to one decimal place, the precision every reported figure uses.
/// Rounds the exact binary value with ties to even, so 0.25 becomes 0.2 and
/// 0.35 (stored as 0.34999...) becomes 0.3.
pub fn round1(value: f64) -> f64 {
    format!("{value:.1}").parse().unwrap_or(value)
}

/// `numerator / denominator`, or 0.0 when the denominator is zero.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

pub fn format_date_for_display(date: NaiveDate) -> String {
    date.format("%d %b %Y").to_string()
}

pub fn format_sprint_period(start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "{} → {}",
        format_date_for_display(start),
        format_date_for_display(end)
    )
}

/// Parse a `YYYY-MM-DD` command-line date.
pub fn parse_cli_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got '{value}': {e}"))
}

#[cfg(test)]
mod tests;
