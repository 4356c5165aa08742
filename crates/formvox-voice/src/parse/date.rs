//! Spoken date phrases: relative days, weekdays, and day/month pairs.

use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static DAY_THEN_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})(?:st|nd|rd|th)?\s+(?:of\s+)?([a-z]+)\b").expect("valid day-month pattern")
});

static MONTH_THEN_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([a-z]+)\s+(?:the\s+)?(\d{1,2})(?:st|nd|rd|th)?\b").expect("valid month-day pattern")
});

const WEEKDAYS: [(&str, Weekday); 7] = [
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

fn month_number(word: &str) -> Option<u32> {
    let month = match word {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sept" | "sep" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Interpret `text` relative to `today`.
pub fn parse_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has = |w: &str| words.contains(&w);

    if lowered.contains("day after tomorrow") {
        return Some(today + Duration::days(2));
    }
    if has("tomorrow") {
        return Some(today + Duration::days(1));
    }
    if has("today") {
        return Some(today);
    }

    if let Some(&(_, weekday)) = WEEKDAYS.iter().find(|(name, _)| has(name)) {
        let target = i64::from(weekday.num_days_from_monday());
        let current = i64::from(today.weekday().num_days_from_monday());
        let mut offset = target - current;
        if offset <= 0 || has("next") || has("coming") {
            offset += 7;
        }
        debug!(?weekday, offset, "weekday date");
        return Some(today + Duration::days(offset));
    }

    day_and_month(&lowered).and_then(|(day, month)| NaiveDate::from_ymd_opt(today.year(), month, day))
}

fn day_and_month(text: &str) -> Option<(u32, u32)> {
    for caps in DAY_THEN_MONTH.captures_iter(text) {
        if let (Ok(day), Some(month)) = (caps[1].parse(), month_number(&caps[2])) {
            return Some((day, month));
        }
    }
    for caps in MONTH_THEN_DAY.captures_iter(text) {
        if let (Some(month), Ok(day)) = (month_number(&caps[1]), caps[2].parse()) {
            return Some((day, month));
        }
    }
    None
}

/// [`parse_date`] against the local calendar, formatted `YYYY-MM-DD`.
pub fn parse_date_iso(text: &str) -> Option<String> {
    parse_date(text, Local::now().date_naive()).map(|d| d.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2026-10-18 is a Sunday.
    fn sunday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn wednesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 21).unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn relative_days() {
        assert_eq!(parse_date("tomorrow", sunday()), Some(ymd(2026, 10, 19)));
        assert_eq!(parse_date("Tomorrow please", ymd(2026, 12, 31)), Some(ymd(2027, 1, 1)));
        assert_eq!(parse_date("day after tomorrow", sunday()), Some(ymd(2026, 10, 20)));
        assert_eq!(parse_date("today", sunday()), Some(sunday()));
    }

    #[test]
    fn weekday_later_this_week() {
        assert_eq!(parse_date("friday", wednesday()), Some(ymd(2026, 10, 23)));
    }

    #[test]
    fn weekday_already_passed_rolls_over() {
        assert_eq!(parse_date("monday", wednesday()), Some(ymd(2026, 10, 26)));
        // Same weekday as today means next week's.
        assert_eq!(parse_date("wednesday", wednesday()), Some(ymd(2026, 10, 28)));
    }

    #[test]
    fn next_or_coming_adds_a_week() {
        assert_eq!(parse_date("next friday", wednesday()), Some(ymd(2026, 10, 30)));
        assert_eq!(parse_date("coming friday", wednesday()), Some(ymd(2026, 10, 30)));
        let next_sunday = parse_date("next sunday", sunday()).unwrap();
        assert_eq!(next_sunday.weekday(), Weekday::Sun);
        assert!(next_sunday > sunday());
    }

    #[test]
    fn day_and_month_in_either_order() {
        assert_eq!(parse_date("17th of february", sunday()), Some(ymd(2026, 2, 17)));
        assert_eq!(parse_date("on 3 march", sunday()), Some(ymd(2026, 3, 3)));
        assert_eq!(parse_date("February 17th", sunday()), Some(ymd(2026, 2, 17)));
        assert_eq!(parse_date("sept 2nd", sunday()), Some(ymd(2026, 9, 2)));
    }

    #[test]
    fn impossible_or_unknown_dates() {
        assert_eq!(parse_date("30th of february", sunday()), None);
        assert_eq!(parse_date("whenever works", sunday()), None);
        assert_eq!(parse_date("", sunday()), None);
    }

    #[test]
    fn iso_format() {
        let tomorrow = Local::now().date_naive() + Duration::days(1);
        assert_eq!(parse_date_iso("tomorrow"), Some(tomorrow.format("%Y-%m-%d").to_string()));
    }
}
