//! Date phrase recognition.
//!
//! Every phrase resolves to a closed [`DateRange`] relative to the day the
//! utterance was received. Only phrases naming one calendar day outright
//! (`2024-06-15`, "today") produce an exact single day.
//!
//! Seasons are meteorological, northern hemisphere: spring is March to May,
//! summer June to August, autumn September to November and winter runs from
//! December into February of the following year.

use chrono::{Datelike, Days, Months, NaiveDate};
use regex::{Captures, Regex};
use shutter_core::{DateRange, EntityKind, EntityValue, ExtractedEntity, Span};

use crate::lexicon;

const MONTH_ALT: &str = "january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sep|oct|nov|dec";
const SEASON_ALT: &str = "spring|summer|autumn|fall|winter";
const COUNT_ALT: &str = r"\d+|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|twenty";

// Confidence by pattern specificity.
const ISO_DAY: f32 = 0.95;
const ISO_MONTH: f32 = 0.9;
const NAMED_MONTH_YEAR: f32 = 0.85;
const SEASON_YEAR: f32 = 0.85;
const LAST_N_UNITS: f32 = 0.75;
const RELATIVE_DAY: f32 = 0.75;
const LAST_SEASON: f32 = 0.75;
const THIS_SEASON: f32 = 0.7;
const RELATIVE_PERIOD: f32 = 0.7;
const BARE_MONTH: f32 = 0.6;
const BARE_YEAR: f32 = 0.5;

pub(crate) struct DatePatterns {
    iso: Regex,
    month_year: Regex,
    bare_month: Regex,
    relative_season: Regex,
    season_year: Regex,
    relative_day: Regex,
    relative_period: Regex,
    last_n: Regex,
    bare_year: Regex,
}

impl DatePatterns {
    pub(crate) fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            iso: Regex::new(r"\b(\d{4})-(\d{1,2})(?:-(\d{1,2}))?\b")?,
            month_year: Regex::new(&format!(r"(?i)\b({MONTH_ALT})\.?\s+(?:of\s+)?(\d{{4}})\b"))?,
            bare_month: Regex::new(&format!(r"(?i)\b(?:in|during|from|since)\s+({MONTH_ALT})\b"))?,
            relative_season: Regex::new(&format!(r"(?i)\b(last|past|this)\s+({SEASON_ALT})\b"))?,
            season_year: Regex::new(&format!(r"(?i)\b({SEASON_ALT})\s+(?:of\s+)?(\d{{4}})\b"))?,
            relative_day: Regex::new(r"(?i)\b(today|yesterday)\b")?,
            relative_period: Regex::new(r"(?i)\b(last|past|this)\s+(week|month|year)\b")?,
            last_n: Regex::new(&format!(
                r"(?i)\b(?:last|past)\s+({COUNT_ALT})\s+(days?|weeks?|months?|years?)\b"
            ))?,
            bare_year: Regex::new(r"\b(19\d{2}|20\d{2})\b")?,
        })
    }

    /// All date readings in `text`, resolved against `today`.
    pub(crate) fn extract(&self, text: &str, today: NaiveDate) -> Vec<ExtractedEntity> {
        let mut found = Vec::new();

        for caps in self.iso.captures_iter(text) {
            let year = int(&caps, 1);
            let month = int(&caps, 2);
            let day = caps.get(3).and_then(|m| m.as_str().parse::<u32>().ok());
            let range = match (year, month, day) {
                (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y as i32, m, d)
                    .map(|date| (DateRange::day(date), ISO_DAY)),
                (Some(y), Some(m), None) => month_range(y as i32, m).map(|r| (r, ISO_MONTH)),
                _ => None,
            };
            push(&mut found, &caps, range);
        }

        for caps in self.month_year.captures_iter(text) {
            let range = caps
                .get(1)
                .and_then(|m| lexicon::month_number(m.as_str()))
                .zip(int(&caps, 2))
                .and_then(|(month, year)| month_range(year as i32, month))
                .map(|r| (r, NAMED_MONTH_YEAR));
            push(&mut found, &caps, range);
        }

        for caps in self.bare_month.captures_iter(text) {
            let range = caps
                .get(1)
                .and_then(|m| lexicon::month_number(m.as_str()))
                .and_then(|month| most_recent_month(today, month))
                .map(|r| (r, BARE_MONTH));
            push_group(&mut found, &caps, 1, range);
        }

        for caps in self.relative_season.captures_iter(text) {
            let which = lower(&caps, 1);
            let season = lower(&caps, 2);
            let range = if which == "this" {
                current_season(&season, today).map(|r| (r, THIS_SEASON))
            } else {
                last_season(&season, today).map(|r| (r, LAST_SEASON))
            };
            push(&mut found, &caps, range);
        }

        for caps in self.season_year.captures_iter(text) {
            let season = lower(&caps, 1);
            let range = int(&caps, 2)
                .and_then(|year| season_range(&season, year as i32))
                .map(|r| (r, SEASON_YEAR));
            push(&mut found, &caps, range);
        }

        for caps in self.relative_day.captures_iter(text) {
            let range = match lower(&caps, 1).as_str() {
                "today" => Some(today),
                _ => today.pred_opt(),
            }
            .map(|d| (DateRange::day(d), RELATIVE_DAY));
            push(&mut found, &caps, range);
        }

        for caps in self.relative_period.captures_iter(text) {
            let this = lower(&caps, 1) == "this";
            let range = match lower(&caps, 2).as_str() {
                "week" => week_range(today, this),
                "month" => relative_month(today, this),
                _ => relative_year(today, this),
            }
            .map(|r| (r, RELATIVE_PERIOD));
            push(&mut found, &caps, range);
        }

        for caps in self.last_n.captures_iter(text) {
            let count = caps.get(1).and_then(|m| lexicon::parse_count(m.as_str()));
            let unit = lower(&caps, 2);
            let range = count
                .and_then(|n| trailing_range(today, n, &unit))
                .map(|r| (r, LAST_N_UNITS));
            push(&mut found, &caps, range);
        }

        for caps in self.bare_year.captures_iter(text) {
            let range = int(&caps, 1)
                .and_then(|y| year_range(y as i32))
                .map(|r| (r, BARE_YEAR));
            push(&mut found, &caps, range);
        }

        found
    }
}

fn int(caps: &Captures<'_>, group: usize) -> Option<u32> {
    caps.get(group).and_then(|m| m.as_str().parse().ok())
}

fn lower(caps: &Captures<'_>, group: usize) -> String {
    caps.get(group)
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_default()
}

fn push(found: &mut Vec<ExtractedEntity>, caps: &Captures<'_>, range: Option<(DateRange, f32)>) {
    push_group(found, caps, 0, range);
}

fn push_group(
    found: &mut Vec<ExtractedEntity>,
    caps: &Captures<'_>,
    group: usize,
    range: Option<(DateRange, f32)>,
) {
    if let (Some(m), Some((range, confidence))) = (caps.get(group), range) {
        found.push(ExtractedEntity::new(
            EntityKind::Date,
            EntityValue::Date(range),
            m.as_str(),
            Span::new(m.start(), m.end()),
            confidence,
        ));
    }
}

fn month_range(year: i32, month: u32) -> Option<DateRange> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let end = start.checked_add_months(Months::new(1))?.pred_opt()?;
    Some(DateRange::new(start, end))
}

fn year_range(year: i32) -> Option<DateRange> {
    Some(DateRange::new(
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year, 12, 31)?,
    ))
}

/// A month named without a year: this year's if it has started, else last year's.
fn most_recent_month(today: NaiveDate, month: u32) -> Option<DateRange> {
    let year = if month <= today.month() {
        today.year()
    } else {
        today.year() - 1
    };
    month_range(year, month)
}

/// Season occurrence that starts in `year`.
fn season_range(season: &str, year: i32) -> Option<DateRange> {
    let (start_month, span_months) = match season {
        "spring" => (3, 3),
        "summer" => (6, 3),
        "autumn" | "fall" => (9, 3),
        "winter" => (12, 3),
        _ => return None,
    };
    let start = NaiveDate::from_ymd_opt(year, start_month, 1)?;
    let end = start.checked_add_months(Months::new(span_months))?.pred_opt()?;
    Some(DateRange::new(start, end))
}

/// Most recent occurrence of `season` that ended before `today`.
fn last_season(season: &str, today: NaiveDate) -> Option<DateRange> {
    (0..3)
        .filter_map(|back| season_range(season, today.year() - back))
        .find(|range| range.end < today)
}

/// Occurrence of `season` containing `today`, else the one starting this year.
fn current_season(season: &str, today: NaiveDate) -> Option<DateRange> {
    let containing = (0..2)
        .filter_map(|back| season_range(season, today.year() - back))
        .find(|range| range.start <= today && today <= range.end);
    containing.or_else(|| season_range(season, today.year()))
}

fn week_range(today: NaiveDate, this: bool) -> Option<DateRange> {
    let monday = today.checked_sub_days(Days::new(today.weekday().num_days_from_monday() as u64))?;
    if this {
        Some(DateRange::new(monday, today))
    } else {
        let start = monday.checked_sub_days(Days::new(7))?;
        Some(DateRange::new(start, monday.pred_opt()?))
    }
}

fn relative_month(today: NaiveDate, this: bool) -> Option<DateRange> {
    let first = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)?;
    if this {
        Some(DateRange::new(first, today))
    } else {
        let start = first.checked_sub_months(Months::new(1))?;
        Some(DateRange::new(start, first.pred_opt()?))
    }
}

fn relative_year(today: NaiveDate, this: bool) -> Option<DateRange> {
    if this {
        Some(DateRange::new(NaiveDate::from_ymd_opt(today.year(), 1, 1)?, today))
    } else {
        year_range(today.year() - 1)
    }
}

/// "last N days" and friends: from N units ago up to and including today.
fn trailing_range(today: NaiveDate, n: u32, unit: &str) -> Option<DateRange> {
    let start = match unit.trim_end_matches('s') {
        "day" => today.checked_sub_days(Days::new(n as u64))?,
        "week" => today.checked_sub_days(Days::new(n as u64 * 7))?,
        "month" => today.checked_sub_months(Months::new(n))?,
        "year" => today.checked_sub_months(Months::new(n.checked_mul(12)?))?,
        _ => return None,
    };
    Some(DateRange::new(start, today))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dates(text: &str, today: NaiveDate) -> Vec<(String, DateRange, f32)> {
        DatePatterns::new()
            .unwrap()
            .extract(text, today)
            .into_iter()
            .map(|e| match e.value {
                EntityValue::Date(r) => (e.text, r, e.confidence),
                other => panic!("unexpected value {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_last_summer_is_most_recent_ended_summer() {
        let found = dates("photos from last summer", day(2025, 3, 10));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "last summer");
        assert_eq!(found[0].1, DateRange::new(day(2024, 6, 1), day(2024, 8, 31)));
        assert!(!found[0].1.exact);

        // mid-summer: the current summer has not ended yet
        let found = dates("last summer", day(2025, 7, 4));
        assert_eq!(found[0].1.start, day(2024, 6, 1));
    }

    #[test]
    fn test_last_winter_spans_new_year() {
        let found = dates("last winter", day(2025, 1, 15));
        assert_eq!(found[0].1, DateRange::new(day(2023, 12, 1), day(2024, 2, 29)));
    }

    #[test]
    fn test_iso_month_keeps_overlapping_year() {
        let found = dates("from 2024-06", day(2025, 1, 1));
        let month = found.iter().find(|f| f.0 == "2024-06").unwrap();
        assert_eq!(month.1, DateRange::new(day(2024, 6, 1), day(2024, 6, 30)));
        assert_eq!(month.2, ISO_MONTH);
        let year = found.iter().find(|f| f.0 == "2024").unwrap();
        assert_eq!(year.2, BARE_YEAR);
        assert!(month.2 > year.2);
    }

    #[test]
    fn test_iso_day_is_exact() {
        let found = dates("on 2024-06-15", day(2025, 1, 1));
        let exact = found.iter().find(|f| f.0 == "2024-06-15").unwrap();
        assert!(exact.1.exact);
        assert_eq!(exact.2, ISO_DAY);
    }

    #[test]
    fn test_specificity_ordering() {
        let today = day(2025, 5, 20);
        let iso = dates("2024-06-15", today)[0].2;
        let relative = dates("last summer", today)[0].2;
        let year = dates("in 2023", today)[0].2;
        assert!(iso > relative && relative > year);
    }

    #[test]
    fn test_named_month_and_year() {
        let found = dates("pictures from June 2023", day(2025, 1, 1));
        let named = found.iter().find(|f| f.0 == "June 2023").unwrap();
        assert_eq!(named.1, DateRange::new(day(2023, 6, 1), day(2023, 6, 30)));
    }

    #[test]
    fn test_trailing_days_and_yesterday() {
        let today = day(2025, 3, 31);
        let found = dates("the past 30 days", today);
        assert_eq!(found[0].1, DateRange::new(day(2025, 3, 1), today));

        let found = dates("yesterday", today);
        assert_eq!(found[0].1, DateRange::day(day(2025, 3, 30)));
    }

    #[test]
    fn test_last_week_is_previous_calendar_week() {
        // 2025-03-12 is a Wednesday
        let found = dates("last week", day(2025, 3, 12));
        assert_eq!(found[0].1, DateRange::new(day(2025, 3, 3), day(2025, 3, 9)));
    }

    #[test]
    fn test_no_dates() {
        assert!(dates("tag these photos as vacation", day(2025, 1, 1)).is_empty());
    }
}
