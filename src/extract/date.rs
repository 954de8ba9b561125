//! Natural-language date resolution
//!
//! Every resolution is anchored to a caller-supplied date; nothing here reads
//! the wall clock. When a message carries several date cues the strongest one
//! wins (see [`Precedence`]). Cues of equal strength resolve to the earliest
//! one in the text.

use super::{collapse_whitespace, Extraction};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Inclusive calendar interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        let end = NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()?;
        Some(Self { start, end })
    }

    pub fn quarter(year: i32, quarter: u32) -> Option<Self> {
        if !(1..=4).contains(&quarter) {
            return None;
        }
        let first = Self::month(year, quarter * 3 - 2)?;
        let last = Self::month(year, quarter * 3)?;
        Some(Self {
            start: first.start,
            end: last.end,
        })
    }

    pub fn year(year: i32) -> Option<Self> {
        Some(Self {
            start: NaiveDate::from_ymd_opt(year, 1, 1)?,
            end: NaiveDate::from_ymd_opt(year, 12, 31)?,
        })
    }

    /// Monday-to-Sunday week containing `date`
    pub fn week_of(date: NaiveDate) -> Self {
        let start = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
        Self {
            start,
            end: start + Duration::days(6),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn is_single_day(&self) -> bool {
        self.start == self.end
    }
}

/// Strength of a date cue. Later variants win over earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Precedence {
    /// "the 5th"
    BareNumeral,
    /// "yesterday", "last month", "this friday"
    Relative,
    /// "5 april", "12/03", "q2", "march"
    ExplicitMonth,
    /// "05-04-2025", "march 2025", "q1 2024"
    ExplicitYear,
}

/// A resolved date expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateMatch {
    pub range: DateRange,
    pub precedence: Precedence,
    /// A "from X to Y" range was written backwards and has been swapped
    pub reversed: bool,
}

impl DateMatch {
    /// The single day used when a record needs one date
    pub fn day(&self) -> NaiveDate {
        self.range.start
    }
}

// ============================================================================
// Rule table
// ============================================================================

type Resolver = fn(&Captures<'_>, NaiveDate) -> Option<(DateRange, Precedence)>;

struct DateRule {
    regex: Regex,
    resolve: Resolver,
}

const MONTHS: &str = "january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec";

// "may" alone is too common an English word to read as a month
const MONTHS_WITHOUT_MAY: &str = "january|february|march|april|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec";

const WEEKDAYS: &str = "monday|tuesday|wednesday|thursday|friday|saturday|sunday";

fn rule(pattern: &str, resolve: Resolver) -> DateRule {
    let pattern = pattern
        .replace("{months}", MONTHS)
        .replace("{months_without_may}", MONTHS_WITHOUT_MAY)
        .replace("{weekdays}", WEEKDAYS);
    DateRule {
        regex: Regex::new(&pattern).expect("invalid date rule"),
        resolve,
    }
}

static RULES: LazyLock<Vec<DateRule>> = LazyLock::new(|| {
    vec![
        // Literal formats
        rule(r"\b(\d{4})[-/](\d{1,2})[-/](\d{1,2})\b", resolve_iso),
        rule(r"\b(\d{1,2})[-/.](\d{1,2})[-/.](\d{4}|\d{2})\b", resolve_day_month_year),
        rule(r"\b(\d{1,2})[-/](\d{1,2})\b", resolve_day_month),
        // Month names
        rule(
            r"(?i)\b({months})\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b",
            resolve_month_name_day_year,
        ),
        rule(
            r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+(?:of\s+)?({months}),?\s+(\d{4})\b",
            resolve_day_month_name_year,
        ),
        rule(r"(?i)\b({months}),?\s+(\d{4})\b", resolve_month_name_year),
        rule(
            r"(?i)\b({months})\s+(\d{1,2})(?:st|nd|rd|th)?\b",
            resolve_month_name_day,
        ),
        rule(
            r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+(?:of\s+)?({months})\b",
            resolve_day_month_name,
        ),
        rule(r"(?i)\b({months_without_may})\b", resolve_month_name),
        // Quarters and years
        rule(
            r"(?i)\b(?:q([1-4])|(first|second|third|fourth|1st|2nd|3rd|4th)\s+quarter)(?:\s+(?:of\s+)?(\d{4}))?\b",
            resolve_quarter,
        ),
        rule(r"(?i)\b(?:year|fy)\s+(\d{4})\b", resolve_explicit_year),
        // Relative keywords
        rule(r"(?i)\btoday\b", |_, anchor| relative(anchor, 0)),
        rule(r"(?i)\bday\s+before\s+yesterday\b", |_, anchor| {
            relative(anchor, -2)
        }),
        rule(r"(?i)\byesterday\b", |_, anchor| relative(anchor, -1)),
        rule(r"(?i)\btomorrow\b", |_, anchor| relative(anchor, 1)),
        rule(r"(?i)\b(\d{1,4})\s+(day|week)s?\s+ago\b", resolve_ago),
        rule(
            r"(?i)\b(this|current|last|previous|past)\s+(week|month|quarter|year)\b",
            resolve_named_period,
        ),
        rule(r"(?i)\b(?:last|past)\s+(\d{1,3})\s+days\b", resolve_last_n_days),
        rule(r"(?i)\b(?:year\s+to\s+date|ytd)\b", |_, anchor| {
            let start = NaiveDate::from_ymd_opt(anchor.year(), 1, 1)?;
            Some((DateRange { start, end: anchor }, Precedence::Relative))
        }),
        rule(
            r"(?i)\b(?:(last|previous|this|on)\s+)?({weekdays})\b",
            resolve_weekday,
        ),
        // Bare day numerals
        rule(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)\b", resolve_bare_day),
    ]
});

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:from|between)\s+(.+?)\s+(?:to|and|till|until|through)\s+(.+)$").unwrap()
});

/// Words that introduce a date and go with it when the date is removed
const DATE_CONNECTORS: &[&str] = &["on", "dated", "date", "for", "in", "since", "during"];

// ============================================================================
// Extraction
// ============================================================================

struct Candidate {
    start: usize,
    end: usize,
    range: DateRange,
    precedence: Precedence,
}

/// Find the strongest date expression in `text`, resolved against `anchor`.
pub fn extract_date(text: &str, anchor: NaiveDate) -> Extraction<DateMatch> {
    if let Some(found) = extract_range(text, anchor) {
        return found;
    }

    let candidates = candidates(text, anchor);
    match strongest(&candidates) {
        Some(best) => Extraction::found(
            DateMatch {
                range: best.range,
                precedence: best.precedence,
                reversed: false,
            },
            remove_with_connector(text, best.start, best.end),
        ),
        None => Extraction::missing(text),
    }
}

/// Byte spans of every date-shaped expression, regardless of whether it resolves.
/// The amount extractor uses this to skip numerals that belong to dates.
pub(crate) fn date_spans(text: &str) -> Vec<(usize, usize)> {
    RULES
        .iter()
        .flat_map(|rule| rule.regex.find_iter(text).map(|m| (m.start(), m.end())))
        .collect()
}

fn extract_range(text: &str, anchor: NaiveDate) -> Option<Extraction<DateMatch>> {
    let caps = RANGE_RE.captures(text)?;
    let whole = caps.get(0)?;
    let left = caps.get(1)?;
    let right = caps.get(2)?;

    let left_candidates = candidates(left.as_str(), anchor);
    let from = strongest(&left_candidates)?;

    // The right side runs to the end of the message; take the cue it opens with.
    let right_candidates = candidates(right.as_str(), anchor);
    let to = right_candidates.iter().min_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(b.precedence.cmp(&a.precedence))
            .then(b.end.cmp(&a.end))
    })?;

    let (range, reversed) = if from.range.start > to.range.end {
        (
            DateRange {
                start: to.range.start,
                end: from.range.end,
            },
            true,
        )
    } else {
        (
            DateRange {
                start: from.range.start,
                end: to.range.end,
            },
            false,
        )
    };

    let span_end = right.start() + to.end;
    Some(Extraction::found(
        DateMatch {
            range,
            precedence: from.precedence.max(to.precedence),
            reversed,
        },
        remove_with_connector(text, whole.start(), span_end),
    ))
}

fn candidates(text: &str, anchor: NaiveDate) -> Vec<Candidate> {
    let mut found = Vec::new();
    for rule in RULES.iter() {
        for caps in rule.regex.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if let Some((range, precedence)) = (rule.resolve)(&caps, anchor) {
                found.push(Candidate {
                    start: whole.start(),
                    end: whole.end(),
                    range,
                    precedence,
                });
            }
        }
    }
    found
}

/// Highest precedence first, then earliest, then longest
fn strongest(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.iter().max_by(|a, b| {
        a.precedence
            .cmp(&b.precedence)
            .then(b.start.cmp(&a.start))
            .then((a.end - a.start).cmp(&(b.end - b.start)))
    })
}

fn remove_with_connector(text: &str, start: usize, end: usize) -> String {
    let before = text.get(..start).unwrap_or_default();
    let after = text.get(end..).unwrap_or_default();
    let mut words: Vec<&str> = before.split_whitespace().collect();
    if words
        .last()
        .is_some_and(|w| DATE_CONNECTORS.iter().any(|c| w.eq_ignore_ascii_case(c)))
    {
        words.pop();
    }
    collapse_whitespace(&format!("{} {after}", words.join(" ")))
}

// ============================================================================
// Resolvers
// ============================================================================

fn number(caps: &Captures<'_>, index: usize) -> Option<u32> {
    caps.get(index)?.as_str().parse().ok()
}

fn year(caps: &Captures<'_>, index: usize) -> Option<i32> {
    let raw = caps.get(index)?.as_str();
    let value: i32 = raw.parse().ok()?;
    Some(if raw.len() == 2 { 2000 + value } else { value })
}

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    let month = match lower.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Day-first numeric dates; a month above 12 with a day that fits is read month-first.
fn day_first(day: u32, month: u32, year: i32) -> Option<NaiveDate> {
    let (day, month) = if month > 12 && day <= 12 {
        (month, day)
    } else {
        (day, month)
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn single(date: NaiveDate, precedence: Precedence) -> (DateRange, Precedence) {
    (DateRange::day(date), precedence)
}

fn relative(anchor: NaiveDate, days: i64) -> Option<(DateRange, Precedence)> {
    let date = anchor.checked_add_signed(Duration::days(days))?;
    Some(single(date, Precedence::Relative))
}

fn resolve_iso(caps: &Captures<'_>, _anchor: NaiveDate) -> Option<(DateRange, Precedence)> {
    let date = NaiveDate::from_ymd_opt(year(caps, 1)?, number(caps, 2)?, number(caps, 3)?)?;
    Some(single(date, Precedence::ExplicitYear))
}

fn resolve_day_month_year(
    caps: &Captures<'_>,
    _anchor: NaiveDate,
) -> Option<(DateRange, Precedence)> {
    let date = day_first(number(caps, 1)?, number(caps, 2)?, year(caps, 3)?)?;
    Some(single(date, Precedence::ExplicitYear))
}

fn resolve_day_month(caps: &Captures<'_>, anchor: NaiveDate) -> Option<(DateRange, Precedence)> {
    let date = day_first(number(caps, 1)?, number(caps, 2)?, anchor.year())?;
    Some(single(date, Precedence::ExplicitMonth))
}

fn resolve_month_name_day_year(
    caps: &Captures<'_>,
    _anchor: NaiveDate,
) -> Option<(DateRange, Precedence)> {
    let month = month_number(caps.get(1)?.as_str())?;
    let date = NaiveDate::from_ymd_opt(year(caps, 3)?, month, number(caps, 2)?)?;
    Some(single(date, Precedence::ExplicitYear))
}

fn resolve_day_month_name_year(
    caps: &Captures<'_>,
    _anchor: NaiveDate,
) -> Option<(DateRange, Precedence)> {
    let month = month_number(caps.get(2)?.as_str())?;
    let date = NaiveDate::from_ymd_opt(year(caps, 3)?, month, number(caps, 1)?)?;
    Some(single(date, Precedence::ExplicitYear))
}

fn resolve_month_name_year(
    caps: &Captures<'_>,
    _anchor: NaiveDate,
) -> Option<(DateRange, Precedence)> {
    let month = month_number(caps.get(1)?.as_str())?;
    Some((DateRange::month(year(caps, 2)?, month)?, Precedence::ExplicitYear))
}

fn resolve_month_name_day(
    caps: &Captures<'_>,
    anchor: NaiveDate,
) -> Option<(DateRange, Precedence)> {
    let month = month_number(caps.get(1)?.as_str())?;
    let date = NaiveDate::from_ymd_opt(anchor.year(), month, number(caps, 2)?)?;
    Some(single(date, Precedence::ExplicitMonth))
}

fn resolve_day_month_name(
    caps: &Captures<'_>,
    anchor: NaiveDate,
) -> Option<(DateRange, Precedence)> {
    let month = month_number(caps.get(2)?.as_str())?;
    let date = NaiveDate::from_ymd_opt(anchor.year(), month, number(caps, 1)?)?;
    Some(single(date, Precedence::ExplicitMonth))
}

fn resolve_month_name(caps: &Captures<'_>, anchor: NaiveDate) -> Option<(DateRange, Precedence)> {
    let month = month_number(caps.get(1)?.as_str())?;
    Some((DateRange::month(anchor.year(), month)?, Precedence::ExplicitMonth))
}

fn resolve_quarter(caps: &Captures<'_>, anchor: NaiveDate) -> Option<(DateRange, Precedence)> {
    let quarter = match caps.get(1) {
        Some(digit) => digit.as_str().parse().ok()?,
        None => match caps.get(2)?.as_str().to_ascii_lowercase().as_str() {
            "first" | "1st" => 1,
            "second" | "2nd" => 2,
            "third" | "3rd" => 3,
            _ => 4,
        },
    };
    match caps.get(3) {
        Some(_) => Some((DateRange::quarter(year(caps, 3)?, quarter)?, Precedence::ExplicitYear)),
        None => Some((
            DateRange::quarter(anchor.year(), quarter)?,
            Precedence::ExplicitMonth,
        )),
    }
}

fn resolve_explicit_year(
    caps: &Captures<'_>,
    _anchor: NaiveDate,
) -> Option<(DateRange, Precedence)> {
    Some((DateRange::year(year(caps, 1)?)?, Precedence::ExplicitYear))
}

fn resolve_ago(caps: &Captures<'_>, anchor: NaiveDate) -> Option<(DateRange, Precedence)> {
    let count = i64::from(number(caps, 1)?);
    let unit = caps.get(2)?.as_str().to_ascii_lowercase();
    let days = if unit == "week" { count * 7 } else { count };
    relative(anchor, -days)
}

fn resolve_named_period(
    caps: &Captures<'_>,
    anchor: NaiveDate,
) -> Option<(DateRange, Precedence)> {
    let previous = !matches!(
        caps.get(1)?.as_str().to_ascii_lowercase().as_str(),
        "this" | "current"
    );
    let range = match caps.get(2)?.as_str().to_ascii_lowercase().as_str() {
        "week" => {
            let week = DateRange::week_of(anchor);
            if previous {
                DateRange::week_of(week.start.pred_opt()?)
            } else {
                week
            }
        }
        "month" => {
            let this_month = DateRange::month(anchor.year(), anchor.month())?;
            if previous {
                let last_day = this_month.start.pred_opt()?;
                DateRange::month(last_day.year(), last_day.month())?
            } else {
                this_month
            }
        }
        "quarter" => {
            let quarter = (anchor.month() - 1) / 3 + 1;
            let this_quarter = DateRange::quarter(anchor.year(), quarter)?;
            if previous {
                let last_day = this_quarter.start.pred_opt()?;
                DateRange::quarter(last_day.year(), (last_day.month() - 1) / 3 + 1)?
            } else {
                this_quarter
            }
        }
        _ => DateRange::year(if previous {
            anchor.year() - 1
        } else {
            anchor.year()
        })?,
    };
    Some((range, Precedence::Relative))
}

fn resolve_last_n_days(
    caps: &Captures<'_>,
    anchor: NaiveDate,
) -> Option<(DateRange, Precedence)> {
    let count = i64::from(number(caps, 1)?.max(1));
    let start = anchor.checked_sub_signed(Duration::days(count - 1))?;
    Some((DateRange { start, end: anchor }, Precedence::Relative))
}

fn resolve_weekday(caps: &Captures<'_>, anchor: NaiveDate) -> Option<(DateRange, Precedence)> {
    let target: Weekday = caps.get(2)?.as_str().parse().ok()?;
    let qualifier = caps.get(1).map(|q| q.as_str().to_ascii_lowercase());

    let date = if qualifier.as_deref() == Some("this") {
        DateRange::week_of(anchor).start + Duration::days(i64::from(target.num_days_from_monday()))
    } else {
        let today = anchor.weekday().num_days_from_monday();
        let mut back = (7 + today - target.num_days_from_monday()) % 7;
        if back == 0 && matches!(qualifier.as_deref(), Some("last" | "previous")) {
            back = 7;
        }
        anchor - Duration::days(i64::from(back))
    };
    Some(single(date, Precedence::Relative))
}

/// Most recent date on or before the anchor whose day-of-month matches.
fn resolve_bare_day(caps: &Captures<'_>, anchor: NaiveDate) -> Option<(DateRange, Precedence)> {
    let day = number(caps, 1)?;
    if !(1..=31).contains(&day) {
        return None;
    }
    let mut year = anchor.year();
    let mut month = anchor.month();
    for _ in 0..12 {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            if date <= anchor {
                return Some(single(date, Precedence::BareNumeral));
            }
        }
        if month == 1 {
            year -= 1;
            month = 12;
        } else {
            month -= 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Sunday
    fn anchor() -> NaiveDate {
        date(2025, 4, 6)
    }

    fn resolve(text: &str) -> DateMatch {
        extract_date(text, anchor())
            .value
            .unwrap_or_else(|| panic!("no date in {text:?}"))
    }

    fn range(text: &str) -> (NaiveDate, NaiveDate) {
        let found = resolve(text);
        (found.range.start, found.range.end)
    }

    #[test]
    fn test_literal_formats() {
        assert_eq!(resolve("05-04-2025").day(), date(2025, 4, 5));
        assert_eq!(resolve("05/04/2025").day(), date(2025, 4, 5));
        assert_eq!(resolve("05.04.2025").day(), date(2025, 4, 5));
        assert_eq!(resolve("2025-04-05").day(), date(2025, 4, 5));
        assert_eq!(resolve("5/4/25").day(), date(2025, 4, 5));
        assert_eq!(resolve("12/03").day(), date(2025, 3, 12));
    }

    #[test]
    fn test_month_first_when_day_first_is_impossible() {
        assert_eq!(resolve("04/25/2025").day(), date(2025, 4, 25));
    }

    #[test]
    fn test_invalid_literal_is_ignored() {
        assert!(extract_date("31-02-2025", anchor()).value.is_none());
    }

    #[test]
    fn test_relative_words() {
        assert_eq!(resolve("today").day(), anchor());
        assert_eq!(resolve("Yesterday").day(), date(2025, 4, 5));
        assert_eq!(resolve("day before yesterday").day(), date(2025, 4, 4));
        assert_eq!(resolve("3 days ago").day(), date(2025, 4, 3));
        assert_eq!(resolve("2 weeks ago").day(), date(2025, 3, 23));
    }

    #[test]
    fn test_last_month_is_full_previous_month() {
        assert_eq!(range("last month"), (date(2025, 3, 1), date(2025, 3, 31)));
    }

    #[test]
    fn test_named_periods() {
        assert_eq!(range("this month"), (date(2025, 4, 1), date(2025, 4, 30)));
        assert_eq!(range("this week"), (date(2025, 3, 31), date(2025, 4, 6)));
        assert_eq!(range("last week"), (date(2025, 3, 24), date(2025, 3, 30)));
        assert_eq!(range("this quarter"), (date(2025, 4, 1), date(2025, 6, 30)));
        assert_eq!(range("last quarter"), (date(2025, 1, 1), date(2025, 3, 31)));
        assert_eq!(range("LAST YEAR"), (date(2024, 1, 1), date(2024, 12, 31)));
        assert_eq!(range("last 7 days"), (date(2025, 3, 31), date(2025, 4, 6)));
        assert_eq!(range("ytd"), (date(2025, 1, 1), date(2025, 4, 6)));
    }

    #[test]
    fn test_last_month_wraps_year() {
        let found = extract_date("last month", date(2025, 1, 15)).value.unwrap();
        assert_eq!(found.range.start, date(2024, 12, 1));
        assert_eq!(found.range.end, date(2024, 12, 31));
    }

    #[test]
    fn test_month_names_and_quarters() {
        assert_eq!(range("January"), (date(2025, 1, 1), date(2025, 1, 31)));
        assert_eq!(range("feb 2024"), (date(2024, 2, 1), date(2024, 2, 29)));
        assert_eq!(range("Q1"), (date(2025, 1, 1), date(2025, 3, 31)));
        assert_eq!(range("q3 2024"), (date(2024, 7, 1), date(2024, 9, 30)));
        assert_eq!(range("second quarter"), (date(2025, 4, 1), date(2025, 6, 30)));
        assert_eq!(resolve("5th April").day(), date(2025, 4, 5));
        assert_eq!(resolve("april 5").day(), date(2025, 4, 5));
        assert_eq!(resolve("March 3, 2024").day(), date(2024, 3, 3));
    }

    #[test]
    fn test_may_needs_a_day_or_year() {
        assert!(extract_date("you may record it", anchor()).value.is_none());
        assert_eq!(resolve("2 may").day(), date(2025, 5, 2));
    }

    #[test]
    fn test_weekdays() {
        // Anchor is a Sunday; its week started Monday 2025-03-31
        assert_eq!(resolve("last monday").day(), date(2025, 3, 31));
        assert_eq!(resolve("this friday").day(), date(2025, 4, 4));
        assert_eq!(resolve("on monday").day(), date(2025, 3, 31));
        assert_eq!(resolve("sunday").day(), anchor());
        assert_eq!(resolve("last sunday").day(), date(2025, 3, 30));
    }

    #[test]
    fn test_bare_day_resolves_to_most_recent_past_occurrence() {
        assert_eq!(resolve("the 5th").day(), date(2025, 4, 5));
        assert_eq!(resolve("on the 10th").day(), date(2025, 3, 10));
        assert_eq!(resolve("31st").day(), date(2025, 3, 31));

        // Near a month boundary: February has no 30th
        let found = extract_date("30th", date(2025, 3, 1)).value.unwrap();
        assert_eq!(found.day(), date(2025, 1, 30));
    }

    #[test]
    fn test_precedence_explicit_year_beats_everything() {
        let found = resolve("yesterday or rather 01-03-2024");
        assert_eq!(found.day(), date(2024, 3, 1));
        assert_eq!(found.precedence, Precedence::ExplicitYear);
    }

    #[test]
    fn test_precedence_explicit_month_beats_relative() {
        let found = resolve("yesterday, I mean 12/03");
        assert_eq!(found.day(), date(2025, 3, 12));
        assert_eq!(found.precedence, Precedence::ExplicitMonth);
    }

    #[test]
    fn test_precedence_relative_beats_bare_numeral() {
        let found = resolve("paid the 2nd installment yesterday");
        assert_eq!(found.day(), date(2025, 4, 5));
        assert_eq!(found.precedence, Precedence::Relative);
    }

    #[test]
    fn test_equal_precedence_takes_earliest() {
        assert_eq!(resolve("yesterday not today").day(), date(2025, 4, 5));
    }

    #[test]
    fn test_range() {
        let found = resolve("summary from 01-03-2025 to 15-03-2025");
        assert_eq!(found.range.start, date(2025, 3, 1));
        assert_eq!(found.range.end, date(2025, 3, 15));
        assert!(!found.reversed);
    }

    #[test]
    fn test_range_of_months_spans_both() {
        assert_eq!(
            range("between january and march"),
            (date(2025, 1, 1), date(2025, 3, 31))
        );
    }

    #[test]
    fn test_reversed_range_is_swapped_with_warning() {
        let found = resolve("from 31-03-2025 to 01-03-2025");
        assert_eq!(found.range.start, date(2025, 3, 1));
        assert_eq!(found.range.end, date(2025, 3, 31));
        assert!(found.reversed);
    }

    #[test]
    fn test_from_without_dates_is_not_a_range() {
        let found = extract_date("received 500 from Ramesh to settle yesterday", anchor());
        assert_eq!(found.value.unwrap().day(), date(2025, 4, 5));
    }

    #[test]
    fn test_residual_drops_date_and_connector() {
        let found = extract_date("spent 500 on travel on 5 april", anchor());
        assert_eq!(found.residual, "spent 500 on travel");

        let found = extract_date("ledger of Ramesh for last month please", anchor());
        assert_eq!(found.residual, "ledger of Ramesh please");
    }

    #[test]
    fn test_no_date() {
        let found = extract_date("chai stall", anchor());
        assert!(found.value.is_none());
        assert_eq!(found.residual, "chai stall");
    }

    #[test]
    fn test_date_range_helpers() {
        let march = DateRange::month(2025, 3).unwrap();
        assert!(march.contains(date(2025, 3, 31)));
        assert!(!march.contains(date(2025, 4, 1)));
        assert!(DateRange::day(anchor()).is_single_day());
    }
}
