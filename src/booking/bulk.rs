use chrono::{Datelike, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::policy::WeekParity;

// "every second Wednesday" and "every other Wednesday" both mean the
// even-ISO-week Wednesday, matching the alternating policy tables.
static ALTERNATING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^every\s+(?:second|other)\s+([a-z]+)$").expect("selector regex"));

static PARITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(odd|even)\s+([a-z]+)$").expect("selector regex"));

#[derive(Debug, Error)]
#[error("invalid weekday selector: {0}")]
pub struct SelectorParseError(pub String);

/// One token of a bulk request's weekday selection: a plain weekday, or a
/// parity-qualified weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekdaySelector {
    Every(Weekday),
    Alternating { weekday: Weekday, parity: WeekParity },
}

impl WeekdaySelector {
    pub fn matches(&self, date: NaiveDate) -> bool {
        match self {
            WeekdaySelector::Every(weekday) => date.weekday() == *weekday,
            WeekdaySelector::Alternating { weekday, parity } => {
                date.weekday() == *weekday && WeekParity::of(date) == *parity
            }
        }
    }
}

pub fn parse_selector(token: &str) -> Result<WeekdaySelector, SelectorParseError> {
    let token = token.trim();

    if let Some(captures) = ALTERNATING_RE.captures(token) {
        let weekday = parse_weekday(&captures[1], token)?;
        return Ok(WeekdaySelector::Alternating {
            weekday,
            parity: WeekParity::Even,
        });
    }

    if let Some(captures) = PARITY_RE.captures(token) {
        let parity = WeekParity::parse(&captures[1])
            .ok_or_else(|| SelectorParseError(token.to_string()))?;
        let weekday = parse_weekday(&captures[2], token)?;
        return Ok(WeekdaySelector::Alternating { weekday, parity });
    }

    Ok(WeekdaySelector::Every(parse_weekday(token, token)?))
}

fn parse_weekday(name: &str, token: &str) -> Result<Weekday, SelectorParseError> {
    name.parse::<Weekday>()
        .map_err(|_| SelectorParseError(token.to_string()))
}

/// Expands a weekday selection over an inclusive date range. Weekends are
/// always skipped, whatever the selectors say.
pub fn expand_dates(
    selectors: &[WeekdaySelector],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut day = start;
    while day <= end {
        let weekday = day.weekday();
        if !matches!(weekday, Weekday::Sat | Weekday::Sun)
            && selectors.iter().any(|selector| selector.matches(day))
        {
            dates.push(day);
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    dates
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("test date")
    }

    #[test_case("Wed", WeekdaySelector::Every(Weekday::Wed))]
    #[test_case("wednesday", WeekdaySelector::Every(Weekday::Wed))]
    #[test_case(
        "every second Wednesday",
        WeekdaySelector::Alternating { weekday: Weekday::Wed, parity: WeekParity::Even }
    )]
    #[test_case(
        "every other friday",
        WeekdaySelector::Alternating { weekday: Weekday::Fri, parity: WeekParity::Even }
    )]
    #[test_case(
        "odd wednesday",
        WeekdaySelector::Alternating { weekday: Weekday::Wed, parity: WeekParity::Odd }
    )]
    fn selectors_parse(token: &str, expected: WeekdaySelector) {
        assert_eq!(parse_selector(token).expect("parse"), expected);
    }

    #[test_case("funday")]
    #[test_case("every second funday")]
    #[test_case("")]
    fn invalid_selectors_are_rejected(token: &str) {
        assert!(parse_selector(token).is_err());
    }

    #[test]
    fn fourteen_day_range_contains_two_wednesdays() {
        let dates = expand_dates(
            &[WeekdaySelector::Every(Weekday::Wed)],
            date("2025-01-13"),
            date("2025-01-26"),
        );
        assert_eq!(dates, vec![date("2025-01-15"), date("2025-01-22")]);
    }

    #[test]
    fn alternating_selector_keeps_matching_parity_only() {
        let range = (date("2025-01-13"), date("2025-01-26"));

        let even = expand_dates(
            &[WeekdaySelector::Alternating { weekday: Weekday::Wed, parity: WeekParity::Even }],
            range.0,
            range.1,
        );
        assert_eq!(even, vec![date("2025-01-22")]);

        let odd = expand_dates(
            &[WeekdaySelector::Alternating { weekday: Weekday::Wed, parity: WeekParity::Odd }],
            range.0,
            range.1,
        );
        assert_eq!(odd, vec![date("2025-01-15")]);
    }

    #[test]
    fn weekend_selectors_never_match() {
        let dates = expand_dates(
            &[WeekdaySelector::Every(Weekday::Sat)],
            date("2025-01-13"),
            date("2025-01-26"),
        );
        assert!(dates.is_empty());
    }

    #[test]
    fn inverted_range_is_empty() {
        let dates = expand_dates(
            &[WeekdaySelector::Every(Weekday::Wed)],
            date("2025-01-26"),
            date("2025-01-13"),
        );
        assert!(dates.is_empty());
    }
}
