//! Excel date helpers
//!
//! - Serial numbers: Excel stores dates as days since 1899-12-30 with the
//!   time of day as the fractional part. Serials below 61 follow Excel's
//!   fictitious 1900-02-29.
//! - Patterns: Excel number formats (`yyyy-mm-dd`, `h:mm AM/PM`, ...) are
//!   translated to chrono strftime patterns for formatting and parsing text.

use chrono::format::{Item, StrftimeItems};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

pub const DEFAULT_DATE_FORMAT: &str = "yyyy-mm-dd";
pub const DEFAULT_DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// `NaiveDate::num_days_from_ce` of 1899-12-30, Excel's day zero
const EXCEL_EPOCH_DAYS_FROM_CE: i32 = 693_594;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Serial of 1900-03-01. Excel counts a 1900-02-29 at serial 60, so serials
/// below this one are a day off from plain day counting.
const FIRST_SERIAL_AFTER_LEAP_BUG: i32 = 61;

/// Years Excel can store as dates
const EXCEL_YEARS: std::ops::RangeInclusive<i32> = 1900..=9999;

/// Reject date-times Excel cannot represent as a date serial
pub fn check_excel_date(dt: &NaiveDateTime) -> Result<(), String> {
    if EXCEL_YEARS.contains(&dt.year()) {
        Ok(())
    } else {
        Err(format!(
            "{} is outside the dates Excel can store (1900-01-01 to 9999-12-31)",
            dt
        ))
    }
}

/// Convert a date-time to an Excel serial number
pub fn to_excel_serial(dt: &NaiveDateTime) -> f64 {
    let mut days = dt.date().num_days_from_ce() - EXCEL_EPOCH_DAYS_FROM_CE;
    if days < FIRST_SERIAL_AFTER_LEAP_BUG {
        days -= 1;
    }
    let seconds = dt.time().num_seconds_from_midnight() as f64
        + dt.time().nanosecond() as f64 / 1_000_000_000.0;
    days as f64 + seconds / SECONDS_PER_DAY
}

/// Convert an Excel serial number back to a date-time, rounded to the second
pub fn from_excel_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }

    let mut days = serial.floor();
    let mut seconds = ((serial - days) * SECONDS_PER_DAY).round();
    if seconds >= SECONDS_PER_DAY {
        days += 1.0;
        seconds = 0.0;
    }

    let mut days = i32::try_from(days as i64).ok()?;
    if days == FIRST_SERIAL_AFTER_LEAP_BUG - 1 {
        // 1900-02-29 does not exist
        return None;
    }
    if days < FIRST_SERIAL_AFTER_LEAP_BUG {
        days += 1;
    }
    let date = NaiveDate::from_num_days_from_ce_opt(days.checked_add(EXCEL_EPOCH_DAYS_FROM_CE)?)?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds as u32, 0)?;
    Some(date.and_time(time))
}

/// Format a date-time with an Excel number format
pub fn format_datetime(dt: &NaiveDateTime, excel_format: &str) -> String {
    let pattern = strftime_pattern(excel_format).unwrap_or_else(|| "%Y-%m-%d %H:%M:%S".to_string());
    dt.format(&pattern).to_string()
}

/// Parse date text written with an Excel number format.
///
/// Falls back to ISO 8601 shapes when the text does not follow the format.
pub fn parse_datetime(text: &str, excel_format: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Some(pattern) = strftime_pattern(excel_format) {
        if let Some(dt) = parse_with(text, &pattern) {
            return Some(dt);
        }
    }
    parse_iso(text)
}

/// Parse an ISO 8601 date or date-time
pub fn parse_iso(text: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d"]
        .iter()
        .find_map(|pattern| parse_with(text.trim(), pattern))
}

fn parse_with(text: &str, pattern: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, pattern)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, pattern)
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(String),
    Year(usize),
    Month(usize),
    /// `m`/`mm` is a minute next to an hour or second token, a month otherwise
    MonthOrMinute(usize),
    Day(usize),
    Hour(usize),
    Second(usize),
    AmPm,
}

/// Translate an Excel number format into a chrono strftime pattern.
///
/// Returns `None` when the result is not a valid chrono pattern.
pub fn strftime_pattern(excel_format: &str) -> Option<String> {
    let tokens = tokenize(excel_format);
    let twelve_hour = tokens.contains(&Token::AmPm);
    let mut out = String::new();

    for (idx, token) in tokens.iter().enumerate() {
        match token {
            Token::Literal(text) => out.push_str(&text.replace('%', "%%")),
            Token::Year(n) => out.push_str(if *n <= 2 { "%y" } else { "%Y" }),
            Token::Month(n) => out.push_str(month_item(*n)),
            Token::MonthOrMinute(n) => {
                if is_minute(&tokens, idx) {
                    out.push_str(if *n == 1 { "%-M" } else { "%M" });
                } else {
                    out.push_str(month_item(*n));
                }
            }
            Token::Day(n) => out.push_str(match n {
                1 => "%-d",
                2 => "%d",
                3 => "%a",
                _ => "%A",
            }),
            Token::Hour(n) => out.push_str(match (twelve_hour, *n == 1) {
                (true, true) => "%-I",
                (true, false) => "%I",
                (false, true) => "%-H",
                (false, false) => "%H",
            }),
            Token::Second(n) => out.push_str(if *n == 1 { "%-S" } else { "%S" }),
            Token::AmPm => out.push_str("%p"),
        }
    }

    if StrftimeItems::new(&out).any(|item| matches!(item, Item::Error)) {
        return None;
    }
    Some(out)
}

fn month_item(n: usize) -> &'static str {
    match n {
        1 => "%-m",
        2 => "%m",
        3 => "%b",
        _ => "%B",
    }
}

fn is_minute(tokens: &[Token], idx: usize) -> bool {
    let previous = tokens[..idx]
        .iter()
        .rev()
        .find(|t| !matches!(t, Token::Literal(_)));
    let next = tokens[idx + 1..]
        .iter()
        .find(|t| !matches!(t, Token::Literal(_)));
    matches!(previous, Some(Token::Hour(_))) || matches!(next, Some(Token::Second(_)))
}

fn tokenize(format: &str) -> Vec<Token> {
    let chars: Vec<char> = format.chars().collect();
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        // Quoted literal
        if c == '"' {
            let end = chars[i + 1..]
                .iter()
                .position(|&ch| ch == '"')
                .map_or(chars.len(), |p| i + 1 + p);
            literal.extend(&chars[i + 1..end]);
            i = end + 1;
            continue;
        }

        // Escaped character
        if c == '\\' {
            if let Some(&next) = chars.get(i + 1) {
                literal.push(next);
            }
            i += 2;
            continue;
        }

        // Locale / elapsed-time sections such as [$-409]
        if c == '[' {
            i = chars[i..]
                .iter()
                .position(|&ch| ch == ']')
                .map_or(chars.len(), |p| i + p + 1);
            continue;
        }

        let rest: String = chars[i..].iter().collect::<String>().to_ascii_uppercase();
        if rest.starts_with("AM/PM") || rest.starts_with("A/P") {
            flush_literal(&mut literal, &mut tokens);
            tokens.push(Token::AmPm);
            i += if rest.starts_with("AM/PM") { 5 } else { 3 };
            continue;
        }

        let run = chars[i..].iter().take_while(|&&ch| ch == c).count();
        let token = match c {
            'y' | 'Y' => Some(Token::Year(run)),
            'M' => Some(Token::Month(run)),
            'm' => Some(Token::MonthOrMinute(run)),
            'd' | 'D' => Some(Token::Day(run)),
            'h' | 'H' => Some(Token::Hour(run)),
            's' | 'S' => Some(Token::Second(run)),
            _ => None,
        };

        match token {
            Some(token) => {
                flush_literal(&mut literal, &mut tokens);
                tokens.push(token);
            }
            None => literal.extend(&chars[i..i + run]),
        }
        i += run;
    }

    flush_literal(&mut literal, &mut tokens);
    tokens
}

fn flush_literal(literal: &mut String, tokens: &mut Vec<Token>) {
    if !literal.is_empty() {
        tokens.push(Token::Literal(std::mem::take(literal)));
    }
}
