//! Deterministic number and date formatting.
//!
//! Output never depends on the process locale. Without an explicit locale the
//! `C` conventions apply: no digit grouping, `.` as decimal separator, English
//! month and weekday names.
//!
//! Date patterns use the custom tokens below; a pattern containing `%` is
//! treated as a chrono strftime string instead.
//!
//! | Token  | Meaning                    |
//! |--------|----------------------------|
//! | `YYYY` | 4-digit year               |
//! | `YY`   | 2-digit year               |
//! | `MMMM` | full month name            |
//! | `MMM`  | abbreviated month name     |
//! | `MM`   | zero-padded month number   |
//! | `dd`   | zero-padded day of month   |
//! | `DD`   | full weekday name          |
//! | `ddd`  | abbreviated weekday name   |
//! | `HH`   | 24-hour clock hour         |
//! | `hh`   | 12-hour clock hour         |
//! | `mm`   | minute                     |
//! | `ss`   | second                     |

use chrono::format::{Item, StrftimeItems};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use phf::phf_map;
use std::fmt::Write as FmtWrite;

/// Formatting conventions of one locale.
#[derive(Debug)]
pub struct Locale {
    pub name: &'static str,
    pub decimal: char,
    pub group: Option<char>,
    pub months: [&'static str; 12],
    pub months_short: [&'static str; 12],
    /// Monday first.
    pub weekdays: [&'static str; 7],
    pub weekdays_short: [&'static str; 7],
}

const ENGLISH_MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];
const ENGLISH_MONTHS_SHORT: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const ENGLISH_WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];
const ENGLISH_WEEKDAYS_SHORT: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Locale-independent defaults.
pub const C_LOCALE: Locale = Locale {
    name: "C",
    decimal: '.',
    group: None,
    months: ENGLISH_MONTHS,
    months_short: ENGLISH_MONTHS_SHORT,
    weekdays: ENGLISH_WEEKDAYS,
    weekdays_short: ENGLISH_WEEKDAYS_SHORT,
};

const EN: Locale = Locale {
    name: "en",
    decimal: '.',
    group: Some(','),
    ..C_LOCALE
};

const DE: Locale = Locale {
    name: "de",
    decimal: ',',
    group: Some('.'),
    months: [
        "Januar",
        "Februar",
        "März",
        "April",
        "Mai",
        "Juni",
        "Juli",
        "August",
        "September",
        "Oktober",
        "November",
        "Dezember",
    ],
    months_short: [
        "Jan", "Feb", "Mär", "Apr", "Mai", "Jun", "Jul", "Aug", "Sep", "Okt", "Nov", "Dez",
    ],
    weekdays: [
        "Montag",
        "Dienstag",
        "Mittwoch",
        "Donnerstag",
        "Freitag",
        "Samstag",
        "Sonntag",
    ],
    weekdays_short: ["Mo", "Di", "Mi", "Do", "Fr", "Sa", "So"],
};

const FR: Locale = Locale {
    name: "fr",
    decimal: ',',
    group: Some('\u{202f}'),
    months: [
        "janvier",
        "février",
        "mars",
        "avril",
        "mai",
        "juin",
        "juillet",
        "août",
        "septembre",
        "octobre",
        "novembre",
        "décembre",
    ],
    months_short: [
        "janv.", "févr.", "mars", "avr.", "mai", "juin", "juil.", "août", "sept.", "oct.",
        "nov.", "déc.",
    ],
    weekdays: [
        "lundi", "mardi", "mercredi", "jeudi", "vendredi", "samedi", "dimanche",
    ],
    weekdays_short: ["lun.", "mar.", "mer.", "jeu.", "ven.", "sam.", "dim."],
};

const ES: Locale = Locale {
    name: "es",
    decimal: ',',
    group: Some('.'),
    months: [
        "enero",
        "febrero",
        "marzo",
        "abril",
        "mayo",
        "junio",
        "julio",
        "agosto",
        "septiembre",
        "octubre",
        "noviembre",
        "diciembre",
    ],
    months_short: [
        "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sept", "oct", "nov", "dic",
    ],
    weekdays: [
        "lunes",
        "martes",
        "miércoles",
        "jueves",
        "viernes",
        "sábado",
        "domingo",
    ],
    weekdays_short: ["lun", "mar", "mié", "jue", "vie", "sáb", "dom"],
};

static LOCALES: phf::Map<&'static str, &'static Locale> = phf_map! {
    "c" => &C_LOCALE,
    "posix" => &C_LOCALE,
    "en" => &EN,
    "de" => &DE,
    "fr" => &FR,
    "es" => &ES,
};

/// Find a locale by tag (`de`, `de_DE`, `fr-CA`, `C`).
pub fn find_locale(tag: &str) -> Option<&'static Locale> {
    let normalized = tag.trim().to_ascii_lowercase().replace('-', "_");
    if let Some(locale) = LOCALES.get(normalized.as_str()) {
        return Some(*locale);
    }
    let language = normalized.split('_').next()?;
    LOCALES.get(language).copied()
}

/// Most fractional digits `format_number` will emit.
pub const MAX_DECIMALS: usize = 15;

/// Format a number with fixed `decimals` (or shortest form) using `locale`.
///
/// `decimals` is capped at [`MAX_DECIMALS`].
pub fn format_number(value: f64, decimals: Option<usize>, locale: &Locale) -> String {
    if !value.is_finite() {
        return super::value::format_float(value);
    }
    let plain = match decimals {
        Some(d) => format!("{:.*}", d.min(MAX_DECIMALS), value),
        None if value.fract() == 0.0 && value.abs() < 1e15 => {
            itoa::Buffer::new().format(value as i64).to_string()
        },
        None => ryu::Buffer::new().format_finite(value).to_string(),
    };

    let (sign, unsigned) = match plain.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", plain.as_str()),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut out = String::with_capacity(plain.len() + 8);
    out.push_str(sign);
    match locale.group {
        Some(sep) if int_part.len() > 3 && int_part.bytes().all(|b| b.is_ascii_digit()) => {
            let lead = int_part.len() % 3;
            for (i, ch) in int_part.chars().enumerate() {
                if i > 0 && (i + 3 - lead) % 3 == 0 {
                    out.push(sep);
                }
                out.push(ch);
            }
        },
        _ => out.push_str(int_part),
    }
    if let Some(frac) = frac_part {
        out.push(locale.decimal);
        out.push_str(frac);
    }
    out
}

/// Format a date-time with a custom-token or strftime pattern.
pub fn format_datetime(value: &NaiveDateTime, pattern: &str, locale: &Locale) -> Result<String, String> {
    if pattern.contains('%') {
        let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            return Err(format!("invalid strftime pattern '{}'", pattern));
        }
        return Ok(value.format_with_items(items.into_iter()).to_string());
    }

    const TOKENS: [&str; 12] = [
        "YYYY", "MMMM", "MMM", "ddd", "YY", "MM", "dd", "DD", "HH", "hh", "mm", "ss",
    ];

    let mut out = String::with_capacity(pattern.len() + 16);
    let mut rest = pattern;
    'outer: while !rest.is_empty() {
        for token in TOKENS {
            if let Some(after) = rest.strip_prefix(token) {
                write_token(&mut out, token, value, locale);
                rest = after;
                continue 'outer;
            }
        }
        let ch = rest.chars().next().unwrap_or_default();
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    Ok(out)
}

/// Format a calendar date; time tokens render as midnight.
pub fn format_date(value: &NaiveDate, pattern: &str, locale: &Locale) -> Result<String, String> {
    format_datetime(&value.and_time(chrono::NaiveTime::MIN), pattern, locale)
}

fn write_token(out: &mut String, token: &str, value: &NaiveDateTime, locale: &Locale) {
    let month = value.month0() as usize;
    let weekday = value.weekday().num_days_from_monday() as usize;
    let _ = match token {
        "YYYY" => write!(out, "{:04}", value.year()),
        "YY" => write!(out, "{:02}", value.year().rem_euclid(100)),
        "MMMM" => write!(out, "{}", locale.months[month]),
        "MMM" => write!(out, "{}", locale.months_short[month]),
        "MM" => write!(out, "{:02}", value.month()),
        "dd" => write!(out, "{:02}", value.day()),
        "DD" => write!(out, "{}", locale.weekdays[weekday]),
        "ddd" => write!(out, "{}", locale.weekdays_short[weekday]),
        "HH" => write!(out, "{:02}", value.hour()),
        "hh" => write!(out, "{:02}", value.hour12().1),
        "mm" => write!(out, "{:02}", value.minute()),
        "ss" => write!(out, "{:02}", value.second()),
        _ => Ok(()),
    };
}

/// Parse an ISO-8601 date or date-time string.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    const PATTERNS: [&str; 6] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for pattern in PATTERNS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, pattern) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap()
    }

    #[test]
    fn test_locale_lookup() {
        assert_eq!(find_locale("de_DE").unwrap().name, "de");
        assert_eq!(find_locale("fr-CA").unwrap().name, "fr");
        assert_eq!(find_locale("C").unwrap().name, "C");
        assert!(find_locale("xx").is_none());
    }

    #[test]
    fn test_number_formatting() {
        let en = find_locale("en").unwrap();
        let de = find_locale("de").unwrap();
        assert_eq!(format_number(1234567.891, Some(2), &C_LOCALE), "1234567.89");
        assert_eq!(format_number(1234567.891, Some(2), en), "1,234,567.89");
        assert_eq!(format_number(1234567.891, Some(2), de), "1.234.567,89");
        assert_eq!(format_number(-1234.0, None, en), "-1,234");
        assert_eq!(format_number(999.5, Some(0), en), "1,000");
        assert_eq!(format_number(123.0, Some(1), en), "123.0");
        assert_eq!(format_number(0.25, None, de), "0,25");
        assert_eq!(format_number(1.5, Some(1_000_000_000), &C_LOCALE), "1.500000000000000");
    }

    #[test]
    fn test_custom_date_tokens() {
        let dt = sample();
        assert_eq!(format_datetime(&dt, "MMMM dd, YYYY", &C_LOCALE).unwrap(), "March 09, 2024");
        assert_eq!(format_datetime(&dt, "ddd MMM YY", &C_LOCALE).unwrap(), "Sat Mar 24");
        assert_eq!(format_datetime(&dt, "DD HH:mm:ss", &C_LOCALE).unwrap(), "Saturday 14:05:07");
        assert_eq!(format_datetime(&dt, "hh:mm", &C_LOCALE).unwrap(), "02:05");
        assert_eq!(
            format_datetime(&dt, "dd. MMMM YYYY", find_locale("de").unwrap()).unwrap(),
            "09. März 2024"
        );
    }

    #[test]
    fn test_strftime_patterns() {
        let dt = sample();
        assert_eq!(format_datetime(&dt, "%Y/%m/%d", &C_LOCALE).unwrap(), "2024/03/09");
        assert!(format_datetime(&dt, "%Q", &C_LOCALE).is_err());
    }

    #[test]
    fn test_parse_datetime() {
        assert_eq!(parse_datetime("2024-03-09 14:05:07"), Some(sample()));
        assert_eq!(parse_datetime("2024-03-09T14:05:07"), Some(sample()));
        assert_eq!(
            parse_datetime("2024-03-09").unwrap().date(),
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
        );
        assert!(parse_datetime("yesterday").is_none());
    }
}
