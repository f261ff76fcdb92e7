use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::grid::Cell;

/// Label assigned when an operator field is empty or missing.
pub const UNASSIGNED: &str = "Unassigned";

/// Offset between the spreadsheet serial epoch (1899-12-30) and the Unix
/// epoch, in days.
const SERIAL_UNIX_OFFSET_DAYS: f64 = 25569.0;

/// Three-letter month abbreviations accepted in long-form dates. English
/// and Italian variants share several entries.
const MONTH_ABBREVIATIONS: &[(&str, u32)] = &[
    ("jan", 1),
    ("gen", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("may", 5),
    ("mag", 5),
    ("jun", 6),
    ("giu", 6),
    ("jul", 7),
    ("lug", 7),
    ("aug", 8),
    ("ago", 8),
    ("sep", 9),
    ("set", 9),
    ("oct", 10),
    ("ott", 10),
    ("nov", 11),
    ("dec", 12),
    ("dic", 12),
];

/// Converts a spreadsheet serial date to a timestamp.
pub fn datetime_from_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let seconds = ((serial - SERIAL_UNIX_OFFSET_DAYS) * 86400.0).round() as i64;
    DateTime::from_timestamp(seconds, 0).map(|dt| dt.naive_utc())
}

/// Best-effort timestamp extraction from a raw cell. Empty or unparseable
/// input yields `None`; callers decide whether that rejects the row.
pub fn timestamp_from_cell(cell: &Cell) -> Option<NaiveDateTime> {
    match cell {
        Cell::DateTime(dt) => Some(*dt),
        Cell::Number(n) => datetime_from_serial(*n),
        Cell::Text(s) => timestamp_from_str(s),
        _ => None,
    }
}

pub fn timestamp_from_str(raw: &str) -> Option<NaiveDateTime> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }

    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }

    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];
    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, format) {
            return d.and_hms_opt(0, 0, 0);
        }
    }

    long_form_timestamp(text)
}

/// Parses localized long-form dates such as "feb 17, 2024 10:20" or
/// "mag 3, 2024", resolving the month through the abbreviation table.
fn long_form_timestamp(text: &str) -> Option<NaiveDateTime> {
    let cleaned = text.to_lowercase().replace(',', " ");
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    if tokens.len() < 3 {
        return None;
    }

    let abbrev = tokens[0].get(..3)?;
    let month = MONTH_ABBREVIATIONS
        .iter()
        .find(|(name, _)| *name == abbrev)
        .map(|(_, m)| *m)?;
    let day: u32 = tokens[1].parse().ok()?;
    let year: i32 = tokens[2].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    let time = tokens
        .get(3)
        .and_then(|t| NaiveTime::parse_from_str(t, "%H:%M").ok())
        .unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    Some(date.and_time(time))
}

/// Normalizes any supported duration encoding to minutes. Never negative,
/// never fails: malformed input degrades to 0.
pub fn duration_minutes_from_cell(cell: &Cell) -> f64 {
    match cell {
        Cell::Number(n) => clamp_minutes(*n),
        Cell::Text(s) => duration_minutes_from_str(s),
        _ => 0.0,
    }
}

pub fn duration_minutes_from_str(raw: &str) -> f64 {
    let stripped = raw
        .to_lowercase()
        .replace("hrs", "")
        .replace("min", "")
        .replace(['m', 's'], "");
    let text = stripped.trim();
    if text.is_empty() {
        return 0.0;
    }

    let parts: Vec<f64> = text
        .split(':')
        .map(|p| p.trim().parse::<f64>().unwrap_or(0.0))
        .collect();
    let minutes = match parts.len() {
        3 => parts[0] * 60.0 + parts[1] + parts[2] / 60.0,
        2 => parts[0] + parts[1] / 60.0,
        _ => text.parse::<f64>().unwrap_or(0.0),
    };
    clamp_minutes(minutes)
}

fn clamp_minutes(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Canonical operator display names. Injected so tests and alternate
/// deployments can substitute their own table.
#[derive(Debug, Clone)]
pub struct OperatorAliases {
    map: HashMap<String, String>,
}

const DEFAULT_OPERATOR_ALIASES: &[(&str, &str)] = &[
    ("martina ferraro", "Martina"),
    ("luca de santis", "Luca"),
    ("sofia grandi", "Sofia"),
    ("andrea colombo", "Andrea"),
    ("paola b", "Paola"),
    ("karim e", "Karim"),
];

impl OperatorAliases {
    pub fn with_table(entries: &[(&str, &str)]) -> Self {
        let map = entries
            .iter()
            .map(|(alias, display)| (alias.to_lowercase(), display.to_string()))
            .collect();
        OperatorAliases { map }
    }

    /// Resolves a free-text identity to one display name. Alias misses
    /// fall back to the capitalized first token; empty input maps to the
    /// unassigned sentinel.
    pub fn canonical(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return UNASSIGNED.to_string();
        }
        if let Some(display) = self.map.get(&trimmed.to_lowercase()) {
            return display.clone();
        }
        let first = trimmed.split_whitespace().next().unwrap_or(trimmed);
        capitalize(first)
    }
}

impl Default for OperatorAliases {
    fn default() -> Self {
        OperatorAliases::with_table(DEFAULT_OPERATOR_ALIASES)
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_encodings_agree_on_ninety_minutes() {
        assert_eq!(duration_minutes_from_cell(&Cell::Number(90.0)), 90.0);
        assert_eq!(
            duration_minutes_from_cell(&Cell::Text("1:30:00".to_string())),
            90.0
        );
        assert_eq!(
            duration_minutes_from_cell(&Cell::Text("90 min".to_string())),
            90.0
        );
    }

    #[test]
    fn two_part_duration_weighs_seconds() {
        assert_eq!(duration_minutes_from_str("2:30"), 2.5);
    }

    #[test]
    fn malformed_durations_degrade_to_zero() {
        assert_eq!(duration_minutes_from_str("n/a"), 0.0);
        assert_eq!(duration_minutes_from_cell(&Cell::Empty), 0.0);
        assert_eq!(duration_minutes_from_cell(&Cell::Number(-5.0)), 0.0);
    }

    #[test]
    fn serial_and_iso_yield_the_same_date() {
        let expected = NaiveDate::from_ymd_opt(2024, 2, 17).unwrap();
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        let serial = (expected - epoch).num_days() as f64 + SERIAL_UNIX_OFFSET_DAYS;

        let from_serial = timestamp_from_cell(&Cell::Number(serial)).unwrap();
        let from_iso = timestamp_from_cell(&Cell::Text("2024-02-17".to_string())).unwrap();
        assert_eq!(from_serial.date(), expected);
        assert_eq!(from_serial, from_iso);
    }

    #[test]
    fn rfc3339_timestamps_parse() {
        let ts = timestamp_from_str("2024-02-17T10:20:30Z").unwrap();
        assert_eq!(
            ts,
            NaiveDate::from_ymd_opt(2024, 2, 17)
                .unwrap()
                .and_hms_opt(10, 20, 30)
                .unwrap()
        );
    }

    #[test]
    fn long_form_dates_resolve_localized_months() {
        let english = timestamp_from_str("Feb 17, 2024 10:20").unwrap();
        let italian = timestamp_from_str("gen 5, 2024").unwrap();
        assert_eq!(
            english.date(),
            NaiveDate::from_ymd_opt(2024, 2, 17).unwrap()
        );
        assert_eq!(italian.date(), NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
    }

    #[test]
    fn unparseable_dates_yield_none() {
        assert_eq!(timestamp_from_str(""), None);
        assert_eq!(timestamp_from_str("not a date"), None);
        assert_eq!(timestamp_from_cell(&Cell::Empty), None);
    }

    #[test]
    fn aliases_resolve_known_names() {
        let aliases = OperatorAliases::default();
        assert_eq!(aliases.canonical("Martina Ferraro"), "Martina");
        assert_eq!(aliases.canonical("  luca de santis "), "Luca");
    }

    #[test]
    fn alias_miss_capitalizes_first_token() {
        let aliases = OperatorAliases::default();
        assert_eq!(aliases.canonical("GIORGIO bassi"), "Giorgio");
        assert_eq!(aliases.canonical("elena"), "Elena");
    }

    #[test]
    fn empty_operator_maps_to_sentinel() {
        let aliases = OperatorAliases::default();
        assert_eq!(aliases.canonical(""), UNASSIGNED);
        assert_eq!(aliases.canonical("   "), UNASSIGNED);
    }
}
