use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::models::{ChatRecord, KpiSnapshot, PeriodWindow, TicketRecord, Trend};

/// Status fragments that mark a ticket as closed, across the locale
/// spellings seen in real exports.
const CLOSED_STATUS_MARKERS: &[&str] = &["chius", "clos", "resolved", "risolto"];

/// The ISO week (Mon-Sun) containing the anchor date.
pub fn week_window(anchor: NaiveDate) -> PeriodWindow {
    let start = anchor - Duration::days(anchor.weekday().num_days_from_monday() as i64);
    let end = start + Duration::days(6);
    PeriodWindow {
        start,
        end,
        label: format!("Week {}", anchor.iso_week().week()),
    }
}

/// The equal-length window immediately preceding `window`.
pub fn previous_window(window: &PeriodWindow) -> PeriodWindow {
    let length = window.end - window.start;
    let end = window.start - Duration::days(1);
    let start = end - length;
    PeriodWindow {
        start,
        end,
        label: format!("Week {}", start.iso_week().week()),
    }
}

/// Inclusive day-range membership; a missing timestamp is never in-window.
pub fn in_window(ts: Option<NaiveDateTime>, window: &PeriodWindow) -> bool {
    match ts {
        Some(t) => t.date() >= window.start && t.date() <= window.end,
        None => false,
    }
}

pub fn is_open(status: &str) -> bool {
    let lowered = status.to_lowercase();
    !CLOSED_STATUS_MARKERS.iter().any(|m| lowered.contains(m))
}

fn resolution_minutes(ticket: &TicketRecord) -> f64 {
    match (ticket.created_at, ticket.closed_at) {
        (Some(created), Some(closed)) => {
            ((closed - created).num_seconds() as f64 / 60.0).max(0.0)
        }
        _ => 0.0,
    }
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let collected: Vec<f64> = values.collect();
    if collected.is_empty() {
        0.0
    } else {
        collected.iter().sum::<f64>() / collected.len() as f64
    }
}

/// Reduces the record collections to one KPI snapshot for the window.
/// Counts filter on `created_at` ("new") or `closed_at` ("closed"); rates
/// are 0 over empty sets, never NaN. Backlog is evaluated against current
/// status over all development tickets, not window-filtered.
pub fn aggregate(
    chats: &[ChatRecord],
    assistance: &[TicketRecord],
    development: &[TicketRecord],
    window: &PeriodWindow,
) -> KpiSnapshot {
    let chats_in: Vec<&ChatRecord> = chats
        .iter()
        .filter(|c| in_window(c.created_at, window))
        .collect();
    let chat_wait_seconds = average(chats_in.iter().map(|c| c.wait_seconds));
    let chat_rating = average(chats_in.iter().filter_map(|c| c.rating));

    let assistance_new = assistance
        .iter()
        .filter(|t| in_window(t.created_at, window))
        .count() as f64;
    let assistance_closed: Vec<&TicketRecord> = assistance
        .iter()
        .filter(|t| in_window(t.closed_at, window))
        .collect();
    let assistance_resolution_minutes =
        average(assistance_closed.iter().map(|t| resolution_minutes(t)));

    let development_new = development
        .iter()
        .filter(|t| in_window(t.created_at, window))
        .count() as f64;
    let development_closed: Vec<&TicketRecord> = development
        .iter()
        .filter(|t| in_window(t.closed_at, window))
        .collect();
    let development_resolution_minutes =
        average(development_closed.iter().map(|t| resolution_minutes(t)));

    let backlog = development.iter().filter(|t| is_open(&t.status)).count() as f64;

    KpiSnapshot {
        chat_volume: chats_in.len() as f64,
        chat_wait_seconds,
        chat_rating,
        assistance_new,
        assistance_closed: assistance_closed.len() as f64,
        assistance_resolution_minutes,
        development_new,
        development_closed: development_closed.len() as f64,
        development_resolution_minutes,
        backlog,
    }
}

/// Day-by-day open-ticket approximation reconstructed from creation and
/// closure timestamps, for the report's backlog breakdown.
pub fn backlog_series(
    development: &[TicketRecord],
    window: &PeriodWindow,
) -> Vec<(NaiveDate, i64)> {
    let mut series = Vec::new();
    let mut day = window.start;
    while day <= window.end {
        let open = development
            .iter()
            .filter(|t| {
                let created = match t.created_at {
                    Some(ts) => ts.date() <= day,
                    None => false,
                };
                let still_open = match t.closed_at {
                    Some(ts) => ts.date() > day,
                    None => true,
                };
                created && still_open
            })
            .count() as i64;
        series.push((day, open));
        day += Duration::days(1);
    }
    series
}

/// Metric-by-metric movement between two snapshots, in display order.
pub fn trends(current: &KpiSnapshot, previous: &KpiSnapshot) -> Vec<(&'static str, Trend)> {
    current
        .metrics()
        .into_iter()
        .zip(previous.metrics())
        .map(|((name, value, invert), (_, prior, _))| {
            (name, Trend::between(value, prior, invert))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Department, Direction};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at_noon(day: NaiveDate) -> NaiveDateTime {
        day.and_hms_opt(12, 0, 0).unwrap()
    }

    fn ticket(
        id: &str,
        status: &str,
        created: Option<NaiveDateTime>,
        closed: Option<NaiveDateTime>,
    ) -> TicketRecord {
        TicketRecord {
            id: id.to_string(),
            department: Department::Development,
            category: "General".to_string(),
            status: status.to_string(),
            created_at: created,
            closed_at: closed,
        }
    }

    fn single_day(day: NaiveDate) -> PeriodWindow {
        PeriodWindow {
            start: day,
            end: day,
            label: "test".to_string(),
        }
    }

    #[test]
    fn week_windows_are_monday_to_sunday() {
        let window = week_window(date(2024, 2, 14));
        assert_eq!(window.start, date(2024, 2, 12));
        assert_eq!(window.end, date(2024, 2, 18));
        assert_eq!(window.label, "Week 7");
    }

    #[test]
    fn previous_window_is_adjacent_and_equal_length() {
        let current = week_window(date(2024, 2, 14));
        let previous = previous_window(&current);
        assert_eq!(previous.end, current.start - Duration::days(1));
        assert_eq!(previous.end - previous.start, current.end - current.start);
    }

    #[test]
    fn empty_aggregate_is_all_zeros() {
        let window = single_day(date(2024, 2, 12));
        let snapshot = aggregate(&[], &[], &[], &window);
        for (_, value, _) in snapshot.metrics() {
            assert_eq!(value, 0.0);
        }
    }

    #[test]
    fn created_and_closed_counts_follow_their_own_timestamps() {
        let d1 = date(2024, 2, 12);
        let tickets = vec![
            ticket("T-1", "Open", Some(at_noon(d1)), None),
            ticket(
                "T-2",
                "Closed",
                Some(at_noon(d1)),
                Some(at_noon(d1 + Duration::days(3))),
            ),
        ];

        let on_creation_day = aggregate(&[], &tickets, &[], &single_day(d1));
        assert_eq!(on_creation_day.assistance_new, 2.0);
        assert_eq!(on_creation_day.assistance_closed, 0.0);

        let on_closing_day =
            aggregate(&[], &tickets, &[], &single_day(d1 + Duration::days(3)));
        assert_eq!(on_closing_day.assistance_new, 0.0);
        assert_eq!(on_closing_day.assistance_closed, 1.0);
        assert_eq!(on_closing_day.assistance_resolution_minutes, 3.0 * 24.0 * 60.0);
    }

    #[test]
    fn backlog_counts_open_statuses_across_locales() {
        let day = date(2024, 2, 12);
        let tickets = vec![
            ticket("T-1", "Open", Some(at_noon(day)), None),
            ticket("T-2", "On Hold", Some(at_noon(day)), None),
            ticket("T-3", "Chiuso", Some(at_noon(day)), Some(at_noon(day))),
            ticket("T-4", "Closed", Some(at_noon(day)), Some(at_noon(day))),
            ticket("T-5", "Risolto", Some(at_noon(day)), Some(at_noon(day))),
        ];
        // Out-of-window day: backlog still counts every currently open ticket.
        let snapshot = aggregate(&[], &[], &tickets, &single_day(date(2025, 1, 1)));
        assert_eq!(snapshot.backlog, 2.0);
    }

    #[test]
    fn chat_rates_ignore_unrated_sessions() {
        let day = date(2024, 2, 12);
        let chats = vec![
            ChatRecord {
                id: "C-1".to_string(),
                operator: "Martina".to_string(),
                created_at: Some(at_noon(day)),
                closed_at: None,
                wait_seconds: 30.0,
                rating: Some(5.0),
            },
            ChatRecord {
                id: "C-2".to_string(),
                operator: "Luca".to_string(),
                created_at: Some(at_noon(day)),
                closed_at: None,
                wait_seconds: 90.0,
                rating: None,
            },
        ];
        let snapshot = aggregate(&chats, &[], &[], &single_day(day));
        assert_eq!(snapshot.chat_volume, 2.0);
        assert_eq!(snapshot.chat_wait_seconds, 60.0);
        assert_eq!(snapshot.chat_rating, 5.0);
    }

    #[test]
    fn backlog_series_reconstructs_each_day() {
        let d1 = date(2024, 2, 12);
        let tickets = vec![
            ticket("T-1", "Open", Some(at_noon(d1)), None),
            ticket(
                "T-2",
                "Closed",
                Some(at_noon(d1)),
                Some(at_noon(d1 + Duration::days(1))),
            ),
        ];
        let window = PeriodWindow {
            start: d1,
            end: d1 + Duration::days(2),
            label: "test".to_string(),
        };
        let series = backlog_series(&tickets, &window);
        assert_eq!(series, vec![(d1, 2), (d1 + Duration::days(1), 1), (d1 + Duration::days(2), 1)]);
    }

    #[test]
    fn zero_delta_is_flat_and_invert_flips_direction() {
        assert_eq!(Trend::between(5.0, 5.0, true).direction, Direction::Flat);
        assert_eq!(
            Trend::between(4.0, 6.0, true).direction,
            Direction::Improved
        );
        assert_eq!(
            Trend::between(4.0, 6.0, false).direction,
            Direction::Worsened
        );
        assert_eq!(
            Trend::between(6.0, 4.0, false).direction,
            Direction::Improved
        );
    }
}
