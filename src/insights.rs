use std::collections::HashMap;

use crate::kpi::{in_window, is_open};
use crate::models::{ChatRecord, PeriodWindow, RankedEntry, TicketRecord};

/// Groups records by a dimension and ranks groups by count, descending.
/// Equal counts keep first-encountered order (stable sort); pass
/// `usize::MAX` for the unranked full list.
pub fn top_by<T>(
    records: &[T],
    key_fn: impl Fn(&T) -> String,
    limit: usize,
) -> Vec<RankedEntry> {
    let mut entries: Vec<RankedEntry> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for record in records {
        let key = key_fn(record);
        let index = *positions.entry(key.clone()).or_insert_with(|| {
            entries.push(RankedEntry {
                key,
                count: 0,
                avg: None,
            });
            entries.len() - 1
        });
        entries[index].count += 1;
    }

    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries.truncate(limit);
    entries
}

/// Chat leaderboard for the window: volume per operator, with the mean
/// rating over rated sessions as the secondary value.
pub fn top_operators(
    chats: &[ChatRecord],
    window: &PeriodWindow,
    limit: usize,
) -> Vec<RankedEntry> {
    let in_range: Vec<&ChatRecord> = chats
        .iter()
        .filter(|c| in_window(c.created_at, window))
        .collect();

    let mut entries: Vec<(RankedEntry, f64, i64)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for chat in in_range {
        let index = *positions.entry(chat.operator.clone()).or_insert_with(|| {
            entries.push((
                RankedEntry {
                    key: chat.operator.clone(),
                    count: 0,
                    avg: None,
                },
                0.0,
                0,
            ));
            entries.len() - 1
        });
        let (entry, rating_sum, rated) = &mut entries[index];
        entry.count += 1;
        if let Some(rating) = chat.rating {
            *rating_sum += rating;
            *rated += 1;
        }
    }

    let mut ranked: Vec<RankedEntry> = entries
        .into_iter()
        .map(|(mut entry, rating_sum, rated)| {
            if rated > 0 {
                entry.avg = Some(rating_sum / rated as f64);
            }
            entry
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}

fn category_or_default(category: &str) -> String {
    let trimmed = category.trim();
    if trimmed.is_empty() {
        "General".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Most frequent categories among tickets created in the window.
pub fn top_categories(
    tickets: &[TicketRecord],
    window: &PeriodWindow,
    limit: usize,
) -> Vec<RankedEntry> {
    let in_range: Vec<TicketRecord> = tickets
        .iter()
        .filter(|t| in_window(t.created_at, window))
        .cloned()
        .collect();
    top_by(&in_range, |t| category_or_default(&t.category), limit)
}

/// Category distribution of the currently open backlog.
pub fn open_categories(tickets: &[TicketRecord], limit: usize) -> Vec<RankedEntry> {
    let open: Vec<TicketRecord> = tickets
        .iter()
        .filter(|t| is_open(&t.status))
        .cloned()
        .collect();
    top_by(&open, |t| category_or_default(&t.category), limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Department;
    use chrono::NaiveDate;

    #[test]
    fn ties_keep_first_encountered_order() {
        let keys = ["A", "A", "B", "B", "C"];
        let ranked = top_by(&keys, |k| k.to_string(), 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].key, "A");
        assert_eq!(ranked[0].count, 2);
        assert_eq!(ranked[1].key, "B");
        assert_eq!(ranked[1].count, 2);
    }

    #[test]
    fn full_list_is_available_without_limit() {
        let keys = ["A", "B", "B"];
        let ranked = top_by(&keys, |k| k.to_string(), usize::MAX);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].key, "B");
    }

    fn chat(operator: &str, day: NaiveDate, rating: Option<f64>) -> ChatRecord {
        ChatRecord {
            id: format!("{}-{}", operator, rating.map(|r| r as i64).unwrap_or(0)),
            operator: operator.to_string(),
            created_at: day.and_hms_opt(10, 0, 0),
            closed_at: None,
            wait_seconds: 0.0,
            rating,
        }
    }

    #[test]
    fn operator_leaderboard_averages_rated_sessions_only() {
        let day = NaiveDate::from_ymd_opt(2024, 2, 12).unwrap();
        let window = PeriodWindow {
            start: day,
            end: day,
            label: "test".to_string(),
        };
        let chats = vec![
            chat("Martina", day, Some(5.0)),
            chat("Martina", day, None),
            chat("Luca", day, Some(4.0)),
        ];
        let ranked = top_operators(&chats, &window, 4);
        assert_eq!(ranked[0].key, "Martina");
        assert_eq!(ranked[0].count, 2);
        assert_eq!(ranked[0].avg, Some(5.0));
        assert_eq!(ranked[1].avg, Some(4.0));
    }

    #[test]
    fn blank_categories_group_under_general() {
        let day = NaiveDate::from_ymd_opt(2024, 2, 12).unwrap();
        let window = PeriodWindow {
            start: day,
            end: day,
            label: "test".to_string(),
        };
        let tickets = vec![TicketRecord {
            id: "T-1".to_string(),
            department: Department::Assistance,
            category: "  ".to_string(),
            status: "Open".to_string(),
            created_at: day.and_hms_opt(9, 0, 0),
            closed_at: None,
        }];
        let ranked = top_categories(&tickets, &window, 4);
        assert_eq!(ranked[0].key, "General");
    }

    #[test]
    fn open_categories_skip_closed_tickets() {
        let day = NaiveDate::from_ymd_opt(2024, 2, 12).unwrap();
        let mut open = TicketRecord {
            id: "T-1".to_string(),
            department: Department::Development,
            category: "Crash".to_string(),
            status: "Open".to_string(),
            created_at: day.and_hms_opt(9, 0, 0),
            closed_at: None,
        };
        let mut closed = open.clone();
        closed.id = "T-2".to_string();
        closed.status = "Chiuso".to_string();
        open.id = "T-3".to_string();

        let ranked = open_categories(&[open, closed], 4);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].count, 1);
    }
}
