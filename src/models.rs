use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Ticket department a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Department {
    Assistance,
    Development,
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Assistance => "assistance",
            Department::Development => "development",
        }
    }

    /// Reverse of `as_str`, for values read back from the store.
    pub fn from_label(label: &str) -> Department {
        if label == "development" {
            Department::Development
        } else {
            Department::Assistance
        }
    }
}

/// One chat session, keyed by the export's chat id.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRecord {
    pub id: String,
    pub operator: String,
    pub created_at: Option<NaiveDateTime>,
    pub closed_at: Option<NaiveDateTime>,
    pub wait_seconds: f64,
    pub rating: Option<f64>,
}

/// Raw ticket snapshot as held by the remote store, keyed by ticket id.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketRecord {
    pub id: String,
    pub department: Department,
    pub category: String,
    pub status: String,
    pub created_at: Option<NaiveDateTime>,
    pub closed_at: Option<NaiveDateTime>,
}

/// Daily ticket rollup, keyed by (department, date).
#[derive(Debug, Clone, PartialEq)]
pub struct TicketDayRecord {
    pub department: Department,
    pub date: NaiveDate,
    pub new_tickets: i64,
    pub closed_tickets: i64,
    pub backlog: i64,
    pub first_response_minutes: f64,
    pub resolution_minutes: f64,
}

/// One delivered training session. Append-only, no natural key.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRecord {
    pub operator: String,
    pub topic: crate::classify::Topic,
    pub company: String,
    pub duration_minutes: f64,
    pub created_at: NaiveDateTime,
}

/// Inclusive day range metrics are computed over.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub label: String,
}

/// Per-window metric values. Rates are 0 when the underlying set is empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KpiSnapshot {
    pub chat_volume: f64,
    pub chat_wait_seconds: f64,
    pub chat_rating: f64,
    pub assistance_new: f64,
    pub assistance_closed: f64,
    pub assistance_resolution_minutes: f64,
    pub development_new: f64,
    pub development_closed: f64,
    pub development_resolution_minutes: f64,
    pub backlog: f64,
}

impl KpiSnapshot {
    /// Metric name, value, and whether lower is better.
    pub fn metrics(&self) -> Vec<(&'static str, f64, bool)> {
        vec![
            ("Chats handled", self.chat_volume, false),
            ("Average wait (s)", self.chat_wait_seconds, true),
            ("Chat rating", self.chat_rating, false),
            ("Assistance new", self.assistance_new, false),
            ("Assistance closed", self.assistance_closed, false),
            (
                "Assistance resolution (min)",
                self.assistance_resolution_minutes,
                true,
            ),
            ("Development new", self.development_new, false),
            ("Development closed", self.development_closed, false),
            (
                "Development resolution (min)",
                self.development_resolution_minutes,
                true,
            ),
            ("Open backlog", self.backlog, true),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Improved,
    Worsened,
    Flat,
}

/// Period-over-period movement of a single metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Trend {
    pub current: f64,
    pub previous: f64,
    pub delta: f64,
    pub direction: Direction,
}

impl Trend {
    pub fn between(current: f64, previous: f64, invert: bool) -> Self {
        let delta = current - previous;
        let direction = if delta == 0.0 {
            Direction::Flat
        } else if (invert && delta < 0.0) || (!invert && delta > 0.0) {
            Direction::Improved
        } else {
            Direction::Worsened
        };
        Trend {
            current,
            previous,
            delta,
            direction,
        }
    }
}

/// One leaderboard row. `avg` carries the secondary average where one
/// applies (mean rating for operators).
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    pub key: String,
    pub count: i64,
    pub avg: Option<f64>,
}

/// All record collections a reporting session works from.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub chats: Vec<ChatRecord>,
    pub assistance: Vec<TicketRecord>,
    pub development: Vec<TicketRecord>,
    pub trainings: Vec<TrainingRecord>,
}
