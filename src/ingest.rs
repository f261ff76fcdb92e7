use tracing::warn;

use crate::classify::ClassifierRules;
use crate::grid::{Cell, RawGrid};
use crate::models::{ChatRecord, Department, TicketDayRecord, TrainingRecord};
use crate::normalize::{self, OperatorAliases};
use crate::schema::{
    locate_header, resolve_columns, Field, IngestError, CHAT_SCHEMA, TICKET_DAY_SCHEMA,
    TRAINING_SCHEMA,
};

/// Export tools sometimes append aggregate rows; any identity cell whose
/// text contains one of these is excluded.
const SUMMARY_SENTINELS: &[&str] = &["total", "generated", "admin"];

/// Rows narrower than this cannot carry a usable record.
const MIN_VIABLE_COLUMNS: usize = 2;

/// Fallback minutes used when a rollup export lacks the column entirely.
pub const DEFAULT_FIRST_RESPONSE_MINUTES: f64 = 15.0;
pub const DEFAULT_RESOLUTION_MINUTES: f64 = 120.0;

/// Why rows were dropped from a batch. Rejections never fail the batch;
/// they only lower the output count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RejectionReport {
    pub short_row: usize,
    pub missing_date: usize,
    pub missing_identity: usize,
    pub summary_row: usize,
}

impl RejectionReport {
    pub fn total(&self) -> usize {
        self.short_row + self.missing_date + self.missing_identity + self.summary_row
    }
}

/// Output of one file ingestion: accepted records plus rejection tallies.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    pub rows: Vec<T>,
    pub rejected: RejectionReport,
}

impl<T> Batch<T> {
    pub fn count(&self) -> usize {
        self.rows.len()
    }
}

fn is_summary_row(text: &str) -> bool {
    let lowered = text.to_lowercase();
    SUMMARY_SENTINELS.iter().any(|s| lowered.contains(s))
}

/// Plain values in a wait column are already seconds; colon forms convert
/// through the minutes normalizer.
fn wait_seconds_from_cell(cell: &Cell) -> f64 {
    match cell {
        Cell::Text(s) if s.contains(':') => normalize::duration_minutes_from_str(s) * 60.0,
        other => normalize::duration_minutes_from_cell(other),
    }
}

fn count_from_cell(cell: Option<&Cell>) -> i64 {
    match cell {
        Some(Cell::Number(n)) => (*n).max(0.0) as i64,
        Some(Cell::Text(s)) => s.trim().parse::<f64>().map(|n| n.max(0.0) as i64).unwrap_or(0),
        _ => 0,
    }
}

fn rating_from_cell(cell: Option<&Cell>) -> Option<f64> {
    let value = match cell {
        Some(Cell::Number(n)) => *n,
        Some(Cell::Text(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    (value > 0.0).then_some(value)
}

/// Builds chat records from a chat export grid. Fails only when the header
/// row cannot be located; individual bad rows are counted and skipped.
pub fn build_chat_batch(
    grid: &RawGrid,
    aliases: &OperatorAliases,
) -> Result<Batch<ChatRecord>, IngestError> {
    let header = locate_header(grid, CHAT_SCHEMA.required_keywords)?;
    let columns = resolve_columns(&grid[header], &CHAT_SCHEMA);

    let mut rows = Vec::new();
    let mut rejected = RejectionReport::default();

    for row in grid.iter().skip(header + 1) {
        if row.len() < MIN_VIABLE_COLUMNS {
            rejected.short_row += 1;
            continue;
        }
        let id = columns
            .cell(row, Field::Id)
            .map(|c| c.as_text().trim().to_string())
            .unwrap_or_default();
        if id.is_empty() {
            rejected.missing_identity += 1;
            continue;
        }
        let operator_raw = columns
            .cell(row, Field::Operator)
            .map(|c| c.as_text())
            .unwrap_or_default();
        if is_summary_row(&operator_raw) {
            rejected.summary_row += 1;
            continue;
        }

        rows.push(ChatRecord {
            id,
            operator: aliases.canonical(&operator_raw),
            created_at: columns
                .cell(row, Field::Created)
                .and_then(normalize::timestamp_from_cell),
            closed_at: columns
                .cell(row, Field::Closed)
                .and_then(normalize::timestamp_from_cell),
            wait_seconds: columns
                .cell(row, Field::Wait)
                .map(wait_seconds_from_cell)
                .unwrap_or(0.0),
            rating: rating_from_cell(columns.cell(row, Field::Rating)),
        });
    }

    log_rejections("chat", &rejected);
    Ok(Batch { rows, rejected })
}

/// Builds daily ticket rollups from an export grid. Response/resolution
/// fall back to fixed defaults when the export omits the columns.
pub fn build_ticket_day_batch(
    grid: &RawGrid,
    department: Department,
) -> Result<Batch<TicketDayRecord>, IngestError> {
    let header = locate_header(grid, TICKET_DAY_SCHEMA.required_keywords)?;
    let columns = resolve_columns(&grid[header], &TICKET_DAY_SCHEMA);

    let mut rows = Vec::new();
    let mut rejected = RejectionReport::default();

    for row in grid.iter().skip(header + 1) {
        if row.len() < MIN_VIABLE_COLUMNS {
            rejected.short_row += 1;
            continue;
        }
        let date_cell = columns.cell(row, Field::Date);
        if let Some(cell) = date_cell {
            if is_summary_row(&cell.as_text()) {
                rejected.summary_row += 1;
                continue;
            }
        }
        let date = match date_cell.and_then(normalize::timestamp_from_cell) {
            Some(ts) => ts.date(),
            None => {
                rejected.missing_date += 1;
                continue;
            }
        };

        let first_response_minutes = match columns.cell(row, Field::Response) {
            Some(cell) => normalize::duration_minutes_from_cell(cell),
            None => DEFAULT_FIRST_RESPONSE_MINUTES,
        };
        let resolution_minutes = match columns.cell(row, Field::Resolution) {
            Some(cell) => normalize::duration_minutes_from_cell(cell),
            None => DEFAULT_RESOLUTION_MINUTES,
        };

        rows.push(TicketDayRecord {
            department,
            date,
            new_tickets: count_from_cell(columns.cell(row, Field::NewCount)),
            closed_tickets: count_from_cell(columns.cell(row, Field::ClosedCount)),
            backlog: count_from_cell(columns.cell(row, Field::Backlog)),
            first_response_minutes,
            resolution_minutes,
        });
    }

    log_rejections(department.as_str(), &rejected);
    Ok(Batch { rows, rejected })
}

/// Builds training records from an export grid. The topic is classified
/// from the company and note text through the injected rules.
pub fn build_training_batch(
    grid: &RawGrid,
    aliases: &OperatorAliases,
    rules: &ClassifierRules,
) -> Result<Batch<TrainingRecord>, IngestError> {
    let header = locate_header(grid, TRAINING_SCHEMA.required_keywords)?;
    let columns = resolve_columns(&grid[header], &TRAINING_SCHEMA);

    let mut rows = Vec::new();
    let mut rejected = RejectionReport::default();

    for row in grid.iter().skip(header + 1) {
        if row.len() < MIN_VIABLE_COLUMNS {
            rejected.short_row += 1;
            continue;
        }
        let operator_raw = columns
            .cell(row, Field::Operator)
            .map(|c| c.as_text())
            .unwrap_or_default();
        if operator_raw.trim().is_empty() {
            rejected.missing_identity += 1;
            continue;
        }
        if is_summary_row(&operator_raw) {
            rejected.summary_row += 1;
            continue;
        }
        let created_at = match columns
            .cell(row, Field::Date)
            .and_then(normalize::timestamp_from_cell)
        {
            Some(ts) => ts,
            None => {
                rejected.missing_date += 1;
                continue;
            }
        };

        let company = columns
            .cell(row, Field::Company)
            .map(|c| c.as_text().trim().to_string())
            .unwrap_or_default();
        let note = columns
            .cell(row, Field::Note)
            .map(|c| c.as_text())
            .unwrap_or_default();

        rows.push(TrainingRecord {
            operator: aliases.canonical(&operator_raw),
            topic: rules.classify(&format!("{company} {note}")),
            company,
            duration_minutes: columns
                .cell(row, Field::Duration)
                .map(normalize::duration_minutes_from_cell)
                .unwrap_or(0.0),
            created_at,
        });
    }

    log_rejections("training", &rejected);
    Ok(Batch { rows, rejected })
}

fn log_rejections(kind: &str, rejected: &RejectionReport) {
    if rejected.total() > 0 {
        warn!(
            kind,
            short_row = rejected.short_row,
            missing_date = rejected.missing_date,
            missing_identity = rejected.missing_identity,
            summary_row = rejected.summary_row,
            "rows rejected during ingestion"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn text_row(cells: &[&str]) -> Vec<Cell> {
        cells
            .iter()
            .map(|c| {
                if c.is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(c.to_string())
                }
            })
            .collect()
    }

    fn chat_grid() -> RawGrid {
        vec![
            text_row(&["Weekly chat export"]),
            text_row(&[
                "Chat ID",
                "Operator Name",
                "Created Time",
                "Closed Time",
                "Waiting Time",
                "Rating",
            ]),
            text_row(&[
                "C-001",
                "Martina Ferraro",
                "2024-02-12 09:15:00",
                "2024-02-12 09:40:00",
                "45",
                "5",
            ]),
            text_row(&["C-002", "elena", "2024-02-13 11:00:00", "", "0:30", ""]),
            text_row(&["", "ghost", "2024-02-13 12:00:00", "", "10", ""]),
            text_row(&["C-999", "Total", "", "", "", ""]),
        ]
    }

    #[test]
    fn chat_batch_normalizes_and_rejects() {
        let batch = build_chat_batch(&chat_grid(), &OperatorAliases::default()).unwrap();
        assert_eq!(batch.count(), 2);
        assert_eq!(batch.rejected.missing_identity, 1);
        assert_eq!(batch.rejected.summary_row, 1);

        let first = &batch.rows[0];
        assert_eq!(first.id, "C-001");
        assert_eq!(first.operator, "Martina");
        assert_eq!(first.wait_seconds, 45.0);
        assert_eq!(first.rating, Some(5.0));

        let second = &batch.rows[1];
        assert_eq!(second.operator, "Elena");
        assert_eq!(second.wait_seconds, 30.0);
        assert_eq!(second.rating, None);
        assert_eq!(second.closed_at, None);
    }

    #[test]
    fn rebuilding_the_same_grid_is_deterministic() {
        let aliases = OperatorAliases::default();
        let grid = chat_grid();
        let first = build_chat_batch(&grid, &aliases).unwrap();
        let second = build_chat_batch(&grid, &aliases).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_header_fails_the_whole_batch() {
        let grid = vec![text_row(&["nothing", "relevant"])];
        let err = build_chat_batch(&grid, &OperatorAliases::default()).unwrap_err();
        assert!(matches!(err, IngestError::HeaderNotFound { .. }));
    }

    #[test]
    fn ticket_days_apply_column_defaults() {
        let grid = vec![
            text_row(&["Data", "Nuovi Ticket", "Ticket Chiusi", "Backlog"]),
            text_row(&["2024-02-12", "8", "5", "12"]),
            text_row(&["Total", "130", "120", ""]),
            text_row(&["", "3", "1", "2"]),
        ];
        let batch = build_ticket_day_batch(&grid, Department::Assistance).unwrap();
        assert_eq!(batch.count(), 1);
        assert_eq!(batch.rejected.summary_row, 1);
        assert_eq!(batch.rejected.missing_date, 1);

        let day = &batch.rows[0];
        assert_eq!(day.date, NaiveDate::from_ymd_opt(2024, 2, 12).unwrap());
        assert_eq!(day.new_tickets, 8);
        assert_eq!(day.first_response_minutes, DEFAULT_FIRST_RESPONSE_MINUTES);
        assert_eq!(day.resolution_minutes, DEFAULT_RESOLUTION_MINUTES);
    }

    #[test]
    fn ticket_days_read_explicit_rate_columns() {
        let grid = vec![
            text_row(&[
                "Data",
                "Nuovi Ticket",
                "Ticket Chiusi",
                "Backlog",
                "Prima Risposta",
                "Risoluzione",
            ]),
            text_row(&["2024-02-12", "8", "5", "12", "20 min", "1:30:00"]),
        ];
        let batch = build_ticket_day_batch(&grid, Department::Development).unwrap();
        let day = &batch.rows[0];
        assert_eq!(day.first_response_minutes, 20.0);
        assert_eq!(day.resolution_minutes, 90.0);
    }

    #[test]
    fn training_rows_need_operator_and_date() {
        let grid = vec![
            text_row(&["Creato da", "Azienda", "Durata (min)", "Data e ora", "Nota"]),
            text_row(&[
                "Sofia Grandi",
                "Trattoria Da Mario",
                "90",
                "2024-02-14 15:00:00",
                "formazione prenotazioni e sala",
            ]),
            text_row(&["", "Ristorante Blu", "60", "2024-02-15 10:00:00", "x"]),
            text_row(&["Karim E", "Osteria Verde", "45", "", "fatturazione"]),
        ];
        let batch =
            build_training_batch(&grid, &OperatorAliases::default(), &ClassifierRules::default())
                .unwrap();
        assert_eq!(batch.count(), 1);
        assert_eq!(batch.rejected.missing_identity, 1);
        assert_eq!(batch.rejected.missing_date, 1);

        let session = &batch.rows[0];
        assert_eq!(session.operator, "Sofia");
        assert_eq!(session.duration_minutes, 90.0);
        assert_eq!(session.topic, crate::classify::Topic::Booking);
    }

    #[test]
    fn short_rows_are_counted() {
        let mut grid = chat_grid();
        grid.push(vec![Cell::Text("stub".to_string())]);
        let batch = build_chat_batch(&grid, &OperatorAliases::default()).unwrap();
        assert_eq!(batch.rejected.short_row, 1);
    }
}
