use std::collections::HashMap;

use crate::grid::{Cell, RawGrid};

/// Rows scanned from the top of a grid when looking for the header.
pub const HEADER_SCAN_ROWS: usize = 30;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("header row not found in the first {HEADER_SCAN_ROWS} rows (expected keywords: {keywords:?})")]
    HeaderNotFound { keywords: Vec<String> },
}

/// Logical fields recognized across all export kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    Operator,
    Created,
    Closed,
    Wait,
    Rating,
    Date,
    NewCount,
    ClosedCount,
    Backlog,
    Response,
    Resolution,
    Duration,
    Company,
    Note,
}

/// Declarative description of one export layout: the keywords that
/// identify its header row, and per-field column-name synonyms (English
/// and Italian variants, matched as case-insensitive substrings).
pub struct TableSchema {
    pub required_keywords: &'static [&'static str],
    pub fields: &'static [(Field, &'static [&'static str])],
}

pub const CHAT_SCHEMA: TableSchema = TableSchema {
    required_keywords: &["chat", "operator"],
    fields: &[
        (Field::Id, &["chat id", "session id", "id"]),
        (Field::Operator, &["operator", "name", "agente"]),
        (Field::Created, &["created", "start", "inizio", "data"]),
        (Field::Closed, &["closed", "end", "chius", "fine"]),
        (Field::Wait, &["wait", "attesa", "response", "risposta"]),
        (Field::Rating, &["rating", "valutazione", "voto"]),
    ],
};

pub const TICKET_DAY_SCHEMA: TableSchema = TableSchema {
    required_keywords: &["ticket"],
    fields: &[
        (Field::Date, &["data", "date"]),
        (Field::NewCount, &["nuovo", "nuovi", "new"]),
        (Field::ClosedCount, &["chiusi", "closed", "clos"]),
        (Field::Backlog, &["backlog", "arretrato"]),
        (Field::Response, &["risposta", "response"]),
        (Field::Resolution, &["risoluzione", "resolution"]),
    ],
};

pub const TRAINING_SCHEMA: TableSchema = TableSchema {
    required_keywords: &["durata"],
    fields: &[
        (Field::Operator, &["creato", "operator", "operatore"]),
        (Field::Duration, &["durata", "duration"]),
        (Field::Date, &["ora", "data", "date"]),
        (Field::Company, &["azienda", "company", "cliente"]),
        (Field::Note, &["nota", "note", "descrizione", "argomento"]),
    ],
};

/// Finds the header row: the first of the scanned prefix whose
/// concatenated text contains every required keyword.
pub fn locate_header(grid: &RawGrid, required_keywords: &[&str]) -> Result<usize, IngestError> {
    let limit = grid.len().min(HEADER_SCAN_ROWS);
    for (index, row) in grid.iter().take(limit).enumerate() {
        let text = row
            .iter()
            .map(Cell::as_text)
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        if required_keywords
            .iter()
            .all(|k| text.contains(&k.to_lowercase()))
        {
            return Ok(index);
        }
    }
    Err(IngestError::HeaderNotFound {
        keywords: required_keywords.iter().map(|k| k.to_string()).collect(),
    })
}

/// Resolved column positions for one header row. Fields with no matching
/// header cell are absent; callers apply per-field defaults.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    columns: HashMap<Field, usize>,
}

impl ColumnMap {
    pub fn get(&self, field: Field) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    /// The cell for a field, if the column resolved and the row reaches it.
    pub fn cell<'a>(&self, row: &'a [Cell], field: Field) -> Option<&'a Cell> {
        self.get(field).and_then(|index| row.get(index))
    }
}

/// Maps each logical field to the first header cell containing any of its
/// synonyms.
pub fn resolve_columns(header_row: &[Cell], schema: &TableSchema) -> ColumnMap {
    let lowered: Vec<String> = header_row
        .iter()
        .map(|c| c.as_text().to_lowercase())
        .collect();

    let mut columns = HashMap::new();
    for (field, synonyms) in schema.fields {
        let position = lowered
            .iter()
            .position(|cell| synonyms.iter().any(|s| cell.contains(s)));
        if let Some(index) = position {
            columns.insert(*field, index);
        }
    }
    ColumnMap { columns }
}
