use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::classify::Topic;
use crate::models::{
    ChatRecord, Dataset, Department, TicketDayRecord, TicketRecord, TrainingRecord,
};

/// Rows fetched per page when reading a record collection back.
pub const FETCH_PAGE_SIZE: i64 = 1000;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let monday = NaiveDate::from_ymd_opt(2026, 2, 2).context("invalid date")?;

    let chats = vec![
        ChatRecord {
            id: "seed-chat-001".to_string(),
            operator: "Martina".to_string(),
            created_at: monday.and_hms_opt(9, 12, 0),
            closed_at: monday.and_hms_opt(9, 31, 0),
            wait_seconds: 38.0,
            rating: Some(5.0),
        },
        ChatRecord {
            id: "seed-chat-002".to_string(),
            operator: "Luca".to_string(),
            created_at: monday.and_hms_opt(10, 5, 0),
            closed_at: None,
            wait_seconds: 95.0,
            rating: None,
        },
    ];
    upsert_chats(pool, &chats).await?;

    let tickets = vec![
        TicketRecord {
            id: "seed-ticket-101".to_string(),
            department: Department::Assistance,
            category: "Booking".to_string(),
            status: "Closed".to_string(),
            created_at: monday.and_hms_opt(8, 30, 0),
            closed_at: monday.and_hms_opt(11, 0, 0),
        },
        TicketRecord {
            id: "seed-ticket-201".to_string(),
            department: Department::Development,
            category: "Crash".to_string(),
            status: "Open".to_string(),
            created_at: monday.and_hms_opt(9, 0, 0),
            closed_at: None,
        },
    ];
    upsert_tickets(pool, &tickets).await?;

    let days = vec![TicketDayRecord {
        department: Department::Assistance,
        date: monday,
        new_tickets: 6,
        closed_tickets: 4,
        backlog: 9,
        first_response_minutes: 15.0,
        resolution_minutes: 110.0,
    }];
    upsert_ticket_days(pool, &days).await?;

    // Fixed ids keep the seed idempotent even though trainings are
    // append-only in normal operation.
    let training_id = Uuid::parse_str("6f2a9a51-8c3e-4f0b-9a68-d11c5b6f3a27")?;
    sqlx::query(
        r#"
        INSERT INTO desk_kpi.trainings
        (id, operator, topic, company, duration_minutes, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(training_id)
    .bind("Sofia")
    .bind(Topic::Booking.as_str())
    .bind("Trattoria Da Mario")
    .bind(90.0_f64)
    .bind(monday.and_hms_opt(15, 0, 0))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn upsert_chats(pool: &PgPool, rows: &[ChatRecord]) -> anyhow::Result<u64> {
    let mut written = 0u64;
    for chat in rows {
        let result = sqlx::query(
            r#"
            INSERT INTO desk_kpi.chats
            (id, operator, created_at, closed_at, wait_seconds, rating)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
            SET operator = EXCLUDED.operator,
                created_at = EXCLUDED.created_at,
                closed_at = EXCLUDED.closed_at,
                wait_seconds = EXCLUDED.wait_seconds,
                rating = EXCLUDED.rating
            "#,
        )
        .bind(&chat.id)
        .bind(&chat.operator)
        .bind(chat.created_at)
        .bind(chat.closed_at)
        .bind(chat.wait_seconds)
        .bind(chat.rating)
        .execute(pool)
        .await?;
        written += result.rows_affected();
    }
    info!(count = written, "chats upserted");
    Ok(written)
}

pub async fn upsert_tickets(pool: &PgPool, rows: &[TicketRecord]) -> anyhow::Result<u64> {
    let mut written = 0u64;
    for ticket in rows {
        let result = sqlx::query(
            r#"
            INSERT INTO desk_kpi.tickets
            (id, department, category, status, created_at, closed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
            SET department = EXCLUDED.department,
                category = EXCLUDED.category,
                status = EXCLUDED.status,
                created_at = EXCLUDED.created_at,
                closed_at = EXCLUDED.closed_at
            "#,
        )
        .bind(&ticket.id)
        .bind(ticket.department.as_str())
        .bind(&ticket.category)
        .bind(&ticket.status)
        .bind(ticket.created_at)
        .bind(ticket.closed_at)
        .execute(pool)
        .await?;
        written += result.rows_affected();
    }
    info!(count = written, "tickets upserted");
    Ok(written)
}

pub async fn upsert_ticket_days(pool: &PgPool, rows: &[TicketDayRecord]) -> anyhow::Result<u64> {
    let mut written = 0u64;
    for day in rows {
        let result = sqlx::query(
            r#"
            INSERT INTO desk_kpi.ticket_days
            (department, date, new_tickets, closed_tickets, backlog,
             first_response_minutes, resolution_minutes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (department, date) DO UPDATE
            SET new_tickets = EXCLUDED.new_tickets,
                closed_tickets = EXCLUDED.closed_tickets,
                backlog = EXCLUDED.backlog,
                first_response_minutes = EXCLUDED.first_response_minutes,
                resolution_minutes = EXCLUDED.resolution_minutes
            "#,
        )
        .bind(day.department.as_str())
        .bind(day.date)
        .bind(day.new_tickets)
        .bind(day.closed_tickets)
        .bind(day.backlog)
        .bind(day.first_response_minutes)
        .bind(day.resolution_minutes)
        .execute(pool)
        .await?;
        written += result.rows_affected();
    }
    info!(count = written, "ticket days upserted");
    Ok(written)
}

/// Trainings have no natural key; every accepted row is appended with a
/// fresh synthetic id.
pub async fn insert_trainings(pool: &PgPool, rows: &[TrainingRecord]) -> anyhow::Result<u64> {
    let mut written = 0u64;
    for training in rows {
        let result = sqlx::query(
            r#"
            INSERT INTO desk_kpi.trainings
            (id, operator, topic, company, duration_minutes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&training.operator)
        .bind(training.topic.as_str())
        .bind(&training.company)
        .bind(training.duration_minutes)
        .bind(training.created_at)
        .execute(pool)
        .await?;
        written += result.rows_affected();
    }
    info!(count = written, "trainings inserted");
    Ok(written)
}

pub async fn fetch_chats(pool: &PgPool) -> anyhow::Result<Vec<ChatRecord>> {
    let mut chats = Vec::new();
    let mut offset: i64 = 0;
    loop {
        let rows = sqlx::query(
            "SELECT id, operator, created_at, closed_at, wait_seconds, rating \
             FROM desk_kpi.chats ORDER BY id LIMIT $1 OFFSET $2",
        )
        .bind(FETCH_PAGE_SIZE)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        let fetched = rows.len();

        for row in rows {
            chats.push(ChatRecord {
                id: row.get("id"),
                operator: row.get("operator"),
                created_at: row.get::<Option<NaiveDateTime>, _>("created_at"),
                closed_at: row.get::<Option<NaiveDateTime>, _>("closed_at"),
                wait_seconds: row.get("wait_seconds"),
                rating: row.get::<Option<f64>, _>("rating"),
            });
        }

        if (fetched as i64) < FETCH_PAGE_SIZE {
            break;
        }
        offset += fetched as i64;
    }
    Ok(chats)
}

pub async fn fetch_tickets(
    pool: &PgPool,
    department: Department,
) -> anyhow::Result<Vec<TicketRecord>> {
    let mut tickets = Vec::new();
    let mut offset: i64 = 0;
    loop {
        let rows = sqlx::query(
            "SELECT id, department, category, status, created_at, closed_at \
             FROM desk_kpi.tickets WHERE department = $1 \
             ORDER BY id LIMIT $2 OFFSET $3",
        )
        .bind(department.as_str())
        .bind(FETCH_PAGE_SIZE)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        let fetched = rows.len();

        for row in rows {
            tickets.push(TicketRecord {
                id: row.get("id"),
                department: Department::from_label(&row.get::<String, _>("department")),
                category: row.get("category"),
                status: row.get("status"),
                created_at: row.get::<Option<NaiveDateTime>, _>("created_at"),
                closed_at: row.get::<Option<NaiveDateTime>, _>("closed_at"),
            });
        }

        if (fetched as i64) < FETCH_PAGE_SIZE {
            break;
        }
        offset += fetched as i64;
    }
    Ok(tickets)
}

pub async fn fetch_trainings(pool: &PgPool) -> anyhow::Result<Vec<TrainingRecord>> {
    let mut trainings = Vec::new();
    let mut offset: i64 = 0;
    loop {
        let rows = sqlx::query(
            "SELECT operator, topic, company, duration_minutes, created_at \
             FROM desk_kpi.trainings ORDER BY created_at, id LIMIT $1 OFFSET $2",
        )
        .bind(FETCH_PAGE_SIZE)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        let fetched = rows.len();

        for row in rows {
            trainings.push(TrainingRecord {
                operator: row.get("operator"),
                topic: Topic::from_label(row.get("topic")),
                company: row.get("company"),
                duration_minutes: row.get("duration_minutes"),
                created_at: row.get("created_at"),
            });
        }

        if (fetched as i64) < FETCH_PAGE_SIZE {
            break;
        }
        offset += fetched as i64;
    }
    Ok(trainings)
}

/// Fetches every record collection a reporting session needs. The four
/// reads run concurrently; any failure aborts the joint fetch.
pub async fn fetch_all(pool: &PgPool) -> anyhow::Result<Dataset> {
    let (chats, assistance, development, trainings) = tokio::try_join!(
        fetch_chats(pool),
        fetch_tickets(pool, Department::Assistance),
        fetch_tickets(pool, Department::Development),
        fetch_trainings(pool),
    )?;
    Ok(Dataset {
        chats,
        assistance,
        development,
        trainings,
    })
}
