use anyhow::Context;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use crate::ingest::{DEFAULT_FIRST_RESPONSE_MINUTES, DEFAULT_RESOLUTION_MINUTES};
use crate::kpi::is_open;
use crate::models::{Department, TicketDayRecord, TicketRecord};
use crate::normalize;

/// Ticketing-API page cap; pages are requested sequentially until a short
/// page signals exhaustion.
const TICKET_PAGE_SIZE: usize = 100;

/// Connection settings for the remote ticketing system and the resync
/// webhook. Treated as opaque plumbing: credentials come from the
/// environment, the OAuth exchange is a prerequisite, nothing more.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub accounts_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub org_id: String,
    pub dept_assistance: String,
    pub dept_development: String,
}

impl RemoteConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let var = |name: &str| {
            std::env::var(name).with_context(|| format!("{name} must be set for remote sync"))
        };
        Ok(RemoteConfig {
            base_url: var("DESK_BASE_URL")?,
            accounts_url: var("DESK_ACCOUNTS_URL")?,
            client_id: var("DESK_CLIENT_ID")?,
            client_secret: var("DESK_CLIENT_SECRET")?,
            refresh_token: var("DESK_REFRESH_TOKEN")?,
            org_id: var("DESK_ORG_ID")?,
            dept_assistance: var("DESK_DEPT_ASSISTANCE")?,
            dept_development: var("DESK_DEPT_DEVELOPMENT")?,
        })
    }

    fn department_id(&self, department: Department) -> &str {
        match department {
            Department::Assistance => &self.dept_assistance,
            Department::Development => &self.dept_development,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Exchanges the refresh token for a short-lived access token. A missing
/// token in the response is a hard failure; there is no retry.
pub async fn refresh_access_token(client: &Client, cfg: &RemoteConfig) -> anyhow::Result<String> {
    let url = format!(
        "{}/oauth/v2/token?refresh_token={}&client_id={}&client_secret={}&grant_type=refresh_token",
        cfg.accounts_url, cfg.refresh_token, cfg.client_id, cfg.client_secret
    );
    let response: TokenResponse = client
        .post(&url)
        .send()
        .await
        .context("token refresh request failed")?
        .json()
        .await
        .context("token refresh returned malformed JSON")?;
    response
        .access_token
        .context("ticketing credentials were rejected")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TicketPayload {
    #[serde(default)]
    id: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    created_time: Option<String>,
    #[serde(default)]
    closed_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TicketPage {
    #[serde(default)]
    data: Vec<TicketPayload>,
}

fn ticket_from_payload(payload: TicketPayload, department: Department) -> TicketRecord {
    TicketRecord {
        id: payload.id,
        department,
        category: payload.category.unwrap_or_default(),
        status: payload.status.unwrap_or_default(),
        created_at: payload
            .created_time
            .as_deref()
            .and_then(normalize::timestamp_from_str),
        closed_at: payload
            .closed_time
            .as_deref()
            .and_then(normalize::timestamp_from_str),
    }
}

/// Pulls every ticket of one department, page by page in strict order so
/// the concatenation is stable.
pub async fn fetch_department_tickets(
    client: &Client,
    cfg: &RemoteConfig,
    access_token: &str,
    department: Department,
) -> anyhow::Result<Vec<TicketRecord>> {
    let mut tickets = Vec::new();
    let mut from = 0usize;
    loop {
        let url = format!(
            "{}/api/v1/tickets?departmentId={}&from={}&limit={}&sortBy=createdTime",
            cfg.base_url,
            cfg.department_id(department),
            from,
            TICKET_PAGE_SIZE
        );
        let page: TicketPage = client
            .get(&url)
            .header("Authorization", format!("Zoho-oauthtoken {access_token}"))
            .header("orgId", &cfg.org_id)
            .send()
            .await
            .with_context(|| format!("{} ticket page fetch failed", department.as_str()))?
            .json()
            .await
            .with_context(|| format!("{} ticket page was malformed", department.as_str()))?;

        let fetched = page.data.len();
        tickets.extend(
            page.data
                .into_iter()
                .map(|p| ticket_from_payload(p, department)),
        );
        info!(
            department = department.as_str(),
            from, fetched, "ticket page fetched"
        );

        if fetched < TICKET_PAGE_SIZE {
            break;
        }
        from += fetched;
    }
    Ok(tickets)
}

/// Fetches both departments; each page loop is sequential, the two
/// departments run concurrently, and either failure aborts the sync.
pub async fn fetch_all_tickets(
    client: &Client,
    cfg: &RemoteConfig,
    access_token: &str,
) -> anyhow::Result<(Vec<TicketRecord>, Vec<TicketRecord>)> {
    tokio::try_join!(
        fetch_department_tickets(client, cfg, access_token, Department::Assistance),
        fetch_department_tickets(client, cfg, access_token, Department::Development),
    )
}

/// Today's rollup derived from a fresh ticket snapshot: creations and
/// closures dated today, plus the currently open backlog.
pub fn daily_rollup(
    tickets: &[TicketRecord],
    department: Department,
    today: NaiveDate,
) -> TicketDayRecord {
    let new_tickets = tickets
        .iter()
        .filter(|t| t.created_at.map(|ts| ts.date()) == Some(today))
        .count() as i64;
    let closed_tickets = tickets
        .iter()
        .filter(|t| t.closed_at.map(|ts| ts.date()) == Some(today))
        .count() as i64;
    let backlog = tickets.iter().filter(|t| is_open(&t.status)).count() as i64;

    TicketDayRecord {
        department,
        date: today,
        new_tickets,
        closed_tickets,
        backlog,
        first_response_minutes: DEFAULT_FIRST_RESPONSE_MINUTES,
        resolution_minutes: DEFAULT_RESOLUTION_MINUTES,
    }
}

/// Asks the external webhook to refresh the remote data. The refresh is
/// asynchronous on the remote side; callers re-poll the store later.
pub async fn trigger_resync(client: &Client, webhook_url: &str) -> anyhow::Result<()> {
    let response = client
        .post(webhook_url)
        .send()
        .await
        .context("resync webhook request failed")?;
    if !response.status().is_success() {
        anyhow::bail!("resync webhook answered {}", response.status());
    }
    info!("resync webhook triggered");
    Ok(())
}
