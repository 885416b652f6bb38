//! SMS record scanning.
//!
//! Two interchangeable strategies behind one `scan` entry point: the
//! provider's DataTables-style JSON endpoint filtered to today's date
//! (preferred), and the rendered HTML results table (fallback). Both
//! normalize into `RawMessage` and share the same row hygiene: partial
//! rows are dropped, aggregate summary rows are skipped, and stale
//! records outside the freshness window are discarded.

use std::sync::LazyLock;

use chrono::{NaiveDateTime, TimeDelta};
use regex::Regex;
use serde_json::Value;

use courier_extract::RawMessage;

use crate::session::UpstreamSession;
use crate::UpstreamError;

const UPSTREAM_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Column layout of the provider's stats table: Date, Range, Number, CLI, SMS.
const COLUMN_TIMESTAMP: usize = 0;
const COLUMN_NUMBER: usize = 2;
const COLUMN_SERVICE: usize = 3;
const COLUMN_BODY: usize = 4;
const REQUIRED_COLUMNS: usize = 5;

static RECORD_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").expect("timestamp pattern")
});
static TABLE_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").expect("table row pattern"));
static TABLE_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<td[^>]*>(.*?)</td>").expect("table cell pattern"));
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("tag strip pattern"));

/// Polls the upstream for the current batch of SMS records.
///
/// The JSON data endpoint is tried first; when the response is not JSON
/// (older panels render only the HTML table) the scanner falls back to
/// parsing the page itself. Session expiry inside either fetch is
/// handled by the session's single transparent re-login.
pub async fn scan(
    session: &mut UpstreamSession,
    now: NaiveDateTime,
) -> Result<Vec<RawMessage>, UpstreamError> {
    let config = session.config().clone();
    let data_url = config.data_url();
    let today = now.format("%Y-%m-%d").to_string();
    let query = [
        ("fdate1", format!("{today} 00:00:00")),
        ("fdate2", format!("{today} 23:59:59")),
    ];
    let body = session.fetch_authenticated(&data_url, &query).await?;

    let rows = match serde_json::from_str::<Value>(&body) {
        Ok(payload) => parse_data_endpoint_rows(&payload, config.scan_row_cap)?,
        Err(_) => {
            tracing::debug!("data endpoint returned non-JSON, parsing HTML table");
            parse_html_table_rows(&body, config.scan_row_cap)?
        }
    };

    let total = rows.len();
    let fresh: Vec<RawMessage> = rows
        .into_iter()
        .filter(|record| is_fresh(&record.timestamp, now, config.freshness_window_secs))
        .collect();
    if fresh.len() < total {
        tracing::debug!(
            stale = total - fresh.len(),
            kept = fresh.len(),
            "dropped stale records outside freshness window"
        );
    }
    Ok(fresh)
}

/// Parses the DataTables-style JSON payload (`aaData` array of row
/// arrays); a bare top-level array is tolerated for older panels.
pub fn parse_data_endpoint_rows(
    payload: &Value,
    row_cap: usize,
) -> Result<Vec<RawMessage>, UpstreamError> {
    let rows = payload
        .get("aaData")
        .and_then(Value::as_array)
        .or_else(|| payload.as_array())
        .ok_or_else(|| {
            UpstreamError::Format("data endpoint payload missing aaData rows".to_string())
        })?;

    let mut records = Vec::new();
    for row in rows.iter().take(row_cap) {
        let Some(cells) = row.as_array() else {
            continue;
        };
        let cells: Vec<String> = cells.iter().map(json_cell_text).collect();
        if let Some(record) = record_from_cells(&cells) {
            records.push(record);
        }
    }
    Ok(records)
}

/// Parses the rendered results table row by row, stopping at the row cap.
pub fn parse_html_table_rows(page: &str, row_cap: usize) -> Result<Vec<RawMessage>, UpstreamError> {
    if !page.to_lowercase().contains("<table") {
        return Err(UpstreamError::Format(
            "no results table on SMS page".to_string(),
        ));
    }
    let mut records = Vec::new();
    for row in TABLE_ROW.captures_iter(page) {
        if records.len() >= row_cap {
            break;
        }
        let row_html = row.get(1).map(|m| m.as_str()).unwrap_or_default();
        let cells: Vec<String> = TABLE_CELL
            .captures_iter(row_html)
            .map(|cell| strip_html(cell.get(1).map(|m| m.as_str()).unwrap_or_default()))
            .collect();
        if let Some(record) = record_from_cells(&cells) {
            records.push(record);
        }
    }
    Ok(records)
}

/// Builds a `RawMessage` when the row has every required field and its
/// first cell is a real timestamp. Aggregate summary rows (first field a
/// comma-joined total) and partial rows return `None` and are skipped,
/// never errored.
fn record_from_cells(cells: &[String]) -> Option<RawMessage> {
    if cells.len() < REQUIRED_COLUMNS {
        return None;
    }
    let timestamp = cells[COLUMN_TIMESTAMP].trim();
    if !RECORD_TIMESTAMP.is_match(timestamp) {
        return None;
    }
    let number = cells[COLUMN_NUMBER].trim();
    let service = cells[COLUMN_SERVICE].trim();
    let body = cells[COLUMN_BODY].trim();
    if number.is_empty() || body.is_empty() {
        return None;
    }
    Some(RawMessage {
        timestamp: timestamp.to_string(),
        source_number: number.to_string(),
        service_label: service.to_string(),
        body: body.to_string(),
    })
}

fn json_cell_text(cell: &Value) -> String {
    match cell {
        Value::String(text) => strip_html(text),
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn strip_html(fragment: &str) -> String {
    let stripped = HTML_TAG.replace_all(fragment, " ");
    stripped
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stale records are skipped so a freshly logged-in session does not
/// replay the whole day's table. Unparseable timestamps pass through;
/// dedup still protects against replays.
fn is_fresh(timestamp: &str, now: NaiveDateTime, window_secs: i64) -> bool {
    match NaiveDateTime::parse_from_str(timestamp, UPSTREAM_TIMESTAMP_FORMAT) {
        Ok(record_time) => now.signed_duration_since(record_time) <= TimeDelta::seconds(window_secs),
        Err(_) => true,
    }
}
