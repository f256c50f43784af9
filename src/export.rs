use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::ApiError,
    models::{ConferenceSession, Event, InvitationStatus, RosterEntry},
};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("row {row} has {actual} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        ApiError::Internal(format!("export failed: {err}"))
    }
}

/// Table
///
/// Structured rows handed to a renderer. Every row has one cell per header.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(title: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            title: title.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn check_shape(&self) -> Result<(), ExportError> {
        for (index, row) in self.rows.iter().enumerate() {
            if row.len() != self.headers.len() {
                return Err(ExportError::RaggedRow {
                    row: index,
                    expected: self.headers.len(),
                    actual: row.len(),
                });
            }
        }
        Ok(())
    }
}

/// DocumentRenderer
///
/// Turns a `Table` into a downloadable binary buffer.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, table: &Table) -> Result<Vec<u8>, ExportError>;
    fn content_type(&self) -> &'static str;
    fn extension(&self) -> &'static str;
}

/// CSV per RFC 4180 with CRLF line endings.
pub struct CsvRenderer;

impl CsvRenderer {
    fn cell(raw: &str) -> String {
        // Spreadsheet formula injection: neutralize leading formula characters.
        let value = match raw.chars().next() {
            Some('=' | '+' | '-' | '@' | '\t' | '\r') => format!("'{raw}"),
            _ => raw.to_string(),
        };
        if value.contains([',', '"', '\n', '\r']) {
            format!("\"{}\"", value.replace('"', "\"\""))
        } else {
            value
        }
    }

    fn line(cells: &[String]) -> String {
        let mut line = cells
            .iter()
            .map(|c| Self::cell(c))
            .collect::<Vec<_>>()
            .join(",");
        line.push_str("\r\n");
        line
    }
}

impl DocumentRenderer for CsvRenderer {
    fn render(&self, table: &Table) -> Result<Vec<u8>, ExportError> {
        table.check_shape()?;
        let mut out = Self::line(&table.headers);
        for row in &table.rows {
            out.push_str(&Self::line(row));
        }
        Ok(out.into_bytes())
    }

    fn content_type(&self) -> &'static str {
        "text/csv; charset=utf-8"
    }

    fn extension(&self) -> &'static str {
        "csv"
    }
}

/// An array of objects keyed by header.
pub struct JsonRenderer;

impl DocumentRenderer for JsonRenderer {
    fn render(&self, table: &Table) -> Result<Vec<u8>, ExportError> {
        table.check_shape()?;
        let rows: Vec<serde_json::Map<String, serde_json::Value>> = table
            .rows
            .iter()
            .map(|row| {
                table
                    .headers
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned().map(serde_json::Value::String))
                    .collect()
            })
            .collect();
        Ok(serde_json::to_vec_pretty(&rows)?)
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn parse(raw: Option<&str>) -> Result<Self, ApiError> {
        match raw.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("csv") => Ok(Self::Csv),
            Some("json") => Ok(Self::Json),
            Some(other) => Err(ApiError::field(
                "format",
                format!("unsupported export format '{other}'; expected csv or json"),
            )),
        }
    }

    pub fn renderer(self) -> Box<dyn DocumentRenderer> {
        match self {
            Self::Csv => Box::new(CsvRenderer),
            Self::Json => Box::new(JsonRenderer),
        }
    }
}

/// ExportQuery
///
/// `?format=csv|json`. Kept as a raw string so an unknown value becomes a field
/// error rather than a query rejection.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExportQuery {
    pub format: Option<String>,
}

fn status_label(status: Option<InvitationStatus>) -> &'static str {
    match status {
        None => "unassigned",
        Some(InvitationStatus::Pending) => "pending",
        Some(InvitationStatus::Accepted) => "accepted",
        Some(InvitationStatus::Declined) => "declined",
    }
}

const TIMESTAMP: &str = "%Y-%m-%d %H:%M";

pub fn roster_table(event: &Event, roster: &[RosterEntry]) -> Table {
    let mut table = Table::new(
        format!("{} faculty", event.name),
        &[
            "session",
            "hall",
            "starts_at",
            "ends_at",
            "faculty_name",
            "faculty_email",
            "invitation_status",
        ],
    );
    for entry in roster {
        table.push(vec![
            entry.session_title.clone(),
            entry.hall.clone().unwrap_or_default(),
            entry.starts_at.format(TIMESTAMP).to_string(),
            entry.ends_at.format(TIMESTAMP).to_string(),
            entry.faculty_name.clone().unwrap_or_default(),
            entry.faculty_email.clone().unwrap_or_default(),
            status_label(entry.invitation_status).to_string(),
        ]);
    }
    table
}

pub fn sessions_table(event: &Event, sessions: &[ConferenceSession]) -> Table {
    let mut table = Table::new(
        format!("{} sessions", event.name),
        &["id", "title", "hall", "starts_at", "ends_at", "invitation_status"],
    );
    for session in sessions {
        table.push(vec![
            session.id.to_string(),
            session.title.clone(),
            session.hall.clone().unwrap_or_default(),
            session.starts_at.format(TIMESTAMP).to_string(),
            session.ends_at.format(TIMESTAMP).to_string(),
            status_label(session.invitation_status).to_string(),
        ]);
    }
    table
}

/// Attachment file name derived from the table title, restricted to `[a-z0-9-]`.
pub fn attachment_name(table: &Table, renderer: &dyn DocumentRenderer) -> String {
    let mut slug = String::new();
    for c in table.title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    let slug = if slug.is_empty() { "export" } else { slug };
    format!("{slug}.{}", renderer.extension())
}
