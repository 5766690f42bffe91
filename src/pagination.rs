//! Keyset pagination
//!
//! Lists are ordered by a `(timestamp column, id)` compound key. The cursor
//! is the base64 of `"<RFC3339 nanos>|<uuid>"` for the last row handed out,
//! and the next page starts strictly after it. Every query fetches
//! `limit + 1` rows so the presence of a following page is known without a
//! count.

use std::cmp::Ordering;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaginationError {
    #[error("invalid cursor")]
    InvalidCursor,

    #[error("invalid sort: {0}")]
    InvalidSort(String),
}

// =========================================================================
// Cursor
// =========================================================================

/// Position of a row in a keyset ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub timestamp: DateTime<Utc>,
    pub id: Uuid,
}

impl Cursor {
    pub fn new(timestamp: DateTime<Utc>, id: Uuid) -> Self {
        Self { timestamp, id }
    }

    pub fn encode(&self) -> String {
        let raw = format!(
            "{}|{}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.id
        );
        STANDARD.encode(raw)
    }

    pub fn decode(encoded: &str) -> Result<Self, PaginationError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| PaginationError::InvalidCursor)?;
        let raw = String::from_utf8(bytes).map_err(|_| PaginationError::InvalidCursor)?;
        let (ts, id) = raw.split_once('|').ok_or(PaginationError::InvalidCursor)?;

        let timestamp = DateTime::parse_from_rfc3339(ts)
            .map_err(|_| PaginationError::InvalidCursor)?
            .with_timezone(&Utc);
        let id = Uuid::parse_str(id).map_err(|_| PaginationError::InvalidCursor)?;

        Ok(Self { timestamp, id })
    }
}

// =========================================================================
// Sort
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Timestamp columns a list may be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    CreatedAt,
    Deadline,
}

impl SortColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortColumn::CreatedAt => "created_at",
            SortColumn::Deadline => "deadline",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "created_at" => Some(SortColumn::CreatedAt),
            "deadline" => Some(SortColumn::Deadline),
            _ => None,
        }
    }
}

/// Rows that can be placed in a keyset ordering.
pub trait Keyed {
    fn sort_key(&self, column: SortColumn) -> Cursor;
}

// =========================================================================
// Request / query
// =========================================================================

/// List parameters as supplied by the caller (`limit`, `cursor`, `sort`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
    pub sort: Option<String>,
}

impl PageRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }
}

/// Validated pagination parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub limit: u32,
    pub column: SortColumn,
    pub direction: SortDirection,
    pub cursor: Option<Cursor>,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            column: SortColumn::CreatedAt,
            direction: SortDirection::Desc,
            cursor: None,
        }
    }
}

impl PageQuery {
    /// Validate a request against the columns this list may sort by.
    ///
    /// `limit` is clamped into `[1, MAX_LIMIT]`; `sort` is `column[:asc|desc]`
    /// and defaults to `created_at:desc`.
    pub fn parse(request: &PageRequest, allowed: &[SortColumn]) -> Result<Self, PaginationError> {
        let limit = request
            .limit
            .map(|l| l.clamp(1, i64::from(MAX_LIMIT)) as u32)
            .unwrap_or(DEFAULT_LIMIT);

        let (column, direction) = match request.sort.as_deref().map(str::trim) {
            None | Some("") => (SortColumn::CreatedAt, SortDirection::Desc),
            Some(sort) => parse_sort(sort, allowed)?,
        };

        let cursor = match request.cursor.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(c) => Some(Cursor::decode(c)?),
        };

        Ok(Self {
            limit,
            column,
            direction,
            cursor,
        })
    }

    /// Rows to fetch: one past the page to detect a following page.
    pub fn fetch_limit(&self) -> i64 {
        i64::from(self.limit) + 1
    }

    /// Order two keys the way this query returns them.
    pub fn compare(&self, a: &Cursor, b: &Cursor) -> Ordering {
        let asc = (a.timestamp, a.id).cmp(&(b.timestamp, b.id));
        match self.direction {
            SortDirection::Asc => asc,
            SortDirection::Desc => asc.reverse(),
        }
    }

    /// Whether a row lies strictly after the cursor.
    pub fn admits(&self, key: &Cursor) -> bool {
        match &self.cursor {
            None => true,
            Some(cursor) => self.compare(key, cursor) == Ordering::Greater,
        }
    }

    /// Apply ordering, cursor and fetch limit to rows held in memory.
    pub fn select<T: Keyed>(&self, rows: impl IntoIterator<Item = T>) -> Vec<T> {
        let mut rows: Vec<T> = rows
            .into_iter()
            .filter(|row| self.admits(&row.sort_key(self.column)))
            .collect();
        rows.sort_by(|a, b| self.compare(&a.sort_key(self.column), &b.sort_key(self.column)));
        rows.truncate(self.fetch_limit() as usize);
        rows
    }

    /// Append the keyset predicate as `AND (...)` when a cursor is present.
    ///
    /// DESC: `col < t OR (col = t AND id < cursor_id)`; ASC mirrors it.
    pub fn push_keyset(&self, qb: &mut QueryBuilder<'_, Postgres>, column_sql: &str, id_sql: &str) {
        let Some(cursor) = self.cursor else {
            return;
        };
        let op = match self.direction {
            SortDirection::Asc => " > ",
            SortDirection::Desc => " < ",
        };

        qb.push(" AND (")
            .push(column_sql)
            .push(op)
            .push_bind(cursor.timestamp)
            .push(" OR (")
            .push(column_sql)
            .push(" = ")
            .push_bind(cursor.timestamp)
            .push(" AND ")
            .push(id_sql)
            .push(op)
            .push_bind(cursor.id)
            .push("))");
    }

    /// Append `ORDER BY` on the compound key and the fetch limit.
    pub fn push_order_limit(&self, qb: &mut QueryBuilder<'_, Postgres>, column_sql: &str, id_sql: &str) {
        let dir = match self.direction {
            SortDirection::Asc => " ASC",
            SortDirection::Desc => " DESC",
        };
        qb.push(" ORDER BY ")
            .push(column_sql)
            .push(dir)
            .push(", ")
            .push(id_sql)
            .push(dir)
            .push(" LIMIT ")
            .push_bind(self.fetch_limit());
    }
}

fn parse_sort(sort: &str, allowed: &[SortColumn]) -> Result<(SortColumn, SortDirection), PaginationError> {
    let (column, direction) = match sort.split_once(':') {
        Some((c, d)) => (c.trim(), Some(d.trim())),
        None => (sort, None),
    };

    let column = SortColumn::parse(column)
        .filter(|c| allowed.contains(c))
        .ok_or_else(|| PaginationError::InvalidSort(format!("unsupported column '{column}'")))?;

    let direction = match direction.map(str::to_ascii_lowercase).as_deref() {
        None | Some("desc") => SortDirection::Desc,
        Some("asc") => SortDirection::Asc,
        Some(other) => {
            return Err(PaginationError::InvalidSort(format!(
                "unsupported direction '{other}'"
            )))
        }
    };

    Ok((column, direction))
}

// =========================================================================
// Page
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T: Keyed> Page<T> {
    /// Shape up to `limit + 1` fetched rows into a page.
    pub fn from_rows(mut rows: Vec<T>, query: &PageQuery) -> Self {
        let limit = query.limit as usize;
        let has_more = rows.len() > limit;
        rows.truncate(limit);

        let next_cursor = if has_more {
            rows.last().map(|row| row.sort_key(query.column).encode())
        } else {
            None
        };

        Self {
            items: rows,
            next_cursor,
        }
    }
}

impl<T> Page<T> {
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
            next_cursor: self.next_cursor,
        })
    }
}
