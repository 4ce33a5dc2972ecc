//! SQLite-backed queue store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{CounterFilter, QueueStore, StoreError, StoreTx, TicketFilter};
use crate::config::DatabaseConfig;
use crate::model::{
    Company, Counter, CounterName, CounterStatus, Flight, NewCompany, NewFlight, NewService,
    NewTicket, Service, Ticket, TicketStatus,
};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const COMPANY_COLUMNS: &str = "id, code, name, average_service_time_minutes";
const SERVICE_COLUMNS: &str = "id, name, prefix, is_active";
const FLIGHT_COLUMNS: &str = "id, flight_number, company_code, departure_time, status";
const COUNTER_COLUMNS: &str = "name, assigned_company, status";
const TICKET_COLUMNS: &str = "id, ticket_number, queue_number, service_id, counter, status, created_at, called_at, estimated_waiting_time_minutes";

/// SQLite-backed store.
///
/// All units of work share one connection behind a mutex and run inside
/// `BEGIN IMMEDIATE`, so a count-then-insert or scan-then-bind sequence can't
/// interleave with another request, even across processes sharing the file.
pub struct SqliteQueueStore {
    conn: Mutex<Connection>,
}

impl SqliteQueueStore {
    /// Open (or create) the database file and make sure the schema exists.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open the database described by the `[database]` config section.
    pub fn open(config: &DatabaseConfig) -> Result<Self, StoreError> {
        Self::open_with_timeout(&config.path, Duration::from_millis(config.busy_timeout_ms))
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_with_timeout(path: &Path, busy_timeout: Duration) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS companies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                code TEXT NOT NULL UNIQUE COLLATE NOCASE,
                name TEXT NOT NULL,
                average_service_time_minutes INTEGER NOT NULL
                    CHECK (average_service_time_minutes > 0)
            );

            CREATE TABLE IF NOT EXISTS services (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                prefix TEXT NOT NULL CHECK (length(prefix) = 1),
                is_active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS flights (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                flight_number TEXT NOT NULL UNIQUE COLLATE NOCASE,
                company_code TEXT NOT NULL COLLATE NOCASE,
                departure_time TEXT NOT NULL,
                status TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS counters (
                name TEXT PRIMARY KEY,
                assigned_company TEXT COLLATE NOCASE,
                status TEXT NOT NULL DEFAULT 'LIBRE'
                    CHECK (status IN ('LIBRE', 'OCCUPE', 'FERME'))
            );

            CREATE TABLE IF NOT EXISTS tickets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticket_number TEXT NOT NULL COLLATE NOCASE,
                queue_number TEXT NOT NULL,
                service_id INTEGER NOT NULL REFERENCES services(id),
                counter TEXT REFERENCES counters(name),
                status TEXT NOT NULL
                    CHECK (status IN ('WAITING', 'CALLED', 'DONE', 'CANCELLED')),
                created_at TEXT NOT NULL,
                called_at TEXT,
                estimated_waiting_time_minutes INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_service_created ON tickets(service_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_tickets_counter_status ON tickets(counter, status);
            CREATE INDEX IF NOT EXISTS idx_tickets_number_status ON tickets(ticket_number, status);
            CREATE INDEX IF NOT EXISTS idx_counters_company ON counters(assigned_company);
            "#,
        )?;

        // The counter universe is fixed; rows are created here and nowhere else.
        let mut stmt = conn.prepare("INSERT OR IGNORE INTO counters (name, status) VALUES (?, 'LIBRE')")?;
        for name in CounterName::all() {
            stmt.execute(params![name.as_str()])?;
        }

        Ok(())
    }
}

impl QueueStore for SqliteQueueStore {
    fn begin(&self) -> Result<Box<dyn StoreTx + '_>, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Database("connection mutex poisoned".to_string()))?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Box::new(SqliteTx {
            conn,
            finished: false,
        }))
    }
}

/// A unit of work holding the connection for its whole lifetime.
struct SqliteTx<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl Drop for SqliteTx<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %e, "Failed to roll back store transaction");
            }
        }
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    // Fixed width so that string order is time order.
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn row_to_company(row: &Row) -> rusqlite::Result<Company> {
    Ok(Company {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        average_service_time_minutes: row.get(3)?,
    })
}

fn row_to_service(row: &Row) -> rusqlite::Result<Service> {
    let prefix: String = row.get(2)?;
    let prefix = prefix
        .chars()
        .next()
        .ok_or_else(|| conversion_error(2, "empty service prefix"))?;

    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        prefix,
        is_active: row.get(3)?,
    })
}

fn row_to_flight(row: &Row) -> rusqlite::Result<Flight> {
    let departure: String = row.get(3)?;
    Ok(Flight {
        id: row.get(0)?,
        flight_number: row.get(1)?,
        company_code: row.get(2)?,
        departure_time: parse_timestamp(3, &departure)?,
        status: row.get(4)?,
    })
}

fn row_to_counter(row: &Row) -> rusqlite::Result<Counter> {
    let name: String = row.get(0)?;
    let status: String = row.get(2)?;
    Ok(Counter {
        name: CounterName::parse(&name).map_err(|e| conversion_error(0, e))?,
        assigned_company: row.get(1)?,
        status: status
            .parse::<CounterStatus>()
            .map_err(|e| conversion_error(2, e))?,
    })
}

fn row_to_ticket(row: &Row) -> rusqlite::Result<Ticket> {
    let counter: Option<String> = row.get(4)?;
    let status: String = row.get(5)?;
    let created_at: String = row.get(6)?;
    let called_at: Option<String> = row.get(7)?;

    Ok(Ticket {
        id: row.get(0)?,
        ticket_number: row.get(1)?,
        queue_number: row.get(2)?,
        service_id: row.get(3)?,
        counter: counter
            .map(|name| CounterName::parse(&name).map_err(|e| conversion_error(4, e)))
            .transpose()?,
        status: status
            .parse::<TicketStatus>()
            .map_err(|e| conversion_error(5, e))?,
        created_at: parse_timestamp(6, &created_at)?,
        called_at: called_at
            .map(|raw| parse_timestamp(7, &raw))
            .transpose()?,
        estimated_waiting_time_minutes: row.get(8)?,
    })
}

fn in_placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn build_ticket_where(filter: &TicketFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
    let mut conditions = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(service_id) = filter.service_id {
        conditions.push("service_id = ?".to_string());
        params.push(Box::new(service_id));
    }

    if let Some(ref from) = filter.created_from {
        conditions.push("created_at >= ?".to_string());
        params.push(Box::new(format_timestamp(from)));
    }

    if let Some(ref before) = filter.created_before {
        conditions.push("created_at < ?".to_string());
        params.push(Box::new(format_timestamp(before)));
    }

    if let Some(ref counter) = filter.counter {
        conditions.push("counter = ?".to_string());
        params.push(Box::new(counter.as_str().to_string()));
    }

    if !filter.statuses.is_empty() {
        conditions.push(format!(
            "status IN ({})",
            in_placeholders(filter.statuses.len())
        ));
        for status in &filter.statuses {
            params.push(Box::new(status.as_str()));
        }
    }

    if let Some(ref ticket_number) = filter.ticket_number {
        conditions.push("ticket_number = ?".to_string());
        params.push(Box::new(ticket_number.trim().to_string()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    (where_clause, params)
}

fn build_counter_where(filter: &CounterFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
    let mut conditions = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(ref code) = filter.company_code {
        conditions.push("assigned_company = ?".to_string());
        params.push(Box::new(code.trim().to_string()));
    }

    if !filter.statuses.is_empty() {
        conditions.push(format!(
            "status IN ({})",
            in_placeholders(filter.statuses.len())
        ));
        for status in &filter.statuses {
            params.push(Box::new(status.as_str()));
        }
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    (where_clause, params)
}

impl SqliteTx<'_> {
    fn query_all<T>(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
        map: fn(&Row) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, map)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }
}

impl StoreTx for SqliteTx<'_> {
    fn upsert_company(&self, company: &NewCompany) -> Result<Company, StoreError> {
        let code = company.code.trim().to_uppercase();
        self.conn.execute(
            "INSERT INTO companies (code, name, average_service_time_minutes) VALUES (?1, ?2, ?3)
             ON CONFLICT(code) DO UPDATE SET
                name = excluded.name,
                average_service_time_minutes = excluded.average_service_time_minutes",
            params![code, company.name, company.average_service_time_minutes],
        )?;

        self.company_by_code(&code)?
            .ok_or_else(|| StoreError::Conflict(format!("company {} vanished after upsert", code)))
    }

    fn company_by_code(&self, code: &str) -> Result<Option<Company>, StoreError> {
        let sql = format!("SELECT {} FROM companies WHERE code = ?", COMPANY_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![code.trim()], row_to_company)
            .optional()?)
    }

    fn list_companies(&self) -> Result<Vec<Company>, StoreError> {
        let sql = format!("SELECT {} FROM companies ORDER BY code", COMPANY_COLUMNS);
        self.query_all(&sql, &[], row_to_company)
    }

    fn upsert_service(&self, service: &NewService) -> Result<Service, StoreError> {
        let name = service.name.trim();
        self.conn.execute(
            "INSERT INTO services (name, prefix, is_active) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET
                prefix = excluded.prefix,
                is_active = excluded.is_active",
            params![name, service.prefix.to_string(), service.is_active],
        )?;

        let sql = format!("SELECT {} FROM services WHERE name = ?", SERVICE_COLUMNS);
        Ok(self.conn.query_row(&sql, params![name], row_to_service)?)
    }

    fn service(&self, id: i64) -> Result<Option<Service>, StoreError> {
        let sql = format!("SELECT {} FROM services WHERE id = ?", SERVICE_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![id], row_to_service)
            .optional()?)
    }

    fn list_services(&self) -> Result<Vec<Service>, StoreError> {
        let sql = format!("SELECT {} FROM services ORDER BY id", SERVICE_COLUMNS);
        self.query_all(&sql, &[], row_to_service)
    }

    fn upsert_flight(&self, flight: &NewFlight) -> Result<Flight, StoreError> {
        let number = flight.flight_number.trim().to_uppercase();
        self.conn.execute(
            "INSERT INTO flights (flight_number, company_code, departure_time, status)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(flight_number) DO UPDATE SET
                company_code = excluded.company_code,
                departure_time = excluded.departure_time,
                status = excluded.status",
            params![
                number,
                flight.company_code.trim().to_uppercase(),
                format_timestamp(&flight.departure_time),
                flight.status,
            ],
        )?;

        self.flight_by_number(&number)?
            .ok_or_else(|| StoreError::Conflict(format!("flight {} vanished after upsert", number)))
    }

    fn flight_by_number(&self, flight_number: &str) -> Result<Option<Flight>, StoreError> {
        let sql = format!("SELECT {} FROM flights WHERE flight_number = ?", FLIGHT_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![flight_number.trim()], row_to_flight)
            .optional()?)
    }

    fn list_flights(&self) -> Result<Vec<Flight>, StoreError> {
        let sql = format!(
            "SELECT {} FROM flights ORDER BY departure_time, flight_number",
            FLIGHT_COLUMNS
        );
        self.query_all(&sql, &[], row_to_flight)
    }

    fn counter(&self, name: &CounterName) -> Result<Option<Counter>, StoreError> {
        let sql = format!("SELECT {} FROM counters WHERE name = ?", COUNTER_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![name.as_str()], row_to_counter)
            .optional()?)
    }

    fn list_counters(&self, filter: &CounterFilter) -> Result<Vec<Counter>, StoreError> {
        let (where_clause, params) = build_counter_where(filter);
        let sql = format!(
            "SELECT {} FROM counters {} ORDER BY name",
            COUNTER_COLUMNS, where_clause
        );
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        self.query_all(&sql, param_refs.as_slice(), row_to_counter)
    }

    fn count_counters(&self, filter: &CounterFilter) -> Result<i64, StoreError> {
        let (where_clause, params) = build_counter_where(filter);
        let sql = format!("SELECT COUNT(*) FROM counters {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        Ok(self
            .conn
            .query_row(&sql, param_refs.as_slice(), |row| row.get(0))?)
    }

    fn set_counter_company(
        &self,
        name: &CounterName,
        company_code: Option<&str>,
    ) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE counters SET assigned_company = ?1 WHERE name = ?2",
            params![company_code.map(|c| c.trim().to_uppercase()), name.as_str()],
        )?;
        if changed == 0 {
            return Err(StoreError::Conflict(format!("counter {} not found", name)));
        }
        Ok(())
    }

    fn compare_and_set_counter_status(
        &self,
        name: &CounterName,
        expected: CounterStatus,
        new: CounterStatus,
    ) -> Result<bool, StoreError> {
        let changed = self.conn.execute(
            "UPDATE counters SET status = ?1 WHERE name = ?2 AND status = ?3",
            params![new.as_str(), name.as_str(), expected.as_str()],
        )?;
        Ok(changed == 1)
    }

    fn insert_ticket(&self, ticket: &NewTicket) -> Result<Ticket, StoreError> {
        self.conn.execute(
            "INSERT INTO tickets (ticket_number, queue_number, service_id, counter, status, created_at, called_at, estimated_waiting_time_minutes)
             VALUES (?1, ?2, ?3, NULL, ?4, ?5, NULL, ?6)",
            params![
                ticket.ticket_number.trim().to_uppercase(),
                ticket.queue_number,
                ticket.service_id,
                TicketStatus::Waiting.as_str(),
                format_timestamp(&ticket.created_at),
                ticket.estimated_waiting_time_minutes,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.ticket(id)?
            .ok_or_else(|| StoreError::Conflict(format!("ticket {} vanished after insert", id)))
    }

    fn ticket(&self, id: i64) -> Result<Option<Ticket>, StoreError> {
        let sql = format!("SELECT {} FROM tickets WHERE id = ?", TICKET_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![id], row_to_ticket)
            .optional()?)
    }

    fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, StoreError> {
        let (where_clause, params) = build_ticket_where(filter);
        let sql = format!(
            "SELECT {} FROM tickets {} ORDER BY created_at ASC, id ASC LIMIT ? OFFSET ?",
            TICKET_COLUMNS, where_clause
        );

        // SQLite treats a negative LIMIT as "no limit".
        let mut all_params = params;
        all_params.push(Box::new(filter.limit.unwrap_or(-1)));
        all_params.push(Box::new(filter.offset.max(0)));

        let param_refs: Vec<&dyn rusqlite::ToSql> =
            all_params.iter().map(|p| p.as_ref()).collect();
        self.query_all(&sql, param_refs.as_slice(), row_to_ticket)
    }

    fn count_tickets(&self, filter: &TicketFilter) -> Result<i64, StoreError> {
        let (where_clause, params) = build_ticket_where(filter);
        let sql = format!("SELECT COUNT(*) FROM tickets {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        Ok(self
            .conn
            .query_row(&sql, param_refs.as_slice(), |row| row.get(0))?)
    }

    fn update_ticket_status(
        &self,
        id: i64,
        status: TicketStatus,
        called_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE tickets SET status = ?1, called_at = COALESCE(?2, called_at) WHERE id = ?3",
            params![status.as_str(), called_at.as_ref().map(format_timestamp), id],
        )?;
        if changed == 0 {
            return Err(StoreError::Conflict(format!("ticket {} not found", id)));
        }
        Ok(())
    }

    fn bind_ticket_counter(&self, id: i64, counter: &CounterName) -> Result<bool, StoreError> {
        let changed = self.conn.execute(
            "UPDATE tickets SET counter = ?1 WHERE id = ?2 AND (counter IS NULL OR counter = ?1)",
            params![counter.as_str(), id],
        )?;
        if changed == 1 {
            return Ok(true);
        }
        match self.ticket(id)? {
            Some(_) => Ok(false),
            None => Err(StoreError::Conflict(format!("ticket {} not found", id))),
        }
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut this = self;
        this.conn.execute_batch("COMMIT")?;
        this.finished = true;
        Ok(())
    }
}
