// Forecast archive backed by SQLite.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracker_core::{PersistenceError, RusqliteErrorExt};
use tracker_weather::{ExtendedFields, ForecastKey, ForecastRecord, Provider, WeatherCondition};

const SCHEMA_VERSION: i32 = 1;
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Append-only store of collected forecasts keyed by
/// (issued, lead time, location, provider).
pub trait ForecastArchive: Send + Sync {
    /// Insert, or overwrite the record with the same key.
    fn record(&self, record: &ForecastRecord) -> Result<(), PersistenceError>;

    fn lookup(&self, key: &ForecastKey) -> Result<Option<ForecastRecord>, PersistenceError>;

    fn count(&self) -> Result<usize, PersistenceError>;
}

pub struct SqliteForecastArchive {
    conn: Mutex<Connection>,
}

impl SqliteForecastArchive {
    /// Open or create the archive database
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| PersistenceError::write(parent, e))?;
            }
        }

        let conn = Connection::open(path).map_err(|e| e.into_persistence_error())?;
        let archive = Self {
            conn: Mutex::new(conn),
        };
        archive.init_schema()?;

        tracing::debug!(path = %path.display(), "Opened forecast archive");
        Ok(archive)
    }

    pub fn in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory().map_err(|e| e.into_persistence_error())?;
        let archive = Self {
            conn: Mutex::new(conn),
        };
        archive.init_schema()?;
        Ok(archive)
    }

    fn init_schema(&self) -> Result<(), PersistenceError> {
        let conn = self.conn.lock();

        // Reading the version first surfaces a file that is not a database.
        conn.execute("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)", [])
            .map_err(|e| e.into_persistence_error())?;

        let version: Option<i32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
            .optional()
            .map_err(|e| e.into_persistence_error())?;

        if let Some(v) = version {
            if v > SCHEMA_VERSION {
                return Err(PersistenceError::Database(format!(
                    "archive schema version {} is newer than supported version {}",
                    v, SCHEMA_VERSION
                )));
            }
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS forecasts (
                issued TEXT NOT NULL,
                lead_time INTEGER NOT NULL,
                target TEXT NOT NULL,
                location_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                high REAL,
                low REAL,
                precipitation REAL,
                condition TEXT,
                extended TEXT NOT NULL,
                fetched_at TEXT NOT NULL,
                PRIMARY KEY (issued, lead_time, location_id, provider)
            );

            CREATE INDEX IF NOT EXISTS idx_forecasts_target ON forecasts(target);",
        )
        .map_err(|e| e.into_persistence_error())?;

        if version.is_none() {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .map_err(|e| e.into_persistence_error())?;
        }

        Ok(())
    }
}

impl ForecastArchive for SqliteForecastArchive {
    fn record(&self, record: &ForecastRecord) -> Result<(), PersistenceError> {
        let extended = serde_json::to_string(&record.extended)
            .map_err(|e| PersistenceError::Database(format!("encode extended fields: {}", e)))?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO forecasts (issued, lead_time, target, location_id, provider, high, low,
                                    precipitation, condition, extended, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(issued, lead_time, location_id, provider) DO UPDATE SET
                target = excluded.target,
                high = excluded.high,
                low = excluded.low,
                precipitation = excluded.precipitation,
                condition = excluded.condition,
                extended = excluded.extended,
                fetched_at = excluded.fetched_at",
            params![
                record.issued.format(DATE_FORMAT).to_string(),
                record.lead_time,
                record.target.format(DATE_FORMAT).to_string(),
                record.location_id,
                record.provider.as_str(),
                record.high,
                record.low,
                record.precipitation,
                record.condition.map(|c| c.as_str()),
                extended,
                record.fetched_at.to_rfc3339(),
            ],
        )
        .map_err(|e| e.into_persistence_error())?;
        Ok(())
    }

    fn lookup(&self, key: &ForecastKey) -> Result<Option<ForecastRecord>, PersistenceError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT issued, lead_time, target, location_id, provider, high, low,
                        precipitation, condition, extended, fetched_at
                 FROM forecasts
                 WHERE issued = ?1 AND lead_time = ?2 AND location_id = ?3 AND provider = ?4",
            )
            .map_err(|e| e.into_persistence_error())?;

        let columns = stmt
            .query_row(
                params![
                    key.issued.format(DATE_FORMAT).to_string(),
                    key.lead_time,
                    key.location_id,
                    key.provider.as_str(),
                ],
                row_to_columns,
            )
            .optional()
            .map_err(|e| e.into_persistence_error())?;

        columns.map(RowColumns::into_record).transpose()
    }

    fn count(&self) -> Result<usize, PersistenceError> {
        let conn = self.conn.lock();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM forecasts", [], |row| row.get(0))
            .map_err(|e| e.into_persistence_error())?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}

/// Raw column values; parsed outside the rusqlite closure so format errors
/// become `PersistenceError`s.
struct RowColumns {
    issued: String,
    lead_time: u32,
    target: String,
    location_id: String,
    provider: String,
    high: Option<f64>,
    low: Option<f64>,
    precipitation: Option<f64>,
    condition: Option<String>,
    extended: String,
    fetched_at: String,
}

fn row_to_columns(row: &Row<'_>) -> rusqlite::Result<RowColumns> {
    Ok(RowColumns {
        issued: row.get(0)?,
        lead_time: row.get(1)?,
        target: row.get(2)?,
        location_id: row.get(3)?,
        provider: row.get(4)?,
        high: row.get(5)?,
        low: row.get(6)?,
        precipitation: row.get(7)?,
        condition: row.get(8)?,
        extended: row.get(9)?,
        fetched_at: row.get(10)?,
    })
}

fn parse_date(value: &str) -> Result<NaiveDate, PersistenceError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| PersistenceError::Database(format!("bad date {:?}: {}", value, e)))
}

impl RowColumns {
    fn into_record(self) -> Result<ForecastRecord, PersistenceError> {
        let provider = Provider::parse(&self.provider)
            .ok_or_else(|| PersistenceError::Database(format!("unknown provider {:?}", self.provider)))?;

        let condition = match self.condition {
            Some(c) => Some(
                serde_json::from_value::<WeatherCondition>(serde_json::Value::String(c))
                    .map_err(|e| PersistenceError::Database(format!("bad condition: {}", e)))?,
            ),
            None => None,
        };

        let extended: ExtendedFields = serde_json::from_str(&self.extended)
            .map_err(|e| PersistenceError::Database(format!("bad extended fields: {}", e)))?;

        let fetched_at = DateTime::parse_from_rfc3339(&self.fetched_at)
            .map_err(|e| PersistenceError::Database(format!("bad fetched_at: {}", e)))?
            .with_timezone(&Utc);

        Ok(ForecastRecord {
            issued: parse_date(&self.issued)?,
            lead_time: self.lead_time,
            target: parse_date(&self.target)?,
            location_id: self.location_id,
            provider,
            high: self.high,
            low: self.low,
            precipitation: self.precipitation,
            condition,
            extended,
            fetched_at,
        })
    }
}
