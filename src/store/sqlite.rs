use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

const USER_COLUMNS: &str = "id, username, email, password, user_role, created_on, last_login";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory database, mostly useful for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_service(s: &str) -> rusqlite::Result<ServiceName> {
    ServiceName::parse(s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown service '{s}'").into(),
        )
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(4)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        password_hash: row.get(3)?,
        role: UserRole::parse(&role).unwrap_or_default(),
        created_on: parse_datetime(&row.get::<_, String>(5)?),
        last_login: row
            .get::<_, Option<String>>(6)?
            .map(|s| parse_datetime(&s)),
    })
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<ServiceAccount> {
    Ok(ServiceAccount {
        user_id: row.get(0)?,
        service: parse_service(&row.get::<_, String>(1)?)?,
        username: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        email: row.get(3)?,
        reposurl: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &NewUser) -> Result<User> {
        let now = Utc::now();
        let conn = self.conn();
        let result = conn.execute(
            "INSERT INTO users (username, email, password, user_role, created_on)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.username,
                user.email,
                user.password_hash,
                user.role.as_str(),
                format_datetime(&now),
            ],
        );

        match result {
            Ok(_) => Ok(User {
                id: conn.last_insert_rowid(),
                username: user.username.clone(),
                email: user.email.clone(),
                password_hash: user.password_hash.clone(),
                role: user.role,
                created_on: now,
                last_login: None,
            }),
            Err(e) if is_constraint_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            params![username],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
        let rows = stmt.query_map([], user_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_user(&self, user: &User) -> Result<()> {
        let result = self.conn().execute(
            "UPDATE users SET username = ?1, email = ?2, password = ?3, user_role = ?4 WHERE id = ?5",
            params![
                user.username,
                user.email,
                user.password_hash,
                user.role.as_str(),
                user.id,
            ],
        );

        match result {
            Ok(0) => Err(Error::NotFound),
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn touch_last_login(&self, id: i64) -> Result<()> {
        self.conn().execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    fn delete_user(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn has_admin(&self) -> Result<bool> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE user_role = 'admin'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // Service account operations

    fn upsert_service_account(&self, account: &ServiceAccount) -> Result<()> {
        let rows = self.conn().execute(
            "INSERT INTO service_users (user_id, services_id, username, email, reposurl)
             SELECT ?1, s.id, ?3, ?4, ?5 FROM services s WHERE s.name = ?2
             ON CONFLICT(services_id, user_id) DO UPDATE SET
                username = excluded.username,
                email = excluded.email,
                reposurl = excluded.reposurl",
            params![
                account.user_id,
                account.service.as_str(),
                account.username,
                account.email,
                account.reposurl,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn get_service_account(
        &self,
        user_id: i64,
        service: ServiceName,
    ) -> Result<Option<ServiceAccount>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT su.user_id, s.name, su.username, su.email, su.reposurl
             FROM service_users su JOIN services s ON s.id = su.services_id
             WHERE su.user_id = ?1 AND s.name = ?2",
            params![user_id, service.as_str()],
            account_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_service_accounts(&self, user_id: i64) -> Result<Vec<ServiceAccount>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT su.user_id, s.name, su.username, su.email, su.reposurl
             FROM service_users su JOIN services s ON s.id = su.services_id
             WHERE su.user_id = ?1 ORDER BY s.id",
        )?;
        let rows = stmt.query_map(params![user_id], account_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Repository operations

    fn record_repository(
        &self,
        user_id: i64,
        service: ServiceName,
        web_url: &str,
    ) -> Result<Option<RepositoryRecord>> {
        let conn = self.conn();
        let service_user_id: Option<i64> = conn
            .query_row(
                "SELECT su.id FROM service_users su JOIN services s ON s.id = su.services_id
                 WHERE su.user_id = ?1 AND s.name = ?2",
                params![user_id, service.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(service_user_id) = service_user_id else {
            return Ok(None);
        };

        conn.execute(
            "INSERT OR IGNORE INTO repositories (service_user_id, web_url) VALUES (?1, ?2)",
            params![service_user_id, web_url],
        )?;

        let id: i64 = conn.query_row(
            "SELECT id FROM repositories WHERE service_user_id = ?1 AND web_url = ?2",
            params![service_user_id, web_url],
            |row| row.get(0),
        )?;

        Ok(Some(RepositoryRecord {
            id,
            user_id,
            service,
            web_url: web_url.to_string(),
        }))
    }
}
