//! SQLite-backed client table.
//!
//! One connection guarded by a mutex; async callers go through
//! `spawn_blocking` so queries never run on a runtime worker.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, ErrorCode, OptionalExtension, params};

use crate::error::{Result, StoreError};
use crate::model::{Client, NewClient};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS clients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE
)";

#[derive(Clone)]
pub struct ClientStore {
    conn: Arc<Mutex<Connection>>,
}

impl ClientStore {
    /// Open (or create) the database file and ensure the schema exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Task("connection lock poisoned".into()))?;
        f(&conn)
    }

    /// Insert a client. A duplicate email inserts nothing.
    pub fn create(&self, new: &NewClient) -> Result<Client> {
        new.validate()?;

        self.with_conn(|conn| {
            match conn.execute(
                "INSERT INTO clients (name, email) VALUES (?1, ?2)",
                params![new.name, new.email],
            ) {
                Ok(_) => Ok(Client {
                    id: conn.last_insert_rowid(),
                    name: new.name.clone(),
                    email: new.email.clone(),
                }),
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                    Err(StoreError::Duplicate {
                        email: new.email.clone(),
                    })
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get(&self, id: i64) -> Result<Client> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, email FROM clients WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Client {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or(StoreError::NotFound(id))
        })
    }

    pub fn count(&self) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM clients", [], |row| row.get(0))?)
        })
    }

    pub async fn create_async(&self, new: NewClient) -> Result<Client> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.create(&new))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    pub async fn get_async(&self, id: i64) -> Result<Client> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.get(id))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_then_get_roundtrip() {
        let store = ClientStore::open_in_memory().unwrap();
        let created = store.create(&NewClient::new("Ana", "ana@example.com")).unwrap();

        let fetched = store.get(created.id).unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.name, "Ana");
        assert_eq!(fetched.email, "ana@example.com");
    }

    #[test]
    fn test_duplicate_email_inserts_nothing() {
        let store = ClientStore::open_in_memory().unwrap();
        store.create(&NewClient::new("Ana", "ana@example.com")).unwrap();

        let err = store
            .create(&NewClient::new("Ana Clone", "ana@example.com"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_missing_client() {
        let store = ClientStore::open_in_memory().unwrap();
        let err = store.get(42).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(42)));
        assert_eq!(err.to_string(), "Client not found");
    }

    #[test]
    fn test_invalid_input_is_rejected_before_insert() {
        let store = ClientStore::open_in_memory().unwrap();
        assert!(matches!(
            store.create(&NewClient::new("Ana", "not-an-email")),
            Err(StoreError::Validation(_))
        ));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_async_access() {
        let store = ClientStore::open_in_memory().unwrap();
        let created = store
            .create_async(NewClient::new("Bruno", "bruno@example.com"))
            .await
            .unwrap();
        assert_eq!(store.get_async(created.id).await.unwrap(), created);
    }
}
