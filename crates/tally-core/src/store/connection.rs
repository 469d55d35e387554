//! libSQL-backed local store

use std::path::{Path, PathBuf};
use std::sync::Arc;

use libsql::{Builder, Connection, Database as LibSqlDatabase};

use super::{migrations, LocalStore, Namespace, StorageResult};

/// Local database holding the snapshot cache and the offline queue.
///
/// Every store operation acquires its own connection and drops it when the
/// operation completes. In-memory databases pin a single connection instead,
/// since each `:memory:` connection would otherwise see an empty database.
#[derive(Clone)]
pub struct LocalDatabase {
    inner: Arc<Inner>,
}

struct Inner {
    db: LibSqlDatabase,
    pinned: Option<Connection>,
    path: Option<PathBuf>,
}

impl LocalDatabase {
    /// Open a database at the given path, creating it (and its parent
    /// directories) if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let path_str = path.to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;

        let database = Self {
            inner: Arc::new(Inner {
                db,
                pinned: None,
                path: Some(path),
            }),
        };
        database.initialize().await?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> StorageResult<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        let conn = db.connect()?;

        let database = Self {
            inner: Arc::new(Inner {
                db,
                pinned: Some(conn),
                path: None,
            }),
        };
        database.initialize().await?;
        Ok(database)
    }

    /// Filesystem location, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    fn acquire(&self) -> StorageResult<Connection> {
        match &self.inner.pinned {
            Some(conn) => Ok(conn.clone()),
            None => Ok(self.inner.db.connect()?),
        }
    }

    async fn initialize(&self) -> StorageResult<()> {
        let conn = self.acquire()?;
        // WAL keeps readers from blocking the queue writer; unsupported for
        // in-memory databases, so failures are ignored
        conn.query("PRAGMA journal_mode = WAL;", ()).await.ok();
        conn.execute("PRAGMA synchronous = NORMAL;", ()).await.ok();
        migrations::run(&conn).await?;
        match self.path() {
            Some(path) => tracing::debug!("Opened local store at {}", path.display()),
            None => tracing::debug!("Opened in-memory local store"),
        }
        Ok(())
    }
}

impl LocalStore for LocalDatabase {
    async fn get(&self, namespace: Namespace, key: &str) -> StorageResult<Option<String>> {
        let conn = self.acquire()?;
        let sql = format!("SELECT value FROM {} WHERE key = ?", namespace.table());
        let mut rows = conn.query(&sql, [key]).await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(row.get::<String>(0)?))
        } else {
            Ok(None)
        }
    }

    async fn set(&self, namespace: Namespace, key: &str, value: &str) -> StorageResult<()> {
        let conn = self.acquire()?;
        let sql = format!(
            "INSERT OR REPLACE INTO {} (key, value) VALUES (?, ?)",
            namespace.table()
        );
        conn.execute(&sql, [key, value]).await?;
        Ok(())
    }

    async fn delete(&self, namespace: Namespace, key: &str) -> StorageResult<()> {
        let conn = self.acquire()?;
        let sql = format!("DELETE FROM {} WHERE key = ?", namespace.table());
        conn.execute(&sql, [key]).await?;
        Ok(())
    }

    async fn list_entries(&self, namespace: Namespace) -> StorageResult<Vec<(String, String)>> {
        let conn = self.acquire()?;
        let sql = format!("SELECT key, value FROM {}", namespace.table());
        let mut rows = conn.query(&sql, ()).await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push((row.get::<String>(0)?, row.get::<String>(1)?));
        }
        Ok(entries)
    }
}
