use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task;
use crate::error::{Result, RelmcpError};

pub mod migrate;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Database connection wrapper for one graph store endpoint
#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Db {
    /// Create a new database connection manager
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a read-write connection, creating the file if needed.
    pub fn open_connection(&self) -> Result<Connection> {
        open_read_write(&self.path, self.busy_timeout)
    }

    /// Execute a closure with a read-write connection in a blocking task
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        let timeout = self.busy_timeout;
        task::spawn_blocking(move || {
            let mut conn = open_read_write(&path, timeout)?;
            f(&mut conn)
        })
        .await
        .map_err(join_error)?
    }

    /// Execute a closure with a read-only connection in a blocking task.
    ///
    /// A store that cannot be opened surfaces as `StoreUnavailable`.
    pub async fn with_read_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        let timeout = self.busy_timeout;
        task::spawn_blocking(move || {
            let conn = open_read_only(&path, timeout)?;
            f(&conn)
        })
        .await
        .map_err(join_error)?
    }
}

fn open_read_write(path: &Path, timeout: Duration) -> Result<Connection> {
    let conn = Connection::open(path).map_err(|e| unavailable(path, e))?;

    // WAL for concurrent readers while the loader writes
    conn.execute_batch(
        "PRAGMA journal_mode = WAL; \
         PRAGMA synchronous = NORMAL; \
         PRAGMA temp_store = MEMORY; \
         PRAGMA cache_size = -65536;"
    )?;
    conn.busy_timeout(timeout)?;
    register_functions(&conn)?;

    Ok(conn)
}

fn open_read_only(path: &Path, timeout: Duration) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| unavailable(path, e))?;

    conn.busy_timeout(timeout)?;
    conn.execute_batch("PRAGMA query_only = ON;")?;
    register_functions(&conn)?;

    Ok(conn)
}

/// SQL name of the Unicode-aware lowercase function. The built-in `lower()`
/// only folds ASCII.
pub const FOLD_LOWER: &str = "fold_lower";

/// Register the scalar functions listing queries rely on.
pub fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        FOLD_LOWER,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            Ok(match ctx.get_raw(0) {
                ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).to_lowercase()),
                ValueRef::Integer(i) => Some(i.to_string()),
                ValueRef::Real(f) => Some(f.to_string()),
                ValueRef::Null | ValueRef::Blob(_) => None,
            })
        },
    )?;
    Ok(())
}

fn unavailable(path: &Path, e: rusqlite::Error) -> RelmcpError {
    RelmcpError::StoreUnavailable(format!("cannot open {}: {}", path.display(), e))
}

fn join_error(e: task::JoinError) -> RelmcpError {
    RelmcpError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("database task failed: {}", e),
    ))
}
