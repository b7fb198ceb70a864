//! Connection handling for the journal database.
//!
//! [`Database`] wraps one `rusqlite` connection behind a mutex and runs every
//! statement on the blocking pool. [`ConnectionManager`] owns the process-wide
//! handle: it opens the database lazily, makes concurrent first callers share
//! a single initialization, health-checks the cached handle, and tears it
//! down for retries and recovery.

use super::error::storage_error;
use super::layout::DatabaseLayout;
use super::schema;
use crate::config::InitConfig;
use crate::{Error, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;

/// Helper to acquire mutex lock with poison recovery.
///
/// If a previous holder panicked, the inner value is recovered and a warning
/// logged, so one failed statement does not wedge every later caller.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Configures a `SQLite` connection for the journal.
///
/// - **WAL mode**: readers do not block the writer
/// - **NORMAL synchronous**: durable at checkpoints, fast commits
/// - **`busy_timeout`**: waits up to 5 seconds on lock contention before
///   surfacing `SQLITE_BUSY`
pub fn configure_connection(conn: &Connection) {
    // journal_mode returns a row, so pragma results are ignored rather than
    // run through execute_batch
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "5000");
}

/// An open journal database.
///
/// Cloned handles are shared through `Arc<Database>`. Once [`Database::close`]
/// has run, every further call fails with a transient error, which sends the
/// caller back to the [`ConnectionManager`] for a fresh handle.
#[derive(Debug)]
pub struct Database {
    conn: Arc<Mutex<Option<Connection>>>,
    path: PathBuf,
    fts_available: AtomicBool,
}

impl Database {
    /// Opens (creating if needed) the database at `path` and initializes the
    /// schema. Blocking.
    ///
    /// # Errors
    ///
    /// Returns a classified storage error if the file cannot be opened or the
    /// schema cannot be created.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::failed("create_data_dir", e))?;
        }

        let conn = Connection::open(path).map_err(|e| storage_error("open_database", &e))?;
        configure_connection(&conn);
        let status = schema::initialize(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            path: path.to_path_buf(),
            fts_available: AtomicBool::new(status.fts_available),
        })
    }

    /// Returns the database file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if the FTS index was created for this handle.
    #[must_use]
    pub fn fts_available(&self) -> bool {
        self.fts_available.load(Ordering::Acquire)
    }

    /// Returns `true` until [`Database::close`] has run.
    #[must_use]
    pub fn is_open(&self) -> bool {
        acquire_lock(&self.conn).is_some()
    }

    /// Runs `f` against the connection on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transient`] if the handle has been closed or the
    /// blocking task could not complete, otherwise whatever `f` returns.
    pub async fn call<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = acquire_lock(&conn);
            let conn = guard
                .as_mut()
                .ok_or_else(|| Error::transient(operation, "database handle is not ready"))?;
            f(conn)
        })
        .await
        .map_err(|e| Error::transient(operation, e))?
    }

    /// Runs `SELECT 1`; returns `false` if the handle is unusable.
    pub async fn ping(&self) -> bool {
        self.call("health_check", |conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(|e| storage_error("health_check", &e))
        })
        .await
        .is_ok()
    }

    /// Closes the connection, waiting for any in-flight statement.
    ///
    /// Closing flushes the WAL into the main file. Idempotent.
    pub async fn close(&self) {
        let conn = Arc::clone(&self.conn);
        let path = self.path.clone();
        let closed = tokio::task::spawn_blocking(move || {
            let taken = acquire_lock(&conn).take();
            if let Some(conn) = taken
                && let Err((_, e)) = conn.close()
            {
                tracing::warn!(path = %path.display(), error = %e, "Error while closing database");
            }
        })
        .await;

        if let Err(e) = closed {
            tracing::warn!(error = %e, "Close task did not complete");
        }
    }
}

/// Cached handle state.
enum Slot {
    Empty,
    Ready(Arc<Database>),
    Initializing(watch::Receiver<Option<Result<Arc<Database>>>>),
}

struct ManagerState {
    slot: Slot,
    /// Bumped whenever the cached handle is discarded.
    generation: u64,
}

enum Next {
    Probe(Arc<Database>),
    Wait(watch::Receiver<Option<Result<Arc<Database>>>>),
    Lead(watch::Sender<Option<Result<Arc<Database>>>>, u64),
}

/// Owner of the process-wide database handle.
///
/// At most one initialization runs at a time; callers arriving while it runs
/// wait for and share its outcome. A failed initialization leaves no cached
/// state, so the next caller starts over.
pub struct ConnectionManager {
    layout: DatabaseLayout,
    init: InitConfig,
    state: Mutex<ManagerState>,
    recoveries: AtomicU32,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("layout", &self.layout)
            .field("init", &self.init)
            .field("recoveries", &self.recoveries())
            .finish_non_exhaustive()
    }
}

/// Clears an `Initializing` slot if its leader is dropped before finishing.
struct InitGuard<'a> {
    manager: &'a ConnectionManager,
    generation: u64,
    armed: bool,
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = acquire_lock(&self.manager.state);
        if state.generation == self.generation && matches!(state.slot, Slot::Initializing(_)) {
            tracing::warn!("Database initialization abandoned");
            state.slot = Slot::Empty;
        }
    }
}

impl ConnectionManager {
    /// Creates a manager for the database described by `layout`.
    ///
    /// Nothing is opened until the first [`ConnectionManager::get_connection`].
    #[must_use]
    pub const fn new(layout: DatabaseLayout, init: InitConfig) -> Self {
        Self {
            layout,
            init,
            state: Mutex::new(ManagerState {
                slot: Slot::Empty,
                generation: 0,
            }),
            recoveries: AtomicU32::new(0),
        }
    }

    /// Returns the database file layout.
    #[must_use]
    pub const fn layout(&self) -> &DatabaseLayout {
        &self.layout
    }

    /// Returns how many times the database files were recreated, by corruption
    /// recovery or a manual reset.
    #[must_use]
    pub fn recoveries(&self) -> u32 {
        self.recoveries.load(Ordering::Relaxed)
    }

    /// Returns a healthy handle, initializing one if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corruption`] as soon as opening the file reports a
    /// corrupt image, [`Error::InitializationFailed`] once every other
    /// initialization attempt has failed, or [`Error::Transient`] if the
    /// initialization this caller joined was abandoned or invalidated by a
    /// reset.
    #[tracing::instrument(skip(self), fields(backend = "sqlite"))]
    pub async fn get_connection(&self) -> Result<Arc<Database>> {
        loop {
            let next = {
                let mut state = acquire_lock(&self.state);
                match &state.slot {
                    Slot::Ready(db) => Next::Probe(Arc::clone(db)),
                    Slot::Initializing(rx) => Next::Wait(rx.clone()),
                    Slot::Empty => {
                        let (tx, rx) = watch::channel(None);
                        state.slot = Slot::Initializing(rx);
                        Next::Lead(tx, state.generation)
                    },
                }
            };

            match next {
                Next::Probe(db) => {
                    if db.ping().await {
                        return Ok(db);
                    }
                    tracing::warn!("Cached database handle failed health check, reinitializing");
                    metrics::counter!("storage_health_check_failures_total").increment(1);
                    self.invalidate(&db).await;
                },
                Next::Wait(rx) => return Self::join_initialization(rx).await,
                Next::Lead(tx, generation) => return self.lead_initialization(tx, generation).await,
            }
        }
    }

    async fn join_initialization(
        mut rx: watch::Receiver<Option<Result<Arc<Database>>>>,
    ) -> Result<Arc<Database>> {
        tracing::debug!("Waiting for in-flight database initialization");
        let abandoned = || Error::transient("get_connection", "database initialization was abandoned");
        match rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone().unwrap_or_else(|| Err(abandoned())),
            Err(_) => Err(abandoned()),
        }
    }

    async fn lead_initialization(
        &self,
        tx: watch::Sender<Option<Result<Arc<Database>>>>,
        generation: u64,
    ) -> Result<Arc<Database>> {
        let mut guard = InitGuard {
            manager: self,
            generation,
            armed: true,
        };

        let mut outcome = self.initialize().await;

        let stale = {
            let mut state = acquire_lock(&self.state);
            if state.generation == generation {
                state.slot = match &outcome {
                    Ok(db) => Slot::Ready(Arc::clone(db)),
                    Err(_) => Slot::Empty,
                };
                None
            } else {
                outcome.as_ref().ok().map(Arc::clone)
            }
        };
        guard.armed = false;

        if let Some(db) = stale {
            tracing::warn!("Connection was reset during initialization, discarding new handle");
            db.close().await;
            outcome = Err(Error::transient(
                "get_connection",
                "connection was reset during initialization",
            ));
        }

        // Receivers may all be gone; nobody else is waiting then.
        let _ = tx.send(Some(outcome.clone()));
        outcome
    }

    /// Opens the database with bounded retries and a settle pause.
    async fn initialize(&self) -> Result<Arc<Database>> {
        let attempts = self.init.max_retries.saturating_add(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let path = self.layout.db_path().to_path_buf();
            let opened = tokio::task::spawn_blocking(move || Database::open(&path))
                .await
                .map_err(|e| Error::transient("open_database", e))
                .and_then(|result| result);

            match opened {
                Ok(db) => {
                    tokio::time::sleep(Duration::from_millis(self.init.settle_delay_ms)).await;
                    tracing::info!(
                        path = %self.layout.db_path().display(),
                        attempt,
                        fts_available = db.fts_available(),
                        "Database initialized"
                    );
                    metrics::counter!("storage_initializations_total", "status" => "success")
                        .increment(1);
                    return Ok(Arc::new(db));
                },
                Err(e) if e.is_corruption() => {
                    metrics::counter!("storage_initializations_total", "status" => "corruption")
                        .increment(1);
                    tracing::error!(attempt, error = %e, "Database file is corrupt, cannot initialize");
                    return Err(e);
                },
                Err(e) => {
                    tracing::warn!(attempt, max_attempts = attempts, error = %e, "Database initialization failed");
                    last_error = Some(e);
                    if attempt < attempts {
                        let delay = self.init.retry_delay_ms.saturating_mul(u64::from(attempt));
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                },
            }
        }

        metrics::counter!("storage_initializations_total", "status" => "error").increment(1);
        let cause = last_error.map_or_else(|| "no attempts were made".to_string(), |e| e.to_string());
        tracing::error!(error = %cause, "Database initialization exhausted all attempts");
        Err(Error::InitializationFailed(cause))
    }

    /// Discards `db` if it is still the cached handle, then closes it.
    ///
    /// A handle that was already replaced is left alone; whoever replaced it
    /// owns its shutdown.
    pub async fn invalidate(&self, db: &Arc<Database>) {
        let cached = {
            let mut state = acquire_lock(&self.state);
            let cached = matches!(&state.slot, Slot::Ready(current) if Arc::ptr_eq(current, db));
            if cached {
                state.slot = Slot::Empty;
                state.generation = state.generation.wrapping_add(1);
            }
            cached
        };
        if cached {
            db.close().await;
        }
    }

    /// Forgets the cached handle without closing it.
    ///
    /// Returns the discarded handle, if one was ready. An initialization in
    /// flight is invalidated: its result will not be cached.
    pub fn reset_connection(&self) -> Option<Arc<Database>> {
        let mut state = acquire_lock(&self.state);
        state.generation = state.generation.wrapping_add(1);
        match std::mem::replace(&mut state.slot, Slot::Empty) {
            Slot::Ready(db) => Some(db),
            Slot::Empty | Slot::Initializing(_) => None,
        }
    }

    /// Forgets and closes the cached handle.
    pub async fn close_connection(&self) {
        if let Some(db) = self.reset_connection() {
            db.close().await;
            tracing::debug!("Database connection closed");
        }
    }

    /// Destroys and recreates the database after corruption.
    ///
    /// Closes the handle, deletes the database and its WAL sidecars, waits
    /// `delay`, then opens a fresh empty database. All entries are lost.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecoveryFailed`] if the new database cannot be opened.
    #[tracing::instrument(skip(self), fields(backend = "sqlite"))]
    pub async fn recreate_database(&self, delay: Duration) -> Result<Arc<Database>> {
        tracing::warn!(path = %self.layout.db_path().display(), "Recreating database after corruption");
        self.close_connection().await;
        let removed = self.layout.remove_files();
        tracing::debug!(removed, "Deleted database files");

        tokio::time::sleep(delay).await;

        let db = self.get_connection().await.map_err(|e| {
            metrics::counter!("storage_recoveries_total", "status" => "error").increment(1);
            tracing::error!(error = %e, "Database recreation failed");
            Error::RecoveryFailed(e.to_string())
        })?;

        self.recoveries.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("storage_recoveries_total", "status" => "success").increment(1);
        tracing::info!("Database recreated");
        Ok(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> ConnectionManager {
        ConnectionManager::new(
            DatabaseLayout::new(dir.path().join("minmo.db")),
            InitConfig {
                max_retries: 2,
                retry_delay_ms: 0,
                settle_delay_ms: 0,
            },
        )
    }

    #[test]
    fn test_acquire_lock_recovers_from_poison() {
        let mutex = Arc::new(Mutex::new(1));
        let poisoner = Arc::clone(&mutex);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert!(mutex.is_poisoned());
        assert_eq!(*acquire_lock(&mutex), 1);
    }

    #[tokio::test]
    async fn test_get_connection_reuses_handle() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let a = manager.get_connection().await.unwrap();
        let b = manager.get_connection().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.fts_available());
        assert!(dir.path().join("minmo.db").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_initialization() {
        let dir = TempDir::new().unwrap();
        let manager = Arc::new(manager(&dir));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.get_connection().await })
            })
            .collect();

        let mut dbs = Vec::new();
        for handle in handles {
            dbs.push(handle.await.unwrap().unwrap());
        }
        assert!(dbs.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }

    #[tokio::test]
    async fn test_closed_handle_is_replaced() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let first = manager.get_connection().await.unwrap();
        first.close().await;
        assert!(!first.is_open());

        let err = first
            .call("get_entry", |_| Ok(()))
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        let second = manager.get_connection().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.is_open());
    }

    #[tokio::test]
    async fn test_reset_connection_returns_cached_handle() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        assert!(manager.reset_connection().is_none());
        let db = manager.get_connection().await.unwrap();
        let discarded = manager.reset_connection().unwrap();
        assert!(Arc::ptr_eq(&db, &discarded));
        assert!(manager.reset_connection().is_none());
    }

    #[tokio::test]
    async fn test_initialization_failure_is_not_cached() {
        let dir = TempDir::new().unwrap();
        // A plain file where the data directory should be makes open fail.
        let blocker = dir.path().join("data");
        std::fs::write(&blocker, b"").unwrap();
        let manager = ConnectionManager::new(
            DatabaseLayout::new(blocker.join("minmo.db")),
            InitConfig {
                max_retries: 1,
                retry_delay_ms: 0,
                settle_delay_ms: 0,
            },
        );

        let err = manager.get_connection().await.unwrap_err();
        assert!(matches!(err, Error::InitializationFailed(_)));

        std::fs::remove_file(&blocker).unwrap();
        assert!(manager.get_connection().await.is_ok());
    }

    #[tokio::test]
    async fn test_corrupt_file_fails_initialization_with_corruption() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("minmo.db"), [0xAB_u8; 4096]).unwrap();
        let manager = manager(&dir);

        let err = manager.get_connection().await.unwrap_err();
        assert!(err.is_corruption(), "unexpected error: {err}");

        let db = manager.recreate_database(Duration::ZERO).await.unwrap();
        assert!(db.ping().await);
        assert_eq!(manager.recoveries(), 1);
    }

    #[tokio::test]
    async fn test_recreate_database_starts_empty() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let db = manager.get_connection().await.unwrap();
        db.call("seed", |conn| {
            conn.execute(
                "INSERT INTO entries (id, created_at, recorded_at, audio_local_uri, updated_at)
                 VALUES ('a', 1, 1, 'file:///a.m4a', 1)",
                [],
            )
            .map_err(|e| storage_error("seed", &e))
        })
        .await
        .unwrap();

        let fresh = manager.recreate_database(Duration::ZERO).await.unwrap();
        let count: i64 = fresh
            .call("count", |conn| {
                conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
                    .map_err(|e| storage_error("count", &e))
            })
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(manager.recoveries(), 1);
        assert!(!db.is_open());
    }
}
