use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use crate::errors::AuditError;
use super::schema::{CREATE_TABLES, SCHEMA_VERSION};
use tracing::{debug, info, warn};

/// Handle to the run store. Cheap to clone; all clones share one connection,
/// so statements are serialized.
#[derive(Clone)]
pub struct RunStore {
    pub(crate) conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl RunStore {
    /// Open (or create) the store at `path`. A file that cannot be read as a
    /// store of the current schema is moved aside and replaced by an empty one.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        match Self::open_file(path) {
            Ok(store) => Ok(store),
            Err(e) if path.exists() => {
                let quarantined = quarantine_path(path);
                warn!(
                    path = %path.display(),
                    moved_to = %quarantined.display(),
                    error = %e,
                    "Store snapshot unreadable, starting with an empty store"
                );
                std::fs::rename(path, &quarantined)?;
                for sidecar in ["-wal", "-shm"] {
                    let mut p = path.as_os_str().to_owned();
                    p.push(sidecar);
                    let sidecar_path = PathBuf::from(p);
                    match std::fs::remove_file(&sidecar_path) {
                        Ok(()) => {}
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => warn!(
                            path = %sidecar_path.display(),
                            error = %e,
                            "Failed to remove stale store sidecar"
                        ),
                    }
                }
                Self::open_file(path)
            }
            Err(e) => Err(e),
        }
    }

    pub fn in_memory() -> Result<Self, AuditError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AuditError::db("Failed to open in-memory store", e))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| AuditError::db("Failed to set pragmas", e))?;
        let store = Self { conn: Arc::new(Mutex::new(conn)), path: None };
        store.initialize()?;
        Ok(store)
    }

    fn open_file(path: &Path) -> Result<Self, AuditError> {
        let conn = Connection::open(path)
            .map_err(|e| AuditError::db("Failed to open store", e))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| AuditError::db("Failed to set pragmas", e))?;

        let check: String = conn
            .query_row("PRAGMA quick_check", [], |row| row.get(0))
            .map_err(|e| AuditError::db("Integrity check failed", e))?;
        if check != "ok" {
            return Err(AuditError::Database(format!("Integrity check reported: {}", check)));
        }

        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(|e| AuditError::db("Failed to read schema version", e))?;
        if version != 0 && version != SCHEMA_VERSION {
            return Err(AuditError::Database(format!(
                "Store schema version {} is not supported (expected {})",
                version, SCHEMA_VERSION
            )));
        }

        let store = Self { conn: Arc::new(Mutex::new(conn)), path: Some(path.to_path_buf()) };
        store.initialize()?;
        info!(path = %path.display(), "Run store opened");
        Ok(store)
    }

    fn initialize(&self) -> Result<(), AuditError> {
        let conn = self.lock()?;
        conn.execute_batch(CREATE_TABLES)
            .map_err(|e| AuditError::db("Failed to create tables", e))?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(|e| AuditError::db("Failed to write schema version", e))?;
        Ok(())
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, AuditError> {
        self.conn
            .lock()
            .map_err(|_| AuditError::Internal("Store connection mutex poisoned".into()))
    }

    /// Flush the write-ahead log into the main file. Call once on shutdown.
    pub fn close(&self) -> Result<(), AuditError> {
        if self.path.is_none() {
            return Ok(());
        }
        let conn = self.lock()?;
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
            .map_err(|e| AuditError::db("WAL checkpoint failed", e))?;
        debug!("Run store flushed");
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn quarantine_path(path: &Path) -> PathBuf {
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".corrupt-{}", stamp));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("audit.db");
        let store = RunStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), Some(path.as_path()));
        store.close().unwrap();
    }

    #[test]
    fn test_open_quarantines_corrupted_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.db");
        std::fs::write(&path, vec![0xAB_u8; 4096]).unwrap();

        let store = RunStore::open(&path).unwrap();
        assert!(store.list_runs(10, 0).unwrap().is_empty());

        let quarantined: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
            .collect();
        assert_eq!(quarantined.len(), 1);
    }

    #[test]
    fn test_quarantine_drops_stale_wal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.db");
        let wal = dir.path().join("audit.db-wal");
        let junk = vec![0xCD_u8; 512];
        std::fs::write(&path, vec![0xAB_u8; 4096]).unwrap();
        std::fs::write(&wal, &junk).unwrap();

        let store = RunStore::open(&path).unwrap();
        assert!(store.list_runs(10, 0).unwrap().is_empty());
        // The new store may create its own WAL, but never keeps the stale bytes
        assert!(std::fs::read(&wal).map_or(true, |bytes| bytes != junk));
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.db");
        let run_id = {
            let store = RunStore::open(&path).unwrap();
            let run = store.create_run(crate::db::runs::tests::new_run()).unwrap();
            store.close().unwrap();
            run.id
        };
        let store = RunStore::open(&path).unwrap();
        assert!(store.get_run(&run_id).unwrap().is_some());
    }
}
