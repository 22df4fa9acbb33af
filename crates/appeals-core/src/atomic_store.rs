//! Lock-scoped JSONL appeal storage.
//!
//! Layout: one JSONL file per scope at `<root>/<year>/section-<id>.jsonl`.
//! Writers to a scope first queue on an in-process mutex, then take an
//! advisory exclusive lock on the sibling `.lock` file so writers in other
//! processes queue as well. A lock still held elsewhere when the timeout runs
//! out surfaces as [`StoreError::LockBusy`], which callers may retry.
//!
//! A commit writes a synced temp sibling, renames it over the scope file and
//! syncs the year directory, so a committed number survives a crash.

use crate::appeal::{Appeal, AppealId, Scope};
use crate::config::DEFAULT_LOCK_TIMEOUT_MS;
use crate::memory::MemoryStore;
use crate::store::{AppealStore, ScopeMutationError, StoreError, ensure_single_scope};
use fs2::FileExt;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt::Display;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const LOCK_POLL: Duration = Duration::from_millis(2);

pub fn scope_lock_path(scope_path: &Path) -> PathBuf {
    let mut path: OsString = scope_path.as_os_str().to_os_string();
    path.push(".lock");
    PathBuf::from(path)
}

type WriterQueue = Arc<Mutex<()>>;

/// Directory-backed store with one file and one lock per scope.
#[derive(Debug, Clone)]
pub struct JsonlStore {
    root: PathBuf,
    lock_timeout: Duration,
    writers: Arc<Mutex<HashMap<Scope, WriterQueue>>>,
}

impl JsonlStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            writers: Arc::default(),
        }
    }

    /// How long to wait for another process to release a scope lock.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scope_path(&self, scope: &Scope) -> PathBuf {
        self.root
            .join(scope.year.to_string())
            .join(format!("section-{}.jsonl", scope.section))
    }

    /// Load every row of `scope` without taking the lock.
    ///
    /// Writers replace files by rename, so this sees a committed state.
    pub fn load_scope(&self, scope: &Scope) -> Result<MemoryStore, StoreError> {
        read_scope_file(&self.scope_path(scope))
    }

    fn writer_queue(&self, scope: &Scope) -> Result<WriterQueue, StoreError> {
        let mut writers = self
            .writers
            .lock()
            .map_err(|_| StoreError::ShardTablePoisoned)?;
        Ok(writers.entry(*scope).or_default().clone())
    }

    fn scope_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut files = Vec::new();
        let years = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(files),
            Err(err) => return Err(io_error(&self.root, err)),
        };

        for year in years {
            let year = year.map_err(|e| io_error(&self.root, e))?.path();
            if !year.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&year).map_err(|e| io_error(&year, e))? {
                let path = entry.map_err(|e| io_error(&year, e))?.path();
                if path.extension().is_some_and(|ext| ext == "jsonl") {
                    files.push(path);
                }
            }
        }
        files.sort();
        Ok(files)
    }
}

impl AppealStore for JsonlStore {
    fn mutate_scope<T, E, F>(&self, scope: &Scope, mutator: F) -> Result<T, ScopeMutationError<E>>
    where
        F: FnOnce(&mut MemoryStore) -> Result<(T, bool), E>,
    {
        let queue = self.writer_queue(scope)?;
        // The queue guards no data; a panicked writer committed nothing.
        let _queued = queue.lock().unwrap_or_else(PoisonError::into_inner);

        let path = self.scope_path(scope);
        let _lock = ScopeFileLock::acquire(&path, self.lock_timeout)?;

        let mut rows = read_scope_file(&path)?;
        let (value, changed) = mutator(&mut rows).map_err(ScopeMutationError::Mutation)?;
        if changed {
            ensure_single_scope(&rows, scope)?;
            write_scope_file(&path, &rows)?;
            debug!(%scope, rows = rows.len(), path = %path.display(), "committed scope file");
        }
        Ok(value)
    }

    fn read_scope<T, F>(&self, scope: &Scope, reader: F) -> Result<T, StoreError>
    where
        F: FnOnce(&MemoryStore) -> T,
    {
        let rows = self.load_scope(scope)?;
        Ok(reader(&rows))
    }

    fn find(&self, id: &AppealId) -> Result<Option<Appeal>, StoreError> {
        for path in self.scope_files()? {
            let rows = read_scope_file(&path)?;
            if let Some(appeal) = rows.appeal(id) {
                return Ok(Some(appeal.clone()));
            }
        }
        Ok(None)
    }
}

/// Parse a scope file. A missing file is an empty scope.
fn read_scope_file(path: &Path) -> Result<MemoryStore, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(MemoryStore::default()),
        Err(err) if err.kind() == ErrorKind::InvalidData => {
            return Err(corrupt(path, 0, "not valid UTF-8"));
        }
        Err(err) => return Err(io_error(path, err)),
    };

    let mut rows = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        if line.contains('\0') {
            return Err(corrupt(path, line_no, "contains NUL byte"));
        }
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row: Appeal = serde_json::from_str(line).map_err(|e| corrupt(path, line_no, e))?;
        rows.push(row);
    }
    Ok(MemoryStore::from_appeals(rows))
}

/// Durably replace the scope file with `rows`.
fn write_scope_file(path: &Path, rows: &MemoryStore) -> Result<(), StoreError> {
    let mut body = String::new();
    for row in rows.appeals() {
        let line = serde_json::to_string(row).map_err(|e| StoreError::Encode(e.to_string()))?;
        body.push_str(&line);
        body.push('\n');
    }

    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;

    let mut staging: OsString = path.as_os_str().to_os_string();
    staging.push(format!(".tmp.{}", std::process::id()));
    let staging = PathBuf::from(staging);
    let committed = write_synced(&staging, body.as_bytes())
        .and_then(|()| fs::rename(&staging, path).map_err(|e| io_error(path, e)));
    if let Err(err) = committed {
        let _ = fs::remove_file(&staging);
        return Err(err);
    }

    File::open(dir)
        .and_then(|handle| handle.sync_all())
        .map_err(|e| io_error(dir, e))
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut file = File::create(path).map_err(|e| io_error(path, e))?;
    file.write_all(bytes).map_err(|e| io_error(path, e))?;
    file.flush().map_err(|e| io_error(path, e))?;
    file.sync_all().map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, err: impl Display) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

fn corrupt(path: &Path, line: usize, message: impl Display) -> StoreError {
    StoreError::Corrupt {
        path: path.display().to_string(),
        line,
        message: message.to_string(),
    }
}

/// Exclusive advisory lock on a scope's `.lock` file, released on drop.
///
/// The lock file itself stays on disk; only the lock on it comes and goes.
struct ScopeFileLock {
    file: File,
}

impl ScopeFileLock {
    fn acquire(scope_path: &Path, timeout: Duration) -> Result<Self, StoreError> {
        let lock_path = scope_lock_path(scope_path);
        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| lock_io(&lock_path, e))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| lock_io(&lock_path, e))?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Self { file }),
                Err(err) if err.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                    if Instant::now() >= deadline {
                        return Err(StoreError::LockBusy {
                            lock_path: lock_path.display().to_string(),
                        });
                    }
                    thread::sleep(LOCK_POLL);
                }
                Err(err) => return Err(lock_io(&lock_path, err)),
            }
        }
    }
}

impl Drop for ScopeFileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn lock_io(lock_path: &Path, err: impl Display) -> StoreError {
    StoreError::LockIo {
        lock_path: lock_path.display().to_string(),
        message: err.to_string(),
    }
}
