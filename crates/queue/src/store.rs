use crate::codec::decode_signal;
use sigbridge_core::Signal;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Subdirectory for delivered signals. Archival is retention, not removal —
/// the bridge never deletes a record.
const ARCHIVE_DIR: &str = "archived";
/// Subdirectory for records that failed to parse.
const FAILED_DIR: &str = "failed";

const JSON_SUFFIX: &str = ".sig.json";
const LEGACY_SUFFIX: &str = ".sig";

/// Queue store failures. An empty queue is `Ok(None)` from `pop_next`, never
/// an error.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Directory-backed FIFO of pending signal files.
///
/// The same-filesystem rename into `archived/` is the commit point: whichever
/// caller wins the rename owns the record. The in-process mutex only spares
/// concurrent callers redundant directory scans; correctness does not depend
/// on it, so multiple processes may share one queue directory. Clones share
/// that mutex.
#[derive(Clone)]
pub struct FileSignalQueue {
    root: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl FileSignalQueue {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Pending candidates in delivery order: structured records first, then
    /// legacy ones, each set sorted by filename (producers embed a sortable
    /// timestamp, so this is FIFO by construction).
    pub fn pending(&self) -> Result<Vec<PathBuf>, QueueError> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root)?;
            return Ok(Vec::new());
        }

        let mut json_files = Vec::new();
        let mut legacy_files = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.ends_with(JSON_SUFFIX) {
                json_files.push(path);
            } else if name.ends_with(LEGACY_SUFFIX) {
                legacy_files.push(path);
            }
        }
        json_files.sort();
        legacy_files.sort();
        json_files.extend(legacy_files);
        Ok(json_files)
    }

    /// Atomically take the earliest pending signal, archiving its file.
    ///
    /// Ordering per candidate: rename pending -> archived first (the commit
    /// point), then parse the archived copy. A candidate someone else claimed
    /// is skipped; a candidate that will not parse is moved to `failed/` and
    /// the scan continues. Only systemic I/O failure surfaces as an error.
    pub fn pop_next(&self) -> Result<Option<Signal>, QueueError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        for path in self.pending()? {
            let archived = match self.claim(&path) {
                Ok(archived) => archived,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    // Another consumer won the rename.
                    debug!(file = %path.display(), "candidate already claimed");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let raw = fs::read_to_string(&archived)?;
            match decode_signal(&raw) {
                Ok(signal) => {
                    info!(
                        file = %path.display(),
                        id = %signal.id,
                        symbol = %signal.symbol,
                        "signal dequeued and archived"
                    );
                    return Ok(Some(signal));
                }
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "unparsable signal moved to failed");
                    self.quarantine(&archived)?;
                }
            }
        }
        Ok(None)
    }

    /// Rename a pending file into the archive, appending a `_<n>` suffix
    /// rather than overwriting an existing archive entry.
    fn claim(&self, pending: &Path) -> io::Result<PathBuf> {
        let archive = self.root.join(ARCHIVE_DIR);
        fs::create_dir_all(&archive)?;
        let dest = collision_free(&archive, pending)?;
        fs::rename(pending, &dest)?;
        Ok(dest)
    }

    /// Move an archived-but-unparsable record to the failed directory.
    fn quarantine(&self, archived: &Path) -> io::Result<()> {
        let failed = self.root.join(FAILED_DIR);
        fs::create_dir_all(&failed)?;
        let dest = collision_free(&failed, archived)?;
        fs::rename(archived, dest)
    }
}

/// First non-existing destination for `src`'s filename inside `dir`:
/// `name.sig.json`, then `name_1.sig.json`, `name_2.sig.json`, ...
fn collision_free(dir: &Path, src: &Path) -> io::Result<PathBuf> {
    let name = src
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "non-utf8 file name"))?;
    let (stem, suffix) = match name.find('.') {
        Some(idx) => name.split_at(idx),
        None => (name, ""),
    };

    let mut dest = dir.join(name);
    let mut counter = 1;
    while dest.exists() {
        dest = dir.join(format!("{}_{}{}", stem, counter, suffix));
        counter += 1;
    }
    Ok(dest)
}
