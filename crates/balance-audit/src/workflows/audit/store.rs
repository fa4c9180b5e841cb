//! Append-only persistence of closed audit sessions.

use std::collections::{HashSet, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use uuid::Uuid;

use super::domain::AuditSession;

/// Storage abstraction so the service can be exercised in isolation.
pub trait SessionStore: Send + Sync {
    fn append(&self, session: &AuditSession) -> Result<(), StoreError>;
    /// Most recent first: `started_at` descending, later appends first on ties.
    fn list_recent(&self, limit: usize) -> Result<Vec<AuditSession>, StoreError>;
    fn fetch(&self, id: Uuid) -> Result<Option<AuditSession>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session already stored")]
    Conflict,
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    #[error("session store i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("session record could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// `sessions` is in append order; returns the `limit` most recent.
fn most_recent(sessions: impl DoubleEndedIterator<Item = AuditSession>, limit: usize) -> Vec<AuditSession> {
    let mut newest_first: Vec<AuditSession> = sessions.rev().collect();
    newest_first.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    newest_first.truncate(limit);
    newest_first
}

/// Ring buffer kept in process memory.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    capacity: Option<usize>,
    sessions: Mutex<VecDeque<AuditSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most `capacity` sessions, evicting the oldest append.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            sessions: Mutex::new(VecDeque::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().expect("session store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for InMemorySessionStore {
    fn append(&self, session: &AuditSession) -> Result<(), StoreError> {
        let mut guard = self.sessions.lock().expect("session store mutex poisoned");
        if guard.iter().any(|stored| stored.id == session.id) {
            return Err(StoreError::Conflict);
        }
        if let Some(capacity) = self.capacity {
            while guard.len() >= capacity {
                guard.pop_front();
            }
        }
        guard.push_back(session.clone());
        Ok(())
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<AuditSession>, StoreError> {
        let guard = self.sessions.lock().expect("session store mutex poisoned");
        Ok(most_recent(guard.iter().cloned(), limit))
    }

    fn fetch(&self, id: Uuid) -> Result<Option<AuditSession>, StoreError> {
        let guard = self.sessions.lock().expect("session store mutex poisoned");
        Ok(guard.iter().find(|session| session.id == id).cloned())
    }
}

/// Append-only file holding one JSON session per line.
#[derive(Debug)]
pub struct JsonLinesSessionStore {
    path: PathBuf,
    state: Mutex<JsonLinesState>,
}

#[derive(Debug)]
struct JsonLinesState {
    file: File,
    ids: HashSet<Uuid>,
    /// Set when a failed append could not be rolled back.
    torn: Option<String>,
}

impl JsonLinesSessionStore {
    /// Opens or creates the file and indexes the ids already stored.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let log = read_log(&path)?;
        if file.metadata()?.len() > log.clean_len {
            tracing::warn!(
                path = %path.display(),
                kept_bytes = log.clean_len,
                "truncating partial session record"
            );
            file.set_len(log.clean_len)?;
        }
        let ids = log.sessions.into_iter().map(|session| session.id).collect();

        tracing::debug!(path = %path.display(), "session store opened");
        Ok(Self {
            path,
            state: Mutex::new(JsonLinesState {
                file,
                ids,
                torn: None,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Sessions read from the file, and the byte length up to the last complete line.
struct SessionLog {
    sessions: Vec<AuditSession>,
    clean_len: u64,
}

fn read_sessions(path: &Path) -> Result<Vec<AuditSession>, StoreError> {
    Ok(read_log(path)?.sessions)
}

/// A trailing line without a newline is an interrupted append and is skipped.
fn read_log(path: &Path) -> Result<SessionLog, StoreError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(SessionLog {
                sessions: Vec::new(),
                clean_len: 0,
            })
        }
        Err(err) => return Err(err.into()),
    };
    let mut reader = BufReader::new(file);
    let mut sessions = Vec::new();
    let mut clean_len = 0u64;
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 {
            break;
        }
        if line.last() != Some(&b'\n') {
            tracing::warn!(
                path = %path.display(),
                bytes = read,
                "skipping partial session record"
            );
            break;
        }
        clean_len += read as u64;
        let text = std::str::from_utf8(&line).map_err(|err| {
            StoreError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
        })?;
        if text.trim().is_empty() {
            continue;
        }
        sessions.push(serde_json::from_str(text)?);
    }
    Ok(SessionLog {
        sessions,
        clean_len,
    })
}

impl SessionStore for JsonLinesSessionStore {
    fn append(&self, session: &AuditSession) -> Result<(), StoreError> {
        let mut record = serde_json::to_vec(session)?;
        record.push(b'\n');

        let mut state = self.state.lock().expect("session store mutex poisoned");
        if let Some(cause) = &state.torn {
            return Err(StoreError::Unavailable(format!(
                "partial record left by a failed append: {cause}"
            )));
        }
        if state.ids.contains(&session.id) {
            return Err(StoreError::Conflict);
        }
        let len = state.file.metadata()?.len();
        if let Err(err) = write_record(&mut state.file, &record) {
            if let Err(rollback) = state.file.set_len(len) {
                tracing::error!(
                    path = %self.path.display(),
                    error = %rollback,
                    "failed to roll back partial session record"
                );
                state.torn = Some(rollback.to_string());
            }
            return Err(err.into());
        }
        state.ids.insert(session.id);
        Ok(())
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<AuditSession>, StoreError> {
        let _state = self.state.lock().expect("session store mutex poisoned");
        Ok(most_recent(read_sessions(&self.path)?.into_iter(), limit))
    }

    fn fetch(&self, id: Uuid) -> Result<Option<AuditSession>, StoreError> {
        let state = self.state.lock().expect("session store mutex poisoned");
        if !state.ids.contains(&id) {
            return Ok(None);
        }
        Ok(read_sessions(&self.path)?
            .into_iter()
            .find(|session| session.id == id))
    }
}

fn write_record(file: &mut impl Write, record: &[u8]) -> std::io::Result<()> {
    file.write_all(record)?;
    file.flush()
}
