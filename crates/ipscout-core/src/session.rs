//! # Session Module
//!
//! The session/target state machine.
//!
//! States: no target, or `TargetSet(target, target_type)`. Every `target`
//! transition is a full replace: a new per-target log is opened and the
//! old target is dropped. Only the shared graph and the rolling session
//! log carry over.
//!
//! A `Session` is owned by the `Shell` behind a `SessionHandle`, which is
//! also the host interface modules receive at construction.

use crate::log::LogBook;
use crate::module::Host;
use crate::save::{SaveEntry, SaveRecord, SaveStore};
use crate::{ReconError, Target};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Where a session keeps its files.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    pub log_dir: PathBuf,
    pub save_dir: PathBuf,
}

impl SessionPaths {
    pub fn new(log_dir: impl Into<PathBuf>, save_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            save_dir: save_dir.into(),
        }
    }
}

/// The investigation session.
#[derive(Debug)]
pub struct Session {
    target: Option<Target>,
    logs: LogBook,
    saves: SaveStore,
}

impl Session {
    /// Open a session: creates both directories and the rolling session log.
    pub fn open(paths: &SessionPaths) -> Result<Self, ReconError> {
        let logs = LogBook::open(&paths.log_dir)?;
        let saves = SaveStore::open(&paths.save_dir)?;
        Ok(Self {
            target: None,
            logs,
            saves,
        })
    }

    /// The current target, if any.
    #[must_use]
    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    /// Transition to a new target.
    ///
    /// Classifies the value, opens a fresh per-target log and records the
    /// change in both logs. On failure the previous state is kept.
    pub fn set_target(&mut self, value: &str) -> Result<&Target, ReconError> {
        let target = Target::new(value);
        let opening = format!("[target] Target set to {} ({})", target.value, target.kind);
        self.logs.start_target_log(&target.value, &opening)?;
        tracing::debug!(target = %target.value, kind = %target.kind, "target set");
        Ok(self.target.insert(target))
    }

    /// Append text to both logs, tagged with the module name when given.
    pub fn log(&mut self, text: &str, module: Option<&str>) -> Result<(), ReconError> {
        self.logs.write(text, module)
    }

    /// Append a line to the graph audit trail (session log only).
    pub fn log_graph(&mut self, message: &str) -> Result<(), ReconError> {
        self.logs.write_graph(message)
    }

    /// Log directory.
    #[must_use]
    pub fn log_dir(&self) -> &Path {
        self.logs.dir()
    }

    /// Path of the active per-target log.
    #[must_use]
    pub fn target_log_path(&self) -> Option<&Path> {
        self.logs.target_path()
    }

    /// Path of the rolling session log.
    #[must_use]
    pub fn session_log_path(&self) -> &Path {
        self.logs.session_path()
    }

    /// Contents of the per-target log.
    pub fn read_target_log(&mut self) -> Result<String, ReconError> {
        self.logs.read_target()
    }

    /// Copy the per-target log to `file_name` in the log directory.
    pub fn save_log_as(&mut self, file_name: &str) -> Result<PathBuf, ReconError> {
        self.logs.copy_target_as(file_name)
    }

    /// Truncate the rolling session log.
    pub fn clear_session_log(&mut self) -> Result<(), ReconError> {
        self.logs.clear_session()
    }

    /// Persist `(target, target_type, log_path)`.
    pub fn save(&mut self) -> Result<PathBuf, ReconError> {
        let target = self.target.as_ref().ok_or(ReconError::NoActiveInvestigation)?;
        let log_path = self
            .logs
            .target_path()
            .ok_or(ReconError::NoActiveInvestigation)?;
        let log_path = std::path::absolute(log_path)?;
        let record = SaveRecord {
            target: target.value.clone(),
            target_type: target.kind,
            log_path,
        };
        let path = self.saves.write(&record)?;
        self.logs.write("[save] Investigation session saved.", None)?;
        Ok(path)
    }

    /// Restore a saved session, or the most recent one when `name` is `None`.
    ///
    /// The record is parsed and its log reopened before anything is
    /// replaced, so a bad save leaves the current session as it was.
    pub fn load(&mut self, name: Option<&str>) -> Result<Target, ReconError> {
        let entry = self.saves.resolve(name)?;
        let record = self.saves.read(&entry.path)?;
        self.logs.resume_target_log(&record.log_path)?;
        let target = Target::with_kind(record.target, record.target_type);
        tracing::debug!(save = %entry.name, target = %target.value, "session loaded");
        self.target = Some(target.clone());
        self.logs.write("[load] Investigation session loaded.", None)?;
        Ok(target)
    }

    /// Save records, most recent first.
    pub fn list_saves(&self) -> Result<Vec<SaveEntry>, ReconError> {
        self.saves.list()
    }

    /// Flush and close both logs.
    pub fn close(self) -> Result<(), ReconError> {
        self.logs.close()
    }
}

// =============================================================================
// SESSION HANDLE
// =============================================================================

/// Shared, re-entrancy-checked access to the session.
///
/// Borrows are short-lived and never held across a module's `run`, so a
/// module calling back into the host always finds the session free.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Rc<RefCell<Option<Session>>>,
}

impl SessionHandle {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Some(session))),
        }
    }

    /// Run `f` with mutable access to the session.
    ///
    /// Fails with `Busy` on re-entrant use and with `IoError` after `close`.
    pub fn with<T>(
        &self,
        f: impl FnOnce(&mut Session) -> Result<T, ReconError>,
    ) -> Result<T, ReconError> {
        let mut guard = self
            .inner
            .try_borrow_mut()
            .map_err(|_| ReconError::Busy("session"))?;
        let session = guard
            .as_mut()
            .ok_or_else(|| ReconError::IoError("session is closed".to_string()))?;
        f(session)
    }

    /// Current target, cloned.
    pub fn target(&self) -> Option<Target> {
        self.with(|s| Ok(s.target().cloned())).ok().flatten()
    }

    /// Close the session; later calls fail.
    pub fn close(&self) -> Result<(), ReconError> {
        let session = self
            .inner
            .try_borrow_mut()
            .map_err(|_| ReconError::Busy("session"))?
            .take();
        match session {
            Some(session) => session.close(),
            None => Ok(()),
        }
    }

    /// True once `close` has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.try_borrow().map(|s| s.is_none()).unwrap_or(false)
    }
}

impl Host for SessionHandle {
    fn log(&self, text: &str, module: Option<&str>) -> Result<(), ReconError> {
        self.with(|s| s.log(text, module))
    }

    fn log_graph(&self, message: &str) -> Result<(), ReconError> {
        self.with(|s| s.log_graph(message))
    }

    fn request_target(&self, value: &str) -> Result<Target, ReconError> {
        self.with(|s| s.set_target(value).cloned())
    }

    fn target_log_path(&self) -> Option<PathBuf> {
        self.with(|s| Ok(s.target_log_path().map(Path::to_path_buf)))
            .ok()
            .flatten()
    }

    fn log_dir(&self) -> PathBuf {
        self.with(|s| Ok(s.log_dir().to_path_buf()))
            .unwrap_or_default()
    }
}

// =============================================================================
// TESTS
// =============================================================================
