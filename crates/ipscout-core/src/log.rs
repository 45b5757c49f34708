//! # Log Subsystem
//!
//! Investigation logs written to the log directory:
//! - one append-only per-target log per `target` transition,
//!   named `<safe_target>_<timestamp>.log`
//! - one rolling session log per process run, `session_<timestamp>.log`,
//!   which survives target changes and can be truncated in place
//!
//! Every line has the form `[<YYYY-MM-DD HH:MM:SS>] [<tag>] <line>`, with
//! terminal escape sequences stripped. Files are flushed after each write.

use crate::primitives::{
    GRAPH_LOG_TAG, LOG_EXTENSION, SESSION_LOG_PREFIX, file_timestamp, log_timestamp,
};
use crate::target::sanitize;
use crate::ReconError;
use regex::Regex;
use std::borrow::Cow;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// ANSI/VT100 escape sequences (CSI and two-byte escapes).
static ANSI_ESCAPE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\x1B[@-_][0-?]*[ -/]*[@-~]").ok());

/// Remove terminal colour/control sequences.
#[must_use]
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    match ANSI_ESCAPE.as_ref() {
        Some(re) => re.replace_all(text, ""),
        None => Cow::Borrowed(text),
    }
}

/// Format a block of text as log lines.
///
/// Leading and trailing whitespace of the block is dropped; interior lines
/// (including blank ones) are kept, one output line each. A lone `\r`
/// ends a line just like `\n` and `\r\n`.
#[must_use]
pub fn format_lines(text: &str, tag: Option<&str>, timestamp: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let prefix = match tag {
        Some(tag) => format!("[{timestamp}] [{tag}]"),
        None => format!("[{timestamp}]"),
    };
    trimmed
        .split('\n')
        .flat_map(|line| line.strip_suffix('\r').unwrap_or(line).split('\r'))
        .map(|line| format!("{prefix} {}", strip_ansi(line)))
        .collect()
}

// =============================================================================
// LOG FILE
// =============================================================================

/// An append-only log file that is flushed after every write.
#[derive(Debug)]
pub struct LogFile {
    path: PathBuf,
    file: File,
}

impl LogFile {
    /// Open (or create) a log file in append mode.
    pub fn open_append(path: impl Into<PathBuf>) -> Result<Self, ReconError> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ReconError::IoError(format!("open log {}: {e}", path.display())))?;
        Ok(Self { path, file })
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append pre-formatted lines and flush.
    pub fn append_lines(&mut self, lines: &[String]) -> Result<(), ReconError> {
        if lines.is_empty() {
            return Ok(());
        }
        let mut block = lines.join("\n");
        block.push('\n');
        self.file.write_all(block.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }

    /// Truncate the file in place; later writes start at offset zero.
    pub fn truncate(&mut self) -> Result<(), ReconError> {
        self.file.flush()?;
        self.file.set_len(0)?;
        Ok(())
    }

    /// Read the whole file back.
    pub fn read_all(&mut self) -> Result<String, ReconError> {
        self.file.flush()?;
        Ok(fs::read_to_string(&self.path)?)
    }

    /// Copy the file verbatim to `dest`, replacing any existing file.
    pub fn copy_to(&mut self, dest: &Path) -> Result<u64, ReconError> {
        self.file.flush()?;
        Ok(fs::copy(&self.path, dest)?)
    }

    /// Flush and sync to disk.
    pub fn sync(&mut self) -> Result<(), ReconError> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Sync and release the handle.
    pub fn close(mut self) -> Result<(), ReconError> {
        self.sync()
    }
}

// =============================================================================
// LOG BOOK
// =============================================================================

/// The pair of log handles a session writes to.
#[derive(Debug)]
pub struct LogBook {
    dir: PathBuf,
    session: LogFile,
    target: Option<LogFile>,
}

impl LogBook {
    /// Create the log directory if needed and open a fresh session log.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ReconError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            ReconError::IoError(format!("cannot create log directory {}: {e}", dir.display()))
        })?;
        let path = unique_path(&dir, SESSION_LOG_PREFIX, &file_timestamp());
        let session = LogFile::open_append(path)?;
        tracing::debug!(path = %session.path().display(), "session log opened");
        Ok(Self {
            dir,
            session,
            target: None,
        })
    }

    /// The log directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the rolling session log.
    #[must_use]
    pub fn session_path(&self) -> &Path {
        self.session.path()
    }

    /// Path of the active per-target log, if any.
    #[must_use]
    pub fn target_path(&self) -> Option<&Path> {
        self.target.as_ref().map(LogFile::path)
    }

    /// Open a new per-target log, replacing the active one.
    ///
    /// `opening` is written to the new log and to the session log before
    /// the switch, so a failed write leaves the active log in place.
    /// Never reuses an existing file: a numeric suffix is added when the
    /// same target is set twice within one second.
    pub fn start_target_log(&mut self, target: &str, opening: &str) -> Result<&Path, ReconError> {
        let path = unique_path(&self.dir, &sanitize(target), &file_timestamp());
        let mut log = LogFile::open_append(path)?;
        let lines = format_lines(opening, None, &log_timestamp());
        log.append_lines(&lines)?;
        self.session.append_lines(&lines)?;
        self.replace_target(log)
    }

    /// Reopen an existing per-target log in append mode.
    ///
    /// The current log is left untouched when the file cannot be opened.
    pub fn resume_target_log(&mut self, path: &Path) -> Result<&Path, ReconError> {
        self.replace_target(LogFile::open_append(path)?)
    }

    fn replace_target(&mut self, log: LogFile) -> Result<&Path, ReconError> {
        if let Some(previous) = self.target.as_mut() {
            previous.sync()?;
        }
        Ok(self.target.insert(log).path())
    }

    /// Write text to both logs, each line tagged.
    pub fn write(&mut self, text: &str, tag: Option<&str>) -> Result<(), ReconError> {
        let lines = format_lines(text, tag, &log_timestamp());
        if let Some(target) = self.target.as_mut() {
            target.append_lines(&lines)?;
        }
        self.session.append_lines(&lines)
    }

    /// Append a graph audit line to the session log only.
    pub fn write_graph(&mut self, message: &str) -> Result<(), ReconError> {
        let lines = format_lines(message, Some(GRAPH_LOG_TAG), &log_timestamp());
        self.session.append_lines(&lines)
    }

    /// Contents of the per-target log.
    pub fn read_target(&mut self) -> Result<String, ReconError> {
        self.target
            .as_mut()
            .ok_or(ReconError::NoActiveLog)?
            .read_all()
    }

    /// Copy the per-target log into the log directory under `file_name`.
    ///
    /// Only the final path component of `file_name` is used.
    pub fn copy_target_as(&mut self, file_name: &str) -> Result<PathBuf, ReconError> {
        let name = Path::new(file_name)
            .file_name()
            .ok_or_else(|| ReconError::IoError(format!("invalid file name '{file_name}'")))?;
        let dest = self.dir.join(name);
        let target = self.target.as_mut().ok_or(ReconError::NoActiveLog)?;
        target.copy_to(&dest)?;
        Ok(dest)
    }

    /// Truncate the rolling session log in place.
    pub fn clear_session(&mut self) -> Result<(), ReconError> {
        self.session.truncate()
    }

    /// Flush and close both logs.
    pub fn close(self) -> Result<(), ReconError> {
        if let Some(target) = self.target {
            target.close()?;
        }
        self.session.close()
    }
}

/// `<dir>/<stem>_<timestamp>.log`, or `<stem>_<timestamp>-<n>.log` if taken.
fn unique_path(dir: &Path, stem: &str, timestamp: &str) -> PathBuf {
    let base = dir.join(format!("{stem}_{timestamp}.{LOG_EXTENSION}"));
    if !base.exists() {
        return base;
    }
    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("{stem}_{timestamp}-{n}.{LOG_EXTENSION}"));
        if !candidate.exists() {
            return candidate;
        }
        n = n.saturating_add(1);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn strip_ansi_removes_colour_codes() {
        assert_eq!(strip_ansi("\x1b[93mNote:\x1b[0m hi"), "Note: hi");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[test]
    fn format_lines_tags_every_line() {
        let lines = format_lines("\nfirst\n\x1b[92msecond\x1b[0m\n", Some("nmap"), "2025-04-15 17:57:26");
        assert_eq!(
            lines,
            vec![
                "[2025-04-15 17:57:26] [nmap] first".to_string(),
                "[2025-04-15 17:57:26] [nmap] second".to_string(),
            ]
        );
    }

    #[test]
    fn format_lines_without_tag_and_empty_input() {
        assert_eq!(
            format_lines("x", None, "ts"),
            vec!["[ts] x".to_string()]
        );
        assert!(format_lines("   \n ", Some("t"), "ts").is_empty());
    }

    #[test]
    fn carriage_returns_split_progress_output() {
        let lines = format_lines("10%\r50%\r100% done\r\nfinished", Some("nmap"), "ts");
        assert_eq!(
            lines,
            vec![
                "[ts] [nmap] 10%".to_string(),
                "[ts] [nmap] 50%".to_string(),
                "[ts] [nmap] 100% done".to_string(),
                "[ts] [nmap] finished".to_string(),
            ]
        );
    }

    #[test]
    fn opening_line_lands_in_both_logs() {
        let dir = TempDir::new().expect("tempdir");
        let mut book = LogBook::open(dir.path()).expect("open");
        book.start_target_log("example.com", "[target] Target set to example.com (domain)")
            .expect("target log");

        assert!(book.read_target().expect("read").contains("Target set to example.com"));
        let session = fs::read_to_string(book.session_path()).expect("read session");
        assert!(session.contains("Target set to example.com"));
    }

    #[test]
    fn failed_switch_keeps_active_log() {
        let dir = TempDir::new().expect("tempdir");
        let logs = dir.path().join("log");
        let mut book = LogBook::open(&logs).expect("open");
        let first = book
            .start_target_log("1.1.1.1", "")
            .expect("first")
            .to_path_buf();

        fs::remove_dir_all(&logs).expect("remove log dir");
        assert!(book.start_target_log("example.org", "switch").is_err());
        assert_eq!(book.target_path(), Some(first.as_path()));
    }

    #[test]
    fn write_goes_to_both_logs() {
        let dir = TempDir::new().expect("tempdir");
        let mut book = LogBook::open(dir.path()).expect("open");
        book.start_target_log("example.com", "").expect("target log");
        book.write("hello", Some("ping")).expect("write");

        let target = book.read_target().expect("read");
        let session = fs::read_to_string(book.session_path()).expect("read session");
        assert!(target.contains("[ping] hello"));
        assert!(session.contains("[ping] hello"));
    }

    #[test]
    fn graph_lines_go_to_session_log_only() {
        let dir = TempDir::new().expect("tempdir");
        let mut book = LogBook::open(dir.path()).expect("open");
        book.start_target_log("example.com", "").expect("target log");
        book.write_graph("Added node: a (type=ip)").expect("write");

        assert!(!book.read_target().expect("read").contains("Added node"));
        let session = fs::read_to_string(book.session_path()).expect("read session");
        assert!(session.contains("[graph] Added node: a (type=ip)"));
    }

    #[test]
    fn same_target_twice_gets_distinct_files() {
        let dir = TempDir::new().expect("tempdir");
        let mut book = LogBook::open(dir.path()).expect("open");
        let first = book
            .start_target_log("example.com", "")
            .expect("first")
            .to_path_buf();
        let second = book
            .start_target_log("example.com", "")
            .expect("second")
            .to_path_buf();
        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());
    }

    #[test]
    fn clear_session_truncates_and_keeps_writing() {
        let dir = TempDir::new().expect("tempdir");
        let mut book = LogBook::open(dir.path()).expect("open");
        book.write("before", None).expect("write");
        book.clear_session().expect("clear");
        book.write("after", None).expect("write");

        let session = fs::read_to_string(book.session_path()).expect("read");
        assert!(!session.contains("before"));
        assert!(session.contains("after"));
    }

    #[test]
    fn read_target_without_log_errors() {
        let dir = TempDir::new().expect("tempdir");
        let mut book = LogBook::open(dir.path()).expect("open");
        assert!(matches!(book.read_target(), Err(ReconError::NoActiveLog)));
    }

    #[test]
    fn copy_target_as_strips_directories() {
        let dir = TempDir::new().expect("tempdir");
        let mut book = LogBook::open(dir.path()).expect("open");
        book.start_target_log("1.2.3.4", "").expect("target");
        book.write("evidence", None).expect("write");

        let dest = book.copy_target_as("../escape.log").expect("copy");
        assert_eq!(dest, dir.path().join("escape.log"));
        assert!(fs::read_to_string(dest).expect("read").contains("evidence"));
    }
}
