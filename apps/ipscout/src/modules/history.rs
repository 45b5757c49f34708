//! `history`: previous investigation targets, recovered from per-target
//! log file names (`<target>_<YYYY-MM-DD-HH-MM-SS>.log`).

use chrono::NaiveDateTime;
use colored::Colorize;
use ipscout_core::primitives::{FILE_TIMESTAMP_FORMAT, LOG_EXTENSION, LOG_TIMESTAMP_FORMAT};
use ipscout_core::{Module, ModuleContext, ModuleError, TargetType};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

const HELP: &str = "history: List previous investigation targets and select one.\n\
Usage:\n  \
history                → show up to 50 recent targets\n  \
history <number>       → select that target from last list\n  \
history <filter-text>  → fuzzy search by domain or timestamp\n\
Note: URLs are excluded from this list.\n\
Supported target types: none";

const MAX_LISTED: usize = 50;
const MAX_TARGET_LEN: usize = 100;
const STAMP_LEN: usize = 19;

/// A past target and the time its most recent log was opened.
pub type HistoryEntry = (String, NaiveDateTime);

/// Split a log file stem into target and start time.
///
/// A `-N` collision suffix after the stamp is ignored. Session logs, URL
/// targets and anything without a dot are rejected.
pub fn parse_log_name(stem: &str) -> Option<HistoryEntry> {
    let (target, stamp) = stem.rsplit_once('_')?;
    if target.starts_with("http") || !target.contains('.') || target.len() > MAX_TARGET_LEN {
        return None;
    }
    let stamp = stamp.get(..STAMP_LEN)?;
    let when = NaiveDateTime::parse_from_str(stamp, FILE_TIMESTAMP_FORMAT).ok()?;
    Some((target.to_string(), when))
}

/// Newest entry per target, newest first.
pub fn scan_history(dir: &Path) -> std::io::Result<Vec<HistoryEntry>> {
    let mut latest: HashMap<String, NaiveDateTime> = HashMap::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(LOG_EXTENSION) {
            continue;
        }
        let Some((target, when)) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(parse_log_name)
        else {
            continue;
        };
        latest
            .entry(target)
            .and_modify(|t| *t = (*t).max(when))
            .or_insert(when);
    }
    let mut history: Vec<HistoryEntry> = latest.into_iter().collect();
    history.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(history)
}

/// Entries whose target or formatted time contains `search`.
pub fn search_history(history: &[HistoryEntry], search: &str) -> Vec<HistoryEntry> {
    let search = search.to_lowercase();
    history
        .iter()
        .filter(|(target, when)| {
            target.to_lowercase().contains(&search)
                || when.format(LOG_TIMESTAMP_FORMAT).to_string().contains(&search)
        })
        .cloned()
        .collect()
}

pub struct History {
    ctx: ModuleContext,
    last_results: Option<Vec<HistoryEntry>>,
}

impl History {
    pub fn new(ctx: ModuleContext) -> Self {
        Self {
            ctx,
            last_results: None,
        }
    }

    fn select(
        &self,
        choice: &str,
        full: &[HistoryEntry],
        out: &mut dyn Write,
    ) -> Result<(), ModuleError> {
        let capped = &full[..full.len().min(MAX_LISTED)];
        let source = self.last_results.as_deref().unwrap_or(capped);
        let picked = choice
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|idx| source.get(idx))
            .map(|(target, _)| target.clone());
        let Some(new_target) = picked else {
            writeln!(out, "{} Selection {choice} out of range.", "Error:".red())?;
            return Ok(());
        };

        writeln!(out, "{} {new_target}", "Switching to target:".green())?;
        self.ctx.request_target(&new_target)?;
        self.ctx
            .log(&format!("[history] Target changed to {new_target} via history."), None)?;
        Ok(())
    }
}

impl Module for History {
    fn targets(&self) -> &[TargetType] {
        &[]
    }

    fn help(&self) -> &str {
        HELP
    }

    fn run(
        &mut self,
        _target: Option<&str>,
        args: &[String],
        out: &mut dyn Write,
    ) -> Result<(), ModuleError> {
        let dir = self.ctx.host().log_dir();
        if !dir.is_dir() {
            writeln!(out, "{}", "No log directory found.".red())?;
            return Ok(());
        }
        let full = scan_history(&dir)?;

        if let Some(first) = args
            .first()
            .filter(|a| !a.is_empty() && a.bytes().all(|b| b.is_ascii_digit()))
        {
            return self.select(first, &full, out);
        }

        let listed = if args.is_empty() {
            full.into_iter().take(MAX_LISTED).collect()
        } else {
            let search = args.join(" ").to_lowercase();
            let matches = search_history(&full, &search);
            if matches.is_empty() {
                writeln!(out, "{} '{search}'", "No matches found for:".red())?;
                return Ok(());
            }
            matches
        };

        writeln!(out, "{}", "Matching targets:".blue())?;
        for (idx, (target, when)) in listed.iter().enumerate() {
            writeln!(
                out,
                "[{}] {} - {target}",
                idx.saturating_add(1),
                when.format(LOG_TIMESTAMP_FORMAT)
            )?;
        }
        self.last_results = Some(listed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, LOG_TIMESTAMP_FORMAT).expect("timestamp")
    }

    #[test]
    fn parses_target_and_stamp() {
        let (target, when) = parse_log_name("example.com_2025-04-15-17-57-26").expect("entry");
        assert_eq!(target, "example.com");
        assert_eq!(when, at("2025-04-15 17:57:26"));
    }

    #[test]
    fn underscores_in_target_and_collision_suffix() {
        let (target, when) = parse_log_name("my_host.example_2025-04-15-17-57-26-2").expect("entry");
        assert_eq!(target, "my_host.example");
        assert_eq!(when, at("2025-04-15 17:57:26"));
    }

    #[test]
    fn rejects_session_url_and_junk() {
        assert!(parse_log_name("session_2025-04-15-17-57-26").is_none());
        assert!(parse_log_name("https___example.com_2025-04-15-17-57-26").is_none());
        assert!(parse_log_name("example.com_yesterday").is_none());
        assert!(parse_log_name("example.com").is_none());
    }

    #[test]
    fn scan_keeps_newest_per_target() {
        let dir = TempDir::new().expect("tempdir");
        for name in [
            "example.com_2025-01-01-10-00-00.log",
            "example.com_2025-03-01-10-00-00.log",
            "8.8.8.8_2025-02-01-10-00-00.log",
            "session_2025-03-01-10-00-00.log",
            "notes.txt",
        ] {
            fs::write(dir.path().join(name), "").expect("write");
        }

        let history = scan_history(dir.path()).expect("scan");
        assert_eq!(
            history,
            vec![
                ("example.com".to_string(), at("2025-03-01 10:00:00")),
                ("8.8.8.8".to_string(), at("2025-02-01 10:00:00")),
            ]
        );
    }

    #[test]
    fn search_matches_target_or_time() {
        let history = vec![
            ("example.com".to_string(), at("2025-03-01 10:00:00")),
            ("8.8.8.8".to_string(), at("2025-02-01 10:00:00")),
        ];
        assert_eq!(search_history(&history, "EXAMPLE").len(), 1);
        assert_eq!(search_history(&history, "2025-02").len(), 1);
        assert!(search_history(&history, "nothing").is_empty());
    }
}
