//! # Retarget Module
//!
//! Pivots on indicators already seen in the current per-target log.
//!
//! - `retarget` lists every IP, domain and URL found in the log.
//! - `retarget <terms>` filters that list by substring.
//! - `retarget <n>` switches to entry `n` of the last list shown.

use colored::Colorize;
use ipscout_core::{Module, ModuleContext, ModuleError, TargetType};
use regex::Regex;
use std::collections::BTreeSet;
use std::io::Write;
use std::sync::LazyLock;

const TARGETS: &[TargetType] = &[TargetType::Ip, TargetType::Domain, TargetType::Url];

const HELP: &str = "retarget: Extract IPs, domains, and URLs from the current log and select one as the new target.\n\
Usage:\n  \
retarget               → List all extracted targets from the log\n  \
retarget <search term> → Fuzzy search targets in log\n  \
retarget <number>      → Set the selected entry as the new target\n\
Supported target types: (operates independently of current type)";

struct Patterns {
    line_timestamp: Regex,
    ipv4: Regex,
    ipv6: Regex,
    domain: Regex,
    url: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            line_timestamp: Regex::new(r"(?m)^\[\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\][ \t]*")?,
            ipv4: Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b")?,
            ipv6: Regex::new(r"\b(?:[A-Fa-f0-9]{1,4}:){2,7}[A-Fa-f0-9]{1,4}\b")?,
            domain: Regex::new(r"\b(?:[a-zA-Z0-9-]+\.)+[a-zA-Z]{2,}\b")?,
            url: Regex::new(r#"https?://[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}[^'"<>),\s]*"#)?,
        })
    }
}

static PATTERNS: LazyLock<Option<Patterns>> = LazyLock::new(|| Patterns::compile().ok());

/// Names that look like domains but are file names.
fn is_file_name(candidate: &str) -> bool {
    let lower = candidate.to_ascii_lowercase();
    [".log", ".txt", ".json"].iter().any(|ext| lower.ends_with(ext))
}

/// Every distinct IPv4, IPv6, domain and URL in `log`, sorted.
///
/// Leading `[YYYY-MM-DD HH:MM:SS]` stamps are removed first so they are
/// never mistaken for addresses.
pub fn extract_targets(log: &str) -> Vec<String> {
    let Some(p) = PATTERNS.as_ref() else {
        return Vec::new();
    };
    let text = p.line_timestamp.replace_all(log, "");
    let mut found = BTreeSet::new();

    found.extend(p.ipv4.find_iter(&text).map(|m| m.as_str().to_string()));
    found.extend(p.ipv6.find_iter(&text).map(|m| m.as_str().to_string()));
    found.extend(
        p.domain
            .find_iter(&text)
            .map(|m| m.as_str())
            .filter(|d| !is_file_name(d))
            .map(str::to_string),
    );
    found.extend(
        p.url
            .find_iter(&text)
            .map(|m| m.as_str().trim_end_matches(['\'', '"', ')', '.', ',', '<', '>']))
            .map(str::to_string),
    );
    found.into_iter().collect()
}

fn is_number(arg: &str) -> bool {
    !arg.is_empty() && arg.bytes().all(|b| b.is_ascii_digit())
}

/// Entries containing `query`, case-insensitively.
pub fn filter_targets(items: &[String], query: &str) -> Vec<String> {
    let query = query.to_lowercase();
    items
        .iter()
        .filter(|item| item.to_lowercase().contains(&query))
        .cloned()
        .collect()
}

pub struct Retarget {
    ctx: ModuleContext,
    extracted: Vec<String>,
    filtered: Vec<String>,
}

impl Retarget {
    pub fn new(ctx: ModuleContext) -> Self {
        Self {
            ctx,
            extracted: Vec::new(),
            filtered: Vec::new(),
        }
    }

    fn select(&mut self, choice: &str, out: &mut dyn Write) -> Result<(), ModuleError> {
        let source = if self.filtered.is_empty() {
            &self.extracted
        } else {
            &self.filtered
        };
        let picked = choice
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|idx| source.get(idx))
            .cloned();
        let Some(new_target) = picked else {
            writeln!(out, "{} Selection {choice} is out of range.", "Error:".red())?;
            return Ok(());
        };

        writeln!(out, "{} {new_target}", "Retargeting to:".green())?;
        self.ctx.request_target(&new_target)?;
        self.ctx
            .log(&format!("[retarget] Target changed to {new_target} from log."), None)?;
        Ok(())
    }
}

impl Module for Retarget {
    fn targets(&self) -> &[TargetType] {
        TARGETS
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
        let log = self
            .ctx
            .host()
            .target_log_path()
            .and_then(|path| std::fs::read_to_string(path).ok());
        let Some(log) = log else {
            writeln!(out, "{} No active log file.", "Error:".red())?;
            return Ok(());
        };
        if self.extracted.is_empty() || args.is_empty() {
            self.extracted = extract_targets(&log);
        }

        if let Some(first) = args.first().filter(|a| is_number(a)) {
            return self.select(first, out);
        }

        if !args.is_empty() {
            let query = args.join(" ").to_lowercase();
            self.filtered = filter_targets(&self.extracted, &query);
            if self.filtered.is_empty() {
                writeln!(out, "{}", "No matches found.".red())?;
                return Ok(());
            }
            writeln!(out, "{}", format!("Filtered matches for '{query}':").blue())?;
            for (idx, item) in self.filtered.iter().enumerate() {
                writeln!(out, "[{}] {item}", idx.saturating_add(1))?;
            }
            return Ok(());
        }

        self.filtered.clear();
        if self.extracted.is_empty() {
            writeln!(out, "No IPs, domains, or URLs found in log.")?;
            return Ok(());
        }
        writeln!(out, "{}", "Available targets from log:".blue())?;
        for (idx, item) in self.extracted.iter().enumerate() {
            writeln!(out, "[{}] {item}", idx.saturating_add(1))?;
        }
        Ok(())
    }
}
