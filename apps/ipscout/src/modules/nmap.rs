//! # Nmap Module
//!
//! Scans 15 common ports with `nmap -Pn` and records open ones as
//! `port:<port>/<proto>/<service>` nodes.

use super::{require_target, run_tool};
use colored::{ColoredString, Colorize};
use ipscout_core::{Module, ModuleContext, ModuleError, TargetType};
use std::io::Write;

const TARGETS: &[TargetType] = &[TargetType::Ip];

const HELP: &str = "nmap: Scan the target IP for common open ports and identify services.\n\
Usage: nmap\n\
Supported target types: IP";

const COMMON_PORTS: &str = "22,80,443,21,25,110,143,53,3306,3389,8080,445,139,111,995";

/// One row of nmap's PORT table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortLine {
    /// e.g. `80/tcp`
    pub port_proto: String,
    pub state: String,
    pub service: String,
}

/// Rows of every `PORT STATE SERVICE` table in the output.
///
/// A table starts at a line beginning with `PORT` and ends at the next
/// blank line. Rows with fewer than three columns are skipped.
pub fn parse_port_table(output: &str) -> Vec<PortLine> {
    let mut rows = Vec::new();
    let mut in_table = false;
    for line in output.lines().map(str::trim) {
        if line.starts_with("PORT") {
            in_table = true;
            continue;
        }
        if !in_table {
            continue;
        }
        if line.is_empty() {
            in_table = false;
            continue;
        }
        let mut cols = line.split_whitespace();
        if let (Some(port_proto), Some(state), Some(service)) = (cols.next(), cols.next(), cols.next()) {
            rows.push(PortLine {
                port_proto: port_proto.to_string(),
                state: state.to_string(),
                service: service.to_string(),
            });
        }
    }
    rows
}

fn paint(state: &str, text: String) -> ColoredString {
    match state {
        "open" => text.green(),
        "closed" => text.red(),
        "filtered" => text.yellow(),
        _ => text.white(),
    }
}

pub struct Nmap {
    ctx: ModuleContext,
}

impl Nmap {
    pub fn new(ctx: ModuleContext) -> Self {
        Self { ctx }
    }
}

impl Module for Nmap {
    fn targets(&self) -> &[TargetType] {
        TARGETS
    }

    fn help(&self) -> &str {
        HELP
    }

    fn run(
        &mut self,
        target: Option<&str>,
        _args: &[String],
        out: &mut dyn Write,
    ) -> Result<(), ModuleError> {
        let target = require_target(target)?;
        writeln!(out, "{}", format!("Running Nmap on {target}...").blue())?;

        let output = run_tool("nmap", &["-Pn", "-p", COMMON_PORTS, target])?;
        let text = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ModuleError::Failed(format!(
                "nmap exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        writeln!(out)?;
        writeln!(out, "{}\n", "Nmap Results:".blue())?;
        let rows = parse_port_table(&text);
        if !rows.is_empty() {
            writeln!(out, "{}", format!("{:<10} {:<10} {:<15}", "PORT", "STATE", "SERVICE").cyan())?;
            for row in &rows {
                let line = format!("{:<10} {:<10} {:<15}", row.port_proto, row.state, row.service);
                writeln!(out, "{}", paint(&row.state, line))?;
            }
            writeln!(out)?;
        }

        self.ctx.log(&text, Some("nmap"))?;
        self.ctx.link((target, "ip"), ("nmap", "tool"), "nmap")?;
        for row in rows.iter().filter(|r| r.state == "open") {
            let node = format!("port:{}/{}", row.port_proto, row.service);
            self.ctx.add_node(&node, "port")?;
            self.ctx.add_edge(target, &node, "open")?;
        }
        Ok(())
    }
}
