//! # WHOIS Module
//!
//! Runs the system `whois` client and turns a few well-known registry
//! fields into `<field>:<value>` nodes.

use super::{require_target, run_tool};
use ipscout_core::{Module, ModuleContext, ModuleError, TargetType, classify};
use regex::Regex;
use std::io::Write;
use std::sync::LazyLock;

const TARGETS: &[TargetType] = &[TargetType::Ip, TargetType::Domain];

const HELP: &str = "whois: Perform a WHOIS lookup on the target IP or domain.\n\
Usage: whois\n\
Supported target types: ip, domain";

/// `(field, pattern)`; the field name doubles as the node type.
static FIELD_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("organisation", r"(?im)^org(?:anization)?(?: name)?:\s*(.+)"),
        ("email", r"(?im)^e-?mail:\s*(.+)"),
        ("status", r"(?im)^status:\s*(.+)"),
        ("created", r"(?im)^created:\s*(.+)"),
        ("changed", r"(?im)^changed:\s*(.+)"),
    ]
    .into_iter()
    .filter_map(|(field, pattern)| Regex::new(pattern).ok().map(|re| (field, re)))
    .collect()
});

/// Extract `(field, value)` pairs, grouped by field in a fixed order.
pub fn parse_whois_fields(output: &str) -> Vec<(&'static str, String)> {
    let mut fields = Vec::new();
    for (field, re) in FIELD_PATTERNS.iter() {
        for caps in re.captures_iter(output) {
            if let Some(value) = caps.get(1) {
                let value = value.as_str().trim();
                if !value.is_empty() {
                    fields.push((*field, value.to_string()));
                }
            }
        }
    }
    fields
}

pub struct Whois {
    ctx: ModuleContext,
}

impl Whois {
    pub fn new(ctx: ModuleContext) -> Self {
        Self { ctx }
    }
}

impl Module for Whois {
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
        writeln!(out, "Performing WHOIS lookup for {target}...\n")?;

        let output = run_tool("whois", &[target])?;
        let text = String::from_utf8_lossy(&output.stdout);
        writeln!(out, "{text}")?;

        self.ctx.link(
            (target, classify(target).as_str()),
            ("whois", "tool"),
            "whois",
        )?;
        for (field, value) in parse_whois_fields(&text) {
            let node = format!("{field}:{value}");
            self.ctx.add_node(&node, field)?;
            self.ctx.add_edge(target, &node, "whois")?;
        }
        Ok(())
    }
}
