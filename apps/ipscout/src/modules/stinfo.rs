//! # SecurityTrails Module
//!
//! Current DNS records for a domain. TXT records are printed but never
//! graphed; every other record type becomes an edge from the domain.

use super::http::ApiClient;
use super::require_target;
use colored::Colorize;
use ipscout_core::{Module, ModuleContext, ModuleError, ReconError, TargetType, extract_hostname};
use serde_json::Value;
use std::io::Write;

const TARGETS: &[TargetType] = &[TargetType::Domain];

const HELP: &str = "stinfo: Query SecurityTrails for current DNS and infrastructure data for a domain.\n\
Usage: stinfo\n\
Supported target types: domain\n\
Requires: SecurityTrails API key ([api_keys].securitytrails or IPSCOUT_SECURITYTRAILS_KEY)";

const API_BASE: &str = "https://api.securitytrails.com/v1/domain";

/// Record title, `current_dns` section, preferred value key.
const RECORD_TYPES: [(&str, &str, &str); 7] = [
    ("A", "a", "ip"),
    ("AAAA", "aaaa", "ipv6"),
    ("MX", "mx", "hostname"),
    ("NS", "ns", "nameserver"),
    ("TXT", "txt", "value"),
    ("CNAME", "cname", "value"),
    ("SOA", "soa", "email"),
];

/// Records of one type found in a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecords {
    pub title: &'static str,
    pub values: Vec<String>,
}

impl DnsRecords {
    /// Graphed records become nodes of this type.
    pub fn node_type(&self) -> String {
        self.title.to_lowercase()
    }

    pub fn graphed(&self) -> bool {
        self.title != "TXT"
    }
}

fn entry_value(entry: &Value, key: &str) -> Option<String> {
    [key, "value", "email"]
        .iter()
        .filter_map(|k| entry.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Non-empty record groups of `current_dns`, in display order.
///
/// `None` when the response has no `current_dns` data at all.
pub fn parse_current_dns(body: &Value) -> Option<Vec<DnsRecords>> {
    let current = body
        .get("current_dns")
        .and_then(Value::as_object)
        .filter(|m| !m.is_empty())?;

    let groups = RECORD_TYPES
        .iter()
        .filter_map(|(title, section, key)| {
            let values: Vec<String> = current
                .get(*section)
                .and_then(|s| s.get("values"))
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(|entry| entry_value(entry, key))
                .collect();
            (!values.is_empty()).then_some(DnsRecords { title: *title, values })
        })
        .collect();
    Some(groups)
}

pub struct StInfo {
    ctx: ModuleContext,
    client: ApiClient,
    api_key: Option<String>,
}

impl StInfo {
    pub fn new(ctx: ModuleContext, client: ApiClient, api_key: Option<String>) -> Self {
        Self {
            ctx,
            client,
            api_key,
        }
    }
}

impl Module for StInfo {
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
        let key = self.api_key.clone().ok_or_else(|| ModuleError::MissingApiKey {
            service: "SecurityTrails".to_string(),
        })?;
        let original = require_target(target)?;
        let domain = if original.starts_with("http://") || original.starts_with("https://") {
            let host = extract_hostname(original).ok_or(ReconError::HostExtraction)?;
            writeln!(
                out,
                "{} Extracted domain '{host}' from URL '{original}'.",
                "Note:".yellow()
            )?;
            host
        } else {
            original.to_string()
        };

        writeln!(out, "Querying SecurityTrails for domain: {}", domain.cyan())?;
        let req = self
            .client
            .get(&format!("{API_BASE}/{domain}"))
            .header("apikey", key);
        let body = self.client.json(req)?;

        let Some(groups) = parse_current_dns(&body) else {
            writeln!(out, "No current DNS records found.")?;
            return Ok(());
        };

        writeln!(out, "\n{}", "DNS Records:".blue())?;
        for group in &groups {
            writeln!(out, "{}", format!("{}:", group.title).green())?;
            for value in &group.values {
                writeln!(out, "  - {value}")?;
                if group.graphed() {
                    self.ctx.add_node(value, &group.node_type())?;
                    self.ctx.add_edge(&domain, value, group.title)?;
                }
            }
        }
        self.ctx.add_node(&domain, "domain")?;
        Ok(())
    }
}
