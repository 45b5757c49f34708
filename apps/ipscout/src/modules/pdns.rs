//! # Passive DNS Module
//!
//! Historical resolutions from the Mnemonic passive DNS API. For an IP
//! target each record adds `ip -> query`; for a domain, `domain -> answer`.

use super::http::ApiClient;
use super::require_target;
use chrono::DateTime;
use colored::Colorize;
use ipscout_core::{Module, ModuleContext, ModuleError, TargetType};
use serde_json::Value;
use std::io::Write;
use std::net::Ipv4Addr;
use std::time::Duration;

const TARGETS: &[TargetType] = &[TargetType::Ip, TargetType::Domain];

const HELP: &str = "pdns: Query Mnemonic Passive DNS for historical resolutions.\n\
Usage: pdns [offset]\n\
Supported target types: ip, domain";

const API_BASE: &str = "https://api.mnemonic.no/pdns/v3";

/// A passive DNS observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdnsRecord {
    pub rrtype: String,
    pub query: String,
    pub answer: String,
    pub first_seen: String,
    pub last_seen: String,
}

/// Millisecond epoch to `YYYY-MM-DD` (UTC).
fn seen_date(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_i64)
        .and_then(DateTime::from_timestamp_millis)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Records in a response body. Entries without query or answer are dropped.
pub fn parse_records(body: &Value) -> Vec<PdnsRecord> {
    let Some(data) = body.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };
    data.iter()
        .filter_map(|record| {
            let text = |key: &str| record.get(key).and_then(Value::as_str).map(str::to_string);
            Some(PdnsRecord {
                rrtype: text("rrtype").unwrap_or_default(),
                query: text("query")?,
                answer: text("answer")?,
                first_seen: seen_date(record.get("firstSeenTimestamp")),
                last_seen: seen_date(record.get("lastSeenTimestamp")),
            })
        })
        .collect()
}

/// Leading numeric argument, or zero.
pub fn parse_offset(args: &[String]) -> u64 {
    args.first().and_then(|a| a.parse().ok()).unwrap_or(0)
}

pub struct Pdns {
    ctx: ModuleContext,
    client: ApiClient,
    timeout: Duration,
}

impl Pdns {
    pub fn new(ctx: ModuleContext, client: ApiClient, timeout: Duration) -> Self {
        Self {
            ctx,
            client,
            timeout,
        }
    }
}

impl Module for Pdns {
    fn targets(&self) -> &[TargetType] {
        TARGETS
    }

    fn help(&self) -> &str {
        HELP
    }

    fn run(
        &mut self,
        target: Option<&str>,
        args: &[String],
        out: &mut dyn Write,
    ) -> Result<(), ModuleError> {
        let target = require_target(target)?;
        let offset = parse_offset(args);

        writeln!(out, "Querying Mnemonic Passive DNS for target: {}", target.cyan())?;
        let req = self
            .client
            .get(&format!("{API_BASE}/{target}"))
            .query(&[("offset", offset)])
            .timeout(self.timeout);
        let body = self.client.json(req)?;

        let records = parse_records(&body);
        if records.is_empty() {
            writeln!(out, "{}", "No passive DNS records found.".yellow())?;
            return Ok(());
        }
        if offset > 0 {
            writeln!(out, "{}", format!("Skipping first {offset} records.").blue())?;
        }
        writeln!(out, "{}\n", format!("Found {} record(s):", records.len()).green())?;

        let target_is_ip = target.parse::<Ipv4Addr>().is_ok();
        for record in &records {
            writeln!(
                out,
                "{}",
                format!("{} → {} [{}]", record.query, record.answer, record.rrtype).yellow()
            )?;
            writeln!(out, "  First seen: {}", record.first_seen)?;
            writeln!(out, "  Last seen:  {}\n", record.last_seen)?;

            if target_is_ip {
                self.ctx
                    .link((target, "ip"), (&record.query, "domain"), "pdns")?;
            } else {
                self.ctx
                    .link((target, "domain"), (&record.answer, "ip"), "pdns")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_records_and_dates() {
        let body = json!({
            "data": [
                {
                    "rrtype": "a",
                    "query": "www.example.com",
                    "answer": "93.184.216.34",
                    "firstSeenTimestamp": 1_514_764_800_000_i64,
                    "lastSeenTimestamp": 1_735_689_600_000_i64
                },
                { "rrtype": "a", "query": "broken.example" }
            ]
        });
        let records = parse_records(&body);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].first_seen, "2018-01-01");
        assert_eq!(records[0].last_seen, "2025-01-01");
    }

    #[test]
    fn missing_data_is_empty() {
        assert!(parse_records(&json!({"responseCode": 200})).is_empty());
    }

    #[test]
    fn offset_argument() {
        assert_eq!(parse_offset(&["25".to_string()]), 25);
        assert_eq!(parse_offset(&["abc".to_string()]), 0);
        assert_eq!(parse_offset(&[]), 0);
    }
}
